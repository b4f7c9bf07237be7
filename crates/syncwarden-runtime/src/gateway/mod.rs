mod handlers;
mod request;
mod response;
mod server;

pub use handlers::{GatewayState, StatusView};
pub use request::NodeRequest;
pub use response::{ApiError, ApiResponse};
pub use server::{GatewayConfig, GatewayServer, RequestContext, REQUEST_ID_HEADER};
