pub mod cluster;
pub mod config;
pub mod error;

pub use config::WardenConfig;
pub use error::{Result, WardenError};
