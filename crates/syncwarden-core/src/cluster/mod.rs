mod endpoint;
mod node;
mod sync_names;
mod traits;

pub use endpoint::connect_options;
pub use node::{
    validate_endpoint, validate_name, Member, Node, NodeRole, MAX_ENDPOINT_LEN, MAX_NAME_LEN,
};
pub use sync_names::SyncStandbys;
pub use traits::{HealthProbe, ReplicationControl};
