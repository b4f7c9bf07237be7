use serde::{Deserialize, Serialize};

/// Body of `POST /nodes` and `POST /join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    /// Node name.
    pub name: String,
    /// Connection endpoint of the node's server.
    pub endpoint: String,
}

impl NodeRequest {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_request_deserialization() {
        let json = r#"{"name": "node2", "endpoint": "postgres://n2/postgres"}"#;
        let req: NodeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "node2");
        assert_eq!(req.endpoint, "postgres://n2/postgres");
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let json = r#"{"name": "node2"}"#;
        assert!(serde_json::from_str::<NodeRequest>(json).is_err());
    }
}
