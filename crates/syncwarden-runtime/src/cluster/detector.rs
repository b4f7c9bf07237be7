use syncwarden_core::cluster::Node;

/// Consecutive-failure threshold policy.
///
/// Counting happens in the registry; the detector only compares.
#[derive(Debug, Clone, Copy)]
pub struct FailureDetector {
    retry_threshold: u32,
}

impl FailureDetector {
    /// Create a detector. A threshold of zero is treated as one.
    pub fn new(retry_threshold: u32) -> Self {
        Self {
            retry_threshold: retry_threshold.max(1),
        }
    }

    pub fn retry_threshold(&self) -> u32 {
        self.retry_threshold
    }

    /// Replace the threshold. Applies to the next evaluation.
    pub fn set_retry_threshold(&mut self, retry_threshold: u32) {
        self.retry_threshold = retry_threshold.max(1);
    }

    /// Whether the node has failed enough consecutive probes to be down.
    pub fn is_down(&self, node: &Node) -> bool {
        node.failure_count >= self.retry_threshold
    }

    /// Peers currently judged down.
    pub fn down_peers<'a>(&self, nodes: &'a [Node]) -> Vec<&'a Node> {
        nodes
            .iter()
            .filter(|n| n.is_peer() && self.is_down(n))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwarden_core::cluster::NodeRole;

    fn node(name: &str, failure_count: u32, is_self: bool) -> Node {
        Node {
            name: name.to_string(),
            endpoint: format!("host={}", name),
            role: NodeRole::Primary,
            is_self,
            sync: false,
            failure_count,
        }
    }

    #[test]
    fn test_threshold_comparison() {
        let detector = FailureDetector::new(4);
        assert!(!detector.is_down(&node("p", 0, false)));
        assert!(!detector.is_down(&node("p", 3, false)));
        assert!(detector.is_down(&node("p", 4, false)));
        assert!(detector.is_down(&node("p", 9, false)));
    }

    #[test]
    fn test_zero_threshold_clamped() {
        let detector = FailureDetector::new(0);
        assert_eq!(detector.retry_threshold(), 1);
        assert!(!detector.is_down(&node("p", 0, false)));
    }

    #[test]
    fn test_set_threshold() {
        let mut detector = FailureDetector::new(4);
        let peer = node("p", 2, false);
        assert!(!detector.is_down(&peer));

        detector.set_retry_threshold(2);
        assert!(detector.is_down(&peer));
    }

    #[test]
    fn test_down_peers_ignores_self() {
        let detector = FailureDetector::new(1);
        let nodes = vec![node("me", 5, true), node("a", 1, false), node("b", 0, false)];
        let down: Vec<&str> = detector
            .down_peers(&nodes)
            .into_iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(down, vec!["a"]);
    }
}
