use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use syncwarden::syncwarden_runtime::ApiClient;

/// Manage cluster membership.
#[derive(Parser)]
pub struct NodesCommand {
    #[command(subcommand)]
    pub action: NodesAction,

    /// Management API of the coordinator to talk to.
    #[arg(long, default_value = "http://127.0.0.1:7400", global = true)]
    pub api: String,
}

#[derive(Subcommand)]
pub enum NodesAction {
    /// Register a node.
    Add {
        /// Node name.
        name: String,
        /// Connection endpoint of the node's server.
        endpoint: String,
    },

    /// Remove a node.
    Delete {
        /// Node name.
        name: String,
    },

    /// Join the primary and print the membership it returns.
    Join {
        /// Name to join as.
        name: String,
        /// Connection endpoint to advertise.
        endpoint: String,
    },

    /// List registered nodes.
    List,
}

impl NodesCommand {
    pub async fn execute(self) -> Result<()> {
        let client = ApiClient::new(&self.api)?;

        match self.action {
            NodesAction::Add { name, endpoint } => {
                client.add_node(&name, &endpoint).await?;
                println!("{} Added {}", style("✅").green(), style(&name).cyan());
            }
            NodesAction::Delete { name } => {
                client.delete_node(&name).await?;
                println!("{} Removed {}", style("✅").green(), style(&name).cyan());
            }
            NodesAction::Join { name, endpoint } => {
                let members = client.join(&name, &endpoint).await?;
                println!(
                    "{} Joined {} ({} members)",
                    style("✅").green(),
                    style(client.base_url()).cyan(),
                    members.len()
                );
                for member in members {
                    println!("  {}  {}", style(&member.name).bold(), member.endpoint);
                }
            }
            NodesAction::List => {
                let nodes = client.list_nodes().await?;
                println!(
                    "  {:<20} {:<8} {:<5} {:>8}  {}",
                    style("NAME").bold(),
                    style("ROLE").bold(),
                    style("SYNC").bold(),
                    style("FAILURES").bold(),
                    style("ENDPOINT").bold()
                );
                for node in nodes {
                    let name = if node.is_self {
                        format!("{} (self)", node.name)
                    } else {
                        node.name.clone()
                    };
                    let failures = if node.failure_count > 0 {
                        style(node.failure_count.to_string()).red()
                    } else {
                        style(node.failure_count.to_string()).green()
                    };
                    println!(
                        "  {:<20} {:<8} {:<5} {:>8}  {}",
                        name,
                        node.role.as_str(),
                        if node.sync { "yes" } else { "no" },
                        failures,
                        node.endpoint
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api() {
        let cmd = NodesCommand::try_parse_from(["nodes", "list"]).unwrap();
        assert_eq!(cmd.api, "http://127.0.0.1:7400");
        assert!(matches!(cmd.action, NodesAction::List));
    }

    #[test]
    fn test_parse_delete() {
        let cmd =
            NodesCommand::try_parse_from(["nodes", "delete", "node2", "--api", "http://h:1"])
                .unwrap();
        assert_eq!(cmd.api, "http://h:1");
        match cmd.action {
            NodesAction::Delete { name } => assert_eq!(name, "node2"),
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn test_add_requires_endpoint() {
        assert!(NodesCommand::try_parse_from(["nodes", "add", "node2"]).is_err());
    }
}
