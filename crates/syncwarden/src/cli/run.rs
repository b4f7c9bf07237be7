use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use syncwarden::syncwarden_core::config::WardenConfig;
use syncwarden::syncwarden_runtime::cluster::CoordinatorExit;
use syncwarden::Warden;

/// Run the coordinator.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "syncwarden.toml")]
    pub config: String,

    /// Management API port (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Verbose logging.
    #[arg(long)]
    pub dev: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        let config_path = std::path::Path::new(&self.config);
        if !config_path.exists() {
            anyhow::bail!("Configuration file not found: {}", self.config);
        }

        let mut config = WardenConfig::from_file(config_path)?;
        if let Some(port) = self.port {
            config.api.port = port;
        }

        init_logging(&config, self.dev);

        println!();
        println!(
            "  {}  {} v{}",
            style("⛨").bold(),
            style("SyncWarden").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!();
        println!(
            "  {} Node {} at {}",
            style("◆").bold(),
            style(&config.node.name).cyan(),
            config.node.endpoint
        );
        println!(
            "  {} Management API on {}",
            style("🌐").bold(),
            style(format!("http://{}:{}", config.api.host, config.api.port)).cyan()
        );
        if self.dev {
            println!("  {} Development mode enabled", style("🔧").bold());
        }
        println!();

        info!("Loading configuration from {}", self.config);

        let warden = Warden::builder()
            .config(config)
            .config_file(&self.config)
            .build()?;

        match warden.run().await? {
            CoordinatorExit::Terminated => {
                println!("\n  {} Goodbye!", style("👋").bold());
                Ok(())
            }
            CoordinatorExit::HostDied => anyhow::bail!("Local server died"),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &WardenConfig, dev: bool) {
    let level = if dev {
        "debug"
    } else {
        config.observability.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.observability.logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_defaults() {
        let cmd = RunCommand::try_parse_from(["run"]).unwrap();
        assert_eq!(cmd.config, "syncwarden.toml");
        assert_eq!(cmd.port, None);
        assert!(!cmd.dev);
    }

    #[test]
    fn test_run_command_with_overrides() {
        let cmd = RunCommand::try_parse_from(["run", "--config", "other.toml", "-p", "7500"]).unwrap();
        assert_eq!(cmd.config, "other.toml");
        assert_eq!(cmd.port, Some(7500));
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let cmd = RunCommand {
            config: "/nonexistent/syncwarden.toml".to_string(),
            port: None,
            dev: false,
        };
        let err = cmd.execute().await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
