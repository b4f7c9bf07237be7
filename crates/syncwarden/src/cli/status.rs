use anyhow::Result;
use clap::Parser;

use syncwarden::syncwarden_runtime::ApiClient;

/// Show coordinator status.
#[derive(Parser)]
pub struct StatusCommand {
    /// Management API of the coordinator to talk to.
    #[arg(long, default_value = "http://127.0.0.1:7400")]
    pub api: String,
}

impl StatusCommand {
    pub async fn execute(self) -> Result<()> {
        let client = ApiClient::new(&self.api)?;
        let status = client.status().await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }
}
