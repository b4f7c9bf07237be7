use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sqlx::{Connection, PgConnection};
use syncwarden_core::cluster::{connect_options, HealthProbe};
use syncwarden_core::error::Result;

/// Probe that connects to a Postgres endpoint and runs `SELECT 1`.
#[derive(Debug, Clone)]
pub struct PgHealthProbe {
    timeout: Duration,
}

impl PgHealthProbe {
    /// Create a probe bounded by `timeout` per attempt.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn ping(endpoint: &str) -> Result<()> {
        let options = connect_options(endpoint)?;
        let mut conn = PgConnection::connect_with(&options).await?;
        sqlx::query("SELECT 1").execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }
}

impl Default for PgHealthProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl HealthProbe for PgHealthProbe {
    fn probe<'a>(&'a self, endpoint: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, Self::ping(endpoint)).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::warn!(endpoint, error = %e, "Probe failed");
                    false
                }
                Err(_) => {
                    tracing::warn!(endpoint, timeout = ?self.timeout, "Probe timed out");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwarden_core::error::WardenError;

    #[test]
    fn test_default_timeout() {
        let probe = PgHealthProbe::default();
        assert_eq!(probe.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_malformed_endpoint_reports_down() {
        let probe = PgHealthProbe::new(Duration::from_secs(1));
        assert!(!probe.probe("not a connection string://").await);
    }

    #[tokio::test]
    async fn test_keyword_endpoint_reaches_the_network() {
        let err = PgHealthProbe::ping("host=127.0.0.1 port=1 dbname=postgres user=postgres")
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::Sql(sqlx::Error::Io(_))), "{:?}", err);

        let err = PgHealthProbe::ping("not a connection string://")
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_down() {
        let probe = PgHealthProbe::new(Duration::from_millis(500));
        // Port 1 on loopback refuses connections.
        assert!(!probe.probe("postgres://postgres@127.0.0.1:1/postgres").await);
    }
}
