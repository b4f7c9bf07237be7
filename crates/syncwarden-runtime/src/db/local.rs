use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use syncwarden_core::cluster::{connect_options, ReplicationControl};
use syncwarden_core::error::{Result, WardenError};

/// Connection to the Postgres server this process supervises.
#[derive(Clone)]
pub struct LocalServer {
    pool: PgPool,
}

impl LocalServer {
    /// Connect to the local server, failing if it cannot be reached.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self> {
        let options = connect_options(endpoint)?;
        let pool = Self::pool_options(timeout)
            .connect_with(options)
            .await
            .map_err(|e| WardenError::Database(format!("Failed to connect to local server: {}", e)))?;
        Ok(Self { pool })
    }

    fn pool_options(timeout: Duration) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn show(&self, setting: &'static str) -> Result<String> {
        sqlx::query_scalar::<_, String>(&format!("SHOW {}", setting))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| WardenError::Database(format!("Failed to read {}: {}", setting, e)))
    }
}

impl ReplicationControl for LocalServer {
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
    }

    fn is_in_recovery(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query_scalar::<_, bool>("SELECT pg_is_in_recovery()")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| WardenError::Database(format!("Failed to detect role: {}", e)))
        })
    }

    fn hot_standby_enabled(&self) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        Box::pin(async move { Ok(self.show("hot_standby").await? == "on") })
    }

    fn synchronous_standby_names(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(self.show("synchronous_standby_names"))
    }

    fn disable_sync(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            // ALTER SYSTEM refuses to run inside a transaction block, so it
            // goes over the simple query protocol.
            sqlx::raw_sql("ALTER SYSTEM SET synchronous_standby_names TO ''")
                .execute(&self.pool)
                .await
                .map_err(|e| WardenError::Database(e.to_string()))?;
            Ok(())
        })
    }

    fn reload_config(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let reloaded = sqlx::query_scalar::<_, bool>("SELECT pg_reload_conf()")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| WardenError::Database(e.to_string()))?;
            if !reloaded {
                return Err(WardenError::Database(
                    "pg_reload_conf() returned false".to_string(),
                ));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercising the queries needs a running server; these cover the
    // connection handling only.

    const DOWN: &str = "host=127.0.0.1 port=1 dbname=postgres user=postgres";

    fn unreachable() -> LocalServer {
        let options = connect_options(DOWN).unwrap();
        LocalServer {
            pool: LocalServer::pool_options(Duration::from_millis(200)).connect_lazy_with(options),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_errors() {
        let server = unreachable();

        assert!(server.ping().await.is_err());
        assert!(server.is_in_recovery().await.is_err());
        assert!(server.synchronous_standby_names().await.is_err());
        assert!(server.disable_sync().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_fast_when_down() {
        let result = LocalServer::connect(DOWN, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(WardenError::Database(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_unparsable_endpoint() {
        let result = LocalServer::connect("host=db1 port=", Duration::from_millis(200)).await;
        assert!(matches!(result, Err(WardenError::InvalidArgument(_))));
    }
}
