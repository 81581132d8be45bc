use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::ClientError;
use crate::resources::{ClientOptions, Endpoint, ServiceClient};

/// Options for [`PgClient`].
#[derive(Clone, Debug)]
pub struct PgOptions {
    /// Server address; set per instance by the client factory.
    pub endpoint: Option<Endpoint>,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Pool size.
    pub max_connections: u32,
    /// Bound on acquiring a connection (and on the initial connect).
    pub acquire_timeout: Duration,
}

impl PgOptions {
    /// Uses the given credentials instead of `postgres`/`postgres`/`postgres`.
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = password.into();
        self.database = database.into();
        self
    }

    /// Connection URL, if an endpoint is set.
    pub fn url(&self) -> Option<String> {
        self.endpoint.as_ref().map(|endpoint| {
            format!(
                "postgres://{}:{}@{}/{}",
                self.user, self.password, endpoint, self.database
            )
        })
    }
}

impl Default for PgOptions {
    fn default() -> Self {
        Self {
            endpoint: None,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientOptions for PgOptions {
    fn set_endpoint(&mut self, endpoint: &Endpoint) {
        self.endpoint = Some(endpoint.clone());
    }

    fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.clone()
    }
}

/// Connection pool to a PostgreSQL server.
#[derive(Debug, Clone)]
pub struct PgClient {
    pool: PgPool,
}

impl PgClient {
    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl std::ops::Deref for PgClient {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

#[async_trait]
impl ServiceClient for PgClient {
    type Options = PgOptions;

    async fn connect(options: PgOptions) -> Result<Self, ClientError> {
        let url = options.url().ok_or(ClientError::NoEndpoint)?;
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(&url)
            .await
            .map_err(|e| ClientError::Connect {
                endpoint: options.endpoint.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                error: e.to_string(),
            })?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| ClientError::Connect {
                endpoint: options.endpoint.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                error: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.pool.close().await;
        Ok(())
    }
}
