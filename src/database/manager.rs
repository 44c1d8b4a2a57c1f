use sha2::{Digest, Sha256};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::types::TenantId;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid tenant database name: {0}")]
    InvalidTenantName(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<crate::database::models::UnknownStatus> for DatabaseError {
    fn from(err: crate::database::models::UnknownStatus) -> Self {
        DatabaseError::Corrupt(err.to_string())
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Corrupt(err.to_string())
    }
}

/// Connection pool cache: one lazily created pool per tenant database
pub struct DatabaseManager {
    base_url: String,
    max_connections: u32,
    connect_timeout: Duration,
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl DatabaseManager {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let base_url = config
            .url
            .clone()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        url::Url::parse(&base_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        Ok(Self {
            base_url,
            max_connections: config.max_connections,
            connect_timeout: Duration::from_secs(config.connection_timeout),
            pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Get the pool holding this tenant's tables
    pub async fn tenant_pool(&self, tenant: &TenantId) -> Result<PgPool, DatabaseError> {
        let database_name = Self::tenant_database_name(tenant);
        self.get_pool(&database_name).await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, database_name: &str) -> Result<PgPool, DatabaseError> {
        if !Self::is_valid_db_name(database_name) {
            return Err(DatabaseError::InvalidTenantName(database_name.to_string()));
        }

        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(database_name) {
                return Ok(pool.clone());
            }
        }

        let connection_string = self.build_connection_string(database_name)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(&connection_string)
            .await?;

        // Another request may have raced us here; keep whichever landed first
        let mut pools = self.pools.write().await;
        let pool = pools
            .entry(database_name.to_string())
            .or_insert(pool)
            .clone();

        info!("Created database pool for: {}", database_name);
        Ok(pool)
    }

    fn build_connection_string(&self, database_name: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(&self.base_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        // Replace the path to the database name (ensure leading slash)
        url.set_path(&format!("/{}", database_name));
        Ok(url.into())
    }

    /// Hash a tenant identifier to its database name
    pub fn tenant_database_name(tenant: &TenantId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tenant.as_str().as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        // First 16 hex characters keep the name well under the identifier limit
        format!("tenant_{}", &hash[..16])
    }

    /// Pings a tenant pool to ensure connectivity
    pub async fn health_check(&self, tenant: &TenantId) -> Result<(), DatabaseError> {
        let pool = self.tenant_pool(tenant).await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }

    /// Only `tenant_` followed by [a-zA-Z0-9_]+ is accepted
    fn is_valid_db_name(name: &str) -> bool {
        match name.strip_prefix("tenant_") {
            Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        }
    }
}
