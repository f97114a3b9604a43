//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres. The process builds
//! one read-write pool for synchronization and browsing and one read-only
//! pool for analytics collaborators, and injects them where needed.

use crate::error::{ApiError, ApiResult};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Server-side `statement_timeout`
    pub statement_timeout: Option<Duration>,
    /// Open every session with `default_transaction_read_only`
    pub read_only: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "tabula".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            statement_timeout: None,
            read_only: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("TABULA_DB_HOST").unwrap_or(defaults.host),
            port: env_parse("TABULA_DB_PORT").unwrap_or(defaults.port),
            dbname: std::env::var("TABULA_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("TABULA_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("TABULA_DB_PASSWORD").unwrap_or_default(),
            max_size: env_parse("TABULA_DB_POOL_SIZE").unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(env_parse("TABULA_DB_TIMEOUT").unwrap_or(30)),
            statement_timeout: env_parse::<u64>("TABULA_DB_STATEMENT_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            read_only: false,
        }
    }

    /// Read-only handle configuration. `TABULA_RO_DB_*` variables override
    /// the read-write values they shadow.
    pub fn read_only_from_env() -> Self {
        Self::read_only_from(&Self::from_env())
    }

    fn read_only_from(base: &DbConfig) -> Self {
        Self {
            host: std::env::var("TABULA_RO_DB_HOST").unwrap_or_else(|_| base.host.clone()),
            port: env_parse("TABULA_RO_DB_PORT").unwrap_or(base.port),
            dbname: std::env::var("TABULA_RO_DB_NAME").unwrap_or_else(|_| base.dbname.clone()),
            user: std::env::var("TABULA_RO_DB_USER").unwrap_or_else(|_| base.user.clone()),
            password: std::env::var("TABULA_RO_DB_PASSWORD")
                .unwrap_or_else(|_| base.password.clone()),
            max_size: env_parse("TABULA_RO_DB_POOL_SIZE").unwrap_or(base.max_size),
            timeout: base.timeout,
            statement_timeout: base.statement_timeout,
            read_only: true,
        }
    }

    /// Session options passed at connect time.
    pub fn session_options(&self) -> Option<String> {
        let mut options = Vec::new();
        if let Some(timeout) = self.statement_timeout {
            options.push(format!("-c statement_timeout={}", timeout.as_millis()));
        }
        if self.read_only {
            options.push("-c default_transaction_read_only=on".to_string());
        }
        (!options.is_empty()).then(|| options.join(" "))
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.options = self.session_options();
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Cloneable handle to one connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Get a connection from the pool.
    pub async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Round-trip a trivial statement.
    pub async fn health_check(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }
}

/// The process-wide database handles.
#[derive(Clone)]
pub struct DbHandles {
    /// Shadow catalog writes, catalog reads and browse statements.
    pub read_write: DbClient,
    /// Sessions opened read-only, for collaborators that must never write.
    pub read_only: DbClient,
}

impl DbHandles {
    /// Build both pools from the environment.
    pub fn from_env() -> ApiResult<Self> {
        let read_write = DbConfig::from_env();
        let read_only = DbConfig::read_only_from(&read_write);
        Ok(Self {
            read_write: DbClient::from_config(&read_write)?,
            read_only: DbClient::from_config(&read_only)?,
        })
    }
}
