use std::error::Error;
use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::config::AccessConfig;
use crate::error::Result;

pub mod membership;
pub mod recordings;

pub use membership::{Device, Group, SqliteMembership};
pub use recordings::{NewRecording, RecordingRow, UploadSource};

/// SQLite-backed store for recordings and membership tables
#[derive(Clone)]
pub struct RecordingDatabase {
    pool: SqlitePool,
}

impl RecordingDatabase {
    /// Connect using `config.database_url` and run migrations
    pub async fn new(config: &AccessConfig) -> Result<Self> {
        info!("🗄️  Connecting to recording database: {}", config.database_url);

        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout);

        // An in-memory database is dropped with its last connection, so the
        // connection must never be reaped.
        if config.database_url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        info!(
            "✅ SQLite connection pool created with {} max connections",
            config.max_connections
        );

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Open a database file, creating its directory if needed
    pub async fn open(database_path: &Path, config: &AccessConfig) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(sqlx::Error::Io)?;
        }

        let config = AccessConfig {
            database_url: format!("sqlite:{}?mode=rwc", database_path.display()),
            ..config.clone()
        };
        Self::new(&config).await
    }

    /// Fresh private database, migrated
    pub async fn in_memory() -> Result<Self> {
        Self::new(&AccessConfig::in_memory()).await
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        info!("🔄 Running database migrations...");
        if let Err(migration_error) = sqlx::migrate!("./migrations").run(pool).await {
            error!("❌ Database migration failed: {}", migration_error);

            let mut source = migration_error.source();
            let mut level = 1;
            while let Some(err) = source {
                error!("  {}. Caused by: {}", level, err);
                source = err.source();
                level += 1;
            }

            return Err(migration_error.into());
        }
        info!("✅ Database migrations completed successfully");
        Ok(())
    }

    /// Get database connection pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
