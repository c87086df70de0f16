//! # curator-db
//!
//! Embedded SQLite layer for the curator sync engine.
//!
//! This crate provides:
//! - Connection pool management tuned for a single-user desktop database
//! - Schema migrations for the tables the sync engine reads
//! - [`SqliteSyncStore`], the local-store side of the sync protocol
//!
//! ## Example
//!
//! ```rust,ignore
//! use curator_db::Database;
//! use curator_core::SyncStore;
//!
//! let db = Database::connect("sqlite://curator.db").await?;
//! db.migrate().await?;
//!
//! let counts = db.sync.pending_counts("autotag").await?;
//! println!("{} rows waiting for upload", counts.total());
//! ```

pub mod pool;
pub mod sync_store;

// Test fixtures for integration tests
// Note: Always compiled (with migrations) so integration tests in other
// crates can build rows.
#[cfg(feature = "migrations")]
pub mod test_fixtures;

// Re-export core types
pub use curator_core::*;

pub use pool::{create_pool, create_pool_with_config, is_memory_url, log_pool_metrics, PoolConfig};
pub use sync_store::SqliteSyncStore;

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::SqlitePool,
    /// Local store used by the sync engine.
    pub sync: SqliteSyncStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            sync: SqliteSyncStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}
