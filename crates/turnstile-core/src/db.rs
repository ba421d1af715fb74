//! `SQLite` plumbing for the bridge storage layer: the error type, pool
//! setup and the [`define_database!`] macro that ties a crate's
//! `migrations/` directory to a typed database handle.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

/// Queue payloads are JSON text; encoding failures surface as query errors.
impl From<serde_json::Error> for DatabaseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Query(format!("payload encoding: {e}"))
    }
}

/// Lock wait before a write fails with `SQLITE_BUSY`. Sweep workers and the
/// function routes write through the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool size for file databases. Sweep workers above this wait for a
/// connection instead of opening more.
const FILE_POOL_CONNECTIONS: u32 = 5;

fn connect_options(url: &str) -> Result<SqliteConnectOptions, DatabaseError> {
    Ok(SqliteConnectOptions::from_str(url)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT))
}

async fn connect(
    options: SqliteConnectOptions,
    max_connections: u32,
) -> Result<Pool<Sqlite>, DatabaseError> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))
}

/// Open (or create) the database file in WAL mode, creating its directory
/// first.
pub async fn open_pool(path: &Path) -> Result<Pool<Sqlite>, DatabaseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io(e.to_string()))?;
    }

    let options = connect_options(&format!("sqlite:{}?mode=rwc", path.display()))?
        .journal_mode(SqliteJournalMode::Wal);
    let pool = connect(options, FILE_POOL_CONNECTIONS).await?;

    info!(path = %path.display(), "Database opened");
    Ok(pool)
}

/// Open an in-memory pool for tests.
pub async fn open_pool_in_memory() -> Result<Pool<Sqlite>, DatabaseError> {
    // Each connection gets its own in-memory database, so the pool holds
    // exactly one. Concurrent sweep tests queue on it.
    connect(connect_options("sqlite::memory:")?, 1).await
}

/// Current time as Unix seconds, the unit every timestamp column uses.
pub fn unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Apply a crate's embedded migrations to `pool`.
pub async fn apply_migrations(
    pool: &Pool<Sqlite>,
    migrator: &Migrator,
) -> Result<(), DatabaseError> {
    migrator
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))
}

/// Declare a cloneable database handle that runs the invoking crate's
/// `migrations/` on open.
///
/// ```ignore
/// turnstile_core::define_database!(BridgeDatabase, "Bridge database migrations complete");
/// ```
#[macro_export]
macro_rules! define_database {
    ($name:ident, $migration_msg:expr) => {
        #[derive(Clone)]
        pub struct $name {
            pool: ::sqlx::Pool<::sqlx::Sqlite>,
        }

        impl $name {
            /// Open or create the database file and bring its schema up to date.
            pub async fn open(
                path: &::std::path::Path,
            ) -> ::std::result::Result<Self, $crate::db::DatabaseError> {
                Self::migrated($crate::db::open_pool(path).await?).await
            }

            /// Fresh in-memory database with the full schema.
            pub async fn open_in_memory() -> ::std::result::Result<Self, $crate::db::DatabaseError>
            {
                Self::migrated($crate::db::open_pool_in_memory().await?).await
            }

            async fn migrated(
                pool: ::sqlx::Pool<::sqlx::Sqlite>,
            ) -> ::std::result::Result<Self, $crate::db::DatabaseError> {
                $crate::db::apply_migrations(&pool, &::sqlx::migrate!("./migrations")).await?;
                ::tracing::info!($migration_msg);
                Ok(Self { pool })
            }

            pub const fn pool(&self) -> &::sqlx::Pool<::sqlx::Sqlite> {
                &self.pool
            }
        }
    };
}
