use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
    Error, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::info;
use utils::assets::database_path;

pub mod models;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Maximum connections in the pool. SQLite benefits from limited connections
/// due to its single-writer model.
const MAX_CONNECTIONS: u32 = 10;

/// Connection acquisition timeout in seconds.
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    /// Open (or create) the database at the default location and apply
    /// pending migrations.
    pub async fn new() -> Result<Self, Error> {
        Self::new_with_path(&database_path()).await
    }

    pub async fn new_with_path(path: &Path) -> Result<Self, Error> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.to_string_lossy()))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database ready at {}", path.display());

        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. one built by the test utilities.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
