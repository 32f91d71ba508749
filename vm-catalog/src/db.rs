use crate::error::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// Initialize the catalog database.
///
/// `None` opens a private in-memory database. The pool holds a single
/// connection that never expires: every mutation is serialized through it,
/// and an in-memory database would vanish with its connection.
#[instrument(fields(db_path = ?db_path.map(Path::display)))]
pub async fn create_pool(db_path: Option<&Path>) -> Result<SqlitePool> {
    let options = match db_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        }
        None => SqliteConnectOptions::from_str("sqlite::memory:")?,
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run database migrations
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    Ok(())
}
