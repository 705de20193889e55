use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

use crate::error::CoreError;

// Re-export the pool for use in other parts of the core crate
pub use sqlx::SqlitePool as DbPool;

/// Establishes a connection pool to the SQLite database and runs migrations.
///
/// # Arguments
///
/// * `db_path` - The path to the SQLite database file.
///
/// # Returns
///
/// A `Result` containing the `SqlitePool` or a `CoreError` if the connection fails
/// or migrations cannot be run.
pub async fn establish_connection(db_path: &str) -> Result<SqlitePool, CoreError> {
    // Create the parent directory if it doesn't exist
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(path = db_path, "database ready");

    Ok(pool)
}
