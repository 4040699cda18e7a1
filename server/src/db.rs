use crate::config::Database;
use crate::error::ApiError;
use diesel::{Connection, ConnectionError, PgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Path relative to Cargo.toml
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("data/migrations");

/// The single connection shared by every handler, held in managed state.
pub type DbConnection = Mutex<PgConnection>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Unable to connect to PostgreSQL database {target:?}: {source}")]
    Connect { target: String, source: ConnectionError },

    #[error("Unable to migrate database to the latest schema: {0}")]
    Migrate(String),
}

/// Connects to the configured database and brings its schema up to date.
pub fn establish(database: &Database) -> Result<PgConnection, StartupError> {
    let target = database.to_pg_connection_string();
    let mut connection =
        PgConnection::establish(&target).map_err(|source| StartupError::Connect { target, source })?;

    let applied = connection.run_pending_migrations(MIGRATIONS).map_err(|e| StartupError::Migrate(e.to_string()))?;
    if !applied.is_empty() {
        info!("Applied {} database migration(s)", applied.len());
    }

    Ok(connection)
}

/// Locks the shared connection, failing with a 500 if a previous holder
/// panicked.
pub fn lock(db_connection: &DbConnection) -> Result<MutexGuard<'_, PgConnection>, ApiError> {
    db_connection.lock().map_err(|e| {
        error!("Unable to lock database connection: {:?}", e);
        ApiError::Internal("Database connection unavailable".to_owned())
    })
}
