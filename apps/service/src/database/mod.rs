/// Storage layer
///
/// The monitoring core only talks to the traits in `repository`; `DatabaseImpl`
/// backs them with a pooled libsql (SQLite) database and `MemoryStore` keeps
/// everything in process.
pub mod memory;
pub mod migrations;
pub mod models;
pub mod repository;

pub use memory::MemoryStore;
pub use repository::{DatabaseImpl, HistoryStore, NotificationLog, TargetRepository};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
