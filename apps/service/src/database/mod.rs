/// Database abstraction layer
///
/// The probing engine only talks to the `Database` trait; `DatabaseImpl`
/// backs it with a pooled local libsql (SQLite) database.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

use crate::pool::LibsqlPool;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Run migrations on a pooled connection and hand back the store
pub async fn open(pool: LibsqlPool) -> Result<DatabaseImpl> {
    {
        let conn = pool.get().await.map_err(|e| anyhow::anyhow!("Failed to get database connection: {e}"))?;
        initialize_database(&conn).await?;
    }
    Ok(DatabaseImpl::new_from_pool(pool))
}
