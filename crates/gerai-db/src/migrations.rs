//! # Database Migrations
//!
//! Embedded SQL migrations. The `sqlx::migrate!()` macro embeds all SQL
//! files from `migrations/sqlite/` into the binary at compile time; no
//! runtime file access is needed.
//!
//! ## Adding New Migrations
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. Write idempotent SQL (`IF NOT EXISTS` where possible)
//! 4. NEVER modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent and ordered; each migration runs in its own transaction and
/// is recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("checking for pending migrations");
    MIGRATOR.run(pool).await?;
    info!("all migrations applied");
    Ok(())
}
