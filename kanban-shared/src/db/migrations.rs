/// Embedded schema migrations
///
/// Migrations live in `kanban-shared/migrations/` and are compiled into the
/// binary with `sqlx::migrate!`, so a deployed server needs no files on disk.
///
/// # Example
///
/// ```no_run
/// use kanban_shared::db::migrations::{get_migration_status, run_migrations};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// run_migrations(&pool).await?;
///
/// let status = get_migration_status(&pool).await?;
/// assert!(status.is_up_to_date);
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPool;
use tracing::{debug, info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applied migrations compared to the embedded set
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub applied_migrations: usize,

    /// Latest applied version (timestamp prefix of the file name)
    pub latest_version: Option<i64>,

    /// Latest version embedded in this build
    pub expected_version: Option<i64>,

    pub is_up_to_date: bool,
}

/// Latest migration version compiled into this build
pub fn expected_version() -> Option<i64> {
    MIGRATOR.iter().map(|migration| migration.version).max()
}

/// Applies all pending migrations
///
/// # Errors
///
/// Returns the migrator's error if a migration fails; the failing migration
/// is rolled back
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    info!(expected_version = ?expected_version(), "Running database migrations");

    match MIGRATOR.run(pool).await {
        Ok(()) => {
            info!("Database migrations completed");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Reads migration state from `_sqlx_migrations`
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let expected_version = expected_version();

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            expected_version,
            is_up_to_date: expected_version.is_none(),
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version)
         FROM _sqlx_migrations
         WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    debug!(
        applied_migrations = count,
        latest_version = ?latest_version,
        "Migration status retrieved"
    );

    Ok(MigrationStatus {
        applied_migrations: count as usize,
        latest_version,
        expected_version,
        is_up_to_date: latest_version >= expected_version,
    })
}
