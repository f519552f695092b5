/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "migrations": { "applied_migrations": 1, "is_up_to_date": true, ... },
///   "pool": { "active_connections": 1, "idle_connections": 1, "total_connections": 2 }
/// }
/// ```
///
/// Always answers 200; `status` is `degraded` when the database is
/// unreachable or the schema is behind this build.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use kanban_shared::db::{
    migrations::{get_migration_status, MigrationStatus},
    pool::{get_pool_stats, health_check as db_health_check, PoolStats},
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationStatus>,

    pub pool: PoolStats,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = match db_health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };

    let migrations = if connected {
        get_migration_status(&state.db)
            .await
            .map_err(|e| warn!(error = %e, "Could not read migration status"))
            .ok()
    } else {
        None
    };

    let healthy = connected && migrations.as_ref().is_some_and(|m| m.is_up_to_date);

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if connected { "connected" } else { "disconnected" },
        migrations,
        pool: get_pool_stats(&state.db),
    }))
}
