//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::db::DbPool;
use crate::engine::JobScheduler;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    /// Jobs currently delayed or running
    pub scheduled_jobs: usize,
    /// Database status
    pub database: ComponentHealth,
}

/// Health status enum
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shared state for health checks
pub struct HealthState {
    pub db: DbPool,
    pub scheduler: JobScheduler,
    pub started_at: chrono::DateTime<Utc>,
}

/// GET /health
pub async fn health_check(
    State(state): State<Arc<HealthState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let database = check_database(&state.db).await;

    let status_code = match database.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status: database.status,
        uptime_seconds: uptime,
        scheduled_jobs: state.scheduler.job_count(),
        database,
    };

    (status_code, Json(response))
}

async fn check_database(pool: &DbPool) -> ComponentHealth {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => ComponentHealth {
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
            }
        }
    }
}
