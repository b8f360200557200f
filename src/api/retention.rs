//! Retention API endpoints

use axum::{extract::State, Json};
use chrono::Utc;

use crate::{error::AppResult, services::retention::AnonymizationReport, AppState};

use super::Admin;

/// Anonymize every service past the retention period now
#[utoipa::path(
    post,
    path = "/retention/run",
    tag = "retention",
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Anonymization report", body = AnonymizationReport)
    )
)]
pub async fn run(State(state): State<AppState>, _admin: Admin) -> AppResult<Json<AnonymizationReport>> {
    let report = state
        .services
        .retention
        .anonymize_eligible_services(Utc::now(), state.config.retention.period())
        .await?;
    Ok(Json(report))
}
