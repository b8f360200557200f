//! Services API endpoints (bookable events and operator maintenance)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        service::{
            AdjustCapacity, AdjustRegistrationEnds, CapacityAdjustment,
            RegistrationEndsAdjustment, ServiceQuery, WeeklyPlan,
        },
        CreateService, ServiceView,
    },
    AppState,
};

use super::Admin;

fn views(services: Vec<crate::models::Service>) -> Vec<ServiceView> {
    services.into_iter().map(ServiceView::from).collect()
}

/// Services currently open for registration
#[utoipa::path(
    get,
    path = "/services/current",
    tag = "services",
    responses(
        (status = 200, description = "Bookable services ordered by start time", body = Vec<ServiceView>)
    )
)]
pub async fn current_services(State(state): State<AppState>) -> AppResult<Json<Vec<ServiceView>>> {
    let services = state.services.catalog.current_services(Utc::now()).await?;
    Ok(Json(views(services)))
}

/// List all services with their occupancy
#[utoipa::path(
    get,
    path = "/services",
    tag = "services",
    security(("admin_token" = [])),
    params(ServiceQuery),
    responses(
        (status = 200, description = "Services list", body = Vec<ServiceView>),
        (status = 403, description = "Operator token required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_services(
    State(state): State<AppState>,
    _admin: Admin,
    Query(query): Query<ServiceQuery>,
) -> AppResult<Json<Vec<ServiceView>>> {
    let services = state
        .services
        .catalog
        .list(Utc::now(), query.upcoming.unwrap_or(false))
        .await?;
    Ok(Json(views(services)))
}

/// Get service by ID
#[utoipa::path(
    get,
    path = "/services/{id}",
    tag = "services",
    params(("id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service details", body = ServiceView),
        (status = 404, description = "Service not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ServiceView>> {
    let service = state.services.catalog.get_by_id(id).await?;
    Ok(Json(service.into()))
}

/// Create a service
#[utoipa::path(
    post,
    path = "/services",
    tag = "services",
    security(("admin_token" = [])),
    request_body = CreateService,
    responses(
        (status = 201, description = "Service created", body = ServiceView),
        (status = 400, description = "Invalid window or capacity", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_service(
    State(state): State<AppState>,
    _admin: Admin,
    Json(data): Json<CreateService>,
) -> AppResult<(StatusCode, Json<ServiceView>)> {
    let service = state.services.catalog.create(&data).await?;
    Ok((StatusCode::CREATED, Json(service.into())))
}

/// Delete a service and its visitors
#[utoipa::path(
    delete,
    path = "/services/{id}",
    tag = "services",
    security(("admin_token" = [])),
    params(("id" = i32, Path, description = "Service ID")),
    responses(
        (status = 204, description = "Service deleted"),
        (status = 404, description = "Service not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_service(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Plan recurring weekly services
#[utoipa::path(
    post,
    path = "/services/weekly",
    tag = "services",
    security(("admin_token" = [])),
    request_body = WeeklyPlan,
    responses(
        (status = 201, description = "Services created", body = Vec<ServiceView>)
    )
)]
pub async fn create_weekly_services(
    State(state): State<AppState>,
    _admin: Admin,
    Json(plan): Json<WeeklyPlan>,
) -> AppResult<(StatusCode, Json<Vec<ServiceView>>)> {
    let services = state
        .services
        .catalog
        .create_weekly_services(Utc::now(), &plan)
        .await?;
    Ok((StatusCode::CREATED, Json(views(services))))
}

/// Set the capacity of every upcoming service
#[utoipa::path(
    put,
    path = "/services/capacity",
    tag = "services",
    security(("admin_token" = [])),
    request_body = AdjustCapacity,
    responses(
        (status = 200, description = "Capacity adjusted", body = CapacityAdjustment)
    )
)]
pub async fn adjust_capacity(
    State(state): State<AppState>,
    _admin: Admin,
    Json(data): Json<AdjustCapacity>,
) -> AppResult<Json<CapacityAdjustment>> {
    let adjustment = state
        .services
        .catalog
        .adjust_future_capacity(Utc::now(), data.number_of_allowed_visitors)
        .await?;
    Ok(Json(adjustment))
}

/// Close registration a fixed time before every upcoming service
#[utoipa::path(
    put,
    path = "/services/registration-ends",
    tag = "services",
    security(("admin_token" = [])),
    request_body = AdjustRegistrationEnds,
    responses(
        (status = 200, description = "Registration ends adjusted", body = RegistrationEndsAdjustment)
    )
)]
pub async fn adjust_registration_ends(
    State(state): State<AppState>,
    _admin: Admin,
    Json(data): Json<AdjustRegistrationEnds>,
) -> AppResult<Json<RegistrationEndsAdjustment>> {
    let updated = state
        .services
        .catalog
        .adjust_future_registration_ends(Utc::now(), &data)
        .await?;
    Ok(Json(RegistrationEndsAdjustment { updated }))
}
