//! Registration and visitor API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        visitor::{RegisterVisitor, RegistrationResponse, VisitorQuery},
        Visitor,
    },
    AppState,
};

use super::Admin;

/// Register a visitor for one or more services
#[utoipa::path(
    post,
    path = "/registrations",
    tag = "visitors",
    request_body = RegisterVisitor,
    responses(
        (status = 201, description = "Visitor registered for every requested service", body = RegistrationResponse),
        (status = 400, description = "Invalid personal data or service list", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown service", body = crate::error::ErrorResponse),
        (status = 409, description = "Registration closed, no seats left or date conflict", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterVisitor>,
) -> AppResult<(StatusCode, Json<RegistrationResponse>)> {
    let visitors = state
        .services
        .admission
        .register_visitor(request.personal, request.service_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(RegistrationResponse { visitors })))
}

/// Reserve a walk-in seat without personal data
#[utoipa::path(
    post,
    path = "/services/{id}/anonymous-visitors",
    tag = "visitors",
    security(("admin_token" = [])),
    params(("id" = i32, Path, description = "Service ID")),
    responses(
        (status = 201, description = "Anonymous visitor created", body = Visitor),
        (status = 409, description = "No seats left", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_anonymous_visitor(
    State(state): State<AppState>,
    _admin: Admin,
    Path(service_id): Path<i32>,
) -> AppResult<(StatusCode, Json<Visitor>)> {
    let visitor = state
        .services
        .admission
        .create_anonymous_visitor(service_id)
        .await?;
    Ok((StatusCode::CREATED, Json(visitor)))
}

/// List visitors, optionally for one service
#[utoipa::path(
    get,
    path = "/visitors",
    tag = "visitors",
    security(("admin_token" = [])),
    params(VisitorQuery),
    responses(
        (status = 200, description = "Visitors list", body = Vec<Visitor>)
    )
)]
pub async fn list_visitors(
    State(state): State<AppState>,
    _admin: Admin,
    Query(query): Query<VisitorQuery>,
) -> AppResult<Json<Vec<Visitor>>> {
    let visitors = state.services.admission.list_visitors(query.service_id).await?;
    Ok(Json(visitors))
}

/// Get visitor by ID
#[utoipa::path(
    get,
    path = "/visitors/{id}",
    tag = "visitors",
    security(("admin_token" = [])),
    params(("id" = Uuid, Path, description = "Visitor ID")),
    responses(
        (status = 200, description = "Visitor details", body = Visitor),
        (status = 404, description = "Visitor not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_visitor(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Visitor>> {
    let visitor = state.services.admission.get_visitor(id).await?;
    Ok(Json(visitor))
}
