//! API handlers for the registration REST endpoints

pub mod catalog;
pub mod health;
pub mod openapi;
pub mod retention;
pub mod texts;
pub mod visitors;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// Header carrying the operator token
pub const TOKEN_HEADER: &str = "Token";

/// Whether the request headers carry the configured operator token
pub fn is_admin(headers: &HeaderMap, admin_token: &str) -> bool {
    if admin_token.is_empty() {
        return false;
    }
    headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |token| token == admin_token)
}

/// Extractor guarding operator-only endpoints
pub struct Admin;

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if is_admin(&parts.headers, &state.config.auth.admin_token) {
            Ok(Admin)
        } else {
            Err(AppError::Authorization("Operator token required".to_string()))
        }
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Services
        .route("/services/current", get(catalog::current_services))
        .route("/services/weekly", post(catalog::create_weekly_services))
        .route("/services/capacity", put(catalog::adjust_capacity))
        .route("/services/registration-ends", put(catalog::adjust_registration_ends))
        .route(
            "/services",
            get(catalog::list_services).post(catalog::create_service),
        )
        .route(
            "/services/:id",
            get(catalog::get_service).delete(catalog::delete_service),
        )
        .route(
            "/services/:id/anonymous-visitors",
            post(visitors::create_anonymous_visitor),
        )
        // Visitors
        .route("/registrations", post(visitors::register))
        .route("/visitors", get(visitors::list_visitors))
        .route("/visitors/:id", get(visitors::get_visitor))
        // Texts
        .route("/texts", get(texts::list_texts))
        .route("/texts/merge", post(texts::merge_texts))
        .route("/texts/seed", post(texts::seed_texts))
        .route("/texts/:key", put(texts::set_text))
        // Retention
        .route("/retention/run", post(retention::run))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
