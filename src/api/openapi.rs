//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{catalog, health, retention, texts, visitors};

/// Registers the operator token header scheme
struct AdminTokenAddon;

impl Modify for AdminTokenAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(super::TOKEN_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Registration API",
        version = "1.0.0",
        description = "Seat registration for scheduled services",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Services
        catalog::current_services,
        catalog::list_services,
        catalog::get_service,
        catalog::create_service,
        catalog::delete_service,
        catalog::create_weekly_services,
        catalog::adjust_capacity,
        catalog::adjust_registration_ends,
        // Visitors
        visitors::register,
        visitors::create_anonymous_visitor,
        visitors::list_visitors,
        visitors::get_visitor,
        // Texts
        texts::list_texts,
        texts::set_text,
        texts::merge_texts,
        texts::seed_texts,
        // Retention
        retention::run,
    ),
    components(
        schemas(
            // Services
            crate::models::service::Service,
            crate::models::service::ServiceView,
            crate::models::service::CreateService,
            crate::models::service::ServiceQuery,
            crate::models::service::WeeklyPlan,
            crate::models::service::AdjustCapacity,
            crate::models::service::CapacityAdjustment,
            crate::models::service::AdjustRegistrationEnds,
            crate::models::service::RegistrationEndsAdjustment,
            // Visitors
            crate::models::visitor::Visitor,
            crate::models::visitor::PersonalData,
            crate::models::visitor::RegisterVisitor,
            crate::models::visitor::RegistrationResponse,
            crate::models::visitor::VisitorQuery,
            // Texts
            crate::models::text::Text,
            crate::models::text::SetText,
            // Retention
            crate::services::retention::AnonymizationReport,
            crate::services::retention::AnonymizationFailure,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&AdminTokenAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "services", description = "Bookable services"),
        (name = "visitors", description = "Registrations and visitors"),
        (name = "texts", description = "Editable texts"),
        (name = "retention", description = "Personal data retention")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
