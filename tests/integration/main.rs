//! Integration tests driving the HTTP router against the in-memory store

mod api_tests;
mod concurrency_tests;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use registration_server::{
    api,
    config::{
        AppConfig, AuthConfig, DatabaseBackend, DatabaseConfig, LoggingConfig, RegistrationConfig,
        RetentionConfig, ServerConfig, TextsConfig,
    },
    models::CreateService,
    repository::{memory::MemoryStore, Repository},
    services::Services,
    AppState,
};

pub const ADMIN_TOKEN: &str = "test-token";

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            backend: DatabaseBackend::Memory,
            ..DatabaseConfig::default()
        },
        auth: AuthConfig {
            admin_token: ADMIN_TOKEN.to_string(),
        },
        logging: LoggingConfig::default(),
        registration: RegistrationConfig::default(),
        retention: RetentionConfig::default(),
        texts: TextsConfig::default(),
    }
}

/// Router and service handles sharing one in-memory store
pub fn test_app() -> (Router, Arc<Services>) {
    let config = test_config();
    let repository = Repository::from_memory(Arc::new(MemoryStore::new()));
    let services = Arc::new(Services::new(repository, &config).expect("services"));
    let state = AppState {
        config: Arc::new(config),
        services: services.clone(),
    };
    (api::router(state), services)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

pub fn admin_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("Token", ADMIN_TOKEN)
        .body(Body::empty())
        .expect("request")
}

pub fn json_request(method: &str, uri: &str, body: &Value, admin: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if admin {
        builder = builder.header("Token", ADMIN_TOKEN);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// Local time `days` from today in the registration time zone
pub fn local_at(days: u64, hour: u32) -> DateTime<Utc> {
    let tz = chrono_tz::Europe::Berlin;
    let date = Utc::now()
        .with_timezone(&tz)
        .date_naive()
        .checked_add_days(Days::new(days))
        .expect("date");
    let time = NaiveTime::from_hms_opt(hour, 0, 0).expect("time");
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .expect("local time")
        .with_timezone(&Utc)
}

/// A service open for registration right now
pub fn open_service(starts_at: DateTime<Utc>, capacity: i32) -> CreateService {
    CreateService {
        service_starts_at: starts_at,
        registration_starts_at: Utc::now() - chrono::Duration::days(1),
        registration_ends_at: starts_at - chrono::Duration::hours(1),
        number_of_allowed_visitors: capacity,
        no_date_conflict: false,
        additional_info: None,
    }
}

pub fn personal_data(name: &str, service_ids: &[i32]) -> Value {
    serde_json::json!({
        "name": name,
        "surname": "Muster",
        "street": "Hauptstraße 1",
        "zip": "51643",
        "city": "Gummersbach",
        "phone": "02261 123456",
        "email": "visitor@example.org",
        "serviceIds": service_ids,
    })
}
