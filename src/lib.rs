//! Registration Server
//!
//! Seat registration for scheduled services: visitors book one or more
//! services with a limited number of places, operators maintain the service
//! calendar, and personal data is anonymized once the retention period ends.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
