//! Business logic services

pub mod admission;
pub mod catalog;
pub mod retention;
pub mod texts;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub catalog: catalog::CatalogService,
    pub admission: admission::AdmissionService,
    pub retention: retention::RetentionService,
    pub texts: texts::TextsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let tz = config
            .registration
            .tz()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let timeout = config.server.request_timeout();

        Ok(Self {
            catalog: catalog::CatalogService::new(repository.clone(), tz, timeout),
            admission: admission::AdmissionService::new(repository.clone(), tz, timeout),
            retention: retention::RetentionService::new(
                repository.clone(),
                config.retention.hash_names,
                timeout,
            ),
            texts: texts::TextsService::new(repository.clone(), timeout),
            repository,
        })
    }
}

/// Run `fut` until `deadline`.
///
/// On expiry the future is dropped, which rolls back any open transaction it
/// holds.
pub async fn with_deadline<T, F>(deadline: Instant, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout),
    }
}

/// Run `fut` with a deadline `timeout` from now
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    with_deadline(Instant::now() + timeout, fut).await
}
