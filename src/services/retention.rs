//! Retention job: anonymizes visitors of services past the retention horizon

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{visitor::ScrubbedIdentity, Visitor},
    repository::Repository,
};

use super::with_timeout;

/// One visitor or service that could not be anonymized in this run
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizationFailure {
    pub service_id: i32,
    pub visitor_id: Option<Uuid>,
    pub reason: String,
}

/// Outcome of one anonymization run
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizationReport {
    /// Services flagged anonymized in this run
    pub anonymized_services: Vec<i32>,
    /// Visitors scrubbed in this run
    pub anonymized_visitors: usize,
    pub failures: Vec<AnonymizationFailure>,
}

impl AnonymizationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Hex SHA-256 digest of a visitor's full name
pub fn name_digest(name: &str, surname: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b" ");
    hasher.update(surname.as_bytes());
    hex::encode(hasher.finalize())
}

/// Replacement identity for a visitor
pub fn scrubbed_identity(visitor: &Visitor, hash_names: bool) -> ScrubbedIdentity {
    let name = if hash_names {
        name_digest(&visitor.name, &visitor.surname)
    } else {
        String::new()
    };
    ScrubbedIdentity { name }
}

#[derive(Clone)]
pub struct RetentionService {
    repository: Repository,
    hash_names: bool,
    timeout: Duration,
}

impl RetentionService {
    pub fn new(repository: Repository, hash_names: bool, timeout: Duration) -> Self {
        Self {
            repository,
            hash_names,
            timeout,
        }
    }

    /// Anonymize every service that started at or before `now - retention_period`.
    ///
    /// Services are processed independently. A service is flagged anonymized
    /// only once none of its visitors still carry personal data; otherwise it
    /// is reported and picked up again by the next run.
    pub async fn anonymize_eligible_services(
        &self,
        now: DateTime<Utc>,
        retention_period: chrono::Duration,
    ) -> AppResult<AnonymizationReport> {
        if retention_period < chrono::Duration::zero() {
            return Err(AppError::Validation(
                "Retention period must not be negative".to_string(),
            ));
        }
        let cutoff = now
            .checked_sub_signed(retention_period)
            .ok_or_else(|| AppError::Validation("Retention period is out of range".to_string()))?;
        let due = with_timeout(
            self.timeout,
            self.repository.retention.due_for_anonymization(cutoff),
        )
        .await?;

        let mut report = AnonymizationReport::default();
        for service in due {
            match self.anonymize_service(service.id, &mut report).await {
                Ok(true) => report.anonymized_services.push(service.id),
                Ok(false) => {}
                Err(e) => {
                    let error = AppError::Anonymization(format!("service {}: {}", service.id, e));
                    tracing::warn!(service_id = service.id, "{}", error);
                    report.failures.push(AnonymizationFailure {
                        service_id: service.id,
                        visitor_id: None,
                        reason: error.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            services = report.anonymized_services.len(),
            visitors = report.anonymized_visitors,
            failures = report.failures.len(),
            "Anonymization run finished"
        );
        Ok(report)
    }

    /// Scrub all pending visitors of one service; returns whether the service
    /// could be flagged anonymized.
    async fn anonymize_service(
        &self,
        service_id: i32,
        report: &mut AnonymizationReport,
    ) -> AppResult<bool> {
        let pending = with_timeout(
            self.timeout,
            self.repository.retention.pending_visitors(service_id),
        )
        .await?;

        let mut complete = true;
        for visitor in pending {
            let identity = scrubbed_identity(&visitor, self.hash_names);
            let scrubbed = with_timeout(
                self.timeout,
                self.repository.retention.scrub_visitor(visitor.id, &identity),
            )
            .await;
            match scrubbed {
                Ok(()) => report.anonymized_visitors += 1,
                Err(e) => {
                    tracing::warn!(
                        service_id,
                        visitor_id = %visitor.id,
                        "Visitor anonymization failed: {}",
                        e
                    );
                    report.failures.push(AnonymizationFailure {
                        service_id,
                        visitor_id: Some(visitor.id),
                        reason: e.to_string(),
                    });
                    complete = false;
                }
            }
        }

        if !complete {
            return Ok(false);
        }

        let marked = with_timeout(
            self.timeout,
            self.repository.retention.mark_anonymized(service_id),
        )
        .await?;
        if !marked {
            report.failures.push(AnonymizationFailure {
                service_id,
                visitor_id: None,
                reason: "Service still has visitors with personal data".to_string(),
            });
        }
        Ok(marked)
    }

    /// Run the job every `interval` in the background
    pub fn spawn(self, interval: Duration, retention_period: chrono::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self
                    .anonymize_eligible_services(Utc::now(), retention_period)
                    .await
                {
                    tracing::error!("Anonymization run aborted: {}", e);
                }
            }
        })
    }
}
