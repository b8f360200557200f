//! Admission engine: all-or-nothing visitor registration

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{NewVisitor, PersonalData, Service, Visitor},
    repository::Repository,
};

use super::with_timeout;

/// Check a registration batch against the current state of its services.
///
/// Rules run per requested id, in request order, and the first violation is
/// returned: existence, open window, a free seat, then the same-day rule.
/// Services flagged `no_date_conflict` are neither checked against nor added
/// to the set of dates already taken by the batch, so every pair of unflagged
/// services must fall on distinct dates regardless of flagged ones around them.
pub fn evaluate_batch(
    now: DateTime<Utc>,
    tz: &Tz,
    requested: &[i32],
    services: &[Service],
) -> AppResult<()> {
    let by_id: HashMap<i32, &Service> = services.iter().map(|s| (s.id, s)).collect();

    requested
        .iter()
        .try_fold(HashMap::<NaiveDate, i32>::new(), |mut taken, &id| {
            let service = by_id
                .get(&id)
                .ok_or_else(|| AppError::service_not_found(id))?;

            if !service.accepts_registrations_at(now) {
                return Err(AppError::WindowClosed { service_id: id });
            }

            if service.free_places() <= 0 {
                return Err(AppError::CapacityExceeded { service_id: id });
            }

            if !service.no_date_conflict {
                let date = service.local_date(tz);
                if let Some(&earlier) = taken.get(&date) {
                    return Err(AppError::DateConflict {
                        service_id: id,
                        conflicting_with: earlier,
                        date,
                    });
                }
                taken.insert(date, id);
            }

            Ok(taken)
        })
        .map(|_| ())
}

/// Reject malformed registration input before touching the store
pub fn check_request(personal: &PersonalData, service_ids: &[i32]) -> AppResult<()> {
    if service_ids.is_empty() {
        return Err(AppError::Validation(
            "At least one service must be selected".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(service_ids.len());
    if let Some(duplicate) = service_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::Validation(format!(
            "Service {} selected more than once",
            duplicate
        )));
    }

    personal.validate()?;
    Ok(())
}

#[derive(Clone)]
pub struct AdmissionService {
    repository: Repository,
    tz: Tz,
    timeout: Duration,
}

impl AdmissionService {
    pub fn new(repository: Repository, tz: Tz, timeout: Duration) -> Self {
        Self {
            repository,
            tz,
            timeout,
        }
    }

    /// Same service with a different per-call deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register one visitor for every service in `service_ids` at the current time
    pub async fn register_visitor(
        &self,
        personal: PersonalData,
        service_ids: Vec<i32>,
    ) -> AppResult<Vec<Visitor>> {
        self.register_visitor_at(Utc::now(), personal, service_ids)
            .await
    }

    /// Register one visitor for every service in `service_ids` as of `now`.
    ///
    /// The batch is evaluated while the services are locked and the visitors
    /// are written in the same unit of work, so either every row is committed
    /// or none is.
    pub async fn register_visitor_at(
        &self,
        now: DateTime<Utc>,
        personal: PersonalData,
        service_ids: Vec<i32>,
    ) -> AppResult<Vec<Visitor>> {
        check_request(&personal, &service_ids)?;

        let tz = self.tz;
        let plan = |services: &[Service]| -> AppResult<Vec<NewVisitor>> {
            evaluate_batch(now, &tz, &service_ids, services)?;
            Ok(service_ids
                .iter()
                .map(|&id| NewVisitor::new(id, personal.clone()))
                .collect())
        };

        let result = with_timeout(
            self.timeout,
            self.repository.visitors.admit(&service_ids, &plan),
        )
        .await;

        match &result {
            Ok(visitors) => tracing::info!(
                services = ?service_ids,
                visitors = visitors.len(),
                "Visitor registered"
            ),
            Err(e) => tracing::debug!(
                services = ?service_ids,
                service_id = ?e.service_id(),
                "Registration rejected: {}",
                e
            ),
        }

        result
    }

    /// Reserve a walk-in seat with placeholder personal data.
    ///
    /// Window and date rules do not apply; capacity still does.
    pub async fn create_anonymous_visitor(&self, service_id: i32) -> AppResult<Visitor> {
        let plan = |services: &[Service]| -> AppResult<Vec<NewVisitor>> {
            let service = services
                .iter()
                .find(|s| s.id == service_id)
                .ok_or_else(|| AppError::service_not_found(service_id))?;
            if service.free_places() <= 0 {
                return Err(AppError::CapacityExceeded { service_id });
            }
            Ok(vec![NewVisitor::new(service_id, PersonalData::anonymous())])
        };

        let mut visitors = with_timeout(
            self.timeout,
            self.repository.visitors.admit(&[service_id], &plan),
        )
        .await?;

        tracing::info!(service_id, "Anonymous visitor created");
        visitors
            .pop()
            .ok_or_else(|| AppError::Internal("Anonymous visitor was not created".to_string()))
    }

    pub async fn list_visitors(&self, service_id: Option<i32>) -> AppResult<Vec<Visitor>> {
        with_timeout(self.timeout, self.repository.visitors.list(service_id)).await
    }

    pub async fn get_visitor(&self, id: uuid::Uuid) -> AppResult<Visitor> {
        with_timeout(self.timeout, self.repository.visitors.get_by_id(id)).await
    }
}
