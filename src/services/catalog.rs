//! Catalog service: bookable services and operator maintenance

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{
    error::{AppError, AppResult},
    models::{
        service::{AdjustRegistrationEnds, CapacityAdjustment, WeeklyPlan},
        CreateService, Service,
    },
    repository::Repository,
};

use super::with_timeout;

/// Days between registration opening and the service date
const REGISTRATION_OPENS_DAYS_BEFORE: u64 = 7;

/// Longest weekly plan accepted (about two years)
pub const MAX_PLANNED_WEEKS: u32 = 106;

/// Longest registration-end lead accepted (one year)
pub const MAX_LEAD_MINUTES: i64 = 366 * 24 * 60;

fn local_instant(tz: &Tz, date: NaiveDate, time: NaiveTime) -> AppResult<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(AppError::Validation(format!(
            "{} {} does not exist in {}",
            date, time, tz
        ))),
    }
}

/// Services for the next `plan.weeks` occurrences of `plan.weekday` after
/// today (local time), skipping dates in `taken` unless `plan.add` is set.
pub fn plan_weekly_services(
    now: DateTime<Utc>,
    tz: &Tz,
    plan: &WeeklyPlan,
    taken: &HashSet<NaiveDate>,
) -> AppResult<Vec<CreateService>> {
    if plan.weeks > MAX_PLANNED_WEEKS {
        return Err(AppError::Validation(format!(
            "weeks must not exceed {}",
            MAX_PLANNED_WEEKS
        )));
    }

    let today = now.with_timezone(tz).date_naive();
    let first = today
        .iter_days()
        .skip(1)
        .find(|d| d.weekday() == plan.weekday)
        .ok_or_else(|| AppError::Internal("Calendar overflow".to_string()))?;

    first
        .iter_weeks()
        .take(plan.weeks as usize)
        .filter(|date| plan.add || !taken.contains(date))
        .map(|date| {
            let opens_on = date
                .checked_sub_days(Days::new(REGISTRATION_OPENS_DAYS_BEFORE))
                .ok_or_else(|| AppError::Internal("Calendar overflow".to_string()))?;
            let service = CreateService {
                service_starts_at: local_instant(tz, date, plan.service_start)?,
                registration_starts_at: local_instant(tz, opens_on, plan.registration_start)?,
                registration_ends_at: local_instant(tz, date, plan.registration_end)?,
                number_of_allowed_visitors: plan.number_of_allowed_visitors,
                no_date_conflict: false,
                additional_info: plan.additional_info.clone().filter(|s| !s.is_empty()),
            };
            service.check().map_err(AppError::Validation)?;
            Ok(service)
        })
        .collect()
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    tz: Tz,
    timeout: Duration,
}

impl CatalogService {
    pub fn new(repository: Repository, tz: Tz, timeout: Duration) -> Self {
        Self {
            repository,
            tz,
            timeout,
        }
    }

    /// All services, or only those starting after `now` when `upcoming`
    pub async fn list(&self, now: DateTime<Utc>, upcoming: bool) -> AppResult<Vec<Service>> {
        let after = upcoming.then_some(now);
        with_timeout(self.timeout, self.repository.services.list(after)).await
    }

    /// Services open for registration at `now`, ordered by start time
    pub async fn current_services(&self, now: DateTime<Utc>) -> AppResult<Vec<Service>> {
        with_timeout(self.timeout, self.repository.services.bookable_at(now)).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Service> {
        with_timeout(self.timeout, self.repository.services.get_by_id(id)).await
    }

    pub async fn create(&self, data: &CreateService) -> AppResult<Service> {
        data.check().map_err(AppError::Validation)?;
        let service = with_timeout(self.timeout, self.repository.services.create(data)).await?;
        tracing::info!(service_id = service.id, starts_at = %service.service_starts_at, "Service created");
        Ok(service)
    }

    /// Delete a service together with its visitors
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        with_timeout(self.timeout, self.repository.services.delete(id)).await?;
        tracing::info!(service_id = id, "Service deleted");
        Ok(())
    }

    /// Create recurring services according to `plan`
    pub async fn create_weekly_services(
        &self,
        now: DateTime<Utc>,
        plan: &WeeklyPlan,
    ) -> AppResult<Vec<Service>> {
        if plan.number_of_allowed_visitors < 0 {
            return Err(AppError::Validation(
                "numberOfAllowedVisitors must not be negative".to_string(),
            ));
        }

        let upcoming = self.list(now, true).await?;
        let taken: HashSet<NaiveDate> = upcoming.iter().map(|s| s.local_date(&self.tz)).collect();
        let planned = plan_weekly_services(now, &self.tz, plan, &taken)?;

        let mut created = Vec::with_capacity(planned.len());
        for data in &planned {
            created.push(with_timeout(self.timeout, self.repository.services.create(data)).await?);
        }
        tracing::info!(created = created.len(), "Weekly services created");
        Ok(created)
    }

    /// Set the capacity of every upcoming service
    pub async fn adjust_future_capacity(
        &self,
        now: DateTime<Utc>,
        capacity: i32,
    ) -> AppResult<CapacityAdjustment> {
        if capacity < 0 {
            return Err(AppError::Validation(
                "numberOfAllowedVisitors must not be negative".to_string(),
            ));
        }
        let adjustment = with_timeout(
            self.timeout,
            self.repository.services.set_future_capacity(now, capacity),
        )
        .await?;
        if !adjustment.skipped.is_empty() {
            tracing::warn!(
                skipped = ?adjustment.skipped,
                capacity,
                "Capacity not lowered below current occupancy"
            );
        }
        Ok(adjustment)
    }

    /// Close registration `lead` before each upcoming service
    pub async fn adjust_future_registration_ends(
        &self,
        now: DateTime<Utc>,
        request: &AdjustRegistrationEnds,
    ) -> AppResult<Vec<i32>> {
        if !(0..=MAX_LEAD_MINUTES).contains(&request.lead_minutes) {
            return Err(AppError::Validation(format!(
                "leadMinutes must be between 0 and {}",
                MAX_LEAD_MINUTES
            )));
        }
        let lead = chrono::Duration::try_minutes(request.lead_minutes)
            .ok_or_else(|| AppError::Validation("leadMinutes is out of range".to_string()))?;
        let updated = with_timeout(
            self.timeout,
            self.repository.services.set_future_registration_ends(now, lead),
        )
        .await?;
        tracing::info!(updated = updated.len(), lead_minutes = request.lead_minutes, "Registration ends adjusted");
        Ok(updated)
    }
}
