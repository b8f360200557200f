//! Service model (scheduled events with limited seating)

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Service record together with its derived occupancy
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: i32,
    /// When the event takes place
    pub service_starts_at: DateTime<Utc>,
    /// Registration window opens
    pub registration_starts_at: DateTime<Utc>,
    /// Registration window closes
    pub registration_ends_at: DateTime<Utc>,
    /// Capacity
    pub number_of_allowed_visitors: i32,
    /// Exempt from same-day conflict checks
    pub no_date_conflict: bool,
    pub additional_info: Option<String>,
    pub is_anonymized: bool,
    /// Count of visitors referencing this service
    pub number_of_visitors: i64,
}

impl Service {
    /// Remaining seats. Never negative while capacity is enforced under the service lock.
    pub fn free_places(&self) -> i64 {
        i64::from(self.number_of_allowed_visitors) - self.number_of_visitors
    }

    /// Whether a registration made at `now` falls inside the window.
    ///
    /// Same rule for every admission path: window bounds inclusive, and never
    /// once the service has started.
    pub fn accepts_registrations_at(&self, now: DateTime<Utc>) -> bool {
        self.registration_starts_at <= now
            && now <= self.registration_ends_at
            && now < self.service_starts_at
    }

    /// Whether the service is offered as a bookable option at `now`.
    ///
    /// Strict interior of [`Service::accepts_registrations_at`], so anything
    /// listed can still be booked barring capacity.
    pub fn is_bookable_at(&self, now: DateTime<Utc>) -> bool {
        self.registration_starts_at < now
            && now < self.registration_ends_at
            && now < self.service_starts_at
    }

    /// Calendar date of the service in the given time zone
    pub fn local_date(&self, tz: &Tz) -> NaiveDate {
        self.service_starts_at.with_timezone(tz).date_naive()
    }
}

/// Service with its free places, as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: Service,
    pub free_places: i64,
}

impl From<Service> for ServiceView {
    fn from(service: Service) -> Self {
        let free_places = service.free_places();
        Self {
            service,
            free_places,
        }
    }
}

/// Create service request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateService {
    pub service_starts_at: DateTime<Utc>,
    pub registration_starts_at: DateTime<Utc>,
    pub registration_ends_at: DateTime<Utc>,
    pub number_of_allowed_visitors: i32,
    #[serde(default)]
    pub no_date_conflict: bool,
    pub additional_info: Option<String>,
}

impl CreateService {
    /// Check window ordering and capacity
    pub fn check(&self) -> Result<(), String> {
        if self.number_of_allowed_visitors < 0 {
            return Err("numberOfAllowedVisitors must not be negative".to_string());
        }
        if self.registration_starts_at > self.registration_ends_at {
            return Err("registrationStartsAt must not be after registrationEndsAt".to_string());
        }
        if self.registration_ends_at > self.service_starts_at {
            return Err("registrationEndsAt must not be after serviceStartsAt".to_string());
        }
        Ok(())
    }
}

/// Query parameters for listing services
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ServiceQuery {
    /// Only services starting after now
    pub upcoming: Option<bool>,
}

fn default_weekday() -> Weekday {
    Weekday::Sun
}

fn default_weeks() -> u32 {
    53
}

/// Recurring weekly service plan
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    /// Capacity of each created service
    pub number_of_allowed_visitors: i32,
    /// Local time the service starts (HH:MM:SS)
    #[schema(value_type = String, example = "10:30:00")]
    pub service_start: NaiveTime,
    /// Local time registration opens, seven days before the service date
    #[schema(value_type = String, example = "12:00:00")]
    pub registration_start: NaiveTime,
    /// Local time registration closes on the service date
    #[schema(value_type = String, example = "09:30:00")]
    pub registration_end: NaiveTime,
    #[serde(default = "default_weekday")]
    #[schema(value_type = String, example = "Sun")]
    pub weekday: Weekday,
    /// How many weeks ahead to plan
    #[serde(default = "default_weeks")]
    pub weeks: u32,
    pub additional_info: Option<String>,
    /// Create services even on dates that already have one
    #[serde(default)]
    pub add: bool,
}

/// Set the capacity of all upcoming services
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustCapacity {
    pub number_of_allowed_visitors: i32,
}

/// Result of a capacity adjustment
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapacityAdjustment {
    pub updated: Vec<i32>,
    /// Services left unchanged because occupancy exceeds the requested capacity
    pub skipped: Vec<i32>,
}

fn default_lead_minutes() -> i64 {
    75
}

/// Close registration a fixed time before each upcoming service
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRegistrationEnds {
    /// Minutes between registration end and service start
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: i64,
}

/// Services whose registration end was moved
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationEndsAdjustment {
    pub updated: Vec<i32>,
}
