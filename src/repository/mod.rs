//! Repository layer for persistent state
//!
//! Each concern is a trait so the services layer can run against PostgreSQL
//! in production and against [`memory::MemoryStore`] in tests.

pub mod catalog;
pub mod memory;
pub mod texts;
pub mod visitors;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        service::{CapacityAdjustment, CreateService},
        visitor::ScrubbedIdentity,
        NewVisitor, Service, TextMap, Text, Visitor,
    },
};

/// Read and maintain bookable services
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Check the backing store is reachable
    async fn ping(&self) -> AppResult<()>;

    /// All services ordered by start time
    async fn list(&self, starting_after: Option<DateTime<Utc>>) -> AppResult<Vec<Service>>;

    /// Services open for registration at `now`, ordered by start time
    async fn bookable_at(&self, now: DateTime<Utc>) -> AppResult<Vec<Service>>;

    async fn get_by_id(&self, id: i32) -> AppResult<Service>;

    async fn create(&self, data: &CreateService) -> AppResult<Service>;

    /// Delete a service and, by cascade, its visitors
    async fn delete(&self, id: i32) -> AppResult<()>;

    /// Set capacity of every service starting after `now`, skipping those
    /// whose occupancy already exceeds it
    async fn set_future_capacity(
        &self,
        now: DateTime<Utc>,
        capacity: i32,
    ) -> AppResult<CapacityAdjustment>;

    /// Set `registration_ends_at = service_starts_at - lead` for every service
    /// starting after `now`; returns the updated ids
    async fn set_future_registration_ends(
        &self,
        now: DateTime<Utc>,
        lead: chrono::Duration,
    ) -> AppResult<Vec<i32>>;
}

/// Create and read visitors
#[async_trait]
pub trait VisitorStore: Send + Sync {
    /// Lock `service_ids`, run `plan` against their current state and insert
    /// the visitors it returns, all in one unit of work.
    ///
    /// `plan` receives the locked services, occupancy included, in ascending
    /// id order. Unknown ids are simply absent from that slice. An error from
    /// `plan` aborts the unit of work without writing anything.
    async fn admit(
        &self,
        service_ids: &[i32],
        plan: &(dyn for<'s> Fn(&'s [Service]) -> AppResult<Vec<NewVisitor>> + Send + Sync),
    ) -> AppResult<Vec<Visitor>>;

    async fn list(&self, service_id: Option<i32>) -> AppResult<Vec<Visitor>>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Visitor>;
}

/// Anonymization support
#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Services started at or before `cutoff` that are not anonymized yet
    async fn due_for_anonymization(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Service>>;

    /// Visitors of a service whose personal data is still present
    async fn pending_visitors(&self, service_id: i32) -> AppResult<Vec<Visitor>>;

    /// Blank the personal data of one visitor and flag it anonymized
    async fn scrub_visitor(&self, visitor_id: Uuid, identity: &ScrubbedIdentity) -> AppResult<()>;

    /// Flag a service anonymized; returns false if it still has pending visitors
    async fn mark_anonymized(&self, service_id: i32) -> AppResult<bool>;
}

/// Key/value text storage
#[async_trait]
pub trait TextStore: Send + Sync {
    async fn all(&self) -> AppResult<Vec<Text>>;

    /// Delete and recreate the row of every given key, atomically
    async fn replace(&self, entries: &TextMap) -> AppResult<()>;

    /// Insert every key of `defaults` that is not stored yet, leaving stored
    /// keys untouched, atomically. Returns the texts as they were stored just
    /// before the insert.
    async fn add_missing(&self, defaults: &TextMap) -> AppResult<TextMap>;

    /// Insert or update one key
    async fn set(&self, key: &str, value: Option<&str>) -> AppResult<Text>;
}

/// Store handles shared by all services
#[derive(Clone)]
pub struct Repository {
    pub services: Arc<dyn ServiceStore>,
    pub visitors: Arc<dyn VisitorStore>,
    pub retention: Arc<dyn RetentionStore>,
    pub texts: Arc<dyn TextStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        let visitors = Arc::new(visitors::VisitorsRepository::new(pool.clone()));
        Self {
            services: Arc::new(catalog::CatalogRepository::new(pool.clone())),
            retention: visitors.clone(),
            visitors,
            texts: Arc::new(texts::TextsRepository::new(pool)),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(memory::MemoryStore::default()))
    }

    /// Create a repository sharing an existing in-memory store
    pub fn from_memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            services: store.clone(),
            visitors: store.clone(),
            retention: store.clone(),
            texts: store,
        }
    }
}
