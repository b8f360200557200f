//! In-memory store used by tests and local development.
//!
//! One async mutex guards all state, so `admit` holds the equivalent of every
//! service lock from occupancy read to insert.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        service::{CapacityAdjustment, CreateService},
        visitor::ScrubbedIdentity,
        NewVisitor, Service, Text, TextMap, Visitor,
    },
};

use super::{RetentionStore, ServiceStore, TextStore, VisitorStore};

#[derive(Default)]
struct State {
    next_service_id: i32,
    next_text_id: i32,
    services: BTreeMap<i32, Service>,
    visitors: Vec<Visitor>,
    texts: BTreeMap<String, Text>,
}

impl State {
    fn occupancy(&self, service_id: i32) -> i64 {
        self.visitors
            .iter()
            .filter(|v| v.service_id == service_id)
            .count() as i64
    }

    fn with_occupancy(&self, service: &Service) -> Service {
        Service {
            number_of_visitors: self.occupancy(service.id),
            ..service.clone()
        }
    }

    fn services_by_start<F>(&self, filter: F) -> Vec<Service>
    where
        F: Fn(&Service) -> bool,
    {
        let mut rows: Vec<Service> = self
            .services
            .values()
            .filter(|s| filter(s))
            .map(|s| self.with_occupancy(s))
            .collect();
        rows.sort_by_key(|s| (s.service_starts_at, s.id));
        rows
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().await
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn list(&self, starting_after: Option<DateTime<Utc>>) -> AppResult<Vec<Service>> {
        let state = self.lock().await;
        Ok(state.services_by_start(|s| {
            starting_after.map_or(true, |after| s.service_starts_at > after)
        }))
    }

    async fn bookable_at(&self, now: DateTime<Utc>) -> AppResult<Vec<Service>> {
        let state = self.lock().await;
        Ok(state.services_by_start(|s| s.is_bookable_at(now)))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Service> {
        let state = self.lock().await;
        state
            .services
            .get(&id)
            .map(|s| state.with_occupancy(s))
            .ok_or_else(|| AppError::service_not_found(id))
    }

    async fn create(&self, data: &CreateService) -> AppResult<Service> {
        let mut state = self.lock().await;
        state.next_service_id += 1;
        let service = Service {
            id: state.next_service_id,
            service_starts_at: data.service_starts_at,
            registration_starts_at: data.registration_starts_at,
            registration_ends_at: data.registration_ends_at,
            number_of_allowed_visitors: data.number_of_allowed_visitors,
            no_date_conflict: data.no_date_conflict,
            additional_info: data.additional_info.clone(),
            is_anonymized: false,
            number_of_visitors: 0,
        };
        state.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.lock().await;
        if state.services.remove(&id).is_none() {
            return Err(AppError::service_not_found(id));
        }
        state.visitors.retain(|v| v.service_id != id);
        Ok(())
    }

    async fn set_future_capacity(
        &self,
        now: DateTime<Utc>,
        capacity: i32,
    ) -> AppResult<CapacityAdjustment> {
        let mut state = self.lock().await;
        let future: Vec<i32> = state
            .services
            .values()
            .filter(|s| s.service_starts_at > now)
            .map(|s| s.id)
            .collect();

        let mut adjustment = CapacityAdjustment::default();
        for id in future {
            if state.occupancy(id) > i64::from(capacity) {
                adjustment.skipped.push(id);
            } else if let Some(service) = state.services.get_mut(&id) {
                service.number_of_allowed_visitors = capacity;
                adjustment.updated.push(id);
            }
        }
        Ok(adjustment)
    }

    async fn set_future_registration_ends(
        &self,
        now: DateTime<Utc>,
        lead: chrono::Duration,
    ) -> AppResult<Vec<i32>> {
        let mut state = self.lock().await;
        let future: Vec<(i32, DateTime<Utc>)> = state
            .services
            .values()
            .filter(|s| s.service_starts_at > now)
            .map(|s| {
                s.service_starts_at
                    .checked_sub_signed(lead)
                    .map(|ends| (s.id, ends))
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "Registration end of service {} is out of range",
                            s.id
                        ))
                    })
            })
            .collect::<AppResult<_>>()?;

        // All ends are computed before any is written
        let mut updated = Vec::with_capacity(future.len());
        for (id, ends) in future {
            if let Some(service) = state.services.get_mut(&id) {
                service.registration_ends_at = ends;
                updated.push(id);
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl VisitorStore for MemoryStore {
    async fn admit(
        &self,
        service_ids: &[i32],
        plan: &(dyn for<'s> Fn(&'s [Service]) -> AppResult<Vec<NewVisitor>> + Send + Sync),
    ) -> AppResult<Vec<Visitor>> {
        let mut state = self.lock().await;

        let mut ids = service_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let services: Vec<Service> = ids
            .iter()
            .filter_map(|id| state.services.get(id))
            .map(|s| state.with_occupancy(s))
            .collect();

        let new_visitors = plan(&services)?;

        // Plans are only ever built from the locked services.
        if let Some(unknown) = new_visitors
            .iter()
            .find(|v| !state.services.contains_key(&v.service_id))
        {
            return Err(AppError::service_not_found(unknown.service_id));
        }

        let created: Vec<Visitor> = new_visitors.into_iter().map(NewVisitor::into_visitor).collect();
        state.visitors.extend(created.iter().cloned());
        Ok(created)
    }

    async fn list(&self, service_id: Option<i32>) -> AppResult<Vec<Visitor>> {
        let state = self.lock().await;
        let mut rows: Vec<Visitor> = state
            .visitors
            .iter()
            .filter(|v| service_id.map_or(true, |id| v.service_id == id))
            .cloned()
            .collect();
        if service_id.is_none() {
            rows.sort_by_key(|v| v.service_id);
        }
        Ok(rows)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Visitor> {
        let state = self.lock().await;
        state
            .visitors
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Visitor {} not found", id)))
    }
}

#[async_trait]
impl RetentionStore for MemoryStore {
    async fn due_for_anonymization(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Service>> {
        let state = self.lock().await;
        Ok(state.services_by_start(|s| s.service_starts_at <= cutoff && !s.is_anonymized))
    }

    async fn pending_visitors(&self, service_id: i32) -> AppResult<Vec<Visitor>> {
        let state = self.lock().await;
        Ok(state
            .visitors
            .iter()
            .filter(|v| v.service_id == service_id && !v.is_anonymized)
            .cloned()
            .collect())
    }

    async fn scrub_visitor(&self, visitor_id: Uuid, identity: &ScrubbedIdentity) -> AppResult<()> {
        let mut state = self.lock().await;
        if let Some(visitor) = state
            .visitors
            .iter_mut()
            .find(|v| v.id == visitor_id && !v.is_anonymized)
        {
            visitor.name = identity.name.clone();
            visitor.surname.clear();
            visitor.street.clear();
            visitor.zip.clear();
            visitor.city.clear();
            visitor.phone.clear();
            visitor.email.clear();
            visitor.additional_data = serde_json::Value::Object(Default::default());
            visitor.is_anonymized = true;
        }
        Ok(())
    }

    async fn mark_anonymized(&self, service_id: i32) -> AppResult<bool> {
        let mut state = self.lock().await;
        let pending = state
            .visitors
            .iter()
            .any(|v| v.service_id == service_id && !v.is_anonymized);
        match state.services.get_mut(&service_id) {
            Some(service) if !pending => {
                service.is_anonymized = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TextStore for MemoryStore {
    async fn all(&self) -> AppResult<Vec<Text>> {
        let state = self.lock().await;
        Ok(state.texts.values().cloned().collect())
    }

    async fn replace(&self, entries: &TextMap) -> AppResult<()> {
        let mut state = self.lock().await;
        for (key, value) in entries {
            state.next_text_id += 1;
            let text = Text {
                id: state.next_text_id,
                key: key.clone(),
                value: value.clone(),
            };
            state.texts.insert(key.clone(), text);
        }
        Ok(())
    }

    async fn add_missing(&self, defaults: &TextMap) -> AppResult<TextMap> {
        let mut state = self.lock().await;
        let persisted: TextMap = state
            .texts
            .values()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect();

        for (key, value) in defaults {
            if persisted.contains_key(key) {
                continue;
            }
            state.next_text_id += 1;
            let text = Text {
                id: state.next_text_id,
                key: key.clone(),
                value: value.clone(),
            };
            state.texts.insert(key.clone(), text);
        }
        Ok(persisted)
    }

    async fn set(&self, key: &str, value: Option<&str>) -> AppResult<Text> {
        let mut state = self.lock().await;
        let existing = state.texts.get(key).map(|t| t.id);
        let id = match existing {
            Some(id) => id,
            None => {
                state.next_text_id += 1;
                state.next_text_id
            }
        };
        let text = Text {
            id,
            key: key.to_string(),
            value: value.map(str::to_string),
        };
        state.texts.insert(key.to_string(), text.clone());
        Ok(text)
    }
}
