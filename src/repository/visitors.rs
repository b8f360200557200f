//! Visitors repository: admission commits and anonymization writes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{visitor::ScrubbedIdentity, NewVisitor, Service, Visitor},
};

use super::{catalog::SERVICE_SELECT, RetentionStore, VisitorStore};

const VISITOR_COLUMNS: &str =
    "id, name, surname, street, zip, city, phone, email, additional_data, is_anonymized, service_id";

#[derive(Clone)]
pub struct VisitorsRepository {
    pool: Pool<Postgres>,
}

impl VisitorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitorStore for VisitorsRepository {
    async fn admit(
        &self,
        service_ids: &[i32],
        plan: &(dyn for<'s> Fn(&'s [Service]) -> AppResult<Vec<NewVisitor>> + Send + Sync),
    ) -> AppResult<Vec<Visitor>> {
        let mut ids = service_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        // Row locks serialize every writer of these services' visitors until commit.
        // Ascending id order keeps concurrent batches deadlock free.
        sqlx::query("SELECT id FROM services WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        // Occupancy read under the locks, so it is the value at commit time.
        let q = format!("{} WHERE s.id = ANY($1) ORDER BY s.id", SERVICE_SELECT);
        let services = sqlx::query_as::<_, Service>(&q)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        let new_visitors = plan(&services)?;

        let insert = format!(
            r#"
            INSERT INTO visitors (
                id, name, surname, street, zip, city, phone, email, additional_data, service_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            VISITOR_COLUMNS
        );

        let mut created = Vec::with_capacity(new_visitors.len());
        for visitor in new_visitors {
            let row = sqlx::query_as::<_, Visitor>(&insert)
                .bind(visitor.id)
                .bind(&visitor.personal.name)
                .bind(&visitor.personal.surname)
                .bind(&visitor.personal.street)
                .bind(&visitor.personal.zip)
                .bind(&visitor.personal.city)
                .bind(&visitor.personal.phone)
                .bind(visitor.personal.email.as_deref().unwrap_or_default())
                .bind(&visitor.personal.additional_data)
                .bind(visitor.service_id)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn list(&self, service_id: Option<i32>) -> AppResult<Vec<Visitor>> {
        let rows = match service_id {
            Some(id) => {
                let q = format!(
                    "SELECT {} FROM visitors WHERE service_id = $1 ORDER BY created_at, id",
                    VISITOR_COLUMNS
                );
                sqlx::query_as::<_, Visitor>(&q)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let q = format!(
                    "SELECT {} FROM visitors ORDER BY service_id, created_at, id",
                    VISITOR_COLUMNS
                );
                sqlx::query_as::<_, Visitor>(&q).fetch_all(&self.pool).await?
            }
        };
        Ok(rows)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Visitor> {
        let q = format!("SELECT {} FROM visitors WHERE id = $1", VISITOR_COLUMNS);
        sqlx::query_as::<_, Visitor>(&q)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Visitor {} not found", id)))
    }
}

#[async_trait]
impl RetentionStore for VisitorsRepository {
    async fn due_for_anonymization(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Service>> {
        let q = format!(
            r#"{}
            WHERE s.service_starts_at <= $1 AND s.is_anonymized = false
            ORDER BY s.service_starts_at, s.id
            "#,
            SERVICE_SELECT
        );
        let rows = sqlx::query_as::<_, Service>(&q)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn pending_visitors(&self, service_id: i32) -> AppResult<Vec<Visitor>> {
        let q = format!(
            "SELECT {} FROM visitors WHERE service_id = $1 AND is_anonymized = false ORDER BY id",
            VISITOR_COLUMNS
        );
        let rows = sqlx::query_as::<_, Visitor>(&q)
            .bind(service_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn scrub_visitor(&self, visitor_id: Uuid, identity: &ScrubbedIdentity) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE visitors SET
                name = $2, surname = '', street = '', zip = '', city = '',
                phone = '', email = '', additional_data = '{}'::jsonb,
                is_anonymized = true
            WHERE id = $1 AND is_anonymized = false
            "#,
        )
        .bind(visitor_id)
        .bind(&identity.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_anonymized(&self, service_id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE services s SET is_anonymized = true
            WHERE s.id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM visitors v
                  WHERE v.service_id = s.id AND v.is_anonymized = false
              )
            "#,
        )
        .bind(service_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
