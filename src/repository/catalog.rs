//! Services repository (the bookable catalog)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        service::{CapacityAdjustment, CreateService},
        Service,
    },
};

use super::ServiceStore;

/// Service columns with the derived occupancy
pub(crate) const SERVICE_SELECT: &str = r#"
    SELECT s.id, s.service_starts_at, s.registration_starts_at, s.registration_ends_at,
           s.number_of_allowed_visitors, s.no_date_conflict, s.additional_info, s.is_anonymized,
           (SELECT COUNT(*) FROM visitors v WHERE v.service_id = s.id) AS number_of_visitors
    FROM services s
"#;

#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceStore for CatalogRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list(&self, starting_after: Option<DateTime<Utc>>) -> AppResult<Vec<Service>> {
        let rows = match starting_after {
            Some(after) => {
                let q = format!(
                    "{} WHERE s.service_starts_at > $1 ORDER BY s.service_starts_at, s.id",
                    SERVICE_SELECT
                );
                sqlx::query_as::<_, Service>(&q)
                    .bind(after)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let q = format!("{} ORDER BY s.service_starts_at, s.id", SERVICE_SELECT);
                sqlx::query_as::<_, Service>(&q).fetch_all(&self.pool).await?
            }
        };
        Ok(rows)
    }

    async fn bookable_at(&self, now: DateTime<Utc>) -> AppResult<Vec<Service>> {
        let q = format!(
            r#"{}
            WHERE s.registration_starts_at < $1
              AND s.registration_ends_at > $1
              AND s.service_starts_at > $1
            ORDER BY s.service_starts_at, s.id
            "#,
            SERVICE_SELECT
        );
        let rows = sqlx::query_as::<_, Service>(&q)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Service> {
        let q = format!("{} WHERE s.id = $1", SERVICE_SELECT);
        sqlx::query_as::<_, Service>(&q)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::service_not_found(id))
    }

    async fn create(&self, data: &CreateService) -> AppResult<Service> {
        let row = sqlx::query_as::<_, Service>(
            r#"
            WITH inserted AS (
                INSERT INTO services (
                    service_starts_at, registration_starts_at, registration_ends_at,
                    number_of_allowed_visitors, no_date_conflict, additional_info
                ) VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT inserted.id, inserted.service_starts_at, inserted.registration_starts_at,
                   inserted.registration_ends_at, inserted.number_of_allowed_visitors,
                   inserted.no_date_conflict, inserted.additional_info, inserted.is_anonymized,
                   0::bigint AS number_of_visitors
            FROM inserted
            "#,
        )
        .bind(data.service_starts_at)
        .bind(data.registration_starts_at)
        .bind(data.registration_ends_at)
        .bind(data.number_of_allowed_visitors)
        .bind(data.no_date_conflict)
        .bind(&data.additional_info)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::service_not_found(id));
        }
        Ok(())
    }

    async fn set_future_capacity(
        &self,
        now: DateTime<Utc>,
        capacity: i32,
    ) -> AppResult<CapacityAdjustment> {
        let mut tx = self.pool.begin().await?;

        // Same lock order as admission (ascending id)
        let locked: Vec<i32> = sqlx::query_scalar(
            "SELECT id FROM services WHERE service_starts_at > $1 ORDER BY id FOR UPDATE",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let updated: Vec<i32> = sqlx::query_scalar(
            r#"
            UPDATE services s SET number_of_allowed_visitors = $2
            WHERE s.id = ANY($1)
              AND (SELECT COUNT(*) FROM visitors v WHERE v.service_id = s.id) <= $2
            RETURNING s.id
            "#,
        )
        .bind(&locked)
        .bind(capacity)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut updated = updated;
        updated.sort_unstable();
        let skipped = locked
            .into_iter()
            .filter(|id| updated.binary_search(id).is_err())
            .collect();
        Ok(CapacityAdjustment { updated, skipped })
    }

    async fn set_future_registration_ends(
        &self,
        now: DateTime<Utc>,
        lead: chrono::Duration,
    ) -> AppResult<Vec<i32>> {
        let mut ids: Vec<i32> = sqlx::query_scalar(
            r#"
            UPDATE services
            SET registration_ends_at = service_starts_at - ($2::double precision * INTERVAL '1 second')
            WHERE service_starts_at > $1
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(lead.num_seconds())
        .fetch_all(&self.pool)
        .await?;
        ids.sort_unstable();
        Ok(ids)
    }
}
