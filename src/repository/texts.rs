//! Texts repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Text, TextMap},
};

use super::TextStore;

#[derive(Clone)]
pub struct TextsRepository {
    pool: Pool<Postgres>,
}

impl TextsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TextStore for TextsRepository {
    async fn all(&self) -> AppResult<Vec<Text>> {
        let rows = sqlx::query_as::<_, Text>("SELECT id, key, value FROM texts ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn replace(&self, entries: &TextMap) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in entries {
            sqlx::query("DELETE FROM texts WHERE key = $1")
                .bind(key)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO texts (key, value) VALUES ($1, $2)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_missing(&self, defaults: &TextMap) -> AppResult<TextMap> {
        let mut tx = self.pool.begin().await?;

        // Blocks concurrent set/replace until commit, so the snapshot below
        // stays current while the defaults are inserted.
        sqlx::query("LOCK TABLE texts IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let persisted: TextMap = sqlx::query_as::<_, Text>("SELECT id, key, value FROM texts")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|t| (t.key, t.value))
            .collect();

        for (key, value) in defaults {
            sqlx::query("INSERT INTO texts (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(persisted)
    }

    async fn set(&self, key: &str, value: Option<&str>) -> AppResult<Text> {
        let row = sqlx::query_as::<_, Text>(
            r#"
            INSERT INTO texts (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            RETURNING id, key, value
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
