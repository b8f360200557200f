//! Texts service: default copy merged with administrator edits

use std::path::Path;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::{Text, TextMap},
    repository::Repository,
};

use super::with_timeout;

/// Merge default texts with persisted ones; persisted values always win and
/// persisted-only keys are kept.
pub fn merge_texts(defaults: &TextMap, persisted: &TextMap) -> TextMap {
    let mut merged = defaults.clone();
    merged.extend(persisted.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Read default texts from a JSON object of `key -> string | null`
pub fn load_defaults(path: impl AsRef<Path>) -> AppResult<TextMap> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Internal(format!("Failed to read texts from {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::Validation(format!("Invalid texts file {}: {}", path.display(), e))
    })
}

fn to_map(texts: Vec<Text>) -> TextMap {
    texts.into_iter().map(|t| (t.key, t.value)).collect()
}

fn check_keys(entries: &TextMap) -> AppResult<()> {
    if entries.keys().any(|k| k.trim().is_empty()) {
        return Err(AppError::Validation("Text keys must not be empty".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TextsService {
    repository: Repository,
    timeout: Duration,
}

impl TextsService {
    pub fn new(repository: Repository, timeout: Duration) -> Self {
        Self {
            repository,
            timeout,
        }
    }

    /// All texts as a key to value mapping
    pub async fn all(&self) -> AppResult<TextMap> {
        let texts = with_timeout(self.timeout, self.repository.texts.all()).await?;
        Ok(to_map(texts))
    }

    /// Set a single text (administrator edit)
    pub async fn set(&self, key: &str, value: Option<&str>) -> AppResult<Text> {
        if key.trim().is_empty() {
            return Err(AppError::Validation("Text key must not be empty".to_string()));
        }
        with_timeout(self.timeout, self.repository.texts.set(key, value)).await
    }

    /// Merge `defaults` into the store without overriding existing values.
    ///
    /// Only missing keys are written, in one unit of work with the read, so an
    /// edit committed meanwhile is never replaced. Returns the full merged
    /// mapping.
    pub async fn merge_and_persist(&self, defaults: &TextMap) -> AppResult<TextMap> {
        check_keys(defaults)?;
        let persisted =
            with_timeout(self.timeout, self.repository.texts.add_missing(defaults)).await?;
        let merged = merge_texts(defaults, &persisted);

        let added = defaults.keys().filter(|k| !persisted.contains_key(*k)).count();
        tracing::info!(added, total = merged.len(), "Texts merged");
        Ok(merged)
    }

    /// Unconditionally replace every given key (first-time bootstrap)
    pub async fn seed(&self, definitions: &TextMap) -> AppResult<TextMap> {
        check_keys(definitions)?;
        with_timeout(self.timeout, self.repository.texts.replace(definitions)).await?;
        tracing::info!(keys = definitions.len(), "Texts seeded");
        self.all().await
    }
}
