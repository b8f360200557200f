//! Text model (editable UI copy)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Text entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Text {
    pub id: i32,
    pub key: String,
    pub value: Option<String>,
}

/// Key to value mapping of texts
pub type TextMap = BTreeMap<String, Option<String>>;

/// Set a single text
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetText {
    pub value: Option<String>,
}
