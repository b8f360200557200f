//! Texts API endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{text::SetText, Text, TextMap},
    AppState,
};

use super::Admin;

/// All texts as a key to value mapping
#[utoipa::path(
    get,
    path = "/texts",
    tag = "texts",
    responses(
        (status = 200, description = "Texts by key", body = std::collections::BTreeMap<String, String>)
    )
)]
pub async fn list_texts(State(state): State<AppState>) -> AppResult<Json<TextMap>> {
    let texts = state.services.texts.all().await?;
    Ok(Json(texts))
}

/// Set one text
#[utoipa::path(
    put,
    path = "/texts/{key}",
    tag = "texts",
    security(("admin_token" = [])),
    params(("key" = String, Path, description = "Text key")),
    request_body = SetText,
    responses(
        (status = 200, description = "Text stored", body = Text)
    )
)]
pub async fn set_text(
    State(state): State<AppState>,
    _admin: Admin,
    Path(key): Path<String>,
    Json(data): Json<SetText>,
) -> AppResult<Json<Text>> {
    let text = state.services.texts.set(&key, data.value.as_deref()).await?;
    Ok(Json(text))
}

/// Merge default texts, keeping existing values
#[utoipa::path(
    post,
    path = "/texts/merge",
    tag = "texts",
    security(("admin_token" = [])),
    request_body = std::collections::BTreeMap<String, String>,
    responses(
        (status = 200, description = "Merged texts", body = std::collections::BTreeMap<String, String>)
    )
)]
pub async fn merge_texts(
    State(state): State<AppState>,
    _admin: Admin,
    Json(defaults): Json<TextMap>,
) -> AppResult<Json<TextMap>> {
    let merged = state.services.texts.merge_and_persist(&defaults).await?;
    Ok(Json(merged))
}

/// Overwrite the given texts
#[utoipa::path(
    post,
    path = "/texts/seed",
    tag = "texts",
    security(("admin_token" = [])),
    request_body = std::collections::BTreeMap<String, String>,
    responses(
        (status = 200, description = "All texts after seeding", body = std::collections::BTreeMap<String, String>)
    )
)]
pub async fn seed_texts(
    State(state): State<AppState>,
    _admin: Admin,
    Json(definitions): Json<TextMap>,
) -> AppResult<Json<TextMap>> {
    let texts = state.services.texts.seed(&definitions).await?;
    Ok(Json(texts))
}
