//! Request handlers
//!
//! Store calls block on file I/O, so each handler hands its repository
//! call to the blocking pool.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value};

use crate::error::Result as StoreResult;
use crate::repository::{Rule, RuleRepository};

use super::error::ApiError;
use super::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// File name offered for backup downloads
const BACKUP_FILENAME: &str = "ipfilters.db";

async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(RuleRepository) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let repo = state.repo.clone();
    Ok(tokio::task::spawn_blocking(move || f(repo)).await??)
}

/// `GET /rules/ip/` - raw entries as `[{"<ip>": "<stored json>"}]`
pub async fn list_rules(State(state): State<AppState>) -> ApiResult<Json<Vec<Map<String, Value>>>> {
    let entries = blocking(&state, |repo| repo.list_all()).await?;

    let body = entries
        .into_iter()
        .map(|(key, value)| {
            let mut entry = Map::new();
            entry.insert(key, Value::String(String::from_utf8_lossy(&value).into_owned()));
            entry
        })
        .collect();

    Ok(Json(body))
}

/// `POST /rules/ip/` - create or replace one rule
pub async fn create_rule(
    State(state): State<AppState>,
    body: Result<Json<Rule>, JsonRejection>,
) -> ApiResult<Json<Rule>> {
    let Json(rule) = body?;
    tracing::info!(ip = %rule.ip, "CREATE API: storing rule");

    let stored = rule.clone();
    blocking(&state, move |repo| repo.create_or_replace(&stored)).await?;

    Ok(Json(rule))
}

/// `PATCH /rules/ip/` - create or replace a batch of rules atomically
pub async fn bulk_rules(
    State(state): State<AppState>,
    body: Result<Json<Vec<Rule>>, JsonRejection>,
) -> ApiResult<Json<Vec<Rule>>> {
    let Json(rules) = body?;
    tracing::info!(count = rules.len(), "BULK API: storing rules");

    let stored = rules.clone();
    blocking(&state, move |repo| repo.create_or_replace_bulk(&stored)).await?;

    Ok(Json(rules))
}

/// `DELETE /rules/ip/{ip}/`
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> ApiResult<Json<String>> {
    tracing::info!(%ip, "DELETE API: removing rule");

    let target = ip.clone();
    blocking(&state, move |repo| repo.delete(&target)).await?;

    Ok(Json(format!("Successfully deleted ip rule {}", ip)))
}

/// `GET /rules/db/backup/` - the whole store as a downloadable file
pub async fn backup(State(state): State<AppState>) -> ApiResult<Response> {
    let snapshot = blocking(&state, |repo| repo.snapshot()).await?;

    tracing::info!(
        txid = snapshot.txid(),
        bytes = snapshot.len(),
        "BACKUP API: streaming snapshot"
    );

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", BACKUP_FILENAME),
        ),
        (header::CONTENT_LENGTH, snapshot.len().to_string()),
    ];

    Ok((headers, snapshot.into_bytes()).into_response())
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
