use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::error::ApiError;
use super::AppState;
use crate::message::{resolve_timestamp, Message, NewMessage};
use crate::mirror::MirrorDocument;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub messages: Vec<Message>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub status: String,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_url: Option<String>,
}

/// GET /messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) =
        params.map_err(|_| ApiError::BadRequest("Invalid limit or offset".to_string()))?;
    let limit = state.config.page_limit(params.limit);
    let offset = params.offset.unwrap_or(0);

    let messages = state.store.get_messages(limit, offset).await?;
    let total = state.store.count_messages().await?;

    Ok(Json(ListResponse {
        messages,
        total,
        limit,
        offset,
    }))
}

/// POST /messages — persist locally, then mirror remotely.
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let Json(new) = payload.map_err(|e| {
        debug!("Rejected message body: {}", e.body_text());
        ApiError::BadRequest("Invalid JSON data".to_string())
    })?;

    let timestamp = resolve_timestamp(new.timestamp.as_deref(), Utc::now())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut message = state
        .store
        .add_message(&new.content, new.author.as_deref(), &timestamp)
        .await?;
    info!("Stored message {} ({} chars)", message.id, message.content.len());

    let mut mirror_url = None;
    if let Some(mirror) = &state.mirror {
        let receipt = mirror.push(&message).await.map_err(|e| {
            error!("Mirroring message {} failed: {:#}", message.id, e);
            e
        })?;
        info!("Mirrored message {} to {}", message.id, receipt.path);
        state
            .store
            .set_commit_hash(message.id, &receipt.commit_sha)
            .await?;
        message.git_commit_hash = Some(receipt.commit_sha);
        mirror_url = Some(receipt.url);
    }

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            status: "success".to_string(),
            message,
            mirror_url,
        }),
    ))
}

fn message_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    let Path(id) = path.map_err(|e| {
        debug!("Rejected message id: {}", e.body_text());
        ApiError::BadRequest("Message id must be an integer".to_string())
    })?;
    Ok(id)
}

/// GET /messages/{id}
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Message>, ApiError> {
    let id = message_id(path)?;
    let message = state
        .store
        .get_message(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Message {} not found", id)))?;
    Ok(Json(message))
}

/// GET /messages/{id}/mirror — the remote copy, decoded.
pub async fn get_mirrored_message(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MirrorDocument>, ApiError> {
    let id = message_id(path)?;
    let mirror = state
        .mirror
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Remote mirror is not configured".to_string()))?;

    let message = state
        .store
        .get_message(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Message {} not found", id)))?;

    let document = mirror
        .fetch(id, message.timestamp_utc()?)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Message {} is not mirrored", id)))?;
    Ok(Json(document))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("Health check failed: {:#}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Path not found".to_string())
}
