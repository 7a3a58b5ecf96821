use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::metrics::RequestStats;
use crate::models::CreatePasteRequest;
use crate::ratelimit::RateLimiter;
use crate::redis::RedisStore;
use crate::service::PasteService;

/// Shared application state.
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub service: PasteService,
    pub limiter: RateLimiter,
    pub stats: RequestStats,
    /// Present only when the Redis backend is configured; used for the
    /// health report.
    pub redis: Option<Arc<RedisStore>>,
}

/// Owner token from an `Authorization: Bearer …` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Create a paste. The owner token may come from the body or from the
/// Authorization header; the body wins when both are present.
pub async fn create_paste(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(mut payload): Json<CreatePasteRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.owner_token.is_none() {
        payload.owner_token = bearer_token(&headers);
    }
    let created = state.service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_paste(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let doc = state.service.get(&id).await?;
    Ok(Json(doc))
}

/// List pastes owned by the bearer token, newest first.
pub async fn list_pastes(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = bearer_token(&headers).ok_or_else(|| {
        ApiError::Validation("listing requires an owner token (Authorization: Bearer …)".to_string())
    })?;
    let summaries = state.service.list(&token).await?;
    Ok(Json(summaries))
}

pub async fn delete_paste(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = bearer_token(&headers);
    state.service.delete(&id, token.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Administrative request statistics; excluded from its own counting.
pub async fn get_stats(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.stats.snapshot())
}

/// Liveness plus backing-store reachability.
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let (backend, backend_connected) = match &state.redis {
        Some(redis) => ("redis", redis.ping().await.is_ok()),
        None => ("memory", true),
    };

    let status = if backend_connected { "healthy" } else { "degraded" };
    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "backend": backend,
        "backend_connected": backend_connected,
    }))
}
