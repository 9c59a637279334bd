use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    database::{ApiKey, NewApiKey},
    error::{GatewayError, GatewayResult},
};

use super::model::{ClearCacheResponse, CreateApiKeyRequest, IdQuery, MessageResponse};

fn parse_id(query: IdQuery) -> GatewayResult<Uuid> {
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| GatewayError::InvalidRequest("ID parameter is required".into()))?;

    Uuid::parse_str(id.trim()).map_err(|_| GatewayError::InvalidRequest("Invalid UUID".into()))
}

/// 非正数的限额使用配置中的默认值
fn positive_or(value: Option<i32>, default: i64) -> i32 {
    match value {
        Some(v) if v > 0 => v,
        _ => default.clamp(1, i64::from(i32::MAX)) as i32,
    }
}

pub async fn create_api_key(
    State(state): State<AppState>,
    body: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> GatewayResult<impl IntoResponse> {
    let Json(req) = body.map_err(|_| GatewayError::InvalidRequest("Invalid request body".into()))?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(GatewayError::InvalidRequest("Name is required".into()));
    }

    let new_key = NewApiKey {
        key: Uuid::new_v4().to_string(),
        name: name.to_string(),
        rate_limit_per_minute: positive_or(
            req.rate_limit_per_minute,
            state.config.default_rate_limit_per_minute,
        ),
        rate_limit_per_hour: positive_or(
            req.rate_limit_per_hour,
            state.config.default_rate_limit_per_hour,
        ),
    };

    let key = state.api_keys.create(new_key).await.map_err(|e| {
        tracing::error!("Failed to create API key: {}", e);
        GatewayError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn list_api_keys(State(state): State<AppState>) -> GatewayResult<Json<Vec<ApiKey>>> {
    let keys = state.api_keys.list().await.map_err(|e| {
        tracing::error!("Failed to list API keys: {}", e);
        GatewayError::from(e)
    })?;

    Ok(Json(keys))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> GatewayResult<Json<MessageResponse>> {
    let id = parse_id(query)?;

    if !state.api_keys.delete(id).await.map_err(|e| {
        tracing::error!("Failed to delete API key: {}", e);
        GatewayError::from(e)
    })? {
        return Err(GatewayError::NotFound("API key".into()));
    }

    tracing::info!("Deleted API key: {}", id);
    Ok(Json(MessageResponse {
        message: "API key deleted successfully".into(),
    }))
}

pub async fn toggle_api_key(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> GatewayResult<Json<ApiKey>> {
    let id = parse_id(query)?;

    let key = state
        .api_keys
        .toggle_active(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to toggle API key: {}", e);
            GatewayError::from(e)
        })?
        .ok_or_else(|| GatewayError::NotFound("API key".into()))?;

    tracing::info!("Toggled API key: {} (active: {})", id, key.is_active);
    Ok(Json(key))
}

pub async fn clear_cache(State(state): State<AppState>) -> GatewayResult<Json<ClearCacheResponse>> {
    let deleted = state.cache.clear_all().await.map_err(|e| {
        tracing::error!("Failed to clear response cache: {}", e);
        GatewayError::from(e)
    })?;

    tracing::info!("Cleared {} cached responses", deleted);
    Ok(Json(ClearCacheResponse { deleted }))
}
