use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, error::GatewayError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// 管理接口鉴权，未配置 ADMIN_TOKEN 时直接放行
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(token) if token == expected => next.run(req).await,
        _ => {
            tracing::warn!(path = %req.uri().path(), "Rejected admin request without valid token");
            GatewayError::Unauthenticated("Invalid admin token").into_response()
        }
    }
}
