use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::cache::StoreError;

/// 网关请求链上的错误分类，每个变体对应一个固定的 HTTP 状态码
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    #[error("rate limit exceeded")]
    AdmissionDenied,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal failure: {0}")]
    Internal(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AdmissionDenied => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// 返回给客户端的文本，内部错误细节只写日志
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Unauthenticated(reason) => (*reason).to_string(),
            GatewayError::AdmissionDenied => "Rate limit exceeded".into(),
            GatewayError::UpstreamUnavailable(_) => "Bad gateway".into(),
            GatewayError::Internal(_) => "Internal error".into(),
            GatewayError::InvalidRequest(msg) => msg.clone(),
            GatewayError::NotFound(what) => format!("{} not found", what),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.client_message(),
        });

        (self.status(), body).into_response()
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        GatewayError::Internal(e.to_string())
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        GatewayError::Internal(e.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
