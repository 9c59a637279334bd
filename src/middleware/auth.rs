use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::Request, http::HeaderName};

use crate::{
    database::ApiKeyStore,
    error::{GatewayError, GatewayResult},
    middleware::{Flow, RequestContext, Stage},
};

/// 身份识别阶段：按请求头里的 API key 查出调用方
pub struct IdentityStage {
    keys: Arc<dyn ApiKeyStore>,
    header: HeaderName,
}

impl IdentityStage {
    pub fn new(keys: Arc<dyn ApiKeyStore>, header: HeaderName) -> Self {
        Self { keys, header }
    }
}

#[async_trait]
impl Stage for IdentityStage {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn handle(&self, req: &mut Request, ctx: &mut RequestContext) -> GatewayResult<Flow> {
        let token = req
            .headers()
            .get(&self.header)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let Some(token) = token else {
            return Err(GatewayError::Unauthenticated("Missing API key"));
        };

        let key = self.keys.find_by_key(token).await.map_err(|e| {
            tracing::error!("Auth DB error: {}", e);
            GatewayError::from(e)
        })?;

        match key {
            Some(key) if key.is_active => {
                ctx.identity = Some(key);
                Ok(Flow::Next)
            }
            Some(_) => Err(GatewayError::Unauthenticated("API key inactive")),
            None => Err(GatewayError::Unauthenticated("Invalid API key")),
        }
    }
}
