//! 后端转发

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderMap, StatusCode, Uri, header},
    response::Response,
};
use reqwest::Url;

use crate::{
    error::{GatewayError, GatewayResult},
    middleware::{CaptureBody, Flow, RequestContext, Stage},
};

/// 逐跳头部，不在网关两侧转发
const HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// 无状态反向代理
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    backend_url: Url,
    max_body_bytes: usize,
}

impl Forwarder {
    pub fn new(backend_url: &str, max_body_bytes: usize) -> GatewayResult<Self> {
        let backend_url = Url::parse(backend_url)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid backend url: {}", e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            backend_url,
            max_body_bytes,
        })
    }

    /// 后端基础路径去掉结尾的 `/` 后拼上请求路径，保留查询串
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.backend_url.clone();
        let path = format!("{}{}", url.path().trim_end_matches('/'), uri.path());
        url.set_path(&path);
        url.set_query(uri.query());
        url
    }

    /// 转发请求并返回后端响应，响应体尚未读取
    ///
    /// 调用方的 future 被丢弃（客户端断开）时，后端请求随之取消。
    pub async fn forward(&self, req: Request) -> GatewayResult<reqwest::Response> {
        let (parts, body) = req.into_parts();
        let body = to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| GatewayError::InvalidRequest(format!("Failed to read request body: {}", e)))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let url = self.target_url(&parts.uri);
        tracing::debug!(method = %parts.method, %url, "Forwarding request");

        self.client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))
    }
}

/// 转发阶段，链上的最后一站
pub struct ForwardStage {
    forwarder: Forwarder,
}

impl ForwardStage {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }
}

#[async_trait]
impl Stage for ForwardStage {
    fn name(&self) -> &'static str {
        "forward"
    }

    async fn handle(&self, req: &mut Request, ctx: &mut RequestContext) -> GatewayResult<Flow> {
        let upstream = self.forwarder.forward(std::mem::take(req)).await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // 只缓存未压缩的 200，压缩体取决于当时客户端的 Accept-Encoding
        let fill = ctx
            .cache_fill
            .take()
            .filter(|_| status == StatusCode::OK && !headers.contains_key(header::CONTENT_ENCODING));
        let body = CaptureBody::new(Box::pin(upstream.bytes_stream()), fill, content_type);

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        Ok(Flow::Respond(response))
    }
}
