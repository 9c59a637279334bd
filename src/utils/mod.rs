use std::net::SocketAddr;

use axum::{extract::ConnectInfo, extract::Request, http::header};

/// 取客户端 IP：X-Forwarded-For 第一个地址 → X-Real-IP → 连接地址
pub fn client_ip(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()));

    let real_ip = || {
        req.headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    // 降级使用连接IP
    let remote_ip = || {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
    };

    forwarded
        .or_else(real_ip)
        .map(str::to_string)
        .or_else(remote_ip)
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn user_agent(req: &Request) -> String {
    req.headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
