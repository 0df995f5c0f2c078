use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

/// Value used when no source identifies the client
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Best-effort client address
///
/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address of
/// the connection.
pub fn client_ip(request: &Request) -> String {
    // Try X-Forwarded-For first
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
        && !first.trim().is_empty()
    {
        return first.trim().to_string();
    }

    // Try X-Real-IP
    if let Some(real_ip) = request.headers().get("x-real-ip")
        && let Ok(val) = real_ip.to_str()
        && !val.trim().is_empty()
    {
        return val.trim().to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}
