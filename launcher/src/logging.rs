use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub query_string: Option<String>,
    pub status_code: u16,
    pub duration_ms: u64,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

// Middleware to log every request served by the web host
pub async fn access_log_middleware(request: Request, next: Next) -> Response {
    let start_time = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let client_ip = extract_client_ip(request.headers()).or(peer);
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status_code = response.status().as_u16();

    let entry = AccessLogEntry {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        method: method.to_string(),
        path: uri.path().to_string(),
        query_string: uri.query().map(|q| q.to_string()),
        status_code,
        duration_ms: duration.as_millis() as u64,
        client_ip,
        user_agent,
    };

    if response.status().is_server_error() {
        warn!(
            "{} {} -> {} ({} ms)",
            entry.method, entry.path, entry.status_code, entry.duration_ms
        );
    } else {
        info!(
            "{} {} -> {} ({} ms)",
            entry.method, entry.path, entry.status_code, entry.duration_ms
        );
    }
    debug!(
        "access: {}",
        serde_json::to_string(&entry).unwrap_or_default()
    );

    response
}

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let ip_headers = ["x-forwarded-for", "x-real-ip"];

    for header_name in &ip_headers {
        if let Some(header_value) = headers.get(*header_name) {
            if let Ok(ip_str) = header_value.to_str() {
                // first entry of a comma-separated chain is the origin
                let first_ip = ip_str.split(',').next().unwrap_or("").trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.7, 172.16.0.1"),
        );
        assert_eq!(extract_client_ip(&headers), Some("10.0.0.7".to_string()));
    }

    #[test]
    fn test_no_forwarding_headers() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }
}
