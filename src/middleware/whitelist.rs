use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Clone, Default)]
pub struct WhitelistConfig {
    pub enabled: bool,
    pub allowed_ips: Vec<IpAddr>,
}

impl WhitelistConfig {
    pub fn from_config(config: &Config) -> Self {
        debug!("Whitelist enabled: {}", config.whitelist_enabled);
        debug!("Allowed IPs: {:?}", config.whitelist_ips);

        Self {
            enabled: config.whitelist_enabled,
            allowed_ips: config.whitelist_ips.clone(),
        }
    }

    pub fn is_allowed(&self, ip: &IpAddr) -> bool {
        if !self.enabled {
            return true;
        }

        if ip.is_loopback() {
            return true;
        }

        self.allowed_ips.contains(ip)
    }
}

pub async fn whitelist_middleware(
    State(config): State<WhitelistConfig>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    if !config.enabled {
        return Ok(next.run(request).await);
    }

    match extract_client_ip(&request) {
        Some(client_ip) if config.is_allowed(&client_ip) => {
            debug!("Request from allowed IP: {}", client_ip);
            Ok(next.run(request).await)
        }
        Some(client_ip) => {
            warn!("Blocked request from unauthorized IP: {}", client_ip);
            Err((
                StatusCode::FORBIDDEN,
                format!("Access denied from IP: {}", client_ip),
            ))
        }
        None => {
            warn!("Could not extract client IP from request");
            Err((
                StatusCode::FORBIDDEN,
                "Could not determine client IP".to_string(),
            ))
        }
    }
}

fn extract_client_ip(request: &Request) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}
