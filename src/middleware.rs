//! Request admission and stats middleware.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::handlers::SharedState;
use crate::ratelimit::{QuotaInfo, RouteClass};

/// Route class for an inbound request, or `None` for routes outside the
/// operation surface (liveness, unmatched paths).
pub fn classify(method: &Method, path: &str) -> Option<RouteClass> {
    match (method, path) {
        (&Method::POST, "/paste") => Some(RouteClass::Create),
        (&Method::GET, "/pastes") => Some(RouteClass::Read),
        (&Method::GET, p) if p.starts_with("/paste/") => Some(RouteClass::Read),
        (&Method::DELETE, p) if p.starts_with("/paste/") => Some(RouteClass::Delete),
        (&Method::GET, "/admin/stats") => Some(RouteClass::Admin),
        _ => None,
    }
}

/// Introspection routes are excluded from request stats.
fn is_introspection(path: &str) -> bool {
    path == "/admin/stats" || path == "/health"
}

/// Consults the rate limiter before dispatch, records request stats, and
/// stamps quota headers on the way out.
pub async fn admission(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(class) = classify(&method, &path) else {
        return next.run(request).await;
    };

    let client_ip = client_ip(&request);
    let decision = state.limiter.check_and_consume(&client_ip, class);

    // Denied requests were still handled; they count toward stats too.
    if !is_introspection(&path) {
        state.stats.record();
    }

    if !decision.allowed {
        let retry_after = decision.retry_after.unwrap_or_default();
        warn!(
            client_ip = %client_ip,
            route_class = class.as_str(),
            retry_after_secs = retry_after.as_secs(),
            "request rate limited"
        );
        let mut response = ApiError::RateLimited { retry_after }.into_response();
        if let Some(quota) = decision.quota {
            apply_quota_headers(&mut response, quota);
        }
        return response;
    }

    info!(
        method = %method,
        path = %path,
        client_ip = %client_ip,
        "request admitted"
    );

    let mut response = next.run(request).await;
    if let Some(quota) = decision.quota {
        apply_quota_headers(&mut response, quota);
    }
    response
}

fn apply_quota_headers(response: &mut Response, quota: QuotaInfo) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&quota.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.reset_after.as_secs().to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
}

/// Admission key for a request: proxy headers first, then the peer
/// address.
pub fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return first_ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        addr.ip().to_string()
    } else {
        "unknown".to_string()
    }
}
