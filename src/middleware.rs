use axum::extract::{Request, State};
use axum::http::header::{COOKIE, LOCATION, RETRY_AFTER, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::debug;

use crate::handlers::rate_limited_response;
use crate::metrics::{RATE_LIMITED_TOTAL, REQUEST_TOTAL};
use crate::rate_limit::RateLimiterConfig;
use crate::state::AppState;

pub const VISITOR_COOKIE: &str = "visitor_id";
const VISITOR_COOKIE_MAX_AGE: u64 = 60 * 60 * 24 * 30;

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "geolocation=(), microphone=(), camera=(), payment=(), usb=(), accelerometer=(), \
         autoplay=(), display-capture=(), gyroscope=(), magnetometer=(), sync-xhr=()",
    ),
    ("strict-transport-security", "max-age=63072000; includeSubDomains; preload"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-dns-prefetch-control", "off"),
    ("cache-control", "public, max-age=0, s-maxage=3600, must-revalidate"),
    ("server", "homepage"),
];

// Paths that never count against a visitor
fn is_exempt(path: &str) -> bool {
    path.starts_with("/static/")
        || matches!(
            path,
            "/health" | "/metrics" | "/ratelimit" | "/favicon.ico" | "/robots.txt"
        )
}

fn visitor_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == VISITOR_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn new_visitor_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

fn reset_timestamp(config: &RateLimiterConfig) -> i64 {
    let window = i64::try_from(config.window_size.as_secs()).unwrap_or(i64::MAX);
    chrono::Utc::now().timestamp().saturating_add(window)
}

fn set_limit_headers(headers: &mut HeaderMap, config: &RateLimiterConfig, remaining: u32) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(config.burst_size));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_timestamp(config)));
}

// Admission check - one bucket per visitor cookie
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();

    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let (visitor, issued) = match visitor_from_cookie(request.headers()) {
        Some(id) => (id, false),
        None => (new_visitor_id(), true),
    };

    let limiter = &state.rate_limiter;
    let config = limiter.config();

    let mut response = if limiter.allow(&visitor) {
        let remaining = limiter.remaining_tokens(&visitor).unwrap_or(0);
        let mut response = next.run(request).await;
        set_limit_headers(response.headers_mut(), &config, remaining);
        response
    } else {
        RATE_LIMITED_TOTAL.inc();
        debug!(visitor = %visitor, path = %request.uri().path(), "Rate limit exceeded");

        let mut response = rate_limited_response(&state.site, &config);
        let headers = response.headers_mut();
        set_limit_headers(headers, &config, 0);
        headers.insert(RETRY_AFTER, HeaderValue::from(config.window_size.as_secs()));
        headers.insert(LOCATION, HeaderValue::from_static("/ratelimit"));
        response
    };

    if issued {
        let cookie = format!(
            "{VISITOR_COOKIE}={visitor}; Path=/; Max-Age={VISITOR_COOKIE_MAX_AGE}; HttpOnly; SameSite=Lax"
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(*name, HeaderValue::from_static(*value));
    }
    response
}
