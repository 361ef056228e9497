//! Security headers middleware for HTTP responses.
//!
//! Adds hardening headers to every response and sets caching hints per content type.
//! Archive downloads are generated per request, so they must never be cached or
//! buffered by intermediaries.

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::routes::archive::ARCHIVE_CONTENT_TYPE;

/// Adds standard security-related HTTP headers to all responses.
///
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: SAMEORIGIN`
/// - `Referrer-Policy: no-referrer`
/// - `Permissions-Policy: geolocation=(), microphone=(), camera=()`
/// - `Cross-Origin-Opener-Policy` / `Cross-Origin-Resource-Policy: same-origin`
/// - Optional: `Strict-Transport-Security` and `Content-Security-Policy` via configuration
///
/// JSON and archive responses get `Cache-Control: no-store`; archives additionally get
/// `X-Accel-Buffering: no` so reverse proxies pass chunks through as they arrive.
pub async fn security_headers_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
    headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(HeaderName::from_static("referrer-policy"), HeaderValue::from_static("no-referrer"));
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );

    if let Some(sec) = cfg.security.as_ref() {
        if sec.enable_hsts.unwrap_or(false) {
            let max_age = sec.hsts_max_age.unwrap_or(31536000); // 1 year
            let include_sub =
                if sec.hsts_include_subdomains.unwrap_or(false) { "; includeSubDomains" } else { "" };
            let value = format!("max-age={}{}", max_age, include_sub);
            headers.insert(
                HeaderName::from_static("strict-transport-security"),
                HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("max-age=31536000")),
            );
        }
        if let Some(csp) = &sec.csp {
            if !csp.trim().is_empty() {
                if let Ok(val) = HeaderValue::from_str(csp) {
                    headers.insert(HeaderName::from_static("content-security-policy"), val);
                }
            }
        }
    }

    let ct_val: Option<String> = headers.get(CONTENT_TYPE).and_then(|ct| {
        ct.to_str()
            .map_err(|e| {
                tracing::warn!("Invalid UTF-8 in Content-Type header: {}", e);
                e
            })
            .ok()
            .map(|s| s.to_string())
    });
    if let Some(s) = ct_val.as_deref() {
        let is_json = s.starts_with("application/json");
        let is_archive = s.starts_with(ARCHIVE_CONTENT_TYPE);
        if is_json || is_archive {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            if is_archive {
                headers.insert(HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no"));
            }
        }
    }

    res
}
