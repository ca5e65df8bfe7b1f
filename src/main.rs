use axum::{Router, middleware::{from_fn, from_fn_with_state}, routing::get};
use clap::Parser; // for cli
use std::sync::Arc;
use tracing::{error, info};

mod changelog;
mod config;
mod error;
mod handlers;
mod logging;
mod metrics;
mod middleware;
mod models;
mod rate_limit;
mod render;
mod state;

use config::Args;
use rate_limit::RateLimiter;
use state::AppState;

// creating the router with routes, security headers wrap everything
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::home_handler))
        .route("/resume", get(handlers::resume_handler))
        .route("/projects", get(handlers::projects_handler))
        .route("/sitemap", get(handlers::sitemap_page_handler))
        .route("/sitemap.xml", get(handlers::sitemap_xml_handler))
        .route("/ratelimit", get(handlers::rate_limit_handler))
        .route("/changelog", get(handlers::changelog_handler))
        .route("/changelog.json", get(handlers::changelog_json_handler))
        .route("/changelog.rss", get(handlers::changelog_rss_handler))
        .route("/changelog.md", get(handlers::changelog_markdown_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback(handlers::not_found_handler)
        .layer(from_fn_with_state(Arc::clone(&state), middleware::rate_limit))
        .layer(from_fn(middleware::security_headers))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// this is main async function with tokio
#[tokio::main]
async fn main() -> std::io::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    logging::init_logging();

    let rate_limiter = Arc::new(RateLimiter::start(args.rate_limiter_config()));

    // creating shared state
    let state = Arc::new(AppState {
        rate_limiter: Arc::clone(&rate_limiter),
        changelog_path: args.changelog.clone(),
        site: args.site_info(),
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Website running on http://localhost:{}", args.port);
    info!("Serving changelog from {}", args.changelog.display());
    info!(
        "Rate limit: {} requests per {} seconds (cleanup every {} seconds)",
        args.rate_limit, args.rate_window, args.cleanup_interval
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // stop the sweep before the runtime goes away
    rate_limiter.shutdown().await;
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteInfo;
    use crate::rate_limit::RateLimiterConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;

    const CHANGELOG: &str = "\
# Changelog

## [Unreleased]
### Added
- Dark mode

## [1.1.0] - 2024-02-10
### Fixed
- Broken **RSS** link

## [1.0.0] - 2024-01-15
### Added
- First `release`
";

    fn changelog_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("homepage-{}-{}.md", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    fn app_with(changelog_path: PathBuf, burst_size: u32) -> Router {
        let config = RateLimiterConfig {
            burst_size,
            window_size: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(300),
        };
        build_router(Arc::new(AppState {
            rate_limiter: Arc::new(RateLimiter::new(config)),
            changelog_path,
            site: SiteInfo {
                name: "Test Site".into(),
                description: "Testing".into(),
                author: "Tester".into(),
                base_url: "https://example.org".into(),
            },
        }))
    }

    async fn get(app: &Router, uri: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header(header::COOKIE, "visitor_id=tester")
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_has_security_headers() {
        let app = app_with(PathBuf::from("missing.md"), 10);
        let response = get(&app, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert!(body_text(response).await.contains("healthy"));
    }

    #[tokio::test]
    async fn test_changelog_json_applies_filter() {
        let app = app_with(changelog_file("json", CHANGELOG), 10);
        let response = get(&app, "/changelog.json?type=fixed").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["changelog"]["total"], 1);
        assert_eq!(json["changelog"]["entries"][0]["version"], "1.1.0");
        assert_eq!(json["changelog"]["entries"][0]["changes"][0]["items"][0], "Broken RSS link");
        assert_eq!(json["stats"]["total_versions"], 3);
        assert_eq!(json["stats"]["latest_version"], "Unreleased");
        assert_eq!(json["filter"]["change_type"], "fixed");
    }

    #[tokio::test]
    async fn test_changelog_load_is_timed() {
        use crate::metrics::CHANGELOG_PARSE_LATENCY;

        let app = app_with(changelog_file("timed", CHANGELOG), 10);
        let before = CHANGELOG_PARSE_LATENCY.get_sample_count();
        let response = get(&app, "/changelog.json").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(CHANGELOG_PARSE_LATENCY.get_sample_count() > before);
    }

    #[tokio::test]
    async fn test_changelog_html_hides_unreleased_on_request() {
        let app = app_with(changelog_file("html", CHANGELOG), 10);
        let body = body_text(get(&app, "/changelog?unreleased=false").await).await;

        assert!(body.contains("id=\"1.0.0\""));
        assert!(!body.contains("id=\"Unreleased\""));
    }

    #[tokio::test]
    async fn test_changelog_markdown_formats() {
        let app = app_with(changelog_file("md", CHANGELOG), 10);

        let raw = get(&app, "/changelog.md").await;
        assert_eq!(raw.headers()[header::CONTENT_TYPE], "text/markdown; charset=utf-8");
        assert_eq!(body_text(raw).await, CHANGELOG);

        let html = body_text(get(&app, "/changelog.md?format=html").await).await;
        assert!(html.contains("<h1>Changelog</h1>"));
    }

    #[tokio::test]
    async fn test_changelog_rss() {
        let app = app_with(changelog_file("rss", CHANGELOG), 10);
        let response = get(&app, "/changelog.rss").await;

        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/rss+xml");
        assert_eq!(body_text(response).await.matches("<item>").count(), 3);
    }

    #[tokio::test]
    async fn test_missing_changelog_is_not_found() {
        let app = app_with(PathBuf::from("/nonexistent/homepage/CHANGELOG.md"), 10);
        let response = get(&app, "/changelog.json").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rate_limit_denies_after_burst() {
        let app = app_with(PathBuf::from("missing.md"), 2);

        let first = get(&app, "/").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-ratelimit-limit"], "2");
        assert_eq!(first.headers()["x-ratelimit-remaining"], "1");

        assert_eq!(get(&app, "/resume").await.status(), StatusCode::OK);

        let denied = get(&app, "/projects").await;
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(denied.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(denied.headers()[header::RETRY_AFTER], "60");
        assert_eq!(denied.headers()[header::LOCATION], "/ratelimit");
        assert!(denied.headers().contains_key("x-content-type-options"));

        // exempt paths still answer
        assert_eq!(get(&app, "/health").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_new_visitor_gets_cookie() {
        let app = app_with(PathBuf::from("missing.md"), 10);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("visitor_id="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let app = app_with(PathBuf::from("missing.md"), 10);
        assert_eq!(get(&app, "/nope").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sitemap_xml() {
        let app = app_with(PathBuf::from("missing.md"), 10);
        let body = body_text(get(&app, "/sitemap.xml").await).await;
        assert!(body.contains("<loc>https://example.org/resume</loc>"));
    }
}
