use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use html_escape::encode_text;
use std::sync::Arc;

use crate::models::SiteInfo;
use crate::rate_limit::RateLimiterConfig;
use crate::render;
use crate::state::AppState;

pub async fn home_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let site = &state.site;
    let body = format!(
        "<p>{}</p><p>See my <a href=\"/projects\">projects</a>, read the \
<a href=\"/resume\">resume</a>, or follow what changed on the <a href=\"/changelog\">changelog</a>.</p>",
        encode_text(&site.description)
    );
    Html(render::page(site, &site.name, &body))
}

pub async fn resume_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let body = format!(
        "<p>{} builds backend services and tools for the web.</p>\
<p>A printable copy is available on request.</p>",
        encode_text(&state.site.author)
    );
    Html(render::page(&state.site, "Resume", &body))
}

pub async fn projects_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let body = "<ul><li><a href=\"/changelog\">This website</a>: \
a small Rust server with per-visitor rate limiting and a searchable changelog.</li></ul>";
    Html(render::page(&state.site, "Projects", body))
}

/// 429 page shown when a visitor runs out of requests.
pub fn rate_limited_response(site: &SiteInfo, config: &RateLimiterConfig) -> Response {
    let body = format!(
        "<p>You have made too many requests. Up to {} requests are allowed every {} seconds.</p>\
<p>Please wait a moment and <a href=\"/\">try again</a>.</p>",
        config.burst_size,
        config.window_size.as_secs()
    );
    (
        StatusCode::TOO_MANY_REQUESTS,
        Html(render::page(site, "Rate Limit Exceeded", &body)),
    )
        .into_response()
}

pub async fn rate_limit_handler(State(state): State<Arc<AppState>>) -> Response {
    rate_limited_response(&state.site, &state.rate_limiter.config())
}

pub async fn not_found_handler(State(state): State<Arc<AppState>>) -> Response {
    let body = "<p>That page does not exist. Try the <a href=\"/sitemap\">sitemap</a>.</p>";
    (
        StatusCode::NOT_FOUND,
        Html(render::page(&state.site, "Not Found", body)),
    )
        .into_response()
}
