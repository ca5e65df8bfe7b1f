use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, NaiveDate, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use pulldown_cmark::{Options, Parser, html};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::changelog::{self, ChangelogError};
use crate::error::AppError;
use crate::metrics::CHANGELOG_PARSE_LATENCY;
use crate::models::{ChangelogData, ChangelogFilter, ChangelogStats, SiteInfo};
use crate::render;
use crate::state::AppState;

// Newest entries included in the feed
const RSS_MAX_ENTRIES: usize = 20;

// Query parameters shared by the changelog views
#[derive(Debug, Default, Deserialize)]
pub struct ChangelogQuery {
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub change_type: Option<String>,
    pub search: Option<String>,
    pub unreleased: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub format: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}

fn parse_date(value: &Option<String>) -> Option<NaiveDate> {
    value.as_deref().and_then(changelog::parse_date)
}

impl ChangelogQuery {
    pub fn to_filter(&self) -> ChangelogFilter {
        ChangelogFilter {
            version: non_empty(&self.version),
            change_type: non_empty(&self.change_type),
            search: non_empty(&self.search),
            date_from: parse_date(&self.date_from),
            date_to: parse_date(&self.date_to),
            show_unreleased: non_empty(&self.unreleased).is_none_or(|v| v == "true"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChangelogView {
    pub changelog: ChangelogData,
    pub stats: ChangelogStats,
    pub versions: Vec<String>,
    pub change_types: Vec<String>,
    pub filter: ChangelogFilter,
}

impl ChangelogView {
    // Stats and pickers describe the whole document, entries honour the filter
    pub fn new(data: &ChangelogData, filter: ChangelogFilter) -> Self {
        Self {
            changelog: changelog::filter(data, &filter),
            stats: changelog::aggregate(data),
            versions: changelog::versions(data),
            change_types: changelog::change_types(data).into_iter().collect(),
            filter,
        }
    }
}

async fn read_changelog(path: &Path) -> Result<Vec<u8>, AppError> {
    let read_err = |path: PathBuf, source: std::io::Error| {
        if source.kind() == ErrorKind::NotFound {
            AppError::ChangelogNotFound { path, source }
        } else {
            AppError::ChangelogRead { path, source }
        }
    };

    match tokio::fs::read(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let fallback = Path::new("..").join(path);
            tokio::fs::read(&fallback)
                .await
                .map_err(|source| read_err(path.to_path_buf(), source))
        }
        Err(e) => Err(read_err(path.to_path_buf(), e)),
    }
}

async fn load_changelog(state: &AppState) -> Result<ChangelogData, AppError> {
    let _timer = CHANGELOG_PARSE_LATENCY.start_timer();
    let content = read_changelog(&state.changelog_path).await?;
    Ok(changelog::parse_bytes(&content)?)
}

pub async fn changelog_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChangelogQuery>,
) -> Result<Html<String>, AppError> {
    let data = load_changelog(&state).await?;
    let view = ChangelogView::new(&data, query.to_filter());

    let body = render::changelog(
        &view.changelog,
        &view.stats,
        &view.versions,
        &view.change_types,
        &view.filter,
    );
    Ok(Html(render::page(&state.site, "Changelog", &body)))
}

pub async fn changelog_json_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChangelogQuery>,
) -> Result<Response, AppError> {
    let data = load_changelog(&state).await?;
    let view = ChangelogView::new(&data, query.to_filter());
    let json = serde_json::to_string_pretty(&view)?;

    Ok(([(CONTENT_TYPE, "application/json")], json).into_response())
}

pub async fn changelog_rss_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let data = load_changelog(&state).await?;
    let feed = rss_feed(&data, &state.site, Utc::now());

    Ok(([(CONTENT_TYPE, "application/rss+xml")], feed).into_response())
}

pub async fn changelog_markdown_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChangelogQuery>,
) -> Result<Response, AppError> {
    let content = read_changelog(&state.changelog_path).await?;

    if query.format.as_deref() != Some("html") {
        return Ok(([(CONTENT_TYPE, "text/markdown; charset=utf-8")], content).into_response());
    }

    let text = std::str::from_utf8(&content).map_err(ChangelogError::from)?;
    Ok(Html(markdown_to_html(text)).into_response())
}

pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(text, options));
    out
}

fn cdata(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}

/// RSS 2.0 feed of the newest entries.
pub fn rss_feed(data: &ChangelogData, site: &SiteInfo, built: DateTime<Utc>) -> String {
    let base = &site.base_url;
    let mut rss = String::new();

    rss.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    rss.push_str(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>"#);
    rss.push_str(&format!(
        "<title>{} - Changelog</title><description>{}</description><link>{}/changelog</link>\
<atom:link href=\"{}/changelog.rss\" rel=\"self\" type=\"application/rss+xml\"/>\
<language>en-us</language><lastBuildDate>{}</lastBuildDate>",
        encode_text(&site.name),
        encode_text(&site.description),
        encode_text(base),
        encode_double_quoted_attribute(base),
        built.to_rfc2822(),
    ));

    for entry in data.entries.iter().take(RSS_MAX_ENTRIES) {
        let version = encode_text(&entry.version);
        let link = format!("{}/changelog#{}", encode_text(base), version);
        rss.push_str(&format!(
            "<item><title>Version {version}</title><link>{link}</link><guid>{link}</guid>"
        ));
        if let Some(date) = entry.date {
            let published = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().to_rfc2822());
            if let Some(published) = published {
                rss.push_str(&format!("<pubDate>{published}</pubDate>"));
            }
        }

        let mut description = String::new();
        for change in &entry.changes {
            description.push_str(&format!("<h3>{}</h3><ul>", encode_text(&change.change_type)));
            for item in &change.items {
                description.push_str(&format!("<li>{}</li>", encode_text(item)));
            }
            description.push_str("</ul>");
        }
        rss.push_str(&format!(
            "<description><![CDATA[{}]]></description></item>",
            cdata(&description)
        ));
    }

    rss.push_str("</channel></rss>");
    rss
}
