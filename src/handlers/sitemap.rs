use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse};
use chrono::NaiveDate;
use html_escape::encode_text;
use std::sync::Arc;

use crate::models::{SiteInfo, SitePage};
use crate::render;
use crate::state::AppState;

pub const SITE_PAGES: &[SitePage] = &[
    SitePage { path: "/", title: "Home", change_freq: "weekly", priority: "1.0" },
    SitePage { path: "/sitemap", title: "Sitemap", change_freq: "monthly", priority: "0.5" },
    SitePage { path: "/resume", title: "Resume", change_freq: "monthly", priority: "0.7" },
    SitePage { path: "/projects", title: "Projects", change_freq: "weekly", priority: "0.8" },
    SitePage { path: "/changelog", title: "Changelog", change_freq: "weekly", priority: "0.7" },
];

pub fn sitemap_xml(site: &SiteInfo, pages: &[SitePage], last_mod: NaiveDate) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for page in pages {
        xml.push_str(&format!(
            "  <url>\n    <loc>{}{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{}</priority>\n  </url>\n",
            encode_text(&site.base_url),
            page.path,
            last_mod.format("%Y-%m-%d"),
            page.change_freq,
            page.priority,
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

pub async fn sitemap_xml_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let today = chrono::Utc::now().date_naive();
    (
        [(CONTENT_TYPE, "application/xml")],
        sitemap_xml(&state.site, SITE_PAGES, today),
    )
}

pub async fn sitemap_page_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render::page(&state.site, "Sitemap", &render::sitemap_list(SITE_PAGES)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sitemap_xml() {
        let site = SiteInfo {
            name: "Example".into(),
            description: String::new(),
            author: String::new(),
            base_url: "https://example.org".into(),
        };
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let xml = sitemap_xml(&site, SITE_PAGES, day);

        assert_eq!(xml.matches("<url>").count(), SITE_PAGES.len());
        assert!(xml.contains("<loc>https://example.org/changelog</loc>"));
        assert!(xml.contains("<lastmod>2024-05-01</lastmod>"));
    }
}
