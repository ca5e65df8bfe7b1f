//! Minimal HTML layout shared by every page.

use chrono::Datelike;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::models::{ChangelogData, ChangelogFilter, ChangelogStats, SiteInfo, SitePage};

/// Wrap `body` (already HTML) in the site layout.
pub fn page(site: &SiteInfo, title: &str, body: &str) -> String {
    let year = chrono::Utc::now().year();
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<meta name=\"description\" content=\"{description}\">\
<title>{title} | {name}</title>\
<link rel=\"alternate\" type=\"application/rss+xml\" href=\"/changelog.rss\" title=\"Changelog\">\
</head><body>\
<nav><a href=\"/\">Home</a> <a href=\"/resume\">Resume</a> <a href=\"/projects\">Projects</a> \
<a href=\"/changelog\">Changelog</a> <a href=\"/sitemap\">Sitemap</a></nav>\
<main><h1>{title}</h1>{body}</main>\
<footer>&copy; {year} {author}</footer></body></html>",
        description = attr(&site.description),
        title = text(title),
        name = text(&site.name),
        author = text(&site.author),
    )
}

pub fn sitemap_list(pages: &[SitePage]) -> String {
    let mut html = String::from("<ul>");
    for page in pages {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>",
            attr(page.path),
            text(page.title)
        ));
    }
    html.push_str("</ul>");
    html
}

fn selected(is_selected: bool) -> &'static str {
    if is_selected { " selected" } else { "" }
}

pub fn changelog(
    data: &ChangelogData,
    stats: &ChangelogStats,
    versions: &[String],
    change_types: &[String],
    filter: &ChangelogFilter,
) -> String {
    let mut html = String::new();

    // filter form, prefilled with the active query
    html.push_str(&format!(
        "<form method=\"get\" action=\"/changelog\">\
<input type=\"search\" name=\"search\" placeholder=\"Search\" value=\"{}\">\
<select name=\"version\"><option value=\"\">All versions</option>",
        attr(filter.search.as_deref().unwrap_or_default())
    ));
    for version in versions {
        let is_selected = filter.version.as_deref() == Some(version.as_str());
        html.push_str(&format!(
            "<option{}>{}</option>",
            selected(is_selected),
            text(version)
        ));
    }
    html.push_str("</select><select name=\"type\"><option value=\"\">All types</option>");
    for change_type in change_types {
        let is_selected = filter
            .change_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(change_type));
        html.push_str(&format!(
            "<option{}>{}</option>",
            selected(is_selected),
            text(change_type)
        ));
    }
    html.push_str("</select><button type=\"submit\">Filter</button></form>");

    html.push_str(&format!(
        "<p>{} versions, {} changes",
        stats.total_versions, stats.total_changes
    ));
    if let (Some(from), Some(to)) = (stats.date_range.from, stats.date_range.to) {
        html.push_str(&format!(" between {from} and {to}"));
    }
    html.push_str(". <a href=\"/changelog.rss\">RSS</a> <a href=\"/changelog.json\">JSON</a> <a href=\"/changelog.md\">Markdown</a></p>");

    if data.entries.is_empty() {
        html.push_str("<p>No changes match the current filters.</p>");
        return html;
    }

    for entry in &data.entries {
        html.push_str(&format!(
            "<section id=\"{}\"><h2>{}",
            attr(&entry.version),
            text(&entry.version)
        ));
        if let Some(date) = entry.date {
            html.push_str(&format!(" <time datetime=\"{date}\">{date}</time>"));
        }
        html.push_str("</h2>");
        for change in &entry.changes {
            html.push_str(&format!("<h3>{}</h3><ul>", text(&change.change_type)));
            for item in &change.items {
                html.push_str(&format!("<li>{}</li>", text(item)));
            }
            html.push_str("</ul>");
        }
        html.push_str("</section>");
    }

    html
}
