mod changelog;
mod health;
mod metrics;
mod pages;
mod sitemap;

pub use changelog::{
    changelog_handler, changelog_json_handler, changelog_markdown_handler, changelog_rss_handler,
};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use pages::{
    home_handler, not_found_handler, projects_handler, rate_limit_handler, rate_limited_response,
    resume_handler,
};
pub use sitemap::{sitemap_page_handler, sitemap_xml_handler};
