use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::SiteInfo;
use crate::rate_limit::RateLimiterConfig;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "homepage")]
#[command(about = "Personal website server")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Changelog markdown file, "../<path>" is tried if missing
    #[arg(long, default_value = "CHANGELOG.md")]
    pub changelog: PathBuf,

    // Requests allowed per visitor per window (burst size)
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 15)]
    pub rate_window: u64,

    // How often idle visitors are evicted, in seconds
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub cleanup_interval: u64,

    // Public URL used in the sitemap and RSS feed
    #[arg(long, default_value = "https://localhost:8080")]
    pub base_url: String,

    #[arg(long, default_value = "My Website")]
    pub site_name: String,

    #[arg(long, default_value = "Software developer. Notes, projects and a changelog.")]
    pub site_description: String,

    #[arg(long, default_value = "Site Owner")]
    pub site_author: String,
}

impl Args {
    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            burst_size: self.rate_limit,
            window_size: Duration::from_secs(self.rate_window),
            cleanup_interval: Duration::from_secs(self.cleanup_interval),
        }
    }

    pub fn site_info(&self) -> SiteInfo {
        SiteInfo {
            name: self.site_name.clone(),
            description: self.site_description.clone(),
            author: self.site_author.clone(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
        }
    }
}
