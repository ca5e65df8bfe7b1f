use std::path::PathBuf;
use std::sync::Arc;
use crate::models::SiteInfo;
use crate::rate_limit::RateLimiter;
// app's shared state

pub struct AppState {
    pub rate_limiter: Arc<RateLimiter>,
    pub changelog_path: PathBuf, // source markdown, re-read on every request
    pub site: SiteInfo,
}
