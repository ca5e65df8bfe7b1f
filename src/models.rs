use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

// Version label used for pending changes
pub const UNRELEASED: &str = "Unreleased";

/// One `## [version]` section of the changelog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    pub version: String,
    pub date: Option<NaiveDate>,
    pub is_unreleased: bool,
    pub changes: Vec<Change>,
    pub raw_content: String,
}

/// One `### Type` group within a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub change_type: String,
    pub items: Vec<String>,
    pub raw_content: String,
}

/// Parsed changelog, entries in document order (newest first by convention).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangelogData {
    pub entries: Vec<ChangelogEntry>,
    pub total: usize,
}

impl ChangelogData {
    pub fn new(entries: Vec<ChangelogEntry>) -> Self {
        let total = entries.len();
        Self { entries, total }
    }
}

// Filtering options - every unset field matches everything
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogFilter {
    pub version: Option<String>,
    pub change_type: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub show_unreleased: bool,
}

impl Default for ChangelogFilter {
    fn default() -> Self {
        Self {
            version: None,
            change_type: None,
            date_from: None,
            date_to: None,
            search: None,
            show_unreleased: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// Aggregate view over a ChangelogData
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangelogStats {
    pub total_versions: usize,
    pub total_changes: usize,
    pub change_type_counts: BTreeMap<String, usize>,
    pub version_counts: BTreeMap<String, usize>,
    pub latest_version: Option<String>,
    pub oldest_version: Option<String>,
    pub date_range: DateRange,
}

// Site-wide values shown on every page
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub name: String,
    pub description: String,
    pub author: String,
    pub base_url: String,
}

// A page listed in the sitemap
#[derive(Debug, Clone, Copy)]
pub struct SitePage {
    pub path: &'static str,
    pub title: &'static str,
    pub change_freq: &'static str,
    pub priority: &'static str,
}
