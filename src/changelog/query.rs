use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::models::{Change, ChangelogData, ChangelogEntry, ChangelogFilter, ChangelogStats, DateRange};

/// Apply `filter` to `data`, returning a new snapshot.
///
/// Entry-level predicates (unreleased, version, date range) drop whole entries.
/// Type and search predicates drop change groups; an entry survives them only
/// if at least one group is left.
pub fn filter(data: &ChangelogData, filter: &ChangelogFilter) -> ChangelogData {
    let version = filter.version.as_deref().map(str::to_lowercase);
    let search = filter.search.as_deref().map(str::to_lowercase);
    let narrows_changes = filter.change_type.is_some() || search.is_some();

    let entries = data
        .entries
        .iter()
        .filter(|entry| filter.show_unreleased || !entry.is_unreleased)
        .filter(|entry| {
            version
                .as_deref()
                .is_none_or(|v| entry.version.to_lowercase().contains(v))
        })
        .filter(|entry| within_dates(entry.date, filter.date_from, filter.date_to))
        .filter_map(|entry| {
            let changes: Vec<Change> = entry
                .changes
                .iter()
                .filter(|change| {
                    filter
                        .change_type
                        .as_deref()
                        .is_none_or(|t| change.change_type.eq_ignore_ascii_case(t))
                })
                .filter(|change| search.as_deref().is_none_or(|s| change_matches(change, s)))
                .cloned()
                .collect();

            if changes.is_empty() && narrows_changes {
                return None;
            }
            Some(ChangelogEntry {
                changes,
                ..entry.clone()
            })
        })
        .collect();

    ChangelogData::new(entries)
}

// A populated bound is never satisfied by an entry without a date
fn within_dates(date: Option<NaiveDate>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    match (date, from, to) {
        (_, None, None) => true,
        (None, _, _) => false,
        (Some(date), from, to) => from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t),
    }
}

// `needle` is already lowercased
fn change_matches(change: &Change, needle: &str) -> bool {
    change.change_type.to_lowercase().contains(needle)
        || change.items.iter().any(|item| item.to_lowercase().contains(needle))
}

/// Summarize `data`. Latest and oldest follow document order, not dates.
pub fn aggregate(data: &ChangelogData) -> ChangelogStats {
    let mut stats = ChangelogStats {
        total_versions: data.entries.len(),
        latest_version: data.entries.first().map(|e| e.version.clone()),
        oldest_version: data.entries.last().map(|e| e.version.clone()),
        ..Default::default()
    };

    for entry in &data.entries {
        stats.version_counts.insert(entry.version.clone(), entry.changes.len());

        for change in &entry.changes {
            stats.total_changes += 1;
            *stats.change_type_counts.entry(change.change_type.clone()).or_default() += 1;
        }
    }

    let dates = data.entries.iter().filter_map(|e| e.date);
    stats.date_range = DateRange {
        from: dates.clone().min(),
        to: dates.max(),
    };

    stats
}

/// Version identifiers in document order.
pub fn versions(data: &ChangelogData) -> Vec<String> {
    data.entries.iter().map(|e| e.version.clone()).collect()
}

/// Distinct change type labels, as written.
pub fn change_types(data: &ChangelogData) -> BTreeSet<String> {
    data.entries
        .iter()
        .flat_map(|e| e.changes.iter())
        .map(|c| c.change_type.clone())
        .collect()
}
