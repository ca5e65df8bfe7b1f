use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::mem;
use thiserror::Error;

use crate::models::{Change, ChangelogData, ChangelogEntry, UNRELEASED};

lazy_static! {
    /// `## [1.2.0]` or `## [1.2.0] - 2024-01-15`
    static ref VERSION_HEADING: Regex =
        Regex::new(r"^## \[([^\]]+)\](?:\s*-\s*(.+))?$").unwrap();
    /// `### Added`
    static ref CHANGE_TYPE_HEADING: Regex = Regex::new(r"^### ([A-Za-z]+)$").unwrap();
    static ref BOLD: Regex = Regex::new(r"\*\*([^*]+)\*\*").unwrap();
    static ref ITALIC: Regex = Regex::new(r"\*([^*]+)\*").unwrap();
    static ref INLINE_CODE: Regex = Regex::new(r"`([^`]+)`").unwrap();
    /// Strict `YYYY-MM-DD`, chrono alone also takes `2024-1-5` and `+2024-01-05`
    static ref DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("changelog is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Parse a `YYYY-MM-DD` date, rejecting every other spelling.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if !DATE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Decode and parse a changelog read straight from disk.
pub fn parse_bytes(content: &[u8]) -> Result<ChangelogData, ChangelogError> {
    let text = std::str::from_utf8(content)?;
    Ok(parse(text))
}

/// Parse changelog markdown.
///
/// Parsing is lenient: anything that is not a version heading, a change type
/// heading or a `- ` list item inside a change group is ignored. Change groups
/// without items are dropped, while every version heading yields an entry.
pub fn parse(content: &str) -> ChangelogData {
    let mut parser = Parser::default();
    for line in content.split('\n') {
        parser.feed(line.trim());
    }
    ChangelogData::new(parser.finish())
}

enum Line<'a> {
    Version { version: &'a str, date: Option<&'a str> },
    ChangeType(&'a str),
    Item(&'a str),
    Other,
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Self {
        if let Some(caps) = VERSION_HEADING.captures(line) {
            // group 1 is mandatory in the pattern
            let version = caps.get(1).map_or("", |m| m.as_str());
            let date = caps.get(2).map(|m| m.as_str().trim());
            return Line::Version { version, date };
        }
        if let Some(caps) = CHANGE_TYPE_HEADING.captures(line) {
            return Line::ChangeType(caps.get(1).map_or("", |m| m.as_str()));
        }
        if let Some(item) = line.strip_prefix("- ") {
            return Line::Item(item);
        }
        Line::Other
    }
}

struct EntryBuilder {
    version: String,
    date: Option<NaiveDate>,
    changes: Vec<Change>,
    raw: String,
}

impl EntryBuilder {
    fn new(heading: &str, version: &str, date: Option<&str>) -> Self {
        Self {
            version: version.to_string(),
            date: date.and_then(parse_date),
            changes: Vec::new(),
            raw: heading.to_string(),
        }
    }

    fn push_raw(&mut self, line: &str) {
        self.raw.push('\n');
        self.raw.push_str(line);
    }

    fn close_group(&mut self, group: ChangeBuilder) {
        if !group.items.is_empty() {
            self.changes.push(Change {
                change_type: group.change_type,
                items: group.items,
                raw_content: group.raw,
            });
        }
    }

    fn build(self) -> ChangelogEntry {
        ChangelogEntry {
            is_unreleased: self.version == UNRELEASED,
            version: self.version,
            date: self.date,
            changes: self.changes,
            raw_content: self.raw,
        }
    }
}

struct ChangeBuilder {
    change_type: String,
    items: Vec<String>,
    raw: String,
}

impl ChangeBuilder {
    fn new(heading: &str, change_type: &str) -> Self {
        Self {
            change_type: change_type.to_string(),
            items: Vec::new(),
            raw: heading.to_string(),
        }
    }
}

#[derive(Default)]
enum State {
    #[default]
    BetweenEntries,
    InEntry(EntryBuilder),
    InChangeGroup(EntryBuilder, ChangeBuilder),
}

#[derive(Default)]
struct Parser {
    entries: Vec<ChangelogEntry>,
    state: State,
}

impl Parser {
    fn feed(&mut self, line: &str) {
        let state = mem::take(&mut self.state);

        self.state = match (Line::classify(line), state) {
            (Line::Version { version, date }, state) => {
                self.flush(state);
                State::InEntry(EntryBuilder::new(line, version, date))
            }

            // type headings before the first version have nowhere to go
            (Line::ChangeType(_), State::BetweenEntries) => State::BetweenEntries,
            (Line::ChangeType(change_type), State::InEntry(entry)) => {
                State::InChangeGroup(entry, ChangeBuilder::new(line, change_type))
            }
            (Line::ChangeType(change_type), State::InChangeGroup(mut entry, group)) => {
                entry.close_group(group);
                State::InChangeGroup(entry, ChangeBuilder::new(line, change_type))
            }

            (Line::Item(item), State::InChangeGroup(mut entry, mut group)) => {
                group.items.push(strip_inline_markup(item));
                group.raw.push('\n');
                group.raw.push_str(line);
                entry.push_raw(line);
                State::InChangeGroup(entry, group)
            }

            (Line::Item(_) | Line::Other, State::InEntry(mut entry)) => {
                entry.push_raw(line);
                State::InEntry(entry)
            }
            (Line::Other, State::InChangeGroup(mut entry, group)) => {
                entry.push_raw(line);
                State::InChangeGroup(entry, group)
            }
            (Line::Item(_) | Line::Other, State::BetweenEntries) => State::BetweenEntries,
        };
    }

    fn flush(&mut self, state: State) {
        match state {
            State::BetweenEntries => {}
            State::InEntry(entry) => self.entries.push(entry.build()),
            State::InChangeGroup(mut entry, group) => {
                entry.close_group(group);
                self.entries.push(entry.build());
            }
        }
    }

    fn finish(mut self) -> Vec<ChangelogEntry> {
        let state = mem::take(&mut self.state);
        self.flush(state);
        self.entries
    }
}

/// Drop `**bold**`, `*italic*` and `` `code` `` delimiters, keeping the text.
fn strip_inline_markup(item: &str) -> String {
    let item = BOLD.replace_all(item, "$1");
    let item = ITALIC.replace_all(&item, "$1");
    INLINE_CODE.replace_all(&item, "$1").into_owned()
}
