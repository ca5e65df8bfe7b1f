//! Changelog ingestion and queries.
//!
//! [`parse`] turns a keep-a-changelog style markdown document into
//! [`ChangelogData`]; the functions in [`query`] filter and summarize it.
//! Everything here is pure and safe to call from concurrent requests.

mod parser;
mod query;

pub use parser::{ChangelogError, parse, parse_bytes, parse_date};
pub use query::{aggregate, change_types, filter, versions};
