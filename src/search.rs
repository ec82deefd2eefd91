//! Mailbox search filters
//!
//! A [`SearchFilter`] selects which messages of the opened mailbox are
//! scanned for attachments and renders itself as an IMAP `SEARCH`
//! query.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::fmt;

/// Date formats accepted for a since-date, tried in order.
const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%d-%b-%Y"];

/// Which messages to harvest.
///
/// # Examples
///
/// ```
/// use attachment_harvester::SearchFilter;
/// use chrono::NaiveDate;
///
/// assert_eq!(SearchFilter::all().to_imap_query(), "ALL");
///
/// let since = NaiveDate::from_ymd_opt(2024, 11, 24).unwrap();
/// assert_eq!(
///     SearchFilter::since(since).to_imap_query(),
///     "SINCE 24-Nov-2024"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchFilter {
    since: Option<NaiveDate>,
    from: Option<String>,
}

impl SearchFilter {
    /// Every message in the mailbox.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            since: None,
            from: None,
        }
    }

    /// Messages dated on or after `date`. Time of day is ignored.
    #[must_use]
    pub const fn since(date: NaiveDate) -> Self {
        Self {
            since: Some(date),
            from: None,
        }
    }

    /// Narrow the filter to messages whose `From` header contains
    /// `sender`.
    #[must_use]
    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.from = Some(sender.into());
        self
    }

    #[must_use]
    pub const fn since_date(&self) -> Option<NaiveDate> {
        self.since
    }

    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Render the filter as an IMAP search query.
    ///
    /// IMAP semantics: `SINCE` is inclusive (>= date).
    #[must_use]
    pub fn to_imap_query(&self) -> String {
        let mut keys = Vec::new();
        if let Some(since) = self.since {
            keys.push(format!("SINCE {}", since.format("%-d-%b-%Y")));
        }
        if let Some(from) = &self.from {
            keys.push(format!("FROM {}", quote(from)));
        }
        if keys.is_empty() {
            "ALL".to_string()
        } else {
            keys.join(" ")
        }
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_imap_query())
    }
}

/// Parse a human-written calendar date such as `Nov 24, 2024`.
///
/// Also accepts `November 24, 2024`, `2024-11-24` and the IMAP form
/// `24-Nov-2024`.
///
/// # Errors
///
/// Returns [`Error::Config`] if none of the formats match.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| Error::Config(format!("Invalid date '{input}'")))
}

/// Quote a string for use as an IMAP search argument.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
