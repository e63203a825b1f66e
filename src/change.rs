//! Changes read from an origin.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Opaque origin-side identifier of a change (a commit hash, a digest, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for display.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Revision {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One unit of content plus metadata, migrated in a single pass.
///
/// A `Change` is produced by an origin, consumed once by the migrator and
/// then discarded. Nothing mutates it after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Identifies the origin the change was read from (usually its URL).
    pub origin: String,
    pub revision: Revision,
    /// `Name <email>`
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// The change before this one in origin order, used to resume runs.
    pub previous: Option<Revision>,
    /// `Key: value` trailers found in the last paragraph of the message.
    pub labels: BTreeMap<String, String>,
}

impl Change {
    pub fn new(
        origin: impl Into<String>,
        revision: Revision,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let labels = parse_labels(&message);
        Self {
            origin: origin.into(),
            revision,
            author: author.into(),
            timestamp,
            message,
            previous: None,
            labels,
        }
    }

    pub fn with_previous(mut self, previous: Option<Revision>) -> Self {
        self.previous = previous;
        self
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    /// Split `author` into name and email. Missing email yields an empty string.
    pub fn author_parts(&self) -> (&str, &str) {
        split_author(&self.author)
    }
}

/// Split `Name <email>` into its parts.
pub fn split_author(author: &str) -> (&str, &str) {
    match (author.find('<'), author.rfind('>')) {
        (Some(start), Some(end)) if start < end => {
            (author[..start].trim(), author[start + 1..end].trim())
        }
        _ => (author.trim(), ""),
    }
}

/// Parse `Key: value` trailers from the last paragraph of a commit message.
///
/// The last paragraph only counts as a trailer block if every non-empty
/// line in it is a trailer. Later occurrences of a key win.
pub fn parse_labels(message: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    let trimmed = message.trim_end();
    let last_paragraph = match trimmed.rfind("\n\n") {
        Some(idx) => &trimmed[idx + 2..],
        None => return labels,
    };

    let mut parsed = Vec::new();
    for line in last_paragraph.lines().filter(|l| !l.trim().is_empty()) {
        match parse_trailer(line) {
            Some(pair) => parsed.push(pair),
            None => return labels,
        }
    }
    for (key, value) in parsed {
        labels.insert(key.to_string(), value.to_string());
    }
    labels
}

fn parse_trailer(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_key {
        return None;
    }
    Some((key, value.trim()))
}
