use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::parse::extract_links;

/// One note as it is stored in a day file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Creation time in epoch seconds, also the note's identity
    pub timestamp: i64,
    /// `[color:<token>]`, opaque and round-tripped verbatim
    pub color: Option<String>,
    /// `[idx:<n>]`, 1-based display position (0 = unset)
    pub prefer_idx: usize,
    /// Tags (without the `#` prefix, lowercased)
    pub tags: IndexSet<String>,
    /// Label paths (without the `@` prefix, lowercased)
    pub labels: IndexSet<String>,
    /// Body text, trailing whitespace stripped
    pub content: String,
    /// Timestamps referenced from the content via `[[<timestamp>]]`
    pub links: Vec<i64>,
    /// The original source lines for this record (for verbatim emission)
    #[serde(skip)]
    pub source_text: Option<Vec<String>>,
}

impl Record {
    /// Create a record with the given content. Links are derived from it.
    pub fn new(timestamp: i64, content: impl Into<String>) -> Self {
        let content = content.into();
        let links = extract_links(&content);
        Record {
            timestamp,
            color: None,
            prefer_idx: 0,
            tags: IndexSet::new(),
            labels: IndexSet::new(),
            content,
            links,
            source_text: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = normalize_labels(labels);
        self
    }

    /// Set the color; a token that cannot be stored (see `normalize_color`)
    /// leaves the record without one.
    pub fn with_color(mut self, color: impl AsRef<str>) -> Self {
        self.color = normalize_color(color.as_ref());
        self
    }

    pub fn with_prefer_idx(mut self, prefer_idx: usize) -> Self {
        self.prefer_idx = prefer_idx;
        self
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.color == other.color
            && self.prefer_idx == other.prefer_idx
            && self.tags == other.tags
            && self.labels == other.labels
            && self.content == other.content
            && self.links == other.links
    }
}

impl Eq for Record {}

/// A parsed day file
#[derive(Debug, Clone, Default)]
pub struct DayFile {
    /// Lines before the first record header, kept verbatim
    pub preamble: Vec<String>,
    /// Records in file order
    pub records: Vec<Record>,
}

/// A pending write for one record: the new version, and whether it stays on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBack {
    pub record: Record,
    pub keep: bool,
}

/// Normalize a single tag: strip `#`, trim, lowercase.
///
/// Empty tags and tags with whitespace or an inner `#` are rejected; a tag
/// line must read back as the same tags.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#').trim();
    if tag.is_empty() || tag.contains(char::is_whitespace) || tag.contains('#') {
        None
    } else {
        Some(tag.to_lowercase())
    }
}

/// Normalize a label path: strip `@`, lowercase, drop empty segments.
///
/// `"@Project//Alpha/"` becomes `"project/alpha"`. A path starting with `[`
/// is rejected: `@[5]` is a record header.
pub fn normalize_label(label: &str) -> Option<String> {
    let label = label.trim().trim_start_matches('@');
    if label.contains(char::is_whitespace) {
        return None;
    }
    let segments: Vec<String> = label
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect();
    if segments.is_empty() || segments[0].starts_with('[') {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Check a color token: trimmed, non-empty, single line.
pub fn normalize_color(color: &str) -> Option<String> {
    let color = color.trim();
    if color.is_empty() || color.contains(char::is_control) {
        None
    } else {
        Some(color.to_string())
    }
}

pub fn normalize_tags<I, S>(tags: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|t| normalize_tag(t.as_ref()))
        .collect()
}

pub fn normalize_labels<I, S>(labels: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|l| normalize_label(l.as_ref()))
        .collect()
}
