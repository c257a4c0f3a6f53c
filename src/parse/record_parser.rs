use indexmap::IndexSet;

use crate::model::record::{DayFile, Record, normalize_color, normalize_label, normalize_tag};
use crate::parse::extract_links;

/// Parse a day file from its source text.
///
/// Format: each record starts with an `@[<timestamp>]` line, optionally
/// followed by `[color:..]`, `[idx:..]`, a `#tag` line and an `@label` line
/// (each at most once, in any order), then content lines up to the next
/// record header. Lines before the first header are kept as the preamble.
///
/// Never fails: anything that doesn't look like metadata is content.
pub fn parse_day(source: &str) -> DayFile {
    let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();

    let mut preamble = Vec::new();
    let mut idx = 0;
    while idx < lines.len() && parse_record_start(&lines[idx]).is_none() {
        preamble.push(lines[idx].clone());
        idx += 1;
    }

    let mut records = Vec::new();
    while idx < lines.len() {
        let (record, next_idx) = parse_single_record(&lines, idx);
        if let Some(record) = record {
            records.push(record);
        }
        idx = next_idx;
    }

    DayFile { preamble, records }
}

/// Parse one record starting at the header line `start_idx`.
/// Returns the record (None when it carried nothing) and the next line index.
fn parse_single_record(lines: &[String], start_idx: usize) -> (Option<Record>, usize) {
    let timestamp = parse_record_start(&lines[start_idx]).unwrap_or_default();

    let mut color = None;
    let mut prefer_idx = None;
    let mut tags: Option<IndexSet<String>> = None;
    let mut labels: Option<IndexSet<String>> = None;
    let mut content_lines: Vec<&str> = Vec::new();
    let mut in_header = true;

    let mut idx = start_idx + 1;
    while idx < lines.len() && parse_record_start(&lines[idx]).is_none() {
        let line = lines[idx].as_str();
        idx += 1;

        if in_header {
            if color.is_none()
                && let Some(c) = parse_color(line)
            {
                color = Some(c);
                continue;
            }
            if prefer_idx.is_none()
                && let Some(n) = parse_idx(line)
            {
                prefer_idx = Some(n);
                continue;
            }
            if tags.is_none()
                && let Some(t) = parse_tag_line(line)
            {
                tags = Some(t);
                continue;
            }
            if labels.is_none()
                && let Some(l) = parse_label_line(line)
            {
                labels = Some(l);
                continue;
            }
            in_header = false;
        }
        content_lines.push(line);
    }

    let content = content_lines.join("\n").trim_end().to_string();
    let tags = tags.unwrap_or_default();
    let labels = labels.unwrap_or_default();

    if content.is_empty() && tags.is_empty() && labels.is_empty() {
        return (None, idx);
    }

    let links = extract_links(&content);
    let record = Record {
        timestamp,
        color,
        prefer_idx: prefer_idx.unwrap_or(0),
        tags,
        labels,
        content,
        links,
        source_text: Some(lines[start_idx..idx].to_vec()),
    };
    (Some(record), idx)
}

/// `@[1700000000]` -> `Some(1700000000)`
pub fn parse_record_start(line: &str) -> Option<i64> {
    let digits = line.trim_end().strip_prefix("@[")?.strip_suffix(']')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `[color:<token>]`, the token running to the last `]` on the line
fn parse_color(line: &str) -> Option<String> {
    let token = line.trim().strip_prefix("[color:")?.strip_suffix(']')?;
    normalize_color(token).filter(|c| c == token)
}

/// `[idx:<n>]`
fn parse_idx(line: &str) -> Option<usize> {
    let digits = line.trim().strip_prefix("[idx:")?.strip_suffix(']')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A line made only of `#tag` words
fn parse_tag_line(line: &str) -> Option<IndexSet<String>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty()
        || !words
            .iter()
            .all(|w| w.len() > 1 && w.starts_with('#') && !w[1..].contains('#'))
    {
        return None;
    }
    Some(words.iter().filter_map(|w| normalize_tag(w)).collect())
}

/// A line made only of `@label/path` words
fn parse_label_line(line: &str) -> Option<IndexSet<String>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty()
        || !words
            .iter()
            .all(|w| w.len() > 1 && w.starts_with('@') && !w.starts_with("@["))
    {
        return None;
    }
    let labels: IndexSet<String> = words.iter().filter_map(|w| normalize_label(w)).collect();
    if labels.is_empty() { None } else { Some(labels) }
}
