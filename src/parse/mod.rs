pub mod record_parser;
pub mod record_serializer;

use std::sync::LazyLock;

use regex::Regex;

pub use record_parser::{parse_day, parse_record_start};
pub use record_serializer::{MergedDay, merge_day, serialize_day, serialize_record};

/// `[[<timestamp>]]` inside note content
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(\d+)\]\]").expect("link pattern is valid"));

/// Timestamps referenced from `content`, in order of appearance, without
/// duplicates. Derived data only: a link may point at a note that no longer
/// exists.
pub fn extract_links(content: &str) -> Vec<i64> {
    let mut links = Vec::new();
    for caps in LINK_RE.captures_iter(content) {
        if let Ok(ts) = caps[1].parse::<i64>()
            && !links.contains(&ts)
        {
            links.push(ts);
        }
    }
    links
}
