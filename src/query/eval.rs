use indexmap::IndexSet;

use super::parser::{Query, Scope};
use crate::model::note::Note;
use crate::model::record::{normalize_label, normalize_tag};

/// Collapse whitespace runs to one space and lowercase
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Query {
    /// Evaluate against a note's tags, labels and content. AND and OR stop
    /// at the first child that decides the result.
    pub fn analyze(&self, tags: &IndexSet<String>, labels: &IndexSet<String>, content: &str) -> bool {
        match self {
            Query::Or(group) => group.children().iter().any(|q| q.analyze(tags, labels, content)),
            Query::And(group) => group.children().iter().all(|q| q.analyze(tags, labels, content)),
            Query::Not(inner) => !inner.analyze(tags, labels, content),
            Query::Test { scope, value } => test_leaf(*scope, value, tags, labels, content),
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        self.analyze(note.tags(), note.labels(), note.content())
    }
}

fn test_leaf(
    scope: Scope,
    value: &str,
    tags: &IndexSet<String>,
    labels: &IndexSet<String>,
    content: &str,
) -> bool {
    match scope {
        Scope::Tag => {
            if value.eq_ignore_ascii_case("all") {
                return true;
            }
            normalize_tag(value).is_some_and(|t| tags.iter().any(|have| have.to_lowercase() == t))
        }
        // Exact path: `a/b` does not match a note labelled `a/b/c`
        Scope::Label => normalize_label(value)
            .is_some_and(|l| labels.iter().any(|have| have.to_lowercase() == l)),
        Scope::Content => normalize_text(content).contains(&normalize_text(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse_query;

    fn set(items: &[&str]) -> IndexSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn eval(query: &str, tags: &[&str], labels: &[&str], content: &str) -> bool {
        parse_query(query)
            .unwrap()
            .unwrap()
            .analyze(&set(tags), &set(labels), content)
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello \n\t World "), "hello world");
    }

    #[test]
    fn test_tag_all_matches_everything() {
        assert!(eval("tags all", &[], &[], ""));
        assert!(eval("tag ALL", &["x"], &[], "body"));
    }

    #[test]
    fn test_tag_membership() {
        assert!(eval("tag aaa", &["aaa"], &[], ""));
        assert!(!eval("tag aaa", &["bbb"], &[], ""));
        assert!(eval("tag AAA", &["aaa"], &[], ""));
        assert!(eval("tag #aaa", &["aaa"], &[], ""));
        assert!(!eval("tag aa", &["aaa"], &[], ""));
    }

    #[test]
    fn test_label_exact_path() {
        assert!(eval("label a/b and tag x", &["x"], &["a/b"], ""));
        assert!(!eval("label a/b and tag x", &["x"], &["a/b/c"], ""));
        assert!(!eval("label a/b and tag x", &[], &["a/b"], ""));
        assert!(eval("label A/B", &[], &["a/b"], ""));
        assert!(!eval("label a", &[], &["a/b"], ""));
    }

    #[test]
    fn test_not() {
        assert!(eval("not tag aaa", &["bbb"], &[], ""));
        assert!(!eval("not tag aaa", &["aaa"], &[], ""));
    }

    #[test]
    fn test_content_whitespace_and_case() {
        assert!(eval("\"hello world\"", &[], &[], "Say HELLO\n   world!"));
        assert!(!eval("\"hello world\"", &[], &[], "hello there world"));
        assert!(eval("plumber", &[], &[], "Call the Plumber."));
    }

    #[test]
    fn test_scoped_or_and() {
        let q = "labels a, b and tags x";
        assert!(eval(q, &["x"], &["b"], ""));
        assert!(!eval(q, &["y"], &["b"], ""));
        assert!(!eval(q, &["x"], &["c"], ""));
    }
}
