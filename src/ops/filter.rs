use log::warn;

use crate::model::note::Note;
use crate::model::notebook::Notebook;
use crate::query::{QueryError, parse_query};

/// The notes a query selected, in notebook order
#[derive(Debug, Clone)]
pub struct Filtered<'a> {
    pub notes: Vec<&'a Note>,
    /// Set when the query could not be parsed; `notes` then holds every note
    pub error: Option<QueryError>,
}

/// Filter `notes` with a query string.
///
/// An empty query selects everything. A query that fails to parse also
/// selects everything, with the error reported alongside.
pub fn filter_notes<'a>(notes: &'a [Note], query: &str) -> Filtered<'a> {
    match parse_query(query) {
        Ok(Some(parsed)) => Filtered {
            notes: notes.iter().filter(|n| parsed.matches(n)).collect(),
            error: None,
        },
        Ok(None) => Filtered {
            notes: notes.iter().collect(),
            error: None,
        },
        Err(e) => {
            warn!("query '{}' not applied: {}", query, e);
            Filtered {
                notes: notes.iter().collect(),
                error: Some(e),
            }
        }
    }
}

impl Notebook {
    pub fn filter(&self, query: &str) -> Filtered<'_> {
        filter_notes(self.notes(), query)
    }
}
