pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::normalize_text;
pub use lexer::{Token, tokenize};
pub use parser::{Group, Query, QueryError, Scope, parse_query, parse_tokens};
