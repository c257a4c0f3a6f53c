use std::fmt;

use log::warn;

/// A query token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `label` / `labels`
    Label,
    /// `tag` / `tags`
    Tag,
    /// `and` / `&`
    And,
    /// `or` / `|` / `,`
    Or,
    /// `not` / `!` / `~`
    Not,
    LParen,
    RParen,
    /// Quoted free text, quotes removed
    Ctn(String),
    /// Any other word
    Iden(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Label => write!(f, "label"),
            Token::Tag => write!(f, "tag"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Ctn(text) => write!(f, "\"{}\"", text),
            Token::Iden(word) => write!(f, "{}", word),
        }
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '&' | '|' | ',' | '!' | '~' | '(' | ')')
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Split a query into tokens.
///
/// Never fails: an unterminated quote or a stray control character is
/// reported and dropped, and lexing carries on after it.
pub fn tokenize(query: &str) -> Vec<Token> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_control() {
            warn!("query: skipping control character {:?} at {}", c, i);
            i += 1;
            continue;
        }

        let op = match c {
            '&' => Some(Token::And),
            '|' | ',' => Some(Token::Or),
            '!' | '~' => Some(Token::Not),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(token) = op {
            tokens.push(token);
            i += 1;
            continue;
        }

        if is_quote(c) {
            match chars[i + 1..].iter().position(|&q| q == c) {
                Some(len) => {
                    let text: String = chars[i + 1..i + 1 + len].iter().collect();
                    tokens.push(Token::Ctn(text));
                    i += len + 2;
                }
                None => {
                    warn!("query: unterminated quote at {}", i);
                    i += 1;
                }
            }
            continue;
        }

        let start = i;
        while i < chars.len()
            && !chars[i].is_whitespace()
            && !chars[i].is_control()
            && !is_operator(chars[i])
        {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        tokens.push(classify(word));
    }

    tokens
}

/// Keywords win over plain words
fn classify(word: String) -> Token {
    match word.to_lowercase().as_str() {
        "label" | "labels" => Token::Label,
        "tag" | "tags" => Token::Tag,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ => Token::Iden(word),
    }
}
