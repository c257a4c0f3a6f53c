use super::lexer::{Token, tokenize};

/// Error type for query construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("'{0}' must be followed by at least one value")]
    EmptyScope(&'static str),
    #[error("'{0}' is missing an operand")]
    MissingOperand(String),
    #[error("unbalanced parentheses")]
    UnbalancedParen,
    #[error("empty parentheses")]
    EmptyGroup,
}

/// What a leaf test looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Tag,
    Label,
    /// Free text in the note body
    Content,
}

/// The children of an AND/OR node. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group(Vec<Query>);

impl Group {
    /// `None` for an empty list
    pub fn new(children: Vec<Query>) -> Option<Self> {
        if children.is_empty() {
            None
        } else {
            Some(Group(children))
        }
    }

    pub fn children(&self) -> &[Query] {
        &self.0
    }
}

/// A parsed query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Or(Group),
    And(Group),
    Not(Box<Query>),
    Test { scope: Scope, value: String },
}

impl Query {
    pub fn test(scope: Scope, value: impl Into<String>) -> Self {
        Query::Test {
            scope,
            value: value.into(),
        }
    }
}

/// Parse a query string. `Ok(None)` when there is nothing to filter on.
///
/// Precedence, loosest first: OR (explicit, or two operands side by side),
/// AND, NOT. A `tag`/`label` keyword scopes the words after it, up to the
/// next keyword, AND, NOT or parenthesis: `labels a, b and tags x` is
/// `(label a OR label b) AND tag x`. Unscoped words and quoted text are
/// free-text tests.
pub fn parse_query(query: &str) -> Result<Option<Query>, QueryError> {
    parse_tokens(tokenize(query))
}

pub fn parse_tokens(tokens: Vec<Token>) -> Result<Option<Query>, QueryError> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(QueryError::UnbalancedParen);
    }
    Ok(Some(query))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// True when the next token can start an operand
    fn at_operand(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Not | Token::LParen | Token::Tag | Token::Label | Token::Ctn(_) | Token::Iden(_))
        )
    }

    fn parse_or(&mut self) -> Result<Query, QueryError> {
        let mut children = vec![self.parse_and()?];
        loop {
            match self.peek() {
                None | Some(Token::RParen) => break,
                Some(Token::Or) => {
                    self.advance();
                    if !self.at_operand() {
                        return Err(QueryError::MissingOperand(Token::Or.to_string()));
                    }
                    children.push(self.parse_and()?);
                }
                Some(_) => children.push(self.parse_and()?),
            }
        }
        collapse(children, Query::Or)
    }

    fn parse_and(&mut self) -> Result<Query, QueryError> {
        let mut children = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.advance();
            if !self.at_operand() {
                return Err(QueryError::MissingOperand(Token::And.to_string()));
            }
            children.push(self.parse_unary()?);
        }
        collapse(children, Query::And)
    }

    fn parse_unary(&mut self) -> Result<Query, QueryError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            if !self.at_operand() {
                return Err(QueryError::MissingOperand(Token::Not.to_string()));
            }
            return Ok(Query::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Query, QueryError> {
        let Some(token) = self.peek().cloned() else {
            return Err(QueryError::MissingOperand("end of query".to_string()));
        };
        match token {
            Token::LParen => {
                self.advance();
                if self.peek() == Some(&Token::RParen) {
                    return Err(QueryError::EmptyGroup);
                }
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(QueryError::UnbalancedParen);
                }
                self.advance();
                Ok(inner)
            }
            Token::RParen => Err(QueryError::UnbalancedParen),
            Token::Tag => self.parse_scope(Scope::Tag, "tag"),
            Token::Label => self.parse_scope(Scope::Label, "label"),
            Token::Ctn(text) | Token::Iden(text) => {
                self.advance();
                Ok(Query::test(Scope::Content, text))
            }
            Token::And | Token::Or | Token::Not => Err(QueryError::MissingOperand(token.to_string())),
        }
    }

    /// Words after a `tag`/`label` keyword, joined by OR
    fn parse_scope(&mut self, scope: Scope, keyword: &'static str) -> Result<Query, QueryError> {
        self.advance();
        let mut tests = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Iden(word)) => {
                    tests.push(Query::test(scope, word.clone()));
                    self.advance();
                }
                Some(Token::Ctn(text)) => {
                    tests.push(Query::test(Scope::Content, text.clone()));
                    self.advance();
                }
                Some(Token::Or)
                    if !tests.is_empty()
                        && matches!(self.peek_at(1), Some(Token::Iden(_) | Token::Ctn(_))) =>
                {
                    self.advance();
                }
                _ => break,
            }
        }
        if tests.is_empty() {
            return Err(QueryError::EmptyScope(keyword));
        }
        collapse(tests, Query::Or)
    }
}

/// Wrap two or more children in a group node; a single child stands alone
fn collapse(mut children: Vec<Query>, wrap: fn(Group) -> Query) -> Result<Query, QueryError> {
    if children.len() == 1 {
        return children.pop().ok_or(QueryError::EmptyGroup);
    }
    Group::new(children).map(wrap).ok_or(QueryError::EmptyGroup)
}
