//! Parser for the `synchronous_standby_names` setting.
//!
//! Accepted forms:
//! - `FIRST n (s1, s2, ...)` and the legacy `n (s1, s2, ...)`
//! - `ANY n (s1, s2, ...)`
//! - `s1, s2, ...` (priority based, one synchronous standby)
//!
//! Names may be double-quoted; `*` matches any standby. An empty value means
//! replication is asynchronous.

use crate::error::{Result, WardenError};

/// Standby names listed in `synchronous_standby_names`.
///
/// The `FIRST`/`ANY` method and the standby count are checked for syntax
/// but not kept: the server picks the synchronous standbys, and this side
/// only needs to know which nodes are candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStandbys {
    pub names: Vec<String>,
}

impl SyncStandbys {
    /// Parse a raw setting. Returns `None` when replication is asynchronous.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let tokens = tokenize(raw)?;
        if tokens.is_empty() {
            return Ok(None);
        }
        Parser { tokens, pos: 0 }.parse().map(Some)
    }

    /// Whether a standby with this name is listed. Names compare
    /// case-insensitively whether or not they were quoted, the same way the
    /// server matches them against `application_name`.
    pub fn matches(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n == "*" || n.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident { text: String, quoted: bool },
    Number(u32),
    Star,
    Comma,
    LParen,
    RParen,
}

fn tokenize(raw: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        // "" is an escaped quote
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            text.push('"');
                        }
                        Some('"') => break,
                        Some(ch) => text.push(ch),
                        None => {
                            return Err(WardenError::Config(
                                "unterminated quoted standby name".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Ident { text, quoted: true });
            }
            c if is_ident_char(c) => {
                let mut text = String::new();
                while let Some(&ch) = chars.peek() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    text.push(ch);
                    chars.next();
                }
                match text.parse::<u32>() {
                    Ok(n) if text.bytes().all(|b| b.is_ascii_digit()) => {
                        tokens.push(Token::Number(n))
                    }
                    _ => tokens.push(Token::Ident {
                        text,
                        quoted: false,
                    }),
                }
            }
            other => {
                return Err(WardenError::Config(format!(
                    "unexpected character '{}' in synchronous_standby_names",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | '.')
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse(mut self) -> Result<SyncStandbys> {
        let counted = match (self.tokens.first(), self.tokens.get(1)) {
            (Some(Token::Ident { text, quoted: false }), Some(Token::Number(_)))
                if text.eq_ignore_ascii_case("first") || text.eq_ignore_ascii_case("any") =>
            {
                self.pos += 1;
                true
            }
            (Some(Token::Number(_)), Some(Token::LParen)) => true,
            _ => false,
        };

        let names = if counted {
            let num_sync = match self.next() {
                Some(Token::Number(n)) => n,
                _ => return Err(syntax_error("expected number of synchronous standbys")),
            };
            if num_sync == 0 {
                return Err(WardenError::Config(
                    "number of synchronous standbys must be greater than zero".to_string(),
                ));
            }
            if self.next() != Some(Token::LParen) {
                return Err(syntax_error("expected '('"));
            }
            let names = self.name_list()?;
            if self.next() != Some(Token::RParen) {
                return Err(syntax_error("expected ')'"));
            }
            names
        } else {
            self.name_list()?
        };

        if self.pos != self.tokens.len() {
            return Err(syntax_error("trailing input"));
        }
        Ok(SyncStandbys { names })
    }

    fn name_list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            match self.next() {
                Some(Token::Ident { text, .. }) => names.push(text),
                Some(Token::Star) => names.push("*".to_string()),
                Some(Token::Number(n)) => names.push(n.to_string()),
                _ => return Err(syntax_error("expected standby name")),
            }
            if self.peek() == Some(&Token::Comma) {
                self.pos += 1;
            } else {
                return Ok(names);
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}

fn syntax_error(msg: &str) -> WardenError {
    WardenError::Config(format!("invalid synchronous_standby_names: {}", msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_async() {
        assert_eq!(SyncStandbys::parse("").unwrap(), None);
        assert_eq!(SyncStandbys::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_plain_list() {
        let parsed = SyncStandbys::parse("node2, node3").unwrap().unwrap();
        assert_eq!(parsed.names, vec!["node2", "node3"]);
    }

    #[test]
    fn test_first_and_any() {
        let first = SyncStandbys::parse("FIRST 2 (s1, s2, s3)").unwrap().unwrap();
        assert_eq!(first.names, vec!["s1", "s2", "s3"]);

        let any = SyncStandbys::parse("any 1 (s1, \"S 2\")").unwrap().unwrap();
        assert_eq!(any.names, vec!["s1", "S 2"]);
    }

    #[test]
    fn test_legacy_numeric_form() {
        let parsed = SyncStandbys::parse("2 (a, b)").unwrap().unwrap();
        assert_eq!(parsed.names, vec!["a", "b"]);
    }

    #[test]
    fn test_keyword_used_as_name() {
        let parsed = SyncStandbys::parse("first, any").unwrap().unwrap();
        assert_eq!(parsed.names, vec!["first", "any"]);
    }

    #[test]
    fn test_matches() {
        let parsed = SyncStandbys::parse("Node2").unwrap().unwrap();
        assert!(parsed.matches("node2"));
        assert!(!parsed.matches("node3"));

        let quoted = SyncStandbys::parse("FIRST 1 (\"Node3\")").unwrap().unwrap();
        assert!(quoted.matches("node3"));
        assert!(quoted.matches("NODE3"));

        let star = SyncStandbys::parse("*").unwrap().unwrap();
        assert!(star.matches("anything"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(SyncStandbys::parse("FIRST 0 (a)").is_err());
        assert!(SyncStandbys::parse("FIRST 1 (a").is_err());
        assert!(SyncStandbys::parse("a,").is_err());
        assert!(SyncStandbys::parse("\"open").is_err());
        assert!(SyncStandbys::parse("a; b").is_err());
    }
}
