//! Tokenizer for `{{ }}` and `{% if %}` expressions.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Str(String),
    Num(f64),
    /// Dot path such as `ctx.user.name` (also bare words like `upper`).
    Path(String),
    /// Raw argument text following `name:` in a filter.
    FilterArg(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Bang,
    Pipe,
    Colon,
    Question,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Num(n) => write!(f, "{n}"),
            Token::Path(p) => write!(f, "{p}"),
            Token::FilterArg(a) => write!(f, "{a}"),
            Token::True => f.write_str("true"),
            Token::False => f.write_str("false"),
            Token::Null => f.write_str("null"),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Not => f.write_str("not"),
            Token::Bang => f.write_str("!"),
            Token::Pipe => f.write_str("|"),
            Token::Colon => f.write_str(":"),
            Token::Question => f.write_str("?"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Eq => f.write_str("=="),
            Token::Ne => f.write_str("!="),
            Token::Gt => f.write_str(">"),
            Token::Lt => f.write_str("<"),
            Token::Ge => f.write_str(">="),
            Token::Le => f.write_str("<="),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer {
        chars: src.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let token = match c {
                '\'' | '"' => self.string(c)?,
                '0'..='9' => self.number(),
                c if is_ident_start(c) => self.word(),
                ':' => {
                    self.pos += 1;
                    if self.filter_arg_follows() {
                        self.tokens.push(Token::Colon);
                        self.filter_arg()?
                    } else {
                        Token::Colon
                    }
                }
                _ => self.operator(c)?,
            };
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, LexError> {
        self.quoted(quote).map(Token::Str)
    }

    fn quoted(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
        Err(LexError {
            message: "unterminated string literal".into(),
            offset: start,
        })
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some('0'..='9')) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some('0'..='9')) {
            self.pos += 1;
            while matches!(self.peek(), Some('0'..='9')) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::Num(text.parse().unwrap_or(0.0))
    }

    /// Identifier or dot path. Segments after the first may contain `-` so
    /// that `steps.fetch-notes.output` resolves; a leading `-` is always minus.
    fn word(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;
        let mut first_segment = true;
        while let Some(c) = self.peek() {
            match c {
                c if is_ident_char(c) => self.pos += 1,
                '-' if !first_segment && self.peek_at(1).is_some_and(is_ident_char) => {
                    self.pos += 1
                }
                '.' if self.peek_at(1).is_some_and(is_ident_char) => {
                    first_segment = false;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => Token::Path(text),
        }
    }

    /// A colon glued to `| name` starts a filter argument; a spaced colon is
    /// the ternary separator.
    fn filter_arg_follows(&self) -> bool {
        let n = self.tokens.len();
        if n < 2 {
            return false;
        }
        let glued = self.pos >= 2 && !self.chars[self.pos - 2].is_whitespace();
        glued
            && matches!(self.tokens[n - 2], Token::Pipe)
            && matches!(&self.tokens[n - 1], Token::Path(name) if !name.contains('.'))
    }

    fn filter_arg(&mut self) -> Result<Token, LexError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        match self.peek() {
            Some(q @ ('\'' | '"')) => self.quoted(q).map(Token::FilterArg),
            _ => {
                let start = self.pos;
                let mut depth = 0usize;
                while let Some(c) = self.peek() {
                    match c {
                        c if c.is_whitespace() || c == '|' => break,
                        '(' => depth += 1,
                        ')' if depth == 0 => break,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    self.pos += 1;
                }
                Ok(Token::FilterArg(self.chars[start..self.pos].iter().collect()))
            }
        }
    }

    fn operator(&mut self, c: char) -> Result<Token, LexError> {
        let next = self.peek_at(1);
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('!', _) => (Token::Bang, 1),
            ('>', _) => (Token::Gt, 1),
            ('<', _) => (Token::Lt, 1),
            ('|', _) => (Token::Pipe, 1),
            ('?', _) => (Token::Question, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            _ => return Err(self.error(format!("unexpected character '{c}'"))),
        };
        self.pos += width;
        Ok(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> Token {
        Token::Path(p.to_string())
    }

    #[test]
    fn paths_and_operators() {
        let toks = tokenize("ctx.a.0 >= 10 and not steps.fetch-notes.output").unwrap();
        assert_eq!(
            toks,
            vec![
                path("ctx.a.0"),
                Token::Ge,
                Token::Num(10.0),
                Token::And,
                Token::Not,
                path("steps.fetch-notes.output"),
            ]
        );
    }

    #[test]
    fn leading_segment_minus_is_subtraction() {
        let toks = tokenize("count-1").unwrap();
        assert_eq!(toks, vec![path("count"), Token::Minus, Token::Num(1.0)]);
    }

    #[test]
    fn filter_args_raw_and_quoted() {
        let toks = tokenize("x | date:Y-m-d | jsonpath:$.a.b | default:'n/a'").unwrap();
        assert_eq!(
            toks,
            vec![
                path("x"),
                Token::Pipe,
                path("date"),
                Token::Colon,
                Token::FilterArg("Y-m-d".into()),
                Token::Pipe,
                path("jsonpath"),
                Token::Colon,
                Token::FilterArg("$.a.b".into()),
                Token::Pipe,
                path("default"),
                Token::Colon,
                Token::FilterArg("n/a".into()),
            ]
        );
    }

    #[test]
    fn raw_arg_stops_at_unbalanced_paren() {
        let toks = tokenize("(x | take:3)").unwrap();
        assert_eq!(toks[4], Token::FilterArg("3".into()));
        assert_eq!(toks[5], Token::RParen);
    }

    #[test]
    fn spaced_colon_is_ternary() {
        let toks = tokenize("c ? x|upper : y").unwrap();
        assert_eq!(
            toks,
            vec![
                path("c"),
                Token::Question,
                path("x"),
                Token::Pipe,
                path("upper"),
                Token::Colon,
                path("y"),
            ]
        );
    }

    #[test]
    fn strings_with_escapes() {
        let toks = tokenize(r#"'it\'s' "a\nb""#).unwrap();
        assert_eq!(toks, vec![Token::Str("it's".into()), Token::Str("a\nb".into())]);
    }

    #[test]
    fn errors_are_reported() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a # b").is_err());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            tokenize("A OR b && c || NOT d").unwrap(),
            vec![path("A"), Token::Or, path("b"), Token::And, path("c"), Token::Or, Token::Not, path("d")]
        );
    }
}
