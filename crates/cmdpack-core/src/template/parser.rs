//! Precedence-climbing parser for template expressions.
//!
//! Lowest to highest: ternary, leading `not`, `or`, `and`, comparison,
//! `+ -`, `* /`, unary `! -`, filters, primary.
//!
//! A `not` keyword negates the rest of the operand it starts: at the start
//! of an expression that is everything up to `?`; after `or` it is the
//! following `and` chain; after `and` it is the following comparison.
//!
//! Nesting is bounded: every group, prefix operator, filter, ternary branch
//! and chained operand counts one level, and more than [`MAX_DEPTH`] levels
//! is a [`ParseError::TooDeep`].

use serde_json::Value;
use thiserror::Error;

use super::ast::{BinaryOp, Expr};
use super::lexer::{tokenize, LexError, Token};
use crate::value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected token '{0}'")]
    Unexpected(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("empty expression")]
    Empty,

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

pub const MAX_DEPTH: usize = 128;

pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.ternary()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(ParseError::Unexpected(tok.to_string())),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        match self.advance() {
            Some(ref tok) if tok == expected => Ok(()),
            Some(tok) => Err(ParseError::Unexpected(tok.to_string())),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    /// Enter one more nesting level. Callers restore `depth` on success.
    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.leading_not()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let saved = self.depth;
        self.descend()?;
        let then = self.ternary()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.ternary()?;
        self.depth = saved;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn leading_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            let saved = self.depth;
            self.descend()?;
            let inner = self.leading_not()?;
            self.depth = saved;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.or()
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let saved = self.depth;
        let mut left = self.or_operand()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let right = self.or_operand()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = saved;
        Ok(left)
    }

    fn or_operand(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            let saved = self.depth;
            self.descend()?;
            let inner = self.or_operand()?;
            self.depth = saved;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.and()
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let saved = self.depth;
        let mut left = self.and_operand()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let right = self.and_operand()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = saved;
        Ok(left)
    }

    fn and_operand(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            let saved = self.depth;
            self.descend()?;
            let inner = self.and_operand()?;
            self.depth = saved;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let saved = self.depth;
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Le) => BinaryOp::Le,
                _ => {
                    self.depth = saved;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let saved = self.depth;
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth = saved;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let saved = self.depth;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => {
                    self.depth = saved;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Bang) | Some(Token::Not) => {
                self.pos += 1;
                let inner = self.prefixed()?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                let inner = self.prefixed()?;
                Ok(Expr::Negate(Box::new(inner)))
            }
            _ => self.filtered(),
        }
    }

    fn prefixed(&mut self) -> Result<Expr, ParseError> {
        let saved = self.depth;
        self.descend()?;
        let inner = self.unary()?;
        self.depth = saved;
        Ok(inner)
    }

    fn filtered(&mut self) -> Result<Expr, ParseError> {
        let saved = self.depth;
        let mut expr = self.primary()?;
        while self.eat(&Token::Pipe) {
            self.descend()?;
            let name = match self.advance() {
                Some(Token::Path(name)) if !name.contains('.') => name,
                Some(tok) => return Err(ParseError::Unexpected(tok.to_string())),
                None => return Err(ParseError::UnexpectedEnd),
            };
            let arg = if self.eat(&Token::Colon) {
                match self.advance() {
                    Some(Token::FilterArg(arg)) => Some(arg),
                    Some(tok) => return Err(ParseError::Unexpected(tok.to_string())),
                    None => return Err(ParseError::UnexpectedEnd),
                }
            } else {
                None
            };
            expr = Expr::Filter {
                input: Box::new(expr),
                name: name.to_ascii_lowercase(),
                arg,
            };
        }
        self.depth = saved;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(value::number(n))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Path(p)) => Ok(Expr::Path(p)),
            Some(Token::LParen) => {
                let saved = self.depth;
                self.descend()?;
                let inner = self.ternary()?;
                self.expect(&Token::RParen)?;
                self.depth = saved;
                Ok(inner)
            }
            Some(tok) => Err(ParseError::Unexpected(tok.to_string())),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> Expr {
        parse(s).unwrap_or_else(|e| panic!("failed to parse {s:?}: {e}"))
    }

    fn path(s: &str) -> Box<Expr> {
        Box::new(Expr::Path(s.to_string()))
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            p("a or b and c"),
            Expr::Or(path("a"), Box::new(Expr::And(path("b"), path("c"))))
        );
    }

    #[test]
    fn leading_not_covers_whole_expression() {
        assert_eq!(
            p("not a or b"),
            Expr::Not(Box::new(Expr::Or(path("a"), path("b"))))
        );
    }

    #[test]
    fn not_after_or_covers_and_chain() {
        assert_eq!(
            p("a or not b and c"),
            Expr::Or(
                path("a"),
                Box::new(Expr::Not(Box::new(Expr::And(path("b"), path("c")))))
            )
        );
    }

    #[test]
    fn bang_is_tight() {
        assert_eq!(
            p("!a or b"),
            Expr::Or(Box::new(Expr::Not(path("a"))), path("b"))
        );
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(
            p("1 + 2 * 3"),
            binary(
                BinaryOp::Add,
                Expr::Literal(json!(1)),
                binary(BinaryOp::Mul, Expr::Literal(json!(2)), Expr::Literal(json!(3)))
            )
        );
    }

    #[test]
    fn filters_bind_before_comparison() {
        assert_eq!(
            p("items | length > 3"),
            binary(
                BinaryOp::Gt,
                Expr::Filter {
                    input: path("items"),
                    name: "length".into(),
                    arg: None
                },
                Expr::Literal(json!(3))
            )
        );
    }

    #[test]
    fn filter_chain_is_left_associative() {
        let Expr::Filter { input, name, arg } = p("x | trim | truncate:5") else {
            panic!("expected filter");
        };
        assert_eq!(name, "truncate");
        assert_eq!(arg.as_deref(), Some("5"));
        assert!(matches!(*input, Expr::Filter { ref name, .. } if name == "trim"));
    }

    #[test]
    fn ternary_is_right_associative() {
        let Expr::Ternary { otherwise, .. } = p("a ? 'x' : b ? 'y' : 'z'") else {
            panic!("expected ternary");
        };
        assert!(matches!(*otherwise, Expr::Ternary { .. }));
    }

    #[test]
    fn parentheses_group() {
        assert_eq!(
            p("(a or b) and c"),
            Expr::And(Box::new(Expr::Or(path("a"), path("b"))), path("c"))
        );
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("a +"), Err(ParseError::UnexpectedEnd));
        assert!(matches!(parse("(a"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("a b"), Err(ParseError::Unexpected(_))));
        assert!(matches!(parse("a ? b"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("x | "), Err(ParseError::UnexpectedEnd)));
    }

    #[test]
    fn nesting_within_the_bound_parses() {
        let nested = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(p(&nested), Expr::Literal(json!(1)));
        let chain = format!("1{}", " + 1".repeat(100));
        assert!(parse(&chain).is_ok());
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let too_deep = MAX_DEPTH + 1;
        let cases = [
            format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000)),
            format!("1{}", " + 1".repeat(20_000)),
            format!("{}ctx.a", "!".repeat(200_000)),
            format!("{}ctx.a", "not ".repeat(too_deep)),
            format!("{}1", "-".repeat(too_deep)),
            format!("a{}", " or b".repeat(too_deep)),
            format!("a{}", " and b".repeat(too_deep)),
            format!("a{}", " == b".repeat(too_deep)),
            format!("a{}", " * b".repeat(too_deep)),
            format!("x{}", " | trim".repeat(too_deep)),
            format!("{}c", "a ? b : ".repeat(too_deep)),
        ];
        for src in &cases {
            assert_eq!(parse(src), Err(ParseError::TooDeep(MAX_DEPTH)), "{}", &src[..20]);
        }
    }
}
