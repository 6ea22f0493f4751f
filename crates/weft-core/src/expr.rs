// SPDX-License-Identifier: Apache-2.0
//! Expression-evaluation seam used by attribute predicates and computed labels.
//!
//! The matcher and rewriter only depend on the [`ExprEval`] trait; the
//! built-in [`SimpleEvaluator`] covers the rule-authoring surface:
//! `#{name}` placeholders, single-quoted string literals, numeric and string
//! comparisons, boolean connectives, and arithmetic / string concatenation
//! via `+`. The string `"1.0"` is the only truthy result.
//
// Numeric equality here is the rule language's own `==`; epsilon fuzzing
// would change which rules match.
#![allow(clippy::float_cmp)]

use std::collections::BTreeMap;

use thiserror::Error;

/// Variable bindings for one evaluation: attribute name → binding token.
///
/// Tokens follow [`crate::AttrValue::binding_token`]: strings are
/// single-quoted, booleans are `1.0` / `0.0`.
pub type Bindings = BTreeMap<String, String>;

/// Errors produced while evaluating an expression.
///
/// Callers on the matching path convert every variant to "predicate is
/// false"; the variants exist so a diagnostic channel can be layered on
/// without changing the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A `#{name}` placeholder had no binding.
    #[error("unbound variable: {0}")]
    UnboundVariable(String),
    /// A `#{` placeholder was never closed.
    #[error("unterminated placeholder")]
    UnterminatedPlaceholder,
    /// A single-quoted string literal was never closed.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// An unexpected character or token was encountered.
    #[error("unexpected token near offset {0}")]
    UnexpectedToken(usize),
    /// The expression ended while an operand was still expected.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// An arithmetic operator was applied to a non-numeric operand.
    #[error("type error: expected a number")]
    NotANumber,
}

/// Evaluates rule expressions against a set of attribute bindings.
///
/// Implementations must be pure: same bindings and text, same result.
pub trait ExprEval {
    /// Evaluates `text` under `bindings`, returning the rendered result.
    fn evaluate(&self, bindings: &Bindings, text: &str) -> Result<String, EvalError>;

    /// Evaluates `text` as a predicate: `Ok("1.0")` is the only truthy result.
    ///
    /// Evaluation failures are swallowed into `false`; malformed predicates
    /// silently exclude candidates rather than aborting a search.
    fn is_true(&self, bindings: &Bindings, text: &str) -> bool {
        self.evaluate(bindings, text).as_deref() == Ok("1.0")
    }
}

/// Built-in recursive-descent evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleEvaluator;

impl ExprEval for SimpleEvaluator {
    fn evaluate(&self, bindings: &Bindings, text: &str) -> Result<String, EvalError> {
        let substituted = substitute(bindings, text)?;
        let tokens = tokenize(&substituted)?;
        let mut parser = Parser { tokens, pos: 0 };
        let value = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(EvalError::UnexpectedToken(parser.pos));
        }
        Ok(value.render())
    }
}

/// Replaces every `#{name}` placeholder with its binding token.
fn substitute(bindings: &Bindings, text: &str) -> Result<String, EvalError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(EvalError::UnterminatedPlaceholder)?;
        let name = &tail[..end];
        let token = bindings
            .get(name)
            .ok_or_else(|| EvalError::UnboundVariable(name.to_owned()))?;
        out.push_str(token);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, EvalError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' => {
                let tail = &text[i + 1..];
                let end = tail.find('\'').ok_or(EvalError::UnterminatedString)?;
                tokens.push(Token::Str(tail[..end].to_owned()));
                i += end + 2;
            }
            '0'..='9' | '.' => {
                let mut j = i;
                while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == b'.') {
                    j += 1;
                }
                let num = text[i..j]
                    .parse::<f64>()
                    .map_err(|_| EvalError::UnexpectedToken(i))?;
                tokens.push(Token::Num(num));
                i = j;
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                // The two-byte peek must respect UTF-8 boundaries; a
                // multi-byte character after an operator is not part of a
                // wider operator.
                let two = if i + 2 <= bytes.len() && text.is_char_boundary(i + 2) {
                    &text[i..i + 2]
                } else {
                    ""
                };
                let op = match two {
                    "==" => Some("=="),
                    "!=" => Some("!="),
                    "<=" => Some("<="),
                    ">=" => Some(">="),
                    "&&" => Some("&&"),
                    "||" => Some("||"),
                    _ => None,
                };
                if let Some(op) = op {
                    tokens.push(Token::Op(op));
                    i += 2;
                } else {
                    match c {
                        '<' => tokens.push(Token::Op("<")),
                        '>' => tokens.push(Token::Op(">")),
                        '!' => tokens.push(Token::Op("!")),
                        _ => return Err(EvalError::UnexpectedToken(i)),
                    }
                    i += 1;
                }
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    _ => "/",
                }));
                i += 1;
            }
            _ => return Err(EvalError::UnexpectedToken(i)),
        }
    }
    Ok(tokens)
}

/// Intermediate evaluation value. Booleans are `Num(1.0)` / `Num(0.0)`.
#[derive(Debug, Clone, PartialEq)]
enum Val {
    Num(f64),
    Str(String),
}

impl Val {
    fn truth(b: bool) -> Self {
        Self::Num(if b { 1.0 } else { 0.0 })
    }

    fn is_truthy(&self) -> bool {
        matches!(self, Self::Num(v) if *v == 1.0)
    }

    fn as_num(&self) -> Result<f64, EvalError> {
        match self {
            Self::Num(v) => Ok(*v),
            Self::Str(_) => Err(EvalError::NotANumber),
        }
    }

    /// Renders the value as the evaluator's result string.
    ///
    /// Strings render raw (unquoted) so computed edge labels come out as
    /// plain label text.
    fn render(&self) -> String {
        match self {
            Self::Num(v) => crate::value::format_float(*v),
            Self::Str(s) => s.clone(),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        let op = match self.tokens.get(self.pos) {
            Some(Token::Op(op)) if ops.contains(op) => *op,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn expr(&mut self) -> Result<Val, EvalError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Val, EvalError> {
        let mut lhs = self.and_expr()?;
        while self.eat_op(&["||"]).is_some() {
            let rhs = self.and_expr()?;
            lhs = Val::truth(lhs.is_truthy() || rhs.is_truthy());
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Val, EvalError> {
        let mut lhs = self.cmp_expr()?;
        while self.eat_op(&["&&"]).is_some() {
            let rhs = self.cmp_expr()?;
            lhs = Val::truth(lhs.is_truthy() && rhs.is_truthy());
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Val, EvalError> {
        let lhs = self.add_expr()?;
        let Some(op) = self.eat_op(&["==", "!=", "<=", ">=", "<", ">"]) else {
            return Ok(lhs);
        };
        let rhs = self.add_expr()?;
        Ok(Val::truth(compare(op, &lhs, &rhs)))
    }

    fn add_expr(&mut self) -> Result<Val, EvalError> {
        let mut lhs = self.mul_expr()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.mul_expr()?;
            lhs = match (op, &lhs, &rhs) {
                // `+` concatenates when either operand is a string.
                ("+", Val::Str(_), _) | ("+", _, Val::Str(_)) => {
                    Val::Str(format!("{}{}", lhs.render(), rhs.render()))
                }
                ("+", _, _) => Val::Num(lhs.as_num()? + rhs.as_num()?),
                _ => Val::Num(lhs.as_num()? - rhs.as_num()?),
            };
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Val, EvalError> {
        let mut lhs = self.unary_expr()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let rhs = self.unary_expr()?;
            let (a, b) = (lhs.as_num()?, rhs.as_num()?);
            lhs = Val::Num(if op == "*" { a * b } else { a / b });
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Val, EvalError> {
        if self.eat_op(&["!"]).is_some() {
            let v = self.unary_expr()?;
            return Ok(Val::truth(!v.is_truthy()));
        }
        if self.eat_op(&["-"]).is_some() {
            let v = self.unary_expr()?;
            return Ok(Val::Num(-v.as_num()?));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Val, EvalError> {
        match self.peek().cloned() {
            Some(Token::Num(v)) => {
                self.pos += 1;
                Ok(Val::Num(v))
            }
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Val::Str(s))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let v = self.expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(v)
                    }
                    _ => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(_) => Err(EvalError::UnexpectedToken(self.pos)),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

fn compare(op: &str, lhs: &Val, rhs: &Val) -> bool {
    match (lhs, rhs) {
        (Val::Num(a), Val::Num(b)) => match op {
            "==" => a == b,
            "!=" => a != b,
            "<" => a < b,
            "<=" => a <= b,
            ">" => a > b,
            _ => a >= b,
        },
        _ => {
            let (a, b) = (lhs.render(), rhs.render());
            match op {
                "==" => a == b,
                "!=" => a != b,
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                _ => a >= b,
            }
        }
    }
}
