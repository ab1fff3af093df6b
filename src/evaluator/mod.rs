//! Restricted boolean expression evaluation for condition nodes.
//!
//! The grammar is deliberately small: comparisons, `and`/`or`/`not`,
//! parentheses, literals, and dotted context paths. Anything else
//! (function calls, arithmetic, indexing expressions) is rejected at
//! parse time, so arbitrary code never evaluates.
//!
//! ```text
//! expr    := or
//! or      := and (("or" | "||") and)*
//! and     := unary (("and" | "&&") unary)*
//! unary   := ("not" | "!") unary | cmp
//! cmp     := operand (op operand)?
//! op      := == != > >= < <= contains
//! operand := literal | path | "(" expr ")"
//! ```

pub mod operators;

use serde_json::Value;

use crate::error::NodeError;
use crate::template::lookup_path;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, NodeError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Eq);
                } else {
                    return Err(NodeError::ExpressionError(
                        "single '=' is not an operator, use '=='".into(),
                    ));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_some() {
                    tokens.push(Token::And);
                } else {
                    return Err(NodeError::ExpressionError("expected '&&'".into()));
                }
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_some() {
                    tokens.push(Token::Or);
                } else {
                    return Err(NodeError::ExpressionError("expected '||'".into()));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(NodeError::ExpressionError(
                                "unterminated string literal".into(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '-' | '0'..='9' => {
                let mut s = String::new();
                s.push(c);
                chars.next();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        s.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = s
                    .parse::<f64>()
                    .map_err(|_| NodeError::ExpressionError(format!("bad number '{}'", s)))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                        s.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match s.as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "not" => tokens.push(Token::Not),
                    "contains" => tokens.push(Token::Contains),
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    "null" => tokens.push(Token::Null),
                    _ => tokens.push(Token::Path(s)),
                }
            }
            other => {
                return Err(NodeError::ExpressionError(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a Value,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<bool, NodeError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = left || right;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<bool, NodeError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_unary()?;
            left = left && right;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<bool, NodeError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            return Ok(!self.parse_unary()?);
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<bool, NodeError> {
        let left = self.parse_operand()?;

        let op = match self.peek() {
            Some(Token::Eq) => Token::Eq,
            Some(Token::Ne) => Token::Ne,
            Some(Token::Gt) => Token::Gt,
            Some(Token::Ge) => Token::Ge,
            Some(Token::Lt) => Token::Lt,
            Some(Token::Le) => Token::Le,
            Some(Token::Contains) => Token::Contains,
            _ => return Ok(operators::truthy(&left)),
        };
        self.advance();
        let right = self.parse_operand()?;

        let result = match op {
            Token::Eq => operators::equal(&left, &right),
            Token::Ne => !operators::equal(&left, &right),
            Token::Contains => operators::contains(&left, &right),
            Token::Gt | Token::Ge | Token::Lt | Token::Le => {
                let (Some(a), Some(b)) =
                    (operators::as_number(&left), operators::as_number(&right))
                else {
                    return Ok(false);
                };
                match op {
                    Token::Gt => a > b,
                    Token::Ge => a >= b,
                    Token::Lt => a < b,
                    Token::Le => a <= b,
                    _ => unreachable!(),
                }
            }
            _ => unreachable!(),
        };
        Ok(result)
    }

    fn parse_operand(&mut self) -> Result<Value, NodeError> {
        match self.advance().cloned() {
            Some(Token::Number(n)) => Ok(serde_json::json!(n)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Bool(b)) => Ok(Value::Bool(b)),
            Some(Token::Null) => Ok(Value::Null),
            Some(Token::Path(path)) => {
                Ok(lookup_path(self.ctx, &path).cloned().unwrap_or(Value::Null))
            }
            Some(Token::LParen) => {
                let value = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(Value::Bool(value)),
                    _ => Err(NodeError::ExpressionError("expected ')'".into())),
                }
            }
            other => Err(NodeError::ExpressionError(format!(
                "expected operand, got {:?}",
                other
            ))),
        }
    }
}

/// Evaluate `expression` against the node context as a pure boolean.
pub fn evaluate(expression: &str, ctx: &Value) -> Result<bool, NodeError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(NodeError::ExpressionError("empty expression".into()));
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        ctx,
    };
    let result = parser.parse_or()?;
    if parser.pos != tokens.len() {
        return Err(NodeError::ExpressionError(format!(
            "trailing input at token {}",
            parser.pos
        )));
    }
    Ok(result)
}
