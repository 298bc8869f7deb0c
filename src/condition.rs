//! Restricted boolean expressions for conditional patterns.
//!
//! Conditions are resolved (captures, variables, definitions) before they get
//! here, so they only contain literals. The grammar allows comparisons and
//! boolean connectives and nothing else:
//!
//! ```text
//! expr  := and (("or" | "||") and)*
//! and   := not (("and" | "&&") not)*
//! not   := ("not" | "!") not | cmp
//! cmp   := value (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in") value)?
//! value := NUMBER | STRING | "true" | "false" | WORD+ | "(" expr ")"
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, YoozError};

/// Deepest nesting of parentheses and negations a condition may use.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Word(String),
    True,
    False,
    And,
    Or,
    Not,
    In,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LeftParen,
    RightParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Word(w) => write!(f, "word '{}'", w),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::In => write!(f, "in"),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
        }
    }
}

/// A value produced while evaluating a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `true`, `false`, or the result of a comparison
    Bool(bool),
    /// A numeric literal
    Number(f64),
    /// A quoted string or a run of bare words
    Str(String),
}

impl Value {
    /// Bools as is, numbers when non-zero, strings when non-empty.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

fn invalid(message: impl Into<String>) -> YoozError {
    YoozError::InvalidCondition(message.into())
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '(' | ')' | '{' | '}' | '"' | '\'' | '=' | '!' | '<' | '>' | '&' | '|'
        )
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LeftParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RightParen);
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Equal);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEqual);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::LessEqual);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Less);
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::GreaterEqual);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Greater);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(invalid(format!("unterminated string in '{}'", input)));
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => match word.parse::<f64>() {
                        Ok(n) => Token::Number(n),
                        Err(_) => Token::Word(word),
                    },
                });
            }
            other => {
                return Err(invalid(format!("unexpected character '{}' in '{}'", other, input)))
            }
        }
    }
    Ok(tokens)
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

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(invalid(format!("nested deeper than {} levels", MAX_DEPTH)));
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> Result<Value> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.and()?;
            left = Value::Bool(left.truthy() || right.truthy());
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Value> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.not()?;
            left = Value::Bool(left.truthy() && right.truthy());
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Value> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.descend()?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Value::Bool(!inner.truthy()));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Value> {
        let left = self.value()?;
        let op = match self.peek() {
            Some(
                op @ (Token::Equal
                | Token::NotEqual
                | Token::Less
                | Token::LessEqual
                | Token::Greater
                | Token::GreaterEqual
                | Token::In),
            ) => op.clone(),
            _ => return Ok(left),
        };
        self.advance();
        let right = self.value()?;
        Ok(Value::Bool(compare(&left, &op, &right)))
    }

    fn value(&mut self) -> Result<Value> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::True) => Ok(Value::Bool(true)),
            Some(Token::False) => Ok(Value::Bool(false)),
            Some(Token::Word(first)) => {
                let mut words = vec![first];
                while let Some(Token::Word(_) | Token::Number(_)) = self.peek() {
                    match self.advance() {
                        Some(Token::Word(w)) => words.push(w),
                        Some(Token::Number(n)) => words.push(n.to_string()),
                        _ => break,
                    }
                }
                Ok(Value::Str(words.join(" ")))
            }
            Some(Token::LeftParen) => {
                self.descend()?;
                let inner = self.or()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RightParen) => Ok(inner),
                    Some(other) => Err(invalid(format!("expected ')', found {}", other))),
                    None => Err(invalid("expected ')', found end of input")),
                }
            }
            Some(other) => Err(invalid(format!("expected a value, found {}", other))),
            None => Err(invalid("expected a value, found end of input")),
        }
    }
}

fn compare(left: &Value, op: &Token, right: &Value) -> bool {
    if *op == Token::In {
        return right.as_text().contains(&left.as_text());
    }
    let ordering = match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(left.as_text().cmp(&right.as_text())),
        },
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        Token::Equal => ordering == Ordering::Equal,
        Token::NotEqual => ordering != Ordering::Equal,
        Token::Less => ordering == Ordering::Less,
        Token::LessEqual => ordering != Ordering::Greater,
        Token::Greater => ordering == Ordering::Greater,
        Token::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    }
}

/// Evaluates an already-resolved condition to a boolean.
pub fn evaluate(condition: &str) -> Result<bool> {
    let tokens = tokenize(condition)?;
    if tokens.is_empty() {
        return Err(invalid("empty condition"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.or()?;
    if let Some(extra) = parser.peek() {
        return Err(invalid(format!("unexpected {} in '{}'", extra, condition)));
    }
    Ok(value.truthy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_comparisons() {
        assert!(evaluate("25 > 18").unwrap());
        assert!(!evaluate("12 >= 18").unwrap());
        assert!(evaluate("18 >= 18").unwrap());
        assert!(evaluate("3 != 4").unwrap());
        assert!(evaluate("10 > 9").unwrap());
    }

    #[test]
    fn test_string_comparisons() {
        assert!(evaluate("Ali == Ali").unwrap());
        assert!(evaluate("\"Ali Reza\" == 'Ali Reza'").unwrap());
        assert!(evaluate("Ali Reza == Ali Reza").unwrap());
        assert!(!evaluate("Ali == Sara").unwrap());
        assert!(evaluate("تهران == تهران").unwrap());
    }

    #[test]
    fn test_boolean_connectives() {
        assert!(evaluate("20 > 18 and 20 < 30").unwrap());
        assert!(evaluate("5 > 18 || 5 < 10").unwrap());
        assert!(!evaluate("not (1 == 1)").unwrap());
        assert!(evaluate("!false && true").unwrap());
    }

    #[test]
    fn test_containment() {
        assert!(evaluate("tea in 'green tea'").unwrap());
        assert!(!evaluate("coffee in 'green tea'").unwrap());
    }

    #[test]
    fn test_bare_values_use_truthiness() {
        assert!(evaluate("1").unwrap());
        assert!(!evaluate("0").unwrap());
        assert!(evaluate("something").unwrap());
    }

    #[test]
    fn test_rejects_anything_outside_the_grammar() {
        assert!(evaluate("").is_err());
        assert!(evaluate("__import__('os').system('ls')").is_err());
        assert!(evaluate("1 + 1").is_err());
        assert!(evaluate("(1 == 1").is_err());
        assert!(evaluate("1 == 1 )").is_err());
        assert!(evaluate("{missing:age} > 18").is_err());
        assert!(evaluate("'open").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        assert!(evaluate(&format!("{}1{}", "(".repeat(10), ")".repeat(10))).unwrap());
        assert!(evaluate(&"(".repeat(200_000)).is_err());
        assert!(evaluate(&format!("{}true", "!".repeat(200_000))).is_err());
        assert!(evaluate(&format!("{}true", "not ".repeat(100))).is_err());
    }
}
