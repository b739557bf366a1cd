//! Parser and evaluator for the table condition language.
//!
//! Grammar (whitespace insensitive):
//!
//! ```text
//! expr    := and ('|' and)*
//! and     := unary ('&' unary)*
//! unary   := '~' unary | '(' expr ')' | compare
//! compare := operand ('==' | '!=' | '<' | '<=' | '>' | '>=') operand
//! operand := identifier | `quoted identifier` | number | string | True | False
//! ```
//!
//! Strings use double or single quotes with backslash escapes. Column names
//! that are not plain identifiers are enclosed in backticks. Comparisons
//! against a null cell are false.

use std::cmp::Ordering;

use fstore_result::{Error, Result};
use fstore_types::Value;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(Value),
}

/// Parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Compare(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl Condition {
    pub fn parse(text: &str) -> Result<Condition> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let cond = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(syntax(format!(
                "unexpected trailing input in condition '{text}'"
            )));
        }
        Ok(cond)
    }

    /// Evaluate against one row. `columns` maps column names to row indices.
    pub fn evaluate(&self, columns: &FxHashMap<String, usize>, row: &[Value]) -> Result<bool> {
        match self {
            Condition::And(a, b) => Ok(a.evaluate(columns, row)? && b.evaluate(columns, row)?),
            Condition::Or(a, b) => Ok(a.evaluate(columns, row)? || b.evaluate(columns, row)?),
            Condition::Not(inner) => Ok(!inner.evaluate(columns, row)?),
            Condition::Compare { left, op, right } => {
                let l = resolve(left, columns, row)?;
                let r = resolve(right, columns, row)?;
                Ok(compare(l, r).is_some_and(|ord| match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::NotEq => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::LtEq => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::GtEq => ord != Ordering::Less,
                }))
            }
        }
    }
}

fn syntax(msg: String) -> Error {
    Error::Backend(format!("condition syntax error: {msg}"))
}

fn resolve<'a>(
    operand: &'a Operand,
    columns: &FxHashMap<String, usize>,
    row: &'a [Value],
) -> Result<&'a Value> {
    match operand {
        Operand::Literal(v) => Ok(v),
        Operand::Column(name) => columns
            .get(name)
            .and_then(|&i| row.get(i))
            .ok_or_else(|| Error::Backend(format!("unknown column in condition: {name}"))),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Or);
                i += 1;
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, len) = match (c, next) {
                    ('=', Some('=')) => (CompareOp::Eq, 2),
                    ('!', Some('=')) => (CompareOp::NotEq, 2),
                    ('<', Some('=')) => (CompareOp::LtEq, 2),
                    ('>', Some('=')) => (CompareOp::GtEq, 2),
                    ('<', _) => (CompareOp::Lt, 1),
                    ('>', _) => (CompareOp::Gt, 1),
                    _ => return Err(syntax(format!("unexpected '{c}' at {i}"))),
                };
                tokens.push(Token::Compare(op));
                i += len;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax("unterminated string".into())),
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| syntax("dangling escape".into()))?;
                            s.push(*escaped);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Value::String(s)));
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .map(|n| start + n)
                    .ok_or_else(|| syntax("unterminated quoted identifier".into()))?;
                tokens.push(Token::Ident(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    let exponent_sign =
                        (ch == '-' || ch == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E') || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let lexeme: String = chars[start..i].iter().collect();
                let value = if let Ok(v) = lexeme.parse::<i64>() {
                    Value::Long(v)
                } else if let Ok(v) = lexeme.parse::<f64>() {
                    Value::Double(v)
                } else {
                    return Err(syntax(format!("invalid number '{lexeme}'")));
                };
                tokens.push(Token::Literal(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "True" => Token::Literal(Value::Bool(true)),
                    "False" => Token::Literal(Value::Bool(false)),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(syntax(format!("unexpected '{other}' at {i}"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Result<Condition> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Condition> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Condition> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Condition::Not(Box::new(self.unary()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(syntax(format!("expected ')', found {other:?}"))),
                }
            }
            _ => self.compare(),
        }
    }

    fn compare(&mut self) -> Result<Condition> {
        let left = self.operand()?;
        let op = match self.next() {
            Some(Token::Compare(op)) => op,
            other => return Err(syntax(format!("expected comparison, found {other:?}"))),
        };
        let right = self.operand()?;
        Ok(Condition::Compare { left, op, right })
    }

    fn operand(&mut self) -> Result<Operand> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Column(name)),
            Some(Token::Literal(v)) => Ok(Operand::Literal(v)),
            other => Err(syntax(format!("expected operand, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_env() -> (FxHashMap<String, usize>, Vec<Value>) {
        let mut cols = FxHashMap::default();
        cols.insert("a".to_string(), 0);
        cols.insert("b".to_string(), 1);
        cols.insert("c".to_string(), 2);
        (
            cols,
            vec![Value::Long(12), Value::String("x\"y".into()), Value::Null],
        )
    }

    fn eval(text: &str) -> bool {
        let (cols, row) = row_env();
        Condition::parse(text)
            .expect("parse")
            .evaluate(&cols, &row)
            .expect("evaluate")
    }

    #[test]
    fn equality_and_boolean_connectives() {
        assert!(eval("(a==12)"));
        assert!(!eval("(a==-1)"));
        assert!(eval("(a==12) & (b==\"x\\\"y\")"));
        assert!(eval("((a==1) | (a==12))"));
        assert!(!eval("((a==1) | (a==2)) & (b==\"x\\\"y\")"));
        assert!(eval("~(a==1)"));
        assert!(eval("a >= 12.0"));
        assert!(eval("a < 13"));
    }

    #[test]
    fn null_cells_never_match() {
        assert!(!eval("(c==0)"));
        assert!(!eval("(c!=0)"));
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        assert!(Condition::parse("(a==1").is_err());
        assert!(Condition::parse("a=1").is_err());
        assert!(Condition::parse("a==\"open").is_err());
        assert!(Condition::parse("(a==1) (b==2)").is_err());
    }

    #[test]
    fn unknown_columns_fail_at_evaluation() {
        let (cols, row) = row_env();
        let cond = Condition::parse("zz==1").expect("parse");
        assert!(cond.evaluate(&cols, &row).is_err());
    }
}
