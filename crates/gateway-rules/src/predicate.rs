//! A compiled predicate tree over [`Request`] fields — the safe
//! replacement for the original's `eval(condition, {"request": request})`.
//! Parsed once at rule-set load time, evaluated side-effect-free per
//! request. Supports field access (`request.priority`,
//! `request.parameter`, `request.impact`, `request.modification`,
//! `request.issuer_id`), the six comparison operators, string/numeric
//! literals, and `and`/`or`/`not` combinators.

use gateway_core::Request;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Priority,
    Parameter,
    Impact,
    Modification,
    IssuerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Compare(Field, CompareOp, Literal),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition parse error: {}", self.0)
    }
}
impl std::error::Error for ParseError {}

impl Predicate {
    pub fn parse(condition: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(condition)?;
        let mut parser = Parser { tokens: tokens.into_iter().peekable() };
        let predicate = parser.parse_or()?;
        if parser.tokens.peek().is_some() {
            return Err(ParseError(format!("unexpected trailing tokens in {condition:?}")));
        }
        Ok(predicate)
    }

    /// Side-effect-free evaluation against one request.
    pub fn evaluate(&self, request: &Request) -> bool {
        match self {
            Predicate::Compare(field, op, literal) => compare(*field, *op, literal, request),
            Predicate::And(a, b) => a.evaluate(request) && b.evaluate(request),
            Predicate::Or(a, b) => a.evaluate(request) || b.evaluate(request),
            Predicate::Not(inner) => !inner.evaluate(request),
        }
    }
}

fn compare(field: Field, op: CompareOp, literal: &Literal, request: &Request) -> bool {
    match field {
        Field::Priority => {
            let Literal::Num(n) = literal else { return false };
            apply_num(op, request.priority as f64, *n)
        }
        Field::Parameter => apply_str(op, &request.parameter, literal),
        Field::Impact => apply_str(op, &request.impact, literal),
        Field::Modification => apply_str(op, request.modification.as_str(), literal),
        Field::IssuerId => apply_str(op, &request.issuer_id, literal),
    }
}

fn apply_num(op: CompareOp, lhs: f64, rhs: f64) -> bool {
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
    }
}

fn apply_str(op: CompareOp, lhs: &str, literal: &Literal) -> bool {
    let rhs = match literal {
        Literal::Str(s) => s.clone(),
        Literal::Num(n) => n.to_string(),
    };
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => lhs < rhs.as_str(),
        CompareOp::Le => lhs <= rhs.as_str(),
        CompareOp::Gt => lhs > rhs.as_str(),
        CompareOp::Ge => lhs >= rhs.as_str(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(Field),
    Op(CompareOp),
    Literal(Literal),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(condition: &str) -> Result<Vec<Token>, ParseError> {
    let mut chars = condition.chars().peekable();
    let mut tokens = Vec::new();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' | '\'' => tokens.push(Token::Literal(Literal::Str(read_quoted(&mut chars, c)?))),
            '=' | '!' | '<' | '>' => tokens.push(Token::Op(read_operator(&mut chars)?)),
            _ if c.is_ascii_digit() || c == '-' => tokens.push(Token::Literal(Literal::Num(read_number(&mut chars)?))),
            _ => tokens.push(read_word(&mut chars)?),
        }
    }
    Ok(tokens)
}

fn read_quoted(chars: &mut Peekable<Chars>, quote: char) -> Result<String, ParseError> {
    chars.next(); // consume opening quote
    let mut value = String::new();
    loop {
        match chars.next() {
            Some(c) if c == quote => return Ok(value),
            Some(c) => value.push(c),
            None => return Err(ParseError("unterminated string literal".to_string())),
        }
    }
}

fn read_operator(chars: &mut Peekable<Chars>) -> Result<CompareOp, ParseError> {
    let first = chars.next().unwrap();
    let second = chars.peek().copied();
    match (first, second) {
        ('=', Some('=')) => {
            chars.next();
            Ok(CompareOp::Eq)
        }
        ('!', Some('=')) => {
            chars.next();
            Ok(CompareOp::Ne)
        }
        ('<', Some('=')) => {
            chars.next();
            Ok(CompareOp::Le)
        }
        ('>', Some('=')) => {
            chars.next();
            Ok(CompareOp::Ge)
        }
        ('<', _) => Ok(CompareOp::Lt),
        ('>', _) => Ok(CompareOp::Gt),
        _ => Err(ParseError(format!("unsupported operator starting with {first:?}"))),
    }
}

fn read_number(chars: &mut Peekable<Chars>) -> Result<f64, ParseError> {
    let mut raw = String::new();
    if chars.peek() == Some(&'-') {
        raw.push(chars.next().unwrap());
    }
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            raw.push(c);
            chars.next();
        } else {
            break;
        }
    }
    raw.parse::<f64>().map_err(|_| ParseError(format!("invalid numeric literal {raw:?}")))
}

fn read_word(chars: &mut Peekable<Chars>) -> Result<Token, ParseError> {
    let mut raw = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            raw.push(c);
            chars.next();
        } else {
            break;
        }
    }
    match raw.as_str() {
        "and" => Ok(Token::And),
        "or" => Ok(Token::Or),
        "not" => Ok(Token::Not),
        "request.priority" => Ok(Token::Field(Field::Priority)),
        "request.parameter" => Ok(Token::Field(Field::Parameter)),
        "request.impact" => Ok(Token::Field(Field::Impact)),
        "request.modification" => Ok(Token::Field(Field::Modification)),
        "request.issuer_id" => Ok(Token::Field(Field::IssuerId)),
        "" => Err(ParseError("unexpected character in condition".to_string())),
        other => Ok(Token::Literal(Literal::Str(other.to_string()))),
    }
}

struct Parser {
    tokens: Peekable<std::vec::IntoIter<Token>>,
}

impl Parser {
    fn parse_or(&mut self) -> Result<Predicate, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.tokens.peek() == Some(&Token::Or) {
            self.tokens.next();
            let rhs = self.parse_and()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Predicate, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.tokens.peek() == Some(&Token::And) {
            self.tokens.next();
            let rhs = self.parse_not()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Predicate, ParseError> {
        if self.tokens.peek() == Some(&Token::Not) {
            self.tokens.next();
            return Ok(Predicate::Not(Box::new(self.parse_not()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Predicate, ParseError> {
        if self.tokens.peek() == Some(&Token::LParen) {
            self.tokens.next();
            let inner = self.parse_or()?;
            match self.tokens.next() {
                Some(Token::RParen) => return Ok(inner),
                _ => return Err(ParseError("expected closing parenthesis".to_string())),
            }
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Predicate, ParseError> {
        let field = match self.tokens.next() {
            Some(Token::Field(f)) => f,
            other => return Err(ParseError(format!("expected a request field, found {other:?}"))),
        };
        let op = match self.tokens.next() {
            Some(Token::Op(op)) => op,
            other => return Err(ParseError(format!("expected a comparison operator, found {other:?}"))),
        };
        let literal = match self.tokens.next() {
            Some(Token::Literal(lit)) => lit,
            other => return Err(ParseError(format!("expected a literal, found {other:?}"))),
        };
        Ok(Predicate::Compare(field, op, literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_request(priority: u8, impact: &str) -> Request {
        Request::new("john", Utc::now(), vec!["bump".to_string()], impact, "MotorSpeed_SP", "900", priority).unwrap()
    }

    #[test]
    fn simple_comparison_evaluates() {
        let predicate = Predicate::parse("request.priority <= 10").unwrap();
        assert!(predicate.evaluate(&sample_request(5, "x")));
        assert!(!predicate.evaluate(&sample_request(20, "x")));
    }

    #[test]
    fn string_equality_evaluates() {
        let predicate = Predicate::parse("request.impact == \"Motor Speed Configuration\"").unwrap();
        assert!(predicate.evaluate(&sample_request(5, "Motor Speed Configuration")));
        assert!(!predicate.evaluate(&sample_request(5, "Other")));
    }

    #[test]
    fn and_or_not_combine() {
        let predicate = Predicate::parse(
            "request.priority <= 10 and (request.impact == \"A\" or not request.impact == \"B\")",
        )
        .unwrap();
        assert!(predicate.evaluate(&sample_request(5, "A")));
        assert!(predicate.evaluate(&sample_request(5, "C")));
        assert!(!predicate.evaluate(&sample_request(5, "B")));
        assert!(!predicate.evaluate(&sample_request(20, "A")));
    }
}
