//! Arithmetic expression evaluator
//!
//! Recursive descent over numeric literals, `+ - * /`, unary sign and
//! parentheses. Nothing else is accepted.

use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("empty expression")]
    Empty,

    #[error("invalid character '{ch}' at position {pos}")]
    InvalidCharacter { ch: char, pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected '{token}' at position {pos}")]
    UnexpectedToken { token: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression nested too deeply")]
    TooDeep,

    #[error("result is not a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let token = match c {
            ' ' => {
                i += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(literal.clone()))?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            other => return Err(CalcError::InvalidCharacter { ch: other, pos: i }),
        };
        tokens.push((token, i));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn unexpected(&self) -> CalcError {
        match self.tokens.get(self.pos) {
            Some((token, at)) => CalcError::UnexpectedToken {
                token: token.describe(),
                pos: *at,
            },
            None => CalcError::UnexpectedEnd,
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    // unary := ('+' | '-') unary | primary
    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.nested(|p| p.unary())
            }
            Some(Token::Minus) => {
                self.advance();
                self.nested(|p| p.unary()).map(|v| -v)
            }
            _ => self.primary(),
        }
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Number(n)) => {
                self.advance();
                Ok(n)
            }
            Some(Token::LParen) => {
                self.advance();
                let value = self.nested(|p| p.expr())?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.advance();
                        Ok(value)
                    }
                    _ => Err(self.unexpected()),
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    fn nested<F>(&mut self, f: F) -> Result<f64, CalcError>
    where
        F: FnOnce(&mut Self) -> Result<f64, CalcError>,
    {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        let result = f(self);
        self.depth -= 1;
        result
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(input: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.peek().is_some() {
        return Err(parser.unexpected());
    }
    if !value.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(value)
}
