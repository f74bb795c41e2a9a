//! Filter expression tokenizer
//!
//! Converts filter strings like "e00001v >= 5 and status == 'open'" into a
//! sequence of tokens that can be parsed into an AST.

use std::iter::Peekable;
use std::str::Chars;

/// A token in a filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal (e.g., 123, 45.67, -89, 1.5e10)
    Number(f64),
    /// A string literal ('open' or "open")
    Text(String),
    /// Field names and keywords (and, or, contains, True, False)
    Identifier(String),
    /// Comparison operators: == != >= <= > <
    Operator(String),
    OpenParen,
    CloseParen,
    Comma,
}

/// Error during tokenization
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub message: String,
    pub position: usize,
}

impl TokenizeError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tokenize error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for TokenizeError {}

/// Tokenizer for filter expressions
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(expression: &'a str) -> Self {
        Self {
            chars: expression.chars().peekable(),
            position: 0,
        }
    }

    /// Tokenize the entire expression into a vector of tokens
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' | '\'' => self.read_string()?,
            '(' => {
                self.advance();
                Token::OpenParen
            }
            ')' => {
                self.advance();
                Token::CloseParen
            }
            ',' => {
                self.advance();
                Token::Comma
            }
            '=' => self.read_equals()?,
            '!' => self.read_not_equals()?,
            '<' | '>' => self.read_relational(),
            '-' => self.read_negative_number()?,
            c if c.is_ascii_digit() => self.read_number(String::new())?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            c => {
                return Err(TokenizeError::new(
                    format!("Unexpected character: '{}'", c),
                    self.position,
                ));
            }
        };
        Ok(Some(token))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Read a string literal (single or double quoted, doubled quote escapes)
    fn read_string(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        let Some(quote) = self.advance() else {
            return Err(TokenizeError::new("Expected string literal", start_pos));
        };
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(TokenizeError::new("Unterminated string literal", start_pos));
                }
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        value.push(quote);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
        }

        Ok(Token::Text(value))
    }

    fn read_digits(&mut self, buffer: &mut String) {
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            buffer.push(c);
            self.advance();
        }
    }

    /// Read a number (integer, decimal, or scientific notation)
    fn read_number(&mut self, mut num_str: String) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        self.read_digits(&mut num_str);

        if self.peek() == Some('.') {
            num_str.push('.');
            self.advance();
            self.read_digits(&mut num_str);
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            num_str.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            self.read_digits(&mut num_str);
        }

        let value = num_str
            .parse::<f64>()
            .map_err(|_| TokenizeError::new(format!("Invalid number: {}", num_str), start_pos))?;
        if !value.is_finite() {
            return Err(TokenizeError::new(
                format!("Number out of range: {}", num_str),
                start_pos,
            ));
        }
        Ok(Token::Number(value))
    }

    /// '-' is only valid as the sign of a numeric literal
    fn read_negative_number(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        self.advance();
        match self.peek() {
            Some(c) if c.is_ascii_digit() => self.read_number("-".to_string()),
            _ => Err(TokenizeError::new("Expected digit after '-'", start_pos)),
        }
    }

    /// Field names may contain dots (e.g., item.amount)
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        Token::Identifier(ident)
    }

    fn read_equals(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            Ok(Token::Operator("==".to_string()))
        } else {
            Err(TokenizeError::new("Expected '==' (single '=' is not an operator)", start_pos))
        }
    }

    fn read_not_equals(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            Ok(Token::Operator("!=".to_string()))
        } else {
            Err(TokenizeError::new("Expected '!='", start_pos))
        }
    }

    /// Read '<', '<=', '>' or '>='
    fn read_relational(&mut self) -> Token {
        let mut op = String::new();
        if let Some(c) = self.advance() {
            op.push(c);
        }
        if self.peek() == Some('=') {
            self.advance();
            op.push('=');
        }
        Token::Operator(op)
    }
}

/// Convenience function to tokenize a filter expression
pub fn tokenize(expression: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(expression).tokenize()
}
