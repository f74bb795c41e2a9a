//! Filter expression parser
//!
//! Converts a sequence of tokens into an Abstract Syntax Tree (AST).
//! Uses recursive descent parsing; precedence from lowest to highest is
//! `or`, `and`, comparison.

use super::tokenizer::Token;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }
}

/// Abstract Syntax Tree node for filter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// A field of the record under test
    Field(String),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// contains(container, item)
    Contains(Box<Expr>, Box<Expr>),
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at token {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Parser for filter tokens
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the tokens into an AST
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("Empty expression", 0));
        }
        let expr = self.or_expr()?;

        if !self.is_at_end() {
            return Err(ParseError::new(
                format!("Unexpected token after expression: {:?}", self.peek()),
                self.position,
            ));
        }

        Ok(expr)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, context: &str) -> Result<(), ParseError> {
        if self.match_token(expected) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("Expected {:?} {}", expected, context),
                self.position,
            ))
        }
    }

    /// Keywords are case-sensitive, like the rest of the grammar
    fn match_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Identifier(name)) if name == keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Or: and_expr ( "or" and_expr )*
    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.match_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// And: comparison ( "and" comparison )*
    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        while self.match_keyword("and") {
            let right = self.comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Comparison: primary ( op primary )*
    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.primary()?;

        while let Some(Token::Operator(symbol)) = self.peek() {
            let op = CompareOp::from_symbol(symbol).ok_or_else(|| {
                ParseError::new(format!("Unknown operator '{}'", symbol), self.position)
            })?;
            self.position += 1;
            let right = self.primary()?;
            left = Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Primary: NUMBER | STRING | BOOLEAN | contains(...) | IDENTIFIER | "(" or_expr ")"
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position;
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(s)) => Ok(Expr::Text(s)),
            Some(Token::OpenParen) => {
                let inner = self.or_expr()?;
                self.expect(&Token::CloseParen, "after grouped expression")?;
                Ok(inner)
            }
            Some(Token::Identifier(name)) => match name.as_str() {
                "True" => Ok(Expr::Boolean(true)),
                "False" => Ok(Expr::Boolean(false)),
                "and" | "or" => Err(ParseError::new(
                    format!("Unexpected keyword '{}'", name),
                    position,
                )),
                "contains" if self.peek() == Some(&Token::OpenParen) => {
                    self.position += 1;
                    let container = self.or_expr()?;
                    self.expect(&Token::Comma, "between contains() arguments")?;
                    let item = self.or_expr()?;
                    self.expect(&Token::CloseParen, "after contains() arguments")?;
                    Ok(Expr::Contains(Box::new(container), Box::new(item)))
                }
                _ => Ok(Expr::Field(name)),
            },
            Some(token) => Err(ParseError::new(
                format!("Unexpected token: {:?}", token),
                position,
            )),
            None => Err(ParseError::new("Unexpected end of expression", position)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tokenizer::tokenize;
    use super::*;

    fn parse(source: &str) -> Result<Expr, ParseError> {
        Parser::new(tokenize(source).unwrap()).parse()
    }

    #[test]
    fn test_parse_comparison() {
        assert_eq!(
            parse("qty > 5").unwrap(),
            Expr::Compare {
                op: CompareOp::Gt,
                left: Box::new(Expr::Field("qty".to_string())),
                right: Box::new(Expr::Number(5.0)),
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a == 1 or b == 2 and c == 3").unwrap();
        match expr {
            Expr::Or(_, right) => assert!(matches!(*right, Expr::And(_, _))),
            other => panic!("expected Or at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_grouping_and_booleans() {
        let expr = parse("(a == True) and b != False").unwrap();
        assert!(matches!(expr, Expr::And(_, _)));
    }

    #[test]
    fn test_parse_contains() {
        assert_eq!(
            parse("contains(name, 'ab')").unwrap(),
            Expr::Contains(
                Box::new(Expr::Field("name".to_string())),
                Box::new(Expr::Text("ab".to_string()))
            )
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("a ==").is_err());
        assert!(parse("(a == 1").is_err());
        assert!(parse("a == 1 b").is_err());
        assert!(parse("and a").is_err());
        assert!(Parser::new(Vec::new()).parse().is_err());
    }
}
