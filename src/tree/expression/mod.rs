//! Filter expressions evaluated against tree records
//!
//! Supports `==`, `!=`, `>=`, `<=`, `>`, `<`, `and`, `or`, parentheses,
//! `contains(container, item)`, numbers, `'strings'` and `True`/`False`.

pub mod parser;
pub mod tokenizer;

use self::parser::{CompareOp, Expr, Parser};
use self::tokenizer::tokenize;
use super::Node;
use crate::error::{EnrichError, EnrichResult};
use serde_json::Value;
use std::cmp::Ordering;

/// A parsed filter, ready to test records
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    source: String,
    ast: Expr,
}

impl FilterExpression {
    pub fn parse(source: &str) -> EnrichResult<Self> {
        let tokens = tokenize(source).map_err(|e| EnrichError::malformed(source, e.to_string()))?;
        let ast = Parser::new(tokens)
            .parse()
            .map_err(|e| EnrichError::malformed(source, e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn matches(&self, record: &Node) -> bool {
        truthy(&evaluate(&self.ast, record))
    }
}

fn evaluate(expr: &Expr, record: &Node) -> Value {
    match expr {
        Expr::Number(n) => Value::from(*n),
        Expr::Text(s) => Value::String(s.clone()),
        Expr::Boolean(b) => Value::Bool(*b),
        Expr::Field(name) => field_value(record, name),
        Expr::And(left, right) => {
            Value::Bool(truthy(&evaluate(left, record)) && truthy(&evaluate(right, record)))
        }
        Expr::Or(left, right) => {
            Value::Bool(truthy(&evaluate(left, record)) || truthy(&evaluate(right, record)))
        }
        Expr::Compare { op, left, right } => {
            let left = evaluate(left, record);
            let right = evaluate(right, record);
            Value::Bool(compare(*op, &left, &right))
        }
        Expr::Contains(container, item) => {
            let container = evaluate(container, record);
            if container.is_null() {
                return Value::Bool(false);
            }
            let item = evaluate(item, record);
            Value::Bool(display(&container).contains(&display(&item)))
        }
    }
}

/// A field of the record, then of a property child (`path == name`), then
/// of any direct child
fn field_value(record: &Node, name: &str) -> Value {
    if let Some(field) = record.field(name) {
        return field.value.clone();
    }
    for child in &record.data {
        if child.path.as_deref() == Some(name) {
            if let Some(field) = child.data.first().and_then(|item| item.fields.first()) {
                return field.value.clone();
            }
        } else if let Some(field) = child.field(name) {
            return field.value.clone();
        }
    }
    Value::Null
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::Eq => loosely_equal(left, right),
        CompareOp::Ne => !loosely_equal(left, right),
        _ => match order(left, right) {
            Some(ordering) => match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Eq | CompareOp::Ne => false,
            },
            // incompatible types never satisfy an ordering comparison
            None => false,
        },
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
