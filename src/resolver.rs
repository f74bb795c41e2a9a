//! Filter-expression variable resolver
//!
//! Finds the variables of a filter expression: raw names on the right-hand
//! side of comparisons (the `e00002v` in `e00001v == e00002v`) and names
//! already written as placeholders (`status == __s__`). Raw names are marked
//! with placeholders, and placeholders are replaced with literal values once
//! the variables have been resolved for an entity instance. Quoted string
//! literals are never scanned.

use crate::config::{EnrichConfig, DEFAULT_PLACEHOLDER_DELIMITER};
use crate::error::{EnrichError, EnrichResult};
use crate::types::FilterBinding;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

/// Comparison operators that may precede a variable
const COMPARISON_PREFIX: &str = r"(?:[=!<>]=?|<|>)\s*";

/// Names accepted inside a placeholder besides the variable pattern
const PLACEHOLDER_NAME: &str = r"[A-Za-z][A-Za-z0-9_.]*?";

/// A variable occurrence with the byte span of its name in the expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMatch {
    pub variable: String,
    pub start: usize,
    pub end: usize,
    /// Written as a placeholder in the expression itself
    pub delimited: bool,
}

#[derive(Debug, Clone)]
pub struct FilterVariableResolver {
    pattern: String,
    comparison: Regex,
    placeholder: Regex,
    prefix: String,
    suffix: String,
}

impl FilterVariableResolver {
    /// Resolver with the default `__name__` placeholders
    pub fn new(variable_pattern: &str) -> EnrichResult<Self> {
        Self::with_delimiters(
            variable_pattern,
            DEFAULT_PLACEHOLDER_DELIMITER,
            DEFAULT_PLACEHOLDER_DELIMITER,
        )
    }

    pub fn with_delimiters(variable_pattern: &str, prefix: &str, suffix: &str) -> EnrichResult<Self> {
        if prefix.is_empty() || suffix.is_empty() {
            return Err(EnrichError::Config(
                "placeholder delimiters must not be empty".to_string(),
            ));
        }
        let compile = |source: String| {
            Regex::new(&source).map_err(|e| {
                EnrichError::Config(format!(
                    "invalid variable pattern '{}': {}",
                    variable_pattern, e
                ))
            })
        };
        let comparison = compile(format!(
            "{}(?P<var>(?:{}))",
            COMPARISON_PREFIX, variable_pattern
        ))?;
        let placeholder = compile(format!(
            "{}(?P<var>(?:{})|{}){}",
            regex::escape(prefix),
            variable_pattern,
            PLACEHOLDER_NAME,
            regex::escape(suffix)
        ))?;

        Ok(Self {
            pattern: variable_pattern.to_string(),
            comparison,
            placeholder,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn from_config(config: &EnrichConfig) -> EnrichResult<Self> {
        Self::with_delimiters(
            &config.variable_pattern,
            &config.placeholder_prefix,
            &config.placeholder_suffix,
        )
    }

    pub fn variable_pattern(&self) -> &str {
        &self.pattern
    }

    /// Every variable occurrence outside quoted literals, in expression order
    pub fn extract_variables(&self, expression: &str) -> Vec<VariableMatch> {
        let quoted = quoted_spans(expression);

        let mut matches: Vec<VariableMatch> = self
            .placeholder
            .captures_iter(expression)
            .filter(|caps| caps.get(0).is_some_and(|m| !in_quotes(&quoted, m.start())))
            .filter_map(|caps| caps.name("var"))
            .map(|m| VariableMatch {
                variable: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                delimited: true,
            })
            .collect();

        let raw: Vec<VariableMatch> = self
            .comparison
            .captures_iter(expression)
            .filter_map(|caps| caps.name("var"))
            .filter(|m| !in_quotes(&quoted, m.start()))
            .filter(|m| {
                !matches.iter().any(|d| {
                    let token = self.token_span(d);
                    m.start() < token.end && token.start < m.end()
                })
            })
            .map(|m| VariableMatch {
                variable: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                delimited: false,
            })
            .collect();

        matches.extend(raw);
        matches.sort_by_key(|m| m.start);
        matches
    }

    /// Distinct variables; empty when there are none
    pub fn extract_unique_variables(&self, expression: &str) -> BTreeSet<String> {
        self.extract_variables(expression)
            .into_iter()
            .map(|m| m.variable)
            .collect()
    }

    /// Spans of a specific variable where it follows a comparison operator
    pub fn find_variable_positions(&self, text: &str, variable: &str) -> Vec<(usize, usize)> {
        let Ok(pattern) = Regex::new(&format!(
            "{}(?P<var>{})",
            COMPARISON_PREFIX,
            regex::escape(variable)
        )) else {
            return Vec::new();
        };
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.name("var"))
            .map(|m| (m.start(), m.end()))
            .collect()
    }

    pub fn placeholder(&self, variable: &str) -> String {
        format!("{}{}{}", self.prefix, variable, self.suffix)
    }

    /// Wrap every raw variable in its placeholder; existing placeholders stay
    pub fn highlight_variables(&self, expression: &str) -> String {
        let mut highlighted = String::with_capacity(expression.len() + 8);
        let mut cursor = 0;
        for m in self
            .extract_variables(expression)
            .into_iter()
            .filter(|m| !m.delimited)
        {
            highlighted.push_str(&expression[cursor..m.start]);
            highlighted.push_str(&self.placeholder(&m.variable));
            cursor = m.end;
        }
        highlighted.push_str(&expression[cursor..]);
        highlighted
    }

    /// Replace every placeholder of `variable` with the literal form of `value`
    pub fn substitute(&self, expression: &str, variable: &str, value: &Value) -> EnrichResult<String> {
        let literal =
            render_literal(value).map_err(|reason| EnrichError::malformed(expression, reason))?;
        let quoted = quoted_spans(expression);
        Ok(self
            .placeholder
            .replace_all(expression, |caps: &Captures| {
                let unquoted = caps.get(0).is_some_and(|m| !in_quotes(&quoted, m.start()));
                if unquoted && caps.name("var").map(|m| m.as_str()) == Some(variable) {
                    literal.clone()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned())
    }

    /// Apply all bindings in one pass over the highlighted expression.
    ///
    /// Inserted literals are never rescanned, so a literal that happens to
    /// look like another placeholder is left alone, and so is placeholder-like
    /// text inside a quoted literal. Fails if any placeholder has no binding.
    pub fn substitute_all(&self, expression: &str, bindings: &[FilterBinding]) -> EnrichResult<String> {
        let mut literals = HashMap::with_capacity(bindings.len());
        for binding in bindings {
            let literal = render_literal(&binding.value)
                .map_err(|reason| EnrichError::malformed(expression, reason))?;
            literals.insert(binding.variable.as_str(), literal);
        }

        let quoted = quoted_spans(expression);
        let mut unresolved = BTreeSet::new();
        let substituted = self
            .placeholder
            .replace_all(expression, |caps: &Captures| {
                if caps.get(0).map_or(true, |m| in_quotes(&quoted, m.start())) {
                    return caps[0].to_string();
                }
                let variable = caps.name("var").map_or("", |m| m.as_str());
                match literals.get(variable) {
                    Some(literal) => literal.clone(),
                    None => {
                        unresolved.insert(variable.to_string());
                        caps[0].to_string()
                    }
                }
            })
            .into_owned();

        if !unresolved.is_empty() {
            let names: Vec<String> = unresolved.into_iter().collect();
            return Err(EnrichError::malformed(
                expression,
                format!("unresolved placeholder(s): {}", names.join(", ")),
            ));
        }
        Ok(substituted)
    }

    /// Byte span of a delimited match including its delimiters
    fn token_span(&self, m: &VariableMatch) -> Range<usize> {
        m.start.saturating_sub(self.prefix.len())..m.end + self.suffix.len()
    }
}

/// Byte ranges of quoted literals ('..' or "..", a doubled quote escapes);
/// an unterminated literal runs to the end of the text
fn quoted_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((start, quote)) = chars.next() {
        if quote != '\'' && quote != '"' {
            continue;
        }
        let mut end = text.len();
        while let Some((i, c)) = chars.next() {
            if c != quote {
                continue;
            }
            if chars.peek().map(|&(_, next)| next) == Some(quote) {
                chars.next();
                continue;
            }
            end = i + c.len_utf8();
            break;
        }
        spans.push(start..end);
    }
    spans
}

fn in_quotes(spans: &[Range<usize>], position: usize) -> bool {
    spans.iter().any(|span| span.contains(&position))
}

/// Text form of a resolved value inside a filter expression.
///
/// Numbers (and strings that parse as finite numbers) go in unquoted,
/// anything else is single-quoted.
pub fn render_literal(value: &Value) -> Result<String, String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(true) => Ok("True".to_string()),
        Value::Bool(false) => Ok("False".to_string()),
        Value::Null => Ok("''".to_string()),
        Value::String(s) => {
            if s.trim().parse::<f64>().is_ok_and(f64::is_finite) {
                Ok(s.trim().to_string())
            } else if s.contains('\'') {
                Err(format!("literal {:?} contains a single quote", s))
            } else {
                Ok(format!("'{}'", s))
            }
        }
        Value::Array(_) | Value::Object(_) => {
            Err(format!("cannot inline structured value {}", value))
        }
    }
}
