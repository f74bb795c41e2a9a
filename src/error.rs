use thiserror::Error;

pub type EnrichResult<T> = Result<T, EnrichError>;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Lookup failed for '{variable}'{}: {reason}", instance_suffix(.instance))]
    LookupFailure {
        variable: String,
        instance: Option<String>,
        reason: String,
    },

    #[error("Malformed filter expression '{expression}': {reason}")]
    MalformedFilterExpression { expression: String, reason: String },

    #[error("Structural input error: {0}")]
    StructuralInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EnrichError {
    pub fn lookup(
        variable: impl Into<String>,
        instance: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        EnrichError::LookupFailure {
            variable: variable.into(),
            instance: instance.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn malformed(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        EnrichError::MalformedFilterExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

fn instance_suffix(instance: &Option<String>) -> String {
    match instance {
        Some(id) => format!(" on instance '{}'", id),
        None => String::new(),
    }
}
