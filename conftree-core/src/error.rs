//! Error definitions.

use std::path::PathBuf;

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while building a config tree.
///
/// Writes to a tree never fail; only construction does.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The resolved input is not an object or an array.
    #[error("Invalid config type. Expecting object or array; got '{found}'")]
    InvalidInput { found: &'static str },

    /// The document could not be read.
    #[error("Failed to read config document {}: {source}", path.display())]
    DocumentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document was read but is not well-formed.
    #[error("Failed to parse config document {}: {source}", path.display())]
    DocumentParse {
        path: PathBuf,
        #[source]
        source: DocumentParseSource,
    },
}

/// Underlying parser error of a [`ConfigError::DocumentParse`].
#[derive(Debug, Error)]
pub enum DocumentParseSource {
    #[error(transparent)]
    Yaml(#[from] serde_yml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid_input(value: &JsonValue) -> Self {
        ConfigError::InvalidInput {
            found: type_name(value),
        }
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_input_names_the_type() {
        let err = ConfigError::invalid_input(&json!("test"));
        assert_eq!(
            err.to_string(),
            "Invalid config type. Expecting object or array; got 'string'"
        );
        assert!(matches!(
            ConfigError::invalid_input(&json!(null)),
            ConfigError::InvalidInput { found: "null" }
        ));
    }
}
