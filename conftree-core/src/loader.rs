//! Document loading from disk.
//!
//! The tree engine never parses anything itself. It asks a
//! [`DocumentLoader`] for a plain value; [`FileLoader`] is the default and
//! reads YAML or JSON depending on the file extension.

use std::fs;
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::error::{ConfigError, DocumentParseSource, Result};

/// Turns a document path into a plain nested value.
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<JsonValue>;
}

/// Document syntax, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` is JSON; everything else (`.yaml`, `.yml`, no extension) is
    /// read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }

    /// Parse `content` into a plain value.
    pub fn parse(&self, content: &str) -> std::result::Result<JsonValue, DocumentParseSource> {
        match self {
            DocumentFormat::Yaml => Ok(serde_yml::from_str(content)?),
            DocumentFormat::Json => Ok(serde_json::from_str(content)?),
        }
    }
}

/// Reads documents from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader {
    format: Option<DocumentFormat>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always parse as `format`, regardless of extension.
    pub fn with_format(format: DocumentFormat) -> Self {
        Self {
            format: Some(format),
        }
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<JsonValue> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::DocumentIo {
            path: path.to_path_buf(),
            source,
        })?;

        let format = self.format.unwrap_or_else(|| DocumentFormat::from_path(path));
        let value = format
            .parse(&content)
            .map_err(|source| ConfigError::DocumentParse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), ?format, "loaded config document");
        Ok(value)
    }
}
