// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Generic document loading
//!
//! Turns YAML, JSON or TOML text into a format-neutral tree. The translator
//! only ever sees that tree.

use std::path::Path;

use crate::errors::{PlumberError, PlumberResult};

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Pick a format from a file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            Some("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => Err(format!("Unknown document format: {}", s)),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
            Self::Toml => write!(f, "toml"),
        }
    }
}

/// Parse document text into a generic tree
pub fn parse_document(text: &str, format: DocumentFormat) -> PlumberResult<serde_json::Value> {
    let value = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(text)?,
        DocumentFormat::Json => serde_json::from_str(text)?,
        DocumentFormat::Toml => toml::from_str(text)?,
    };
    Ok(value)
}

/// Read and parse a document file
pub fn load_document(path: &Path, format: Option<DocumentFormat>) -> PlumberResult<serde_json::Value> {
    if !path.exists() {
        return Err(PlumberError::PipelineNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| PlumberError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let format = format.unwrap_or_else(|| DocumentFormat::from_path(path));
    tracing::debug!(path = %path.display(), %format, "loading pipeline document");
    parse_document(&content, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_formats_produce_same_tree() {
        let yaml = "phases:\n  - name: one\n    concurrency: 2\n";
        let json_text = r#"{"phases": [{"name": "one", "concurrency": 2}]}"#;
        let toml_text = "[[phases]]\nname = \"one\"\nconcurrency = 2\n";

        let expected = json!({"phases": [{"name": "one", "concurrency": 2}]});
        assert_eq!(parse_document(yaml, DocumentFormat::Yaml).unwrap(), expected);
        assert_eq!(parse_document(json_text, DocumentFormat::Json).unwrap(), expected);
        assert_eq!(parse_document(toml_text, DocumentFormat::Toml).unwrap(), expected);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.TOML")), DocumentFormat::Toml);
        assert_eq!(DocumentFormat::from_path(Path::new("plumber.yml")), DocumentFormat::Yaml);
        assert_eq!("yml".parse::<DocumentFormat>().unwrap(), DocumentFormat::Yaml);
    }

    #[test]
    fn test_load_document_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"phases": []}}"#).unwrap();

        let value = load_document(file.path(), None).unwrap();
        assert_eq!(value, json!({"phases": []}));

        let err = load_document(Path::new("/nonexistent/plumber.yml"), None).unwrap_err();
        assert!(matches!(err, PlumberError::PipelineNotFound { .. }));
    }

    #[test]
    fn test_malformed_yaml_reports_format() {
        let err = parse_document("phases: [", DocumentFormat::Yaml).unwrap_err();
        assert!(err.to_string().starts_with("Could not parse YAML document"));
    }
}
