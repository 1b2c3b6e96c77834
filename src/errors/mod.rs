// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Error types
//!
//! Errors fall into two tiers. Build-time errors are found before any phase
//! runs (or, for the sandbox, before the rejected operation has any effect)
//! and fail the whole run. Run-time errors belong to a single action and only
//! lower that action's severity.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for plumber operations
pub type PlumberResult<T> = Result<T, PlumberError>;

/// Main error type for plumber
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum PlumberError {
    // ─────────────────────────────────────────────────────────────────────────
    // Document Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(plumber::pipeline_not_found),
        help("Pass the path of a YAML, JSON or TOML pipeline document")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(plumber::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Could not parse {format} document: {message}")]
    #[diagnostic(code(plumber::document_error))]
    Document { format: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Structural Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid pipeline at '{path}': {reason}")]
    #[diagnostic(code(plumber::invalid_spec))]
    InvalidSpec {
        path: String,
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("No action or Pipeline code specified")]
    #[diagnostic(
        code(plumber::no_action_or_pipeline),
        help("Action at '{path}' needs either an 'action' or a 'pipeline' key")
    )]
    NoActionOrPipeline { path: String },

    #[error("Duplicate {kind} name '{name}' at '{path}'")]
    #[diagnostic(code(plumber::duplicate_name))]
    DuplicateName {
        kind: String,
        name: String,
        path: String,
    },

    #[error("Syntax error in inline Pipeline of action '{action}' at {line}:{column}: {message}")]
    #[diagnostic(code(plumber::script_syntax))]
    ScriptSyntax {
        action: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Illegal Pipeline steps used in inline Pipeline - {}", .steps.join(", "))]
    #[diagnostic(
        code(plumber::illegal_inline_steps),
        help("Phases, parallel branches and agents are managed by the engine; split action '{action}' into phases instead")
    )]
    IllegalInlineSteps { action: String, steps: Vec<String> },

    #[error("Unknown step contributor: {name}")]
    #[diagnostic(code(plumber::unknown_contributor), help("{available}"))]
    UnknownContributor { name: String, available: String },

    #[error("Step contributor '{name}' is already registered")]
    #[diagnostic(code(plumber::duplicate_contributor))]
    DuplicateContributor { name: String },

    #[error("Security violation: {operation} is not permitted")]
    #[diagnostic(
        code(plumber::security_violation),
        help("Only allow-listed operations may be used from inline Pipeline code")
    )]
    SecurityViolation { operation: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(plumber::script_error))]
    ScriptError { message: String },

    #[error("Step '{step}' failed: {error}")]
    #[diagnostic(code(plumber::step_failed))]
    StepFailed {
        step: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid parameter '{param}' for step '{step}': {reason}")]
    #[diagnostic(code(plumber::invalid_param))]
    InvalidParam {
        step: String,
        param: String,
        reason: String,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(plumber::io_error))]
    Io { message: String },
}

impl From<std::io::Error> for PlumberError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PlumberError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Document {
            format: "YAML".into(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for PlumberError {
    fn from(e: serde_json::Error) -> Self {
        Self::Document {
            format: "JSON".into(),
            message: e.to_string(),
        }
    }
}

impl From<toml::de::Error> for PlumberError {
    fn from(e: toml::de::Error) -> Self {
        Self::Document {
            format: "TOML".into(),
            message: e.to_string(),
        }
    }
}

impl PlumberError {
    /// Build-time errors fail the run before (or instead of) executing an
    /// action; they are never retried.
    pub fn is_build_time(&self) -> bool {
        !matches!(
            self,
            Self::ScriptError { .. }
                | Self::StepFailed { .. }
                | Self::InvalidParam { .. }
                | Self::Io { .. }
        )
    }

    /// Create an invalid spec error without a hint
    pub fn invalid_spec(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            path: path.into(),
            reason: reason.into(),
            help: None,
        }
    }

    /// Create a security violation for a named operation
    pub fn security_violation(operation: impl Into<String>) -> Self {
        Self::SecurityViolation {
            operation: operation.into(),
        }
    }

    /// Create an unknown contributor error listing what is registered
    pub fn unknown_contributor(name: &str, registered: &[&str]) -> Self {
        let available = if registered.is_empty() {
            "No step contributors are registered".to_string()
        } else {
            format!("Registered contributors: {}", registered.join(", "))
        };

        Self::UnknownContributor {
            name: name.to_string(),
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbatim_messages() {
        let err = PlumberError::NoActionOrPipeline {
            path: "phases[0].actions[0]".into(),
        };
        assert_eq!(err.to_string(), "No action or Pipeline code specified");

        let err = PlumberError::IllegalInlineSteps {
            action: "a".into(),
            steps: vec!["stage".into(), "parallel".into(), "node".into()],
        };
        assert_eq!(
            err.to_string(),
            "Illegal Pipeline steps used in inline Pipeline - stage, parallel, node"
        );

        let err = PlumberError::unknown_contributor("deploy", &["echoParams"]);
        assert_eq!(err.to_string(), "Unknown step contributor: deploy");
    }

    #[test]
    fn test_error_tiers() {
        assert!(PlumberError::security_violation("x").is_build_time());
        assert!(PlumberError::invalid_spec("phases", "missing").is_build_time());
        assert!(!PlumberError::ScriptError {
            message: "boom".into()
        }
        .is_build_time());
    }
}
