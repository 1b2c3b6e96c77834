// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for plumber.

pub mod contributors;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::DocumentFormat;

/// Declarative pipeline runner
///
/// Runs phases of named steps and inline Pipeline scripts.
#[derive(Parser, Debug)]
#[clap(
    name = "plumber",
    version,
    about = "Declarative pipeline runner with sandboxed inline scripts",
    long_about = None,
    after_help = "Examples:\n\
        plumber run pipeline.yaml              Execute a pipeline\n\
        plumber run build.toml --format json   Execute and print a JSON report\n\
        plumber validate pipeline.yaml         Check a pipeline without running it\n\
        plumber contributors                   List available steps\n\n\
        See 'plumber <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline
    Run {
        /// Pipeline file
        #[clap(default_value = "pipeline.yaml")]
        pipeline: PathBuf,

        /// Report format
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Document format (defaults to the file extension)
        #[clap(long, value_name = "yaml|json|toml")]
        format_doc: Option<DocumentFormat>,
    },

    /// Validate a pipeline without running it
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = "pipeline.yaml")]
        pipeline: PathBuf,

        /// Document format (defaults to the file extension)
        #[clap(long, value_name = "yaml|json|toml")]
        format_doc: Option<DocumentFormat>,
    },

    /// List registered step contributors
    Contributors,
}

/// Output format for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Load a pipeline file, keeping "not found" separate from rejection
///
/// `Ok(Err(_))` is a document that loaded but does not describe a valid
/// pipeline; the caller reports it as a failed run.
pub(crate) fn load_pipeline(
    path: &std::path::Path,
    format: Option<DocumentFormat>,
) -> miette::Result<crate::PlumberResult<crate::pipeline::PipelineSpec>> {
    use crate::errors::PlumberError;

    match crate::pipeline::PipelineSpec::from_file(path, format) {
        Err(e @ (PlumberError::PipelineNotFound { .. } | PlumberError::FileReadError { .. })) => Err(e.into()),
        other => Ok(other),
    }
}
