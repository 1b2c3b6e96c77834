// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! plumber - declarative pipeline runner

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plumber::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so stdout stays the build log
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plumber=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Run {
            pipeline,
            format,
            format_doc,
        } => plumber::cli::run::run(pipeline, format, format_doc, cli.verbose).await,
        Commands::Validate {
            pipeline,
            format_doc,
        } => plumber::cli::validate::run(pipeline, format_doc, cli.verbose).await,
        Commands::Contributors => plumber::cli::contributors::run(cli.verbose).await,
    }
}
