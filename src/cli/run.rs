// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::OutputFormat;
use crate::contributors::ContributorRegistry;
use crate::log::{ConsoleLog, LogRecord, LogSink, MemoryLog};
use crate::outcome::{PhaseResult, RunResult, Severity};
use crate::pipeline::{load_document, DocumentFormat};
use crate::sandbox::AllowList;
use crate::scheduler::{cancel_pair, Scheduler};

#[derive(Serialize)]
struct JsonReport<'a> {
    result: &'a RunResult,
    log: Vec<LogRecord>,
}

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    format: OutputFormat,
    format_doc: Option<DocumentFormat>,
    verbose: bool,
) -> Result<()> {
    let memory = Arc::new(MemoryLog::new());
    let sink: Arc<dyn LogSink> = match format {
        OutputFormat::Text => Arc::new(ConsoleLog::new()),
        OutputFormat::Json => memory.clone(),
    };

    let document = load_document(&pipeline_path, format_doc)?;
    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let scheduler = Scheduler::new(
        Arc::new(ContributorRegistry::with_defaults()),
        Arc::new(AllowList::default()),
        sink,
    )
    .with_working_dir(working_dir);

    let (handle, signal) = cancel_pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            handle.cancel();
        }
    });

    tracing::debug!(path = %pipeline_path.display(), "running pipeline");
    let result = scheduler.execute_document(&document, signal).await;
    ctrl_c.abort();

    match format {
        OutputFormat::Json => {
            let report = JsonReport {
                result: &result,
                log: memory.records(),
            };
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| miette::miette!("Failed to serialize report: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => print_summary(&result, verbose),
    }

    if result.is_success() {
        Ok(())
    } else {
        Err(miette::miette!(
            "Pipeline finished with {}{}",
            result.severity,
            result
                .failure_reason
                .as_deref()
                .map(|r| format!(": {}", r))
                .unwrap_or_default()
        ))
    }
}

fn print_summary(result: &RunResult, verbose: bool) {
    println!();
    for phase in &result.phases {
        print_phase(phase, verbose);
    }
    for name in &result.skipped {
        println!("  {} {} {}", "-".dimmed(), name.bold(), "(skipped)".dimmed());
    }
    if let Some(clean) = &result.clean {
        print_phase(clean, verbose);
    }

    println!();
    let summary = format!(
        "Pipeline finished {} in {:.2}s",
        result.severity,
        result.duration.as_secs_f64()
    );
    match result.severity {
        Severity::Success => println!("{}", summary.green()),
        Severity::Unstable => println!("{}", summary.yellow()),
        Severity::Failure | Severity::Aborted => println!("{}", summary.red()),
    }
}

fn print_phase(phase: &PhaseResult, verbose: bool) {
    let mark = match phase.severity {
        Severity::Success => "✓".green(),
        Severity::Unstable => "!".yellow(),
        Severity::Failure | Severity::Aborted => "✗".red(),
    };
    println!("  {} {} ({})", mark, phase.phase.bold(), phase.severity);

    for action in &phase.actions {
        if !verbose && action.severity == Severity::Success {
            continue;
        }
        let detail = action
            .message
            .as_deref()
            .map(|m| format!(" - {}", m))
            .unwrap_or_default();
        println!(
            "      {} {} ({:.2}s){}",
            action.action,
            action.severity,
            action.duration.as_secs_f64(),
            detail.dimmed()
        );
    }
}
