// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Validate command - check a pipeline without running it

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::load_pipeline;
use crate::contributors::ContributorRegistry;
use crate::log::MemoryLog;
use crate::pipeline::{describe, DocumentFormat, PipelineValidator, PropertySource};
use crate::sandbox::AllowList;
use crate::scheduler::Scheduler;

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, format_doc: Option<DocumentFormat>, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let spec = match load_pipeline(&pipeline_path, format_doc)? {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("  {} Failed to translate pipeline", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };
    println!("  {} Pipeline structure is valid", "✓".green());

    if let Err(e) = PipelineValidator::validate(&spec) {
        eprintln!("  {} Inline Pipeline code is not allowed", "✗".red());
        eprintln!();
        return Err(e.into());
    }
    println!("  {} Inline Pipeline code is allowed", "✓".green());

    let scheduler = Scheduler::new(
        Arc::new(ContributorRegistry::with_defaults()),
        Arc::new(AllowList::default()),
        Arc::new(MemoryLog::new()),
    );
    let plan = scheduler.bind(&spec);
    if let Some(e) = plan.error() {
        eprintln!("  {} Some actions cannot be bound", "✗".red());
        eprintln!();
        return Err(e.clone().into());
    }
    println!("  {} Every action is bound", "✓".green());

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Phases: {}", spec.phases.len());
        println!("  Actions: {}", spec.action_count());
        for (name, width) in plan.widths() {
            println!("    - {} {}", name, format!("[runs {} at a time]", width).dimmed());
            if let Some(phase) = spec.all_phases().find(|p| p.name == name) {
                for action in &phase.actions {
                    let source: Arc<dyn PropertySource> = Arc::new(action.clone());
                    let props = describe(&source)
                        .into_iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(" ");
                    println!("        {}", props.dimmed());
                }
            }
        }
    }

    println!();
    println!("{}", "Pipeline is valid!".green().bold());
    Ok(())
}
