// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Contributors command - list available steps

use colored::Colorize;
use miette::Result;

use crate::contributors::ContributorRegistry;
use crate::script::BUILTINS;

pub async fn run(verbose: bool) -> Result<()> {
    let registry = ContributorRegistry::with_defaults();

    println!("{}:", "Step contributors".bold());
    for contributor in registry.iter() {
        let name = contributor.name();
        let callable = registry.script_callable().any(|n| n == name);
        let suffix = if callable { "" } else { " (not callable from scripts)" };
        println!(
            "  {} {}{}",
            name.cyan(),
            contributor.description().dimmed(),
            suffix.yellow()
        );
    }

    if verbose {
        println!();
        println!("{}:", "Script built-ins".bold());
        for builtin in BUILTINS {
            println!("  {}", builtin);
        }
    }

    Ok(())
}
