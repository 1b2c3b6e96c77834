// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! # plumber - declarative pipeline runner
//!
//! `plumber` runs pipelines made of ordered phases. Each phase runs its
//! actions concurrently, up to a configurable width, and waits for all of
//! them before the next phase starts. An action is either a named step from
//! the contributor registry or a short inline Pipeline script.
//!
//! ## Features
//!
//! - **Phases with join barriers** - bounded fan-out, declaration-order start
//! - **Inline scripts** - a small Pipeline language, checked against an allow-list
//! - **Severity aggregation** - SUCCESS, UNSTABLE, FAILURE and ABORTED
//! - **Clean section** - always runs, even after failure or cancellation
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a pipeline
//! plumber validate pipeline.yaml
//!
//! # Run it
//! plumber run pipeline.yaml
//! ```

pub mod cli;
pub mod contributors;
pub mod errors;
pub mod log;
pub mod outcome;
pub mod pipeline;
pub mod sandbox;
pub mod scheduler;
pub mod script;

// Re-export commonly used types
pub use errors::{PlumberError, PlumberResult};
pub use outcome::{ActionResult, PhaseResult, RunResult, Severity};
pub use pipeline::{Action, ActionKind, Phase, PipelineSpec};
pub use scheduler::{cancel_pair, CancelHandle, CancelSignal, Scheduler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
