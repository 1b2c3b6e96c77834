// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Severity ordering and result aggregation
//!
//! `Severity::combine` is the only place that decides which outcome wins.
//! Action, phase and run results are built once and never updated; folding
//! produces new values.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::PlumberError;
use crate::log::LogRef;

/// Outcome severity, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Success,
    Unstable,
    Failure,
    /// Only produced by external cancellation
    Aborted,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 4] = [
        Severity::Success,
        Severity::Unstable,
        Severity::Failure,
        Severity::Aborted,
    ];

    /// Combine two severities; the worse one wins
    pub fn combine(self, other: Severity) -> Severity {
        self.max(other)
    }

    /// Fold any number of severities, starting from `Success`
    pub fn fold<I: IntoIterator<Item = Severity>>(severities: I) -> Severity {
        severities
            .into_iter()
            .fold(Severity::Success, Severity::combine)
    }

    /// Whether this severity stops the remaining main phases
    pub fn is_fatal(self) -> bool {
        self >= Severity::Failure
    }

    /// Strictly better than `other`
    pub fn is_better_than(self, other: Severity) -> bool {
        self < other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = PlumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "UNSTABLE" => Ok(Self::Unstable),
            "FAILURE" => Ok(Self::Failure),
            "ABORTED" => Ok(Self::Aborted),
            _ => Err(PlumberError::ScriptError {
                message: format!("Unknown result '{}'", s),
            }),
        }
    }
}

/// Outcome of a single action
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub severity: Severity,
    /// Where this action's output went
    pub log: LogRef,
    /// Failure or instability reason, if any
    pub message: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl ActionResult {
    pub fn new(action: impl Into<String>, severity: Severity, log: LogRef, duration: Duration) -> Self {
        Self {
            action: action.into(),
            severity,
            log,
            message: None,
            duration,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Outcome of a phase: the combination of its actions
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub phase: String,
    pub severity: Severity,
    /// Action results in declaration order
    pub actions: Vec<ActionResult>,
}

impl PhaseResult {
    pub fn from_actions(phase: impl Into<String>, actions: Vec<ActionResult>) -> Self {
        let severity = Severity::fold(actions.iter().map(|a| a.severity));
        Self {
            phase: phase.into(),
            severity,
            actions,
        }
    }

    /// First action that did not succeed
    pub fn first_problem(&self) -> Option<&ActionResult> {
        self.actions.iter().find(|a| a.severity != Severity::Success)
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub severity: Severity,
    /// Main phases that executed, in order
    pub phases: Vec<PhaseResult>,
    pub clean: Option<PhaseResult>,
    /// Main phases that never started
    pub skipped: Vec<String>,
    /// Build-time failure message, if the run failed before its phases
    pub failure_reason: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl RunResult {
    pub fn new(
        phases: Vec<PhaseResult>,
        clean: Option<PhaseResult>,
        skipped: Vec<String>,
        failure_reason: Option<String>,
        duration: Duration,
    ) -> Self {
        let build = if failure_reason.is_some() {
            Severity::Failure
        } else {
            Severity::Success
        };
        let severity = phases
            .iter()
            .chain(clean.iter())
            .map(|p| p.severity)
            .fold(build, Severity::combine);

        Self {
            severity,
            phases,
            clean,
            skipped,
            failure_reason,
            duration,
        }
    }

    /// A run with no executable model at all
    pub fn rejected(reason: impl Into<String>, duration: Duration) -> Self {
        Self::new(vec![], None, vec![], Some(reason.into()), duration)
    }

    /// Success and Unstable both count as a completed build
    pub fn is_success(&self) -> bool {
        self.severity <= Severity::Unstable
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.phase == name)
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
