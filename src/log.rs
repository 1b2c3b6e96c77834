// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Build log sinks
//!
//! User-visible output of a run goes through a [`LogSink`]; diagnostics go
//! through `tracing`. Sinks append whole lines and may be shared by many
//! concurrently running actions.

use colored::Colorize;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Identifies where a line of output came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LogRef {
    pub phase: Option<String>,
    pub action: Option<String>,
}

impl LogRef {
    /// Engine-level output not tied to a phase
    pub fn run() -> Self {
        Self {
            phase: None,
            action: None,
        }
    }

    pub fn phase(phase: &str) -> Self {
        Self {
            phase: Some(phase.to_string()),
            action: None,
        }
    }

    pub fn action(phase: &str, action: &str) -> Self {
        Self {
            phase: Some(phase.to_string()),
            action: Some(action.to_string()),
        }
    }
}

impl fmt::Display for LogRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.phase, &self.action) {
            (Some(p), Some(a)) => write!(f, "{}/{}", p, a),
            (Some(p), None) => write!(f, "{}", p),
            _ => write!(f, "plumber"),
        }
    }
}

/// Destination for build log lines
pub trait LogSink: Send + Sync {
    /// Append one line of text
    fn append(&self, source: &LogRef, line: &str);
}

/// Handle given to a running action so it can only write its own lines
#[derive(Clone)]
pub struct ActionLog {
    sink: Arc<dyn LogSink>,
    source: LogRef,
}

impl ActionLog {
    pub fn new(sink: Arc<dyn LogSink>, source: LogRef) -> Self {
        Self { sink, source }
    }

    pub fn line(&self, text: &str) {
        self.sink.append(&self.source, text);
    }

    /// Write multi-line text one line at a time
    pub fn lines(&self, text: &str) {
        for line in text.lines() {
            self.line(line);
        }
    }

    pub fn source(&self) -> &LogRef {
        &self.source
    }
}

/// A recorded log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub source: LogRef,
    pub line: String,
}

/// In-memory sink, used by tests and by the JSON output mode
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.line).collect()
    }

    /// Whether any line contains `text`
    pub fn contains(&self, text: &str) -> bool {
        self.records().iter().any(|r| r.line.contains(text))
    }

    /// Index of the first line containing `text`
    pub fn position(&self, text: &str) -> Option<usize> {
        self.records().iter().position(|r| r.line.contains(text))
    }

    /// Lines written by one action
    pub fn lines_for(&self, phase: &str, action: &str) -> Vec<String> {
        let source = LogRef::action(phase, action);
        self.records()
            .into_iter()
            .filter(|r| r.source == source)
            .map(|r| r.line)
            .collect()
    }
}

impl LogSink for MemoryLog {
    fn append(&self, source: &LogRef, line: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                source: source.clone(),
                line: line.to_string(),
            });
        }
    }
}

/// Sink printing to stdout with a `[phase/action]` prefix
#[derive(Debug, Default)]
pub struct ConsoleLog;

impl ConsoleLog {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for ConsoleLog {
    fn append(&self, source: &LogRef, line: &str) {
        // println! holds the stdout lock for the whole line
        match source.action {
            Some(_) => println!("{} {}", format!("[{}]", source).cyan(), line),
            None => println!("{} {}", format!("[{}]", source).bold(), line),
        }
    }
}

/// Fan a line out to several sinks
pub struct TeeLog {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl TeeLog {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

impl LogSink for TeeLog {
    fn append(&self, source: &LogRef, line: &str) {
        for sink in &self.sinks {
            sink.append(source, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_records_sources() {
        let log = Arc::new(MemoryLog::new());
        let action = ActionLog::new(log.clone(), LogRef::action("build", "compile"));
        action.lines("one\ntwo");
        log.append(&LogRef::run(), "done");

        assert_eq!(log.lines(), vec!["one", "two", "done"]);
        assert_eq!(log.lines_for("build", "compile"), vec!["one", "two"]);
        assert_eq!(log.position("done"), Some(2));
        assert!(log.contains("tw"));
    }

    #[test]
    fn test_tee_log() {
        let a = Arc::new(MemoryLog::new());
        let b = Arc::new(MemoryLog::new());
        let tee = TeeLog::new(vec![a.clone(), b.clone()]);
        tee.append(&LogRef::phase("p"), "hello");
        assert!(a.contains("hello"));
        assert!(b.contains("hello"));
    }

    #[test]
    fn test_log_ref_display() {
        assert_eq!(LogRef::action("p", "a").to_string(), "p/a");
        assert_eq!(LogRef::phase("p").to_string(), "p");
        assert_eq!(LogRef::run().to_string(), "plumber");
    }
}
