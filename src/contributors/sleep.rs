// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Sleep contributor

use async_trait::async_trait;
use std::time::Duration;

use super::{StepContributor, StepInvocation};
use crate::errors::{PlumberError, PlumberResult};
use crate::outcome::Severity;
use crate::script::Value;

/// Waits for `millis` milliseconds
pub struct SleepContributor;

#[async_trait]
impl StepContributor for SleepContributor {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Wait for 'millis' milliseconds"
    }

    async fn run(&self, invocation: StepInvocation<'_>) -> PlumberResult<Severity> {
        let millis = match invocation.params.get("millis") {
            Some(Value::Int(n)) if *n >= 0 => *n as u64,
            Some(Value::Str(s)) => s.trim().parse().map_err(|_| invalid(s))?,
            Some(other) => return Err(invalid(&other.to_string())),
            None => 0,
        };

        invocation.log.line(&format!("Sleeping for {} ms", millis));
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(Severity::Success)
    }
}

fn invalid(got: &str) -> PlumberError {
    PlumberError::InvalidParam {
        step: "sleep".into(),
        param: "millis".into(),
        reason: format!("expected a non-negative integer, got {}", got),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{ActionLog, LogRef, MemoryLog};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sleep_waits() {
        let sink = Arc::new(MemoryLog::new());
        let log = ActionLog::new(sink.clone(), LogRef::action("p", "wait"));
        let mut params = BTreeMap::new();
        params.insert("millis".to_string(), Value::Int(50));

        let start = tokio::time::Instant::now();
        let severity = SleepContributor
            .run(StepInvocation {
                action: "wait",
                params: &params,
                env: &BTreeMap::new(),
                log: &log,
                working_dir: Path::new("."),
            })
            .await
            .unwrap();

        assert_eq!(severity, Severity::Success);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(sink.contains("Sleeping for 50 ms"));
    }

    #[test]
    fn test_rejects_negative() {
        let sink = Arc::new(MemoryLog::new());
        let log = ActionLog::new(sink, LogRef::action("p", "wait"));
        let mut params = BTreeMap::new();
        params.insert("millis".to_string(), Value::Int(-5));

        let result = tokio_test::block_on(SleepContributor.run(StepInvocation {
            action: "wait",
            params: &params,
            env: &BTreeMap::new(),
            log: &log,
            working_dir: Path::new("."),
        }));
        assert!(matches!(result, Err(PlumberError::InvalidParam { .. })));
    }
}
