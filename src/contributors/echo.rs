// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Echo contributor
//!
//! Writes each parameter back to the log. Handy for checking what an action
//! received after templating.

use async_trait::async_trait;

use super::{StepContributor, StepInvocation};
use crate::errors::PlumberResult;
use crate::outcome::Severity;

/// Logs `echoing <key> == <value>` for every parameter
pub struct EchoParamsContributor;

#[async_trait]
impl StepContributor for EchoParamsContributor {
    fn name(&self) -> &str {
        "echoParams"
    }

    fn description(&self) -> &str {
        "Print every parameter the action was given"
    }

    async fn run(&self, invocation: StepInvocation<'_>) -> PlumberResult<Severity> {
        if invocation.params.is_empty() {
            invocation
                .log
                .line(&format!("echoing nothing for {}", invocation.action));
        }
        for (key, value) in invocation.params {
            invocation.log.line(&format!("echoing {} == {}", key, value));
        }
        Ok(Severity::Success)
    }
}
