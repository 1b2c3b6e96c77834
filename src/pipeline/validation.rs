// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Inline Pipeline validation
//!
//! Inline code may not declare phases, parallel branches or agents itself;
//! those are owned by the engine. Validation runs before anything executes.

use crate::errors::{PlumberError, PlumberResult};
use crate::pipeline::{Phase, PipelineSpec};
use crate::script::Script;

/// Orchestration steps reserved for the engine, in reporting order
pub const RESERVED_STEPS: [&str; 3] = ["stage", "parallel", "node"];

/// Whether `name` is a reserved orchestration step
pub fn is_reserved(name: &str) -> bool {
    RESERVED_STEPS.contains(&name)
}

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Check the inline code of one action
    ///
    /// Every distinct reserved step is reported, in `RESERVED_STEPS` order,
    /// wherever it appears in the script.
    pub fn validate_inline(action: &str, script: &Script) -> PlumberResult<()> {
        let used: Vec<&str> = script.call_names().into_iter().map(|(name, _)| name).collect();

        let illegal: Vec<String> = RESERVED_STEPS
            .iter()
            .filter(|reserved| used.contains(*reserved))
            .map(|s| s.to_string())
            .collect();

        if illegal.is_empty() {
            Ok(())
        } else {
            Err(PlumberError::IllegalInlineSteps {
                action: action.to_string(),
                steps: illegal,
            })
        }
    }

    /// Check every inline action of one phase
    pub fn validate_phase(phase: &Phase) -> PlumberResult<()> {
        for action in &phase.actions {
            if let Some(inline) = action.inline_script() {
                Self::validate_inline(&action.name, &inline.script)?;
            }
        }
        Ok(())
    }

    /// Check every inline action, main phases first, then clean
    pub fn validate(spec: &PipelineSpec) -> PlumberResult<()> {
        spec.all_phases().try_for_each(Self::validate_phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;

    #[test]
    fn test_plain_script_passes() {
        let script = parse_script("echo 'hello'\nwithEnv(['A=b']) { echo 'x' }").unwrap();
        assert!(PipelineValidator::validate_inline("a", &script).is_ok());
    }

    #[test]
    fn test_reports_all_reserved_in_declaration_order() {
        let script = parse_script("node {\n  parallel(one: 'x')\n}\nstage('s') { echo 'x' }\nnode { }").unwrap();
        let err = PipelineValidator::validate_inline("bad", &script).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal Pipeline steps used in inline Pipeline - stage, parallel, node"
        );
    }

    #[test]
    fn test_reports_subset() {
        let script = parse_script("echo 'a'\nnode { echo 'b' }").unwrap();
        let err = PipelineValidator::validate_inline("bad", &script).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal Pipeline steps used in inline Pipeline - node"
        );
    }

    #[test]
    fn test_validate_checks_clean_section() {
        let spec = PipelineSpec::from_yaml(
            r#"
phases:
  - name: main
    actions:
      - name: ok
        pipeline: echo 'fine'
clean:
  actions:
    - name: sneaky
      pipeline: stage('x') { echo 'no' }
"#,
        )
        .unwrap();

        let err = PipelineValidator::validate(&spec).unwrap_err();
        assert!(matches!(err, PlumberError::IllegalInlineSteps { ref action, .. } if action == "sneaky"));

        assert!(PipelineValidator::validate_phase(&spec.phases[0]).is_ok());
        assert!(PipelineValidator::validate_phase(spec.clean.as_ref().unwrap()).is_err());
    }
}
