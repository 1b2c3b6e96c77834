// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Document to model translation
//!
//! Walks the generic document tree in document order and stops at the first
//! structural problem, reporting the field path it was found at.

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;

use serde_json::{Map, Value};

use crate::errors::{PlumberError, PlumberResult};
use crate::pipeline::{Action, ActionKind, InlineScript, Phase, PipelineSpec, RunOptions};
use crate::script::parse_script;

const ROOT_KEYS: &[&str] = &["options", "phases", "clean"];
const PHASE_KEYS: &[&str] = &["name", "concurrency", "actions"];
const ACTION_KEYS: &[&str] = &["name", "action", "params", "pipeline", "env"];
const STEP_KEYS: &[&str] = &["name", "params"];

/// Default name of the clean section
pub const CLEAN_PHASE: &str = "clean";

/// Translate a generic document into a pipeline model
pub fn translate(doc: &Value) -> PlumberResult<PipelineSpec> {
    let root = as_mapping(doc, "<root>")?;
    reject_unknown_keys(root, ROOT_KEYS, "")?;

    let options = match root.get("options") {
        None | Some(Value::Null) => Map::new(),
        Some(v) => as_mapping(v, "options")?.clone(),
    };
    let run_options = run_options(&options)?;

    let phases_value = root.get("phases").ok_or_else(|| PlumberError::InvalidSpec {
        path: "phases".into(),
        reason: "missing required key".into(),
        help: Some("A pipeline needs a 'phases' list with at least one phase".into()),
    })?;
    let phase_list = as_sequence(phases_value, "phases")?;
    if phase_list.is_empty() {
        return Err(PlumberError::invalid_spec("phases", "at least one phase is required"));
    }

    let mut names = HashSet::new();
    let mut phases = Vec::with_capacity(phase_list.len());
    for (i, value) in phase_list.iter().enumerate() {
        let path = format!("phases[{}]", i);
        let phase = translate_phase(value, &path, None)?;
        if !names.insert(phase.name.clone()) {
            return Err(PlumberError::DuplicateName {
                kind: "phase".into(),
                name: phase.name,
                path: format!("{}.name", path),
            });
        }
        phases.push(phase);
    }

    let clean = match root.get("clean") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let phase = translate_phase(value, "clean", Some(CLEAN_PHASE))?;
            if names.contains(&phase.name) {
                return Err(PlumberError::DuplicateName {
                    kind: "phase".into(),
                    name: phase.name,
                    path: "clean.name".into(),
                });
            }
            Some(phase)
        }
    };

    tracing::debug!(
        phases = phases.len(),
        clean = clean.is_some(),
        "translated pipeline document"
    );

    Ok(PipelineSpec {
        options,
        run_options,
        phases,
        clean,
    })
}

fn run_options(options: &Map<String, Value>) -> PlumberResult<RunOptions> {
    let env = match options.get("env") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(v) => string_map(v, "options.env")?,
    };
    let concurrency = match options.get("concurrency") {
        None | Some(Value::Null) => None,
        Some(v) => Some(positive(v, "options.concurrency")?),
    };
    Ok(RunOptions { env, concurrency })
}

fn translate_phase(value: &Value, path: &str, default_name: Option<&str>) -> PlumberResult<Phase> {
    let map = as_mapping(value, path)?;
    reject_unknown_keys(map, PHASE_KEYS, path)?;

    let name = match (map.get("name"), default_name) {
        (Some(v), _) => non_empty_string(v, &format!("{}.name", path))?,
        (None, Some(default)) => default.to_string(),
        (None, None) => return Err(missing(path, "name")),
    };

    let concurrency = match map.get("concurrency") {
        None | Some(Value::Null) => None,
        Some(v) => Some(positive(v, &format!("{}.concurrency", path))?),
    };

    let actions_path = format!("{}.actions", path);
    let action_list = as_sequence(map.get("actions").ok_or_else(|| missing(path, "actions"))?, &actions_path)?;
    if action_list.is_empty() {
        return Err(PlumberError::invalid_spec(
            actions_path,
            format!("phase '{}' has no actions", name),
        ));
    }

    let mut seen = HashSet::new();
    let mut actions = Vec::with_capacity(action_list.len());
    for (i, value) in action_list.iter().enumerate() {
        let action_path = format!("{}[{}]", actions_path, i);
        let action = translate_action(value, &action_path)?;
        if !seen.insert(action.name.clone()) {
            return Err(PlumberError::DuplicateName {
                kind: "action".into(),
                name: action.name,
                path: format!("{}.name", action_path),
            });
        }
        actions.push(action);
    }

    Ok(Phase {
        name,
        actions,
        concurrency,
    })
}

fn translate_action(value: &Value, path: &str) -> PlumberResult<Action> {
    let map = as_mapping(value, path)?;
    reject_unknown_keys(map, ACTION_KEYS, path)?;

    let name = non_empty_string(map.get("name").ok_or_else(|| missing(path, "name"))?, &format!("{}.name", path))?;

    let env = match map.get("env") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(v) => string_map(v, &format!("{}.env", path))?,
    };

    let step = map.get("action").filter(|v| !v.is_null());
    let pipeline = map
        .get("pipeline")
        .filter(|v| !matches!(v, Value::Null))
        .filter(|v| v.as_str().map_or(true, |s| !s.trim().is_empty()));

    let kind = match (step, pipeline) {
        (None, None) => {
            return Err(PlumberError::NoActionOrPipeline {
                path: path.to_string(),
            })
        }
        (Some(_), Some(_)) => {
            return Err(PlumberError::InvalidSpec {
                path: path.to_string(),
                reason: "both 'action' and 'pipeline' are specified".into(),
                help: Some("An action either calls a step contributor or runs inline Pipeline code, not both".into()),
            })
        }
        (Some(step), None) => named_step(step, map.get("params"), path)?,
        (None, Some(code)) => {
            if map.contains_key("params") {
                return Err(PlumberError::invalid_spec(
                    format!("{}.params", path),
                    "'params' only applies to 'action' steps",
                ));
            }
            let source = code.as_str().ok_or_else(|| {
                PlumberError::invalid_spec(format!("{}.pipeline", path), "expected Pipeline code as a string")
            })?;
            let script = parse_script(source).map_err(|e| PlumberError::ScriptSyntax {
                action: name.clone(),
                line: e.position.line,
                column: e.position.column,
                message: e.message,
            })?;
            ActionKind::InlineScript(InlineScript {
                source: source.to_string(),
                script,
            })
        }
    };

    Ok(Action { name, kind, env })
}

fn named_step(step: &Value, params: Option<&Value>, path: &str) -> PlumberResult<ActionKind> {
    let step_path = format!("{}.action", path);
    let (reference, nested) = match step {
        Value::String(_) => (non_empty_string(step, &step_path)?, None),
        Value::Object(map) => {
            reject_unknown_keys(map, STEP_KEYS, &step_path)?;
            let reference = non_empty_string(
                map.get("name").ok_or_else(|| missing(&step_path, "name"))?,
                &format!("{}.name", step_path),
            )?;
            (reference, map.get("params"))
        }
        _ => {
            return Err(PlumberError::invalid_spec(
                step_path,
                "expected a step name or a mapping with 'name' and 'params'",
            ))
        }
    };

    if nested.is_some() && params.is_some() {
        return Err(PlumberError::invalid_spec(
            format!("{}.params", path),
            "params given both inside and beside 'action'",
        ));
    }

    let params = match nested.or(params) {
        None | Some(Value::Null) => Map::new(),
        Some(v) => as_mapping(v, &format!("{}.params", path))?.clone(),
    };

    Ok(ActionKind::NamedStep { reference, params })
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn missing(path: &str, key: &str) -> PlumberError {
    PlumberError::invalid_spec(join(path, key), "missing required key")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

fn as_mapping<'a>(value: &'a Value, path: &str) -> PlumberResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        PlumberError::invalid_spec(path, format!("expected a mapping, found {}", type_name(value)))
    })
}

fn as_sequence<'a>(value: &'a Value, path: &str) -> PlumberResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| {
        PlumberError::invalid_spec(path, format!("expected a list, found {}", type_name(value)))
    })
}

fn non_empty_string(value: &Value, path: &str) -> PlumberResult<String> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Some(_) => Err(PlumberError::invalid_spec(path, "must not be empty")),
        None => Err(PlumberError::invalid_spec(
            path,
            format!("expected a string, found {}", type_name(value)),
        )),
    }
}

fn positive(value: &Value, path: &str) -> PlumberResult<NonZeroUsize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| PlumberError::InvalidSpec {
            path: path.to_string(),
            reason: format!("expected an integer >= 1, found {}", value),
            help: Some("Omit 'concurrency' to run every action of the phase at once".into()),
        })
}

fn string_map(value: &Value, path: &str) -> PlumberResult<BTreeMap<String, String>> {
    let map = as_mapping(value, path)?;
    map.iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(PlumberError::invalid_spec(
                        join(path, k),
                        format!("expected a scalar value, found {}", type_name(other)),
                    ))
                }
            };
            Ok((k.clone(), text))
        })
        .collect()
}

fn reject_unknown_keys(map: &Map<String, Value>, allowed: &[&str], path: &str) -> PlumberResult<()> {
    match map.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(PlumberError::InvalidSpec {
            path: join(path, key),
            reason: "unknown key".into(),
            help: Some(format!("Allowed keys here: {}", allowed.join(", "))),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn err_of(doc: Value) -> PlumberError {
        translate(&doc).unwrap_err()
    }

    #[test]
    fn test_translate_full_document() {
        let spec = translate(&json!({
            "options": {"env": {"FOO": "bar", "N": 3}, "concurrency": 2, "custom": [1]},
            "phases": [
                {"name": "build", "concurrency": 1, "actions": [
                    {"name": "a", "action": "echoParams", "params": {"x": 1}},
                    {"name": "b", "action": {"name": "shell", "params": {"script": "true"}}},
                    {"name": "c", "pipeline": "echo 'hi'", "env": {"K": "v"}}
                ]}
            ],
            "clean": {"actions": [{"name": "tidy", "pipeline": "echo 'bye'"}]}
        }))
        .unwrap();

        assert_eq!(spec.options.get("custom"), Some(&json!([1])));
        assert_eq!(spec.run_options.env.get("N").unwrap(), "3");
        assert_eq!(spec.run_options.concurrency, NonZeroUsize::new(2));

        let build = &spec.phases[0];
        assert_eq!(build.concurrency, NonZeroUsize::new(1));
        match &build.actions[1].kind {
            ActionKind::NamedStep { reference, params } => {
                assert_eq!(reference, "shell");
                assert_eq!(params.get("script"), Some(&json!("true")));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(build.actions[2].env.get("K").unwrap(), "v");
        assert_eq!(spec.clean.as_ref().unwrap().name, CLEAN_PHASE);
    }

    #[test]
    fn test_missing_action_and_pipeline() {
        let err = err_of(json!({"phases": [{"name": "p", "actions": [{"name": "a"}]}]}));
        assert_eq!(err.to_string(), "No action or Pipeline code specified");
        assert!(matches!(err, PlumberError::NoActionOrPipeline { path } if path == "phases[0].actions[0]"));
    }

    #[test]
    fn test_both_kinds_rejected() {
        let err = err_of(json!({"phases": [{"name": "p", "actions": [
            {"name": "a", "action": "echoParams", "pipeline": "echo 'x'"}
        ]}]}));
        assert!(err.to_string().contains("both 'action' and 'pipeline'"));
    }

    #[test]
    fn test_duplicate_names() {
        let err = err_of(json!({"phases": [
            {"name": "p", "actions": [{"name": "a", "pipeline": "echo 'x'"}]},
            {"name": "p", "actions": [{"name": "a", "pipeline": "echo 'x'"}]}
        ]}));
        assert!(matches!(err, PlumberError::DuplicateName { ref kind, ref path, .. } if kind == "phase" && path == "phases[1].name"));

        let err = err_of(json!({"phases": [
            {"name": "p", "actions": [
                {"name": "a", "pipeline": "echo 'x'"},
                {"name": "a", "pipeline": "echo 'y'"}
            ]}
        ]}));
        assert!(matches!(err, PlumberError::DuplicateName { ref kind, .. } if kind == "action"));
    }

    #[test]
    fn test_concurrency_must_be_positive() {
        for bad in [json!(0), json!(-1), json!("two"), json!(1.5)] {
            let err = err_of(json!({"phases": [
                {"name": "p", "concurrency": bad, "actions": [{"name": "a", "pipeline": "echo 'x'"}]}
            ]}));
            assert!(matches!(err, PlumberError::InvalidSpec { ref path, .. } if path == "phases[0].concurrency"));
        }
    }

    #[test]
    fn test_structural_errors_carry_paths() {
        let err = err_of(json!({"phases": []}));
        assert!(matches!(err, PlumberError::InvalidSpec { ref path, .. } if path == "phases"));

        let err = err_of(json!({"phases": [{"name": "p", "actions": [{"pipeline": "echo 'x'"}]}]}));
        assert!(matches!(err, PlumberError::InvalidSpec { ref path, .. } if path == "phases[0].actions[0].name"));

        let err = err_of(json!({"phases": [{"name": "p", "actions": []}]}));
        assert!(matches!(err, PlumberError::InvalidSpec { ref path, .. } if path == "phases[0].actions"));

        let err = err_of(json!({"phases": [{"name": "p", "stages": [], "actions": []}]}));
        assert!(matches!(err, PlumberError::InvalidSpec { ref path, ref reason, .. } if path == "phases[0].stages" && reason == "unknown key"));

        let err = err_of(json!(["not", "a", "mapping"]));
        assert!(err.to_string().contains("expected a mapping, found a list"));
    }

    #[test]
    fn test_first_violation_wins() {
        let err = err_of(json!({"phases": [
            {"name": "p", "actions": [{"name": "a"}]},
            {"name": "q", "concurrency": 0, "actions": [{"name": "b", "pipeline": "echo 'x'"}]}
        ]}));
        assert!(matches!(err, PlumberError::NoActionOrPipeline { .. }));
    }

    #[test]
    fn test_inline_syntax_error() {
        let err = err_of(json!({"phases": [{"name": "p", "actions": [
            {"name": "broken", "pipeline": "echo 'unterminated"}
        ]}]}));
        match err {
            PlumberError::ScriptSyntax { action, line, .. } => {
                assert_eq!(action, "broken");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_clean_name_must_not_clash() {
        let err = err_of(json!({
            "phases": [{"name": "clean", "actions": [{"name": "a", "pipeline": "echo 'x'"}]}],
            "clean": {"actions": [{"name": "b", "pipeline": "echo 'y'"}]}
        }));
        assert!(matches!(err, PlumberError::DuplicateName { ref path, .. } if path == "clean.name"));
    }
}
