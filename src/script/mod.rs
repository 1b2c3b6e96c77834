// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Inline Pipeline scripts
//!
//! A small, sandboxed step language: parsing, values, templated parameters
//! and the capability-bound evaluator.

mod eval;
mod lexer;
mod parser;
mod template;
mod value;

pub use eval::{is_builtin, Evaluator, ScriptContext, ScriptOutcome, BUILTINS};
pub use lexer::{ParseError, Position};
pub use parser::{parse_script, parse_template, Arg, Expr, Script, Segment, Statement};
pub use template::ParamTemplate;
pub use value::Value;
