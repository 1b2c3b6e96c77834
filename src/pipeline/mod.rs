// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Pipeline definitions and types
//!
//! This module defines the pipeline model, how it is built from a document,
//! and how it is checked before execution.

mod definition;
pub mod document;
mod properties;
mod translate;
mod validation;

pub use definition::*;
pub use document::{load_document, parse_document, DocumentFormat};
pub use properties::{describe, PropertySource};
pub use translate::{translate, CLEAN_PHASE};
pub use validation::{is_reserved, PipelineValidator, RESERVED_STEPS};
