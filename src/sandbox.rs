// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Allow-list guard for dynamic operations
//!
//! Every member access and built-in call made by inline script code is mapped
//! to an [`Operation`] and checked against an [`AllowList`] before it runs.
//! Anything that does not map to an enumerated operation is rejected, as is
//! any operation left out of the list.

use std::collections::HashSet;
use std::fmt;

use crate::errors::{PlumberError, PlumberResult};

/// Kind of value a member is accessed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    Null,
    Scalar,
    Text,
    List,
    Map,
    Severity,
    /// Pipeline model object exposed through the property bridge
    Model,
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Scalar => "Scalar",
            Self::Text => "String",
            Self::List => "List",
            Self::Map => "Map",
            Self::Severity => "Result",
            Self::Model => "Model",
        };
        f.write_str(name)
    }
}

/// How a member is used: read as a property or invoked with arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Property,
    Call(usize),
}

/// The closed set of dynamic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `map.key`
    MapGet,
    /// `map.containsKey(k)`
    MapContainsKey,
    /// `map.isEmpty()` / `list.isEmpty()`
    CollectionIsEmpty,
    /// `map.size()` / `list.size()`
    CollectionSize,
    /// `list.plus(x)`
    ListAppend,
    /// `map.plus(other)`
    MapPutAll,
    /// `result.isBetterThan(other)`
    SeverityCompare,
    /// `result.combine(other)`
    SeverityCombine,
    /// `setResult('UNSTABLE')`
    SeverityFromString,
    /// `echo`
    TextOutput,
    /// `error` / `unstable`
    SignalResult,
    /// `withEnv([...]) { }`
    EnvCompose,
    /// Named, no-argument read on a model object
    PropertyRead,
    /// Calling a registered step contributor
    RunStep,
}

impl Operation {
    pub const ALL: [Operation; 14] = [
        Operation::MapGet,
        Operation::MapContainsKey,
        Operation::CollectionIsEmpty,
        Operation::CollectionSize,
        Operation::ListAppend,
        Operation::MapPutAll,
        Operation::SeverityCompare,
        Operation::SeverityCombine,
        Operation::SeverityFromString,
        Operation::TextOutput,
        Operation::SignalResult,
        Operation::EnvCompose,
        Operation::PropertyRead,
        Operation::RunStep,
    ];
}

/// Set of permitted operations
#[derive(Debug, Clone)]
pub struct AllowList {
    permitted: HashSet<Operation>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::only(Operation::ALL)
    }
}

impl AllowList {
    /// Permit exactly the given operations
    pub fn only<I: IntoIterator<Item = Operation>>(ops: I) -> Self {
        Self {
            permitted: ops.into_iter().collect(),
        }
    }

    /// Remove an operation from the list
    pub fn without(mut self, op: Operation) -> Self {
        self.permitted.remove(&op);
        self
    }

    pub fn permits(&self, op: Operation) -> bool {
        self.permitted.contains(&op)
    }

    /// Reject `op` unless it is listed; `what` describes the attempted use
    pub fn check(&self, op: Operation, what: &str) -> PlumberResult<()> {
        if self.permits(op) {
            Ok(())
        } else {
            tracing::warn!(operation = ?op, "rejected {}", what);
            Err(PlumberError::security_violation(what))
        }
    }

    /// Map a member access to its operation and check it
    pub fn resolve_member(
        &self,
        receiver: Receiver,
        member: &str,
        access: Access,
    ) -> PlumberResult<Operation> {
        let what = match access {
            Access::Property => format!("{}.{}", receiver, member),
            Access::Call(_) => format!("{}.{}()", receiver, member),
        };

        let op = match (receiver, member, access) {
            (Receiver::Map, _, Access::Property) => Operation::MapGet,
            (Receiver::Map, "containsKey", Access::Call(1)) => Operation::MapContainsKey,
            (Receiver::Map | Receiver::List, "isEmpty", Access::Call(0)) => {
                Operation::CollectionIsEmpty
            }
            (Receiver::Map | Receiver::List, "size", Access::Call(0)) => Operation::CollectionSize,
            (Receiver::List, "plus", Access::Call(1)) => Operation::ListAppend,
            (Receiver::Map, "plus", Access::Call(1)) => Operation::MapPutAll,
            (Receiver::Severity, "isBetterThan", Access::Call(1)) => Operation::SeverityCompare,
            (Receiver::Severity, "combine", Access::Call(1)) => Operation::SeverityCombine,
            (Receiver::Model, _, Access::Property) => Operation::PropertyRead,
            _ => {
                tracing::warn!(%receiver, member, "member is not allow-listed");
                return Err(PlumberError::security_violation(what));
            }
        };

        self.check(op, &what)?;
        Ok(op)
    }
}
