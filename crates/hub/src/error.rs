// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure categories reported on the wire.
///
/// Every handler failure is captured into one of these and returned to the
/// requester; none of them terminates the server loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `action` field missing or not in the dispatch table.
    UnknownAction,
    /// A field the invoked handler requires was missing or ill-typed.
    MalformedRequest,
    /// A state-map operation failed (missing key, bad arity, bad argument).
    Operation,
    /// A condition watcher's predicate could not be evaluated.
    Predicate,
    /// Serialization or endpoint failure.
    Transport,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAction => "unknown_action",
            Self::MalformedRequest => "malformed_request",
            Self::Operation => "operation",
            Self::Predicate => "predicate",
            Self::Transport => "transport",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured handler failure, serialized back to the requester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    /// Serialized cause chain, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), trace: None }
    }

    /// A `malformed_request` error for a missing required field.
    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorKind::MalformedRequest, format!("missing required field: {field}"))
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorBody {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
