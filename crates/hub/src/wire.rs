// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire message types for the request/reply protocol.
//!
//! Requests are JSON maps; the fields a given action does not use are simply
//! absent, and unknown fields are ignored. Replies are tagged with a
//! `status` discriminant so clients can re-raise captured server errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorBody;
use crate::predicate::Predicate;

/// The authoritative key→value mapping, as it travels on the wire.
pub type StateMap = serde_json::Map<String, Value>;

/// A single decoded client request.
///
/// `action` names the handler; the remaining fields are that handler's
/// parameters. `callable` carries the declarative predicate tree for
/// condition watchers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Name of a state-map operation or attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    /// Positional arguments for `item`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    /// Single key (value-change and equals watchers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Key list for change watchers; empty means "any key".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// Target value (equals) or explicit baseline (value-change).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Predicate tree for condition watchers.
    #[serde(default, rename = "callable", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
}

/// Reply envelope written back on the requester's connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ok { value: Value },
    Error { error: ErrorBody },
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Self::Ok { value }
    }

    pub fn error(error: ErrorBody) -> Self {
        Self::Error { error }
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
