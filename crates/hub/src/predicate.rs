// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative predicates for condition watchers.
//!
//! Clients transport a predicate as a JSON tree of comparisons and boolean
//! combinators; the server evaluates it against the state map. The tree is
//! pure data: registering a condition watcher never hands the server code
//! to execute.
//!
//! Comparison semantics: `eq`/`ne` treat an absent key as JSON null, the
//! same answer a lookup with a null default would give. The ordering
//! operators require both sides to be numbers or both to be strings;
//! anything else (including an absent key) is an evaluation error, which
//! drops the watcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{ErrorBody, ErrorKind};
use crate::wire::StateMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Eq { key: String, value: Value },
    Ne { key: String, value: Value },
    Lt { key: String, value: Value },
    Le { key: String, value: Value },
    Gt { key: String, value: Value },
    Ge { key: String, value: Value },
    Exists { key: String },
    Missing { key: String },
    All { preds: Vec<Predicate> },
    Any { preds: Vec<Predicate> },
    Not { pred: Box<Predicate> },
}

impl Predicate {
    /// Evaluate against the current state.
    pub fn eval(&self, state: &StateMap) -> Result<bool, ErrorBody> {
        match self {
            Self::Eq { key, value } => Ok(lookup(state, key) == value),
            Self::Ne { key, value } => Ok(lookup(state, key) != value),
            Self::Lt { key, value } => Ok(ordering(state, key, value)? == Ordering::Less),
            Self::Le { key, value } => Ok(ordering(state, key, value)? != Ordering::Greater),
            Self::Gt { key, value } => Ok(ordering(state, key, value)? == Ordering::Greater),
            Self::Ge { key, value } => Ok(ordering(state, key, value)? != Ordering::Less),
            Self::Exists { key } => Ok(state.contains_key(key)),
            Self::Missing { key } => Ok(!state.contains_key(key)),
            Self::All { preds } => {
                for pred in preds {
                    if !pred.eval(state)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any { preds } => {
                for pred in preds {
                    if pred.eval(state)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not { pred } => Ok(!pred.eval(state)?),
        }
    }
}

fn lookup<'a>(state: &'a StateMap, key: &str) -> &'a Value {
    state.get(key).unwrap_or(&Value::Null)
}

fn ordering(state: &StateMap, key: &str, target: &Value) -> Result<Ordering, ErrorBody> {
    let current = lookup(state, key);
    match (current, target) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| pred_error(format!("cannot order {a} against {b}"))),
            _ => Err(pred_error("number out of comparable range")),
        },
        (Value::String(a), Value::String(b)) => Ok(a.as_str().cmp(b.as_str())),
        (a, b) => Err(pred_error(format!(
            "cannot order {} against {} for key {key}",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn pred_error(message: impl Into<String>) -> ErrorBody {
    ErrorBody::new(ErrorKind::Predicate, message)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "predicate_tests.rs"]
mod tests;
