// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authoritative state map and its closed operation set.
//!
//! Clients address operations by name over the wire; the set is enumerated
//! here and dispatched through a static `match`, so nothing outside this
//! list is ever reachable remotely. Only the seven mutating operations can
//! trigger the watcher resolver, and only when the map actually changed.

use serde_json::{json, Value};

use crate::error::{ErrorBody, ErrorKind};
use crate::wire::StateMap;

/// Closed set of state-map operations addressable via `get_state_callable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOp {
    // Mutating.
    Set,
    Remove,
    SetDefault,
    Pop,
    PopItem,
    Clear,
    Update,
    // Read-only.
    Get,
    Len,
    IsEmpty,
    Contains,
    Keys,
    Values,
    Items,
    Eq,
    Snapshot,
}

impl StateOp {
    /// Look up an operation by its wire name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "set" => Some(Self::Set),
            "remove" => Some(Self::Remove),
            "set_default" => Some(Self::SetDefault),
            "pop" => Some(Self::Pop),
            "pop_item" => Some(Self::PopItem),
            "clear" => Some(Self::Clear),
            "update" => Some(Self::Update),
            "get" => Some(Self::Get),
            "len" => Some(Self::Len),
            "is_empty" => Some(Self::IsEmpty),
            "contains" => Some(Self::Contains),
            "keys" => Some(Self::Keys),
            "values" => Some(Self::Values),
            "items" => Some(Self::Items),
            "eq" => Some(Self::Eq),
            "snapshot" => Some(Self::Snapshot),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Remove => "remove",
            Self::SetDefault => "set_default",
            Self::Pop => "pop",
            Self::PopItem => "pop_item",
            Self::Clear => "clear",
            Self::Update => "update",
            Self::Get => "get",
            Self::Len => "len",
            Self::IsEmpty => "is_empty",
            Self::Contains => "contains",
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Items => "items",
            Self::Eq => "eq",
            Self::Snapshot => "snapshot",
        }
    }

    /// Whether this operation can change the map (and so requires a
    /// pre-image snapshot and a resolver sweep afterwards).
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Self::Set
                | Self::Remove
                | Self::SetDefault
                | Self::Pop
                | Self::PopItem
                | Self::Clear
                | Self::Update
        )
    }
}

/// Owner of the key→value map.
#[derive(Debug, Default)]
pub struct StateStore {
    map: StateMap,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self) -> &StateMap {
        &self.map
    }

    /// Deep copy of the current map.
    pub fn snapshot(&self) -> StateMap {
        self.map.clone()
    }

    /// Install a full replacement map (lock protocol check-in).
    pub fn replace(&mut self, next: StateMap) {
        self.map = next;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Current values of `keys`, in order. Absent keys project to `None`,
    /// which is distinct from a key holding JSON null.
    pub fn project(&self, keys: &[String]) -> Vec<Option<Value>> {
        keys.iter().map(|k| self.map.get(k).cloned()).collect()
    }

    /// Execute one named operation against the map.
    pub fn apply(&mut self, op: StateOp, args: &[Value]) -> Result<Value, ErrorBody> {
        match op {
            StateOp::Set => {
                let key = key_arg(op, args, 0)?.to_owned();
                let value = arg(op, args, 1)?.clone();
                self.map.insert(key, value);
                Ok(Value::Null)
            }
            StateOp::Remove => {
                let key = key_arg(op, args, 0)?;
                match self.map.remove(key) {
                    Some(_) => Ok(Value::Null),
                    None => Err(op_error(op, format!("no such key: {key}"))),
                }
            }
            StateOp::SetDefault => {
                let key = key_arg(op, args, 0)?.to_owned();
                let default = args.get(1).cloned().unwrap_or(Value::Null);
                Ok(self.map.entry(key).or_insert(default).clone())
            }
            StateOp::Pop => {
                let key = key_arg(op, args, 0)?;
                match self.map.remove(key) {
                    Some(value) => Ok(value),
                    None => args
                        .get(1)
                        .cloned()
                        .ok_or_else(|| op_error(op, format!("no such key: {key}"))),
                }
            }
            StateOp::PopItem => {
                let key = match self.map.keys().next() {
                    Some(k) => k.clone(),
                    None => return Err(op_error(op, "state is empty")),
                };
                let value = self.map.remove(&key).unwrap_or(Value::Null);
                Ok(json!([key, value]))
            }
            StateOp::Clear => {
                self.map.clear();
                Ok(Value::Null)
            }
            StateOp::Update => {
                let entries = match arg(op, args, 0)? {
                    Value::Object(entries) => entries.clone(),
                    _ => return Err(op_error(op, "update expects a map argument")),
                };
                for (key, value) in entries {
                    self.map.insert(key, value);
                }
                Ok(Value::Null)
            }
            StateOp::Get => {
                let key = key_arg(op, args, 0)?;
                Ok(self
                    .map
                    .get(key)
                    .cloned()
                    .or_else(|| args.get(1).cloned())
                    .unwrap_or(Value::Null))
            }
            StateOp::Len => Ok(json!(self.map.len())),
            StateOp::IsEmpty => Ok(Value::Bool(self.map.is_empty())),
            StateOp::Contains => {
                let key = key_arg(op, args, 0)?;
                Ok(Value::Bool(self.map.contains_key(key)))
            }
            StateOp::Keys => {
                Ok(Value::Array(self.map.keys().map(|k| Value::String(k.clone())).collect()))
            }
            StateOp::Values => Ok(Value::Array(self.map.values().cloned().collect())),
            StateOp::Items => {
                Ok(Value::Array(self.map.iter().map(|(k, v)| json!([k, v])).collect()))
            }
            StateOp::Eq => {
                let equal = match arg(op, args, 0)? {
                    Value::Object(other) => *other == self.map,
                    _ => false,
                };
                Ok(Value::Bool(equal))
            }
            StateOp::Snapshot => Ok(Value::Object(self.map.clone())),
        }
    }
}

fn arg<'a>(op: StateOp, args: &'a [Value], idx: usize) -> Result<&'a Value, ErrorBody> {
    args.get(idx).ok_or_else(|| op_error(op, format!("missing argument {idx}")))
}

fn key_arg<'a>(op: StateOp, args: &'a [Value], idx: usize) -> Result<&'a str, ErrorBody> {
    arg(op, args, idx)?
        .as_str()
        .ok_or_else(|| op_error(op, "key must be a string"))
}

fn op_error(op: StateOp, message: impl Into<String>) -> ErrorBody {
    ErrorBody::new(ErrorKind::Operation, format!("{}: {}", op.as_str(), message.into()))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
