// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watcher registries and the post-mutation resolver.
//!
//! Four FIFO registries hold pending watchers, each entry carrying the
//! baseline its "changed / satisfied" decision is made against. The
//! resolver drains a registry, notifies the entries whose predicate now
//! holds, and re-queues the rest, so each entry is evaluated exactly once
//! per sweep and notified at most once in its lifetime.

use std::collections::VecDeque;

use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::predicate::Predicate;
use crate::store::StateStore;
use crate::wire::StateMap;

/// FIFO of pending watchers.
///
/// `drain` is the sole consumption path: it takes the whole queue so a
/// sweep iterates a stable snapshot, immune to the re-inserts it performs
/// while walking it.
#[derive(Debug)]
pub struct WatcherQueue<T> {
    items: VecDeque<T>,
}

impl<T> WatcherQueue<T> {
    pub fn put(&mut self, entry: T) {
        self.items.push_back(entry);
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::IntoIter<T> {
        std::mem::take(&mut self.items).into_iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for WatcherQueue<T> {
    fn default() -> Self {
        Self { items: VecDeque::new() }
    }
}

/// Baseline a change watcher compares against.
#[derive(Debug)]
pub enum ChangeBaseline {
    /// Values of the watched keys at registration; absent keys are `None`.
    Projection(Vec<Option<Value>>),
    /// Whole-state snapshot, for watchers covering any key.
    Full(StateMap),
}

/// Fires when the projection of its key set differs from the baseline.
#[derive(Debug)]
pub struct ChangeWatcher {
    pub endpoint: Endpoint,
    pub keys: Vec<String>,
    pub baseline: ChangeBaseline,
}

/// Fires when the value under `key` differs from the baseline.
#[derive(Debug)]
pub struct ValueWatcher {
    pub endpoint: Endpoint,
    pub key: String,
    /// `None` means the key was absent at registration (and no explicit
    /// baseline was supplied).
    pub baseline: Option<Value>,
}

/// Fires when `state[key]` equals the target.
#[derive(Debug)]
pub struct EqualsWatcher {
    pub endpoint: Endpoint,
    pub key: String,
    pub target: Value,
}

/// Fires when the predicate evaluates true.
#[derive(Debug)]
pub struct ConditionWatcher {
    pub endpoint: Endpoint,
    pub predicate: Predicate,
}

/// The four pending-watcher registries.
#[derive(Debug, Default)]
pub struct Registries {
    pub change: WatcherQueue<ChangeWatcher>,
    pub condition: WatcherQueue<ConditionWatcher>,
    pub value_change: WatcherQueue<ValueWatcher>,
    pub equals: WatcherQueue<EqualsWatcher>,
}

impl Registries {
    /// One full sweep, in fixed order. Runs after every effective mutation.
    pub fn resolve_all(&mut self, store: &StateStore) {
        self.resolve_change(store);
        self.resolve_condition(store);
        self.resolve_value_change(store);
        self.resolve_equals(store);
    }

    pub fn resolve_change(&mut self, store: &StateStore) {
        let mut pending = Vec::new();
        for watcher in self.change.drain() {
            let changed = match &watcher.baseline {
                ChangeBaseline::Projection(old) => store.project(&watcher.keys) != *old,
                ChangeBaseline::Full(old) => old != store.map(),
            };
            if changed {
                watcher.endpoint.notify(&Value::Object(store.snapshot()));
            } else {
                pending.push(watcher);
            }
        }
        for watcher in pending {
            self.change.put(watcher);
        }
    }

    pub fn resolve_condition(&mut self, store: &StateStore) {
        let mut pending = Vec::new();
        for watcher in self.condition.drain() {
            match watcher.predicate.eval(store.map()) {
                Ok(true) => watcher.endpoint.notify(&Value::Object(store.snapshot())),
                Ok(false) => pending.push(watcher),
                Err(e) => {
                    // An unevaluable predicate would fail on every sweep;
                    // the watcher is dropped without a notification.
                    tracing::warn!(
                        "resolver: dropping condition watcher on {}: {e}",
                        watcher.endpoint.path().display()
                    );
                }
            }
        }
        for watcher in pending {
            self.condition.put(watcher);
        }
    }

    pub fn resolve_value_change(&mut self, store: &StateStore) {
        let mut pending = Vec::new();
        for watcher in self.value_change.drain() {
            let current = store.get(&watcher.key).cloned();
            if current != watcher.baseline {
                watcher.endpoint.notify(&current.unwrap_or(Value::Null));
            } else {
                pending.push(watcher);
            }
        }
        for watcher in pending {
            self.value_change.put(watcher);
        }
    }

    pub fn resolve_equals(&mut self, store: &StateStore) {
        let mut pending = Vec::new();
        for watcher in self.equals.drain() {
            if store.get(&watcher.key) == Some(&watcher.target) {
                watcher.endpoint.notify(&Value::Bool(true));
            } else {
                pending.push(watcher);
            }
        }
        for watcher in pending {
            self.equals.put(watcher);
        }
    }

    /// Total pending entries across all registries.
    pub fn pending(&self) -> usize {
        self.change.len() + self.condition.len() + self.value_change.len() + self.equals.len()
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
