// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatcher loop: the single owner of the state map, the watcher
//! registries, and the endpoint allocator.
//!
//! One request is handled to completion (reply sent, resolver swept)
//! before the next is received. That serial discipline is what makes the
//! watcher semantics exact: a client holding a mutation ack knows every
//! watcher pending at that moment has been evaluated.

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{Endpoint, EndpointAllocator};
use crate::error::{ErrorBody, ErrorKind};
use crate::store::{StateOp, StateStore};
use crate::transport::{Inbound, ReplySender};
use crate::watch::{
    ChangeBaseline, ChangeWatcher, ConditionWatcher, EqualsWatcher, Registries, ValueWatcher,
};
use crate::wire::{Reply, Request};

/// Which registries to sweep once the reply is on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sweep {
    None,
    All,
    Change,
    Condition,
    ValueChange,
    Equals,
}

/// A handler's successful result: the reply value plus the sweep it owes.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub value: Value,
    pub sweep: Sweep,
}

impl Outcome {
    fn reply(value: Value) -> Self {
        Self { value, sweep: Sweep::None }
    }
}

/// The state hub.
pub struct Hub {
    store: StateStore,
    watchers: Registries,
    endpoints: EndpointAllocator,
    max_frame: usize,
}

impl Hub {
    pub fn new(endpoints: EndpointAllocator, max_frame: usize) -> Self {
        Self { store: StateStore::new(), watchers: Registries::default(), endpoints, max_frame }
    }

    /// Serve requests until shutdown fires or the transport goes away.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>, shutdown: CancellationToken) {
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = inbound.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            self.dispatch(msg).await;
        }
        tracing::info!("hub: stopped ({} watchers pending)", self.watchers.pending());
    }

    /// Route one request through the action table, reply exactly once, then
    /// run whatever resolver sweep the handler owes.
    pub(crate) async fn dispatch(&mut self, msg: Inbound) {
        let Inbound { client, request, reply } = msg;
        let Some(action) = request.action.clone() else {
            let error = ErrorBody::new(ErrorKind::UnknownAction, "missing action field");
            send_reply(&reply, Reply::error(error));
            return;
        };
        tracing::debug!("hub: client {client} → {action}");

        // The lock protocol replies mid-handler and then parks the loop on
        // the check-in; it does not fit the reply-then-sweep shape below.
        if action == "lock_state" {
            self.lock_state(client, &reply).await;
            return;
        }

        let outcome = match action.as_str() {
            "send_state" => Ok(Outcome::reply(Value::Object(self.store.snapshot()))),
            "get_state_attr" => self.get_state_attr(&request),
            "get_state_callable" => self.get_state_callable(&request),
            "add_change_handler" => self.add_change_handler(&request),
            "add_val_change_handler" => self.add_val_change_handler(&request),
            "add_equals_handler" => self.add_equals_handler(&request),
            "add_condition_handler" => self.add_condition_handler(&request),
            other => {
                Err(ErrorBody::new(ErrorKind::UnknownAction, format!("unknown action: {other}")))
            }
        };

        match outcome {
            Ok(Outcome { value, sweep }) => {
                send_reply(&reply, Reply::ok(value));
                match sweep {
                    Sweep::None => {}
                    Sweep::All => self.watchers.resolve_all(&self.store),
                    Sweep::Change => self.watchers.resolve_change(&self.store),
                    Sweep::Condition => self.watchers.resolve_condition(&self.store),
                    Sweep::ValueChange => self.watchers.resolve_value_change(&self.store),
                    Sweep::Equals => self.watchers.resolve_equals(&self.store),
                }
            }
            Err(error) => {
                tracing::debug!("hub: client {client} {action} failed: {error}");
                send_reply(&reply, Reply::error(error));
            }
        }
    }

    /// `get_state_attr`: zero-argument projections of the map.
    pub(crate) fn get_state_attr(&mut self, request: &Request) -> Result<Outcome, ErrorBody> {
        let item = request.item.as_deref().ok_or_else(|| ErrorBody::missing_field("item"))?;
        let op = match item {
            "len" => StateOp::Len,
            "is_empty" => StateOp::IsEmpty,
            "keys" => StateOp::Keys,
            "values" => StateOp::Values,
            "items" => StateOp::Items,
            other => {
                return Err(ErrorBody::new(
                    ErrorKind::Operation,
                    format!("unknown state attribute: {other}"),
                ))
            }
        };
        Ok(Outcome::reply(self.store.apply(op, &[])?))
    }

    /// `get_state_callable`: invoke a named map operation. Mutating
    /// operations owe a full sweep when the map actually changed.
    pub(crate) fn get_state_callable(&mut self, request: &Request) -> Result<Outcome, ErrorBody> {
        let item = request.item.as_deref().ok_or_else(|| ErrorBody::missing_field("item"))?;
        let op = StateOp::parse(item).ok_or_else(|| {
            ErrorBody::new(ErrorKind::Operation, format!("unknown state operation: {item}"))
        })?;

        if !op.mutates() {
            return Ok(Outcome::reply(self.store.apply(op, &request.args)?));
        }

        let before = self.store.snapshot();
        let value = self.store.apply(op, &request.args)?;
        let sweep = if *self.store.map() == before { Sweep::None } else { Sweep::All };
        Ok(Outcome { value, sweep })
    }

    /// `lock_state`: hand the requester a snapshot plus a private check-in
    /// endpoint, then stall the loop until the map comes back.
    async fn lock_state(&mut self, client: u64, reply: &ReplySender) {
        let endpoint = match self.alloc_endpoint() {
            Ok(endpoint) => endpoint,
            Err(error) => {
                send_reply(reply, Reply::error(error));
                return;
            }
        };
        let value = json!({
            "endpoint": endpoint.path().display().to_string(),
            "state": Value::Object(self.store.snapshot()),
        });
        send_reply(reply, Reply::ok(value));
        tracing::debug!("hub: state locked by client {client}");

        // Stop-the-world: no request is admitted until the check-in. The
        // lease ends the moment the client pushes the map back.
        match endpoint.recv(self.max_frame).await {
            Ok(Value::Object(next)) => {
                if next != *self.store.map() {
                    self.store.replace(next);
                    self.watchers.resolve_all(&self.store);
                }
                tracing::debug!("hub: state unlocked by client {client}");
            }
            Ok(_) => {
                tracing::warn!("hub: lock check-in was not a map; state unchanged");
            }
            Err(e) => {
                tracing::warn!("hub: lock check-in failed: {e}; state unchanged");
            }
        }
    }

    pub(crate) fn add_change_handler(&mut self, request: &Request) -> Result<Outcome, ErrorBody> {
        let keys = request.keys.clone().ok_or_else(|| ErrorBody::missing_field("keys"))?;
        let endpoint = self.alloc_endpoint()?;
        let path = endpoint.path().display().to_string();
        let baseline = if keys.is_empty() {
            ChangeBaseline::Full(self.store.snapshot())
        } else {
            ChangeBaseline::Projection(self.store.project(&keys))
        };
        self.watchers.change.put(ChangeWatcher { endpoint, keys, baseline });
        Ok(Outcome { value: Value::String(path), sweep: Sweep::Change })
    }

    pub(crate) fn add_val_change_handler(
        &mut self,
        request: &Request,
    ) -> Result<Outcome, ErrorBody> {
        let key = request.key.clone().ok_or_else(|| ErrorBody::missing_field("key"))?;
        let endpoint = self.alloc_endpoint()?;
        let path = endpoint.path().display().to_string();
        // Explicit baseline when the client supplied one, else the value at
        // registration (absent keys stay absent, not null).
        let baseline = match &request.value {
            Some(value) => Some(value.clone()),
            None => self.store.get(&key).cloned(),
        };
        self.watchers.value_change.put(ValueWatcher { endpoint, key, baseline });
        Ok(Outcome { value: Value::String(path), sweep: Sweep::ValueChange })
    }

    pub(crate) fn add_equals_handler(&mut self, request: &Request) -> Result<Outcome, ErrorBody> {
        let key = request.key.clone().ok_or_else(|| ErrorBody::missing_field("key"))?;
        let target = request.value.clone().ok_or_else(|| ErrorBody::missing_field("value"))?;
        let endpoint = self.alloc_endpoint()?;
        let path = endpoint.path().display().to_string();
        self.watchers.equals.put(EqualsWatcher { endpoint, key, target });
        Ok(Outcome { value: Value::String(path), sweep: Sweep::Equals })
    }

    pub(crate) fn add_condition_handler(
        &mut self,
        request: &Request,
    ) -> Result<Outcome, ErrorBody> {
        let predicate =
            request.predicate.clone().ok_or_else(|| ErrorBody::missing_field("callable"))?;
        let endpoint = self.alloc_endpoint()?;
        let path = endpoint.path().display().to_string();
        self.watchers.condition.put(ConditionWatcher { endpoint, predicate });
        Ok(Outcome { value: Value::String(path), sweep: Sweep::Condition })
    }

    fn alloc_endpoint(&self) -> Result<Endpoint, ErrorBody> {
        self.endpoints.alloc().map_err(|e| {
            ErrorBody::new(ErrorKind::Transport, format!("endpoint allocation failed: {e}"))
        })
    }
}

fn send_reply(reply: &ReplySender, message: Reply) {
    if reply.send(message).is_err() {
        tracing::debug!("hub: client disconnected before reply");
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
