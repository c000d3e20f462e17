// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests that spawn the real `roost` binary and exercise the
//! wire protocol: state operations, all four watcher classes, and the
//! lock protocol.

use std::time::Duration;

use serde_json::json;

use roost_specs::{endpoint_str, notification, Client, HubProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

async fn started() -> anyhow::Result<HubProcess> {
    let hub = HubProcess::start()?;
    hub.wait_ready(TIMEOUT).await?;
    Ok(hub)
}

// -- State operations ---------------------------------------------------------

#[tokio::test]
async fn basic_set_get() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    client.set("x", json!(1)).await?;
    assert_eq!(client.state().await?, json!({ "x": 1 }));
    Ok(())
}

#[tokio::test]
async fn map_operations_over_the_wire() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    client
        .ok(json!({
            "action": "get_state_callable",
            "item": "update",
            "args": [{ "foo": "foo", "bar": "bar" }],
        }))
        .await?;
    assert_eq!(
        client.ok(json!({ "action": "get_state_attr", "item": "len" })).await?,
        json!(2)
    );
    assert_eq!(
        client
            .ok(json!({ "action": "get_state_callable", "item": "contains", "args": ["foo"] }))
            .await?,
        json!(true)
    );
    assert_eq!(
        client
            .ok(json!({ "action": "get_state_callable", "item": "set_default", "args": ["zzz", null] }))
            .await?,
        json!(null)
    );
    assert_eq!(
        client
            .ok(json!({ "action": "get_state_callable", "item": "pop", "args": ["foo"] }))
            .await?,
        json!("foo")
    );
    assert_eq!(
        client
            .ok(json!({
                "action": "get_state_callable",
                "item": "eq",
                "args": [{ "bar": "bar", "zzz": null }],
            }))
            .await?,
        json!(true)
    );
    assert_eq!(
        client.ok(json!({ "action": "get_state_attr", "item": "items" })).await?,
        json!([["bar", "bar"], ["zzz", null]])
    );
    Ok(())
}

#[tokio::test]
async fn errors_come_back_structured() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    let reply = client.call(json!({ "action": "no_such_action" })).await?;
    assert_eq!(reply["status"], json!("error"));
    assert_eq!(reply["error"]["kind"], json!("unknown_action"));

    let reply = client
        .call(json!({ "action": "get_state_callable", "item": "pop", "args": ["missing"] }))
        .await?;
    assert_eq!(reply["error"]["kind"], json!("operation"));

    // The connection and the server both survive.
    assert_eq!(client.state().await?, json!({}));
    Ok(())
}

// -- Watchers -----------------------------------------------------------------

#[tokio::test]
async fn change_watcher_wakes_on_another_clients_write() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut watcher = hub.connect().await?;
    let mut writer = hub.connect().await?;

    let endpoint = endpoint_str(
        &watcher.ok(json!({ "action": "add_change_handler", "keys": ["x"] })).await?,
    )?;

    writer.set("x", json!(1)).await?;
    assert_eq!(notification(&endpoint).await?, json!({ "x": 1 }));
    Ok(())
}

#[tokio::test]
async fn value_change_watcher_honors_explicit_baseline() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    client.set("x", json!(0)).await?;
    let endpoint = endpoint_str(
        &client
            .ok(json!({ "action": "add_val_change_handler", "key": "x", "value": 0 }))
            .await?,
    )?;

    // Same value again: no wake. A real change: value arrives.
    client.set("x", json!(0)).await?;
    client.set("x", json!(1)).await?;
    assert_eq!(notification(&endpoint).await?, json!(1));
    Ok(())
}

#[tokio::test]
async fn equals_watcher_fires_without_further_mutation() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    client.set("foo", json!("bar")).await?;
    let endpoint = endpoint_str(
        &client
            .ok(json!({ "action": "add_equals_handler", "key": "foo", "value": "bar" }))
            .await?,
    )?;
    assert_eq!(notification(&endpoint).await?, json!(true));
    Ok(())
}

#[tokio::test]
async fn condition_watcher_fires_on_first_value_in_range() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut listener = hub.connect().await?;
    let mut generator = hub.connect().await?;

    generator.set("foo", json!(0.15)).await?;
    let endpoint = endpoint_str(
        &listener
            .ok(json!({
                "action": "add_condition_handler",
                "callable": {
                    "op": "all",
                    "preds": [
                        { "op": "gt", "key": "foo", "value": 0.6 },
                        { "op": "lt", "key": "foo", "value": 0.601 },
                    ],
                },
            }))
            .await?,
    )?;

    let wake = tokio::spawn(async move { notification(&endpoint).await });

    // Deterministic stand-in for the random generator loop: only the third
    // write lands in (0.6, 0.601).
    for value in [0.42, 0.9991, 0.6004, 0.2] {
        generator.set("foo", json!(value)).await?;
    }

    let state = tokio::time::timeout(TIMEOUT, wake).await???;
    assert_eq!(state["foo"], json!(0.6004));
    Ok(())
}

#[tokio::test]
async fn watchers_notify_at_most_once() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    let endpoint = endpoint_str(
        &client.ok(json!({ "action": "add_val_change_handler", "key": "x" })).await?,
    )?;

    client.set("x", json!(1)).await?;
    client.set("x", json!(2)).await?;

    let mut stream = tokio::net::UnixStream::connect(&endpoint).await?;
    let bytes = roost::transport::read_frame(&mut stream, roost_specs::MAX_FRAME).await?;
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&bytes)?, json!(1));
    // One message, then the endpoint closes.
    assert!(roost::transport::read_frame(&mut stream, roost_specs::MAX_FRAME).await.is_err());
    Ok(())
}

#[tokio::test]
async fn failing_predicate_drops_the_watcher() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    client.set("flag", json!(true)).await?;
    let endpoint = endpoint_str(
        &client
            .ok(json!({
                "action": "add_condition_handler",
                "callable": { "op": "lt", "key": "flag", "value": 1 },
            }))
            .await?,
    )?;

    client.set("flag", json!(false)).await?;
    // No notification: the connection is refused (endpoint gone) or the
    // read never completes.
    let read = notification(&endpoint);
    let outcome = tokio::time::timeout(Duration::from_millis(300), read).await;
    assert!(matches!(outcome, Err(_) | Ok(Err(_))));
    Ok(())
}

// -- Lock protocol ------------------------------------------------------------

#[tokio::test]
async fn lock_transaction_blocks_other_clients() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut holder = hub.connect().await?;
    let mut reader = hub.connect().await?;

    holder.set("x", json!(1)).await?;

    let locked = holder.ok(json!({ "action": "lock_state" })).await?;
    assert_eq!(locked["state"], json!({ "x": 1 }));
    let endpoint = endpoint_str(&locked["endpoint"])?;

    // The reader's request parks while the lock is held.
    let blocked = tokio::spawn(async move { reader.state().await });
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!blocked.is_finished());

    // Read-modify-write completes and the world resumes.
    let mut next = locked["state"].clone();
    next["x"] = json!(2);
    next["y"] = json!(3);
    Client::check_in(&endpoint, &next).await?;

    let observed = tokio::time::timeout(TIMEOUT, blocked).await???;
    assert_eq!(observed, json!({ "x": 2, "y": 3 }));
    Ok(())
}

#[tokio::test]
async fn lock_install_resolves_watchers_once() -> anyhow::Result<()> {
    let hub = started().await?;
    let mut client = hub.connect().await?;

    let endpoint = endpoint_str(
        &client.ok(json!({ "action": "add_equals_handler", "key": "y", "value": 3 })).await?,
    )?;

    let locked = client.ok(json!({ "action": "lock_state" })).await?;
    let lock_endpoint = endpoint_str(&locked["endpoint"])?;
    Client::check_in(&lock_endpoint, &json!({ "y": 3 })).await?;

    assert_eq!(notification(&endpoint).await?, json!(true));
    assert_eq!(client.state().await?, json!({ "y": 3 }));
    Ok(())
}
