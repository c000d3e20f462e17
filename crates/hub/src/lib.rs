// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roost: a shared-state coordination hub for multi-process programs.
//!
//! A parent process spawns workers; each worker attaches to the hub over a
//! unix socket. The hub owns a single key→value map, answers read and
//! mutate requests, and resolves reactive watchers, pushing exactly one
//! notification on a private endpoint when a watcher's predicate becomes
//! satisfied.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod hub;
pub mod predicate;
pub mod store;
pub mod transport;
pub mod watch;
pub mod wire;

use anyhow::Context;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::endpoint::EndpointAllocator;
use crate::hub::Hub;

/// Run the hub server until shutdown (ctrl-c or transport loss).
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    if let Some(parent) = config.socket.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    // A stale socket from a previous run would make the bind fail.
    if config.socket.exists() {
        std::fs::remove_file(&config.socket)
            .with_context(|| format!("removing stale socket {}", config.socket.display()))?;
    }
    let listener = UnixListener::bind(&config.socket)
        .with_context(|| format!("binding {}", config.socket.display()))?;

    let endpoints = EndpointAllocator::new(config.ipc_dir.clone())
        .with_context(|| format!("creating ipc dir {}", config.ipc_dir.display()))?;

    tracing::info!("roost: listening on {}", config.socket.display());

    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let transport = tokio::spawn(transport::serve(
        listener,
        inbound_tx,
        shutdown.clone(),
        config.max_frame_bytes,
    ));

    Hub::new(endpoints, config.max_frame_bytes).run(inbound_rx, shutdown.clone()).await;

    shutdown.cancel();
    let _ = transport.await;
    let _ = std::fs::remove_file(&config.socket);
    Ok(())
}
