// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Private notification endpoints.
//!
//! Every watcher registration mints a fresh unix-socket endpoint. The
//! listener is bound at allocation time, before the path is ever revealed
//! to the client, so the client may connect at any moment afterwards and
//! block until its single notification arrives. Exactly one frame ever
//! crosses an endpoint; single use is enforced by move semantics, since
//! both [`Endpoint::notify`] and [`Endpoint::recv`] consume the endpoint.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::net::UnixListener;
use uuid::Uuid;

use crate::transport::{read_frame, write_frame};

/// Mints unique endpoints under the hub's ipc directory.
#[derive(Debug)]
pub struct EndpointAllocator {
    dir: PathBuf,
}

impl EndpointAllocator {
    /// Create the allocator, creating the ipc directory on first use.
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Mint a fresh endpoint with its listener already bound.
    pub fn alloc(&self) -> std::io::Result<Endpoint> {
        let path = self.dir.join(format!("{}.sock", Uuid::new_v4()));
        let listener = UnixListener::bind(&path)?;
        Ok(Endpoint { path, listener })
    }
}

/// A single-use channel from the hub to one watcher.
#[derive(Debug)]
pub struct Endpoint {
    path: PathBuf,
    listener: UnixListener,
}

impl Endpoint {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deliver the notification, then tear the endpoint down.
    ///
    /// Runs detached: the hub loop must not park on a watcher that never
    /// reads. Delivery failure (client gone, write error) is a silent loss.
    pub fn notify(self, payload: &Value) {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("endpoint: notification did not serialize: {e}");
                return;
            }
        };
        tokio::spawn(async move {
            match self.listener.accept().await {
                Ok((mut stream, _)) => {
                    if let Err(e) = write_frame(&mut stream, &bytes).await {
                        tracing::debug!(
                            "endpoint {}: push failed: {e}",
                            self.path.display()
                        );
                    }
                }
                Err(e) => {
                    tracing::debug!("endpoint {}: accept failed: {e}", self.path.display());
                }
            }
            let _ = std::fs::remove_file(&self.path);
        });
    }

    /// Receive exactly one inbound frame (the lock protocol's check-in).
    ///
    /// Blocks the caller until the client connects and writes; that stall
    /// is the lock protocol's intended stop-the-world behavior.
    pub async fn recv(self, max_frame: usize) -> anyhow::Result<Value> {
        let (mut stream, _) = self.listener.accept().await?;
        let bytes = read_frame(&mut stream, max_frame).await?;
        let value = serde_json::from_slice(&bytes)?;
        let _ = std::fs::remove_file(&self.path);
        Ok(value)
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
