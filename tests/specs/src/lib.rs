// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end hub tests.
//!
//! Spawns the real `roost` binary as a subprocess and speaks the framed
//! unix-socket protocol against it, the way a worker process would.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::UnixStream;

use roost::transport::{read_frame, write_frame};

pub const MAX_FRAME: usize = 16 * 1024 * 1024;

/// Resolve the path to the compiled `roost` binary.
pub fn roost_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("roost")
}

/// A running `roost` process that is killed on drop.
pub struct HubProcess {
    child: Child,
    socket: PathBuf,
    _dir: tempfile::TempDir,
}

impl HubProcess {
    pub fn start() -> anyhow::Result<Self> {
        let binary = roost_binary();
        anyhow::ensure!(binary.exists(), "roost binary not found at {}", binary.display());

        let dir = tempfile::tempdir()?;
        let socket = dir.path().join("hub.sock");
        let ipc_dir = dir.path().join("ipc");

        let child = Command::new(&binary)
            .arg("--socket")
            .arg(&socket)
            .arg("--ipc-dir")
            .arg(&ipc_dir)
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, socket, _dir: dir })
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Poll until the hub accepts connections.
    pub async fn wait_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("roost did not become ready within {timeout:?}");
            }
            if UnixStream::connect(&self.socket).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    pub async fn connect(&self) -> anyhow::Result<Client> {
        Client::connect(&self.socket).await
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("roost did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for HubProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// One attached worker connection.
pub struct Client {
    stream: UnixStream,
}

impl Client {
    pub async fn connect(socket: &Path) -> anyhow::Result<Self> {
        Ok(Self { stream: UnixStream::connect(socket).await? })
    }

    /// Send a raw request map and return the reply envelope.
    pub async fn call(&mut self, request: Value) -> anyhow::Result<Value> {
        let bytes = serde_json::to_vec(&request)?;
        write_frame(&mut self.stream, &bytes).await?;
        let reply = read_frame(&mut self.stream, MAX_FRAME).await?;
        Ok(serde_json::from_slice(&reply)?)
    }

    /// Send a request, asserting an ok reply, and return its value.
    pub async fn ok(&mut self, request: Value) -> anyhow::Result<Value> {
        let mut reply = self.call(request).await?;
        match reply["status"].as_str() {
            Some("ok") => Ok(reply["value"].take()),
            _ => anyhow::bail!("error reply: {reply}"),
        }
    }

    pub async fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.ok(json!({
            "action": "get_state_callable",
            "item": "set",
            "args": [key, value],
        }))
        .await?;
        Ok(())
    }

    pub async fn state(&mut self) -> anyhow::Result<Value> {
        self.ok(json!({ "action": "send_state" })).await
    }

    /// Check a (possibly modified) map back in on a lock endpoint.
    pub async fn check_in(endpoint: &str, state: &Value) -> anyhow::Result<()> {
        let mut stream = UnixStream::connect(endpoint).await?;
        write_frame(&mut stream, &serde_json::to_vec(state)?).await?;
        Ok(())
    }
}

/// Block until the single notification on a watcher endpoint arrives.
pub async fn notification(endpoint: &str) -> anyhow::Result<Value> {
    let mut stream = UnixStream::connect(endpoint).await?;
    let bytes = read_frame(&mut stream, MAX_FRAME).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Extract the endpoint path string from a registration reply value.
pub fn endpoint_str(value: &Value) -> anyhow::Result<String> {
    value.as_str().map(str::to_owned).ok_or_else(|| anyhow::anyhow!("expected endpoint string"))
}
