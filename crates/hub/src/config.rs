// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Configuration for the roost hub.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "roost", about = "Shared-state coordination hub for worker processes")]
pub struct HubConfig {
    /// Unix socket path the hub binds for client requests.
    #[arg(long, env = "ROOST_SOCKET", default_value_os_t = default_socket())]
    pub socket: PathBuf,

    /// Directory where per-watcher notification endpoints are minted.
    #[arg(long, env = "ROOST_IPC_DIR", default_value_os_t = default_ipc_dir())]
    pub ipc_dir: PathBuf,

    /// Maximum accepted frame size in bytes.
    #[arg(long, env = "ROOST_MAX_FRAME_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_frame_bytes: usize,
}

fn default_socket() -> PathBuf {
    std::env::temp_dir().join("roost.sock")
}

fn default_ipc_dir() -> PathBuf {
    std::env::temp_dir().join(format!("roost-{}", std::process::id()))
}
