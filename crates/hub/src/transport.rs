// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/reply transport over the hub's unix socket.
//!
//! Wire format: `[u32 big-endian length][UTF-8 JSON]` per frame. One
//! connection is one client identity. Each connection gets a reader task
//! that decodes frames and fans them into the hub's single inbound queue,
//! and a writer task that drains the connection's reply channel, so a slow
//! client never blocks the hub loop.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorBody, ErrorKind};
use crate::wire::{Reply, Request};

/// Sender half of one connection's outbound reply channel.
pub type ReplySender = mpsc::UnboundedSender<Reply>;

/// One decoded request plus the reply handle of its originating connection.
#[derive(Debug)]
pub struct Inbound {
    pub client: u64,
    pub request: Request,
    pub reply: ReplySender,
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> std::io::Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame exceeds u32 length")
    })?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Read one length-prefixed frame, bounded by `max_frame`.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame: usize,
) -> std::io::Result<Vec<u8>> {
    let len = reader.read_u32().await?;
    if len as usize > max_frame {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {max_frame})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Accept loop: one task per connection, until shutdown.
pub async fn serve(
    listener: UnixListener,
    inbound: mpsc::Sender<Inbound>,
    shutdown: CancellationToken,
    max_frame: usize,
) {
    let mut next_id: u64 = 0;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    next_id += 1;
                    tracing::debug!("transport: client {next_id} connected");
                    tokio::spawn(connection(next_id, stream, inbound.clone(), max_frame));
                }
                Err(e) => {
                    tracing::warn!("transport: accept failed: {e}");
                }
            },
        }
    }
}

/// Read frames off one connection and fan them into the hub queue.
///
/// Frames are forwarded in read order, which is what gives a single client
/// send-order processing of its requests.
async fn connection(id: u64, stream: UnixStream, inbound: mpsc::Sender<Inbound>, max_frame: usize) {
    let (mut reader, writer) = stream.into_split();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_replies(id, writer, reply_rx));

    loop {
        let bytes = match read_frame(&mut reader, max_frame).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::debug!("transport: client {id} disconnected");
                break;
            }
            Err(e) => {
                tracing::debug!("transport: client {id} read failed: {e}");
                break;
            }
        };

        match serde_json::from_slice::<Request>(&bytes) {
            Ok(request) => {
                let msg = Inbound { client: id, request, reply: reply_tx.clone() };
                if inbound.send(msg).await.is_err() {
                    // Hub loop is gone; nothing left to serve.
                    break;
                }
            }
            Err(e) => {
                // Undecodable frames still get a reply so the client is not
                // left hanging on a request it believes is in flight.
                let error =
                    ErrorBody::new(ErrorKind::MalformedRequest, format!("invalid request: {e}"));
                let _ = reply_tx.send(Reply::error(error));
            }
        }
    }
}

/// Drain one connection's reply channel onto its socket.
async fn write_replies(id: u64, mut writer: OwnedWriteHalf, mut replies: mpsc::UnboundedReceiver<Reply>) {
    while let Some(reply) = replies.recv().await {
        let bytes = match serde_json::to_vec(&reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("transport: reply did not serialize: {e}");
                continue;
            }
        };
        if let Err(e) = write_frame(&mut writer, &bytes).await {
            tracing::debug!("transport: client {id} reply write failed: {e}");
            break;
        }
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
