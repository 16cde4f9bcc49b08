// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between clients and the daemon.
//!
//! Every message is a 4-byte big-endian length followed by a JSON document.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use svsem_core::{Batch, IpcKey, SemError, SetId, SetSnapshot};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version reported in the Hello handshake
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for reading or writing one message
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest message either side accepts
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Request from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Handshake; `pid` names the caller that owns the session's undo ledger
    Hello {
        version: String,
        #[serde(default)]
        pid: Option<u32>,
    },

    Ping,

    Status,

    Shutdown,

    /// Create a set, or open the one registered under `key`
    Create {
        #[serde(default)]
        key: Option<IpcKey>,
        nsems: usize,
        #[serde(default)]
        exclusive: bool,
    },

    Remove { id: SetId },

    Show { id: SetId },

    List,

    SetValue { id: SetId, index: u16, value: u32 },

    SetAll { id: SetId, values: Vec<u32> },

    /// Apply a batch; the response is sent once it applies or fails
    Semop { id: SetId, ops: Batch },

    /// Wake every blocked batch of `pid` with `Interrupted`
    Interrupt { pid: u32 },

    NamedCreate {
        name: String,
        #[serde(default)]
        value: u32,
        #[serde(default)]
        exclusive: bool,
    },

    NamedPost { name: String },

    NamedUnlink { name: String },
}

/// Response from the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Hello {
        version: String,
    },

    Pong,

    Ok,

    ShuttingDown,

    Status {
        uptime_secs: u64,
        sets: usize,
        blocked: usize,
    },

    Created {
        id: SetId,
    },

    Set {
        set: SetSnapshot,
    },

    Sets {
        sets: Vec<SetSnapshot>,
    },

    Applied,

    Interrupted {
        woken: usize,
    },

    /// The engine refused or could not complete the request
    Failed {
        error: SemError,
    },

    /// The request itself was unusable
    Error {
        message: String,
    },
}

impl From<Result<(), SemError>> for Response {
    fn from(result: Result<(), SemError>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(error) => Response::Failed { error },
        }
    }
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Encode a message as JSON (without the length prefix)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

/// Decode a JSON message
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(data)?)
}

async fn read_len<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize, ProtocolError> {
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

async fn read_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(body),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let len = read_len(reader).await?;
    read_body(reader, len).await
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a request, bounding the whole read by `timeout`
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let data = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

/// Wait for the next request of a session.
///
/// The session may stay idle indefinitely; once a length prefix arrives the
/// body must follow within `timeout`.
pub async fn next_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let len = read_len(reader).await?;
    let data = tokio::time::timeout(timeout, read_body(reader, len))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

/// Write a response, bounding the write by `timeout`
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
