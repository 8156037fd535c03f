//! Length-prefixed JSON framing used by both the lobby and developer listeners.
//!
//! Every frame on the wire is a 4-byte big-endian length prefix followed by exactly
//! that many bytes of UTF-8 JSON. This mirrors the `struct.pack("!I", len(json_bytes))`
//! framing of the original prototype's `Packet` type, ported onto a plain `TcpStream`.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const LENGTH_PREFIX_BYTES: usize = 4;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection closed")]
    Closed,
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("frame body is not valid UTF-8 JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads one frame from `stream`, bounded by `max_frame_size`. Returns `Ok(None)` on a
/// clean EOF at a frame boundary (the peer closed the connection between frames).
pub async fn read_frame<R>(stream: &mut R, max_frame_size: usize) -> Result<Option<Value>, WireError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_BYTES];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(WireError::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_size {
        return Err(WireError::FrameTooLarge {
            size: len,
            limit: max_frame_size,
        });
    }

    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                WireError::Closed
            } else {
                WireError::Io(e)
            }
        })?;

    let value: Value = serde_json::from_slice(&body)?;
    Ok(Some(value))
}

/// Writes a pre-built JSON value as one frame.
pub async fn write_frame<W>(stream: &mut W, value: &Value) -> Result<(), WireError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)?;
    write_raw_frame(stream, &body).await
}

async fn write_raw_frame<W>(stream: &mut W, body: &[u8]) -> Result<(), WireError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len()).map_err(|_| WireError::FrameTooLarge {
        size: body.len(),
        limit: u32::MAX as usize,
    })?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

/// Serializes `payload` and injects a top-level `"type": kind` field, mirroring the
/// prototype's `payload = self.data.copy(); payload["type"] = self.type` reply shape.
pub fn envelope<T: Serialize>(kind: &str, payload: &T) -> Value {
    let mut value = serde_json::to_value(payload).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("type".to_string(), Value::String(kind.to_string()));
    } else {
        let mut map = serde_json::Map::new();
        map.insert("type".to_string(), Value::String(kind.to_string()));
        value = Value::Object(map);
    }
    value
}

/// Convenience wrapper combining [`envelope`] and [`write_frame`].
pub async fn write_message<W, T>(stream: &mut W, kind: &str, payload: &T) -> Result<(), WireError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    write_frame(stream, &envelope(kind, payload)).await
}
