//! Length-prefixed socket transport.
//!
//! Each command opens a fresh connection, writes one frame and reads one
//! frame back. A frame is an 8-byte big-endian body length followed by a
//! UTF-8 JSON body. Replies use the editor's status wrapper:
//!
//! * `{"status":"success","result":…}` yields the `result` value,
//! * `{"status":"error","error":"…"}` becomes [`TransportError::Rejected`],
//! * any other JSON document is returned untouched so the response
//!   normaliser can report its shape.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use relay_config::InstanceEndpoint;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

#[cfg(unix)]
use tokio::net::UnixStream;

use super::{Transport, TransportError};
use crate::registry::InstanceHandle;

/// Largest frame body accepted in either direction (64 MiB).
pub const MAX_FRAME_BYTES: u64 = 64 * 1024 * 1024;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Socket transport speaking the length-prefixed frame protocol.
#[derive(Debug, Clone)]
pub struct FramedTransport {
    max_frame_bytes: u64,
}

impl Default for FramedTransport {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

impl FramedTransport {
    /// Builds a transport with the default frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the frame size limit.
    #[must_use]
    pub const fn with_max_frame_bytes(mut self, max_frame_bytes: u64) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    async fn exchange_with(
        &self,
        endpoint: &InstanceEndpoint,
        payload: &[u8],
    ) -> Result<Value, TransportError> {
        match endpoint {
            InstanceEndpoint::Tcp { host, port } => {
                let mut addresses = tokio::net::lookup_host((host.as_str(), *port))
                    .await
                    .map_err(|source| TransportError::Resolve {
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                let address = addresses.next().ok_or_else(|| TransportError::Resolve {
                    endpoint: endpoint.to_string(),
                    source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"),
                })?;
                let stream =
                    TcpStream::connect(address)
                        .await
                        .map_err(|source| TransportError::Connect {
                            endpoint: endpoint.to_string(),
                            source,
                        })?;
                // Commands are single small frames; do not wait to coalesce.
                if let Err(error) = stream.set_nodelay(true) {
                    trace!(
                        target: TRANSPORT_TARGET,
                        endpoint = %endpoint,
                        error = %error,
                        "could not disable Nagle's algorithm"
                    );
                }
                self.exchange(stream, endpoint, payload).await
            }
            InstanceEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    let stream = UnixStream::connect(path.as_std_path())
                        .await
                        .map_err(|source| TransportError::Connect {
                            endpoint: endpoint.to_string(),
                            source,
                        })?;
                    self.exchange(stream, endpoint, payload).await
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(TransportError::UnsupportedUnixTransport {
                        endpoint: endpoint.to_string(),
                    })
                }
            }
        }
    }

    async fn exchange<S>(
        &self,
        mut stream: S,
        endpoint: &InstanceEndpoint,
        payload: &[u8],
    ) -> Result<Value, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let io_error = |source| TransportError::Io {
            endpoint: endpoint.to_string(),
            source,
        };
        write_frame(&mut stream, payload, self.max_frame_bytes)
            .await
            .map_err(|error| match error {
                FrameError::Io(source) => io_error(source),
                FrameError::Protocol(message) => TransportError::Protocol { message },
            })?;
        let body = read_frame(&mut stream, self.max_frame_bytes)
            .await
            .map_err(|error| match error {
                FrameError::Io(source) => io_error(source),
                FrameError::Protocol(message) => TransportError::Protocol { message },
            })?;
        trace!(
            target: TRANSPORT_TARGET,
            endpoint = %endpoint,
            request_bytes = payload.len(),
            reply_bytes = body.len(),
            "frame exchange complete"
        );
        decode_reply(&body)
    }
}

#[async_trait]
impl Transport for FramedTransport {
    async fn send(
        &self,
        instance: &InstanceHandle,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        tokio::time::timeout(timeout, self.exchange_with(instance.endpoint(), payload))
            .await
            .unwrap_or(Err(TransportError::Timeout { timeout }))
    }
}

#[derive(Debug)]
pub(crate) enum FrameError {
    Io(io::Error),
    Protocol(String),
}

impl From<io::Error> for FrameError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

/// Writes `body` as a single frame and flushes the stream.
pub(crate) async fn write_frame<W>(
    writer: &mut W,
    body: &[u8],
    max_frame_bytes: u64,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let length = u64::try_from(body.len())
        .map_err(|_| FrameError::Protocol(String::from("request length overflows u64")))?;
    if length > max_frame_bytes {
        return Err(FrameError::Protocol(format!(
            "request of {length} bytes exceeds the {max_frame_bytes} byte frame limit"
        )));
    }
    writer.write_u64(length).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads a single frame body.
pub(crate) async fn read_frame<R>(
    reader: &mut R,
    max_frame_bytes: u64,
) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let length = reader.read_u64().await?;
    if length == 0 {
        return Err(FrameError::Protocol(String::from("editor sent an empty frame")));
    }
    if length > max_frame_bytes {
        return Err(FrameError::Protocol(format!(
            "reply of {length} bytes exceeds the {max_frame_bytes} byte frame limit"
        )));
    }
    let capacity = usize::try_from(length)
        .map_err(|_| FrameError::Protocol(format!("reply of {length} bytes cannot be buffered")))?;
    let mut body = vec![0_u8; capacity];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Unwraps the editor's status wrapper.
pub(crate) fn decode_reply(body: &[u8]) -> Result<Value, TransportError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|error| TransportError::protocol(format!("reply is not valid JSON: {error}")))?;
    let Value::Object(mut object) = value else {
        return Ok(value);
    };
    match object.get("status").and_then(Value::as_str) {
        Some("success") => Ok(object
            .remove("result")
            .unwrap_or_else(|| Value::Object(Map::new()))),
        Some("error") => Err(TransportError::rejected(error_detail(&object))),
        _ => Ok(Value::Object(object)),
    }
}

fn error_detail(object: &Map<String, Value>) -> String {
    ["error", "message"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .map_or_else(
            || String::from("editor returned an error without details"),
            str::to_owned,
        )
}
