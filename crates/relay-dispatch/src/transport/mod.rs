//! Transport seam between the dispatcher and a live editor instance.
//!
//! A [`Transport`] carries one serialised [`crate::CommandEnvelope`] to an
//! instance and returns the decoded reply. Every failure is a
//! [`TransportError`] whose [`FailureClass`] tells the dispatcher whether a
//! retry can help.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::registry::InstanceHandle;

mod framed;

pub use framed::{FramedTransport, MAX_FRAME_BYTES};

/// Whether a failure may resolve on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Timeouts, dropped connections, busy editors.
    Transient,
    /// Invalid handles, rejected requests, protocol violations.
    Fatal,
}

/// Errors raised while delivering a command.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No reply arrived within the attempt deadline.
    #[error("no reply within {} ms", timeout.as_millis())]
    Timeout { timeout: Duration },
    /// The editor answered but is not ready to execute commands.
    #[error("editor is busy ({state}); it asked the caller to retry")]
    Busy { state: String },
    /// The endpoint could not be resolved to an address.
    #[error("failed to resolve editor endpoint {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Opening the connection failed.
    #[error("failed to connect to editor at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Reading or writing an established connection failed.
    #[error("connection to editor at {endpoint} failed: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// The editor refused to execute the request.
    #[error("editor rejected the request: {message}")]
    Rejected { message: String },
    /// The peer violated the framing or encoding rules.
    #[error("protocol violation: {message}")]
    Protocol { message: String },
    /// Unix sockets are not available on this platform.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {endpoint}")]
    UnsupportedUnixTransport { endpoint: String },
}

impl TransportError {
    /// Classifies the error for the retry loop.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout { .. } | Self::Busy { .. } => FailureClass::Transient,
            Self::Connect { source, .. } | Self::Io { source, .. } if is_transient_io(source) => {
                FailureClass::Transient
            }
            Self::Resolve { .. }
            | Self::Connect { .. }
            | Self::Io { .. }
            | Self::Rejected { .. }
            | Self::Protocol { .. } => FailureClass::Fatal,
            #[cfg(not(unix))]
            Self::UnsupportedUnixTransport { .. } => FailureClass::Fatal,
        }
    }

    /// Builds a protocol violation.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Builds a rejection carrying the editor's explanation.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// I/O failures that indicate the editor may come back, e.g. while it
/// reloads scripts and briefly closes its listener.
///
/// `NotFound` and `PermissionDenied` are left out: they mean the endpoint
/// itself is wrong.
fn is_transient_io(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Delivers serialised commands to editor instances.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `payload` to `instance` and waits for its reply.
    ///
    /// `timeout` bounds the whole exchange. The dispatcher enforces the same
    /// deadline independently, so implementations may treat it as a hint.
    async fn send(
        &self,
        instance: &InstanceHandle,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(
        &self,
        instance: &InstanceHandle,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        (**self).send(instance, payload, timeout).await
    }
}
