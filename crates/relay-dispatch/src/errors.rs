//! Errors raised while resolving and dispatching a command.

use thiserror::Error;

use crate::registry::{InstanceId, SessionId};
use crate::transport::TransportError;

/// Reasons a command produced no editor reply.
///
/// These never escape [`crate::CommandClient::execute_command`]; the response
/// normaliser folds them into a failed [`crate::ResultEnvelope`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The session has no editor instance bound to it.
    #[error(
        "no active instance bound to session '{session}'; connect an editor before sending commands"
    )]
    NoActiveInstance { session: SessionId },
    /// The envelope could not be encoded; nothing was sent.
    #[error("failed to serialise command envelope for action '{action}': {source}")]
    Serialise {
        action: String,
        #[source]
        source: serde_json::Error,
    },
    /// Every attempt failed transiently.
    #[error(
        "could not reach editor instance '{instance}' after {attempts} attempt(s): {last}"
    )]
    RetriesExhausted {
        instance: InstanceId,
        attempts: u32,
        #[source]
        last: TransportError,
    },
    /// An attempt failed in a way retrying cannot fix.
    #[error("request to editor instance '{instance}' failed: {source}")]
    Fatal {
        instance: InstanceId,
        #[source]
        source: TransportError,
    },
}
