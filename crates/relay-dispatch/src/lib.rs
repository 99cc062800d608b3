//! Command dispatch core for the editor relay.
//!
//! A caller hands [`CommandClient::execute_command`] a session, an opaque
//! action name and a parameter map. The client:
//!
//! 1. resolves the editor instance bound to the session
//!    ([`InstanceResolver`]),
//! 2. sends the [`CommandEnvelope`] with bounded retry and per-attempt
//!    timeouts ([`RetryingDispatcher`]),
//! 3. folds whatever came back, reply or error, into one
//!    [`ResultEnvelope`] ([`normalize`]).
//!
//! The crate never interprets the action or its parameters. Loosely typed
//! input is coerced up front by [`params`]; the [`prefab`] module shows a
//! front end built on top.

mod client;
mod dispatch;
mod envelope;
mod errors;
pub mod params;
pub mod prefab;
mod registry;
mod response;
mod retry;
pub mod transport;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use client::{CommandClient, Execution};
pub use dispatch::{AttemptOutcome, DispatchAttempt, Dispatched, RetryingDispatcher};
pub use envelope::{
    CommandEnvelope, DEFAULT_SUCCESS_MESSAGE, ParamValue, Params, ResultEnvelope,
};
pub use errors::DispatchError;
pub use params::{ParamsBuilder, coerce_bool, coerce_int};
pub use prefab::{MANAGE_PREFABS_COMMAND, PrefabAction, PrefabArgs, manage_prefabs};
pub use registry::{
    InstanceHandle, InstanceId, InstanceRegistry, InstanceResolver, SessionId, SessionRegistry,
};
pub use response::{
    DEFAULT_FAILURE_MESSAGE, DETAIL_KEY, DISPATCH_FAILED_PREFIX, UNEXPECTED_SHAPE_PREFIX,
    normalize,
};
pub use retry::{Clock, RetryPolicy, TokioClock};
pub use transport::{FailureClass, FramedTransport, Transport, TransportError};
