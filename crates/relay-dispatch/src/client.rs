//! Caller-facing entry point tying resolution, dispatch and normalisation
//! together.

use tracing::{Instrument, info_span, warn};

use crate::dispatch::{DispatchAttempt, Dispatched, RetryingDispatcher};
use crate::envelope::{CommandEnvelope, Params, ResultEnvelope};
use crate::registry::{InstanceRegistry, InstanceResolver, SessionId};
use crate::response::normalize;
use crate::retry::{Clock, RetryPolicy, TokioClock};
use crate::transport::Transport;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Normalised answer plus the attempt log that produced it.
#[derive(Debug)]
pub struct Execution {
    /// Canonical result handed back to the caller.
    pub envelope: ResultEnvelope,
    /// Every send made for the command; empty when none was attempted.
    pub attempts: Vec<DispatchAttempt>,
}

/// Executes commands on the editor instance bound to a session.
///
/// Calls share no mutable state, so one client can serve many sessions
/// concurrently behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CommandClient<R, T, C = TokioClock> {
    resolver: InstanceResolver<R>,
    dispatcher: RetryingDispatcher<T, C>,
}

impl<R, T> CommandClient<R, T>
where
    R: InstanceRegistry,
    T: Transport,
{
    /// Builds a client that retries on the tokio timer.
    pub const fn new(registry: R, transport: T, policy: RetryPolicy) -> Self {
        Self::with_dispatcher(registry, RetryingDispatcher::new(transport, policy))
    }
}

impl<R, T, C> CommandClient<R, T, C>
where
    R: InstanceRegistry,
    T: Transport,
    C: Clock,
{
    /// Builds a client around an existing dispatcher.
    pub const fn with_dispatcher(registry: R, dispatcher: RetryingDispatcher<T, C>) -> Self {
        Self {
            resolver: InstanceResolver::new(registry),
            dispatcher,
        }
    }

    /// Sends `action` with `params` to the session's instance.
    ///
    /// Always yields a [`ResultEnvelope`]; resolution and transport failures
    /// are reported through `success = false`.
    pub async fn execute_command(
        &self,
        session: &SessionId,
        action: &str,
        params: Params,
    ) -> ResultEnvelope {
        self.execute(session, CommandEnvelope::new(action, params))
            .await
            .envelope
    }

    /// Like [`Self::execute_command`] but also returns the attempt log.
    pub async fn execute(&self, session: &SessionId, envelope: CommandEnvelope) -> Execution {
        let span = info_span!(
            target: CLIENT_TARGET,
            "execute_command",
            session = %session,
            action = %envelope.action
        );
        async move {
            let dispatched = match self.resolver.resolve(session) {
                Ok(instance) => self.dispatcher.dispatch(&instance, &envelope).await,
                Err(error) => {
                    warn!(target: CLIENT_TARGET, error = %error, "no instance to dispatch to");
                    Dispatched {
                        result: Err(error),
                        attempts: Vec::new(),
                    }
                }
            };
            Execution {
                envelope: normalize(dispatched.result),
                attempts: dispatched.attempts,
            }
        }
        .instrument(span)
        .await
    }
}
