//! Send-with-retry loop.
//!
//! The dispatcher serialises an envelope once and sends it to a resolved
//! instance at most [`RetryPolicy::max_attempts`] times. Each attempt races the
//! transport against the clock; when the clock wins, the in-flight send is
//! dropped so a late reply can never be attributed to a later attempt.
//! Transient failures back off and retry, fatal failures return at once.

use std::time::Duration;

use serde_json::Value;
use strum::{AsRefStr, Display};
use tracing::{debug, error, warn};

use crate::envelope::CommandEnvelope;
use crate::errors::DispatchError;
use crate::registry::InstanceHandle;
use crate::retry::{Clock, RetryPolicy, TokioClock};
use crate::transport::{FailureClass, Transport, TransportError};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    /// The editor replied and was ready.
    Delivered,
    /// The attempt failed in a way that may clear up.
    TransientFailure,
    /// The attempt failed in a way retrying cannot fix.
    FatalFailure,
}

/// Record of one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Time since the call started when the attempt finished.
    pub elapsed: Duration,
    /// Classification of the attempt.
    pub outcome: AttemptOutcome,
}

/// Result of a dispatch together with its attempt log.
#[derive(Debug)]
pub struct Dispatched {
    /// Raw editor reply or the reason none was obtained.
    pub result: Result<Value, DispatchError>,
    /// Every send made, in order.
    pub attempts: Vec<DispatchAttempt>,
}

impl Dispatched {
    /// Number of sends made.
    #[must_use]
    pub fn sends(&self) -> usize {
        self.attempts.len()
    }
}

/// Bounded-retry dispatcher over a [`Transport`].
#[derive(Debug, Clone)]
pub struct RetryingDispatcher<T, C = TokioClock> {
    transport: T,
    clock: C,
    policy: RetryPolicy,
}

impl<T> RetryingDispatcher<T>
where
    T: Transport,
{
    /// Builds a dispatcher driven by the tokio timer.
    pub const fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            clock: TokioClock,
            policy,
        }
    }
}

impl<T, C> RetryingDispatcher<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Builds a dispatcher that waits on `clock`.
    pub const fn with_clock(transport: T, policy: RetryPolicy, clock: C) -> Self {
        Self {
            transport,
            clock,
            policy,
        }
    }

    /// Sends `envelope` to `instance`, retrying transient failures.
    ///
    /// Never panics and never retries past the policy; the outcome is always
    /// reported through [`Dispatched::result`].
    pub async fn dispatch(
        &self,
        instance: &InstanceHandle,
        envelope: &CommandEnvelope,
    ) -> Dispatched {
        let mut attempts = Vec::new();
        let payload = match envelope.to_bytes() {
            Ok(payload) => payload,
            Err(source) => {
                error!(
                    target: DISPATCH_TARGET,
                    instance = %instance.id(),
                    action = %envelope.action,
                    error = %source,
                    "failed to serialise command envelope"
                );
                return Dispatched {
                    result: Err(DispatchError::Serialise {
                        action: envelope.action.clone(),
                        source,
                    }),
                    attempts,
                };
            }
        };

        let started = self.clock.now();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1_u32;
        loop {
            let reply = self.attempt(instance, &payload).await;
            let elapsed = self.clock.now().saturating_duration_since(started);
            let outcome = match &reply {
                Ok(_) => AttemptOutcome::Delivered,
                Err(failure) if failure.class() == FailureClass::Transient => {
                    AttemptOutcome::TransientFailure
                }
                Err(_) => AttemptOutcome::FatalFailure,
            };
            attempts.push(DispatchAttempt {
                attempt,
                elapsed,
                outcome,
            });

            let failure = match reply {
                Ok(value) => {
                    debug!(
                        target: DISPATCH_TARGET,
                        instance = %instance.id(),
                        action = %envelope.action,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        outcome = outcome.as_ref(),
                        "command delivered"
                    );
                    return Dispatched {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(failure) => failure,
            };

            if outcome == AttemptOutcome::FatalFailure {
                error!(
                    target: DISPATCH_TARGET,
                    instance = %instance.id(),
                    action = %envelope.action,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    outcome = outcome.as_ref(),
                    error = %failure,
                    "command failed"
                );
                return Dispatched {
                    result: Err(DispatchError::Fatal {
                        instance: instance.id().clone(),
                        source: failure,
                    }),
                    attempts,
                };
            }

            if attempt >= max_attempts {
                error!(
                    target: DISPATCH_TARGET,
                    instance = %instance.id(),
                    action = %envelope.action,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    outcome = outcome.as_ref(),
                    error = %failure,
                    "retries exhausted"
                );
                return Dispatched {
                    result: Err(DispatchError::RetriesExhausted {
                        instance: instance.id().clone(),
                        attempts: attempt,
                        last: failure,
                    }),
                    attempts,
                };
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                target: DISPATCH_TARGET,
                instance = %instance.id(),
                action = %envelope.action,
                attempt,
                elapsed_ms = elapsed.as_millis(),
                outcome = outcome.as_ref(),
                delay_ms = delay.as_millis(),
                error = %failure,
                "transient failure; retrying"
            );
            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        instance: &InstanceHandle,
        payload: &[u8],
    ) -> Result<Value, TransportError> {
        let timeout = self.policy.attempt_timeout();
        tokio::select! {
            biased;
            reply = self.transport.send(instance, payload, timeout) => reply.and_then(reject_busy),
            () = self.clock.sleep(timeout) => Err(TransportError::Timeout { timeout }),
        }
    }
}

/// Turns a "please retry" reply into a transient failure.
///
/// An editor that is reloading scripts answers with `state: "reloading"` (or
/// `"busy"`) or with `hint: "retry"` instead of running the command.
fn reject_busy(reply: Value) -> Result<Value, TransportError> {
    match busy_state(&reply) {
        Some(state) => Err(TransportError::Busy { state }),
        None => Ok(reply),
    }
}

fn busy_state(reply: &Value) -> Option<String> {
    let object = reply.as_object()?;
    let state = object.get("state").and_then(Value::as_str);
    if let Some(busy @ ("reloading" | "busy")) = state {
        return Some(busy.to_owned());
    }
    let hinted = object.get("hint").and_then(Value::as_str) == Some("retry");
    hinted.then(|| state.unwrap_or("retry").to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    use crate::envelope::Params;
    use crate::test_support::{ManualClock, ScriptedTransport, Step, instance};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_secs(1),
            Duration::from_millis(100),
            Duration::from_millis(400),
        )
    }

    fn envelope() -> CommandEnvelope {
        CommandEnvelope::new("get_hierarchy", Params::new())
    }

    #[rstest]
    #[case::reloading(json!({"state": "reloading"}), Some("reloading"))]
    #[case::busy(json!({"state": "busy", "success": false}), Some("busy"))]
    #[case::hint(json!({"hint": "retry"}), Some("retry"))]
    #[case::hint_with_state(json!({"hint": "retry", "state": "compiling"}), Some("compiling"))]
    #[case::ready(json!({"state": "ready", "success": true}), None)]
    #[case::scalar(json!("reloading"), None)]
    fn detects_busy_replies(#[case] reply: Value, #[case] expected: Option<&str>) {
        assert_eq!(busy_state(&reply).as_deref(), expected);
    }

    #[tokio::test]
    async fn first_success_sends_once() {
        let transport = ScriptedTransport::new([Step::Reply(json!({"success": true}))]);
        let clock = ManualClock::new();
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy(5), clock.clone());

        let dispatched = dispatcher.dispatch(&instance(), &envelope()).await;

        assert_eq!(dispatched.result.expect("reply"), json!({"success": true}));
        assert_eq!(transport.sends(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    #[tokio::test]
    async fn transient_failures_then_success_send_k_plus_one_times(#[case] failures: usize) {
        let mut steps = vec![Step::Refused; failures];
        steps.push(Step::Reply(json!({"success": true})));
        let transport = ScriptedTransport::new(steps);
        let clock = ManualClock::new();
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy(5), clock.clone());

        let dispatched = dispatcher.dispatch(&instance(), &envelope()).await;

        assert!(dispatched.result.is_ok());
        assert_eq!(transport.sends(), failures + 1);
        assert_eq!(dispatched.sends(), failures + 1);
        assert_eq!(
            dispatched.attempts.last().map(|attempt| attempt.outcome),
            Some(AttemptOutcome::Delivered)
        );
        assert_eq!(clock.sleeps().len(), failures);
    }

    #[tokio::test]
    async fn persistent_transient_failures_exhaust_attempts() {
        let transport = ScriptedTransport::repeating(Step::Refused);
        let clock = ManualClock::new();
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy(4), clock.clone());

        let dispatched = dispatcher.dispatch(&instance(), &envelope()).await;

        let error = dispatched.result.expect_err("exhausted");
        assert!(matches!(
            error,
            DispatchError::RetriesExhausted { attempts: 4, .. }
        ));
        assert_eq!(transport.sends(), 4);
        assert_eq!(
            clock.sleeps(),
            [
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
        assert!(clock.elapsed() <= policy(4).worst_case_duration());
    }

    #[tokio::test]
    async fn hanging_transport_times_out_each_attempt() {
        let transport = ScriptedTransport::repeating(Step::Hang);
        let clock = ManualClock::new();
        let policy = policy(3);
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy, clock.clone());

        let dispatched = dispatcher.dispatch(&instance(), &envelope()).await;

        let error = dispatched.result.expect_err("timed out");
        assert!(matches!(
            error,
            DispatchError::RetriesExhausted {
                last: TransportError::Timeout { .. },
                ..
            }
        ));
        assert_eq!(transport.sends(), 3);
        assert_eq!(clock.elapsed(), policy.worst_case_duration());
    }

    #[tokio::test]
    async fn fatal_failure_stops_after_one_send() {
        let transport = ScriptedTransport::repeating(Step::Rejected(String::from(
            "Unknown action 'get_hierarchy'",
        )));
        let clock = ManualClock::new();
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy(5), clock.clone());

        let dispatched = dispatcher.dispatch(&instance(), &envelope()).await;

        assert!(matches!(
            dispatched.result,
            Err(DispatchError::Fatal { .. })
        ));
        assert_eq!(transport.sends(), 1);
        assert_eq!(
            dispatched.attempts.first().map(|attempt| attempt.outcome),
            Some(AttemptOutcome::FatalFailure)
        );
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn busy_reply_is_retried() {
        let transport = ScriptedTransport::new([
            Step::Reply(json!({"state": "reloading"})),
            Step::Reply(json!({"success": true, "data": {"ok": 1}})),
        ]);
        let clock = ManualClock::new();
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy(5), clock.clone());

        let dispatched = dispatcher.dispatch(&instance(), &envelope()).await;

        assert_eq!(
            dispatched.result.expect("reply"),
            json!({"success": true, "data": {"ok": 1}})
        );
        assert_eq!(transport.sends(), 2);
    }

    #[tokio::test]
    async fn every_attempt_sends_identical_bytes() {
        let transport = ScriptedTransport::new([
            Step::Refused,
            Step::Refused,
            Step::Reply(json!({"success": true})),
        ]);
        let clock = ManualClock::new();
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy(5), clock.clone());

        let _ = dispatcher.dispatch(&instance(), &envelope()).await;

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 3);
        assert!(payloads.windows(2).all(|pair| pair.first() == pair.last()));
    }

    #[tokio::test]
    async fn reply_after_the_deadline_is_discarded() {
        let transport = ScriptedTransport::new([
            Step::Late(Duration::from_secs(2), json!({"success": true, "data": "stale"})),
            Step::Reply(json!({"success": true, "data": "fresh"})),
        ]);
        let clock = ManualClock::new();
        let dispatcher =
            RetryingDispatcher::with_clock(transport.clone(), policy(5), clock.clone());

        let dispatched = dispatcher.dispatch(&instance(), &envelope()).await;

        assert_eq!(
            dispatched.result.expect("reply"),
            json!({"success": true, "data": "fresh"})
        );
        let outcomes: Vec<AttemptOutcome> = dispatched
            .attempts
            .iter()
            .map(|attempt| attempt.outcome)
            .collect();
        assert_eq!(
            outcomes,
            [AttemptOutcome::TransientFailure, AttemptOutcome::Delivered]
        );
        assert_eq!(transport.sends(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_dispatch_during_backoff_stops_sending() {
        let transport = ScriptedTransport::repeating(Step::Refused);
        let dispatcher = RetryingDispatcher::new(transport.clone(), policy(5));
        let (instance, envelope) = (instance(), envelope());

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            dispatcher.dispatch(&instance, &envelope),
        )
        .await;
        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(cancelled.is_err());
        assert_eq!(transport.sends(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_dispatch_while_awaiting_a_reply_stops_sending() {
        let transport = ScriptedTransport::repeating(Step::Hang);
        let dispatcher = RetryingDispatcher::new(transport.clone(), policy(5));
        let (instance, envelope) = (instance(), envelope());

        let cancelled = tokio::time::timeout(
            Duration::from_millis(500),
            dispatcher.dispatch(&instance, &envelope),
        )
        .await;
        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(cancelled.is_err());
        assert_eq!(transport.sends(), 1);
    }
}
