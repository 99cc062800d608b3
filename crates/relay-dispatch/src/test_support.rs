//! Deterministic fakes shared by the unit and behaviour tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_config::InstanceEndpoint;
use serde_json::Value;

use crate::registry::{InstanceHandle, InstanceId};
use crate::retry::Clock;
use crate::transport::{Transport, TransportError};

/// Handle used wherever a test needs a bound instance.
pub(crate) fn instance() -> InstanceHandle {
    InstanceHandle::new(
        InstanceId::new("editor-under-test"),
        InstanceEndpoint::tcp("127.0.0.1", 6400),
    )
}

/// Scripted behaviour for one send.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Reply with the given value.
    Reply(Value),
    /// Fail as if nothing is listening.
    Refused,
    /// Fail as if the editor rejected the request.
    Rejected(String),
    /// Reply with the given value once `Duration` has passed on the tokio timer.
    Late(Duration, Value),
    /// Never reply.
    Hang,
}

impl Step {
    async fn play(self) -> Result<Value, TransportError> {
        match self {
            Self::Reply(value) => Ok(value),
            Self::Refused => Err(TransportError::Connect {
                endpoint: String::from("tcp://127.0.0.1:6400"),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }),
            Self::Rejected(message) => Err(TransportError::rejected(message)),
            Self::Late(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Self::Hang => std::future::pending().await,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    fallback: Option<Step>,
    payloads: Vec<Vec<u8>>,
}

/// Transport that plays back a fixed list of steps and records every send.
///
/// Once the list is exhausted the fallback step repeats; without a fallback
/// the transport hangs.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::scripted(steps, None)
    }

    pub(crate) fn repeating(step: Step) -> Self {
        Self::scripted(Vec::new(), Some(step))
    }

    /// Plays `steps`, then repeats `fallback` (or hangs without one).
    pub(crate) fn scripted(steps: impl IntoIterator<Item = Step>, fallback: Option<Step>) -> Self {
        Self::from_script(Script {
            steps: steps.into_iter().collect(),
            fallback,
            payloads: Vec::new(),
        })
    }

    fn from_script(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn sends(&self) -> usize {
        self.lock().payloads.len()
    }

    pub(crate) fn payloads(&self) -> Vec<Vec<u8>> {
        self.lock().payloads.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        _instance: &InstanceHandle,
        payload: &[u8],
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        let step = {
            let mut script = self.lock();
            script.payloads.push(payload.to_vec());
            script
                .steps
                .pop_front()
                .or_else(|| script.fallback.clone())
                .unwrap_or(Step::Hang)
        };
        step.play().await
    }
}

#[derive(Debug)]
struct Timeline {
    origin: Instant,
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Clock whose sleeps complete immediately and advance virtual time.
#[derive(Debug, Clone)]
pub(crate) struct ManualClock {
    timeline: Arc<Mutex<Timeline>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Timeline> {
        self.timeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every sleep requested so far, backoff and attempt deadlines alike.
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Virtual time elapsed since the clock was created.
    pub(crate) fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let timeline = self.lock();
        timeline.origin + timeline.elapsed
    }

    async fn sleep(&self, duration: Duration) {
        let mut timeline = self.lock();
        timeline.elapsed += duration;
        timeline.sleeps.push(duration);
    }
}
