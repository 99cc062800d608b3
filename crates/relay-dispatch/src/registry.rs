//! Session-to-instance bindings and the resolver that reads them.
//!
//! The registry is shared, read-mostly state. Connection management (outside
//! this crate) binds and unbinds sessions; dispatch only ever reads. Every read
//! clones the handle out under the lock, so a resolution observes the binding
//! either before or after a concurrent update and never holds the lock while a
//! command is in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use relay_config::InstanceEndpoint;
use tracing::debug;

use crate::errors::DispatchError;

pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Identity of a caller session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Identity of a connected editor instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wraps an instance identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Opaque reference to one connected editor process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    id: InstanceId,
    endpoint: InstanceEndpoint,
}

impl InstanceHandle {
    /// Builds a handle for an instance reachable at `endpoint`.
    #[must_use]
    pub const fn new(id: InstanceId, endpoint: InstanceEndpoint) -> Self {
        Self { id, endpoint }
    }

    /// Instance identity.
    #[must_use]
    pub const fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Socket the instance accepts commands on.
    #[must_use]
    pub const fn endpoint(&self) -> &InstanceEndpoint {
        &self.endpoint
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({})", self.id, self.endpoint)
    }
}

/// Lookup of the instance bound to a session.
///
/// Implementations must not perform network I/O and must be safe to call
/// concurrently from many sessions.
pub trait InstanceRegistry: Send + Sync {
    /// Returns the handle currently bound to `session`, if any.
    fn lookup(&self, session: &SessionId) -> Option<InstanceHandle>;
}

impl<T> InstanceRegistry for Arc<T>
where
    T: InstanceRegistry + ?Sized,
{
    fn lookup(&self, session: &SessionId) -> Option<InstanceHandle> {
        (**self).lookup(session)
    }
}

/// In-memory registry keyed by session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    bindings: RwLock<HashMap<SessionId, InstanceHandle>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `session` to `instance`, returning the previous binding.
    pub fn bind(&self, session: SessionId, instance: InstanceHandle) -> Option<InstanceHandle> {
        debug!(
            target: REGISTRY_TARGET,
            session = %session,
            instance = %instance,
            "binding session"
        );
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, instance)
    }

    /// Removes the binding for `session`.
    pub fn unbind(&self, session: &SessionId) -> Option<InstanceHandle> {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session)
    }

    /// Invalidates every session bound to `instance`, e.g. after its
    /// connection dropped. Returns the number of sessions released.
    pub fn drop_instance(&self, instance: &InstanceId) -> usize {
        let mut bindings = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = bindings.len();
        bindings.retain(|_, handle| handle.id() != instance);
        let released = before - bindings.len();
        debug!(
            target: REGISTRY_TARGET,
            instance = %instance,
            released,
            "dropped instance bindings"
        );
        released
    }

    /// Number of bound sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no session is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InstanceRegistry for SessionRegistry {
    fn lookup(&self, session: &SessionId) -> Option<InstanceHandle> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .cloned()
    }
}

/// Resolves the instance that should receive a session's next command.
#[derive(Debug, Clone)]
pub struct InstanceResolver<R> {
    registry: R,
}

impl<R> InstanceResolver<R>
where
    R: InstanceRegistry,
{
    /// Wraps a registry.
    pub const fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Returns the bound instance or [`DispatchError::NoActiveInstance`].
    ///
    /// # Errors
    ///
    /// Fails when the session never connected or its instance was dropped.
    pub fn resolve(&self, session: &SessionId) -> Result<InstanceHandle, DispatchError> {
        self.registry
            .lookup(session)
            .ok_or_else(|| DispatchError::NoActiveInstance {
                session: session.clone(),
            })
    }
}
