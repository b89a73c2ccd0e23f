//! Handler registries for events and state changes.
//!
//! Handlers are kept in insertion order. Dispatch clones the matching
//! handlers out of the registry before calling them, so a handler may
//! subscribe or unsubscribe while it runs. A panicking handler is caught and
//! logged; the remaining handlers still run.

use crate::gateway::ConnectionState;

use models::GatewayEvent;
use models::methods::WILDCARD;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::warn;

pub type EventHandler = Arc<dyn Fn(&GatewayEvent) + Send + Sync>;
pub type StateHandler = Arc<dyn Fn(ConnectionState) + Send + Sync>;

struct Registration<H> {
    id: u64,
    name: String,
    handler: H,
}

/// Name-keyed handler list with a reserved wildcard name.
pub(crate) struct HandlerRegistry<H: Clone> {
    next_id: u64,
    registrations: Vec<Registration<H>>,
}

impl<H: Clone> HandlerRegistry<H> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            registrations: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, name: &str, handler: H) -> u64 {
        self.next_id += 1;
        self.registrations.push(Registration {
            id: self.next_id,
            name: name.to_string(),
            handler,
        });
        self.next_id
    }

    /// Removes exactly the registration with this id.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    /// Handlers registered under `name`, then wildcard handlers.
    pub(crate) fn matching(&self, name: &str) -> Vec<H> {
        let exact = self.registrations.iter().filter(|r| r.name == name);
        let wildcard = self
            .registrations
            .iter()
            .filter(|r| r.name == WILDCARD && name != WILDCARD);
        exact.chain(wildcard).map(|r| r.handler.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }
}

/// Handle returned by `on` / `on_state_change`.
///
/// Dropping it keeps the handler registered; call [`Subscription::unsubscribe`]
/// to remove it.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one handler, containing any panic.
pub(crate) fn invoke_guarded(kind: &str, name: &str, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!("{kind} handler for '{name}' panicked; remaining handlers still run");
    }
}
