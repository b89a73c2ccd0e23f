//! State shared between client handles and the connection actor.

use crate::gateway::ConnectionState;
use crate::gateway::registry::{
    EventHandler, HandlerRegistry, StateHandler, invoke_guarded, lock,
};

use models::GatewayEvent;

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// Registry key used for state listeners.
const STATE_CHANGE: &str = "state";

pub(crate) struct Shared {
    state_tx: watch::Sender<ConnectionState>,
    pub(crate) events: Mutex<HandlerRegistry<EventHandler>>,
    pub(crate) state_listeners: Mutex<HandlerRegistry<StateHandler>>,
    next_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state_tx,
            events: Mutex::new(HandlerRegistry::new()),
            state_listeners: Mutex::new(HandlerRegistry::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Publish a new state. Returns false, and notifies nobody, when the
    /// state did not actually change.
    pub(crate) fn set_state(&self, next: ConnectionState) -> bool {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            let handlers = lock(&self.state_listeners).matching(STATE_CHANGE);
            for handler in handlers {
                invoke_guarded("State", next.as_str(), || handler(next));
            }
        }
        changed
    }

    pub(crate) fn add_state_listener(&self, handler: StateHandler) -> u64 {
        lock(&self.state_listeners).add(STATE_CHANGE, handler)
    }

    pub(crate) fn dispatch_event(&self, event: &GatewayEvent) {
        let handlers = lock(&self.events).matching(&event.name);
        for handler in handlers {
            invoke_guarded("Event", &event.name, || handler(event));
        }
    }

    /// Monotonic request ids, unique per client.
    pub(crate) fn next_request_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }
}
