use crate::gateway::registry::{HandlerRegistry, Subscription, invoke_guarded};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Recorder = Arc<dyn Fn(&mut Vec<&'static str>) + Send + Sync>;

fn recorder(label: &'static str) -> Recorder {
    Arc::new(move |log: &mut Vec<&'static str>| log.push(label))
}

fn run(registry: &HandlerRegistry<Recorder>, name: &str) -> Vec<&'static str> {
    let mut log = Vec::new();
    for handler in registry.matching(name) {
        handler(&mut log);
    }
    log
}

/// **VALUE**: Handlers for a name run in registration order, then wildcard
/// handlers.
///
/// **WHY THIS MATTERS**: Tests and consumers rely on deterministic fan-out.
///
/// **BUG THIS CATCHES**: HashMap-based storage that reorders handlers, or a
/// wildcard handler that never fires.
#[test]
fn given_named_and_wildcard_handlers_when_matching_then_insertion_order_named_first() {
    // GIVEN
    let mut registry = HandlerRegistry::new();
    registry.add("*", recorder("wild"));
    registry.add("tick", recorder("first"));
    registry.add("presence", recorder("other"));
    registry.add("tick", recorder("second"));

    // WHEN
    let log = run(&registry, "tick");

    // THEN
    assert_eq!(log, vec!["first", "second", "wild"]);
}

#[test]
fn given_only_wildcard_when_matching_unknown_name_then_wildcard_runs() {
    let mut registry = HandlerRegistry::new();
    registry.add("*", recorder("wild"));

    assert_eq!(run(&registry, "never-subscribed"), vec!["wild"]);
}

/// **VALUE**: Removing one registration leaves the others for the same name.
///
/// **BUG THIS CATCHES**: Unsubscribe implemented as "remove all handlers for
/// this name", which silently breaks every other consumer.
#[test]
fn given_two_handlers_same_name_when_one_removed_then_other_still_runs() {
    // GIVEN
    let mut registry = HandlerRegistry::new();
    let first = registry.add("agent", recorder("first"));
    registry.add("agent", recorder("second"));

    // WHEN
    let removed = registry.remove(first);

    // THEN
    assert!(removed);
    assert_eq!(run(&registry, "agent"), vec!["second"]);
    assert_eq!(registry.len(), 1);
    assert!(!registry.remove(first), "Second removal is a no-op");
}

#[test]
fn given_subscription_when_unsubscribed_then_remove_closure_runs_once() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let subscription = Subscription::new(move || flag.store(true, Ordering::SeqCst));

    subscription.unsubscribe();

    assert!(called.load(Ordering::SeqCst));
}

/// **VALUE**: A panicking handler does not stop the handlers after it.
///
/// **BUG THIS CATCHES**: One buggy consumer taking down event delivery for
/// everybody, or unwinding through the connection task.
#[test]
fn given_panicking_handler_when_invoked_guarded_then_next_handler_still_runs() {
    // GIVEN
    let log = Arc::new(Mutex::new(Vec::new()));

    // WHEN
    invoke_guarded("Event", "tick", || panic!("handler bug"));
    let sink = Arc::clone(&log);
    invoke_guarded("Event", "tick", move || {
        sink.lock().expect("lock").push("after");
    });

    // THEN
    assert_eq!(*log.lock().expect("lock"), vec!["after"]);
}
