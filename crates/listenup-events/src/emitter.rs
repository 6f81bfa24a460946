//! The emitter capability and the ways to give it to a host.
//!
//! A host becomes an emitter in one of two ways:
//!
//! - wrapping: [`emitter`] creates a standalone [`EventEmitter`], [`mixin`]
//!   wraps an existing value so it derefs to that value and gains the
//!   emitter methods;
//! - embedding: a type keeps a private [`Listeners`] field and implements
//!   [`Emitter::listeners`]; every other method comes with the trait.
//!
//! # Dispatch
//!
//! [`Emitter::emit`] copies the matching listeners before calling any of
//! them. Handlers may attach, detach or emit again while running:
//!
//! - listeners attached during a dispatch do not fire in that dispatch;
//! - listeners detached during a dispatch still fire in that dispatch,
//!   unless they are one-shot listeners that already fired;
//! - a one-shot listener is removed from the registry right before its
//!   handler runs and never runs twice. Only that listener is removed;
//!   persistent listeners sharing its handler stay attached.
//!
//! Keys fire in the order they were first created. A key keeps its place
//! when its last listener goes away through `off_handler`, `release_group`
//! or one-shot cleanup; only `off` forgets the key, and a later attach
//! appends it at the end.
//!
//! A handler returning `Err` stops the dispatch; the error is returned from
//! `emit` and later listeners are not called.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::Result;
use crate::key::EventKey;
use crate::listener::{Group, Handler, Listener, Subscription};
use crate::registry::{Listeners, RegistrySnapshot};

/// Publish/subscribe behavior for a host.
///
/// `A` is the type of the arguments passed along with an event. Every
/// mutating method returns the host so calls can be chained:
///
/// ```
/// use listenup_events::{emitter, Emitter, Handler};
///
/// let e = emitter();
/// e.on("ping", Handler::new(|_, event, _| {
///     assert_eq!(event, "ping");
///     Ok(())
/// }))
/// .emit("ping", &[])
/// .unwrap();
/// ```
pub trait Emitter<A = Value>: Sized {
    /// The host's registry.
    fn listeners(&self) -> &Listeners<Self, A>;

    /// Attaches a listener described by `subscription`.
    ///
    /// Fails with `InvalidArgument` if the subscription has no handler.
    fn attach(&self, subscription: Subscription<Self, A>) -> Result<&Self> {
        let listener = subscription.into_listener()?;
        Ok(register(self, listener))
    }

    /// Attaches a persistent listener.
    fn on(&self, key: impl Into<EventKey>, handler: Handler<Self, A>) -> &Self {
        register(self, Listener::new(key.into(), None, handler, false))
    }

    /// Attaches a persistent listener tagged with `group`.
    fn on_group(
        &self,
        key: impl Into<EventKey>,
        group: impl Into<Group>,
        handler: Handler<Self, A>,
    ) -> &Self {
        register(self, Listener::new(key.into(), Some(group.into()), handler, false))
    }

    /// Attaches a listener that is removed before its first invocation.
    fn once(&self, key: impl Into<EventKey>, handler: Handler<Self, A>) -> &Self {
        register(self, Listener::new(key.into(), None, handler, true))
    }

    /// Attaches a one-shot listener tagged with `group`.
    fn once_group(
        &self,
        key: impl Into<EventKey>,
        group: impl Into<Group>,
        handler: Handler<Self, A>,
    ) -> &Self {
        register(self, Listener::new(key.into(), Some(group.into()), handler, true))
    }

    /// Removes every listener registered under `key`.
    ///
    /// Pattern keys are compared by source text, not matched.
    fn off(&self, key: impl Into<EventKey>) -> &Self {
        let key = key.into();
        let removed = self.listeners().remove_key(&key);
        debug!(key = %key, removed, "detached listeners");
        self
    }

    /// Removes the listeners under `key` that use `handler`, one-shot
    /// listeners included.
    fn off_handler(&self, key: impl Into<EventKey>, handler: &Handler<Self, A>) -> &Self {
        let key = key.into();
        let removed = self.listeners().remove_handler(&key, handler);
        debug!(key = %key, removed, "detached handler");
        self
    }

    /// Removes every listener tagged with `group`, whatever its key.
    fn release_group(&self, group: impl Into<Group>) -> &Self {
        let group = group.into();
        let removed = self.listeners().remove_group(&group);
        debug!(group = %group, removed, "released group");
        self
    }

    /// Calls every listener whose key matches `event`.
    ///
    /// `event` is converted to its string form first; handlers receive the
    /// host, that string and `args`.
    ///
    /// One-shot listeners are detached right before their handler runs.
    /// Only the one-shot listener itself is detached: persistent listeners
    /// registered with the same handler under the same key are unaffected.
    fn emit(&self, event: impl fmt::Display, args: &[A]) -> Result<&Self> {
        let event = event.to_string();
        let matched = self.listeners().matching(&event);
        trace!(event = %event, matched = matched.len(), "dispatching event");

        for listener in matched {
            if listener.is_once() {
                if !listener.claim() {
                    continue;
                }
                self.listeners().remove_listener(listener.key(), listener.id());
            }
            if let Err(err) = listener.handler().call(self, &event, args) {
                debug!(
                    event = %event,
                    listener = listener.id(),
                    error = %err,
                    "handler failed, dispatch aborted"
                );
                return Err(err.into());
            }
        }

        Ok(self)
    }

    /// Copy of the registry, empty if nothing was ever attached.
    fn registered(&self) -> RegistrySnapshot<Self, A> {
        self.listeners().snapshot()
    }

    /// Number of attached listeners across all keys.
    fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    /// Returns true if emitting `event` would call at least one listener.
    fn has_listeners(&self, event: impl fmt::Display) -> bool {
        !self.listeners().matching(&event.to_string()).is_empty()
    }
}

fn register<E, A>(host: &E, listener: Listener<E, A>) -> &E
where
    E: Emitter<A>,
{
    debug!(
        key = %listener.key(),
        group = ?listener.group(),
        once = listener.is_once(),
        "attaching listener"
    );
    host.listeners().push(listener);
    host
}

/// Returns a copy of `host`'s registry without creating it.
pub fn get_listeners<E, A>(host: &E) -> RegistrySnapshot<E, A>
where
    E: Emitter<A>,
{
    host.registered()
}

/// Creates a standalone emitter.
pub fn emitter() -> EventEmitter {
    EventEmitter::new()
}

/// Turns `host` into an emitter. The result derefs to `host`.
pub fn mixin<T>(host: T) -> EventEmitter<T> {
    EventEmitter::wrap(host)
}

/// A host value together with its listener registry.
pub struct EventEmitter<T = (), A = Value> {
    host: T,
    listeners: Listeners<EventEmitter<T, A>, A>,
}

impl EventEmitter {
    /// Creates a standalone emitter with no host value.
    pub fn new() -> Self {
        Self::from(())
    }
}

impl<T> EventEmitter<T> {
    /// Wraps `host`.
    pub fn wrap(host: T) -> Self {
        Self::from(host)
    }
}

impl<T, A> EventEmitter<T, A> {
    /// The wrapped value.
    pub fn host(&self) -> &T {
        &self.host
    }

    /// Mutable access to the wrapped value.
    pub fn host_mut(&mut self) -> &mut T {
        &mut self.host
    }

    /// Drops the registry and returns the wrapped value.
    pub fn into_inner(self) -> T {
        self.host
    }
}

impl<T, A> From<T> for EventEmitter<T, A> {
    fn from(host: T) -> Self {
        Self {
            host,
            listeners: Listeners::new(),
        }
    }
}

impl<T, A> Emitter<A> for EventEmitter<T, A> {
    fn listeners(&self) -> &Listeners<Self, A> {
        &self.listeners
    }
}

impl<T, A> Deref for EventEmitter<T, A> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.host
    }
}

impl<T, A> DerefMut for EventEmitter<T, A> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.host
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

// The registry stays out of the host's debug output.
impl<T: fmt::Debug, A> fmt::Debug for EventEmitter<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmitterError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Counter {
        called: AtomicUsize,
    }

    type Host = EventEmitter<Counter>;

    fn host() -> Host {
        mixin(Counter::default())
    }

    fn count(by: usize) -> Handler<Host, Value> {
        Handler::new(move |host: &Host, _, _| {
            host.called.fetch_add(by, Ordering::SeqCst);
            Ok(())
        })
    }

    fn called(host: &Host) -> usize {
        host.called.load(Ordering::SeqCst)
    }

    #[test]
    fn test_methods_chain() {
        let e = host();
        assert!(std::ptr::eq(&e, e.on("test", count(1))));
        assert!(std::ptr::eq(&e, e.once("test", count(1))));
        assert!(std::ptr::eq(&e, e.off("test")));
        assert!(std::ptr::eq(&e, e.release_group("group")));
        assert!(std::ptr::eq(&e, e.emit("test", &[]).unwrap()));
        assert!(std::ptr::eq(
            &e,
            e.attach(Subscription::new("test").handler(count(1))).unwrap()
        ));
    }

    #[test]
    fn test_on_fires_every_emit() {
        let e = host();
        e.on("ping", count(1)).emit("ping", &[]).unwrap().emit("ping", &[]).unwrap();
        assert_eq!(called(&e), 2);
    }

    #[test]
    fn test_once_fires_once() {
        let e = host();
        e.once("ping", count(1)).emit("ping", &[]).unwrap().emit("ping", &[]).unwrap();
        assert_eq!(called(&e), 1);
        assert_eq!(e.listener_count(), 0);
    }

    #[test]
    fn test_pattern_fires_on_match_only() {
        let e = host();
        e.on(EventKey::pattern("^a:").unwrap(), count(1));
        e.emit("a:x", &[]).unwrap().emit("b:x", &[]).unwrap();
        assert_eq!(called(&e), 1);
    }

    #[test]
    fn test_release_group() {
        let e = host();
        e.on_group("x", "g1", count(1))
            .on_group("x", "g2", count(1))
            .release_group("g1")
            .emit("x", &[])
            .unwrap();
        assert_eq!(called(&e), 1);
    }

    #[test]
    fn test_handler_receives_event_and_args() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let e = emitter();
        e.on(
            EventKey::pattern("^user:").unwrap(),
            Handler::new(move |_, event, args| {
                sink.lock().unwrap().push((event.to_string(), args.to_vec()));
                Ok(())
            }),
        );
        e.emit("user:login", &[json!("alice"), json!({"admin": true})]).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "user:login");
        assert_eq!(seen[0].1, vec![json!("alice"), json!({"admin": true})]);
    }

    #[test]
    fn test_numeric_event_is_stringified() {
        let e = host();
        e.on(404, count(1)).emit(404, &[]).unwrap().emit("404", &[]).unwrap();
        assert_eq!(called(&e), 2);
    }

    #[test]
    fn test_multiple_keys_fire_in_creation_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let e = emitter();
        for (key, label) in [
            (EventKey::pattern("^a").unwrap(), "pattern"),
            (EventKey::from("a:b"), "exact"),
            (EventKey::pattern("b$").unwrap(), "suffix"),
        ] {
            let order = Arc::clone(&order);
            e.on(
                key,
                Handler::new(move |_, _, _| {
                    order.lock().unwrap().push(label);
                    Ok(())
                }),
            );
        }
        e.emit("a:b", &[]).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["pattern", "exact", "suffix"]);
    }

    #[test]
    fn test_attach_without_handler_fails() {
        let e = host();
        let result = e.attach(Subscription::new("test").group("group"));
        assert!(matches!(result, Err(EmitterError::InvalidArgument(_))));
        assert!(!e.listeners().is_created());
    }

    #[test]
    fn test_failing_handler_aborts_dispatch() {
        let e = host();
        e.on("x", count(1))
            .on("x", Handler::new(|_, _, _| Err("boom".into())))
            .on("x", count(10));

        let err = e.emit("x", &[]).unwrap_err();
        assert!(matches!(err, EmitterError::Handler(_)));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(called(&e), 1);
    }

    #[test]
    fn test_once_removed_before_handler_runs() {
        let e = host();
        e.once(
            "x",
            Handler::new(|host: &Host, _, _| {
                assert_eq!(host.listener_count(), 0);
                host.called.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        e.emit("x", &[]).unwrap();
        assert_eq!(called(&e), 1);
    }

    #[test]
    fn test_reentrant_emit_runs_once_listener_once() {
        let e = host();
        e.on(
            "outer",
            Handler::new(|host: &Host, _, _| {
                host.emit("outer-once", &[])?;
                Ok(())
            }),
        )
        .once(EventKey::pattern("^outer").unwrap(), count(1));

        e.emit("outer", &[]).unwrap();
        assert_eq!(called(&e), 1);
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next_emit() {
        let e = host();
        e.once(
            "x",
            Handler::new(|host: &Host, _, _| {
                host.on("x", count(1));
                Ok(())
            }),
        );
        e.emit("x", &[]).unwrap();
        assert_eq!(called(&e), 0);
        e.emit("x", &[]).unwrap();
        assert_eq!(called(&e), 1);
    }

    fn record(order: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Handler<EventEmitter, Value> {
        let order = Arc::clone(order);
        Handler::new(move |_, _, _| {
            order.lock().unwrap().push(label);
            Ok(())
        })
    }

    #[test]
    fn test_released_key_keeps_dispatch_position() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let x = EventKey::pattern("x").unwrap();
        let e = emitter();
        e.on_group(x.clone(), "g", record(&order, "pattern-old"))
            .on("x", record(&order, "exact"))
            .release_group("g")
            .on(x, record(&order, "pattern-new"))
            .emit("x", &[])
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["pattern-new", "exact"]);
    }

    #[test]
    fn test_fired_once_key_keeps_dispatch_position() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let x = EventKey::pattern("x").unwrap();
        let e = emitter();
        e.once(x.clone(), record(&order, "pattern-once"))
            .on("x", record(&order, "exact"))
            .emit("x", &[])
            .unwrap();
        order.lock().unwrap().clear();

        e.on(x, record(&order, "pattern-later")).emit("x", &[]).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["pattern-later", "exact"]);
    }

    #[test]
    fn test_off_key_moves_key_to_the_end() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let x = EventKey::pattern("x").unwrap();
        let e = emitter();
        e.on(x.clone(), record(&order, "pattern-old"))
            .on("x", record(&order, "exact"))
            .off(x.clone())
            .on(x, record(&order, "pattern-new"))
            .emit("x", &[])
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["exact", "pattern-new"]);
    }

    #[test]
    fn test_once_leaves_persistent_listener_with_same_handler() {
        let e = host();
        let handler = count(1);
        e.once("x", handler.clone())
            .on("x", handler)
            .emit("x", &[])
            .unwrap()
            .emit("x", &[])
            .unwrap();
        assert_eq!(called(&e), 3);
        assert_eq!(e.listener_count(), 1);
    }

    #[test]
    fn test_listener_removed_during_dispatch_still_fires() {
        let e = host();
        e.on(
            "x",
            Handler::new(|host: &Host, _, _| {
                host.off("x");
                Ok(())
            }),
        )
        .on("x", count(1));

        e.emit("x", &[]).unwrap().emit("x", &[]).unwrap();
        assert_eq!(called(&e), 1);
    }

    #[test]
    fn test_get_listeners_does_not_create_registry() {
        let e = host();
        assert!(get_listeners(&e).is_empty());
        assert!(!e.listeners().is_created());

        e.on("a", count(1)).once_group("b", 3, count(1));
        let snapshot = get_listeners(&e);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[1].1[0].is_once());
        assert_eq!(snapshot[1].1[0].group(), Some(&Group::Id(3)));
    }

    #[test]
    fn test_has_listeners() {
        let e = host();
        assert!(!e.has_listeners("a:x"));
        e.on(EventKey::pattern("^a:").unwrap(), count(1));
        assert!(e.has_listeners("a:x"));
        assert!(!e.has_listeners("b:x"));
    }

    #[test]
    fn test_wrapped_host_is_reachable() {
        let mut e = mixin(vec![1, 2]);
        e.push(3);
        assert_eq!(e.host().len(), 3);
        assert_eq!(e.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_custom_payload() {
        let total = Arc::new(AtomicUsize::new(0));
        let sum = Arc::clone(&total);
        let e: EventEmitter<(), usize> = EventEmitter::from(());
        e.on(
            "add",
            Handler::new(move |_, _, args: &[usize]| {
                sum.fetch_add(args.iter().sum(), Ordering::SeqCst);
                Ok(())
            }),
        );
        e.emit("add", &[1, 2, 3]).unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_debug_hides_registry() {
        let e = host();
        e.on("a", count(1));
        let debug = format!("{:?}", e);
        assert!(debug.contains("called"));
        assert!(!debug.contains("listeners"));
    }
}
