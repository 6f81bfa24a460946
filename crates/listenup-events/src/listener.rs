//! Listener records and the pieces they are built from.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{BoxError, EmitterError, Result};
use crate::key::EventKey;

/// What a handler returns. An `Err` stops the current dispatch.
pub type HandlerResult = std::result::Result<(), BoxError>;

type HandlerFn<H, A> = dyn Fn(&H, &str, &[A]) -> HandlerResult + Send + Sync;

/// Shared callable invoked on dispatch with the host, the event name and
/// the dispatch arguments.
///
/// Handlers compare by identity: clones of one `Handler` are equal, two
/// handlers built from separate closures never are. Keep a clone around to
/// detach a specific handler later.
pub struct Handler<H, A> {
    inner: Arc<HandlerFn<H, A>>,
}

impl<H, A> Handler<H, A> {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&H, &str, &[A]) -> HandlerResult + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub(crate) fn call(&self, host: &H, event: &str, args: &[A]) -> HandlerResult {
        (self.inner)(host, event, args)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }
}

impl<H, A> Clone for Handler<H, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H, A> PartialEq for Handler<H, A> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<H, A> Eq for Handler<H, A> {}

impl<H, A> fmt::Debug for Handler<H, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", self.addr())
    }
}

/// Tag used to release unrelated listeners together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Group {
    /// Named group.
    Name(String),
    /// Numeric group.
    Id(i128),
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for Group {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Group {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

macro_rules! group_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Group {
                fn from(id: $ty) -> Self {
                    Self::Id(id as i128)
                }
            }
        )*
    };
}

// Same numeric types `EventKey` accepts; all fit in an `i128` losslessly.
group_from_number!(i32, i64, u32, u64, usize);

/// Unique listener number.
pub type ListenerId = u64;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// A registered listener.
pub struct Listener<H, A> {
    id: ListenerId,
    key: EventKey,
    group: Option<Group>,
    handler: Handler<H, A>,
    once: bool,
    /// Shared between clones so a one-shot listener fires at most once even
    /// when several dispatch snapshots hold it.
    fired: Arc<AtomicBool>,
}

impl<H, A> Listener<H, A> {
    pub(crate) fn new(key: EventKey, group: Option<Group>, handler: Handler<H, A>, once: bool) -> Self {
        Self {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            key,
            group,
            handler,
            once,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Process-unique id of this listener.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Key the listener was registered under.
    pub fn key(&self) -> &EventKey {
        &self.key
    }

    /// Group tag, if any.
    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    /// The handler as it was passed to attach.
    pub fn handler(&self) -> &Handler<H, A> {
        &self.handler
    }

    /// True for listeners attached with `once`.
    pub fn is_once(&self) -> bool {
        self.once
    }

    pub(crate) fn in_group(&self, group: &Group) -> bool {
        self.group.as_ref() == Some(group)
    }

    /// Marks a one-shot listener as fired. Returns false if it already was.
    pub(crate) fn claim(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }
}

impl<H, A> Clone for Listener<H, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            key: self.key.clone(),
            group: self.group.clone(),
            handler: self.handler.clone(),
            once: self.once,
            fired: Arc::clone(&self.fired),
        }
    }
}

impl<H, A> fmt::Debug for Listener<H, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("group", &self.group)
            .field("handler", &self.handler)
            .field("once", &self.once)
            .finish()
    }
}

/// Everything needed to attach a listener.
///
/// The handler is optional while building so that a missing handler is
/// reported by `Emitter::attach` as an `InvalidArgument` error.
pub struct Subscription<H, A> {
    key: EventKey,
    group: Option<Group>,
    handler: Option<Handler<H, A>>,
    once: bool,
}

impl<H, A> Subscription<H, A> {
    /// Starts a subscription for `key`.
    pub fn new(key: impl Into<EventKey>) -> Self {
        Self {
            key: key.into(),
            group: None,
            handler: None,
            once: false,
        }
    }

    /// Sets the group tag.
    pub fn group(mut self, group: impl Into<Group>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the handler.
    pub fn handler(mut self, handler: Handler<H, A>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Makes the listener one-shot.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub(crate) fn into_listener(self) -> Result<Listener<H, A>> {
        let handler = self.handler.ok_or_else(|| {
            EmitterError::InvalidArgument(format!(
                "a handler is required when adding a listener for '{}'",
                self.key
            ))
        })?;
        Ok(Listener::new(self.key, self.group, handler, self.once))
    }
}

impl<H, A> fmt::Debug for Subscription<H, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("group", &self.group)
            .field("handler", &self.handler)
            .field("once", &self.once)
            .finish()
    }
}
