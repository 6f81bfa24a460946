//! Event emitter mixin for listen-up.
//!
//! This crate gives any value publish/subscribe behavior:
//! - exact and regex keys (`EventKey`)
//! - persistent and one-shot listeners, optionally tagged with a `Group`
//! - removal by key, by handler, or by group
//! - synchronous dispatch to every matching listener
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use listenup_events::{mixin, Emitter, EventEmitter, EventKey, Handler};
//!
//! #[derive(Default)]
//! struct Player {
//!     hits: AtomicUsize,
//! }
//!
//! let player = mixin(Player::default());
//! let hit = Handler::new(|p: &EventEmitter<Player>, _, _| {
//!     p.hits.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! player
//!     .on_group(EventKey::pattern("^hit:").unwrap(), "combat", hit)
//!     .emit("hit:head", &[])
//!     .unwrap()
//!     .release_group("combat")
//!     .emit("hit:arm", &[])
//!     .unwrap();
//!
//! assert_eq!(player.hits.load(Ordering::SeqCst), 1);
//! ```
//!
//! # Embedding
//!
//! A type can carry the registry itself instead of being wrapped:
//!
//! ```
//! use listenup_events::{Emitter, Listeners};
//!
//! #[derive(Default)]
//! struct Door {
//!     listeners: Listeners<Door>,
//! }
//!
//! impl Emitter for Door {
//!     fn listeners(&self) -> &Listeners<Self> {
//!         &self.listeners
//!     }
//! }
//!
//! Door::default().emit("open", &[]).unwrap();
//! ```

pub mod config;
pub mod emitter;
pub mod error;
pub mod key;
pub mod listener;
pub mod registry;

pub use config::{registry_property, set_registry_property, EmitterConfig};
pub use emitter::{emitter, get_listeners, mixin, Emitter, EventEmitter};
pub use error::{BoxError, EmitterError, Result};
pub use key::EventKey;
pub use listener::{Group, Handler, HandlerResult, Listener, ListenerId, Subscription};
pub use registry::{Listeners, RegistrySnapshot};
