//! Emitter configuration.
//!
//! The only setting is the registry property: the name under which a host's
//! listener registry is stashed. It is process-wide, read once by each
//! registry when that registry is lazily created, and only visible through
//! the registry's `Debug` output and trace logs.

use std::sync::{PoisonError, RwLock};

/// Registry property used when none has been installed.
pub const DEFAULT_REGISTRY_PROPERTY: &str = "__eventListenerData__";

static REGISTRY_PROPERTY: RwLock<Option<String>> = RwLock::new(None);

/// Configuration for emitters created in this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Name under which registries are stored on their hosts.
    pub registry_property: String,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            registry_property: DEFAULT_REGISTRY_PROPERTY.to_string(),
        }
    }
}

impl EmitterConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the registry property.
    pub fn with_registry_property(mut self, name: impl Into<String>) -> Self {
        self.registry_property = name.into();
        self
    }

    /// Returns the configuration currently in effect.
    pub fn current() -> Self {
        Self {
            registry_property: registry_property(),
        }
    }

    /// Makes this configuration the process-wide one.
    ///
    /// Registries that already exist keep the property they were created
    /// with.
    pub fn install(self) {
        set_registry_property(self.registry_property);
    }
}

/// Returns the registry property currently in effect.
pub fn registry_property() -> String {
    REGISTRY_PROPERTY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_else(|| DEFAULT_REGISTRY_PROPERTY.to_string())
}

/// Sets the registry property used by registries created from now on.
pub fn set_registry_property(name: impl Into<String>) {
    let name = name.into();
    tracing::debug!(property = %name, "registry property changed");
    *REGISTRY_PROPERTY
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(name);
}

/// Restores the default registry property.
pub fn reset_registry_property() {
    *REGISTRY_PROPERTY
        .write()
        .unwrap_or_else(PoisonError::into_inner) = None;
}
