//! Core type definitions for the signal store.
//!
//! This module defines the fundamental types shared by signals, backends and
//! the timestamp resolution logic.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Simulation time in machine units (ticks).
///
/// Timestamps are signed: the ambient clock of the calling environment can move
/// backwards inside nested parallel scopes, and offsets may be negative.
pub type SimTime = i64;

/// Offset in machine units added to a resolved timestamp.
pub type Offset = i64;

/// Dense index of a signal inside the registry that created it.
pub type SignalId = usize;

/// Identifier of a registry instance, used to reject signals from a foreign backend.
pub type RegistryId = u64;

/// The owning device/object identity a signal is registered under.
///
/// A scope is usually the device key from the device database (e.g. `"ttl0"`).
/// Cloning is cheap; the key is shared.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(Arc<str>);

impl Scope {
    /// Creates a new scope from a device key.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Returns the scope key.
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Scope {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl AsRef<str> for Scope {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
