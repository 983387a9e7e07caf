//! Signal registry.
//!
//! The registry is the single place where signals are created and looked up.
//! A `(scope, name)` pair can be registered at most once; a second attempt
//! fails with `DuplicateSignal` and leaves the first signal untouched.
//!
//! Registration happens in two steps so that a backend can validate everything
//! (the init value, its own per-signal state) before the signal becomes visible:
//!
//! ```
//! use sigtrace::registry::SignalRegistry;
//! use sigtrace::signal::SignalType;
//! use sigtrace::Scope;
//!
//! let mut registry = SignalRegistry::new();
//! let scope = Scope::new("ttl0");
//!
//! let signal = registry.prepare(&scope, "state", SignalType::Bool, Some(1)).unwrap();
//! let signal = registry.insert(signal);
//!
//! assert_eq!(registry.lookup(&scope, "state").unwrap(), signal);
//! assert!(registry.prepare(&scope, "state", SignalType::Bool, Some(1)).is_err());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};
use crate::signal::{Signal, SignalType};
use crate::types::{RegistryId, Scope, SignalId};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Description of a registered signal, as reported by [`SignalRegistry::summary`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSummary {
    /// Name of the signal
    pub name: String,
    /// Type of the signal
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Size of the signal (only for bool signals)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

/// Registered signals grouped by scope.
pub type RegisteredSignals = BTreeMap<Scope, Vec<SignalSummary>>;

/// A registry of signals keyed by `(scope, name)`.
#[derive(Debug)]
pub struct SignalRegistry {
    id: RegistryId,
    signals: Vec<Arc<Signal>>,
    index: HashMap<(Scope, String), SignalId>,
}

impl SignalRegistry {
    /// Creates a new empty registry with a process-unique identifier.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            signals: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the identifier of this registry.
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Validates a new signal without registering it.
    ///
    /// Fails with `DuplicateSignal` if the pair is taken and with `InvalidSignal`
    /// if the definition is illegal. The returned signal carries the id it will
    /// get once passed to [`insert`](Self::insert).
    pub fn prepare(
        &self,
        scope: &Scope,
        name: &str,
        ty: SignalType,
        size: Option<u32>,
    ) -> SignalResult<Signal> {
        if self.contains(scope, name) {
            return Err(SignalError::DuplicateSignal {
                scope: scope.clone(),
                name: name.to_string(),
            });
        }
        let signal = Signal::new(scope.clone(), name, ty, size)?;
        Ok(signal.with_owner(self.id, self.signals.len()))
    }

    /// Registers a prepared signal.
    ///
    /// The signal must come from [`prepare`](Self::prepare) on this registry with
    /// no other insertion in between.
    pub fn insert(&mut self, signal: Signal) -> Arc<Signal> {
        debug_assert_eq!(signal.registry(), self.id);
        debug_assert_eq!(signal.id(), self.signals.len());

        let signal = Arc::new(signal.with_owner(self.id, self.signals.len()));
        self.index.insert(
            (signal.scope().clone(), signal.name().to_string()),
            signal.id(),
        );
        self.signals.push(Arc::clone(&signal));
        signal
    }

    /// Looks up a registered signal.
    pub fn lookup(&self, scope: &Scope, name: &str) -> SignalResult<Arc<Signal>> {
        self.index
            .get(&(scope.clone(), name.to_string()))
            .map(|&id| Arc::clone(&self.signals[id]))
            .ok_or_else(|| SignalError::SignalNotFound {
                scope: scope.clone(),
                name: name.to_string(),
            })
    }

    /// Resolves a signal handle to its index, checking that this registry owns it.
    pub fn index_of(&self, signal: &Signal) -> SignalResult<SignalId> {
        let owned = signal.registry() == self.id
            && self
                .signals
                .get(signal.id())
                .is_some_and(|s| s.scope() == signal.scope() && s.name() == signal.name());
        if owned {
            Ok(signal.id())
        } else {
            Err(SignalError::SignalNotFound {
                scope: signal.scope().clone(),
                name: signal.name().to_string(),
            })
        }
    }

    /// Returns true if `(scope, name)` is registered.
    pub fn contains(&self, scope: &Scope, name: &str) -> bool {
        self.index.contains_key(&(scope.clone(), name.to_string()))
    }

    /// Returns the number of registered signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns true if no signals are registered.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Returns an iterator over registered signals in registration order.
    pub fn signals(&self) -> impl Iterator<Item = &Arc<Signal>> {
        self.signals.iter()
    }

    /// Returns the registered signals grouped by scope.
    pub fn summary(&self) -> RegisteredSignals {
        let mut summary = RegisteredSignals::new();
        for signal in &self.signals {
            summary
                .entry(signal.scope().clone())
                .or_default()
                .push(SignalSummary {
                    name: signal.name().to_string(),
                    signal_type: signal.signal_type(),
                    size: signal.size(),
                });
        }
        summary
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
