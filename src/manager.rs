//! The signal manager.
//!
//! `SignalManager` holds exactly one active backend. Device drivers receive a
//! manager handle, register their signals through it and push state changes to
//! the signals they got back. Test harnesses swap the active backend with
//! [`SignalManager::set_active`], which closes the previous backend before the
//! new one becomes visible.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sigtrace::backend::PeekBackend;
//! use sigtrace::clock::ManualClock;
//! use sigtrace::signal::SignalType;
//! use sigtrace::{Scope, SignalManager, Value};
//!
//! let clock = ManualClock::new();
//! let manager = SignalManager::new();
//! manager.set_active(PeekBackend::new(Arc::new(clock.clone()))).unwrap();
//!
//! let scope = Scope::new("ttl0");
//! let state = manager.register(&scope, "state", SignalType::Bool, Some(1), None).unwrap();
//!
//! clock.advance(1_000);
//! manager.push(&state, true).unwrap();
//! assert_eq!(manager.peek(&scope, "state", None, 0).unwrap(), Value::Bool(true));
//! ```

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::backend::{shared, BackendKind, NullBackend, SharedBackend, SignalBackend};
use crate::error::SignalResult;
use crate::registry::RegisteredSignals;
use crate::signal::{Signal, SignalType};
use crate::timescale::Period;
use crate::types::{Offset, Scope, SimTime};
use crate::value::Value;

/// Handle to the active signal backend.
///
/// Clones share the same active slot.
#[derive(Clone, Debug)]
pub struct SignalManager {
    active: Arc<RwLock<SharedBackend>>,
}

impl SignalManager {
    /// Creates a manager with a null backend active.
    pub fn new() -> Self {
        Self::with_backend(NullBackend::default())
    }

    /// Creates a manager with `backend` active.
    pub fn with_backend(backend: impl SignalBackend + 'static) -> Self {
        Self {
            active: Arc::new(RwLock::new(shared(Box::new(backend)))),
        }
    }

    /// Returns the process-wide manager, created on first use with a null backend.
    pub fn global() -> &'static SignalManager {
        static GLOBAL: OnceLock<SignalManager> = OnceLock::new();
        GLOBAL.get_or_init(SignalManager::new)
    }

    /// Returns the active backend.
    pub fn active(&self) -> SharedBackend {
        Arc::clone(&self.active.read())
    }

    /// Returns the kind of the active backend.
    pub fn kind(&self) -> BackendKind {
        self.active.read().lock().kind()
    }

    /// Closes the active backend and installs `backend`.
    pub fn set_active(&self, backend: impl SignalBackend + 'static) -> SignalResult<()> {
        self.set_active_boxed(Box::new(backend))
    }

    /// Closes the active backend and installs `backend`.
    ///
    /// The swap holds the manager's write lock, so no caller can obtain the old
    /// backend while it is being closed. The new backend is installed even if
    /// closing the old one reports an error; that error is returned.
    pub fn set_active_boxed(&self, backend: Box<dyn SignalBackend>) -> SignalResult<()> {
        let mut slot = self.active.write();
        let (old_kind, closed) = {
            let mut old = slot.lock();
            (old.kind(), old.close())
        };
        debug!(old = %old_kind, new = %backend.kind(), "swapping signal backend");
        *slot = shared(backend);
        closed
    }

    /// Registers a signal with the active backend.
    pub fn register(
        &self,
        scope: &Scope,
        name: &str,
        ty: SignalType,
        size: Option<u32>,
        init: Option<Value>,
    ) -> SignalResult<Arc<Signal>> {
        self.active().lock().register(scope, name, ty, size, init)
    }

    /// Looks up a signal in the active backend.
    pub fn lookup(&self, scope: &Scope, name: &str) -> SignalResult<Arc<Signal>> {
        self.active().lock().lookup(scope, name)
    }

    /// Returns the number of signals registered with the active backend.
    pub fn len(&self) -> usize {
        self.active().lock().len()
    }

    /// Returns true if the active backend has no signals.
    pub fn is_empty(&self) -> bool {
        self.active().lock().is_empty()
    }

    /// Returns the signals of the active backend grouped by scope.
    pub fn registered_signals(&self) -> RegisteredSignals {
        self.active().lock().registered_signals()
    }

    /// Pushes a value at the current time of the active backend's clock.
    pub fn push(&self, signal: &Signal, value: impl Into<Value>) -> SignalResult<()> {
        self.push_at(signal, value, None, 0)
    }

    /// Pushes a value at `time + offset`.
    pub fn push_at(
        &self,
        signal: &Signal,
        value: impl Into<Value>,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<()> {
        self.active().lock().push(signal, value.into(), time, offset)
    }

    /// Pulls the value of a signal at `time + offset`.
    pub fn pull(
        &self,
        signal: &Signal,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<Value> {
        self.active().lock().pull(signal, time, offset)
    }

    /// Queues scripted values for a signal (peek backend only).
    pub fn push_buffer<I, V>(&self, signal: &Signal, values: I) -> SignalResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.active().lock().push_buffer(signal, values)
    }

    /// Looks up a signal by scope and name and pulls its value.
    pub fn peek(
        &self,
        scope: &Scope,
        name: &str,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<Value> {
        self.active().lock().peek(scope, name, time, offset)
    }

    /// Flushes the active backend.
    pub fn flush(&self, ref_period: Period) -> SignalResult<()> {
        self.active().lock().flush(ref_period)
    }

    /// Closes the active backend.
    pub fn close(&self) -> SignalResult<()> {
        self.active().lock().close()
    }
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new()
    }
}
