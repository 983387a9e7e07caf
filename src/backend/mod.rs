//! Signal backend trait and implementations.
//!
//! A `SignalBackend` owns a [`SignalRegistry`] and decides what happens to the
//! values pushed to its signals.
//!
//! # Implementations
//!
//! ## Null backend
//! - Normalizes pushed values (to surface invalid values) and drops them
//! - `pull` returns the init value of the signal
//!
//! ## VCD backend
//! - Buffers `(timestamp, signal, value)` events in one shared buffer
//! - `flush(ref_period)` sorts, rescales and writes the buffer to a VCD trace
//!
//! ## Peek backend
//! - Keeps a sorted timeline per signal (`BTreeMap<SimTime, Value>`)
//! - `pull` returns the latest value at or before the requested time
//! - `push_buffer` queues scripted values returned by successive `pull` calls
//!
//! # Closed backends
//!
//! After `close()`, `register`, `push`, `pull` and `push_buffer` fail with
//! `BackendClosed`. `flush` is a no-op and `close` can be called again.

pub mod null;
pub mod peek;
pub mod vcd;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};
use crate::registry::{RegisteredSignals, SignalRegistry};
use crate::signal::{Signal, SignalType};
use crate::timescale::Period;
use crate::types::{Offset, Scope, SimTime};
use crate::value::Value;

pub use null::NullBackend;
pub use peek::PeekBackend;
pub use vcd::VcdBackend;

/// The kind of a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Values are validated and dropped
    #[default]
    Null,
    /// Values are written to a VCD trace
    Vcd,
    /// Values are kept in queryable timelines
    Peek,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Null => "null",
            BackendKind::Vcd => "vcd",
            BackendKind::Peek => "peek",
        };
        f.write_str(name)
    }
}

/// A backend shared between the manager and its callers.
pub type SharedBackend = Arc<Mutex<Box<dyn SignalBackend>>>;

/// Wraps a backend into a [`SharedBackend`].
pub fn shared(backend: Box<dyn SignalBackend>) -> SharedBackend {
    Arc::new(Mutex::new(backend))
}

/// The contract shared by all signal backends.
pub trait SignalBackend: Send {
    /// Returns the kind of this backend.
    fn kind(&self) -> BackendKind;

    /// Returns the registry of this backend.
    fn registry(&self) -> &SignalRegistry;

    /// Registers a signal.
    ///
    /// Fails with `DuplicateSignal` if `(scope, name)` is taken, with
    /// `InvalidSignal` for an illegal definition and with `InvalidValue` if
    /// `init` is not legal for the signal. Nothing is registered on failure.
    fn register(
        &mut self,
        scope: &Scope,
        name: &str,
        ty: SignalType,
        size: Option<u32>,
        init: Option<Value>,
    ) -> SignalResult<Arc<Signal>>;

    /// Looks up a registered signal.
    fn lookup(&self, scope: &Scope, name: &str) -> SignalResult<Arc<Signal>> {
        self.registry().lookup(scope, name)
    }

    /// Returns the registered signals in registration order.
    fn signals(&self) -> Vec<Arc<Signal>> {
        self.registry().signals().cloned().collect()
    }

    /// Returns the number of registered signals.
    fn len(&self) -> usize {
        self.registry().len()
    }

    /// Returns true if no signals are registered.
    fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    /// Returns the registered signals grouped by scope.
    fn registered_signals(&self) -> RegisteredSignals {
        self.registry().summary()
    }

    /// Pushes a value to a signal at `time + offset` (`time` defaults to the clock).
    fn push(
        &mut self,
        signal: &Signal,
        value: Value,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<()>;

    /// Pulls the value of a signal at `time + offset` (`time` defaults to the clock).
    fn pull(
        &mut self,
        signal: &Signal,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<Value>;

    /// Queues scripted values returned by the next calls to `pull`.
    fn push_buffer(&mut self, _signal: &Signal, _values: Vec<Value>) -> SignalResult<()> {
        Err(SignalError::Unsupported {
            operation: "push_buffer",
            backend: self.kind(),
        })
    }

    /// Looks up a signal and pulls its value.
    fn peek(
        &mut self,
        scope: &Scope,
        name: &str,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<Value> {
        let signal = self.lookup(scope, name)?;
        self.pull(&signal, time, offset)
    }

    /// Flushes buffered output. `ref_period` is the duration of one machine unit.
    fn flush(&mut self, ref_period: Period) -> SignalResult<()>;

    /// Closes the backend. Must be reentrant.
    fn close(&mut self) -> SignalResult<()>;

    /// Returns true once the backend has been closed.
    fn is_closed(&self) -> bool;
}

impl fmt::Debug for dyn SignalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBackend")
            .field("kind", &self.kind())
            .field("signals", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Fails with `BackendClosed` if `closed` is set.
pub(crate) fn ensure_open(closed: bool, kind: BackendKind) -> SignalResult<()> {
    if closed {
        Err(SignalError::BackendClosed(kind))
    } else {
        Ok(())
    }
}
