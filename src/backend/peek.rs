//! Peek (query) backend.
//!
//! Every signal keeps a sorted timeline mapping timestamps to values. A value
//! holds from its timestamp until a later entry supersedes it; a push at an
//! existing timestamp overwrites the entry, like repeated writes to a
//! timestamped hardware register within the same tick.
//!
//! Each signal also has a FIFO push buffer for scripted playback: while the
//! buffer is non-empty, `pull` pops the front value, pushes it at the resolved
//! time and returns it.
//!
//! ```
//! use std::sync::Arc;
//! use sigtrace::backend::{PeekBackend, SignalBackend};
//! use sigtrace::clock::ManualClock;
//! use sigtrace::signal::SignalType;
//! use sigtrace::{Scope, Value};
//!
//! let clock = ManualClock::new();
//! let mut backend = PeekBackend::new(Arc::new(clock.clone()));
//! let state = backend
//!     .register(&Scope::new("ttl0"), "state", SignalType::Bool, Some(1), None)
//!     .unwrap();
//!
//! backend.push(&state, Value::from(true), Some(10), 0).unwrap();
//! assert_eq!(backend.pull(&state, Some(15), 0).unwrap(), Value::Bool(true));
//! assert!(backend.pull(&state, Some(5), 0).unwrap_err().is_not_set());
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use super::{ensure_open, BackendKind, SignalBackend};
use crate::clock::{resolve_timestamp, Clock, ManualClock};
use crate::error::{SignalError, SignalResult};
use crate::registry::SignalRegistry;
use crate::signal::{Signal, SignalType};
use crate::timescale::Period;
use crate::types::{Offset, Scope, SimTime};
use crate::value::Value;

/// Per-signal state of the peek backend.
#[derive(Debug, Default)]
struct Timeline {
    push_buffer: VecDeque<Value>,
    events: BTreeMap<SimTime, Value>,
}

impl Timeline {
    fn clear(&mut self) {
        self.push_buffer.clear();
        self.events.clear();
    }

    /// Latest value at or before `time`.
    fn at(&self, time: SimTime) -> Option<&Value> {
        self.events.range(..=time).next_back().map(|(_, v)| v)
    }
}

/// A backend with queryable signal timelines.
pub struct PeekBackend {
    registry: SignalRegistry,
    timelines: Vec<Timeline>,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl PeekBackend {
    /// Creates a peek backend that reads time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: SignalRegistry::new(),
            timelines: Vec::new(),
            clock,
            closed: false,
        }
    }

    /// Empties the push buffer and timeline of one signal.
    pub fn clear(&mut self, signal: &Signal) -> SignalResult<()> {
        let id = self.registry.index_of(signal)?;
        self.timelines[id].clear();
        Ok(())
    }

    /// Empties the push buffers and timelines of all signals.
    pub fn clear_all(&mut self) {
        for timeline in &mut self.timelines {
            timeline.clear();
        }
    }

    /// Returns the timeline of a signal as `(timestamp, value)` pairs in time order.
    pub fn history(&self, signal: &Signal) -> SignalResult<Vec<(SimTime, Value)>> {
        let id = self.registry.index_of(signal)?;
        Ok(self.timelines[id]
            .events
            .iter()
            .map(|(t, v)| (*t, v.clone()))
            .collect())
    }

    /// Returns the number of scripted values still queued for a signal.
    pub fn buffered(&self, signal: &Signal) -> SignalResult<usize> {
        let id = self.registry.index_of(signal)?;
        Ok(self.timelines[id].push_buffer.len())
    }
}

impl Default for PeekBackend {
    fn default() -> Self {
        Self::new(Arc::new(ManualClock::new()))
    }
}

impl SignalBackend for PeekBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Peek
    }

    fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    fn register(
        &mut self,
        scope: &Scope,
        name: &str,
        ty: SignalType,
        size: Option<u32>,
        init: Option<Value>,
    ) -> SignalResult<Arc<Signal>> {
        ensure_open(self.closed, self.kind())?;
        let signal = self.registry.prepare(scope, name, ty, size)?;
        let init = init.map(|v| signal.normalize(v)).transpose()?;

        let mut timeline = Timeline::default();
        if let Some(init) = init {
            timeline.events.insert(0, init);
        }

        let signal = self.registry.insert(signal);
        self.timelines.push(timeline);
        trace!(signal = %signal, "registered peek signal");
        Ok(signal)
    }

    fn push(
        &mut self,
        signal: &Signal,
        value: Value,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<()> {
        ensure_open(self.closed, self.kind())?;
        let id = self.registry.index_of(signal)?;
        let time = resolve_timestamp(self.clock.as_ref(), time, offset)?;
        let value = signal.normalize(value)?;
        trace!(signal = %signal, time, %value, "push");
        self.timelines[id].events.insert(time, value);
        Ok(())
    }

    fn pull(
        &mut self,
        signal: &Signal,
        time: Option<SimTime>,
        offset: Offset,
    ) -> SignalResult<Value> {
        ensure_open(self.closed, self.kind())?;
        let id = self.registry.index_of(signal)?;
        let time = resolve_timestamp(self.clock.as_ref(), time, offset)?;
        let timeline = &mut self.timelines[id];

        if let Some(value) = timeline.push_buffer.pop_front() {
            trace!(signal = %signal, time, %value, "scripted pull");
            timeline.events.insert(time, value.clone());
            return Ok(value);
        }

        timeline
            .at(time)
            .cloned()
            .ok_or_else(|| SignalError::SignalNotSet {
                signal: signal.to_string(),
                time,
                note: None,
            })
    }

    fn push_buffer(&mut self, signal: &Signal, values: Vec<Value>) -> SignalResult<()> {
        ensure_open(self.closed, self.kind())?;
        let id = self.registry.index_of(signal)?;
        let values = values
            .into_iter()
            .map(|v| signal.normalize(v))
            .collect::<SignalResult<Vec<_>>>()?;
        self.timelines[id].push_buffer.extend(values);
        Ok(())
    }

    fn flush(&mut self, _ref_period: Period) -> SignalResult<()> {
        Ok(())
    }

    fn close(&mut self) -> SignalResult<()> {
        if !self.closed {
            debug!(signals = self.registry.len(), "closing peek backend");
        }
        self.clear_all();
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
