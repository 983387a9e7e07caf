//! Null (discard) backend.
//!
//! Pushed values are normalized so that invalid values still fail, then
//! dropped. Memory use is independent of the number of pushes.

use std::sync::Arc;

use tracing::trace;

use super::{ensure_open, BackendKind, SignalBackend};
use crate::clock::{resolve_timestamp, Clock, ManualClock};
use crate::error::{SignalError, SignalResult};
use crate::registry::SignalRegistry;
use crate::signal::{Signal, SignalType};
use crate::timescale::Period;
use crate::types::{Offset, Scope, SimTime};
use crate::value::Value;

/// A backend whose signals are constant at their init value.
pub struct NullBackend {
    registry: SignalRegistry,
    inits: Vec<Option<Value>>,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl NullBackend {
    /// Creates a null backend that reads time from `clock`.
    ///
    /// The clock is only consulted to report the time of a failed `pull`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: SignalRegistry::new(),
            inits: Vec::new(),
            clock,
            closed: false,
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new(Arc::new(ManualClock::new()))
    }
}

impl SignalBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
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

        let signal = self.registry.insert(signal);
        self.inits.push(init);
        trace!(signal = %signal, "registered null signal");
        Ok(signal)
    }

    fn push(
        &mut self,
        signal: &Signal,
        value: Value,
        _time: Option<SimTime>,
        _offset: Offset,
    ) -> SignalResult<()> {
        ensure_open(self.closed, self.kind())?;
        self.registry.index_of(signal)?;
        signal.normalize(value)?;
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
        match &self.inits[id] {
            Some(init) => Ok(init.clone()),
            None => Err(SignalError::SignalNotSet {
                signal: signal.to_string(),
                time: resolve_timestamp(self.clock.as_ref(), time, offset)?,
                note: Some("signal not initialized".to_string()),
            }),
        }
    }

    fn flush(&mut self, _ref_period: Period) -> SignalResult<()> {
        Ok(())
    }

    fn close(&mut self) -> SignalResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("ttl0")
    }

    #[test]
    fn test_pull_returns_init() {
        let mut backend = NullBackend::default();
        let s = backend
            .register(&scope(), "state", SignalType::Bool, Some(1), Some(Value::from(0)))
            .unwrap();

        for i in 0..100 {
            backend.push(&s, Value::from(i % 2 == 0), Some(i), 0).unwrap();
        }
        assert_eq!(backend.pull(&s, None, 0).unwrap(), Value::Bool(false));
        assert_eq!(backend.pull(&s, Some(1_000), 0).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_pull_without_init() {
        let clock = ManualClock::starting_at(25);
        let mut backend = NullBackend::new(Arc::new(clock));
        let s = backend
            .register(&scope(), "count", SignalType::Int, None, None)
            .unwrap();
        backend.push(&s, Value::from(3), None, 0).unwrap();

        let err = backend.pull(&s, None, 5).unwrap_err();
        assert!(err.is_not_set());
        assert_eq!(
            err.to_string(),
            "Signal \"ttl0.count\" not set at time 30: signal not initialized"
        );
    }

    #[test]
    fn test_push_validates() {
        let mut backend = NullBackend::default();
        let s = backend
            .register(&scope(), "freq", SignalType::Float, None, None)
            .unwrap();
        assert!(matches!(
            backend.push(&s, Value::from("x"), None, 0),
            Err(SignalError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_invalid_init_not_registered() {
        let mut backend = NullBackend::default();
        let err = backend
            .register(&scope(), "freq", SignalType::Float, None, Some(Value::from(1)))
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidValue { .. }));
        assert!(backend.is_empty());
        assert!(backend.lookup(&scope(), "freq").unwrap_err().is_not_found());
    }

    #[test]
    fn test_close_twice() {
        let mut backend = NullBackend::default();
        let s = backend
            .register(&scope(), "state", SignalType::Bool, Some(1), None)
            .unwrap();
        backend.close().unwrap();
        backend.close().unwrap();
        assert!(backend.is_closed());
        assert!(matches!(
            backend.push(&s, Value::from(true), None, 0),
            Err(SignalError::BackendClosed(BackendKind::Null))
        ));
        backend.flush(Period::from_nanos(1)).unwrap();
    }
}
