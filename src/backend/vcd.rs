//! VCD (persistent-log) backend.
//!
//! All signals of one backend share a single append-only event buffer. Pushes
//! may arrive in any time order; `flush` linearizes the buffer with a stable
//! sort (ties keep insertion order) before handing it to the VCD writer.
//!
//! # Type mapping
//!
//! | Signal type | VCD type  | Width | Initial value when no init is given |
//! |-------------|-----------|-------|-------------------------------------|
//! | `Bool`      | `reg`     | size  | `x` |
//! | `Int`       | `integer` | 64    | `x` |
//! | `Float`     | `real`    | 64    | `0` |
//! | `Str`       | `string`  | 1     | empty string |
//! | `Event`     | `event`   | 1     | none |

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{ensure_open, BackendKind, SignalBackend};
use crate::clock::{resolve_timestamp, Clock};
use crate::error::{SignalError, SignalResult};
use crate::registry::SignalRegistry;
use crate::signal::{Signal, SignalType};
use crate::timescale::{Period, Timescale};
use crate::types::{Offset, Scope, SignalId, SimTime};
use crate::value::Value;
use crate::vcd::{VarId, VarType, VcdError, VcdHeader, VcdWriter};

/// A buffered event: `(timestamp, signal index, normalized value)`.
type BufferedEvent = (SimTime, SignalId, Value);

/// A backend that writes signal changes to a VCD trace.
pub struct VcdBackend<W: Write + Send = BufWriter<File>> {
    registry: SignalRegistry,
    writer: VcdWriter<W>,
    vars: Vec<VarId>,
    inits: Vec<Option<Value>>,
    events: Vec<BufferedEvent>,
    timescale: Timescale,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl VcdBackend<BufWriter<File>> {
    /// Creates (truncates) the trace file at `path`.
    pub fn create(
        path: impl AsRef<Path>,
        timescale: Timescale,
        clock: Arc<dyn Clock>,
    ) -> SignalResult<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        debug!(path = %path.display(), %timescale, "opened VCD trace");
        Ok(Self::from_writer(
            BufWriter::new(file),
            &path.display().to_string(),
            timescale,
            clock,
        ))
    }
}

impl<W: Write + Send> VcdBackend<W> {
    /// Creates a backend writing to an arbitrary sink. `comment` ends up in the trace header.
    pub fn from_writer(out: W, comment: &str, timescale: Timescale, clock: Arc<dyn Clock>) -> Self {
        let header = VcdHeader {
            date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            version: format!("sigtrace {}", env!("CARGO_PKG_VERSION")),
            comment: comment.to_string(),
            timescale,
        };
        Self {
            registry: SignalRegistry::new(),
            writer: VcdWriter::new(out, header),
            vars: Vec::new(),
            inits: Vec::new(),
            events: Vec::new(),
            timescale,
            clock,
            closed: false,
        }
    }

    /// Returns the timescale of the trace.
    pub fn timescale(&self) -> Timescale {
        self.timescale
    }

    /// Returns the number of buffered, unflushed events.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    fn var_layout(signal: &Signal) -> (VarType, u32) {
        match signal.signal_type() {
            SignalType::Bool => (VarType::Reg, signal.size().unwrap_or(1)),
            SignalType::Int => (VarType::Integer, 64),
            SignalType::Float => (VarType::Real, 64),
            SignalType::Str => (VarType::String, 1),
            SignalType::Event => (VarType::Event, 1),
        }
    }

    fn default_init(ty: SignalType) -> Value {
        match ty {
            SignalType::Bool | SignalType::Int => Value::DontCare,
            SignalType::Float => Value::Float(0.0),
            // An `x` string would be indistinguishable from the value "x"
            SignalType::Str => Value::Str(String::new()),
            SignalType::Event => Value::Event,
        }
    }
}

/// Maps a writer time regression onto the signal error taxonomy.
fn map_vcd_error(err: VcdError) -> SignalError {
    match err {
        VcdError::TimeRegression { time, last } => SignalError::TimeRegression { time, last },
        other => SignalError::Vcd(other),
    }
}

impl<W: Write + Send> SignalBackend for VcdBackend<W> {
    fn kind(&self) -> BackendKind {
        BackendKind::Vcd
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

        let (var_type, width) = Self::var_layout(&signal);
        let trace_init = init.clone().unwrap_or_else(|| Self::default_init(ty));
        let var = self
            .writer
            .register_var(scope, name, var_type, width, trace_init)?;

        let signal = self.registry.insert(signal);
        self.vars.push(var);
        self.inits.push(init);
        debug!(signal = %signal, %var_type, width, "registered VCD signal");
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
        trace!(signal = %signal, time, %value, "buffered event");
        self.events.push((time, id, value));
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

    fn flush(&mut self, ref_period: Period) -> SignalResult<()> {
        if self.closed {
            return Ok(());
        }

        // The writer only accepts a linear timeline
        self.events.sort_by_key(|&(time, _, _)| time);

        let rescaler = self.timescale.rescaler(ref_period);
        let now = rescaler.apply(self.clock.now_mu());

        self.writer.ensure_healthy().map_err(map_vcd_error)?;
        if let Some(&(first, _, _)) = self.events.first() {
            // Sorted and monotone, so checking the first event covers the batch
            if let Err(err) = self.writer.check_time(rescaler.apply(first)) {
                warn!(error = %err, pending = self.events.len(), "VCD flush aborted");
                return Err(map_vcd_error(err));
            }
        }

        let mut failure = None;
        for (written, (time, id, value)) in self.events.iter().enumerate() {
            if let Err(err) = self.writer.change(self.vars[*id], rescaler.apply(*time), value) {
                failure = Some((written, err));
                break;
            }
        }
        if let Some((written, err)) = failure {
            warn!(error = %err, written, pending = self.events.len(), "VCD flush failed");
            // Committed events must not be submitted twice
            self.events.drain(..written);
            return Err(map_vcd_error(err));
        }
        self.writer.flush(now).map_err(map_vcd_error)?;

        debug!(events = self.events.len(), now, "flushed VCD trace");
        self.events.clear();
        Ok(())
    }

    fn close(&mut self) -> SignalResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.events.is_empty() {
            warn!(dropped = self.events.len(), "closing VCD backend with unflushed events");
        }
        self.events.clear();
        self.writer.close()?;
        debug!("closed VCD trace");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<W: Write + Send> Drop for VcdBackend<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close VCD trace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::io;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// A sink that accepts a limited number of writes once armed.
    #[derive(Clone)]
    struct FlakySink {
        data: Arc<parking_lot::Mutex<Vec<u8>>>,
        writes_left: Arc<AtomicI64>,
    }

    impl FlakySink {
        fn new() -> Self {
            Self {
                data: Arc::default(),
                writes_left: Arc::new(AtomicI64::new(-1)),
            }
        }

        /// Allows `n` more writes; negative means unlimited.
        fn allow(&self, n: i64) {
            self.writes_left.store(n, Ordering::SeqCst);
        }

        fn contents(&self) -> String {
            String::from_utf8(self.data.lock().clone()).unwrap()
        }
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let left = self.writes_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            if left > 0 {
                self.writes_left.fetch_sub(1, Ordering::SeqCst);
            }
            self.data.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn backend(clock: &ManualClock) -> VcdBackend<Vec<u8>> {
        VcdBackend::from_writer(Vec::new(), "unit.vcd", Timescale::NS, Arc::new(clock.clone()))
    }

    #[test]
    fn test_register_and_pull_init() {
        let clock = ManualClock::new();
        let mut b = backend(&clock);
        let scope = Scope::new("ttl0");
        let s = b
            .register(&scope, "state", SignalType::Bool, Some(1), Some(Value::from("z")))
            .unwrap();
        let c = b.register(&scope, "count", SignalType::Int, None, None).unwrap();

        assert_eq!(b.pull(&s, None, 0).unwrap(), Value::HighZ);
        assert!(b.pull(&c, None, 0).unwrap_err().is_not_set());
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_push_buffers_events() {
        let clock = ManualClock::starting_at(100);
        let mut b = backend(&clock);
        let s = b
            .register(&Scope::new("ec"), "count", SignalType::Int, None, None)
            .unwrap();

        b.push(&s, Value::from(1), None, 0).unwrap();
        b.push(&s, Value::from(2), Some(5), 0).unwrap();
        b.push(&s, Value::from(3), None, -10).unwrap();
        assert_eq!(b.pending(), 3);
        assert_eq!(b.events[0].0, 100);
        assert_eq!(b.events[1].0, 5);
        assert_eq!(b.events[2].0, 90);

        assert!(b.push(&s, Value::from(1.5), None, 0).is_err());
        assert_eq!(b.pending(), 3);
    }

    #[test]
    fn test_flush_clears_buffer() {
        let clock = ManualClock::new();
        let mut b = backend(&clock);
        let s = b
            .register(&Scope::new("ec"), "count", SignalType::Int, None, None)
            .unwrap();
        b.push(&s, Value::from(1), Some(3), 0).unwrap();
        b.flush(Period::from_nanos(1)).unwrap();
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn test_regression_keeps_buffer() {
        let clock = ManualClock::starting_at(50);
        let mut b = backend(&clock);
        let s = b
            .register(&Scope::new("ec"), "count", SignalType::Int, None, None)
            .unwrap();
        b.push(&s, Value::from(1), Some(10), 0).unwrap();
        b.flush(Period::from_nanos(1)).unwrap();

        b.push(&s, Value::from(2), Some(20), 0).unwrap();
        let err = b.flush(Period::from_nanos(1)).unwrap_err();
        assert!(matches!(err, SignalError::TimeRegression { time: 20, last: 50 }));
        assert_eq!(b.pending(), 1);
    }

    #[test]
    fn test_register_after_flush_fails() {
        let clock = ManualClock::new();
        let mut b = backend(&clock);
        b.flush(Period::from_nanos(1)).unwrap();
        let err = b
            .register(&Scope::new("late"), "sig", SignalType::Float, None, None)
            .unwrap_err();
        assert!(matches!(err, SignalError::Vcd(VcdError::DefinitionsClosed)));
        assert!(b.is_empty());
    }

    #[test]
    fn test_close_reentrant() {
        let clock = ManualClock::new();
        let mut b = backend(&clock);
        let s = b
            .register(&Scope::new("ec"), "count", SignalType::Int, None, None)
            .unwrap();
        b.push(&s, Value::from(1), None, 0).unwrap();
        b.close().unwrap();
        b.close().unwrap();
        assert_eq!(b.pending(), 0);
        assert!(matches!(
            b.push(&s, Value::from(1), None, 0),
            Err(SignalError::BackendClosed(BackendKind::Vcd))
        ));
        b.flush(Period::from_nanos(1)).unwrap();
    }

    #[test]
    fn test_io_error_mid_flush() {
        let clock = ManualClock::new();
        let sink = FlakySink::new();
        let mut b = VcdBackend::from_writer(sink.clone(), "flaky.vcd", Timescale::NS, Arc::new(clock.clone()));
        let s = b
            .register(&Scope::new("ec"), "count", SignalType::Int, None, None)
            .unwrap();
        b.push(&s, Value::from(1), Some(10), 0).unwrap();
        b.flush(Period::from_nanos(1)).unwrap();

        // One more value change fits before the sink fails
        sink.allow(1);
        for (t, v) in [(20, 2), (30, 3), (40, 4)] {
            b.push(&s, Value::from(v), Some(t), 0).unwrap();
        }
        let err = b.flush(Period::from_nanos(1)).unwrap_err();
        assert!(matches!(err, SignalError::Vcd(VcdError::Io(_))));
        assert_eq!(b.pending(), 2);

        // Later flushes report the failure, not a time regression
        let err = b.flush(Period::from_nanos(1)).unwrap_err();
        assert!(matches!(err, SignalError::Vcd(VcdError::Failed(_))));
        sink.allow(-1);
        let err = b.flush(Period::from_nanos(1)).unwrap_err();
        assert!(err.to_string().contains("disk full"));

        assert!(sink.contents().ends_with("#10\nb1 !\n#20\nb10 !\n"));
        b.close().unwrap();
        assert!(sink.contents().ends_with("#20\nb10 !\n"));
    }
}
