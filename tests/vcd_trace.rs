//! End-to-end tests of the VCD backend writing trace files to disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use sigtrace::backend::{SignalBackend, VcdBackend};
use sigtrace::clock::ManualClock;
use sigtrace::timescale::{Period, TimeUnit, Timescale};
use sigtrace::{Scope, SignalError, SignalType, Value};

fn read_trace(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// Timestamp markers in the order they appear in the trace.
fn markers(trace: &str) -> Vec<i64> {
    trace
        .lines()
        .filter_map(|line| line.strip_prefix('#'))
        .map(|t| t.parse().unwrap())
        .collect()
}

#[test]
fn test_header_and_declarations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header.vcd");
    let clock = ManualClock::new();

    let mut backend = VcdBackend::create(&path, Timescale::NS, Arc::new(clock.clone())).unwrap();
    backend
        .register(&Scope::new("ttl0"), "state", SignalType::Bool, Some(1), None)
        .unwrap();
    backend
        .register(&Scope::new("ec"), "count", SignalType::Int, None, Some(Value::from(0)))
        .unwrap();
    backend
        .register(&Scope::new("dds"), "freq", SignalType::Float, None, None)
        .unwrap();
    backend.close().unwrap();

    let trace = read_trace(&path);
    assert!(trace.starts_with("$date "));
    assert!(trace.contains("$version sigtrace "));
    assert!(trace.contains(&format!("$comment {} $end", path.display())));
    assert!(trace.contains("$timescale 1 ns $end"));

    assert!(trace.contains("$scope module ttl0 $end"));
    assert!(trace.contains("$var reg 1 ! state $end"));
    assert!(trace.contains("$var integer 64 \" count $end"));
    assert!(trace.contains("$var real 64 # freq $end"));

    // Initial values: unknown register, integer init, real defaults to zero
    assert!(trace.contains("\nx!\n"));
    assert!(trace.contains("\nb0 \"\n"));
    assert!(trace.contains("\nr0 #\n"));
}

#[test]
fn test_flush_sorts_and_rescales() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rescale.vcd");
    let clock = ManualClock::new();

    let mut backend = VcdBackend::create(&path, Timescale::NS, Arc::new(clock.clone())).unwrap();
    let count = backend
        .register(&Scope::new("ec"), "count", SignalType::Int, None, None)
        .unwrap();

    backend.push(&count, Value::from(3), Some(30), 0).unwrap();
    backend.push(&count, Value::from(1), Some(10), 0).unwrap();
    backend.push(&count, Value::from(2), Some(20), 0).unwrap();
    assert_eq!(backend.pending(), 3);

    backend.flush(Period::from_nanos(2)).unwrap();
    assert_eq!(backend.pending(), 0);

    // A push behind the committed trace fails the next flush
    backend.push(&count, Value::from(4), Some(5), 0).unwrap();
    let err = backend.flush(Period::from_nanos(2)).unwrap_err();
    assert!(matches!(err, SignalError::TimeRegression { time: 10, last: 60 }));
    assert_eq!(backend.pending(), 1);

    backend.close().unwrap();
    let trace = read_trace(&path);
    assert_eq!(markers(&trace), vec![0, 20, 40, 60]);
    assert!(trace.contains("#20\nb1 !\n#40\nb10 !\n#60\nb11 !\n"));
    assert!(!trace.contains("b100 !"));
}

#[test]
fn test_flush_advances_to_clock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("advance.vcd");
    let clock = ManualClock::new();

    let mut backend = VcdBackend::create(
        &path,
        Timescale::new(1, TimeUnit::Ps).unwrap(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    let state = backend
        .register(&Scope::new("ttl0"), "state", SignalType::Bool, Some(1), Some(Value::from(0)))
        .unwrap();

    clock.set(8);
    backend.push(&state, Value::from(1), None, 0).unwrap();
    clock.set(100);
    backend.flush(Period::from_nanos(1)).unwrap();
    backend.close().unwrap();

    let trace = read_trace(&path);
    assert_eq!(markers(&trace), vec![0, 8_000, 100_000]);
    assert!(trace.contains("#8000\n1!\n"));
}

#[test]
fn test_unchanged_values_and_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.vcd");
    let clock = ManualClock::new();

    let mut backend = VcdBackend::create(&path, Timescale::NS, Arc::new(clock.clone())).unwrap();
    let scope = Scope::new("core");
    let state = backend
        .register(&scope, "state", SignalType::Bool, Some(1), Some(Value::from(0)))
        .unwrap();
    let reset = backend
        .register(&scope, "reset", SignalType::Event, None, None)
        .unwrap();

    backend.push(&state, Value::from(0), Some(5), 0).unwrap();
    backend.push(&reset, Value::from(true), Some(10), 0).unwrap();
    backend.push(&reset, Value::from(true), Some(20), 0).unwrap();
    backend.flush(Period::from_nanos(1)).unwrap();
    backend.close().unwrap();

    let trace = read_trace(&path);
    assert!(trace.contains("$var event 1 \" reset $end"));
    // The repeated `0` is deduplicated, both events are recorded
    assert_eq!(markers(&trace), vec![0, 10, 20]);
    assert_eq!(trace.matches("\n1\"\n").count(), 2);
}

#[test]
fn test_string_and_vector_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strings.vcd");
    let clock = ManualClock::new();

    let mut backend = VcdBackend::create(&path, Timescale::NS, Arc::new(clock.clone())).unwrap();
    let scope = Scope::new("uart");
    let text = backend
        .register(&scope, "text", SignalType::Str, None, None)
        .unwrap();
    let bus = backend
        .register(&scope, "bus", SignalType::Bool, Some(4), None)
        .unwrap();

    backend.push(&text, Value::from("hello world"), Some(1), 0).unwrap();
    backend.push(&bus, Value::from("10XZ"), Some(1), 0).unwrap();
    backend.push(&bus, Value::from("xxxx"), Some(2), 0).unwrap();
    backend.flush(Period::from_nanos(1)).unwrap();
    backend.close().unwrap();

    let trace = read_trace(&path);
    assert!(trace.contains("$var string 1 ! text $end"));
    assert!(trace.contains("$var reg 4 \" bus $end"));
    assert!(trace.contains("\nshello\\x20world !\n"));
    assert!(trace.contains("\nb10xz \"\n"));
    assert!(trace.contains("#2\nbxxxx \"\n"));
}

#[test]
fn test_register_after_first_flush_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.vcd");
    let clock = ManualClock::new();

    let mut backend = VcdBackend::create(&path, Timescale::NS, Arc::new(clock.clone())).unwrap();
    backend
        .register(&Scope::new("ttl0"), "state", SignalType::Bool, Some(1), None)
        .unwrap();
    backend.flush(Period::from_nanos(1)).unwrap();

    let err = backend
        .register(&Scope::new("ttl1"), "state", SignalType::Bool, Some(1), None)
        .unwrap_err();
    assert!(matches!(err, SignalError::Vcd(_)));
    assert_eq!(backend.len(), 1);
}

#[test]
fn test_drop_closes_trace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drop.vcd");
    {
        let mut backend =
            VcdBackend::create(&path, Timescale::NS, Arc::new(ManualClock::new())).unwrap();
        backend
            .register(&Scope::new("ttl0"), "state", SignalType::Bool, Some(1), None)
            .unwrap();
    }
    assert!(read_trace(&path).contains("$enddefinitions $end"));
}

#[test]
fn test_scope_must_be_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scopes.vcd");

    let mut backend =
        VcdBackend::create(&path, Timescale::NS, Arc::new(ManualClock::new())).unwrap();
    let err = backend
        .register(&Scope::new("my dev"), "state", SignalType::Bool, Some(1), None)
        .unwrap_err();
    assert!(matches!(err, SignalError::InvalidSignal(_)));
    assert!(backend.is_empty());

    backend
        .register(&Scope::new("my_dev"), "state", SignalType::Bool, Some(1), None)
        .unwrap();
    backend.close().unwrap();

    let trace = read_trace(&path);
    assert!(trace.contains("$scope module my_dev $end"));
    assert!(!trace.contains("my dev"));
}

#[test]
fn test_non_finite_floats_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("floats.vcd");

    let mut backend =
        VcdBackend::create(&path, Timescale::NS, Arc::new(ManualClock::new())).unwrap();
    let freq = backend
        .register(&Scope::new("dds"), "freq", SignalType::Float, None, None)
        .unwrap();
    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = backend.push(&freq, Value::from(value), Some(1), 0).unwrap_err();
        assert!(matches!(err, SignalError::InvalidValue { .. }));
    }
    backend.push(&freq, Value::from(2.5), Some(1), 0).unwrap();
    assert_eq!(backend.pending(), 1);
    backend.flush(Period::from_nanos(1)).unwrap();
    backend.close().unwrap();

    let trace = read_trace(&path);
    let body = trace.split("$enddefinitions $end").nth(1).unwrap();
    assert!(body.contains("#1\nr2.5 !\n"));
    assert!(!body.to_lowercase().contains("nan"));
    assert!(!body.contains("inf"));
}
