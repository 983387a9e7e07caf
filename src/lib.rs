//! # sigtrace
//!
//! A timestamped signal store for discrete-event simulation.
//!
//! Simulated device drivers register named, typed signals and push value
//! changes at timestamps expressed in integer machine units. Depending on the
//! active backend, those changes are validated and dropped, written to a VCD
//! waveform trace or kept in queryable per-signal timelines.
//!
//! ## Design Principles
//!
//! - **Typed signals**: Every signal has a fixed type (`bool`, `int`, `float`,
//!   `str`, `event`) and size; pushed values are normalized against it.
//! - **Replay-safe time**: Timestamps come from an ambient [`Clock`] that may
//!   move backwards; backends never assume pushes arrive in time order.
//! - **Interchangeable backends**:
//!   - **Null**: validate and discard
//!   - **VCD**: buffer, sort, rescale and write a trace at flush time
//!   - **Peek**: O(log n) point-in-time lookups and scripted playback
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use sigtrace::backend::PeekBackend;
//! use sigtrace::clock::ManualClock;
//! use sigtrace::{Scope, SignalManager, SignalType, Value};
//!
//! let clock = ManualClock::new();
//! let manager = SignalManager::new();
//! manager.set_active(PeekBackend::new(Arc::new(clock.clone()))).unwrap();
//!
//! let ttl = Scope::new("ttl0");
//! let state = manager.register(&ttl, "state", SignalType::Bool, Some(1), None).unwrap();
//!
//! clock.advance(10);
//! manager.push(&state, 1).unwrap();
//! assert_eq!(manager.pull(&state, Some(15), 0).unwrap(), Value::Bool(true));
//! assert!(manager.pull(&state, Some(5), 0).unwrap_err().is_not_set());
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use sigtrace::config::SignalConfig;
//!
//! let config = SignalConfig::from_yaml_file("signals.yaml")?;
//! config.install(&manager, clock)?;
//! ```

pub mod types;
pub mod value;
pub mod signal;
pub mod error;
pub mod clock;
pub mod registry;
pub mod timescale;
pub mod vcd;
pub mod backend;
pub mod manager;
pub mod config;

// Re-export commonly used types
pub use types::{Offset, Scope, SignalId, SimTime};
pub use value::Value;
pub use signal::{Signal, SignalType};
pub use error::{SignalError, SignalResult};
pub use clock::{Clock, ManualClock};
pub use registry::{RegisteredSignals, SignalRegistry, SignalSummary};
pub use timescale::{Period, Timescale};
pub use backend::{BackendKind, NullBackend, PeekBackend, SharedBackend, SignalBackend, VcdBackend};
pub use manager::SignalManager;
pub use config::{ConfigError, SignalConfig, SignalConfigBuilder};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. The `RUST_LOG`
/// environment variable takes precedence over `level`. Calling it again after a
/// subscriber is installed does nothing.
///
/// # Example
///
/// ```rust,ignore
/// sigtrace::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
