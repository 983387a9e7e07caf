//! Error types for the signal store.
//!
//! Errors fall in two groups. Programmer errors (`InvalidValue`, `InvalidSignal`,
//! `DuplicateSignal`, `TimeRegression`) are surfaced immediately and are not meant
//! to be retried. Query outcomes (`SignalNotSet`, `SignalNotFound`) are expected
//! in normal operation and can be branched on with [`SignalError::is_not_set`]
//! and [`SignalError::is_not_found`].

use thiserror::Error;

use crate::backend::BackendKind;
use crate::types::{Offset, Scope, SimTime};
use crate::vcd::VcdError;

/// Errors raised by signals, registries and backends.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Invalid value {value} for signal \"{signal}\"")]
    InvalidValue { signal: String, value: String },

    #[error("Invalid signal definition: {0}")]
    InvalidSignal(String),

    #[error("Signal \"{scope}.{name}\" was already registered")]
    DuplicateSignal { scope: Scope, name: String },

    #[error("Signal \"{scope}.{name}\" could not be found")]
    SignalNotFound { scope: Scope, name: String },

    #[error("Signal \"{signal}\" not set at time {time}{}", note_suffix(.note))]
    SignalNotSet {
        signal: String,
        time: SimTime,
        note: Option<String>,
    },

    #[error("Attempt to go back in time too much: timestamp {time} is before {last}")]
    TimeRegression { time: SimTime, last: SimTime },

    #[error("Timestamp overflow: {time} + {offset}")]
    TimestampOverflow { time: SimTime, offset: Offset },

    #[error("The {0} backend is closed")]
    BackendClosed(BackendKind),

    #[error("Operation {operation} is not supported by the {backend} backend")]
    Unsupported {
        operation: &'static str,
        backend: BackendKind,
    },

    #[error("VCD error: {0}")]
    Vcd(#[from] VcdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn note_suffix(note: &Option<String>) -> String {
    note.as_deref().map(|n| format!(": {n}")).unwrap_or_default()
}

impl SignalError {
    /// Returns true if the signal has no value at the requested time.
    pub fn is_not_set(&self) -> bool {
        matches!(self, SignalError::SignalNotSet { .. })
    }

    /// Returns true if the requested signal is not registered.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SignalError::SignalNotFound { .. })
    }
}

/// Result type for signal store operations.
pub type SignalResult<T> = Result<T, SignalError>;
