//! Signal definitions and value normalization.
//!
//! A signal is a typed, named channel owned by a device scope. Its type and
//! size are fixed at registration and decide which values are legal.
//!
//! # Legal values
//!
//! | Type    | Accepted values |
//! |---------|-----------------|
//! | `Bool`  | `true`/`false`, `0`/`1`, `x`/`X`, `z`/`Z` |
//! | `Bool` (size > 1) | string of exactly `size` chars over `0 1 x X z Z` |
//! | `Int`   | any integer, `true`/`false`, `x`/`X`, `z`/`Z` |
//! | `Float` | finite floats only |
//! | `Str`   | any string |
//! | `Event` | `Event` or any boolean (an event carries no value) |
//!
//! # Example
//!
//! ```
//! use sigtrace::signal::{Signal, SignalType};
//! use sigtrace::Value;
//!
//! let bus = Signal::new("spi0", "data", SignalType::Bool, Some(4)).unwrap();
//! assert_eq!(bus.normalize("10XZ").unwrap(), Value::BoolVector("10xz".into()));
//! assert!(bus.normalize("10x").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};
use crate::types::{RegistryId, Scope, SignalId};
use crate::value::{Bit, Value};

/// Semantic type of a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// A register of one or more four-state bits
    Bool,
    /// A 64-bit integer
    Int,
    /// A 64-bit float
    Float,
    /// A string
    Str,
    /// A pure event without a value
    Event,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalType::Bool => "bool",
            SignalType::Int => "int",
            SignalType::Float => "float",
            SignalType::Str => "str",
            SignalType::Event => "event",
        };
        f.write_str(name)
    }
}

/// A registered signal.
///
/// Signals are immutable once created. Backends hand them out as `Arc<Signal>`
/// and use the embedded id to locate their per-signal state.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    id: SignalId,
    registry: RegistryId,
    scope: Scope,
    name: String,
    ty: SignalType,
    size: Option<u32>,
}

impl Signal {
    /// Creates a detached signal and validates its definition.
    ///
    /// The scope key and the name must be identifier-like, as both end up as
    /// bare words in a VCD trace. `Bool` signals need a size greater than
    /// zero, every other type must have no size.
    pub fn new(
        scope: impl Into<Scope>,
        name: impl Into<String>,
        ty: SignalType,
        size: Option<u32>,
    ) -> SignalResult<Self> {
        let scope = scope.into();
        let name = name.into();

        if !is_identifier(scope.key()) {
            return Err(SignalError::InvalidSignal(format!(
                "scope \"{scope}\" of signal \"{name}\" is not a valid identifier"
            )));
        }
        if !is_identifier(&name) {
            return Err(SignalError::InvalidSignal(format!(
                "signal name \"{name}\" of scope \"{scope}\" is not a valid identifier"
            )));
        }
        match (ty, size) {
            (SignalType::Bool, Some(n)) if n > 0 => {}
            (SignalType::Bool, _) => {
                return Err(SignalError::InvalidSignal(format!(
                    "signal \"{scope}.{name}\" of type bool needs a size > 0"
                )));
            }
            (_, Some(_)) => {
                return Err(SignalError::InvalidSignal(format!(
                    "size not supported for signal \"{scope}.{name}\" of type {ty}"
                )));
            }
            (_, None) => {}
        }

        Ok(Self {
            id: 0,
            registry: 0,
            scope,
            name,
            ty,
            size,
        })
    }

    pub(crate) fn with_owner(mut self, registry: RegistryId, id: SignalId) -> Self {
        self.registry = registry;
        self.id = id;
        self
    }

    /// Index of this signal inside its registry.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Identifier of the registry that owns this signal.
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    /// Scope of the signal (the owning device).
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Name of the signal.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the signal.
    pub fn signal_type(&self) -> SignalType {
        self.ty
    }

    /// Size of the signal (only for `Bool`).
    pub fn size(&self) -> Option<u32> {
        self.size
    }

    /// Normalizes a value for this signal.
    ///
    /// Returns the canonical form of `value` or `InvalidValue` if the value is
    /// not legal for this signal's type and size. Normalizing an already
    /// normalized value returns it unchanged.
    pub fn normalize(&self, value: impl Into<Value>) -> SignalResult<Value> {
        let value = value.into();
        let normalized = match self.size {
            None | Some(1) => self.normalize_scalar(&value),
            Some(n) => self.normalize_vector(&value, n),
        };
        normalized.ok_or_else(|| SignalError::InvalidValue {
            signal: self.to_string(),
            value: value.to_string(),
        })
    }

    fn normalize_scalar(&self, value: &Value) -> Option<Value> {
        match (self.ty, value) {
            (SignalType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
            (SignalType::Bool, Value::Int(0)) => Some(Value::Bool(false)),
            (SignalType::Bool, Value::Int(1)) => Some(Value::Bool(true)),
            (SignalType::Bool | SignalType::Int, v) if special(v).is_some() => special(v),
            (SignalType::Int, Value::Int(i)) => Some(Value::Int(*i)),
            (SignalType::Int, Value::Bool(b)) => Some(Value::Int(i64::from(*b))),
            (SignalType::Float, Value::Float(f)) if f.is_finite() => Some(Value::Float(*f)),
            (SignalType::Str, Value::Str(s)) => Some(Value::Str(s.clone())),
            (SignalType::Event, Value::Event | Value::Bool(_)) => Some(Value::Event),
            _ => None,
        }
    }

    fn normalize_vector(&self, value: &Value, size: u32) -> Option<Value> {
        if self.ty != SignalType::Bool {
            return None;
        }
        let bits = match value {
            Value::Str(s) | Value::BoolVector(s) => s,
            _ => return None,
        };
        if bits.chars().count() != size as usize {
            return None;
        }
        bits.chars()
            .map(|c| Bit::from_char(c).map(Bit::as_char))
            .collect::<Option<String>>()
            .map(Value::BoolVector)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scope, self.name)
    }
}

/// Maps the don't-care and high-impedance spellings to their canonical values.
fn special(value: &Value) -> Option<Value> {
    match value {
        Value::DontCare => Some(Value::DontCare),
        Value::HighZ => Some(Value::HighZ),
        Value::Str(s) => match s.as_str() {
            "x" | "X" => Some(Value::DontCare),
            "z" | "Z" => Some(Value::HighZ),
            _ => None,
        },
        _ => None,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
