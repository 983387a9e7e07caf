//! Signal values.
//!
//! [`Value`] is the tagged union of everything a signal can hold. Callers pass
//! raw values (for example `Value::Str("x")` for an undriven boolean) and the
//! signal normalizes them into canonical form, see [`crate::signal::Signal::normalize`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single four-state bit of a boolean signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bit {
    /// Logic low
    Zero,
    /// Logic high
    One,
    /// Don't-care / unknown
    X,
    /// High impedance
    Z,
}

impl Bit {
    /// Parses a bit from `0`, `1`, `x`, `X`, `z` or `Z`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Bit::Zero),
            '1' => Some(Bit::One),
            'x' | 'X' => Some(Bit::X),
            'z' | 'Z' => Some(Bit::Z),
            _ => None,
        }
    }

    /// Returns the lower-case character for this bit.
    pub fn as_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
            Bit::X => 'x',
            Bit::Z => 'z',
        }
    }
}

/// A signal value, either raw (as pushed by a caller) or normalized.
///
/// The canonical forms produced by normalization are:
///
/// | Variant      | Meaning |
/// |--------------|---------|
/// | `Bool`       | scalar boolean |
/// | `BoolVector` | lower-case string over `0 1 x z`, one char per bit |
/// | `Int`        | 64-bit integer |
/// | `Float`      | 64-bit float |
/// | `Str`        | string |
/// | `Event`      | an event without a value |
/// | `DontCare`   | `x`, unknown state |
/// | `HighZ`      | `z`, undriven state |
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    BoolVector(String),
    Int(i64),
    Float(f64),
    Str(String),
    Event,
    DontCare,
    HighZ,
}

impl Value {
    /// Returns true for the don't-care and high-impedance placeholders.
    pub fn is_special(&self) -> bool {
        matches!(self, Value::DontCare | Value::HighZ)
    }

    /// Returns the boolean, if this is a scalar boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float, if this is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string slice for strings and boolean vectors.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::BoolVector(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", u8::from(*b)),
            Value::BoolVector(bits) => f.write_str(bits),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Event => f.write_str("event"),
            Value::DontCare => f.write_str("x"),
            Value::HighZ => f.write_str("z"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(i64::from(i))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_chars() {
        for (c, bit) in [('0', Bit::Zero), ('1', Bit::One), ('X', Bit::X), ('z', Bit::Z)] {
            assert_eq!(Bit::from_char(c), Some(bit));
        }
        assert_eq!(Bit::from_char('y'), None);
        assert_eq!(Bit::X.as_char(), 'x');
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(Value::from(7_i8), Value::Int(7));
        assert_eq!(Value::from(-3_i32), Value::Int(-3));
        assert_eq!(Value::from(u32::MAX), Value::Int(i64::from(u32::MAX)));
        assert_eq!(Value::from(1.5_f32), Value::Float(1.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Bool(true).to_string(), "1");
        assert_eq!(Value::BoolVector("10xz".into()).to_string(), "10xz");
        assert_eq!(Value::Str("foo".into()).to_string(), "\"foo\"");
        assert_eq!(Value::HighZ.to_string(), "z");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Int(4).as_int(), Some(4));
        assert_eq!(Value::Bool(false).as_bool(), Some(false));
        assert_eq!(Value::Str("a".into()).as_str(), Some("a"));
        assert!(Value::DontCare.is_special());
        assert!(!Value::Event.is_special());
    }

    #[test]
    fn test_value_serialization() {
        let json = serde_json::to_string(&Value::Int(42)).unwrap();
        assert_eq!(json, r#"{"kind":"int","value":42}"#);

        let restored: Value = serde_json::from_str(r#"{"kind":"high_z"}"#).unwrap();
        assert_eq!(restored, Value::HighZ);
    }
}
