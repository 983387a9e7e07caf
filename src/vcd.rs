//! Value Change Dump (IEEE 1364) writer.
//!
//! The writer collects variable declarations until the first value change (or
//! flush), then commits the header and definitions and streams value changes
//! in non-decreasing time order.
//!
//! # Output
//!
//! ```text
//! $date 2024-01-01 12:00:00 $end
//! $version sigtrace 0.1.0 $end
//! $comment trace.vcd $end
//! $timescale 1 ns $end
//! $scope module ttl0 $end
//! $var reg 1 ! state $end
//! $upscope $end
//! $enddefinitions $end
//! #0
//! $dumpvars
//! x!
//! $end
//! #10
//! 1!
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use thiserror::Error;

use crate::timescale::Timescale;
use crate::types::{Scope, SimTime};
use crate::value::Value;

/// Errors raised by the VCD writer.
#[derive(Error, Debug)]
pub enum VcdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timestamp {time} is earlier than the last committed timestamp {last}")]
    TimeRegression { time: SimTime, last: SimTime },

    #[error("Variables can not be registered after the definitions were written")]
    DefinitionsClosed,

    #[error("The VCD writer is closed")]
    Closed,

    #[error("The VCD trace is incomplete after an earlier IO error: {0}")]
    Failed(String),

    #[error("Unknown variable {0}")]
    UnknownVariable(usize),

    #[error("Value {value} can not be written to {var_type} variable \"{name}\"")]
    InvalidValue {
        name: String,
        var_type: VarType,
        value: String,
    },
}

/// Result type for VCD operations.
pub type VcdResult<T> = Result<T, VcdError>;

/// VCD variable types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    Reg,
    Integer,
    Real,
    String,
    Event,
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = match self {
            VarType::Reg => "reg",
            VarType::Integer => "integer",
            VarType::Real => "real",
            VarType::String => "string",
            VarType::Event => "event",
        };
        f.write_str(keyword)
    }
}

/// Handle to a registered variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(usize);

/// Header fields written before the definitions.
#[derive(Clone, Debug)]
pub struct VcdHeader {
    pub date: String,
    pub version: String,
    pub comment: String,
    pub timescale: Timescale,
}

#[derive(Debug)]
struct Variable {
    scope: Scope,
    name: String,
    var_type: VarType,
    size: u32,
    code: String,
    init: Value,
    last: Option<Value>,
}

/// A streaming VCD writer.
///
/// An IO error leaves the trace truncated. The writer remembers it and every
/// later write fails with `Failed` instead of appending to a broken trace.
#[derive(Debug)]
pub struct VcdWriter<W: Write> {
    out: Option<W>,
    header: VcdHeader,
    vars: Vec<Variable>,
    definitions_written: bool,
    last_time: SimTime,
    written_time: Option<SimTime>,
    failed: Option<String>,
}

impl<W: Write> VcdWriter<W> {
    /// Creates a writer over `out`. Nothing is written until the first change or flush.
    pub fn new(out: W, header: VcdHeader) -> Self {
        Self {
            out: Some(out),
            header,
            vars: Vec::new(),
            definitions_written: false,
            last_time: 0,
            written_time: None,
            failed: None,
        }
    }

    /// Declares a variable with its initial value.
    pub fn register_var(
        &mut self,
        scope: &Scope,
        name: &str,
        var_type: VarType,
        size: u32,
        init: Value,
    ) -> VcdResult<VarId> {
        if self.out.is_none() {
            return Err(VcdError::Closed);
        }
        if self.definitions_written {
            return Err(VcdError::DefinitionsClosed);
        }
        let index = self.vars.len();
        self.vars.push(Variable {
            scope: scope.clone(),
            name: name.to_string(),
            var_type,
            size,
            code: id_code(index),
            init,
            last: None,
        });
        Ok(VarId(index))
    }

    /// Returns the last committed timestamp.
    pub fn last_timestamp(&self) -> SimTime {
        self.last_time
    }

    /// Returns true once the writer has been closed.
    pub fn is_closed(&self) -> bool {
        self.out.is_none()
    }

    /// Fails with `Failed` if an earlier write hit an IO error.
    pub fn ensure_healthy(&self) -> VcdResult<()> {
        match &self.failed {
            Some(cause) => Err(VcdError::Failed(cause.clone())),
            None => Ok(()),
        }
    }

    /// Fails with `TimeRegression` if `time` is earlier than the last committed timestamp.
    pub fn check_time(&self, time: SimTime) -> VcdResult<()> {
        if time < self.last_time {
            return Err(VcdError::TimeRegression {
                time,
                last: self.last_time,
            });
        }
        Ok(())
    }

    /// Records a value change of `var` at `time`.
    ///
    /// Unchanged values are skipped, except for events.
    pub fn change(&mut self, var: VarId, time: SimTime, value: &Value) -> VcdResult<()> {
        self.ensure_healthy()?;
        let result = self.write_change(var, time, value);
        self.track(result)
    }

    /// Advances the trace to `time` and flushes the underlying sink.
    pub fn flush(&mut self, time: SimTime) -> VcdResult<()> {
        self.ensure_healthy()?;
        let result = self.write_flush(time);
        self.track(result)
    }

    /// Commits pending definitions, flushes and releases the sink.
    ///
    /// Calling `close` on a closed writer does nothing. A writer that already
    /// failed only releases the sink.
    pub fn close(&mut self) -> VcdResult<()> {
        if self.out.is_none() {
            return Ok(());
        }
        if self.failed.is_some() {
            self.out = None;
            return Ok(());
        }
        let result = self.write_definitions().and_then(|()| {
            self.out.as_mut().map_or(Ok(()), |out| out.flush().map_err(VcdError::from))
        });
        self.out = None;
        result
    }

    /// Commits pending definitions and returns the sink.
    #[cfg(test)]
    pub(crate) fn finish(mut self) -> VcdResult<W> {
        self.write_definitions()?;
        let mut out = self.out.take().ok_or(VcdError::Closed)?;
        out.flush()?;
        Ok(out)
    }

    /// Remembers the cause of an IO error.
    fn track(&mut self, result: VcdResult<()>) -> VcdResult<()> {
        if let Err(VcdError::Io(err)) = &result {
            self.failed = Some(err.to_string());
        }
        result
    }

    fn write_change(&mut self, var: VarId, time: SimTime, value: &Value) -> VcdResult<()> {
        self.write_definitions()?;
        self.check_time(time)?;
        let variable = self.vars.get(var.0).ok_or(VcdError::UnknownVariable(var.0))?;
        let line = if variable.var_type != VarType::Event && variable.last.as_ref() == Some(value) {
            None
        } else {
            Some(encode(variable, value)?)
        };
        let Some(line) = line else {
            self.last_time = time;
            return Ok(());
        };

        // Marker and value are written as one chunk
        let mut chunk = String::new();
        if self.written_time != Some(time) {
            chunk.push_str(&format!("#{time}\n"));
        }
        chunk.push_str(&line);
        chunk.push('\n');

        let out = self.out.as_mut().ok_or(VcdError::Closed)?;
        out.write_all(chunk.as_bytes())?;
        self.last_time = time;
        self.written_time = Some(time);
        self.vars[var.0].last = Some(value.clone());
        Ok(())
    }

    fn write_flush(&mut self, time: SimTime) -> VcdResult<()> {
        self.write_definitions()?;
        let out = self.out.as_mut().ok_or(VcdError::Closed)?;
        if time > self.last_time {
            writeln!(out, "#{time}")?;
            self.last_time = time;
            self.written_time = Some(time);
        }
        out.flush()?;
        Ok(())
    }

    fn write_definitions(&mut self) -> VcdResult<()> {
        if self.definitions_written {
            return Ok(());
        }
        let out = self.out.as_mut().ok_or(VcdError::Closed)?;
        let header = &self.header;
        writeln!(out, "$date {} $end", header.date)?;
        writeln!(out, "$version {} $end", header.version)?;
        writeln!(out, "$comment {} $end", header.comment)?;
        writeln!(out, "$timescale {} $end", header.timescale)?;

        let mut scopes: BTreeMap<&Scope, Vec<&Variable>> = BTreeMap::new();
        for var in &self.vars {
            scopes.entry(&var.scope).or_default().push(var);
        }
        for (scope, vars) in scopes {
            writeln!(out, "$scope module {scope} $end")?;
            for var in vars {
                writeln!(
                    out,
                    "$var {} {} {} {} $end",
                    var.var_type, var.size, var.code, var.name
                )?;
            }
            writeln!(out, "$upscope $end")?;
        }
        writeln!(out, "$enddefinitions $end")?;

        writeln!(out, "#0")?;
        writeln!(out, "$dumpvars")?;
        for var in self.vars.iter_mut().filter(|v| v.var_type != VarType::Event) {
            writeln!(out, "{}", encode(var, &var.init)?)?;
            var.last = Some(var.init.clone());
        }
        writeln!(out, "$end")?;

        self.definitions_written = true;
        self.last_time = 0;
        self.written_time = Some(0);
        Ok(())
    }
}

/// Encodes a value change line for `var`.
fn encode(var: &Variable, value: &Value) -> VcdResult<String> {
    let code = &var.code;
    let encoded = match (var.var_type, value) {
        (VarType::Reg, Value::Bool(b)) if var.size == 1 => format!("{}{code}", u8::from(*b)),
        (VarType::Reg, Value::DontCare) if var.size == 1 => format!("x{code}"),
        (VarType::Reg, Value::HighZ) if var.size == 1 => format!("z{code}"),
        (VarType::Reg, Value::BoolVector(bits)) => format!("b{bits} {code}"),
        (VarType::Reg | VarType::Integer, Value::DontCare) => format!("bx {code}"),
        (VarType::Reg | VarType::Integer, Value::HighZ) => format!("bz {code}"),
        (VarType::Integer, Value::Int(i)) => format!("b{:b} {code}", *i as u64),
        (VarType::Real, Value::Float(f)) if f.is_finite() => format!("r{f} {code}"),
        (VarType::String, Value::Str(s)) => format!("s{} {code}", escape(s)),
        (VarType::Event, _) => format!("1{code}"),
        (var_type, value) => {
            return Err(VcdError::InvalidValue {
                name: var.name.clone(),
                var_type,
                value: value.to_string(),
            })
        }
    };
    Ok(encoded)
}

/// Escapes backslashes, whitespace and control characters as `\xNN`.
fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c.is_ascii_whitespace() || c.is_ascii_control() {
            escaped.push_str(&format!("\\x{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Identifier code for the variable at `index`, bijective base-94 over `!`..`~`.
fn id_code(mut index: usize) -> String {
    let mut code = String::new();
    loop {
        code.push(char::from(b'!' + (index % 94) as u8));
        index /= 94;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    code
}
