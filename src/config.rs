//! Configuration system for the signal store.
//!
//! This module provides YAML/JSON configuration file support for selecting and
//! setting up the signal backend of a simulation run.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! output: vcd        # null, vcd or peek
//! log_level: info
//!
//! vcd:
//!   file: trace.vcd
//!   timescale: 1 ns
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::backend::{BackendKind, NullBackend, PeekBackend, SignalBackend, VcdBackend};
use crate::clock::Clock;
use crate::error::SignalError;
use crate::manager::SignalManager;
use crate::timescale::Timescale;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),

    #[error("Backend error: {0}")]
    Backend(#[from] SignalError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings of the VCD backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VcdConfig {
    /// Output trace file
    #[serde(default = "default_vcd_file")]
    pub file: PathBuf,

    /// Time unit of one trace tick
    #[serde(default)]
    pub timescale: Timescale,
}

fn default_vcd_file() -> PathBuf {
    PathBuf::from("signals.vcd")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for VcdConfig {
    fn default() -> Self {
        Self {
            file: default_vcd_file(),
            timescale: Timescale::default(),
        }
    }
}

/// Complete signal store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Backend to activate
    #[serde(default)]
    pub output: BackendKind,

    /// Logging level (trace, debug, info, warn, error, off)
    ///
    /// Not applied by [`install`](Self::install), since the subscriber is
    /// process-wide. Call [`init_logging`](Self::init_logging) to apply it.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// VCD backend settings (used when `output` is `vcd`)
    #[serde(default)]
    pub vcd: VcdConfig,
}

impl SignalConfig {
    /// Creates a new default configuration (null output).
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SignalConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SignalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.output == BackendKind::Vcd && self.vcd.file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "vcd output requires a non-empty file".to_string(),
            ));
        }
        if self.output != BackendKind::Vcd && self.vcd.file != default_vcd_file() {
            tracing::warn!(
                "vcd.file is set but output is {} (ignored)",
                self.output
            );
        }
        if !matches!(
            self.log_level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error" | "off"
        ) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level: {}",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Installs the global tracing subscriber at `log_level`.
    ///
    /// `RUST_LOG` takes precedence. Does nothing if a subscriber is already set.
    pub fn init_logging(&self) {
        crate::init_logging(&self.log_level);
    }

    /// Creates the backend selected by `output`.
    pub fn build_backend(&self, clock: Arc<dyn Clock>) -> ConfigResult<Box<dyn SignalBackend>> {
        self.validate()?;
        let backend: Box<dyn SignalBackend> = match self.output {
            BackendKind::Null => Box::new(NullBackend::new(clock)),
            BackendKind::Peek => Box::new(PeekBackend::new(clock)),
            BackendKind::Vcd => Box::new(VcdBackend::create(
                &self.vcd.file,
                self.vcd.timescale,
                clock,
            )?),
        };
        Ok(backend)
    }

    /// Creates the configured backend and makes it the active backend of `manager`.
    pub fn install(&self, manager: &SignalManager, clock: Arc<dyn Clock>) -> ConfigResult<()> {
        let backend = self.build_backend(clock)?;
        manager.set_active_boxed(backend)?;
        Ok(())
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            output: BackendKind::default(),
            log_level: default_log_level(),
            vcd: VcdConfig::default(),
        }
    }
}

/// Builder for creating SignalConfig programmatically.
#[derive(Default)]
pub struct SignalConfigBuilder {
    config: SignalConfig,
}

impl SignalConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output backend.
    pub fn output(mut self, output: BackendKind) -> Self {
        self.config.output = output;
        self
    }

    /// Selects VCD output written to `file`.
    pub fn vcd(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.output = BackendKind::Vcd;
        self.config.vcd.file = file.into();
        self
    }

    /// Sets the VCD timescale.
    pub fn timescale(mut self, timescale: Timescale) -> Self {
        self.config.vcd.timescale = timescale;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SignalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
