//! # Configuration Module
//!
//! `SessionConfig` carries everything a session needs: display metadata,
//! buffer capacity, sample interval, filter switch and the transport
//! selection. It is handed to the session controller at construction and
//! validated before it replaces a previous configuration.
//!
//! ## Storage Location
//! - Linux: ~/.config/datalogger/config.toml
//! - macOS: ~/Library/Application Support/datalogger/config.toml
//! - Windows: %APPDATA%\datalogger\config.toml

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::{ConfigError, SampleInterval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(v: Parity) -> Self {
        match v {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    /// XON/XOFF
    Software,
    /// RTS/CTS
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(v: FlowControl) -> Self {
        match v {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: FlowControl,
    pub dtr: bool,
    pub read_timeout_ms: u64,
}

impl SerialSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_name.trim().is_empty() {
            return Err(ConfigError::InvalidSerial("no port selected".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidSerial("baud rate must be positive".into()));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(ConfigError::InvalidSerial(format!(
                "unsupported data bits: {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(ConfigError::InvalidSerial(format!(
                "unsupported stop bits: {}",
                self.stop_bits
            )));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
            dtr: false,
            read_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub host: String,
    pub port: u16,
    pub read_timeout_ms: u64,
}

impl NetworkSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ip()?;
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        Ok(())
    }

    pub fn ip(&self) -> Result<IpAddr, ConfigError> {
        self.host
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidAddress(self.host.clone()))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 5500,
            read_timeout_ms: 1000,
        }
    }
}

/// Which channel samples come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    Serial(SerialSettings),
    Network(NetworkSettings),
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            TransportConfig::Serial(s) => s.validate(),
            TransportConfig::Network(n) => n.validate(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial(SerialSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub title: String,
    pub y_label: String,
    pub y_unit: String,
    pub display_min: f64,
    pub display_max: f64,
    pub buffer_capacity: usize,
    pub use_filter: bool,
    pub line_color: [u8; 3],
    pub interval: SampleInterval,
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            title: "My plot".to_owned(),
            y_label: "Volts".to_owned(),
            y_unit: "V".to_owned(),
            display_min: 0.0,
            display_max: 6.0,
            buffer_capacity: 1200,
            use_filter: true,
            line_color: [100, 200, 100],
            interval: SampleInterval::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Checks everything except the transport, which may be left unset
    /// until the user connects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        self.interval.validate()?;
        validate_range(self.display_min, self.display_max)?;
        Ok(())
    }
}

pub fn validate_range(min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(ConfigError::InvalidRange { min, max });
    }
    Ok(())
}

/// Reads and writes `SessionConfig` as TOML.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at the platform config directory.
    pub fn default_location() -> Self {
        let dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::at(dir.join("datalogger").join("config.toml"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored config, writing defaults if none exists yet.
    pub fn load(&self) -> Result<SessionConfig, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let config: SessionConfig = toml::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = SessionConfig::default();
                self.save(&config)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    pub fn save(&self, config: &SessionConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }
        let text = toml::to_string_pretty(config)?;
        fs::write(&self.path, text).map_err(ConfigError::WriteFailed)?;
        log::debug!("settings saved to {}", self.path.display());
        Ok(())
    }
}
