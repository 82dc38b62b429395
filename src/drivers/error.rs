use thiserror::Error;

use crate::types::SessionState;

/// Opening a transport failed. The session stays disconnected.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot open serial port {port}: {reason}")]
    PortUnavailable { port: String, reason: String },
    #[error("connection to {addr} refused: {reason}")]
    Refused { addr: String, reason: String },
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// A single payload could not be turned into a sample.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("payload is not valid text")]
    Utf8,
    #[error("empty payload")]
    Empty,
    #[error("not a number: {0:?}")]
    NotANumber(String),
}

/// Failure while talking to an open transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read timed out")]
    Timeout,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("peer disconnected")]
    Disconnected,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Timeouts and malformed payloads are dropped; everything else ends the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Parse(_))
    }

    pub(crate) fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout,
            ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected => TransportError::Disconnected,
            _ => TransportError::Io(err),
        }
    }
}

/// Loading a persisted dataset failed; nothing was applied.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("missing line {line} ({what})")]
    MissingLine { line: usize, what: &'static str },
    #[error("unrecognized file tag {0:?}")]
    BadTag(String),
    #[error("line {line}: invalid number {value:?}")]
    BadNumber { line: usize, value: String },
    #[error("line {line}: unknown interval unit code {code:?}")]
    BadUnit { line: usize, code: String },
    #[error("line {line}: malformed field {value:?}")]
    BadField { line: usize, value: String },
    #[error("invalid dataset: {0}")]
    Invalid(#[from] ConfigError),
    #[error("unexpected data after {expected} samples")]
    TrailingData { expected: usize },
    #[error("file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected at the configuration boundary; the previous configuration stays in force.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("buffer capacity must be greater than zero")]
    InvalidCapacity,
    #[error("sample interval {magnitude} {unit} is outside {min}..={max}")]
    InvalidInterval {
        magnitude: u32,
        unit: &'static str,
        min: u32,
        max: u32,
    },
    #[error("display range is empty: min {min} >= max {max}")]
    InvalidRange { min: f64, max: f64 },
    #[error("invalid network address {0:?}")]
    InvalidAddress(String),
    #[error("invalid network port {0}")]
    InvalidPort(u16),
    #[error("invalid serial settings: {0}")]
    InvalidSerial(String),
    #[error("failed to read settings: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("failed to write settings: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("failed to parse settings: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
}

/// Errors returned by the session controller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {op} while {state}")]
    InvalidState { op: &'static str, state: SessionState },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn acquisition worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}
