use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::TransportConfig;
use crate::drivers::network::NetworkTransport;
use crate::drivers::serial::SerialTransport;
use crate::drivers::{ConnectionError, ParseError, SampleInterval, TransportError};

/// Who decides when the next sample arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// The remote device pushes samples at the configured interval.
    SelfPaced,
    /// The host must poll; the worker throttles with a `Pacer`.
    Polled,
}

/// An open acquisition channel producing one sample per `read_sample`.
///
/// Only one thread drives a transport at a time: the controller while idle,
/// the acquisition worker while a run is active.
pub trait Transport: Send {
    fn describe(&self) -> String;

    fn pacing(&self) -> Pacing;

    /// Prepares the peer for a run at `interval`.
    fn begin(&mut self, interval: SampleInterval) -> Result<(), TransportError>;

    /// Blocks for at most the transport's read timeout.
    fn read_sample(&mut self) -> Result<f64, TransportError>;

    /// Tells the peer the run is over.
    fn end(&mut self) -> Result<(), TransportError>;

    /// Releases the connection. Must not be called during a run.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens the transport selected by `config`.
pub fn open(config: &TransportConfig) -> Result<Box<dyn Transport>, ConnectionError> {
    match config {
        TransportConfig::Serial(settings) => Ok(Box::new(SerialTransport::open(settings)?)),
        TransportConfig::Network(settings) => Ok(Box::new(NetworkTransport::connect(settings)?)),
    }
}

/// Parses a whole-number ASCII line as sent by the microcontroller.
pub fn parse_integer(raw: &[u8]) -> Result<f64, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParseError::Utf8)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    text.parse::<i64>()
        .map(|v| v as f64)
        .map_err(|_| ParseError::NotANumber(text.to_owned()))
}

/// Parses a decimal text payload as sent by the sample server. Only finite
/// values count as samples.
pub fn parse_decimal(raw: &[u8]) -> Result<f64, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParseError::Utf8)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::NotANumber(text.to_owned())),
    }
}

/// One step of a scripted playback.
#[derive(Clone, Debug, PartialEq)]
pub enum Scripted {
    Value(f64),
    Malformed(String),
    Timeout,
    Disconnect,
}

/// In-memory transport for tests and deterministic playback.
///
/// Once the script runs out every read behaves like a timeout.
pub struct ScriptedTransport {
    script: VecDeque<Scripted>,
    pacing: Pacing,
    idle_delay: Duration,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: script.into_iter().collect(),
            pacing: Pacing::SelfPaced,
            idle_delay: Duration::from_millis(5),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn values(values: impl IntoIterator<Item = f64>) -> Self {
        Self::new(values.into_iter().map(Scripted::Value))
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Commands received so far (`begin:<cmd>`, `end`, `close`).
    pub fn command_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.commands)
    }
}

impl Transport for ScriptedTransport {
    fn describe(&self) -> String {
        "scripted".to_owned()
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    fn begin(&mut self, interval: SampleInterval) -> Result<(), TransportError> {
        self.commands
            .lock()
            .push(format!("begin:{}", interval.device_command()));
        Ok(())
    }

    fn read_sample(&mut self) -> Result<f64, TransportError> {
        match self.script.pop_front() {
            Some(Scripted::Value(v)) => Ok(v),
            Some(Scripted::Malformed(text)) => Err(ParseError::NotANumber(text).into()),
            Some(Scripted::Disconnect) => Err(TransportError::Disconnected),
            Some(Scripted::Timeout) | None => {
                thread::sleep(self.idle_delay);
                Err(TransportError::Timeout)
            }
        }
    }

    fn end(&mut self) -> Result<(), TransportError> {
        self.commands.lock().push("end".to_owned());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.commands.lock().push("close".to_owned());
        Ok(())
    }
}
