use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};

use crate::config::SerialSettings;
use crate::drivers::source::{parse_integer, Pacing, Transport};
use crate::drivers::{ConnectionError, SampleInterval, TransportError};

const RUN_COMMAND: &[u8] = b"R";
const STOP_COMMAND: &[u8] = b"C";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Byte channel to a line-oriented device.
pub trait LineDevice: Read + Write + Send {
    /// Drops anything the device sent that has not been read yet.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LineDevice for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            log::warn!("serial port scan failed: {e}");
            Vec::new()
        }
    }
}

/// Microcontroller on a serial line.
///
/// Protocol: `<magnitude><unit>` then one acknowledgement line, `R` to run,
/// `C` to stop. While running the device prints one integer per line.
pub struct SerialTransport<P: LineDevice> {
    name: String,
    reader: BufReader<P>,
    // bytes of a line interrupted by a read timeout
    pending: Vec<u8>,
    handshake_timeout: Duration,
}

impl SerialTransport<Box<dyn SerialPort>> {
    pub fn open(settings: &SerialSettings) -> Result<Self, ConnectionError> {
        let unavailable = |reason: String| ConnectionError::PortUnavailable {
            port: settings.port_name.clone(),
            reason,
        };
        settings.validate().map_err(|e| unavailable(e.to_string()))?;

        let data_bits = match settings.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = if settings.stop_bits == 2 {
            StopBits::Two
        } else {
            StopBits::One
        };
        let mut port = serialport::new(&settings.port_name, settings.baud_rate)
            .data_bits(data_bits)
            .parity(settings.parity.into())
            .stop_bits(stop_bits)
            .flow_control(settings.flow_control.into())
            .timeout(settings.read_timeout())
            .open()
            .map_err(|e| unavailable(e.to_string()))?;
        if settings.dtr {
            if let Err(e) = port.write_data_terminal_ready(true) {
                log::warn!("could not raise DTR on {}: {e}", settings.port_name);
            }
        }
        log::info!(
            "opened {} at {} baud",
            settings.port_name,
            settings.baud_rate
        );
        Ok(Self::from_device(settings.port_name.clone(), port))
    }
}

impl<P: LineDevice> SerialTransport<P> {
    pub fn from_device(name: impl Into<String>, device: P) -> Self {
        Self {
            name: name.into(),
            reader: BufReader::new(device),
            pending: Vec::new(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let device = self.reader.get_mut();
        device.write_all(bytes).map_err(TransportError::from_io)?;
        device.flush().map_err(TransportError::from_io)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(_) if self.pending.ends_with(b"\n") => Ok(std::mem::take(&mut self.pending)),
            // EOF, with or without a partial line
            Ok(_) => Err(TransportError::Disconnected),
            Err(e) => Err(TransportError::from_io(e)),
        }
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        self.reader
            .get_mut()
            .discard_input()
            .map_err(TransportError::from_io)
    }
}

impl<P: LineDevice> Transport for SerialTransport<P> {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn pacing(&self) -> Pacing {
        Pacing::SelfPaced
    }

    fn begin(&mut self, interval: SampleInterval) -> Result<(), TransportError> {
        self.discard_input()?;
        let command = interval.device_command();
        self.send(command.as_bytes())?;

        // The device answers the interval command with one line; skipping it
        // would shift every later sample by one line.
        let deadline = Instant::now() + self.handshake_timeout;
        loop {
            match self.read_line() {
                Ok(ack) => {
                    log::debug!(
                        "{} acknowledged {command}: {}",
                        self.name,
                        String::from_utf8_lossy(&ack).trim()
                    );
                    break;
                }
                Err(TransportError::Timeout) if Instant::now() < deadline => continue,
                Err(TransportError::Timeout) => {
                    return Err(TransportError::Handshake(format!(
                        "{} did not acknowledge {command}",
                        self.name
                    )))
                }
                Err(e) => return Err(e),
            }
        }
        self.send(RUN_COMMAND)
    }

    fn read_sample(&mut self) -> Result<f64, TransportError> {
        let line = self.read_line()?;
        Ok(parse_integer(&line)?)
    }

    fn end(&mut self) -> Result<(), TransportError> {
        self.send(STOP_COMMAND)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        log::info!("closing {}", self.name);
        self.pending.clear();
        Ok(())
    }
}
