use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::config::NetworkSettings;
use crate::drivers::source::{parse_decimal, Pacing, Transport};
use crate::drivers::{ConnectionError, SampleInterval, TransportError};

const REQUEST: &[u8] = b"send";
const GOODBYE: &[u8] = b"close";
const MAX_PAYLOAD: usize = 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Byte stream to a sample server.
pub trait PeerStream: Read + Write + Send {
    /// Releases the stream once the goodbye has been written.
    fn release(&mut self) {}
}

impl PeerStream for TcpStream {
    fn release(&mut self) {
        if let Err(e) = self.shutdown(Shutdown::Both) {
            log::debug!("socket shutdown failed: {e}");
        }
    }
}

/// Request/response sample server over TCP.
///
/// Each sample costs one `send` request answered by a decimal text payload.
/// The server has no run state, so the host paces the requests.
pub struct NetworkTransport<S: PeerStream> {
    peer: String,
    stream: S,
    scratch: Vec<u8>,
    closed: bool,
}

impl NetworkTransport<TcpStream> {
    pub fn connect(settings: &NetworkSettings) -> Result<Self, ConnectionError> {
        let ip = settings
            .ip()
            .map_err(|_| ConnectionError::InvalidAddress(settings.host.clone()))?;
        if settings.port == 0 {
            return Err(ConnectionError::InvalidAddress(format!(
                "{}:{}",
                settings.host, settings.port
            )));
        }
        let addr = SocketAddr::new(ip, settings.port);
        let refused = |e: std::io::Error| ConnectionError::Refused {
            addr: addr.to_string(),
            reason: e.to_string(),
        };
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(refused)?;
        stream
            .set_read_timeout(Some(settings.read_timeout()))
            .map_err(refused)?;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("TCP_NODELAY unavailable for {addr}: {e}");
        }
        log::info!("connected to sample server at {addr}");
        Ok(Self::from_stream(addr.to_string(), stream))
    }
}

impl<S: PeerStream> NetworkTransport<S> {
    pub fn from_stream(peer: impl Into<String>, stream: S) -> Self {
        Self {
            peer: peer.into(),
            stream,
            scratch: vec![0; MAX_PAYLOAD],
            closed: false,
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(bytes)
            .and_then(|_| self.stream.flush())
            .map_err(TransportError::from_io)
    }
}

impl<S: PeerStream> Transport for NetworkTransport<S> {
    fn describe(&self) -> String {
        self.peer.clone()
    }

    fn pacing(&self) -> Pacing {
        Pacing::Polled
    }

    fn begin(&mut self, interval: SampleInterval) -> Result<(), TransportError> {
        log::debug!("polling {} every {interval}", self.peer);
        Ok(())
    }

    fn read_sample(&mut self) -> Result<f64, TransportError> {
        self.send(REQUEST)?;
        let n = self
            .stream
            .read(&mut self.scratch)
            .map_err(TransportError::from_io)?;
        // a zero-length reply is an empty payload, not a hangup; the next
        // request surfaces a dead peer as a write error
        Ok(parse_decimal(&self.scratch[..n])?)
    }

    fn end(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::info!("closing connection to {}", self.peer);
        let goodbye = self.send(GOODBYE);
        self.stream.release();
        goodbye
    }
}
