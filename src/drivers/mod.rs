// src/drivers/mod.rs
// acquisition building blocks: transports, worker, buffer, sample math
pub mod buffer;
pub mod error;
pub mod filter;
pub mod network;
pub mod pacer;
pub mod sample;
pub mod serial;
pub mod source;
pub mod stats;
pub mod worker;

pub use buffer::{PushOutcome, RingBuffer, SharedBuffer};
pub use error::{
    ConfigError, ConnectionError, FormatError, ParseError, SessionError, TransportError,
};
pub use filter::SampleFilter;
pub use network::NetworkTransport;
pub use pacer::Pacer;
pub use sample::{format_remaining, remaining_time, IntervalUnit, Sample, SampleInterval};
pub use serial::{available_ports, SerialTransport};
pub use source::{Pacing, Scripted, ScriptedTransport, Transport};
pub use stats::Statistics;
pub use worker::{AcquisitionWorker, WorkerEvent};
