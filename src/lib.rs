//! # datalogger
//!
//! Acquisition core of a scrolling data logger. Samples come from a
//! microcontroller on a serial line or from a TCP sample server, are scaled,
//! kept in a fixed-length trailing window and can be saved as `.lfd` files
//! with an optional `.csv` export.
//!
//! ```no_run
//! use std::sync::mpsc;
//! use datalogger::config::{NetworkSettings, SessionConfig, TransportConfig};
//! use datalogger::engine::SessionController;
//!
//! # fn main() -> Result<(), datalogger::drivers::SessionError> {
//! let (tx, rx) = mpsc::channel();
//! let mut session = SessionController::new(SessionConfig::default(), tx)?;
//! session.configure_transport(TransportConfig::Network(NetworkSettings::default()))?;
//! session.connect()?;
//! session.start_acquisition(true)?;
//! loop {
//!     session.poll();
//!     for event in rx.try_iter() {
//!         println!("{event:?}");
//!     }
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod drivers;
pub mod engine;
pub mod gui;
pub mod recorder;
pub mod types;

pub use config::{ConfigStore, SessionConfig, TransportConfig};
pub use engine::SessionController;
pub use recorder::PersistedDataset;
pub use types::{SessionEvent, SessionState, StopReason};
