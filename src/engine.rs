// src/engine.rs
//! Session controller: owns the connection, the shared buffer and at most one
//! acquisition worker, and reports everything the UI needs as `SessionEvent`s.
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{validate_range, SessionConfig, TransportConfig};
use crate::drivers::{
    remaining_time, source, AcquisitionWorker, ConnectionError, RingBuffer,
    SampleFilter, SampleInterval, SessionError, SharedBuffer, Statistics, Transport,
    TransportError, WorkerEvent,
};
use crate::recorder::PersistedDataset;
use crate::types::{SessionEvent, SessionState, StopReason};

/// How long `Drop` waits for a blocked worker before detaching it.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Opens a transport for a configuration. Swappable for tests and playback.
pub type Connector =
    Box<dyn FnMut(&TransportConfig) -> Result<Box<dyn Transport>, ConnectionError> + Send>;

pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    events: Sender<SessionEvent>,
    connector: Connector,
    buffer: SharedBuffer,
    // present while connected and no run is active
    transport: Option<Box<dyn Transport>>,
    worker: Option<AcquisitionWorker>,
    worker_events: Option<Receiver<WorkerEvent>>,
    next_index: u64,
}

impl SessionController {
    pub fn new(config: SessionConfig, events: Sender<SessionEvent>) -> Result<Self, SessionError> {
        Self::with_connector(config, events, Box::new(source::open))
    }

    pub fn with_connector(
        config: SessionConfig,
        events: Sender<SessionEvent>,
        connector: Connector,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let buffer = RingBuffer::with_capacity(config.buffer_capacity)?.shared();
        Ok(Self {
            config,
            state: SessionState::Idle,
            events,
            connector,
            buffer,
            transport: None,
            worker: None,
            worker_events: None,
            next_index: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ---- configuration ----

    /// Selects the transport used by the next `connect`.
    pub fn configure_transport(&mut self, transport: TransportConfig) -> Result<(), SessionError> {
        if self.state.is_connected() {
            return Err(self.invalid("reconfigure the transport"));
        }
        transport.validate()?;
        self.config.transport = transport;
        Ok(())
    }

    /// Takes effect on the next run.
    pub fn set_interval(&mut self, interval: SampleInterval) -> Result<(), SessionError> {
        self.ensure_not_acquiring("change the sample interval")?;
        interval.validate()?;
        self.config.interval = interval;
        Ok(())
    }

    /// Reallocates the buffer; its content is lost.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), SessionError> {
        self.ensure_not_acquiring("resize the buffer")?;
        self.buffer.lock().resize(capacity)?;
        self.config.buffer_capacity = capacity;
        self.publish_fill();
        Ok(())
    }

    pub fn set_filter(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.ensure_not_acquiring("change the filter")?;
        self.config.use_filter = enabled;
        Ok(())
    }

    pub fn set_display_range(&mut self, min: f64, max: f64) -> Result<(), SessionError> {
        validate_range(min, max)?;
        self.config.display_min = min;
        self.config.display_max = max;
        Ok(())
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.config.title = title.into();
    }

    // ---- connection ----

    pub fn connect(&mut self) -> Result<(), SessionError> {
        if self.state.is_connected() {
            return Err(self.invalid("connect"));
        }
        self.config.transport.validate()?;
        let previous = self.state;
        self.set_state(SessionState::Connecting);
        match (self.connector)(&self.config.transport) {
            Ok(transport) => {
                log::info!("connected to {}", transport.describe());
                self.transport = Some(transport);
                self.set_state(SessionState::Connected);
                Ok(())
            }
            Err(e) => {
                log::warn!("connect failed: {e}");
                self.emit(SessionEvent::Error(e.to_string()));
                self.set_state(previous);
                Err(e.into())
            }
        }
    }

    /// Closes the connection. Refused while a run is active.
    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        if self.state.is_acquiring() {
            return Err(self.invalid("disconnect"));
        }
        if let Some(transport) = self.transport.take() {
            close_transport(transport);
            self.set_state(SessionState::Disconnected);
        }
        Ok(())
    }

    // ---- acquisition ----

    /// Starts a run, optionally zeroing the buffer first. A second start
    /// while a run is active is ignored.
    pub fn start_acquisition(&mut self, clear: bool) -> Result<(), SessionError> {
        if self.state.is_acquiring() {
            log::debug!("start ignored: already acquiring");
            return Ok(());
        }
        if self.state != SessionState::Connected {
            return Err(self.invalid("start acquisition"));
        }
        let Some(mut transport) = self.transport.take() else {
            return Err(self.invalid("start acquisition"));
        };

        if clear {
            self.buffer.lock().clear();
            self.publish_fill();
        }
        let interval = self.config.interval;
        if let Err(e) = transport.begin(interval) {
            log::error!("start handshake with {} failed: {e}", transport.describe());
            close_transport(transport);
            self.emit(SessionEvent::Error(e.to_string()));
            self.set_state(SessionState::Disconnected);
            return Err(e.into());
        }

        let (tx, rx) = mpsc::channel();
        let spawned = AcquisitionWorker::spawn(
            transport,
            Arc::clone(&self.buffer),
            SampleFilter::from_enabled(self.config.use_filter),
            interval,
            self.next_index,
            tx,
        );
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                // the transport went down with the thread closure
                log::error!(
                    "acquisition worker did not start ({e}), connection dropped without a goodbye"
                );
                self.emit(SessionEvent::Error(e.to_string()));
                self.set_state(SessionState::Disconnected);
                return Err(SessionError::WorkerSpawn(e));
            }
        };
        self.worker = Some(worker);
        self.worker_events = Some(rx);
        log::info!("acquisition started every {interval}");
        self.set_state(SessionState::Acquiring);
        Ok(())
    }

    /// Ends the active run and keeps the connection. No-op when idle.
    pub fn stop_acquisition(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Acquiring => {
                self.end_run(StopReason::User, None);
                Ok(())
            }
            SessionState::Connected => Ok(()),
            _ => Err(self.invalid("stop acquisition")),
        }
    }

    /// Forwards worker events. Call regularly from the UI thread; returns the
    /// number of worker events handled.
    pub fn poll(&mut self) -> usize {
        let pending: Vec<WorkerEvent> = match &self.worker_events {
            Some(rx) => rx.try_iter().collect(),
            None => return 0,
        };
        let handled = pending.len();
        for event in pending {
            match event {
                WorkerEvent::SampleReady {
                    index,
                    value,
                    count,
                    capacity,
                } => self.publish_sample(index, value, count, capacity),
                WorkerEvent::BufferFull => {
                    self.set_state(SessionState::Full);
                    self.end_run(StopReason::BufferFull, None);
                    break;
                }
                WorkerEvent::Error(e) => {
                    self.fail_run(e);
                    break;
                }
            }
        }
        handled
    }

    /// Stops any run, closes the connection and leaves the session
    /// disconnected. A worker still blocked after `grace` is detached.
    pub fn shutdown(&mut self, grace: Duration) {
        if self.worker.is_some() {
            self.end_run(StopReason::Shutdown, Some(grace));
        }
        if let Some(transport) = self.transport.take() {
            close_transport(transport);
            self.set_state(SessionState::Disconnected);
        }
    }

    // ---- buffer ----

    /// Zeroes the buffer. While acquiring the caller must confirm with `force`.
    pub fn clear_buffer(&mut self, force: bool) -> Result<(), SessionError> {
        if self.state.is_acquiring() && !force {
            return Err(self.invalid("clear the buffer"));
        }
        self.buffer.lock().clear();
        self.publish_fill();
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<f64> {
        self.buffer.lock().snapshot()
    }

    pub fn fill_ratio(&self) -> f64 {
        self.buffer.lock().fill_ratio()
    }

    pub fn remaining_time(&self) -> Duration {
        let buf = self.buffer.lock();
        remaining_time(buf.capacity(), buf.count(), self.config.interval)
    }

    /// Statistics over the acquired samples, `None` on an empty buffer.
    pub fn statistics(&self) -> Option<Statistics> {
        let filled = self.buffer.lock().filled();
        Statistics::from_samples(&filled)
    }

    // ---- persistence ----

    /// Saves a snapshot; a running acquisition keeps going.
    pub fn save_dataset(&self, path: &Path, export_csv: bool) -> Result<PathBuf, SessionError> {
        let dataset = PersistedDataset {
            title: self.config.title.clone(),
            interval: self.config.interval,
            display_min: self.config.display_min,
            display_max: self.config.display_max,
            samples: self.snapshot(),
        };
        Ok(dataset.save_to_path(path, export_csv)?)
    }

    /// Replaces buffer and display settings with a saved dataset.
    pub fn load_dataset(&mut self, path: &Path) -> Result<(), SessionError> {
        self.ensure_not_acquiring("load a dataset")?;
        let dataset = PersistedDataset::load_from_path(path)?;
        let capacity = dataset.capacity();
        let restored = RingBuffer::from_samples(dataset.samples)?;
        *self.buffer.lock() = restored;
        self.config.title = dataset.title;
        self.config.interval = dataset.interval;
        self.config.display_min = dataset.display_min;
        self.config.display_max = dataset.display_max;
        self.config.buffer_capacity = capacity;
        self.publish_fill();
        Ok(())
    }

    // ---- internals ----

    /// Joins the worker, forwards what it produced last and returns to
    /// `Connected`. Shared by user stop, buffer-full and shutdown.
    fn end_run(&mut self, reason: StopReason, grace: Option<Duration>) {
        let transport = match (self.worker.take(), grace) {
            (Some(mut worker), Some(grace)) => worker.shutdown(grace),
            (Some(mut worker), None) => worker.stop(),
            (None, _) => None,
        };
        let mut fatal = None;
        if let Some(rx) = self.worker_events.take() {
            for event in rx.try_iter() {
                match event {
                    WorkerEvent::SampleReady {
                        index,
                        value,
                        count,
                        capacity,
                    } => self.publish_sample(index, value, count, capacity),
                    WorkerEvent::BufferFull => {}
                    WorkerEvent::Error(e) => fatal = Some(e),
                }
            }
        }
        self.emit(SessionEvent::AcquisitionStopped(reason));
        log::info!("acquisition stopped ({reason:?})");

        let Some(mut transport) = transport else {
            self.emit(SessionEvent::Error(
                "acquisition worker did not release the connection".into(),
            ));
            self.set_state(SessionState::Disconnected);
            return;
        };
        let result = match fatal {
            Some(e) => Err(e),
            None => transport.end(),
        };
        match result {
            Ok(()) => {
                self.transport = Some(transport);
                self.set_state(SessionState::Connected);
            }
            Err(e) => {
                close_transport(transport);
                self.lose_connection(e);
            }
        }
    }

    fn fail_run(&mut self, err: TransportError) {
        if let Some(transport) = self.worker.take().and_then(|mut w| w.stop()) {
            close_transport(transport);
        }
        self.worker_events = None;
        self.lose_connection(err);
    }

    fn lose_connection(&mut self, err: TransportError) {
        log::error!("connection lost: {err}");
        self.emit(SessionEvent::Error(err.to_string()));
        self.set_state(SessionState::Disconnected);
    }

    fn publish_sample(&mut self, index: u64, value: f64, count: usize, capacity: usize) {
        self.next_index = index + 1;
        self.emit(SessionEvent::SampleReady { index, value });
        self.emit(SessionEvent::FillRatio(count as f64 / capacity as f64));
        self.emit(SessionEvent::RemainingTime(remaining_time(
            capacity,
            count,
            self.config.interval,
        )));
    }

    fn publish_fill(&self) {
        let (ratio, remaining) = {
            let buf = self.buffer.lock();
            (
                buf.fill_ratio(),
                remaining_time(buf.capacity(), buf.count(), self.config.interval),
            )
        };
        self.emit(SessionEvent::FillRatio(ratio));
        self.emit(SessionEvent::RemainingTime(remaining));
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::debug!("session {} -> {}", self.state, state);
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // a closed receiver just means nobody is listening anymore
        let _ = self.events.send(event);
    }

    fn ensure_not_acquiring(&self, op: &'static str) -> Result<(), SessionError> {
        if self.state.is_acquiring() {
            Err(self.invalid(op))
        } else {
            Ok(())
        }
    }

    fn invalid(&self, op: &'static str) -> SessionError {
        SessionError::InvalidState {
            op,
            state: self.state,
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_GRACE);
    }
}

fn close_transport(mut transport: Box<dyn Transport>) {
    if let Err(e) = transport.close() {
        log::warn!("closing {} failed: {e}", transport.describe());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkSettings;
    use crate::drivers::{ConfigError, IntervalUnit, Scripted, ScriptedTransport};
    use parking_lot::Mutex;
    use std::thread;
    use std::time::Instant;
    use tempfile::tempdir;

    type CommandLog = Arc<Mutex<Vec<String>>>;

    fn config(capacity: usize) -> SessionConfig {
        SessionConfig {
            buffer_capacity: capacity,
            use_filter: false,
            transport: TransportConfig::Network(NetworkSettings::default()),
            ..SessionConfig::default()
        }
    }

    fn one_shot(transport: ScriptedTransport) -> Connector {
        let mut slot = Some(transport);
        Box::new(move |_| {
            slot.take()
                .map(|t| Box::new(t) as Box<dyn Transport>)
                .ok_or_else(|| ConnectionError::Refused {
                    addr: "scripted".into(),
                    reason: "already used".into(),
                })
        })
    }

    fn controller(
        script: ScriptedTransport,
        capacity: usize,
    ) -> (SessionController, Receiver<SessionEvent>, CommandLog) {
        let log = script.command_log();
        let (tx, rx) = mpsc::channel();
        let ctrl = SessionController::with_connector(config(capacity), tx, one_shot(script)).unwrap();
        (ctrl, rx, log)
    }

    fn connected(
        script: ScriptedTransport,
        capacity: usize,
    ) -> (SessionController, Receiver<SessionEvent>, CommandLog) {
        let (mut ctrl, rx, log) = controller(script, capacity);
        ctrl.connect().unwrap();
        (ctrl, rx, log)
    }

    fn pump_until(ctrl: &mut SessionController, done: impl Fn(&SessionController) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !done(ctrl) {
            assert!(Instant::now() < deadline, "timed out in state {}", ctrl.state());
            ctrl.poll();
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn stops(events: &[SessionEvent]) -> Vec<StopReason> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::AcquisitionStopped(reason) => Some(*reason),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn connect_failure_stays_idle() {
        let (tx, rx) = mpsc::channel();
        let mut ctrl = SessionController::with_connector(
            config(10),
            tx,
            Box::new(|_| Err(ConnectionError::InvalidAddress("nowhere".into()))),
        )
        .unwrap();
        assert!(matches!(ctrl.connect(), Err(SessionError::Connection(_))));
        assert_eq!(ctrl.state(), SessionState::Idle);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events[0], SessionEvent::StateChanged(SessionState::Connecting));
        assert!(matches!(events[1], SessionEvent::Error(_)));
        assert_eq!(events[2], SessionEvent::StateChanged(SessionState::Idle));
    }

    #[test]
    fn start_requires_a_connection() {
        let (mut ctrl, _rx, _log) = controller(ScriptedTransport::values([1.0]), 10);
        assert!(matches!(
            ctrl.start_acquisition(false),
            Err(SessionError::InvalidState {
                state: SessionState::Idle,
                ..
            })
        ));
    }

    #[test]
    fn second_start_is_ignored() {
        let (mut ctrl, rx, log) = connected(ScriptedTransport::values([1.0, 2.0]), 10);
        ctrl.start_acquisition(true).unwrap();
        ctrl.start_acquisition(true).unwrap();
        assert_eq!(ctrl.state(), SessionState::Acquiring);
        ctrl.stop_acquisition().unwrap();
        assert_eq!(ctrl.state(), SessionState::Connected);

        let commands = log.lock().clone();
        assert_eq!(commands, vec!["begin:1s".to_owned(), "end".to_owned()]);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(stops(&events), vec![StopReason::User]);
    }

    #[test]
    fn disconnect_is_refused_while_acquiring() {
        let (mut ctrl, _rx, log) = connected(ScriptedTransport::values(Vec::new()), 10);
        ctrl.start_acquisition(false).unwrap();
        let err = ctrl.disconnect().unwrap_err();
        assert_eq!(err.to_string(), "cannot disconnect while acquiring");
        assert_eq!(ctrl.state(), SessionState::Acquiring);

        ctrl.stop_acquisition().unwrap();
        ctrl.disconnect().unwrap();
        assert_eq!(ctrl.state(), SessionState::Disconnected);
        assert_eq!(log.lock().last().map(String::as_str), Some("close"));
    }

    #[test]
    fn full_buffer_stops_the_run_once() {
        let (mut ctrl, rx, log) =
            connected(ScriptedTransport::values([1.0, 2.0, 3.0, 4.0, 5.0]), 3);
        ctrl.start_acquisition(true).unwrap();
        pump_until(&mut ctrl, |c| c.state() == SessionState::Connected);

        assert_eq!(ctrl.snapshot(), vec![1.0, 2.0, 3.0]);
        assert_eq!(ctrl.fill_ratio(), 1.0);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(stops(&events), vec![StopReason::BufferFull]);
        assert!(events.contains(&SessionEvent::StateChanged(SessionState::Full)));

        // a late user stop changes nothing
        ctrl.stop_acquisition().unwrap();
        let ends = log.lock().iter().filter(|c| *c == "end").count();
        assert_eq!(ends, 1);
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn restarting_a_full_buffer_without_clearing_scrolls() {
        let (mut ctrl, _rx, _log) = connected(ScriptedTransport::values([1.0, 2.0, 3.0]), 2);
        ctrl.start_acquisition(true).unwrap();
        pump_until(&mut ctrl, |c| c.state() == SessionState::Connected);
        assert_eq!(ctrl.snapshot(), vec![1.0, 2.0]);

        ctrl.start_acquisition(false).unwrap();
        pump_until(&mut ctrl, |c| c.snapshot() == vec![2.0, 3.0]);
        ctrl.stop_acquisition().unwrap();
    }

    #[test]
    fn sample_events_carry_fill_and_remaining_time() {
        let (mut ctrl, rx, _log) = connected(ScriptedTransport::values([0.5]), 4);
        ctrl.start_acquisition(true).unwrap();
        pump_until(&mut ctrl, |c| c.fill_ratio() > 0.0);
        ctrl.stop_acquisition().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        let at = events
            .iter()
            .position(|e| *e == SessionEvent::SampleReady { index: 0, value: 0.5 })
            .unwrap();
        assert_eq!(events[at + 1], SessionEvent::FillRatio(0.25));
        assert_eq!(
            events[at + 2],
            SessionEvent::RemainingTime(Duration::from_secs(3))
        );
        assert_eq!(ctrl.statistics().unwrap().mean, 0.5);
    }

    #[test]
    fn transport_failure_disconnects() {
        let script = ScriptedTransport::new(vec![Scripted::Value(1.0), Scripted::Disconnect]);
        let (mut ctrl, rx, log) = connected(script, 10);
        ctrl.start_acquisition(true).unwrap();
        pump_until(&mut ctrl, |c| c.state() == SessionState::Disconnected);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Error(_))));
        assert!(stops(&events).is_empty());
        assert_eq!(log.lock().last().map(String::as_str), Some("close"));
        assert!(matches!(
            ctrl.start_acquisition(false),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn rejected_settings_keep_the_previous_ones() {
        let (mut ctrl, _rx, _log) = controller(ScriptedTransport::values(Vec::new()), 10);
        assert!(matches!(
            ctrl.set_capacity(0),
            Err(SessionError::Config(ConfigError::InvalidCapacity))
        ));
        assert_eq!(ctrl.config().buffer_capacity, 10);
        assert_eq!(ctrl.snapshot().len(), 10);

        let bad = SampleInterval {
            magnitude: 0,
            unit: IntervalUnit::Seconds,
        };
        assert!(ctrl.set_interval(bad).is_err());
        assert_eq!(ctrl.config().interval, SampleInterval::default());

        let before = ctrl.config().transport.clone();
        let bad_host = TransportConfig::Network(NetworkSettings {
            host: "999.0.0.1".into(),
            ..NetworkSettings::default()
        });
        assert!(ctrl.configure_transport(bad_host).is_err());
        assert_eq!(ctrl.config().transport, before);

        assert!(ctrl.set_display_range(3.0, 1.0).is_err());
        assert_eq!(ctrl.config().display_max, 6.0);
    }

    #[test]
    fn buffer_settings_are_locked_while_acquiring() {
        let (mut ctrl, _rx, _log) = connected(ScriptedTransport::values(Vec::new()), 10);
        ctrl.start_acquisition(false).unwrap();
        assert!(matches!(
            ctrl.set_capacity(20),
            Err(SessionError::InvalidState { .. })
        ));
        assert!(ctrl.set_filter(true).is_err());
        assert!(ctrl.clear_buffer(false).is_err());
        assert!(ctrl.clear_buffer(true).is_ok());
        ctrl.stop_acquisition().unwrap();
        ctrl.set_capacity(20).unwrap();
        assert_eq!(ctrl.snapshot(), vec![0.0; 20]);
    }

    #[test]
    fn save_then_load_restores_the_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bench");
        let (mut ctrl, _rx, _log) = connected(ScriptedTransport::values([1.0, 2.0, 3.0]), 3);
        ctrl.set_title("Bench");
        ctrl.start_acquisition(true).unwrap();
        pump_until(&mut ctrl, |c| c.state() == SessionState::Connected);
        let saved = ctrl.save_dataset(&path, true).unwrap();
        assert!(dir.path().join("bench.csv").exists());

        let (mut other, _rx2, _log2) = controller(ScriptedTransport::values(Vec::new()), 50);
        other.load_dataset(&saved).unwrap();
        assert_eq!(other.snapshot(), vec![1.0, 2.0, 3.0]);
        assert_eq!(other.fill_ratio(), 1.0);
        assert_eq!(other.config().title, "Bench");
        assert_eq!(other.config().buffer_capacity, 3);
    }

    #[test]
    fn load_is_refused_while_acquiring() {
        let dir = tempdir().unwrap();
        let (mut ctrl, _rx, _log) = connected(ScriptedTransport::values(Vec::new()), 4);
        let saved = ctrl.save_dataset(&dir.path().join("empty.lfd"), false).unwrap();
        ctrl.start_acquisition(false).unwrap();
        assert!(matches!(
            ctrl.load_dataset(&saved),
            Err(SessionError::InvalidState { .. })
        ));
        ctrl.stop_acquisition().unwrap();
        assert!(ctrl.load_dataset(&saved).is_ok());
    }

    #[test]
    fn shutdown_stops_the_run_and_closes() {
        let (mut ctrl, rx, log) = connected(ScriptedTransport::values(Vec::new()), 10);
        ctrl.start_acquisition(false).unwrap();
        ctrl.shutdown(Duration::from_secs(1));
        assert_eq!(ctrl.state(), SessionState::Disconnected);
        assert_eq!(*log.lock(), vec!["begin:1s", "end", "close"]);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(stops(&events), vec![StopReason::Shutdown]);
        // dropping afterwards is a no-op
        drop(ctrl);
        assert_eq!(log.lock().len(), 3);
    }
}
