use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::drivers::buffer::{PushOutcome, SharedBuffer};
use crate::drivers::pacer::Pacer;
use crate::drivers::source::{Pacing, Transport};
use crate::drivers::{SampleFilter, SampleInterval, TransportError};

// upper bound on how long a pacer wait ignores the stop flag
const STOP_POLL: Duration = Duration::from_millis(20);

/// Worker -> controller notifications, in production order.
#[derive(Debug)]
pub enum WorkerEvent {
    SampleReady {
        index: u64,
        value: f64,
        count: usize,
        capacity: usize,
    },
    /// The push that made the buffer full. The worker exits right after.
    BufferFull,
    /// Fatal transport failure. The worker exits right after.
    Error(TransportError),
}

/// Background loop draining one transport into the shared buffer.
///
/// The worker owns the transport for the duration of the run and hands it
/// back when joined.
pub struct AcquisitionWorker {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<Box<dyn Transport>>>,
}

impl AcquisitionWorker {
    pub fn spawn(
        transport: Box<dyn Transport>,
        buffer: SharedBuffer,
        filter: SampleFilter,
        interval: SampleInterval,
        first_index: u64,
        events: Sender<WorkerEvent>,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || {
                run(
                    transport,
                    &flag,
                    &buffer,
                    filter,
                    interval,
                    first_index,
                    &events,
                )
            })?;
        Ok(Self {
            stop_flag: stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Signals the loop and joins it. Blocks for at most one transport read
    /// timeout. Returns the transport on the first call only.
    pub fn stop(&mut self) -> Option<Box<dyn Transport>> {
        self.stop_flag.store(true, Ordering::Release);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(transport) => Some(transport),
            Err(_) => {
                log::error!(
                    "acquisition worker panicked, its connection was dropped without a goodbye"
                );
                None
            }
        }
    }

    /// Like `stop`, but gives up after `grace` and leaves the thread to
    /// finish on its own.
    pub fn shutdown(&mut self, grace: Duration) -> Option<Box<dyn Transport>> {
        self.stop_flag.store(true, Ordering::Release);
        let handle = self.handle.as_ref()?;
        let deadline = Instant::now() + grace;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                log::warn!(
                    "acquisition worker still blocked after {grace:?}, detaching; \
                     its connection will be dropped without a goodbye"
                );
                self.handle = None;
                return None;
            }
            thread::sleep(STOP_POLL.min(grace));
        }
        self.stop()
    }
}

impl Drop for AcquisitionWorker {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
    }
}

fn run(
    mut transport: Box<dyn Transport>,
    stop: &AtomicBool,
    buffer: &SharedBuffer,
    filter: SampleFilter,
    interval: SampleInterval,
    first_index: u64,
    events: &Sender<WorkerEvent>,
) -> Box<dyn Transport> {
    let polled = transport.pacing() == Pacing::Polled;
    let step = interval.as_duration();
    // armed here, so the first request also waits one interval
    let mut pacer = Pacer::new(step);
    let mut index = first_index;
    log::debug!("acquisition loop started on {}", transport.describe());

    while !stop.load(Ordering::Acquire) {
        if polled {
            if !wait_for_pacer(&pacer, stop) {
                break;
            }
            pacer.start(step);
        }

        match transport.read_sample() {
            Ok(raw) => {
                let value = filter.apply(raw);
                let (outcome, count, capacity) = {
                    let mut buf = buffer.lock();
                    let outcome = buf.push(value);
                    (outcome, buf.count(), buf.capacity())
                };
                let _ = events.send(WorkerEvent::SampleReady {
                    index,
                    value,
                    count,
                    capacity,
                });
                index += 1;
                if outcome == PushOutcome::Filled {
                    let _ = events.send(WorkerEvent::BufferFull);
                    break;
                }
            }
            Err(e) if e.is_recoverable() => {
                if !matches!(e, TransportError::Timeout) {
                    log::debug!("dropped sample: {e}");
                }
            }
            Err(e) => {
                log::error!("{} failed: {e}", transport.describe());
                let _ = events.send(WorkerEvent::Error(e));
                break;
            }
        }
    }

    log::debug!("acquisition loop exited after {} samples", index - first_index);
    transport
}

/// Sleeps until the pacer elapses. Returns false if asked to stop first.
fn wait_for_pacer(pacer: &Pacer, stop: &AtomicBool) -> bool {
    while !pacer.is_elapsed() {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        thread::sleep(pacer.remaining().min(STOP_POLL));
    }
    !stop.load(Ordering::Acquire)
}
