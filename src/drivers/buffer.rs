use std::sync::Arc;

use parking_lot::Mutex;

use crate::drivers::ConfigError;

/// Buffer handle shared between the acquisition worker and the display path.
pub type SharedBuffer = Arc<Mutex<RingBuffer>>;

/// What a push did to the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Still filling.
    Appended,
    /// This push made `count == capacity`.
    Filled,
    /// Already full: the oldest sample was evicted.
    Shifted,
}

/// Fixed-length trailing window of samples.
///
/// Every push shifts the slots left by one and writes the new value into the
/// last slot, so the most recent sample is always at the tail and the unfilled
/// zero slots sit at the head. `count` tracks how many slots hold samples.
#[derive(Clone, Debug)]
pub struct RingBuffer {
    slots: Vec<f64>,
    count: usize,
}

impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(Self {
            slots: vec![0.0; capacity],
            count: 0,
        })
    }

    /// Rebuilds a full buffer from persisted values.
    pub fn from_samples(samples: Vec<f64>) -> Result<Self, ConfigError> {
        if samples.is_empty() {
            return Err(ConfigError::InvalidCapacity);
        }
        let count = samples.len();
        Ok(Self {
            slots: samples,
            count,
        })
    }

    pub fn shared(self) -> SharedBuffer {
        Arc::new(Mutex::new(self))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    pub fn push(&mut self, value: f64) -> PushOutcome {
        let capacity = self.slots.len();
        self.slots.rotate_left(1);
        self.slots[capacity - 1] = value;
        if self.count == capacity {
            return PushOutcome::Shifted;
        }
        self.count += 1;
        if self.count == capacity {
            PushOutcome::Filled
        } else {
            PushOutcome::Appended
        }
    }

    pub fn fill_ratio(&self) -> f64 {
        self.count as f64 / self.slots.len() as f64
    }

    /// Copy of every slot, unfilled ones included.
    pub fn snapshot(&self) -> Vec<f64> {
        self.slots.clone()
    }

    /// Copy of the trailing slots that hold acquired values.
    pub fn filled(&self) -> Vec<f64> {
        self.slots[self.slots.len() - self.count..].to_vec()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = 0.0);
        self.count = 0;
    }

    /// Reallocates storage; existing content is lost.
    pub fn resize(&mut self, capacity: usize) -> Result<(), ConfigError> {
        *self = Self::with_capacity(capacity)?;
        Ok(())
    }
}
