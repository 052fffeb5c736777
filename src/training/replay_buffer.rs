use rand::rngs::StdRng;
use rand::seq::index;

use crate::ai::exploration::build_rng;
use crate::error::{ConfigError, ReplayError};

/// Fixed-capacity ring buffer of training records.
///
/// Records are stored by value. Once full, every push overwrites the oldest
/// record.
pub struct ReplayBuffer<T> {
    buffer: Vec<T>,
    capacity: usize,
    position: usize,
    rng: StdRng,
}

impl<T: Clone> ReplayBuffer<T> {
    /// Buffer holding at most `capacity` records. A zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_rng(capacity, build_rng(None))
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(capacity, build_rng(Some(seed)))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Validation(
                "replay buffer capacity must be > 0".into(),
            ));
        }
        Ok(ReplayBuffer {
            buffer: Vec::with_capacity(capacity),
            capacity,
            position: 0,
            rng,
        })
    }

    /// Add a record, evicting the oldest when full.
    pub fn push(&mut self, record: T) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(record);
        } else {
            self.buffer[self.position] = record;
        }
        self.position = (self.position + 1) % self.capacity;
    }

    /// Draw `batch_size` distinct records uniformly at random.
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<T>, ReplayError> {
        let available = self.buffer.len();
        if batch_size > available {
            return Err(ReplayError::InsufficientData {
                requested: batch_size,
                available,
            });
        }
        let indices = index::sample(&mut self.rng, available, batch_size);
        Ok(indices.iter().map(|i| self.buffer[i].clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.position = 0;
    }

    /// Records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.buffer.len() < self.capacity {
            0
        } else {
            self.position
        };
        self.buffer[split..].iter().chain(self.buffer[..split].iter())
    }
}
