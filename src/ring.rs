//! Fixed-capacity ring of recent samples with aggregate queries.
//!
//! Used for tracking data of the last N frames: the scheduler predicts the
//! next frame's delta time from the average of recent ones, and the debug
//! accounting keeps rolling windows of overtime metrics.

/// Ring buffer that keeps the most recent `capacity` samples.
///
/// Pushing beyond capacity overwrites the oldest sample. Aggregate queries
/// are provided for the numeric sample types the scheduler records.
#[derive(Debug, Clone)]
pub struct SampleRing<T> {
    storage: Vec<T>,
    capacity: usize,
    write_index: usize,
}

impl<T> SampleRing<T> {
    /// Create an empty ring holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SampleRing capacity must be at least 1");
        Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
        }
    }

    /// Record a sample, evicting the oldest one if the ring is full.
    pub fn push(&mut self, sample: T) {
        if self.storage.len() < self.capacity {
            self.storage.push(sample);
        } else {
            self.storage[self.write_index] = sample;
        }
        self.write_index = (self.write_index + 1) % self.capacity;
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed sample.
    pub fn last(&self) -> Option<&T> {
        if self.storage.is_empty() {
            return None;
        }
        let len = self.storage.len();
        Some(&self.storage[(self.write_index + len - 1) % len])
    }

    /// Oldest sample still in the ring.
    pub fn oldest(&self) -> Option<&T> {
        if self.storage.is_empty() {
            return None;
        }
        if self.storage.len() < self.capacity {
            Some(&self.storage[0])
        } else {
            Some(&self.storage[self.write_index])
        }
    }

    /// Iterate samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.storage.len() < self.capacity {
            0
        } else {
            self.write_index
        };
        self.storage[split..].iter().chain(self.storage[..split].iter())
    }
}

impl SampleRing<f64> {
    pub fn sum(&self) -> f64 {
        self.storage.iter().sum()
    }

    /// Mean of the held samples, or zero for an empty ring.
    pub fn average(&self) -> f64 {
        if self.storage.is_empty() {
            0.0
        } else {
            self.sum() / self.storage.len() as f64
        }
    }

    pub fn max(&self) -> f64 {
        self.storage.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.storage.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

impl SampleRing<usize> {
    pub fn sum(&self) -> usize {
        self.storage.iter().sum()
    }

    /// Mean of the held samples, or zero for an empty ring.
    pub fn average(&self) -> f64 {
        if self.storage.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.storage.len() as f64
        }
    }

    pub fn max(&self) -> usize {
        self.storage.iter().copied().max().unwrap_or(0)
    }
}
