//! Fixed-capacity rolling window over one scalar channel.
//!
//! Vector channels enter as magnitudes. Statistics use population variance
//! and are recomputed over the current contents on demand. Capacities stay
//! small (tens of samples).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Smallest window the engine will run with.
pub const MIN_CAPACITY: usize = 4;

/// Largest window a configuration may ask for.
pub const MAX_CAPACITY: usize = 1 << 16;

/// Capacity for a sample-rate hint and window length:
/// `round(rate * seconds)` clamped to `[MIN_CAPACITY, MAX_CAPACITY]`.
pub fn capacity_for(sample_rate_hint: u32, window_seconds: f32) -> usize {
    let raw = (sample_rate_hint as f64 * window_seconds as f64).round();
    if raw.is_nan() || raw <= 0.0 {
        MIN_CAPACITY
    } else if raw >= MAX_CAPACITY as f64 {
        MAX_CAPACITY
    } else {
        (raw as usize).max(MIN_CAPACITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean: f32,
    pub std: f32,
    pub peak_to_peak: f32,
    pub rms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowBuffer {
    values: VecDeque<f32>,
    capacity: usize,
}

impl WindowBuffer {
    /// Capacities below 4 are raised to 4.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one value, evicting the oldest when full.
    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    /// Mean, population std, peak-to-peak and RMS. All zero when empty.
    pub fn stats(&self) -> WindowStats {
        let n = self.values.len();
        if n == 0 {
            return WindowStats::default();
        }
        let count = n as f64;

        // f64 accumulation keeps a constant window exact: n copies of an f32
        // sum without rounding, so the mean comes back as the value itself.
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut min_v = f32::MAX;
        let mut max_v = f32::MIN;
        for &v in &self.values {
            sum += v as f64;
            sum_sq += (v as f64) * (v as f64);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let mean = sum / count;
        let var = self
            .values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / count;

        WindowStats {
            mean: mean as f32,
            std: var.sqrt() as f32,
            peak_to_peak: max_v - min_v,
            rms: (sum_sq / count).sqrt() as f32,
        }
    }
}
