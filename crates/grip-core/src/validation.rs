//! Input validation layer for sensor batches.

use serde::{Deserialize, Serialize};

use crate::domain::SampleBatch;
use crate::error::SensorError;

/// Magnitudes of a batch that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidReading {
    pub magnetic: f32,
    pub accel: Option<f32>,
    /// Contact radius, `None` without contact.
    pub touch: Option<f32>,
}

fn check_vector(channel: &'static str, v: [f32; 3]) -> Result<f32, SensorError> {
    if v.iter().any(|c| !c.is_finite()) {
        return Err(SensorError::NotFinite { channel });
    }
    let mag = crate::domain::magnitude(v);
    if !mag.is_finite() {
        return Err(SensorError::NotFinite { channel });
    }
    if mag <= 0.0 {
        return Err(SensorError::NonPositiveMagnitude { channel, value: mag });
    }
    Ok(mag)
}

/// Validate a batch before it touches any engine state.
pub fn validate_batch(batch: &SampleBatch) -> Result<ValidReading, SensorError> {
    let magnetic = check_vector("magnetic", batch.magnetic.ok_or(SensorError::MissingMagnetic)?)?;
    let accel = batch.accel.map(|a| check_vector("accel", a)).transpose()?;
    let touch = match batch.touch_radius {
        None => None,
        Some(r) if r.is_nan() || r.is_infinite() => {
            return Err(SensorError::NotFinite { channel: "touch" })
        }
        Some(r) if r < 0.0 => return Err(SensorError::NegativeTouchRadius(r)),
        Some(r) if r == 0.0 => None,
        Some(r) => Some(r),
    };
    Ok(ValidReading {
        magnetic,
        accel,
        touch,
    })
}

/// Trips after a run of consecutive invalid magnetic readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnetometerWatch {
    consecutive_failures: u32,
    last_failure_ms: Option<u64>,
    threshold: u32,
}

impl MagnetometerWatch {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            last_failure_ms: None,
            threshold: threshold.max(1),
        }
    }

    pub fn trip(&mut self, now_ms: u64) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_ms = Some(now_ms);
        if self.consecutive_failures == self.threshold {
            log::warn!(
                "magnetometer looks dead: {} invalid readings in a row",
                self.consecutive_failures
            );
        }
    }

    pub fn looks_dead(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    pub fn last_failure_ms(&self) -> Option<u64> {
        self.last_failure_ms
    }

    /// A valid reading re-arms the watch.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure_ms = None;
    }
}
