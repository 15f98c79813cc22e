//! Timed level captures for explicit light/medium/strong calibration.
//!
//! A [`LevelCapture`] rides along the tick path: every Active tick feeds it
//! the tick's channel features, and once its duration has elapsed it produces
//! a [`LevelStats`] that the engine commits to the slot for that label in a
//! single write. Captures for different labels may run side by side; a label
//! has at most one running capture.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::TickOutcome;
use crate::engine::GripEngine;
use crate::error::CaptureError;
use crate::source::SampleSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelLabel {
    Light,
    Medium,
    Strong,
}

impl fmt::Display for LevelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LevelLabel::Light => "light",
            LevelLabel::Medium => "medium",
            LevelLabel::Strong => "strong",
        })
    }
}

/// Features the fuser scores, as seen on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelFeatures {
    /// |low-passed |B| − baseline mean|, µT.
    pub magnetic: f32,
    /// Magnetic window std.
    pub tremor: f32,
    /// Mean touch radius over the contact window; `None` without contact.
    pub touch: Option<f32>,
}

/// Averaged features over a completed capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    pub label: LevelLabel,
    pub samples: u32,
    pub duration_ms: u64,
    pub magnetic: f32,
    pub tremor: f32,
    /// `None` when no tick in the capture had contact.
    pub touch: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureProgress {
    Running { collected: u32 },
    Done(LevelStats),
    Failed(CaptureError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCapture {
    label: LevelLabel,
    duration_ms: u64,
    started_at_ms: Option<u64>,
    count: u32,
    magnetic_sum: f64,
    tremor_sum: f64,
    touch_sum: f64,
    touch_count: u32,
}

impl LevelCapture {
    pub fn new(label: LevelLabel, duration_ms: u64) -> Result<Self, CaptureError> {
        if duration_ms == 0 {
            return Err(CaptureError::ZeroDuration);
        }
        Ok(Self {
            label,
            duration_ms,
            started_at_ms: None,
            count: 0,
            magnetic_sum: 0.0,
            tremor_sum: 0.0,
            touch_sum: 0.0,
            touch_count: 0,
        })
    }

    pub fn label(&self) -> LevelLabel {
        self.label
    }

    /// Feed one tick. The clock starts at the first fed tick; the tick that
    /// reaches the duration closes the capture without being counted.
    pub fn feed(&mut self, now_ms: u64, features: Option<&ChannelFeatures>) -> CaptureProgress {
        let start = *self.started_at_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(start) >= self.duration_ms {
            return self.finish();
        }
        if let Some(f) = features {
            self.count += 1;
            self.magnetic_sum += f.magnetic as f64;
            self.tremor_sum += f.tremor as f64;
            if let Some(t) = f.touch {
                self.touch_sum += t as f64;
                self.touch_count += 1;
            }
        }
        CaptureProgress::Running {
            collected: self.count,
        }
    }

    fn finish(&self) -> CaptureProgress {
        if self.count == 0 {
            return CaptureProgress::Failed(CaptureError::NoSamples(self.label));
        }
        let n = self.count as f64;
        CaptureProgress::Done(LevelStats {
            label: self.label,
            samples: self.count,
            duration_ms: self.duration_ms,
            magnetic: (self.magnetic_sum / n) as f32,
            tremor: (self.tremor_sum / n) as f32,
            touch: (self.touch_count > 0).then(|| (self.touch_sum / self.touch_count as f64) as f32),
        })
    }
}

/// Committed level statistics, one slot per label.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationSlots {
    slots: BTreeMap<LevelLabel, LevelStats>,
}

impl CalibrationSlots {
    pub fn commit(&mut self, stats: LevelStats) {
        log::info!(
            "{} level committed: n={} magnetic={:.3} tremor={:.4} touch={:?}",
            stats.label,
            stats.samples,
            stats.magnetic,
            stats.tremor,
            stats.touch
        );
        self.slots.insert(stats.label, stats);
    }

    pub fn get(&self, label: LevelLabel) -> Option<&LevelStats> {
        self.slots.get(&label)
    }

    /// Light and Strong, when both have been captured.
    pub fn two_point(&self) -> Option<(&LevelStats, &LevelStats)> {
        Some((self.get(LevelLabel::Light)?, self.get(LevelLabel::Strong)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LevelStats> {
        self.slots.values()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Start a capture on `engine` and pull batches from `source` until it commits.
pub fn run_capture(
    engine: &mut GripEngine,
    source: &mut dyn SampleSource,
    label: LevelLabel,
    duration_ms: u64,
) -> Result<LevelStats, CaptureError> {
    engine.capture_level(label, duration_ms)?;
    while let Some(batch) = source.next_batch() {
        let outcome = engine.tick(&batch, batch.timestamp_ms);
        if let TickOutcome::NoData(err) = &outcome {
            log::debug!("capture {label}: skipped batch at {}: {err}", batch.timestamp_ms);
        }
        if let Some(result) = engine.take_capture_result(label) {
            return result;
        }
        if !engine.is_capturing(label) {
            return Err(CaptureError::Cancelled(label));
        }
    }
    engine.cancel_capture(label);
    Err(CaptureError::SourceExhausted(label))
}
