//! Domain types: samples, batches, engine phase and per-tick outcomes.

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::window::WindowStats;

/// Euclidean norm of a three-axis reading.
pub fn magnitude(v: [f32; 3]) -> f32 {
    Vector3::from(v).norm()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    /// Magnetometer field vector, µT.
    Magnetic,
    /// Accelerometer vector including gravity, g.
    Accel,
    /// Touch contact radius, scalar.
    Touch,
}

impl ChannelId {
    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Magnetic => "magnetic",
            ChannelId::Accel => "accel",
            ChannelId::Touch => "touch",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading {
    Vector([f32; 3]),
    Scalar(f32),
}

/// One timestamped reading from one channel. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: u64,
    pub channel: ChannelId,
    pub reading: Reading,
}

impl Sample {
    pub fn vector(timestamp_ms: u64, channel: ChannelId, v: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            channel,
            reading: Reading::Vector(v),
        }
    }

    pub fn scalar(timestamp_ms: u64, channel: ChannelId, value: f32) -> Self {
        Self {
            timestamp_ms,
            channel,
            reading: Reading::Scalar(value),
        }
    }
}

/// All readings that arrived with one timestamp: the input of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleBatch {
    pub timestamp_ms: u64,
    pub magnetic: Option<[f32; 3]>,
    pub accel: Option<[f32; 3]>,
    /// Contact radius; `None` or `0.0` means no contact.
    pub touch_radius: Option<f32>,
}

impl SampleBatch {
    pub fn new(timestamp_ms: u64, magnetic: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            magnetic: Some(magnetic),
            accel: None,
            touch_radius: None,
        }
    }

    pub fn with_accel(mut self, accel: [f32; 3]) -> Self {
        self.accel = Some(accel);
        self
    }

    pub fn with_touch(mut self, radius: f32) -> Self {
        self.touch_radius = Some(radius);
        self
    }

    /// Assemble a batch from per-channel samples sharing one timestamp.
    /// A later sample for the same channel replaces an earlier one.
    pub fn from_samples(samples: &[Sample]) -> Result<Self, SensorError> {
        let first = samples.first().ok_or(SensorError::Empty)?;
        let mut batch = SampleBatch {
            timestamp_ms: first.timestamp_ms,
            ..Default::default()
        };
        for s in samples {
            if s.timestamp_ms != batch.timestamp_ms {
                return Err(SensorError::MixedTimestamps {
                    expected: batch.timestamp_ms,
                    actual: s.timestamp_ms,
                });
            }
            match (s.channel, s.reading) {
                (ChannelId::Magnetic, Reading::Vector(v)) => batch.magnetic = Some(v),
                (ChannelId::Accel, Reading::Vector(v)) => batch.accel = Some(v),
                (ChannelId::Touch, Reading::Scalar(r)) => batch.touch_radius = Some(r),
                (ChannelId::Touch, Reading::Vector(_)) => {
                    return Err(SensorError::WrongReadingShape {
                        channel: "touch",
                        expected: "scalar",
                    })
                }
                (channel, Reading::Scalar(_)) => {
                    return Err(SensorError::WrongReadingShape {
                        channel: channel.name(),
                        expected: "vector",
                    })
                }
            }
        }
        Ok(batch)
    }

    pub fn to_samples(&self) -> Vec<Sample> {
        let mut out = Vec::with_capacity(3);
        if let Some(v) = self.magnetic {
            out.push(Sample::vector(self.timestamp_ms, ChannelId::Magnetic, v));
        }
        if let Some(v) = self.accel {
            out.push(Sample::vector(self.timestamp_ms, ChannelId::Accel, v));
        }
        if let Some(r) = self.touch_radius {
            out.push(Sample::scalar(self.timestamp_ms, ChannelId::Touch, r));
        }
        out
    }

    pub fn magnetic_magnitude(&self) -> Option<f32> {
        self.magnetic.map(magnitude)
    }

    pub fn accel_magnitude(&self) -> Option<f32> {
        self.accel.map(magnitude)
    }

    pub fn has_contact(&self) -> bool {
        matches!(self.touch_radius, Some(r) if r > 0.0)
    }
}

/// Engine phase. `Active` is terminal until an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Calibrating,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GripLevel {
    Low,
    Medium,
    Strong,
}

impl fmt::Display for GripLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GripLevel::Low => "low",
            GripLevel::Medium => "medium",
            GripLevel::Strong => "strong",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityDecision {
    Stable,
    Unstable,
}

impl fmt::Display for StabilityDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StabilityDecision::Stable => "Stable",
            StabilityDecision::Unstable => "Unstable",
        })
    }
}

/// Normalized per-channel scores in [0, 1], before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelScores {
    pub magnetic: f32,
    pub tremor: f32,
    /// `None` while there is no touch contact.
    pub touch: Option<f32>,
}

/// Published result of an Active tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub timestamp_ms: u64,
    pub elapsed_ms: u64,
    /// Shaped and smoothed output, 0..=100.
    pub grip_percent: f32,
    pub level: GripLevel,
    /// Weighted fusion result before output shaping.
    pub fused: f32,
    pub scores: ChannelScores,
    pub motion: f32,
    /// Factor applied to the magnetic-derived scores.
    pub suppression: f32,
    pub smoothed_magnitude: f32,
    pub window: WindowStats,
    pub grip_index: f32,
    pub stability: StabilityDecision,
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub elapsed_ms: u64,
    /// Fraction of the calibration duration elapsed, in [0, 1].
    pub fraction: f32,
    pub window_len: usize,
    pub window_capacity: usize,
    /// Present once the magnetic window is full.
    pub window: Option<WindowStats>,
    pub grip_index: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The batch was rejected; engine state is unchanged.
    NoData(SensorError),
    /// Baseline not yet frozen; outputs are not available.
    Calibrating(CalibrationProgress),
    Ready(Metrics),
}

impl TickOutcome {
    pub fn metrics(&self) -> Option<&Metrics> {
        match self {
            TickOutcome::Ready(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_metrics(self) -> Option<Metrics> {
        match self {
            TickOutcome::Ready(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, TickOutcome::Ready(_))
    }
}
