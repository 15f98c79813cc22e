//! Rest-state baseline capture.
//!
//! During `[0, duration)` each observation updates a per-channel EMA of the
//! window features. The first observation at or after the duration freezes
//! the EMA into a [`Baseline`]; later observations are ignored. Only
//! [`BaselineCalibrator::reset`] reopens calibration.

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::math::{ema, lerp};
use crate::window::WindowStats;

/// Whether the frozen magnetic mean may drift while the device is at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineAdaptation {
    #[default]
    Off,
    /// Nudge toward the low-passed |B| when still and untouched.
    WhileAtRest,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelBaseline {
    pub mean: f32,
    pub std: f32,
    pub peak: f32,
}

impl ChannelBaseline {
    fn from_stats(s: &WindowStats) -> Self {
        Self {
            mean: s.mean,
            std: s.std,
            peak: s.peak_to_peak,
        }
    }

    fn blend(&mut self, s: &WindowStats, alpha: f32) {
        self.mean = ema(self.mean, s.mean, alpha);
        self.std = ema(self.std, s.std, alpha);
        self.peak = ema(self.peak, s.peak_to_peak, alpha);
    }

    fn floored(mut self, epsilon: f32, floor: f32) -> Self {
        if self.std <= epsilon {
            self.std = floor;
        }
        if self.peak <= epsilon {
            self.peak = floor;
        }
        self
    }
}

/// Frozen rest-state reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub magnetic: ChannelBaseline,
    /// `None` when no touch contact was seen during calibration.
    pub touch: Option<ChannelBaseline>,
    pub observations: u32,
}

impl Baseline {
    /// Move the magnetic mean toward `value`. Spreads stay frozen.
    pub fn adapt_magnetic_mean(&mut self, value: f32, alpha: f32) {
        self.magnetic.mean = lerp(self.magnetic.mean, value, alpha);
    }
}

/// Window features fed to the calibrator on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationFeatures {
    pub magnetic: WindowStats,
    pub touch: Option<WindowStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineCalibrator {
    duration_ms: u64,
    alpha: f32,
    std_epsilon: f32,
    std_floor: f32,
    magnetic: Option<ChannelBaseline>,
    touch: Option<ChannelBaseline>,
    observations: u32,
    frozen: Option<Baseline>,
}

impl BaselineCalibrator {
    pub fn new(cfg: &CalibrationConfig) -> Self {
        Self {
            duration_ms: (cfg.duration_seconds * 1000.0).round() as u64,
            alpha: cfg.ema_alpha,
            std_epsilon: cfg.std_epsilon,
            std_floor: cfg.std_floor,
            magnetic: None,
            touch: None,
            observations: 0,
            frozen: None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn is_ready(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.frozen.as_ref()
    }

    pub fn baseline_mut(&mut self) -> Option<&mut Baseline> {
        self.frozen.as_mut()
    }

    /// Current EMA of the magnetic window mean; 0 before any observation.
    pub fn running_magnetic_mean(&self) -> f32 {
        self.magnetic.map(|m| m.mean).unwrap_or(0.0)
    }

    pub fn observations(&self) -> u32 {
        self.observations
    }

    /// Feed one set of window features at `elapsed_ms` since calibration began.
    ///
    /// Returns the baseline once frozen. An observation arriving after the
    /// duration with nothing accumulated seeds the EMA before freezing, so a
    /// slow-filling window still yields a baseline.
    pub fn observe(&mut self, elapsed_ms: u64, features: &CalibrationFeatures) -> Option<&Baseline> {
        if self.frozen.is_some() {
            return self.frozen.as_ref();
        }

        if elapsed_ms < self.duration_ms || self.observations == 0 {
            self.accumulate(features);
        }

        if elapsed_ms >= self.duration_ms {
            self.freeze();
        }
        self.frozen.as_ref()
    }

    fn accumulate(&mut self, features: &CalibrationFeatures) {
        let alpha = self.alpha;
        match self.magnetic.as_mut() {
            Some(m) => m.blend(&features.magnetic, alpha),
            None => self.magnetic = Some(ChannelBaseline::from_stats(&features.magnetic)),
        }
        if let Some(t) = &features.touch {
            match self.touch.as_mut() {
                Some(b) => b.blend(t, alpha),
                None => self.touch = Some(ChannelBaseline::from_stats(t)),
            }
        }
        self.observations += 1;
    }

    fn freeze(&mut self) {
        let Some(magnetic) = self.magnetic else {
            return;
        };
        let (eps, floor) = (self.std_epsilon, self.std_floor);
        let baseline = Baseline {
            magnetic: magnetic.floored(eps, floor),
            touch: self.touch.map(|t| t.floored(eps, floor)),
            observations: self.observations,
        };
        log::info!(
            "baseline frozen after {} observations: mean={:.3} std={:.6} peak={:.4}",
            baseline.observations,
            baseline.magnetic.mean,
            baseline.magnetic.std,
            baseline.magnetic.peak
        );
        self.frozen = Some(baseline);
    }

    /// Clear accumulated state and reopen calibration.
    pub fn reset(&mut self) {
        self.magnetic = None;
        self.touch = None;
        self.observations = 0;
        self.frozen = None;
    }
}
