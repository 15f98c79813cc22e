use serde::{Deserialize, Serialize};

use crate::config::OutputConfig;
use crate::domain::GripLevel;
use crate::math::{clamp01, lerp};

/// Map a fused score to the display target in percent.
///
/// Dead zone, rescale, clamp, power curve, ×100. No smoothing.
pub fn shape_target(z: f32, dead_zone: f32, curve: f32) -> f32 {
    let z = clamp01(z);
    if z < dead_zone {
        return 0.0;
    }
    let span = 1.0 - dead_zone;
    if span <= 0.0 {
        return 0.0;
    }
    let rescaled = clamp01((z - dead_zone) / span);
    100.0 * rescaled.powf(curve)
}

/// Turns fused scores into the displayed percentage.
///
/// Smoothing acts on the output, not on the score: the input low-pass in the
/// engine damps sensor jitter, this one damps display jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputShaper {
    cfg: OutputConfig,
    output: f32,
}

impl OutputShaper {
    pub fn new(cfg: OutputConfig) -> Self {
        Self { cfg, output: 0.0 }
    }

    /// Advance one tick toward the shaped target; returns the new output.
    pub fn update(&mut self, z: f32) -> f32 {
        let target = shape_target(z, self.cfg.dead_zone, self.cfg.curve);
        self.output = lerp(self.output, target, self.cfg.smooth_alpha);
        self.output
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn level(&self) -> GripLevel {
        level_for(self.output, &self.cfg)
    }

    pub fn reset(&mut self) {
        self.output = 0.0;
    }
}

pub fn level_for(percent: f32, cfg: &OutputConfig) -> GripLevel {
    if percent < cfg.medium_threshold {
        GripLevel::Low
    } else if percent < cfg.strong_threshold {
        GripLevel::Medium
    } else {
        GripLevel::Strong
    }
}
