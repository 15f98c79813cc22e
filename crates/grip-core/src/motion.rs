//! Device-motion detection from accelerometer magnitude.
//!
//! The gate low-passes |a| with its own fast factor, measures the deviation
//! from rest (1 g nominal) and maps it through a soft threshold:
//!
//! `motion = clamp01(inverse_lerp(th, 2 * th, |smooth - g|))`
//!
//! Consumers scale suppressible terms by [`MotionGate::suppression`].

use serde::{Deserialize, Serialize};

use crate::config::MotionConfig;
use crate::math::{clamp01, ema, inverse_lerp};

/// Factor for a suppressible term: `clamp01(1 - strength * motion)`.
pub fn suppression_factor(motion: f32, strength: f32) -> f32 {
    clamp01(1.0 - clamp01(strength) * clamp01(motion))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionGate {
    alpha: f32,
    threshold: f32,
    strength: f32,
    gravity: f32,
    smooth_acc: Option<f32>,
    motion: f32,
}

impl MotionGate {
    pub fn new(cfg: &MotionConfig) -> Self {
        Self {
            alpha: cfg.alpha,
            threshold: cfg.threshold,
            strength: cfg.suppress_strength,
            gravity: cfg.gravity,
            smooth_acc: None,
            motion: 0.0,
        }
    }

    /// Update with one accelerometer magnitude and return the motion level.
    pub fn update(&mut self, accel_magnitude: f32) -> f32 {
        let smooth = match self.smooth_acc {
            Some(prev) => ema(prev, accel_magnitude, self.alpha),
            None => accel_magnitude,
        };
        self.smooth_acc = Some(smooth);
        self.motion = self.motion_for_delta((smooth - self.gravity).abs());
        self.motion
    }

    /// Soft-threshold mapping, monotone non-decreasing in `delta`.
    pub fn motion_for_delta(&self, delta: f32) -> f32 {
        inverse_lerp(self.threshold, 2.0 * self.threshold, delta)
    }

    pub fn motion(&self) -> f32 {
        self.motion
    }

    pub fn smoothed(&self) -> Option<f32> {
        self.smooth_acc
    }

    pub fn suppression(&self) -> f32 {
        suppression_factor(self.motion, self.strength)
    }

    pub fn reset(&mut self) {
        self.smooth_acc = None;
        self.motion = 0.0;
    }
}
