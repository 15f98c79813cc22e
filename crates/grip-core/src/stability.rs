//! Stable/unstable hold classification against a one-shot adaptive threshold.
//!
//! During calibration the grip index of every full window is collected. On
//! the transition to Active the threshold `median + k * IQR` is computed once
//! and never revisited for the rest of the session.
//!
//! Index convention over the sorted list (integer division is floor):
//! `median = s[n / 2]`, `q1 = s[(n - 1) / 4]`, `q3 = s[3 * (n - 1) / 4]`.

use serde::{Deserialize, Serialize};

use crate::config::StabilityConfig;
use crate::domain::StabilityDecision;
use crate::math::EPSILON;
use crate::window::WindowStats;

/// `peak_weight * p2p + std_weight * std * (mean / max(norm_floor, baseline_mean))`.
pub fn grip_index(stats: &WindowStats, baseline_mean: f32, cfg: &StabilityConfig) -> f32 {
    let norm = cfg.norm_floor.max(baseline_mean);
    cfg.peak_weight * stats.peak_to_peak + cfg.std_weight * stats.std * (stats.mean / norm)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrThreshold {
    pub median: f32,
    pub q1: f32,
    pub q3: f32,
    pub iqr: f32,
    pub threshold: f32,
}

/// Robust threshold over `values`; `None` for an empty list.
pub fn median_iqr_threshold(values: &[f32], k: f32) -> Option<IqrThreshold> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let n = sorted.len();
    let median = sorted[n / 2];
    let q1 = sorted[(n - 1) / 4];
    let q3 = sorted[3 * (n - 1) / 4];
    let iqr = (q3 - q1).max(EPSILON);
    Some(IqrThreshold {
        median,
        q1,
        q3,
        iqr,
        threshold: median + k * iqr,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityClassifier {
    k: f32,
    samples: Vec<f32>,
    threshold: Option<IqrThreshold>,
}

impl StabilityClassifier {
    pub fn new(cfg: &StabilityConfig) -> Self {
        Self {
            k: cfg.iqr_k,
            samples: Vec::new(),
            threshold: None,
        }
    }

    /// Collect a calibration-phase index. Ignored once the threshold exists.
    pub fn accumulate(&mut self, gi: f32) {
        if self.threshold.is_none() && gi.is_finite() {
            self.samples.push(gi);
        }
    }

    /// Compute the threshold on first call; later calls return the same value.
    pub fn finalize(&mut self) -> f32 {
        if let Some(t) = self.threshold {
            return t.threshold;
        }
        let t = median_iqr_threshold(&self.samples, self.k).unwrap_or_else(|| {
            log::warn!("no calibration grip indices collected; threshold defaults to 0");
            IqrThreshold {
                median: 0.0,
                q1: 0.0,
                q3: 0.0,
                iqr: EPSILON,
                threshold: 0.0,
            }
        });
        log::info!(
            "stability threshold {:.4} (median={:.4} iqr={:.4}, n={})",
            t.threshold,
            t.median,
            t.iqr,
            self.samples.len()
        );
        self.threshold = Some(t);
        t.threshold
    }

    pub fn threshold(&self) -> Option<&IqrThreshold> {
        self.threshold.as_ref()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// `gi > threshold` is Unstable. `None` before [`finalize`](Self::finalize).
    pub fn classify(&self, gi: f32) -> Option<StabilityDecision> {
        self.threshold.map(|t| {
            if gi > t.threshold {
                StabilityDecision::Unstable
            } else {
                StabilityDecision::Stable
            }
        })
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.threshold = None;
    }
}
