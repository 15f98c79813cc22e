//! Per-channel normalization and weighted fusion.
//!
//! Each channel's current feature is mapped into [0, 1] against the frozen
//! baseline (deviation policy) or against captured light/strong levels
//! (two-point policy). Scores combine as `Σ w·s / Σ w` over the *active*
//! channels only: an inactive channel leaves both sums, so the remaining
//! channels keep their relative contribution.

use serde::{Deserialize, Serialize};

use crate::domain::ChannelScores;
use crate::math::{clamp01, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// `|current - baseline| / scale`.
    #[default]
    Deviation,
    /// `(x - light) / (strong - light)` from captured levels.
    TwoPoint,
}

/// Channel weights, each bounded to [0, 1]. They need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub magnetic: f32,
    pub tremor: f32,
    pub touch: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            magnetic: 1.0,
            tremor: 0.5,
            touch: 0.5,
        }
    }
}

impl FusionWeights {
    pub fn new(magnetic: f32, tremor: f32, touch: f32) -> Self {
        Self {
            magnetic: clamp01(magnetic),
            tremor: clamp01(tremor),
            touch: clamp01(touch),
        }
    }
}

/// Deviation-from-baseline score. A scale at or below 1e-6 scores 0.
pub fn deviation_score(current: f32, baseline: f32, scale: f32) -> f32 {
    if scale <= EPSILON {
        return 0.0;
    }
    clamp01((current - baseline).abs() / scale)
}

/// Two-point score between a light and a strong reference. A span at or
/// below 1e-6 (including an inverted pair) scores 0.
pub fn two_point_score(x: f32, light: f32, strong: f32) -> f32 {
    let span = strong - light;
    if span <= EPSILON {
        return 0.0;
    }
    clamp01((x - light) / span)
}

/// Ratio-to-baseline excess: `(current - base) / (base * gain)`.
pub fn excess_ratio_score(current: f32, base: f32, gain: f32) -> f32 {
    let denom = base * gain;
    if denom <= EPSILON {
        return 0.0;
    }
    clamp01((current - base) / denom)
}

/// One channel's contribution on a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelTerm {
    pub score: f32,
    pub weight: f32,
    pub active: bool,
}

impl ChannelTerm {
    pub fn active(score: f32, weight: f32) -> Self {
        Self {
            score,
            weight,
            active: true,
        }
    }

    pub fn inactive(weight: f32) -> Self {
        Self {
            score: 0.0,
            weight,
            active: false,
        }
    }
}

/// `Σ w·s / Σ w` over active terms, clamped to [0, 1]; 0 when no weight is active.
pub fn combine(terms: &[ChannelTerm]) -> f32 {
    let (num, den) = terms
        .iter()
        .filter(|t| t.active)
        .fold((0.0f32, 0.0f32), |(n, d), t| {
            let w = clamp01(t.weight);
            (n + w * clamp01(t.score), d + w)
        });
    if den <= EPSILON {
        return 0.0;
    }
    clamp01(num / den)
}

/// Fuses magnetic, tremor and touch scores with motion suppression applied to
/// the two magnetic-derived channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFuser {
    weights: FusionWeights,
}

impl FeatureFuser {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Returns the fused score and the post-suppression channel scores.
    pub fn fuse(&self, raw: &ChannelScores, suppression: f32) -> (f32, ChannelScores) {
        let s = clamp01(suppression);
        let scores = ChannelScores {
            magnetic: clamp01(raw.magnetic) * s,
            tremor: clamp01(raw.tremor) * s,
            touch: raw.touch.map(clamp01),
        };
        let touch = match scores.touch {
            Some(t) => ChannelTerm::active(t, self.weights.touch),
            None => ChannelTerm::inactive(self.weights.touch),
        };
        let fused = combine(&[
            ChannelTerm::active(scores.magnetic, self.weights.magnetic),
            ChannelTerm::active(scores.tremor, self.weights.tremor),
            touch,
        ]);
        (fused, scores)
    }
}
