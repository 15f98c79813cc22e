//! The per-tick grip engine.
//!
//! One [`GripEngine`] owns one [`GripState`] and is its only writer. Each
//! `tick` validates the batch, updates the windows and smoothing
//! accumulators, and then either advances calibration or produces
//! [`Metrics`]. Nothing blocks; waiting is always an elapsed-time comparison.
//!
//! ```text
//! Calibrating --(elapsed >= duration AND window full once)--> Active
//! Active      --(reset / configure)------------------------> Calibrating
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calibrator::{Baseline, BaselineAdaptation, BaselineCalibrator, CalibrationFeatures};
use crate::capture::{CalibrationSlots, CaptureProgress, ChannelFeatures, LevelCapture, LevelLabel, LevelStats};
use crate::config::GripConfig;
use crate::domain::{CalibrationProgress, ChannelScores, EngineState, Metrics, SampleBatch, StabilityDecision, TickOutcome};
use crate::error::{CaptureError, ConfigError};
use crate::fusion::{deviation_score, excess_ratio_score, two_point_score, FeatureFuser, NormalizationPolicy};
use crate::math::ema;
use crate::motion::MotionGate;
use crate::shaper::OutputShaper;
use crate::stability::{grip_index, IqrThreshold, StabilityClassifier};
use crate::validation::{validate_batch, MagnetometerWatch};
use crate::window::{WindowBuffer, WindowStats};

/// Everything the engine mutates while ticking, grouped in one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GripState {
    pub phase: EngineState,
    /// Elapsed time of the first valid tick since construction or reset.
    pub anchor_ms: Option<u64>,
    pub window_filled_once: bool,
    pub magnetic: WindowBuffer,
    pub accel: WindowBuffer,
    /// Contact radii; cleared whenever contact is lost.
    pub touch: WindowBuffer,
    /// Input low-pass of |B|.
    pub smoothed_magnitude: Option<f32>,
    pub calibrator: BaselineCalibrator,
    pub motion: MotionGate,
    pub stability: StabilityClassifier,
    pub shaper: OutputShaper,
}

impl GripState {
    pub fn new(cfg: &GripConfig) -> Self {
        let capacity = cfg.window_capacity();
        Self {
            phase: EngineState::Calibrating,
            anchor_ms: None,
            window_filled_once: false,
            magnetic: WindowBuffer::new(capacity),
            accel: WindowBuffer::new(capacity),
            touch: WindowBuffer::new(capacity),
            smoothed_magnitude: None,
            calibrator: BaselineCalibrator::new(&cfg.calibration),
            motion: MotionGate::new(&cfg.motion),
            stability: StabilityClassifier::new(&cfg.stability),
            shaper: OutputShaper::new(cfg.output.clone()),
        }
    }

    /// Back to the freshly constructed state, keeping window capacities.
    pub fn reset(&mut self) {
        self.phase = EngineState::Calibrating;
        self.anchor_ms = None;
        self.window_filled_once = false;
        self.magnetic.clear();
        self.accel.clear();
        self.touch.clear();
        self.smoothed_magnitude = None;
        self.calibrator.reset();
        self.motion.reset();
        self.stability.reset();
        self.shaper.reset();
    }

    /// Hex BLAKE3 digest of the serialized state. Equal inputs give equal digests.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }
}

pub struct GripEngine {
    cfg: GripConfig,
    state: GripState,
    fuser: FeatureFuser,
    slots: CalibrationSlots,
    captures: Vec<LevelCapture>,
    capture_results: BTreeMap<LevelLabel, Result<LevelStats, CaptureError>>,
    watch: MagnetometerWatch,
}

impl GripEngine {
    pub fn new(cfg: GripConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            state: GripState::new(&cfg),
            fuser: FeatureFuser::new(cfg.fusion.weights),
            slots: CalibrationSlots::default(),
            captures: Vec::new(),
            capture_results: BTreeMap::new(),
            watch: MagnetometerWatch::new(cfg.sensors.dead_after_invalid_ticks),
            cfg,
        })
    }

    /// Apply a new configuration and restart calibration. Captured levels survive.
    pub fn configure(&mut self, cfg: GripConfig) -> Result<(), ConfigError> {
        cfg.validate()?;
        self.state = GripState::new(&cfg);
        self.fuser = FeatureFuser::new(cfg.fusion.weights);
        self.watch = MagnetometerWatch::new(cfg.sensors.dead_after_invalid_ticks);
        self.captures.clear();
        self.capture_results.clear();
        self.cfg = cfg;
        log::info!(
            "engine configured: window={} calibration={}ms policy={:?}",
            self.cfg.window_capacity(),
            self.cfg.calibration_ms(),
            self.cfg.fusion.policy
        );
        Ok(())
    }

    /// Back to Calibrating with empty windows and no baseline or threshold.
    pub fn reset(&mut self) {
        self.state.reset();
        self.captures.clear();
        self.capture_results.clear();
        self.watch.reset();
        log::info!("engine reset; calibrating");
    }

    pub fn config(&self) -> &GripConfig {
        &self.cfg
    }

    pub fn state(&self) -> &GripState {
        &self.state
    }

    pub fn phase(&self) -> EngineState {
        self.state.phase
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.state.calibrator.baseline()
    }

    pub fn threshold(&self) -> Option<&IqrThreshold> {
        self.state.stability.threshold()
    }

    pub fn magnetometer_looks_dead(&self) -> bool {
        self.watch.looks_dead()
    }

    /// Elapsed time of the latest rejected batch in the current invalid run.
    pub fn last_invalid_ms(&self) -> Option<u64> {
        self.watch.last_failure_ms()
    }

    pub fn levels(&self) -> &CalibrationSlots {
        &self.slots
    }

    pub fn clear_levels(&mut self) {
        self.slots.clear();
    }

    /// Consume one batch. `elapsed_ms` is the host's monotonic clock.
    pub fn tick(&mut self, batch: &SampleBatch, elapsed_ms: u64) -> TickOutcome {
        let reading = match validate_batch(batch) {
            Ok(r) => r,
            Err(e) => {
                self.watch.trip(elapsed_ms);
                return TickOutcome::NoData(e);
            }
        };
        self.watch.reset();

        let cfg = &self.cfg;
        let st = &mut self.state;
        let anchor = *st.anchor_ms.get_or_insert(elapsed_ms);
        let since = elapsed_ms.saturating_sub(anchor);

        st.magnetic.push(reading.magnetic);
        let smoothed = match st.smoothed_magnitude {
            Some(prev) => ema(prev, reading.magnetic, cfg.fusion.input_alpha),
            None => reading.magnetic,
        };
        st.smoothed_magnitude = Some(smoothed);

        let motion = match reading.accel {
            Some(a) => {
                st.accel.push(a);
                st.motion.update(a)
            }
            None => st.motion.motion(),
        };

        match reading.touch {
            Some(r) => st.touch.push(r),
            None => st.touch.clear(),
        }
        let touch_stats = (!st.touch.is_empty()).then(|| st.touch.stats());

        if st.magnetic.is_full() {
            st.window_filled_once = true;
        }
        let window = st.magnetic.is_full().then(|| st.magnetic.stats());

        if st.phase == EngineState::Calibrating {
            let mut gi = None;
            if let Some(stats) = window {
                let index = grip_index(&stats, st.calibrator.running_magnetic_mean(), &cfg.stability);
                if since < st.calibrator.duration_ms() || st.stability.samples().is_empty() {
                    st.stability.accumulate(index);
                }
                st.calibrator.observe(
                    since,
                    &CalibrationFeatures {
                        magnetic: stats,
                        touch: touch_stats,
                    },
                );
                gi = Some(index);
            }

            if st.calibrator.is_ready() && st.window_filled_once {
                st.stability.finalize();
                st.phase = EngineState::Active;
                log::info!("calibration complete at {since}ms; engine active");
            } else {
                let duration = st.calibrator.duration_ms().max(1);
                let progress = CalibrationProgress {
                    elapsed_ms: since,
                    fraction: (since as f32 / duration as f32).min(1.0),
                    window_len: st.magnetic.len(),
                    window_capacity: st.magnetic.capacity(),
                    window,
                    grip_index: gi,
                };
                self.advance_captures(elapsed_ms, None);
                return TickOutcome::Calibrating(progress);
            }
        }

        let stats = window.unwrap_or_else(|| st.magnetic.stats());

        if cfg.calibration.adaptation == BaselineAdaptation::WhileAtRest
            && motion <= cfg.calibration.rest_motion_max
            && reading.touch.is_none()
        {
            if let Some(b) = st.calibrator.baseline_mut() {
                b.adapt_magnetic_mean(smoothed, cfg.calibration.rest_adapt_alpha);
            }
        }

        let Some(baseline) = st.calibrator.baseline().copied() else {
            // Active implies a frozen baseline; treat a missing one as not ready.
            return TickOutcome::Calibrating(CalibrationProgress {
                elapsed_ms: since,
                fraction: 1.0,
                window_len: st.magnetic.len(),
                window_capacity: st.magnetic.capacity(),
                window,
                grip_index: None,
            });
        };

        let features = ChannelFeatures {
            magnetic: (smoothed - baseline.magnetic.mean).abs(),
            tremor: stats.std,
            touch: touch_stats.map(|t| t.mean),
        };
        let raw = score_channels(cfg, &self.slots, &baseline, &features, &stats);
        let suppression = st.motion.suppression();
        let (fused, scores) = self.fuser.fuse(&raw, suppression);

        let gi = grip_index(&stats, baseline.magnetic.mean, &cfg.stability);
        let threshold = st.stability.finalize();
        let stability = st.stability.classify(gi).unwrap_or(StabilityDecision::Stable);

        let grip_percent = st.shaper.update(fused);
        let metrics = Metrics {
            timestamp_ms: batch.timestamp_ms,
            elapsed_ms,
            grip_percent,
            level: st.shaper.level(),
            fused,
            scores,
            motion,
            suppression,
            smoothed_magnitude: smoothed,
            window: stats,
            grip_index: gi,
            stability,
            threshold,
        };

        self.advance_captures(elapsed_ms, Some(&features));
        TickOutcome::Ready(metrics)
    }

    /// Start a timed capture for `label`. Runs on subsequent ticks.
    pub fn capture_level(&mut self, label: LevelLabel, duration_ms: u64) -> Result<(), CaptureError> {
        if self.is_capturing(label) {
            return Err(CaptureError::Busy(label));
        }
        let capture = LevelCapture::new(label, duration_ms)?;
        self.capture_results.remove(&label);
        self.captures.push(capture);
        log::info!("{label} capture started for {duration_ms}ms");
        Ok(())
    }

    pub fn is_capturing(&self, label: LevelLabel) -> bool {
        self.captures.iter().any(|c| c.label() == label)
    }

    /// Drop a running capture; its slot keeps any earlier value.
    pub fn cancel_capture(&mut self, label: LevelLabel) -> bool {
        let before = self.captures.len();
        self.captures.retain(|c| c.label() != label);
        let cancelled = self.captures.len() != before;
        if cancelled {
            log::info!("{label} capture cancelled");
        }
        cancelled
    }

    /// Outcome of the last finished capture for `label`, if not yet taken.
    pub fn take_capture_result(&mut self, label: LevelLabel) -> Option<Result<LevelStats, CaptureError>> {
        self.capture_results.remove(&label)
    }

    fn advance_captures(&mut self, now_ms: u64, features: Option<&ChannelFeatures>) {
        if self.captures.is_empty() {
            return;
        }
        let slots = &mut self.slots;
        let results = &mut self.capture_results;
        self.captures.retain_mut(|capture| match capture.feed(now_ms, features) {
            CaptureProgress::Running { .. } => true,
            CaptureProgress::Done(stats) => {
                slots.commit(stats);
                results.insert(stats.label, Ok(stats));
                false
            }
            CaptureProgress::Failed(err) => {
                log::warn!("{err}");
                results.insert(capture.label(), Err(err));
                false
            }
        });
    }
}

/// Raw per-channel scores under the configured normalization policy.
fn score_channels(
    cfg: &GripConfig,
    slots: &CalibrationSlots,
    baseline: &Baseline,
    features: &ChannelFeatures,
    stats: &WindowStats,
) -> ChannelScores {
    let f = &cfg.fusion;
    let touch_reference = baseline.touch.map(|t| t.mean).unwrap_or(f.touch_rest_radius);
    let deviation = ChannelScores {
        magnetic: deviation_score(features.magnetic, 0.0, f.magnetic_scale),
        tremor: excess_ratio_score(stats.std, baseline.magnetic.std, f.tremor_gain),
        touch: features
            .touch
            .map(|r| deviation_score(r, touch_reference, f.touch_scale)),
    };

    match (f.policy, slots.two_point()) {
        (NormalizationPolicy::TwoPoint, Some((light, strong))) => ChannelScores {
            magnetic: two_point_score(features.magnetic, light.magnetic, strong.magnetic),
            tremor: two_point_score(features.tremor, light.tremor, strong.tremor),
            touch: match (features.touch, light.touch, strong.touch) {
                (Some(x), Some(l), Some(s)) => Some(two_point_score(x, l, s)),
                _ => deviation.touch,
            },
        },
        _ => deviation,
    }
}
