//! Engine configuration.
//!
//! Every section carries `#[serde(default)]`, so a file only needs the keys it
//! overrides. Files are read through the `config` crate with `GRIP_`-prefixed
//! environment overrides (`GRIP_OUTPUT__DEAD_ZONE=0.1`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibrator::BaselineAdaptation;
use crate::error::ConfigError;
use crate::fusion::{FusionWeights, NormalizationPolicy};
use crate::window::{capacity_for, MAX_CAPACITY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Expected sample rate in Hz. Only sizes the windows.
    pub sample_rate_hint: u32,
    pub window_seconds: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sample_rate_hint: 50,
            window_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub duration_seconds: f32,
    /// EMA factor for the rest-state reference.
    pub ema_alpha: f32,
    /// Frozen spreads at or below this are replaced by `std_floor`.
    pub std_epsilon: f32,
    pub std_floor: f32,
    pub adaptation: BaselineAdaptation,
    pub rest_adapt_alpha: f32,
    /// Motion at or below this counts as rest for re-adaptation.
    pub rest_motion_max: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            ema_alpha: 0.05,
            std_epsilon: 1e-6,
            std_floor: 1e-3,
            adaptation: BaselineAdaptation::Off,
            rest_adapt_alpha: 0.01,
            rest_motion_max: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub policy: NormalizationPolicy,
    /// Low-pass factor applied to |B| before scoring.
    pub input_alpha: f32,
    /// |B| deviation (µT) that maps to a full magnetic score.
    pub magnetic_scale: f32,
    /// Multiple of baseline std that maps to a full tremor score.
    pub tremor_gain: f32,
    pub touch_scale: f32,
    /// Rest reference radius when no contact was seen during calibration.
    pub touch_rest_radius: f32,
    pub weights: FusionWeights,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            policy: NormalizationPolicy::Deviation,
            input_alpha: 0.1,
            magnetic_scale: 8.0,
            tremor_gain: 3.0,
            touch_scale: 30.0,
            touch_rest_radius: 0.0,
            weights: FusionWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Low-pass factor for accelerometer magnitude; faster than `fusion.input_alpha`.
    pub alpha: f32,
    /// Deviation from rest (g) where suppression starts; full at twice this.
    pub threshold: f32,
    pub suppress_strength: f32,
    /// Accelerometer magnitude at rest.
    pub gravity: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            threshold: 0.05,
            suppress_strength: 0.8,
            gravity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dead_zone: f32,
    /// Power-curve exponent; values above 1 compress the low end.
    pub curve: f32,
    pub smooth_alpha: f32,
    /// Percent at which the level reads Medium.
    pub medium_threshold: f32,
    /// Percent at which the level reads Strong.
    pub strong_threshold: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dead_zone: 0.05,
            curve: 1.5,
            smooth_alpha: 0.2,
            medium_threshold: 33.0,
            strong_threshold: 66.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub peak_weight: f32,
    pub std_weight: f32,
    /// Lower bound on the baseline mean used to normalize the std term.
    pub norm_floor: f32,
    /// IQR multiplier for the adaptive threshold.
    pub iqr_k: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            peak_weight: 0.6,
            std_weight: 0.4,
            norm_floor: 5.0,
            iqr_k: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Consecutive invalid magnetic readings before the magnetometer is reported dead.
    pub dead_after_invalid_ticks: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            dead_after_invalid_ticks: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GripConfig {
    pub window: WindowConfig,
    pub calibration: CalibrationConfig,
    pub fusion: FusionConfig,
    pub motion: MotionConfig,
    pub output: OutputConfig,
    pub stability: StabilityConfig,
    pub sensors: SensorConfig,
}

fn unit_open_closed(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} not in (0, 1]")))
    }
}

fn unit_closed(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} not in [0, 1]")))
    }
}

fn positive(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} must be positive")))
    }
}

fn non_negative(field: &'static str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} must be non-negative")))
    }
}

impl GripConfig {
    /// Load from a file (format by extension) layered under `GRIP_*` env vars.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(
                ::config::Environment::with_prefix("GRIP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: GripConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: GripConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn window_capacity(&self) -> usize {
        capacity_for(self.window.sample_rate_hint, self.window.window_seconds)
    }

    pub fn calibration_ms(&self) -> u64 {
        (self.calibration.duration_seconds * 1000.0).round() as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.sample_rate_hint == 0 {
            return Err(ConfigError::invalid("window.sample_rate_hint", "must be at least 1"));
        }
        positive("window.window_seconds", self.window.window_seconds)?;
        let samples = self.window.sample_rate_hint as f64 * self.window.window_seconds as f64;
        if samples.round() > MAX_CAPACITY as f64 {
            return Err(ConfigError::invalid(
                "window.window_seconds",
                format!("window of {samples:.0} samples exceeds {MAX_CAPACITY}"),
            ));
        }

        let c = &self.calibration;
        positive("calibration.duration_seconds", c.duration_seconds)?;
        unit_open_closed("calibration.ema_alpha", c.ema_alpha)?;
        non_negative("calibration.std_epsilon", c.std_epsilon)?;
        positive("calibration.std_floor", c.std_floor)?;
        unit_open_closed("calibration.rest_adapt_alpha", c.rest_adapt_alpha)?;
        unit_closed("calibration.rest_motion_max", c.rest_motion_max)?;

        let f = &self.fusion;
        unit_open_closed("fusion.input_alpha", f.input_alpha)?;
        non_negative("fusion.magnetic_scale", f.magnetic_scale)?;
        non_negative("fusion.tremor_gain", f.tremor_gain)?;
        non_negative("fusion.touch_scale", f.touch_scale)?;
        non_negative("fusion.touch_rest_radius", f.touch_rest_radius)?;
        unit_closed("fusion.weights.magnetic", f.weights.magnetic)?;
        unit_closed("fusion.weights.tremor", f.weights.tremor)?;
        unit_closed("fusion.weights.touch", f.weights.touch)?;

        let m = &self.motion;
        unit_open_closed("motion.alpha", m.alpha)?;
        non_negative("motion.threshold", m.threshold)?;
        unit_closed("motion.suppress_strength", m.suppress_strength)?;
        positive("motion.gravity", m.gravity)?;

        let o = &self.output;
        if !(0.0..1.0).contains(&o.dead_zone) {
            return Err(ConfigError::invalid(
                "output.dead_zone",
                format!("{} not in [0, 1)", o.dead_zone),
            ));
        }
        positive("output.curve", o.curve)?;
        unit_open_closed("output.smooth_alpha", o.smooth_alpha)?;
        if !(0.0 <= o.medium_threshold
            && o.medium_threshold <= o.strong_threshold
            && o.strong_threshold <= 100.0)
        {
            return Err(ConfigError::invalid(
                "output.strong_threshold",
                "expected 0 <= medium_threshold <= strong_threshold <= 100",
            ));
        }

        let s = &self.stability;
        non_negative("stability.peak_weight", s.peak_weight)?;
        non_negative("stability.std_weight", s.std_weight)?;
        positive("stability.norm_floor", s.norm_floor)?;
        non_negative("stability.iqr_k", s.iqr_k)?;

        if self.sensors.dead_after_invalid_ticks == 0 {
            return Err(ConfigError::invalid(
                "sensors.dead_after_invalid_ticks",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
