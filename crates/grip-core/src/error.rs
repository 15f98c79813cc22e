//! Error types for the grip engine and its collaborators.

use thiserror::Error;

use crate::capture::LevelLabel;

/// A reading that cannot enter the engine. Reported per tick, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("{channel} reading is not finite")]
    NotFinite { channel: &'static str },

    #[error("{channel} magnitude must be positive, got {value}")]
    NonPositiveMagnitude { channel: &'static str, value: f32 },

    #[error("touch radius must be non-negative, got {0}")]
    NegativeTouchRadius(f32),

    #[error("magnetic channel missing from batch")]
    MissingMagnetic,

    #[error("batch mixes timestamps {expected} and {actual}")]
    MixedTimestamps { expected: u64, actual: u64 },

    #[error("{channel} expects a {expected} reading")]
    WrongReadingShape {
        channel: &'static str,
        expected: &'static str,
    },

    #[error("empty sample set")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid option {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("a {0} capture is already running")]
    Busy(LevelLabel),

    #[error("capture duration must be positive")]
    ZeroDuration,

    #[error("{0} capture collected no samples")]
    NoSamples(LevelLabel),

    #[error("{0} capture was cancelled")]
    Cancelled(LevelLabel),

    #[error("sample source ran dry before the {0} capture completed")]
    SourceExhausted(LevelLabel),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("log sink failed: {0}")]
    Sink(String),

    #[error("catalog sink failed: {0}")]
    Catalog(String),
}
