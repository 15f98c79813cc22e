//! Grip core: streaming grip-strength estimation from magnetometer,
//! accelerometer and touch streams, plus the session-logging seams.

pub mod domain;
pub mod error;
pub mod math;
pub mod config;
pub mod validation;
pub mod window;
pub mod calibrator;
pub mod motion;
pub mod fusion;
pub mod shaper;
pub mod stability;
pub mod capture;
pub mod engine;
pub mod source;
pub mod session;
pub mod shared;

pub use domain::*;
pub use error::*;
pub use config::*;
pub use validation::*;
pub use window::*;
pub use calibrator::*;
pub use motion::*;
pub use fusion::*;
pub use shaper::*;
pub use stability::*;
pub use capture::*;
pub use engine::*;
pub use source::*;
pub use session::*;
pub use shared::*;

#[cfg(test)]
mod tests_engine;
#[cfg(test)]
mod tests_config;
#[cfg(test)]
mod tests_determinism;
