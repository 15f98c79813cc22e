use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capture::{LevelLabel, LevelStats};
use crate::domain::{SampleBatch, TickOutcome};
use crate::engine::GripEngine;
use crate::error::CaptureError;

/// Engine handle for multi-threaded hosts. Every call takes the lock, so a
/// capture started from a UI thread and ticks from a sensor thread never
/// mutate the same windows at once.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<GripEngine>>,
    pub build_id: String,
}

impl SharedEngine {
    pub fn new(engine: GripEngine, build_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
            build_id: build_id.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GripEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tick(&self, batch: &SampleBatch, elapsed_ms: u64) -> TickOutcome {
        self.lock().tick(batch, elapsed_ms)
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn capture_level(&self, label: LevelLabel, duration_ms: u64) -> Result<(), CaptureError> {
        self.lock().capture_level(label, duration_ms)
    }

    pub fn take_capture_result(&self, label: LevelLabel) -> Option<Result<LevelStats, CaptureError>> {
        self.lock().take_capture_result(label)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut GripEngine) -> R) -> R {
        f(&mut self.lock())
    }
}
