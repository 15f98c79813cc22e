//! Sample acquisition seam.
//!
//! Hardware access lives with the host. The engine only needs batches of
//! same-timestamp readings with monotonic timestamps.

use std::collections::VecDeque;

use crate::domain::{SampleBatch, TickOutcome};
use crate::engine::GripEngine;

pub trait SampleSource {
    /// Next batch, or `None` when the source is exhausted.
    fn next_batch(&mut self) -> Option<SampleBatch>;
}

/// In-memory source, mostly for replay and tests.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    batches: VecDeque<SampleBatch>,
}

impl VecSource {
    pub fn new(batches: impl IntoIterator<Item = SampleBatch>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl SampleSource for VecSource {
    fn next_batch(&mut self) -> Option<SampleBatch> {
        self.batches.pop_front()
    }
}

/// Tick `engine` with every batch from `source`, using batch timestamps as
/// elapsed time, and hand each outcome to `on_tick`. Returns the tick count.
pub fn drive<F>(engine: &mut GripEngine, source: &mut dyn SampleSource, mut on_tick: F) -> usize
where
    F: FnMut(&SampleBatch, &TickOutcome),
{
    let mut ticks = 0;
    while let Some(batch) = source.next_batch() {
        let outcome = engine.tick(&batch, batch.timestamp_ms);
        on_tick(&batch, &outcome);
        ticks += 1;
    }
    ticks
}
