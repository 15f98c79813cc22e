//! Session recording side-path.
//!
//! Raw magnetometer samples are buffered between `start` and `stop`, then
//! handed to a [`LogSink`]; a [`SessionRecord`] summarizing the run is
//! appended to a [`CatalogSink`]. Sink failures stay local to the session:
//! they are logged and returned, and never reach engine state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{SampleBatch, TickOutcome};
use crate::error::SessionError;

/// One row of a raw session log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Milliseconds since the session started.
    pub t_ms: f64,
    pub bx: f32,
    pub by: f32,
    pub bz: f32,
    pub magnitude: f32,
}

/// Catalog entry for one finished session. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// `yyyyMMdd_HHmmss` of the session start.
    pub id: String,
    /// ISO-8601 start time.
    pub datetime: DateTime<Utc>,
    pub log_path: String,
    pub sample_count: usize,
    pub mean_magnitude: f32,
    pub min_magnitude: f32,
    pub max_magnitude: f32,
}

pub fn session_id(start: &DateTime<Utc>) -> String {
    start.format("%Y%m%d_%H%M%S").to_string()
}

/// Durable storage for a session's raw samples.
pub trait LogSink {
    /// Persist `samples` under `session_id`; returns where they went.
    fn write_log(&mut self, session_id: &str, samples: &[RawSample]) -> Result<String, SessionError>;
}

/// Append-only catalog of finished sessions.
pub trait CatalogSink {
    fn append(&mut self, record: &SessionRecord) -> Result<(), SessionError>;
}

/// Magnitude summary over the finite samples; `None` when there are none.
pub fn summarize(samples: &[RawSample]) -> Option<(f32, f32, f32)> {
    let mut n = 0usize;
    let mut sum = 0.0f64;
    let mut min_b = f32::MAX;
    let mut max_b = f32::MIN;
    for m in samples.iter().map(|s| s.magnitude).filter(|m| m.is_finite()) {
        n += 1;
        sum += m as f64;
        min_b = min_b.min(m);
        max_b = max_b.max(m);
    }
    (n > 0).then(|| ((sum / n as f64) as f32, min_b, max_b))
}

#[derive(Debug, Default)]
pub struct SessionRecorder {
    started: Option<(DateTime<Utc>, u64)>,
    samples: Vec<RawSample>,
    rejected: usize,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.started.is_some()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Readings dropped as non-finite since `start`.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Begin a session; `origin_ms` is the host clock at `now`.
    pub fn start(&mut self, now: DateTime<Utc>, origin_ms: u64) {
        self.samples.clear();
        self.rejected = 0;
        self.started = Some((now, origin_ms));
        log::info!("session logging started");
    }

    /// Buffer the magnetic reading of `batch`. Batches without one, or with
    /// a non-finite one, are skipped.
    pub fn record(&mut self, batch: &SampleBatch) {
        let Some((_, origin_ms)) = self.started else {
            return;
        };
        let Some(b) = batch.magnetic else {
            return;
        };
        let magnitude = crate::domain::magnitude(b);
        if !(b.iter().all(|v| v.is_finite()) && magnitude.is_finite()) {
            self.rejected += 1;
            log::debug!("dropping non-finite magnetic reading at {}ms", batch.timestamp_ms);
            return;
        }
        self.samples.push(RawSample {
            t_ms: batch.timestamp_ms.saturating_sub(origin_ms) as f64,
            bx: b[0],
            by: b[1],
            bz: b[2],
            magnitude,
        });
        if self.samples.len() % 200 == 0 {
            log::debug!(
                "|B|={:.2} µT raw=({:.2},{:.2},{:.2}) n={}",
                magnitude,
                b[0],
                b[1],
                b[2],
                self.samples.len()
            );
        }
    }

    /// Flush the session. Returns `Ok(None)` when not recording.
    ///
    /// The buffer is dropped whatever the sinks report. An empty session, or
    /// a log sink failure, leaves the catalog untouched.
    pub fn stop(
        &mut self,
        log_sink: &mut dyn LogSink,
        catalog: &mut dyn CatalogSink,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let Some((start, _)) = self.started.take() else {
            log::warn!("stop called without an active session; ignoring");
            return Ok(None);
        };
        let samples = std::mem::take(&mut self.samples);
        log::info!(
            "session logging stopped with {} samples ({} rejected)",
            samples.len(),
            self.rejected
        );

        let id = session_id(&start);
        let log_path = log_sink.write_log(&id, &samples).map_err(|e| {
            log::error!("saving session {id} failed: {e}");
            e
        })?;

        let Some((mean, min_b, max_b)) = summarize(&samples) else {
            log::warn!("session {id} has no samples; catalog not updated");
            return Ok(None);
        };
        let record = SessionRecord {
            id,
            datetime: start,
            log_path,
            sample_count: samples.len(),
            mean_magnitude: mean,
            min_magnitude: min_b,
            max_magnitude: max_b,
        };
        catalog.append(&record).map_err(|e| {
            log::error!("catalog update for {} failed: {e}", record.id);
            e
        })?;
        Ok(Some(record))
    }
}

/// One periodic summary row: `phase,t_s,mean,std,peak2peak,GI,decision`.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub phase: &'static str,
    pub t_s: f32,
    pub mean: f32,
    pub std: f32,
    pub peak_to_peak: f32,
    pub grip_index: f32,
    pub decision: Option<String>,
}

impl SummaryRow {
    /// Fixed-precision fields in [`SummaryLog::COLUMNS`] order.
    pub fn fields(&self) -> [String; 7] {
        [
            self.phase.to_string(),
            format!("{:.2}", self.t_s),
            format!("{:.3}", self.mean),
            format!("{:.3}", self.std),
            format!("{:.3}", self.peak_to_peak),
            format!("{:.3}", self.grip_index),
            self.decision.clone().unwrap_or_default(),
        ]
    }
}

/// Quarter-second summary of window features and decisions.
#[derive(Debug, Clone, Default)]
pub struct SummaryLog {
    rows: Vec<SummaryRow>,
    last_bucket: Option<u64>,
}

impl SummaryLog {
    pub const COLUMNS: [&'static str; 7] = ["phase", "t_s", "mean", "std", "peak2peak", "GI", "decision"];
    pub const PERIOD_MS: u64 = 250;

    pub fn new() -> Self {
        Self::default()
    }

    /// Record `outcome` if it opens a new 250 ms bucket and carries window features.
    pub fn observe(&mut self, elapsed_ms: u64, outcome: &TickOutcome) {
        let row = match outcome {
            TickOutcome::Calibrating(p) => match (p.window, p.grip_index) {
                (Some(w), Some(gi)) => SummaryRow {
                    phase: "calib",
                    t_s: elapsed_ms as f32 / 1000.0,
                    mean: w.mean,
                    std: w.std,
                    peak_to_peak: w.peak_to_peak,
                    grip_index: gi,
                    decision: None,
                },
                _ => return,
            },
            TickOutcome::Ready(m) => SummaryRow {
                phase: "run",
                t_s: elapsed_ms as f32 / 1000.0,
                mean: m.window.mean,
                std: m.window.std,
                peak_to_peak: m.window.peak_to_peak,
                grip_index: m.grip_index,
                decision: Some(m.stability.to_string()),
            },
            TickOutcome::NoData(_) => return,
        };
        let bucket = elapsed_ms / Self::PERIOD_MS;
        if self.last_bucket == Some(bucket) {
            return;
        }
        self.last_bucket = Some(bucket);
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }
}
