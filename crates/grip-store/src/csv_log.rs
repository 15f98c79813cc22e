use std::fs;
use std::path::{Path, PathBuf};

use csv::{Terminator, Writer, WriterBuilder};
use grip_core::{LogSink, RawSample, SessionError, SummaryLog};

use crate::error::StoreError;

pub const LOG_COLUMNS: [&str; 5] = ["t_ms", "bx", "by", "bz", "magnitude"];

fn writer(path: &Path, delimiter: u8) -> Result<Writer<fs::File>, StoreError> {
    Ok(WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_path(path)?)
}

/// Writes raw session logs as `;`-separated text under one directory.
#[derive(Debug, Clone)]
pub struct CsvLogSink {
    dir: PathBuf,
}

impl CsvLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("mag_{session_id}.csv"))
    }

    fn write(&self, session_id: &str, samples: &[RawSample]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(session_id);
        let mut w = writer(&path, b';')?;
        w.write_record(LOG_COLUMNS)?;
        for s in samples {
            w.write_record([
                format!("{:.1}", s.t_ms),
                format!("{:.4}", s.bx),
                format!("{:.4}", s.by),
                format!("{:.4}", s.bz),
                format!("{:.4}", s.magnitude),
            ])?;
        }
        w.flush()?;
        Ok(path)
    }
}

impl LogSink for CsvLogSink {
    fn write_log(&mut self, session_id: &str, samples: &[RawSample]) -> Result<String, SessionError> {
        let path = self
            .write(session_id, samples)
            .map_err(|e| SessionError::Sink(e.to_string()))?;
        log::info!("session log saved: {} ({} samples)", path.display(), samples.len());
        Ok(path.display().to_string())
    }
}

/// Write `summary` as `summary_{id}.csv` in `dir`, header first.
pub fn write_summary(dir: &Path, session_id: &str, summary: &SummaryLog) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("summary_{session_id}.csv"));
    let mut w = writer(&path, b',')?;
    w.write_record(SummaryLog::COLUMNS)?;
    for row in summary.rows() {
        w.write_record(row.fields())?;
    }
    w.flush()?;
    log::info!("summary saved: {} ({} rows)", path.display(), summary.rows().len());
    Ok(path)
}
