use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl StoreError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        StoreError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
