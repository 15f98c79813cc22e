use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use grip_core::{SampleBatch, SampleSource};

use crate::error::StoreError;

/// Column positions resolved from a log header.
#[derive(Debug, Clone, Copy)]
struct Columns {
    t: usize,
    b: [usize; 3],
    accel: Option<[usize; 3]>,
    touch: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, StoreError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let need = |name: &str| find(name).ok_or_else(|| StoreError::parse(1, format!("missing column {name}")));
        let accel = match (find("ax"), find("ay"), find("az")) {
            (Some(x), Some(y), Some(z)) => Some([x, y, z]),
            _ => None,
        };
        Ok(Self {
            t: need("t_ms")?,
            b: [need("bx")?, need("by")?, need("bz")?],
            accel,
            touch: find("touch"),
        })
    }
}

/// Replays a raw session log as a [`SampleSource`].
///
/// Accepts the `t_ms;bx;by;bz;magnitude` layout and, when present, extra
/// `ax;ay;az` and `touch` columns. A touch radius of 0 means no contact.
#[derive(Debug, Clone, Default)]
pub struct CsvSampleSource {
    batches: VecDeque<SampleBatch>,
}

impl CsvSampleSource {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, StoreError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);
        let cols = Columns::from_headers(rdr.headers()?)?;

        let mut batches = VecDeque::new();
        for result in rdr.records() {
            let record = result?;
            batches.push_back(parse_record(&record, &cols)?);
        }
        log::debug!("loaded {} batches from log", batches.len());
        Ok(Self { batches })
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl SampleSource for CsvSampleSource {
    fn next_batch(&mut self) -> Option<SampleBatch> {
        self.batches.pop_front()
    }
}

fn parse_record(record: &StringRecord, cols: &Columns) -> Result<SampleBatch, StoreError> {
    let line_no = record.position().map_or(0, |p| p.line() as usize);
    let num = |idx: usize| -> Result<f64, StoreError> {
        let raw = record
            .get(idx)
            .ok_or_else(|| StoreError::parse(line_no, format!("expected at least {} fields", idx + 1)))?;
        raw.parse::<f64>()
            .map_err(|e| StoreError::parse(line_no, format!("{raw:?}: {e}")))
    };
    let vec3 = |idx: [usize; 3]| -> Result<[f32; 3], StoreError> {
        Ok([num(idx[0])? as f32, num(idx[1])? as f32, num(idx[2])? as f32])
    };

    let t = num(cols.t)?;
    if !(t >= 0.0 && t.is_finite()) {
        return Err(StoreError::parse(line_no, format!("bad timestamp {t}")));
    }
    let mut batch = SampleBatch::new(t.round() as u64, vec3(cols.b)?);
    if let Some(a) = cols.accel {
        batch = batch.with_accel(vec3(a)?);
    }
    if let Some(idx) = cols.touch {
        batch = batch.with_touch(num(idx)? as f32);
    }
    Ok(batch)
}
