//! Scalar metrics sinks
//!
//! Training reports `(tag, value, step)` triples for offline inspection. A
//! sink may fail; [`TrainingSession`](crate::session::TrainingSession) logs the
//! failure and carries on.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// One recorded scalar
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRecord {
    pub tag: String,
    pub value: f64,
    pub step: usize,
}

/// Destination for scalar metrics
pub trait MetricsSink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> io::Result<()>;

    /// Flush any buffered output
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Appends scalars to a CSV file with columns `tag,step,value,wall_time`
pub struct CsvScalarWriter {
    writer: BufWriter<File>,
}

impl CsvScalarWriter {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "tag,step,value,wall_time")?;
        Ok(Self { writer })
    }
}

impl MetricsSink for CsvScalarWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> io::Result<()> {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        writeln!(self.writer, "{tag},{step},{value},{wall_time:.3}")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Keeps every scalar in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<ScalarRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ScalarRecord] {
        &self.records
    }

    /// Values recorded under `tag`, in recording order
    pub fn values(&self, tag: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.tag == tag)
            .map(|r| r.value)
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> io::Result<()> {
        self.records.push(ScalarRecord {
            tag: tag.to_string(),
            value,
            step,
        });
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn add_scalar(&mut self, _tag: &str, _value: f64, _step: usize) -> io::Result<()> {
        Ok(())
    }
}
