//! Training session context
//!
//! A [`TrainingSession`] owns everything that outlives a single episode but is
//! not part of the agent: the global step and episode counters, the metrics
//! sink and the run's summary directory. It is created when a run starts and
//! [closed](TrainingSession::close) when it ends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::{
    config::Params,
    error::{Error, Result},
    metrics::{CsvScalarWriter, MetricsSink},
};

/// File name of the scalar log inside the summary directory
pub const SCALARS_FILE: &str = "scalars.csv";

impl MetricsSink for Box<dyn MetricsSink> {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> io::Result<()> {
        (**self).add_scalar(tag, value, step)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Counters and metrics of one training run
pub struct TrainingSession<S: MetricsSink = Box<dyn MetricsSink>> {
    sink: S,
    summary_dir: Option<PathBuf>,
    global_step: usize,
    episode: usize,
    failed_writes: usize,
}

impl TrainingSession {
    /// Start a run that logs into `<prefix><env_name>_<yy-mm-dd-HH-MM>/`
    ///
    /// The directory receives the exported parameters and a CSV scalar log.
    pub fn create(params: &Params, env_name: &str) -> Result<Self> {
        let summary_dir = PathBuf::from(format!(
            "{}{}_{}",
            params.agent.summary_file_path_prefix,
            env_name,
            Local::now().format("%y-%m-%d-%H-%M")
        ));
        Self::create_in(params, summary_dir)
    }

    /// Start a run that logs into `summary_dir`
    pub fn create_in(params: &Params, summary_dir: impl Into<PathBuf>) -> Result<Self> {
        let summary_dir = summary_dir.into();
        fs::create_dir_all(&summary_dir).map_err(|e| Error::io(&summary_dir, e))?;
        params.export(&summary_dir)?;

        let scalars = summary_dir.join(SCALARS_FILE);
        let sink = CsvScalarWriter::create(&scalars).map_err(|e| Error::io(&scalars, e))?;
        info!(summary_dir = %summary_dir.display(), "training session opened");

        let mut session = TrainingSession::new(Box::new(sink) as Box<dyn MetricsSink>);
        session.summary_dir = Some(summary_dir);
        Ok(session)
    }
}

impl<S: MetricsSink> TrainingSession<S> {
    /// A session without a summary directory
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            summary_dir: None,
            global_step: 0,
            episode: 0,
            failed_writes: 0,
        }
    }

    /// Record `value` under `tag` at the current global step
    pub fn record(&mut self, tag: &str, value: f64) {
        self.record_at(tag, value, self.global_step);
    }

    /// Record `value` under `tag` at an explicit step
    ///
    /// Sink failures are logged and counted, never propagated.
    pub fn record_at(&mut self, tag: &str, value: f64, step: usize) {
        if let Err(err) = self.sink.add_scalar(tag, value, step) {
            self.failed_writes += 1;
            warn!(tag, step, error = %err, "failed to record metric");
        }
    }

    /// Move the global step counter forward by one environment step
    pub fn advance_step(&mut self) {
        self.global_step += 1;
    }

    pub fn begin_episode(&mut self, episode: usize) {
        self.episode = episode;
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn summary_dir(&self) -> Option<&Path> {
        self.summary_dir.as_deref()
    }

    /// Number of metrics the sink refused
    pub fn failed_writes(&self) -> usize {
        self.failed_writes
    }

    /// End the run, flushing the sink, and hand the sink back
    pub fn close(mut self) -> S {
        if let Err(err) = self.sink.flush() {
            warn!(error = %err, "failed to flush metrics");
        }
        info!(
            global_step = self.global_step,
            episodes = self.episode + 1,
            failed_writes = self.failed_writes,
            "training session closed"
        );
        self.sink
    }
}
