use std::{
    fs::File,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    config::MonitorConfig,
    error::Result,
    metrics::{EventWriter, EVENTS_FILE},
    util::ensure_dir,
};

/// File name of the tab-delimited progress log inside a trial's monitor directory
pub const PROGRESS_FILE: &str = "log.txt";

/// Tab-delimited `time_steps\t<item>...` table, header written with the first row
struct ProgressLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    header_written: bool,
}

impl ProgressLog {
    fn create(path: PathBuf) -> Result<Self> {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)?;
        Ok(Self {
            path,
            writer,
            header_written: false,
        })
    }

    fn write(&mut self, time_steps: u64, items: &[(String, Option<f64>)]) -> Result<()> {
        if !self.header_written {
            let header = std::iter::once("time_steps").chain(items.iter().map(|(k, _)| k.as_str()));
            self.writer.write_record(header)?;
            self.header_written = true;
        }
        let row = std::iter::once(time_steps.to_string()).chain(
            items
                .iter()
                .map(|(_, v)| v.map(|v| v.to_string()).unwrap_or_default()),
        );
        self.writer.write_record(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Periodic reporting of training-progress scalars
///
/// An agent sets the current value of its log items with [`Monitor::log`] and calls
/// [`Monitor::tick`] once per training iteration. Every `interval` iterations the items are
/// logged, appended to the progress log, and recorded as scalar events.
pub struct Monitor {
    interval: u64,
    iteration: u64,
    items: Vec<(String, Option<f64>)>,
    progress: Option<ProgressLog>,
    events: Option<EventWriter>,
}

impl Monitor {
    /// A monitor that reports every `interval` iterations through `log` only
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            iteration: 0,
            items: Vec::new(),
            progress: None,
            events: None,
        }
    }

    /// A monitor that never reports
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// The monitor for trial `index`, writing into `<output_dir>/trial_<index>/` when configured
    pub fn for_trial(config: &MonitorConfig, index: usize) -> Result<Self> {
        let monitor = Self::new(config.interval);
        match &config.output_dir {
            Some(dir) if config.interval > 0 => {
                let dir = dir.join(format!("trial_{index}"));
                ensure_dir(&dir)?;
                monitor
                    .with_progress_log(dir.join(PROGRESS_FILE))?
                    .with_events(dir.join(EVENTS_FILE))
            }
            _ => Ok(monitor),
        }
    }

    /// Also append rows to a tab-delimited progress log, truncating it first
    pub fn with_progress_log(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        self.progress = Some(ProgressLog::create(path.into())?);
        Ok(self)
    }

    /// Also record every reported value as a scalar event, truncating the file first
    pub fn with_events(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        self.events = Some(EventWriter::create(path)?);
        Ok(self)
    }

    /// Register log items up front so they get progress log columns in this order
    pub fn register(&mut self, keys: &[&str]) {
        for key in keys {
            self.slot(key);
        }
    }

    /// Set the current value of a log item
    pub fn log(&mut self, key: &str, value: f64) {
        if let Some(slot) = self.slot(key) {
            *slot = Some(value);
        }
    }

    /// Current value of a log item
    pub fn get(&self, key: &str) -> Option<f64> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| *v)
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn progress_log_path(&self) -> Option<&Path> {
        self.progress.as_ref().map(|p| p.path.as_path())
    }

    pub fn events_path(&self) -> Option<&Path> {
        self.events.as_ref().map(|e| e.path())
    }

    fn slot(&mut self, key: &str) -> Option<&mut Option<f64>> {
        if let Some(i) = self.items.iter().position(|(k, _)| k == key) {
            return Some(&mut self.items[i].1);
        }
        if self.progress.as_ref().is_some_and(|p| p.header_written) {
            warn!("log item `{key}` registered after the progress log header, ignoring");
            return None;
        }
        self.items.push((key.to_owned(), None));
        self.items.last_mut().map(|(_, v)| v)
    }

    /// End one training iteration, reporting if it falls on the monitor interval
    pub fn tick(&mut self, time_steps: u64) -> Result<()> {
        let due = self.interval > 0 && self.iteration % self.interval == 0;
        self.iteration += 1;
        if due {
            self.report(time_steps)?;
        }
        Ok(())
    }

    fn report(&mut self, time_steps: u64) -> Result<()> {
        let line = self
            .items
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v:.4}"),
                None => format!("{k}=-"),
            })
            .collect::<Vec<_>>()
            .join(" ");
        info!("time_steps={time_steps} {line}");

        if let Some(progress) = self.progress.as_mut() {
            progress.write(time_steps, &self.items)?;
        }
        if let Some(events) = self.events.as_mut() {
            for (k, v) in &self.items {
                if let Some(v) = v {
                    events.record(k, time_steps, *v)?;
                }
            }
        }
        Ok(())
    }

    /// Flush pending output
    pub fn finish(&mut self) -> Result<()> {
        if let Some(events) = self.events.as_mut() {
            events.flush()?;
        }
        Ok(())
    }
}
