//! Step-indexed scalar metrics recorded during training

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the event log inside a metrics directory
pub const EVENTS_FILE: &str = "events.jsonl";

/// A read-only collection of named, step-indexed scalar series
pub trait MetricsStore {
    /// Every metric name in the store, in the order the metrics were first recorded
    fn metric_names(&self) -> Vec<String>;

    /// Recorded `(step, value)` points for a metric, in recording order
    fn values(&self, name: &str) -> Vec<(u64, f64)>;
}

/// A single recorded scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub tag: String,
    pub step: u64,
    pub value: f64,
}

/// Series keyed by name, remembering first-appearance order
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    names: Vec<String>,
    index: HashMap<String, usize>,
    series: Vec<Vec<(u64, f64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tag: &str, step: u64, value: f64) {
        let i = match self.index.get(tag) {
            Some(&i) => i,
            None => {
                self.names.push(tag.to_owned());
                self.series.push(Vec::new());
                self.index.insert(tag.to_owned(), self.names.len() - 1);
                self.names.len() - 1
            }
        };
        self.series[i].push((step, value));
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl MetricsStore for MemoryStore {
    fn metric_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn values(&self, name: &str) -> Vec<(u64, f64)> {
        self.index
            .get(name)
            .map(|&i| self.series[i].clone())
            .unwrap_or_default()
    }
}

/// Appends [`ScalarEvent`]s to a JSON lines file
pub struct EventWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl EventWriter {
    /// Create (or truncate) an event file
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, tag: &str, step: u64, value: f64) -> Result<()> {
        let event = ScalarEvent {
            tag: tag.to_owned(),
            step,
            value,
        };
        serde_json::to_writer(&mut self.out, &event)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.out.flush()?)
    }
}

/// A [`MetricsStore`] loaded from an event file written by [`EventWriter`]
#[derive(Debug, Clone)]
pub struct EventFileStore {
    path: PathBuf,
    store: MemoryStore,
}

impl EventFileStore {
    /// Load an event file, or the [`EVENTS_FILE`] inside a directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = if path.is_dir() {
            path.join(EVENTS_FILE)
        } else {
            path.to_path_buf()
        };

        let reader = BufReader::new(File::open(&path)?);
        let mut store = MemoryStore::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: ScalarEvent = serde_json::from_str(&line).map_err(|e| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{}:{}: {e}", path.display(), i + 1),
                ))
            })?;
            store.record(&event.tag, event.step, event.value);
        }

        Ok(Self { path, store })
    }

    /// Path of the event file that was loaded
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsStore for EventFileStore {
    fn metric_names(&self) -> Vec<String> {
        self.store.metric_names()
    }

    fn values(&self, name: &str) -> Vec<(u64, f64)> {
        self.store.values(name)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn memory_store_discovery_order() {
        let mut store = MemoryStore::new();
        store.record("loss", 0, 1.0);
        store.record("reward", 0, -3.0);
        store.record("loss", 1, 0.5);

        assert_eq!(store.metric_names(), ["loss", "reward"]);
        assert_eq!(store.values("loss"), [(0, 1.0), (1, 0.5)]);
        assert!(store.values("missing").is_empty());
    }

    #[test]
    fn event_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = EventWriter::create(dir.path().join(EVENTS_FILE)).unwrap();
        writer.record("episode_reward", 10, 21.5).unwrap();
        writer.record("loss", 10, 0.25).unwrap();
        writer.record("episode_reward", 20, 30.0).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let store = EventFileStore::open(dir.path()).unwrap();
        assert_eq!(store.metric_names(), ["episode_reward", "loss"]);
        assert_eq!(store.values("episode_reward"), [(10, 21.5), (20, 30.0)]);
        assert_eq!(store.path(), dir.path().join(EVENTS_FILE));
    }

    #[test]
    fn malformed_event_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"tag\":\"a\",\"step\":0,\"value\":1.0}\nnot json\n").unwrap();
        let err = EventFileStore::open(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"), "error names line 2: {err}");
    }
}
