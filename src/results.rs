//! The persisted per-trial result log
//!
//! One line per completed trial, no header: `mean_reward\tstd_reward\tduration_seconds`.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Summary of one completed training and evaluation trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialResult {
    pub trial_index: usize,
    /// Mean return over the evaluation episodes
    pub mean_reward: f64,
    /// Population standard deviation of the evaluation returns
    pub std_reward: f64,
    /// Wall-clock training time
    pub duration_seconds: f64,
}

/// The on-disk column layout
#[derive(Serialize, Deserialize)]
struct Row(f64, f64, f64);

fn builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.delimiter(b'\t').has_headers(false);
    builder
}

/// Append-only writer of [`TrialResult`] rows
///
/// The file is opened for each row and closed again, so a row is either fully written or
/// absent.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    /// Create the log file, discarding previous contents
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        File::create(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row
    pub fn append(&self, result: &TrialResult) -> Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = builder().from_writer(file);
        writer.serialize(Row(
            result.mean_reward,
            result.std_reward,
            result.duration_seconds,
        ))?;
        writer.flush()?;
        Ok(())
    }
}

/// Read a result log back, numbering trials by line
pub fn read_results(path: impl AsRef<Path>) -> Result<Vec<TrialResult>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;
    reader
        .deserialize()
        .enumerate()
        .map(|(trial_index, row)| {
            let Row(mean_reward, std_reward, duration_seconds) = row?;
            Ok(TrialResult {
                trial_index,
                mean_reward,
                std_reward,
                duration_seconds,
            })
        })
        .collect()
}

/// Aggregate statistics over a series of trials
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultSummary {
    pub trials: usize,
    /// Mean and population standard deviation of the per-trial mean rewards
    pub mean_reward: f64,
    pub std_reward: f64,
    pub mean_duration_seconds: f64,
}

impl ResultSummary {
    pub fn from_results(results: &[TrialResult]) -> Option<Self> {
        use statrs::statistics::Statistics;

        if results.is_empty() {
            return None;
        }
        let rewards = results.iter().map(|r| r.mean_reward);
        Some(Self {
            trials: results.len(),
            mean_reward: rewards.clone().mean(),
            std_reward: rewards.population_std_dev(),
            mean_duration_seconds: results.iter().map(|r| r.duration_seconds).mean(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn result(trial_index: usize, mean_reward: f64) -> TrialResult {
        TrialResult {
            trial_index,
            mean_reward,
            std_reward: 0.1 + trial_index as f64,
            duration_seconds: 1.0 / 3.0,
        }
    }

    #[test]
    fn rows_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::create(dir.path().join("eval.txt")).unwrap();
        let written = [result(0, 212.73456789), result(1, -87.1e-7)];
        for r in &written {
            log.append(r).unwrap();
        }

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("212.73456789\t0.1\t0.3333333333333333\n"));

        assert_eq!(read_results(log.path()).unwrap(), written);
    }

    #[test]
    fn create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.txt");
        fs::write(&path, "1\t2\t3\n4\t5\t6\n").unwrap();
        let log = ResultLog::create(&path).unwrap();
        assert!(read_results(log.path()).unwrap().is_empty());
    }

    #[test]
    fn create_fails_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = ResultLog::create(dir.path().join("missing").join("eval.txt"));
        assert!(result.is_err());
    }

    #[test]
    fn summary_over_trials() {
        let results = [result(0, 100.0), result(1, 200.0)];
        let summary = ResultSummary::from_results(&results).unwrap();
        assert_eq!(summary.trials, 2);
        assert_eq!(summary.mean_reward, 150.0);
        assert_eq!(summary.std_reward, 50.0);
        assert!(ResultSummary::from_results(&[]).is_none());
    }
}
