use std::io;

use thiserror::Error;

/// Errors produced while configuring, running, or reporting on experiments
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid experiment configuration or hyperparameter value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An environment could not be built, reset, stepped, or closed
    #[error("environment error: {0}")]
    Env(String),

    /// An agent could not be built, trained, or (de)serialized
    #[error("agent error: {0}")]
    Agent(String),

    /// A trial was abandoned
    #[error("trial {index} failed: {source}")]
    Trial {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// A chart could not be rendered
    #[error("chart error: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Attach the index of the trial in which `err` occurred
    pub fn trial(index: usize, err: Error) -> Self {
        Self::Trial {
            index,
            source: Box::new(err),
        }
    }

    /// The failing trial index, if this error came out of a trial
    pub fn trial_index(&self) -> Option<usize> {
        match self {
            Self::Trial { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_error_names_index() {
        let err = Error::trial(2, Error::Agent(String::from("diverged")));
        assert_eq!(err.trial_index(), Some(2));
        assert_eq!(
            err.to_string(),
            "trial 2 failed: agent error: diverged",
            "display carries trial index and cause"
        );
    }
}
