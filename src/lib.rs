/// Trained policies and the agent seam
pub mod agent;

/// Charting of exported tables
pub mod chart;

/// Experiment and hyperparameter configuration
pub mod config;

/// Environments and vectorized batches of them
pub mod env;

/// Error type shared by every fallible operation
pub mod error;

/// Evaluation of trained agents
pub mod evaluator;

/// Export of recorded metrics to flat tables
pub mod export;

/// Testing environments
pub mod gym;

/// The trials loop
pub mod harness;

/// Step-indexed scalar metrics
pub mod metrics;

/// Training-progress logging
pub mod monitor;

/// Trial results and the result log
pub mod results;

/// Terminal dashboards
#[cfg(feature = "viz")]
pub mod viz;

mod util;

pub use agent::{Agent, AgentBuilder, RandomAgent};
pub use config::{ExperimentConfig, Hyperparameters};
pub use env::{EnvFactory, Environment, Step, VecEnv, VecMode};
pub use error::{Error, Result};
pub use harness::Harness;
pub use results::TrialResult;
