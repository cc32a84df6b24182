//! Experiment and hyperparameter configuration
//!
//! Every structure here deserializes from TOML. Hyperparameters are tagged by the agent
//! family they configure:
//!
//! ```toml
//! num_trials = 20
//! steps_per_trial = 1000000
//! eval_episodes = 100
//! num_envs = 16
//! log_path = "data/ppo/lunar_lander/eval.txt"
//!
//! [hyperparameters]
//! algo = "ppo"
//! learning_rate = 3e-4
//! vf_coef = 0.1
//! ```

use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    env::VecMode,
    error::{Error, Result},
    util::{ensure_interval, ensure_positive},
};

/// Hyperparameters for a deep Q network agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DqnParams {
    pub learning_rate: f64,
    /// Capacity of the replay buffer
    pub buffer_size: usize,
    /// Environment steps collected before learning starts
    pub learning_starts: usize,
    pub batch_size: usize,
    /// Soft update coefficient, 1.0 for hard target updates
    pub tau: f64,
    pub gamma: f64,
    /// Environment steps between gradient updates
    pub train_freq: usize,
    pub gradient_steps: usize,
    /// Environment steps between target network updates
    pub target_update_interval: usize,
    /// Fraction of the training budget over which epsilon is annealed
    pub exploration_fraction: f64,
    pub exploration_initial_eps: f64,
    pub exploration_final_eps: f64,
    pub max_grad_norm: f64,
}

impl Default for DqnParams {
    fn default() -> Self {
        Self {
            learning_rate: 6.3e-4,
            buffer_size: 50_000,
            learning_starts: 100,
            batch_size: 128,
            tau: 1.0,
            gamma: 0.99,
            train_freq: 4,
            gradient_steps: 1,
            target_update_interval: 250,
            exploration_fraction: 0.12,
            exploration_initial_eps: 1.0,
            exploration_final_eps: 0.1,
            max_grad_norm: 10.0,
        }
    }
}

impl DqnParams {
    pub fn validate(&self) -> Result<()> {
        let &Self {
            learning_rate,
            buffer_size,
            batch_size,
            tau,
            gamma,
            train_freq,
            target_update_interval,
            exploration_fraction,
            exploration_initial_eps,
            exploration_final_eps,
            max_grad_norm,
            ..
        } = self;
        check_learning_rate(learning_rate)?;
        ensure_positive!(buffer_size);
        ensure_positive!(batch_size);
        ensure_positive!(train_freq);
        ensure_positive!(target_update_interval);
        ensure_interval!(tau, f64::MIN_POSITIVE, 1.0);
        ensure_interval!(gamma, 0.0, 1.0);
        ensure_interval!(exploration_fraction, 0.0, 1.0);
        ensure_interval!(exploration_initial_eps, 0.0, 1.0);
        ensure_interval!(exploration_final_eps, 0.0, exploration_initial_eps);
        check_grad_norm(max_grad_norm)?;
        if batch_size > buffer_size {
            return Err(Error::Config(format!(
                "`batch_size` ({batch_size}) exceeds `buffer_size` ({buffer_size})"
            )));
        }
        Ok(())
    }
}

/// Hyperparameters for a proximal policy optimization agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpoParams {
    pub learning_rate: f64,
    /// Steps collected per environment instance between updates
    pub n_steps: usize,
    pub batch_size: usize,
    pub n_epochs: usize,
    pub gamma: f64,
    pub gae_lambda: f64,
    pub clip_range: f64,
    pub clip_range_vf: Option<f64>,
    pub normalize_advantage: bool,
    /// Entropy loss coefficient
    pub ent_coef: f64,
    /// Value loss coefficient
    pub vf_coef: f64,
    pub max_grad_norm: f64,
    pub target_kl: Option<f64>,
}

impl Default for PpoParams {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            n_steps: 1024,
            batch_size: 64,
            n_epochs: 4,
            gamma: 0.99,
            gae_lambda: 0.98,
            clip_range: 0.2,
            clip_range_vf: None,
            normalize_advantage: false,
            ent_coef: 0.01,
            vf_coef: 0.5,
            max_grad_norm: 0.5,
            target_kl: None,
        }
    }
}

impl PpoParams {
    pub fn validate(&self) -> Result<()> {
        let &Self {
            learning_rate,
            n_steps,
            batch_size,
            n_epochs,
            gamma,
            gae_lambda,
            clip_range,
            ent_coef,
            vf_coef,
            max_grad_norm,
            ..
        } = self;
        check_learning_rate(learning_rate)?;
        ensure_positive!(n_steps);
        ensure_positive!(batch_size);
        ensure_positive!(n_epochs);
        ensure_interval!(gamma, 0.0, 1.0);
        ensure_interval!(gae_lambda, 0.0, 1.0);
        ensure_interval!(clip_range, f64::MIN_POSITIVE, f64::MAX);
        ensure_interval!(ent_coef, 0.0, f64::MAX);
        ensure_interval!(vf_coef, 0.0, f64::MAX);
        check_grad_norm(max_grad_norm)?;
        if let Some(clip_range_vf) = self.clip_range_vf {
            ensure_interval!(clip_range_vf, f64::MIN_POSITIVE, f64::MAX);
        }
        if let Some(target_kl) = self.target_kl {
            ensure_interval!(target_kl, f64::MIN_POSITIVE, f64::MAX);
        }
        Ok(())
    }
}

/// A coefficient that is either tuned automatically or fixed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coefficient {
    Auto(AutoTag),
    Fixed(f64),
}

/// The literal `"auto"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoTag {
    Auto,
}

impl Coefficient {
    pub const AUTO: Self = Self::Auto(AutoTag::Auto);

    pub fn fixed(&self) -> Option<f64> {
        match self {
            Self::Auto(_) => None,
            Self::Fixed(v) => Some(*v),
        }
    }
}

/// Hyperparameters for a soft actor-critic agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SacParams {
    pub learning_rate: f64,
    pub buffer_size: usize,
    pub learning_starts: usize,
    pub batch_size: usize,
    pub tau: f64,
    pub gamma: f64,
    pub train_freq: usize,
    pub gradient_steps: usize,
    /// Entropy regularization coefficient
    pub ent_coef: Coefficient,
    pub target_update_interval: usize,
    pub target_entropy: Coefficient,
}

impl Default for SacParams {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            buffer_size: 50_000,
            learning_starts: 0,
            batch_size: 256,
            tau: 0.01,
            gamma: 0.99,
            train_freq: 1,
            gradient_steps: 1,
            ent_coef: Coefficient::AUTO,
            target_update_interval: 1,
            target_entropy: Coefficient::AUTO,
        }
    }
}

impl SacParams {
    pub fn validate(&self) -> Result<()> {
        let &Self {
            learning_rate,
            buffer_size,
            batch_size,
            tau,
            gamma,
            train_freq,
            target_update_interval,
            ..
        } = self;
        check_learning_rate(learning_rate)?;
        ensure_positive!(buffer_size);
        ensure_positive!(batch_size);
        ensure_positive!(train_freq);
        ensure_positive!(target_update_interval);
        ensure_interval!(tau, f64::MIN_POSITIVE, 1.0);
        ensure_interval!(gamma, 0.0, 1.0);
        if let Some(ent_coef) = self.ent_coef.fixed() {
            ensure_interval!(ent_coef, 0.0, f64::MAX);
        }
        Ok(())
    }
}

fn check_learning_rate(learning_rate: f64) -> Result<()> {
    ensure_interval!(learning_rate, f64::MIN_POSITIVE, f64::MAX);
    Ok(())
}

fn check_grad_norm(max_grad_norm: f64) -> Result<()> {
    ensure_interval!(max_grad_norm, f64::MIN_POSITIVE, f64::MAX);
    Ok(())
}

/// Hyperparameters for the agent family used in an experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algo", rename_all = "snake_case")]
pub enum Hyperparameters {
    Dqn(DqnParams),
    Ppo(PpoParams),
    Sac(SacParams),
    /// Uniform random baseline, no tunable options
    #[default]
    Random,
}

impl Hyperparameters {
    /// Short name of the agent family
    pub fn algo(&self) -> &'static str {
        match self {
            Self::Dqn(_) => "dqn",
            Self::Ppo(_) => "ppo",
            Self::Sac(_) => "sac",
            Self::Random => "random",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Dqn(p) => p.validate(),
            Self::Ppo(p) => p.validate(),
            Self::Sac(p) => p.validate(),
            Self::Random => Ok(()),
        }
    }
}

/// Training-progress logging for each trial
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Training iterations between progress rows, 0 disables monitoring
    pub interval: u64,
    /// Directory receiving `trial_<i>/log.txt` and `trial_<i>/events.jsonl`
    pub output_dir: Option<PathBuf>,
}

/// Everything needed to run a series of trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub num_trials: usize,
    /// Training budget per trial, in environment steps
    pub steps_per_trial: u64,
    /// Evaluation budget per trial, in complete episodes
    pub eval_episodes: usize,
    #[serde(default = "default_num_envs")]
    pub num_envs: usize,
    #[serde(default)]
    pub vec_mode: VecMode,
    /// Trial `i` is seeded with `seed_base + i`
    #[serde(default)]
    pub seed_base: u64,
    /// When false, environments and agents are left unseeded
    #[serde(default = "default_true")]
    pub seeding: bool,
    /// Destination of the tab-delimited result log
    pub log_path: PathBuf,
    /// Directory receiving `trial_<i>.ckpt` after each trial's training
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
    /// Start each trial after the first from the previous trial's checkpoint
    #[serde(default)]
    pub warm_start: bool,
    #[serde(default = "default_true")]
    pub deterministic_eval: bool,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
}

fn default_num_envs() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl ExperimentConfig {
    /// A configuration with default options and the given budgets
    pub fn new(
        num_trials: usize,
        steps_per_trial: u64,
        eval_episodes: usize,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            num_trials,
            steps_per_trial,
            eval_episodes,
            num_envs: default_num_envs(),
            vec_mode: VecMode::default(),
            seed_base: 0,
            seeding: true,
            log_path: log_path.into(),
            checkpoint_dir: None,
            warm_start: false,
            deterministic_eval: true,
            monitor: MonitorConfig::default(),
            hyperparameters: Hyperparameters::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Reject configurations that could not run to completion
    pub fn validate(&self) -> Result<()> {
        let &Self {
            steps_per_trial,
            eval_episodes,
            num_envs,
            ..
        } = self;
        ensure_positive!(steps_per_trial);
        ensure_positive!(eval_episodes);
        ensure_positive!(num_envs);
        if self.warm_start && self.checkpoint_dir.is_none() {
            return Err(Error::Config(String::from(
                "`warm_start` requires `checkpoint_dir`",
            )));
        }
        if self
            .seed_base
            .checked_add((self.num_trials + num_envs) as u64)
            .is_none()
        {
            return Err(Error::Config(String::from(
                "`seed_base` leaves no room for per-trial seeds",
            )));
        }
        self.hyperparameters.validate()
    }

    /// Seed for trial `index`, `None` when seeding is disabled
    pub fn trial_seed(&self, index: usize) -> Option<u64> {
        self.seeding.then(|| self.seed_base + index as u64)
    }

    /// Checkpoint path for trial `index`
    pub fn checkpoint_path(&self, index: usize) -> Option<PathBuf> {
        self.checkpoint_dir
            .as_ref()
            .map(|dir| dir.join(format!("trial_{index}.ckpt")))
    }
}
