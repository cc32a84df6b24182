use std::{fs, path::Path};

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Agent;
use crate::{
    config::Hyperparameters,
    env::{Environment, VecEnv},
    error::{Error, Result},
    monitor::Monitor,
};

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    seed: Option<u64>,
    time_steps: u64,
    episodes: u64,
}

/// Uniform random baseline
///
/// Acts uniformly at random during training and evaluation. Useful as a reference score
/// and for exercising environments and experiment plumbing.
pub struct RandomAgent {
    rng: StdRng,
    seed: Option<u64>,
    time_steps: u64,
    episodes: u64,
}

impl RandomAgent {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Self::rng(seed),
            seed,
            time_steps: 0,
            episodes: 0,
        }
    }

    fn rng(seed: Option<u64>) -> StdRng {
        seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }

    /// [`AgentBuilder`](super::AgentBuilder) for [`Hyperparameters::Random`]
    pub fn build<E: Environment>(
        hyperparameters: &Hyperparameters,
        _envs: &VecEnv<E>,
        seed: Option<u64>,
    ) -> Result<Self> {
        match hyperparameters {
            Hyperparameters::Random => Ok(Self::new(seed)),
            other => Err(Error::Config(format!(
                "random agent cannot use `{}` hyperparameters",
                other.algo()
            ))),
        }
    }

    /// Environment steps taken across all calls to `learn`
    pub fn time_steps(&self) -> u64 {
        self.time_steps
    }

    /// Episodes completed during training
    pub fn episodes(&self) -> u64 {
        self.episodes
    }
}

impl<E: Environment> Agent<E> for RandomAgent {
    fn learn(
        &mut self,
        envs: &mut VecEnv<E>,
        total_steps: u64,
        monitor: &mut Monitor,
    ) -> Result<()> {
        let n = envs.num_envs();
        let mut returns = vec![0.0; n];
        let mut lengths = vec![0u64; n];
        monitor.register(&["episodes", "episode_reward", "episode_length"]);

        envs.reset()?;
        let mut steps = 0;
        while steps < total_steps {
            let actions = envs.random_actions(&mut self.rng);
            let batch = envs.step(actions)?;
            steps += n as u64;
            self.time_steps += n as u64;

            for r in 0..n {
                returns[r] += f64::from(batch.rewards[r]);
                lengths[r] += 1;
                if batch.done(r) {
                    self.episodes += 1;
                    monitor.log("episode_reward", returns[r]);
                    monitor.log("episode_length", lengths[r] as f64);
                    returns[r] = 0.0;
                    lengths[r] = 0;
                }
            }

            monitor.log("episodes", self.episodes as f64);
            monitor.tick(self.time_steps)?;
        }
        monitor.finish()
    }

    fn predict(&mut self, _observation: &E::Observation, _deterministic: bool) -> E::Action {
        E::random_action(&mut self.rng)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint {
            seed: self.seed,
            time_steps: self.time_steps,
            episodes: self.episodes,
        };
        fs::write(path, serde_json::to_vec_pretty(&checkpoint)?)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let checkpoint: Checkpoint = serde_json::from_slice(&fs::read(path)?)?;
        self.time_steps = checkpoint.time_steps;
        self.episodes = checkpoint.episodes;
        // Continue a distinct stream rather than replaying the checkpointed one
        self.rng = Self::rng(
            checkpoint
                .seed
                .map(|s| s.wrapping_add(checkpoint.time_steps)),
        );
        Ok(())
    }
}
