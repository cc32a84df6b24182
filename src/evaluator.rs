use statrs::statistics::Statistics;

use crate::{
    agent::Agent,
    env::{Environment, VecEnv},
    error::{Error, Result},
};

/// Mean and standard deviation of evaluation returns
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub mean_reward: f64,
    /// Population standard deviation, 0 for a single episode
    pub std_reward: f64,
}

/// Runs a trained agent for a fixed number of complete episodes and collects returns
///
/// Episodes are split across the batch up front: instance `r` of `n` runs
/// `(episodes + r) / n` of them. Counting whichever episodes finish first would
/// over-represent short episodes.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    episode_rewards: Vec<f64>,
    episode_lengths: Vec<u64>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget previously collected episodes
    pub fn reset(&mut self) {
        self.episode_rewards.clear();
        self.episode_lengths.clear();
    }

    /// Per-episode returns, grouped by completion step
    pub fn episode_rewards(&self) -> &[f64] {
        &self.episode_rewards
    }

    pub fn episode_lengths(&self) -> &[u64] {
        &self.episode_lengths
    }

    /// Evaluate `agent` for exactly `num_episodes` episodes
    ///
    /// Statistics cover every episode collected since the last [`Evaluator::reset`].
    pub fn evaluate<E, A>(
        &mut self,
        agent: &mut A,
        envs: &mut VecEnv<E>,
        num_episodes: usize,
        deterministic: bool,
    ) -> Result<EvalSummary>
    where
        E: Environment,
        A: Agent<E>,
    {
        if num_episodes == 0 {
            return Err(Error::Config(String::from(
                "evaluation needs at least one episode",
            )));
        }

        let n = envs.num_envs();
        let targets: Vec<usize> = (0..n).map(|r| (num_episodes + r) / n).collect();
        let mut counts = vec![0; n];
        let mut returns = vec![0.0; n];
        let mut lengths = vec![0u64; n];
        self.episode_rewards.reserve(num_episodes);
        self.episode_lengths.reserve(num_episodes);

        let mut observations = envs.reset()?;
        while counts.iter().zip(&targets).any(|(c, t)| c < t) {
            let actions = observations
                .iter()
                .map(|obs| agent.predict(obs, deterministic))
                .collect();
            let batch = envs.step(actions)?;

            for r in 0..n {
                returns[r] += f64::from(batch.rewards[r]);
                lengths[r] += 1;
                if batch.done(r) {
                    if counts[r] < targets[r] {
                        self.episode_rewards.push(returns[r]);
                        self.episode_lengths.push(lengths[r]);
                        counts[r] += 1;
                    }
                    returns[r] = 0.0;
                    lengths[r] = 0;
                }
            }
            observations = batch.observations;
        }

        Ok(self.summary())
    }

    fn summary(&self) -> EvalSummary {
        let rewards = &self.episode_rewards;
        EvalSummary {
            mean_reward: rewards.mean(),
            std_reward: rewards.population_std_dev(),
        }
    }
}
