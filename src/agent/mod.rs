use std::path::Path;

use crate::{
    config::Hyperparameters,
    env::{Environment, VecEnv},
    error::Result,
    monitor::Monitor,
};

mod random;

pub use random::RandomAgent;

/// A trainable policy acting in an [`Environment`]
///
/// The learning algorithm is opaque to the harness: it only trains for a step budget,
/// queries actions, and persists checkpoints.
pub trait Agent<E: Environment> {
    /// Train for `total_steps` environment steps collected from `envs`
    ///
    /// Progress is reported through `monitor`, which the agent ticks once per iteration.
    fn learn(&mut self, envs: &mut VecEnv<E>, total_steps: u64, monitor: &mut Monitor)
        -> Result<()>;

    /// Choose an action for an observation
    fn predict(&mut self, observation: &E::Observation, deterministic: bool) -> E::Action;

    /// Write a checkpoint to `path`
    fn save(&self, path: &Path) -> Result<()>;

    /// Restore state from a checkpoint written by [`Agent::save`]
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// Builds a fresh agent for each trial
pub trait AgentBuilder<E: Environment> {
    type Agent: Agent<E>;

    /// Build an agent bound to `envs`, seeded with `seed` when seeding is enabled
    fn build(
        &self,
        hyperparameters: &Hyperparameters,
        envs: &VecEnv<E>,
        seed: Option<u64>,
    ) -> Result<Self::Agent>;
}

impl<F, E, A> AgentBuilder<E> for F
where
    F: Fn(&Hyperparameters, &VecEnv<E>, Option<u64>) -> Result<A>,
    E: Environment,
    A: Agent<E>,
{
    type Agent = A;

    fn build(
        &self,
        hyperparameters: &Hyperparameters,
        envs: &VecEnv<E>,
        seed: Option<u64>,
    ) -> Result<A> {
        self(hyperparameters, envs, seed)
    }
}
