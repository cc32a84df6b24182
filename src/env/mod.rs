use rand::Rng;

use crate::error::Result;

mod vec_env;

pub use vec_env::{BatchStep, VecEnv, VecMode};

/// The outcome of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O> {
    /// Observation after the action was applied
    pub observation: O,
    /// Reward received for the action
    pub reward: f32,
    /// The episode reached a terminal state
    pub terminated: bool,
    /// The episode was cut short, e.g. by a time limit
    pub truncated: bool,
}

impl<O> Step<O> {
    /// Whether the episode ended with this step
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// An episodic environment in which an agent can operate
///
/// Observations and actions cross thread boundaries when environments run in
/// [`VecMode::Parallel`], so both must be `Send + 'static`. The environment itself
/// never leaves the thread that built it.
pub trait Environment {
    /// A representation of the environment passed to an agent
    type Observation: Clone + Send + 'static;

    /// A representation of an action that an agent can take to affect the environment
    type Action: Clone + Send + 'static;

    /// Reset the environment to an initial state
    ///
    /// A `Some` seed re-seeds the environment's randomness, `None` continues the current stream.
    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation>;

    /// Update the environment in response to an action taken by an agent
    fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>>;

    /// Sample a uniformly random valid action
    fn random_action<R: Rng + ?Sized>(rng: &mut R) -> Self::Action;

    /// Release any resources held by the environment
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds environment instances for a [`VecEnv`]
pub trait EnvFactory {
    type Env: Environment;

    /// Build the instance with the given rank in the batch
    fn make(&self, rank: usize) -> Result<Self::Env>;
}

impl<F, E> EnvFactory for F
where
    F: Fn(usize) -> Result<E>,
    E: Environment,
{
    type Env = E;

    fn make(&self, rank: usize) -> Result<E> {
        self(rank)
    }
}
