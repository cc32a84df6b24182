use gym_rs::core::{ActionReward, Env};
use gym_rs::envs::classical_control::cartpole::{CartPoleEnv, CartPoleObservation};
use gym_rs::utils::renderer::RenderMode;
use rand::Rng;
use strum::{FromRepr, VariantArray};

use crate::{
    env::{Environment, Step},
    error::Result,
};

/// Episode length at which CartPole-v1 is truncated
pub const MAX_EPISODE_STEPS: usize = 500;

fn obs2arr(observation: CartPoleObservation) -> [f32; 4] {
    let v = Vec::from(observation);
    std::array::from_fn(|i| v[i] as f32)
}

/// Actions for the [`CartPole`] environment, representing applying a left or right force to the cart
#[derive(FromRepr, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CPAction {
    Left = 0,
    Right = 1,
}

/// The classic CartPole environment with CartPole-v1 truncation
///
/// This implementation is a thin wrapper around [gym_rs](https://github.com/MathisWellmann/gym-rs)
#[derive(Debug, Clone)]
pub struct CartPole {
    gym_env: CartPoleEnv,
    t: usize,
}

impl CartPole {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            gym_env: CartPoleEnv::new(render_mode),
            t: 0,
        }
    }
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new(RenderMode::None)
    }
}

impl Environment for CartPole {
    type Observation = [f32; 4];
    type Action = CPAction;

    fn reset(&mut self, seed: Option<u64>) -> Result<[f32; 4]> {
        self.t = 0;
        Ok(obs2arr(self.gym_env.reset(seed, false, None).0))
    }

    fn step(&mut self, action: CPAction) -> Result<Step<[f32; 4]>> {
        let ActionReward {
            observation,
            reward,
            done,
            ..
        } = self.gym_env.step(action as usize);
        self.t += 1;

        Ok(Step {
            observation: obs2arr(observation),
            reward: *reward as f32,
            terminated: done,
            truncated: !done && self.t >= MAX_EPISODE_STEPS,
        })
    }

    fn random_action<R: Rng + ?Sized>(rng: &mut R) -> CPAction {
        CPAction::VARIANTS[rng.gen_range(0..CPAction::VARIANTS.len())]
    }
}
