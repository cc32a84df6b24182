use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::{
    env::{Environment, Step},
    error::{Error, Result},
};

/// K-armed bandit environment with a fixed episode length
///
/// Each arm pays a reward drawn from `N(q, 1)`, where the arm means `q` are drawn from
/// `N(0, 1)` whenever the environment is seeded. Episodes never terminate; they are
/// truncated after `step_limit` pulls.
pub struct KArmedBandit<const K: usize> {
    arms: [Normal<f32>; K],
    rng: StdRng,
    step_limit: usize,
    t: usize,
}

impl<const K: usize> KArmedBandit<K> {
    /// Initialize a new K-armed bandit environment
    pub fn new(step_limit: usize) -> Self {
        Self::with_rng(step_limit, StdRng::from_entropy())
    }

    fn with_rng(step_limit: usize, mut rng: StdRng) -> Self {
        let arms = Self::draw_arms(&mut rng);
        Self {
            arms,
            rng,
            step_limit: step_limit.max(1),
            t: 0,
        }
    }

    fn draw_arms(rng: &mut StdRng) -> [Normal<f32>; K] {
        let dist = Normal::<f32>::new(0.0, 1.0).expect("unit normal is valid");
        std::array::from_fn(|_| {
            let mean = dist.sample(rng);
            Normal::new(mean, 1.0).expect("unit variance is valid")
        })
    }
}

impl<const K: usize> Environment for KArmedBandit<K> {
    /// Number of pulls so far in the episode
    type Observation = usize;
    type Action = usize;

    fn reset(&mut self, seed: Option<u64>) -> Result<usize> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
            self.arms = Self::draw_arms(&mut self.rng);
        }
        self.t = 0;
        Ok(0)
    }

    fn step(&mut self, action: usize) -> Result<Step<usize>> {
        if action >= K {
            return Err(Error::Env(format!("invalid arm {action} for {K}-armed bandit")));
        }
        self.t += 1;
        Ok(Step {
            observation: self.t,
            reward: self.arms[action].sample(&mut self.rng),
            terminated: false,
            truncated: self.t >= self.step_limit,
        })
    }

    fn random_action<R: Rng + ?Sized>(rng: &mut R) -> usize {
        rng.gen_range(0..K)
    }
}
