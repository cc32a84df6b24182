use std::{sync::Arc, time::Instant};

use log::{error, info};

use crate::{
    agent::{Agent, AgentBuilder},
    config::ExperimentConfig,
    env::{EnvFactory, Environment, VecEnv},
    error::{Error, Result},
    evaluator::Evaluator,
    monitor::Monitor,
    results::{ResultLog, TrialResult},
    util::ensure_dir,
};

/// Runs a series of independent train-then-evaluate trials
///
/// Each trial gets freshly built environments and a freshly built agent, seeded from the
/// trial index. Results are appended to the result log as soon as a trial completes, so a
/// failure in trial `i` leaves the rows of trials `0..i` behind.
pub struct Harness {
    config: ExperimentConfig,
}

impl Harness {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    /// Run every trial, returning their results in order
    pub fn run<F, B>(&self, factory: F, builder: B) -> Result<Vec<TrialResult>>
    where
        F: EnvFactory + Send + Sync + 'static,
        F::Env: 'static,
        B: AgentBuilder<F::Env>,
    {
        self.run_with(factory, builder, |_| {})
    }

    /// Like [`Harness::run`], calling `on_trial` after each trial's row is written
    pub fn run_with<F, B>(
        &self,
        factory: F,
        builder: B,
        mut on_trial: impl FnMut(&TrialResult),
    ) -> Result<Vec<TrialResult>>
    where
        F: EnvFactory + Send + Sync + 'static,
        F::Env: 'static,
        B: AgentBuilder<F::Env>,
    {
        self.config.validate()?;
        let log = ResultLog::create(&self.config.log_path)?;
        let factory = Arc::new(factory);

        info!(
            "running {} trials of {} steps, results in {}",
            self.config.num_trials,
            self.config.steps_per_trial,
            log.path().display()
        );

        let mut results = Vec::with_capacity(self.config.num_trials);
        for index in 0..self.config.num_trials {
            let result = match self.trial(index, &factory, &builder) {
                Ok(result) => result,
                Err(e) => {
                    error!("trial {index} failed: {e}");
                    return Err(Error::trial(index, e));
                }
            };
            log.append(&result).map_err(|e| Error::trial(index, e))?;
            info!(
                "trial {index}: mean reward {:.3} +/- {:.3}, trained in {:.2}s",
                result.mean_reward, result.std_reward, result.duration_seconds
            );
            on_trial(&result);
            results.push(result);
        }
        Ok(results)
    }

    fn trial<F, B>(&self, index: usize, factory: &Arc<F>, builder: &B) -> Result<TrialResult>
    where
        F: EnvFactory + Send + Sync + 'static,
        F::Env: 'static,
        B: AgentBuilder<F::Env>,
    {
        let config = &self.config;
        let seed = config.trial_seed(index);
        info!("trial {index} starting (seed {seed:?})");

        let mut envs = VecEnv::new(factory.clone(), config.num_envs, seed, config.vec_mode)?;
        let mut agent = builder.build(&config.hyperparameters, &envs, seed)?;
        if config.warm_start && index > 0 {
            if let Some(path) = config.checkpoint_path(index - 1) {
                info!("trial {index} resuming from {}", path.display());
                agent.load(&path)?;
            }
        }

        let mut monitor = Monitor::for_trial(&config.monitor, index)?;
        let duration_seconds = train(&mut agent, &mut envs, config.steps_per_trial, &mut monitor)?;

        if let Some(path) = config.checkpoint_path(index) {
            if let Some(dir) = path.parent() {
                ensure_dir(dir)?;
            }
            agent.save(&path)?;
        }

        let summary = Evaluator::new().evaluate(
            &mut agent,
            &mut envs,
            config.eval_episodes,
            config.deterministic_eval,
        )?;
        envs.close()?;

        Ok(TrialResult {
            trial_index: index,
            mean_reward: summary.mean_reward,
            std_reward: summary.std_reward,
            duration_seconds,
        })
    }
}

/// Train and return the elapsed wall-clock seconds
fn train<E: Environment, A: Agent<E>>(
    agent: &mut A,
    envs: &mut VecEnv<E>,
    total_steps: u64,
    monitor: &mut Monitor,
) -> Result<f64> {
    let start = Instant::now();
    agent.learn(envs, total_steps, monitor)?;
    Ok(start.elapsed().as_secs_f64())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        agent::RandomAgent,
        env::tests::{Counters, MockEnv},
        results::read_results,
    };

    fn mock_factory(len: usize, counters: &Arc<Counters>) -> impl EnvFactory<Env = MockEnv> {
        let counters = counters.clone();
        move |_rank: usize| Ok::<_, Error>(MockEnv::new(len, counters.clone()))
    }

    #[test]
    fn runs_every_trial() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ExperimentConfig::new(3, 8, 2, dir.path().join("eval.txt"));
        config.num_envs = 2;
        config.seed_base = 100;
        let counters = Arc::new(Counters::default());

        let mut seen = Vec::new();
        let results = Harness::new(config)
            .run_with(mock_factory(4, &counters), RandomAgent::build, |r| {
                seen.push(r.trial_index)
            })
            .unwrap();

        assert_eq!(seen, [0, 1, 2]);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.mean_reward == 4.0 && r.std_reward == 0.0));
        assert_eq!(counters.built(), 6);
        assert_eq!(counters.closed(), 6);
        assert_eq!(read_results(dir.path().join("eval.txt")).unwrap(), results);
    }

    #[test]
    fn checkpoints_and_warm_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ExperimentConfig::new(2, 5, 1, dir.path().join("eval.txt"));
        config.checkpoint_dir = Some(dir.path().join("ckpt"));
        config.warm_start = true;
        let counters = Arc::new(Counters::default());

        Harness::new(config)
            .run(mock_factory(10, &counters), RandomAgent::build)
            .unwrap();

        let second: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("ckpt/trial_1.ckpt")).unwrap())
                .unwrap();
        assert_eq!(second["time_steps"], 10, "second trial continued from the first");
    }

    #[test]
    fn invalid_config_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.txt");
        let config = ExperimentConfig::new(3, 0, 1, &path);
        let counters = Arc::new(Counters::default());

        let err = Harness::new(config)
            .run(mock_factory(4, &counters), RandomAgent::build)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!path.exists());
        assert_eq!(counters.built(), 0);
    }
}
