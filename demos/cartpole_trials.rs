use gym_rs::utils::renderer::RenderMode;
use rl_trials::{
    gym::CartPole,
    viz::{self, Update, RESULT_KEYS},
    Error, ExperimentConfig, Harness, RandomAgent,
};

const NUM_TRIALS: usize = 32;

fn main() -> anyhow::Result<()> {
    let mut config = ExperimentConfig::new(NUM_TRIALS, 10_000, 20, "local/cartpole_eval.txt");
    config.num_envs = 8;
    config.monitor.interval = 100;

    std::fs::create_dir_all("local")?;
    let (handle, tx) = viz::init(&RESULT_KEYS, NUM_TRIALS);

    let factory = |_rank: usize| Ok::<_, Error>(CartPole::new(RenderMode::None));
    let result = Harness::new(config).run_with(factory, RandomAgent::build, |trial| {
        // The viewer may already be closed
        let _ = tx.send(Update::from_result(trial));
    });

    drop(tx);
    let _ = handle.join();
    result?;
    Ok(())
}
