use std::{fs, path::Path};

use rl_trials::{
    env::VecMode,
    export::{default_output_path, export_scalars},
    gym::KArmedBandit,
    metrics::EventFileStore,
    results::ResultSummary,
    Error, ExperimentConfig, Harness, RandomAgent,
};

const STEP_LIMIT: usize = 1000;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let out = Path::new("local/bandit_trials");
    fs::create_dir_all(out)?;

    let mut config = ExperimentConfig::from_toml_str(include_str!("bandit_trials.toml"))?;
    config.log_path = out.join("random_eval.txt");
    config.monitor.output_dir = Some(out.join("monitor"));
    config.checkpoint_dir = Some(out.join("checkpoints"));
    config.vec_mode = VecMode::Parallel;

    let factory = |_rank: usize| Ok::<_, Error>(KArmedBandit::<10>::new(STEP_LIMIT));
    let results = Harness::new(config).run(factory, RandomAgent::build)?;

    if let Some(summary) = ResultSummary::from_results(&results) {
        println!(
            "{} trials: {:.3} +/- {:.3} per {STEP_LIMIT}-pull episode",
            summary.trials, summary.mean_reward, summary.std_reward
        );
    }

    // Flatten the first trial's training scalars for charting
    let metrics = out.join("monitor").join("trial_0");
    let table = export_scalars(&EventFileStore::open(&metrics)?, default_output_path(&metrics))?;
    println!(
        "exported {:?} to {}",
        table.series,
        default_output_path(&metrics).display()
    );

    Ok(())
}
