use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rl_trials::{
    chart::ChartLayout,
    export::{default_output_path, export_scalars, ScalarTable},
    gym::KArmedBandit,
    metrics::EventFileStore,
    results::{read_results, ResultSummary},
    ExperimentConfig, Harness, RandomAgent,
};

#[derive(Parser)]
#[command(name = "rl-trials")]
#[command(about = "Run, export, and chart repeated reinforcement learning trials", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the random baseline on a 10-armed bandit with a TOML experiment config
    Run {
        config: PathBuf,

        /// Pulls per bandit episode
        #[arg(long, default_value = "100")]
        episode_steps: usize,
    },

    /// Export recorded training scalars to a tab-delimited table
    Export {
        /// An event file, or a directory containing `events.jsonl`
        source: PathBuf,

        /// Output table, defaults to `log.csv` next to the source
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Chart a tab-delimited table whose first column is the x axis
    Chart {
        path: PathBuf,

        /// Draw every series on one set of axes instead of a grid
        #[arg(long)]
        single: bool,

        /// Write a PNG instead of opening the terminal viewer
        #[arg(long, value_name = "OUT")]
        png: Option<PathBuf>,
    },

    /// Summarize a result log
    Results { path: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Run {
            config,
            episode_steps,
        } => run(&config, episode_steps),
        Commands::Export { source, output } => export(&source, output),
        Commands::Chart { path, single, png } => {
            let layout = if single {
                ChartLayout::Combined
            } else {
                ChartLayout::Grid
            };
            chart(&path, layout, png)
        }
        Commands::Results { path } => results(&path),
    }
}

fn run(config: &Path, episode_steps: usize) -> Result<()> {
    let config = ExperimentConfig::load(config)
        .with_context(|| format!("failed to load {}", config.display()))?;
    let factory = move |_rank: usize| Ok::<_, rl_trials::Error>(KArmedBandit::<10>::new(episode_steps));
    let results = Harness::new(config).run(factory, RandomAgent::build)?;
    print_summary(&results);
    Ok(())
}

fn export(source: &Path, output: Option<PathBuf>) -> Result<()> {
    let store = EventFileStore::open(source)
        .with_context(|| format!("failed to open metrics at {}", source.display()))?;
    let output = output.unwrap_or_else(|| default_output_path(source));
    let table = export_scalars(&store, &output)?;
    info!(
        "exported {} metrics over {} steps to {}",
        table.series.len(),
        table.rows.len(),
        output.display()
    );
    Ok(())
}

fn chart(path: &Path, layout: ChartLayout, png: Option<PathBuf>) -> Result<()> {
    let table = ScalarTable::read(path)
        .with_context(|| format!("failed to read table {}", path.display()))?;

    if let Some(out) = png {
        #[cfg(feature = "png")]
        {
            rl_trials::chart::render_png(&table, layout, &out, (1280, 960))?;
            info!("wrote {}", out.display());
            return Ok(());
        }
        #[cfg(not(feature = "png"))]
        bail!(
            "cannot write {}: built without the `png` feature",
            out.display()
        );
    }

    #[cfg(feature = "viz")]
    {
        rl_trials::viz::show(&table, layout)?;
        Ok(())
    }
    #[cfg(not(feature = "viz"))]
    {
        let _ = (table, layout);
        bail!("built without the `viz` feature, use `--png` to write a file")
    }
}

fn results(path: &Path) -> Result<()> {
    let results =
        read_results(path).with_context(|| format!("failed to read {}", path.display()))?;
    print_summary(&results);
    Ok(())
}

fn print_summary(results: &[rl_trials::TrialResult]) {
    for r in results {
        println!(
            "trial {:>3}  mean {:>12.4}  std {:>10.4}  {:>8.2}s",
            r.trial_index, r.mean_reward, r.std_reward, r.duration_seconds
        );
    }
    match ResultSummary::from_results(results) {
        Some(s) => println!(
            "{} trials: mean reward {:.4} +/- {:.4}, mean training time {:.2}s",
            s.trials, s.mean_reward, s.std_reward, s.mean_duration_seconds
        ),
        None => println!("no trials"),
    }
}
