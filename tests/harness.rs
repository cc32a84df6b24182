use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use rand::Rng;
use rl_trials::{
    results::read_results, Agent, Environment, Error, ExperimentConfig, Harness, RandomAgent,
    Result, Step, VecEnv, VecMode,
};

#[derive(Default)]
struct Tally {
    built: AtomicUsize,
    closed: AtomicUsize,
}

/// Pays 1 per step and terminates after `len` steps
struct Corridor {
    len: usize,
    t: usize,
    tally: Arc<Tally>,
}

impl Corridor {
    fn factory(len: usize, tally: &Arc<Tally>) -> impl Fn(usize) -> Result<Corridor> {
        let tally = tally.clone();
        move |_rank| {
            tally.built.fetch_add(1, Ordering::SeqCst);
            Ok(Corridor {
                len,
                t: 0,
                tally: tally.clone(),
            })
        }
    }
}

impl Environment for Corridor {
    type Observation = usize;
    type Action = u8;

    fn reset(&mut self, _seed: Option<u64>) -> Result<usize> {
        self.t = 0;
        Ok(0)
    }

    fn step(&mut self, _action: u8) -> Result<Step<usize>> {
        thread::sleep(Duration::from_micros(50));
        self.t += 1;
        Ok(Step {
            observation: self.t,
            reward: 1.0,
            terminated: self.t >= self.len,
            truncated: false,
        })
    }

    fn random_action<R: Rng + ?Sized>(rng: &mut R) -> u8 {
        rng.gen()
    }

    fn close(&mut self) -> Result<()> {
        self.tally.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Random agent whose training fails when `fail` is set
struct Flaky {
    inner: RandomAgent,
    fail: bool,
}

impl Agent<Corridor> for Flaky {
    fn learn(
        &mut self,
        envs: &mut VecEnv<Corridor>,
        total_steps: u64,
        monitor: &mut rl_trials::monitor::Monitor,
    ) -> Result<()> {
        if self.fail {
            envs.reset()?;
            return Err(Error::Agent(String::from("diverged")));
        }
        self.inner.learn(envs, total_steps, monitor)
    }

    fn predict(&mut self, observation: &usize, deterministic: bool) -> u8 {
        Agent::<Corridor>::predict(&mut self.inner, observation, deterministic)
    }

    fn save(&self, path: &Path) -> Result<()> {
        Agent::<Corridor>::save(&self.inner, path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        Agent::<Corridor>::load(&mut self.inner, path)
    }
}

/// Remembers the seed passed to every reset, by rank
struct SeedLog {
    rank: usize,
    seen: Arc<Mutex<Vec<(usize, Option<u64>)>>>,
}

impl Environment for SeedLog {
    type Observation = usize;
    type Action = u8;

    fn reset(&mut self, seed: Option<u64>) -> Result<usize> {
        self.seen.lock().unwrap().push((self.rank, seed));
        Ok(0)
    }

    fn step(&mut self, _action: u8) -> Result<Step<usize>> {
        Ok(Step {
            observation: 0,
            reward: 1.0,
            terminated: true,
            truncated: false,
        })
    }

    fn random_action<R: Rng + ?Sized>(rng: &mut R) -> u8 {
        rng.gen()
    }
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

#[test]
fn one_line_per_trial() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("random_eval.txt");
    let tally = Arc::new(Tally::default());
    let config = ExperimentConfig::new(4, 12, 3, &log);

    let results = Harness::new(config)
        .run(Corridor::factory(5, &tally), RandomAgent::build)
        .unwrap();

    assert_eq!(line_count(&log), 4);
    let read = read_results(&log).unwrap();
    assert_eq!(read, results, "written values parse back equal");
    for (i, r) in read.iter().enumerate() {
        assert_eq!(r.trial_index, i);
        assert_eq!(r.mean_reward, 5.0);
        assert_eq!(r.std_reward, 0.0);
        assert!(r.duration_seconds > 0.0);
    }
    assert_eq!(tally.built.load(Ordering::SeqCst), 4);
    assert_eq!(tally.closed.load(Ordering::SeqCst), 4);
}

#[test]
fn rerun_truncates_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("random_eval.txt");
    let tally = Arc::new(Tally::default());

    for _ in 0..2 {
        Harness::new(ExperimentConfig::new(3, 4, 1, &log))
            .run(Corridor::factory(2, &tally), RandomAgent::build)
            .unwrap();
    }
    assert_eq!(line_count(&log), 3);
}

#[test]
fn zero_trials_leave_empty_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("random_eval.txt");
    fs::write(&log, "stale\n").unwrap();
    let tally = Arc::new(Tally::default());

    let results = Harness::new(ExperimentConfig::new(0, 4, 1, &log))
        .run(Corridor::factory(2, &tally), RandomAgent::build)
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(fs::read_to_string(&log).unwrap(), "");
    assert_eq!(tally.built.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_log_directory_fails_before_any_environment() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("missing").join("random_eval.txt");
    let tally = Arc::new(Tally::default());

    let err = Harness::new(ExperimentConfig::new(2, 4, 1, &log))
        .run(Corridor::factory(2, &tally), RandomAgent::build)
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert_eq!(tally.built.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_trial_keeps_earlier_rows() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("random_eval.txt");
    let tally = Arc::new(Tally::default());
    let builds = AtomicUsize::new(0);

    let builder = |_: &rl_trials::Hyperparameters, _: &VecEnv<Corridor>, seed: Option<u64>| {
        let n = builds.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Error>(Flaky {
            inner: RandomAgent::new(seed),
            fail: n == 2,
        })
    };
    let mut config = ExperimentConfig::new(5, 6, 2, &log);
    config.num_envs = 2;

    let err = Harness::new(config)
        .run(Corridor::factory(3, &tally), builder)
        .unwrap_err();

    assert_eq!(err.trial_index(), Some(2));
    assert!(err.to_string().contains("trial 2"));
    assert_eq!(line_count(&log), 2);
    assert_eq!(builds.load(Ordering::SeqCst), 3, "no trial after the failure");

    // The failed trial's environments were released too
    assert_eq!(tally.built.load(Ordering::SeqCst), 6);
    assert_eq!(tally.closed.load(Ordering::SeqCst), 6);
}

#[test]
fn parallel_batch_gives_same_scores() {
    let dir = tempfile::tempdir().unwrap();
    let tally = Arc::new(Tally::default());

    let scores = |mode: VecMode, name: &str| {
        let mut config = ExperimentConfig::new(2, 16, 4, dir.path().join(name));
        config.num_envs = 3;
        config.vec_mode = mode;
        Harness::new(config)
            .run(Corridor::factory(4, &tally), RandomAgent::build)
            .unwrap()
            .iter()
            .map(|r| (r.mean_reward, r.std_reward))
            .collect::<Vec<_>>()
    };

    assert_eq!(
        scores(VecMode::Sequential, "seq.txt"),
        scores(VecMode::Parallel, "par.txt")
    );
    assert_eq!(
        tally.built.load(Ordering::SeqCst),
        tally.closed.load(Ordering::SeqCst)
    );
}

fn seeds_seen(seeding: bool) -> (Vec<(usize, Option<u64>)>, Vec<Option<u64>>) {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let agent_seeds = Mutex::new(Vec::new());

    let mut config = ExperimentConfig::new(3, 4, 2, dir.path().join("eval.txt"));
    config.num_envs = 2;
    config.seed_base = 40;
    config.seeding = seeding;

    let env_seen = seen.clone();
    let factory = move |rank: usize| {
        Ok::<_, Error>(SeedLog {
            rank,
            seen: env_seen.clone(),
        })
    };
    let builder = |_: &rl_trials::Hyperparameters, _: &VecEnv<SeedLog>, seed: Option<u64>| {
        agent_seeds.lock().unwrap().push(seed);
        Ok::<_, Error>(RandomAgent::new(seed))
    };
    Harness::new(config).run(factory, builder).unwrap();

    let seen = seen.lock().unwrap().clone();
    let agent_seeds = agent_seeds.into_inner().unwrap();
    (seen, agent_seeds)
}

#[test]
fn trial_and_rank_seed_every_environment() {
    let (seen, agent_seeds) = seeds_seen(true);

    let seeded: Vec<_> = seen.iter().filter(|(_, s)| s.is_some()).copied().collect();
    let expected: Vec<_> = (0..3u64)
        .flat_map(|i| (0..2usize).map(move |r| (r, Some(40 + i + r as u64))))
        .collect();
    assert_eq!(seeded, expected, "first reset of rank r in trial i gets 40 + i + r");
    assert!(seen.len() > seeded.len(), "later resets continue the stream");
    assert_eq!(agent_seeds, [Some(40), Some(41), Some(42)]);
}

#[test]
fn unseeded_trials_pass_no_seeds() {
    let (seen, agent_seeds) = seeds_seen(false);

    assert!(!seen.is_empty());
    assert!(seen.iter().all(|(_, s)| s.is_none()));
    assert_eq!(agent_seeds, [None, None, None]);
}
