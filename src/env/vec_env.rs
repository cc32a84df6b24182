use std::{
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{EnvFactory, Environment, Step};
use crate::error::{Error, Result};

/// How the instances of a [`VecEnv`] are stepped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VecMode {
    /// All instances live on the calling thread and are stepped in rank order
    #[default]
    Sequential,
    /// Every instance is built and stepped on its own worker thread
    Parallel,
}

/// One step of every instance in a [`VecEnv`]
#[derive(Debug, Clone)]
pub struct BatchStep<O> {
    /// Next observation per instance, already reset for instances whose episode ended
    pub observations: Vec<O>,
    pub rewards: Vec<f32>,
    pub terminated: Vec<bool>,
    pub truncated: Vec<bool>,
    /// Last observation of the finished episode, `None` where the episode continues
    pub terminal_observations: Vec<Option<O>>,
}

impl<O> BatchStep<O> {
    /// Whether instance `rank` finished an episode on this step
    pub fn done(&self, rank: usize) -> bool {
        self.terminated[rank] || self.truncated[rank]
    }

    fn with_capacity(n: usize) -> Self {
        Self {
            observations: Vec::with_capacity(n),
            rewards: Vec::with_capacity(n),
            terminated: Vec::with_capacity(n),
            truncated: Vec::with_capacity(n),
            terminal_observations: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, transition: Transition<O>) {
        let Transition { step, reset } = transition;
        self.rewards.push(step.reward);
        self.terminated.push(step.terminated);
        self.truncated.push(step.truncated);
        match reset {
            Some(obs) => {
                self.observations.push(obs);
                self.terminal_observations.push(Some(step.observation));
            }
            None => {
                self.observations.push(step.observation);
                self.terminal_observations.push(None);
            }
        }
    }
}

/// A step plus the fresh observation if the episode ended and the instance was reset
struct Transition<O> {
    step: Step<O>,
    reset: Option<O>,
}

fn step_and_reset<E: Environment>(
    env: &mut E,
    action: E::Action,
) -> Result<Transition<E::Observation>> {
    let step = env.step(action)?;
    let reset = if step.done() {
        Some(env.reset(None)?)
    } else {
        None
    };
    Ok(Transition { step, reset })
}

struct Local<E> {
    env: E,
    seed: Option<u64>,
    open: bool,
}

enum Command<A> {
    Reset,
    Step(A),
    Close,
}

enum Reply<O> {
    Ready(Result<()>),
    Reset(Result<O>),
    Step(Result<Transition<O>>),
    Closed(Result<()>),
}

struct Worker<E: Environment> {
    rank: usize,
    tx: mpsc::Sender<Command<E::Action>>,
    rx: mpsc::Receiver<Reply<E::Observation>>,
    handle: Option<JoinHandle<()>>,
}

impl<E: Environment> Worker<E> {
    fn spawn<F>(factory: Arc<F>, rank: usize, seed: Option<u64>) -> Result<Self>
    where
        F: EnvFactory<Env = E> + Send + Sync + 'static,
        E: 'static,
    {
        let (tx, cmd_rx) = mpsc::channel::<Command<E::Action>>();
        let (reply_tx, rx) = mpsc::channel::<Reply<E::Observation>>();

        let handle = thread::Builder::new()
            .name(format!("env-{rank}"))
            .spawn(move || {
                let mut env = match factory.make(rank) {
                    Ok(env) => env,
                    Err(e) => {
                        let _ = reply_tx.send(Reply::Ready(Err(e)));
                        return;
                    }
                };
                if reply_tx.send(Reply::Ready(Ok(()))).is_err() {
                    let _ = env.close();
                    return;
                }

                let mut seed = seed;
                while let Ok(cmd) = cmd_rx.recv() {
                    let reply = match cmd {
                        Command::Reset => Reply::Reset(env.reset(seed.take())),
                        Command::Step(action) => Reply::Step(step_and_reset(&mut env, action)),
                        Command::Close => {
                            let _ = reply_tx.send(Reply::Closed(env.close()));
                            return;
                        }
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }

                // The owning VecEnv vanished without closing us
                let _ = env.close();
            })?;

        let mut worker = Self {
            rank,
            tx,
            rx,
            handle: Some(handle),
        };

        match worker.rx.recv() {
            Ok(Reply::Ready(Ok(()))) => Ok(worker),
            Ok(Reply::Ready(Err(e))) => {
                worker.join();
                Err(e)
            }
            _ => {
                worker.join();
                Err(worker.gone())
            }
        }
    }

    fn send(&self, cmd: Command<E::Action>) -> Result<()> {
        self.tx.send(cmd).map_err(|_| self.gone())
    }

    fn recv(&self) -> Result<Reply<E::Observation>> {
        self.rx.recv().map_err(|_| self.gone())
    }

    fn gone(&self) -> Error {
        Error::Env(format!("environment worker {} exited unexpectedly", self.rank))
    }

    fn close(&mut self) -> Result<()> {
        if self.handle.is_none() {
            return Ok(());
        }
        let result = match self.send(Command::Close) {
            Ok(()) => loop {
                // Drain replies to commands still in flight
                match self.rx.recv() {
                    Ok(Reply::Closed(result)) => break result,
                    Ok(_) => continue,
                    Err(_) => break Err(self.gone()),
                }
            },
            Err(e) => Err(e),
        };
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("environment worker {} panicked", self.rank);
            }
        }
    }
}

/// Send one command to each worker and wait for every reply
///
/// All replies are read even after a failure so none is left queued for the next call.
/// The first failure in rank order is returned.
fn exchange<E: Environment, T>(
    workers: &[Worker<E>],
    commands: impl IntoIterator<Item = Command<E::Action>>,
    accept: impl Fn(&Worker<E>, Reply<E::Observation>) -> Result<T>,
) -> Result<Vec<T>> {
    let sent: Vec<Result<()>> = workers
        .iter()
        .zip(commands)
        .map(|(worker, cmd)| worker.send(cmd))
        .collect();

    let mut first_err = None;
    let mut out = Vec::with_capacity(workers.len());
    for (worker, sent) in workers.iter().zip(sent) {
        match sent
            .and_then(|()| worker.recv())
            .and_then(|reply| accept(worker, reply))
        {
            Ok(value) => out.push(value),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    first_err.map_or(Ok(out), Err)
}

enum Backend<E: Environment> {
    Sequential(Vec<Local<E>>),
    Parallel(Vec<Worker<E>>),
}

/// A batch of independent environment instances stepped together
///
/// Instances whose episode ends are reset automatically on the same step. Every instance
/// is closed exactly once, either by [`VecEnv::close`] or when the batch is dropped.
pub struct VecEnv<E: Environment> {
    backend: Backend<E>,
}

impl<E: Environment> VecEnv<E> {
    /// Build `num_envs` instances
    ///
    /// With `seed = Some(s)`, instance `r` is seeded with `s + r` on its first reset.
    /// With `None`, instance randomness is left uncontrolled.
    pub fn new<F>(factory: Arc<F>, num_envs: usize, seed: Option<u64>, mode: VecMode) -> Result<Self>
    where
        F: EnvFactory<Env = E> + Send + Sync + 'static,
        E: 'static,
    {
        if num_envs == 0 {
            return Err(Error::Config(String::from("`num_envs` must be at least 1")));
        }
        let seed_for = |rank: usize| seed.map(|s| s.wrapping_add(rank as u64));

        let backend = match mode {
            VecMode::Sequential => {
                let mut envs = Vec::with_capacity(num_envs);
                for rank in 0..num_envs {
                    // Instances built so far are closed by `Drop` on failure
                    let env = match factory.make(rank) {
                        Ok(env) => env,
                        Err(e) => {
                            drop(VecEnv {
                                backend: Backend::Sequential(envs),
                            });
                            return Err(e);
                        }
                    };
                    envs.push(Local {
                        env,
                        seed: seed_for(rank),
                        open: true,
                    });
                }
                Backend::Sequential(envs)
            }
            VecMode::Parallel => {
                let mut workers = Vec::with_capacity(num_envs);
                for rank in 0..num_envs {
                    match Worker::spawn(factory.clone(), rank, seed_for(rank)) {
                        Ok(worker) => workers.push(worker),
                        Err(e) => {
                            drop(VecEnv {
                                backend: Backend::Parallel(workers),
                            });
                            return Err(e);
                        }
                    }
                }
                Backend::Parallel(workers)
            }
        };

        debug!("built {num_envs} environments ({mode:?}, seed {seed:?})");
        Ok(Self { backend })
    }

    pub fn num_envs(&self) -> usize {
        match &self.backend {
            Backend::Sequential(envs) => envs.len(),
            Backend::Parallel(workers) => workers.len(),
        }
    }

    /// Reset every instance
    pub fn reset(&mut self) -> Result<Vec<E::Observation>> {
        match &mut self.backend {
            Backend::Sequential(envs) => envs
                .iter_mut()
                .map(|local| local.env.reset(local.seed.take()))
                .collect(),
            Backend::Parallel(workers) => {
                let commands = workers.iter().map(|_| Command::Reset);
                exchange(workers, commands, |worker, reply| match reply {
                    Reply::Reset(obs) => obs,
                    _ => Err(worker.gone()),
                })
            }
        }
    }

    /// Apply one action to every instance
    pub fn step(&mut self, actions: Vec<E::Action>) -> Result<BatchStep<E::Observation>> {
        let n = self.num_envs();
        if actions.len() != n {
            return Err(Error::Env(format!(
                "expected {n} actions, got {}",
                actions.len()
            )));
        }

        let mut batch = BatchStep::with_capacity(n);
        match &mut self.backend {
            Backend::Sequential(envs) => {
                for (local, action) in envs.iter_mut().zip(actions) {
                    batch.push(step_and_reset(&mut local.env, action)?);
                }
            }
            Backend::Parallel(workers) => {
                let commands = actions.into_iter().map(Command::Step);
                let transitions = exchange(workers, commands, |worker, reply| match reply {
                    Reply::Step(transition) => transition,
                    _ => Err(worker.gone()),
                })?;
                for transition in transitions {
                    batch.push(transition);
                }
            }
        }
        Ok(batch)
    }

    /// Sample one random action per instance
    pub fn random_actions<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Vec<E::Action> {
        (0..self.num_envs()).map(|_| E::random_action(rng)).collect()
    }

    /// Close every instance, reporting the first failure
    ///
    /// Every instance is closed even when an earlier one fails.
    pub fn close(mut self) -> Result<()> {
        self.close_all()
    }

    fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        match &mut self.backend {
            Backend::Sequential(envs) => {
                for local in envs.iter_mut().filter(|l| l.open) {
                    local.open = false;
                    if let Err(e) = local.env.close() {
                        first_err.get_or_insert(e);
                    }
                }
            }
            Backend::Parallel(workers) => {
                for worker in workers.iter_mut() {
                    if let Err(e) = worker.close() {
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<E: Environment> Drop for VecEnv<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            warn!("failed to close environment: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::tests::{Counters, MockEnv};

    fn factory(len: usize, counters: &Arc<Counters>) -> Arc<impl EnvFactory<Env = MockEnv>> {
        let counters = counters.clone();
        Arc::new(move |_rank: usize| Ok::<_, Error>(MockEnv::new(len, counters.clone())))
    }

    #[test]
    fn sequential_autoreset() {
        let counters = Arc::new(Counters::default());
        let mut envs = VecEnv::new(factory(2, &counters), 3, Some(7), VecMode::Sequential).unwrap();
        assert_eq!(envs.num_envs(), 3);
        assert_eq!(envs.reset().unwrap(), vec![0, 0, 0]);

        let batch = envs.step(vec![0, 1, 0]).unwrap();
        assert_eq!(batch.observations, vec![1, 1, 1]);
        assert!(!batch.done(0));

        let batch = envs.step(vec![0, 1, 0]).unwrap();
        assert!(batch.terminated.iter().all(|t| *t), "episodes end after 2 steps");
        assert_eq!(batch.observations, vec![0, 0, 0], "instances were reset");
        assert_eq!(batch.terminal_observations, vec![Some(2), Some(2), Some(2)]);
        assert_eq!(batch.rewards, vec![1.0; 3]);

        envs.close().unwrap();
        assert_eq!(counters.closed(), 3, "each instance closed once");
    }

    #[test]
    fn seeds_follow_rank() {
        let counters = Arc::new(Counters::default());
        let mut envs = VecEnv::new(factory(2, &counters), 3, Some(10), VecMode::Sequential).unwrap();
        envs.reset().unwrap();
        let Backend::Sequential(locals) = &envs.backend else {
            panic!("sequential backend expected");
        };
        let seeds: Vec<_> = locals.iter().map(|l| l.env.seed).collect();
        assert_eq!(seeds, vec![Some(10), Some(11), Some(12)]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let counters = Arc::new(Counters::default());
        let mut envs = VecEnv::new(factory(3, &counters), 4, None, VecMode::Parallel).unwrap();
        assert_eq!(counters.built(), 4);
        assert_eq!(envs.reset().unwrap(), vec![0; 4]);
        for expected in [1, 2] {
            let batch = envs.step(vec![0; 4]).unwrap();
            assert_eq!(batch.observations, vec![expected; 4]);
        }
        let batch = envs.step(vec![0; 4]).unwrap();
        assert!((0..4).all(|r| batch.done(r)));
        assert_eq!(batch.observations, vec![0; 4]);
        drop(envs);
        assert_eq!(counters.closed(), 4, "drop closes worker environments");
    }

    /// Rank 0 fails its first step, every other step succeeds
    struct FailOnce {
        rank: usize,
        t: usize,
        failed: bool,
    }

    impl Environment for FailOnce {
        type Observation = usize;
        type Action = i32;

        fn reset(&mut self, _seed: Option<u64>) -> Result<usize> {
            self.t = 0;
            Ok(0)
        }

        fn step(&mut self, _action: i32) -> Result<Step<usize>> {
            if self.rank == 0 && !self.failed {
                self.failed = true;
                return Err(Error::Env(String::from("transient failure")));
            }
            self.t += 1;
            Ok(Step {
                observation: self.t,
                reward: 1.0,
                terminated: false,
                truncated: false,
            })
        }

        fn random_action<R: rand::Rng + ?Sized>(_rng: &mut R) -> i32 {
            0
        }
    }

    #[test]
    fn recovers_after_failed_step() {
        let factory = Arc::new(|rank: usize| {
            Ok::<_, Error>(FailOnce {
                rank,
                t: 0,
                failed: false,
            })
        });
        for mode in [VecMode::Sequential, VecMode::Parallel] {
            let mut envs = VecEnv::new(factory.clone(), 3, None, mode).unwrap();
            envs.reset().unwrap();
            assert!(matches!(envs.step(vec![0; 3]), Err(Error::Env(_))), "{mode:?}");
            assert_eq!(envs.reset().unwrap(), vec![0; 3], "{mode:?}: reset after failure");
            let batch = envs.step(vec![0; 3]).unwrap();
            assert_eq!(batch.observations, vec![1; 3], "{mode:?}: step after reset");
            envs.close().unwrap();
        }
    }

    #[test]
    fn drop_closes_sequential() {
        let counters = Arc::new(Counters::default());
        {
            let _envs = VecEnv::new(factory(2, &counters), 2, None, VecMode::Sequential).unwrap();
        }
        assert_eq!(counters.closed(), 2);
    }

    #[test]
    fn action_count_mismatch() {
        let counters = Arc::new(Counters::default());
        let mut envs = VecEnv::new(factory(2, &counters), 2, None, VecMode::Sequential).unwrap();
        envs.reset().unwrap();
        assert!(matches!(envs.step(vec![0]), Err(Error::Env(_))));
    }

    #[test]
    fn failed_construction_releases_built_instances() {
        let counters = Arc::new(Counters::default());
        let c = counters.clone();
        let factory = Arc::new(move |rank: usize| {
            if rank == 2 {
                Err(Error::Env(String::from("no display")))
            } else {
                Ok(MockEnv::new(2, c.clone()))
            }
        });
        for mode in [VecMode::Sequential, VecMode::Parallel] {
            let before = counters.closed();
            let result = VecEnv::new(factory.clone(), 4, None, mode);
            assert!(matches!(result, Err(Error::Env(_))));
            assert_eq!(counters.closed() - before, 2, "{mode:?}: built instances closed");
        }
    }

    #[test]
    fn zero_envs_rejected() {
        let counters = Arc::new(Counters::default());
        let result = VecEnv::new(factory(2, &counters), 0, None, VecMode::Sequential);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
