//! Terminal dashboards built on `ratatui`
//!
//! [`init`] starts a live view of a running experiment on its own thread and returns the
//! channel to feed it with. [`show`] opens a static view of a recorded table.

use std::{
    io,
    sync::mpsc::{self, Sender},
    thread::{self, JoinHandle},
};

use crate::{chart::ChartLayout, export::ScalarTable, results::TrialResult};

pub use self::app::{App, State, Update};

mod app;
mod components;
mod tui;
mod util;

/// Column names sent by [`Update::from_result`]
pub const RESULT_KEYS: [&str; 3] = ["mean_reward", "std_reward", "duration_seconds"];

/// Start the live monitor on a new thread
///
/// `keys` names one plot per value of [`Update::data`], and the progress gauge runs up to
/// `total_trials`. Log records are captured and shown in the `Logs` tab.
pub fn init(keys: &[&str], total_trials: usize) -> (JoinHandle<()>, Sender<Update>) {
    // A logger may already be installed, in which case records keep going there
    if tui_logger::init_logger(log::LevelFilter::Trace).is_ok() {
        tui_logger::set_default_level(log::LevelFilter::Trace);
    }

    let (tx, rx) = mpsc::channel();
    let mut app = App::new(keys, total_trials);
    let handle = thread::spawn(move || {
        if let Err(e) = app.run(Some(rx)) {
            eprintln!("viz: {e}");
        }
    });

    (handle, tx)
}

/// Browse `table` until the user quits
pub fn show(table: &ScalarTable, layout: ChartLayout) -> io::Result<()> {
    App::from_table(table, layout).run(None)
}

impl Update {
    /// One point per [`RESULT_KEYS`] plot
    pub fn from_result(result: &TrialResult) -> Self {
        Self {
            trial: result.trial_index,
            data: vec![
                result.mean_reward,
                result.std_reward,
                result.duration_seconds,
            ],
        }
    }
}
