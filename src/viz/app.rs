use std::{
    io,
    sync::mpsc::{Receiver, TryRecvError},
    time::Duration,
};

use crossterm::event::{self, KeyCode};
use ratatui::{prelude::*, widgets::*};

use super::{
    components::{render_help, Component, Logs, Plots},
    tui,
    util::event_keycode,
};
use crate::{chart::ChartLayout, export::ScalarTable};

const TABS: [&str; 2] = ["Plots", "Logs"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Updates are still arriving
    #[default]
    Running,
    /// The sender hung up, the last view stays on screen
    Finished,
    Quit,
}

/// One new point per plot, at x = `trial`
#[derive(Debug, Clone)]
pub struct Update {
    pub trial: usize,
    pub data: Vec<f64>,
}

/// The root TUI component which holds the app state and runs the render loop
pub struct App {
    state: State,
    /// Trials reported so far, `None` for a static table
    progress: Option<(usize, usize)>,
    selected_tab: usize,
    show_help: bool,
    plots: Plots,
    logs: Logs,
}

impl App {
    /// A live view of `keys`, one point per trial
    pub fn new(keys: &[&str], total_trials: usize) -> Self {
        Self {
            state: State::Running,
            progress: Some((0, total_trials)),
            selected_tab: 0,
            show_help: false,
            plots: Plots::new(keys, "trial", Some([0.0, total_trials as f64])),
            logs: Logs::default(),
        }
    }

    /// A static view of every series of `table`
    pub fn from_table(table: &ScalarTable, layout: ChartLayout) -> Self {
        Self {
            state: State::Finished,
            progress: None,
            selected_tab: 0,
            show_help: false,
            plots: Plots::from_table(table).with_layout(layout),
            logs: Logs::default(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Apply an update from the experiment
    pub fn update(&mut self, update: Update) {
        if let Some((done, _)) = self.progress.as_mut() {
            *done = (*done).max(update.trial + 1);
        }
        self.plots.update(update);
    }

    /// Initialize the terminal and run the main loop until the user quits
    ///
    /// The terminal is restored on exit, including on error.
    pub fn run(&mut self, rx: Option<Receiver<Update>>) -> io::Result<()> {
        let mut terminal = tui::Guard::init()?;

        while self.state != State::Quit {
            if let (State::Running, Some(rx)) = (self.state, rx.as_ref()) {
                self.drain(rx);
            }

            terminal.draw(|frame| frame.render_widget(&*self, frame.size()))?;

            if event::poll(Duration::from_millis(16))? {
                let event = event::read()?;
                self.handle_event(&event);
            }
        }

        Ok(())
    }

    fn drain(&mut self, rx: &Receiver<Update>) {
        loop {
            match rx.try_recv() {
                Ok(update) => self.update(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.state = State::Finished;
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: &event::Event) {
        // Let the active tab consume its own keys first
        let consumed = match self.selected_tab {
            0 => self.plots.handle_ui_event(event),
            _ => self.logs.handle_ui_event(event),
        };
        if consumed {
            return;
        }

        match event_keycode(event) {
            Some(KeyCode::Char('q')) => self.state = State::Quit,
            Some(KeyCode::Char('h')) => self.show_help = !self.show_help,
            Some(KeyCode::Tab) => self.selected_tab = (self.selected_tab + 1) % TABS.len(),
            _ => {}
        }
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let progress_height = if self.progress.is_some() { 3 } else { 0 };
        let [menu_area, main_area, progress_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(progress_height),
        ])
        .areas(area);

        Tabs::new(TABS)
            .block(Block::default().padding(Padding::uniform(1)))
            .white()
            .bold()
            .highlight_style(Style::default().light_green())
            .select(self.selected_tab)
            .render(menu_area, buf);

        match self.selected_tab {
            0 => self.plots.render_ref(main_area, buf),
            _ => self.logs.render_ref(main_area, buf),
        }

        if let Some((done, total)) = self.progress {
            let title = match self.state {
                State::Finished => "Progress (finished, q to quit)",
                _ => "Progress",
            };
            Gauge::default()
                .block(Block::bordered().border_type(BorderType::Rounded).title(title))
                .gauge_style(Color::Cyan)
                .label(format!("{done}/{total} trials"))
                .ratio(if total == 0 {
                    1.0
                } else {
                    (done as f64 / total as f64).min(1.0)
                })
                .render(progress_area, buf);
        }

        if self.show_help {
            render_help(area, buf, self.selected_tab);
        }
    }
}
