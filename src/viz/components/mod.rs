mod help;
mod log;
mod plot;

use crossterm::event::Event;
use ratatui::widgets::WidgetRef;

pub use self::{help::render_help, log::Logs, plot::Plots};

/// A widget that reacts to terminal events
pub trait Component: WidgetRef {
    /// Handle `event`, returning whether it was consumed
    fn handle_ui_event(&mut self, event: &Event) -> bool;
}
