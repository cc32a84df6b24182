use std::{
    io::{self, stdout, Stdout},
    ops::{Deref, DerefMut},
    panic,
    sync::Once,
};

use crossterm as ct;
use ct::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{backend::CrosstermBackend, Terminal};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Owns the terminal in raw mode on the alternate screen, restoring it when dropped
pub struct Guard {
    terminal: Tui,
}

impl Guard {
    pub fn init() -> io::Result<Self> {
        init_panic_hook();
        ct::execute!(stdout(), EnterAlternateScreen)?;
        if let Err(e) = enable_raw_mode() {
            let _ = restore();
            return Err(e);
        }
        match Terminal::new(CrosstermBackend::new(stdout())) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                let _ = restore();
                Err(e)
            }
        }
    }
}

impl Deref for Guard {
    type Target = Tui;

    fn deref(&self) -> &Tui {
        &self.terminal
    }
}

impl DerefMut for Guard {
    fn deref_mut(&mut self) -> &mut Tui {
        &mut self.terminal
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Err(e) = restore() {
            log::warn!("failed to restore terminal: {e}");
        }
    }
}

/// Restore the terminal to its original state
fn restore() -> io::Result<()> {
    ct::execute!(stdout(), LeaveAlternateScreen)?;
    disable_raw_mode()
}

/// Restore the terminal before the panic message is printed, installed once per process
fn init_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let _ = restore();
            original_hook(panic_info);
        }));
    });
}
