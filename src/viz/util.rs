use crossterm::event::{Event, KeyCode, KeyEventKind};

/// The [`KeyCode`] of a key press, `None` for any other event
pub(super) fn event_keycode(event: &Event) -> Option<KeyCode> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(key.code),
        _ => None,
    }
}
