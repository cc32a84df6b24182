use ratatui::{prelude::*, widgets::*};

fn key_line(key: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::from(key).light_cyan().bold(),
        Span::raw(" : "),
        Span::raw(action),
    ])
}

/// Keys available everywhere, then those of the selected tab
fn help_lines(selected_tab: usize) -> Vec<Line<'static>> {
    let mut lines = vec![
        key_line("  q  ", "Close the viewer"),
        key_line("  h  ", "Toggle help popup"),
        key_line(" Tab ", "Switch tabs"),
    ];

    match selected_tab {
        0 => lines.extend([
            key_line("⬅ / ➡", "Select series"),
            key_line("  g  ", "Toggle grid and combined layout"),
        ]),
        1 => lines.extend([
            key_line("  s  ", "Toggle the target selector"),
            key_line("  f  ", "Focus on the selected target only"),
            key_line("⬆ / ⬇", "Select log target"),
            key_line("⬅ / ➡", "Show one level less or more"),
            key_line("- / +", "Capture one level less or more"),
            key_line("PgUp ", "Page mode, scroll up"),
            key_line("PgDn ", "Scroll down in page mode"),
            key_line(" Esc ", "Leave page mode"),
            key_line("Space", "Toggle targets whose filter is off"),
        ]),
        _ => {}
    }

    lines
}

/// Draw the help popup centered over `area`
pub fn render_help(area: Rect, buf: &mut Buffer, selected_tab: usize) {
    let lines = help_lines(selected_tab);

    let [_, center_vert, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length((lines.len() + 4) as u16),
        Constraint::Fill(1),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(64),
        Constraint::Fill(1),
    ])
    .areas(center_vert);

    Clear.render(center, buf);

    Paragraph::new(lines)
        .block(
            Block::bordered()
                .border_type(BorderType::Rounded)
                .padding(Padding::proportional(1))
                .title("Help"),
        )
        .wrap(Wrap { trim: false })
        .render(center, buf);
}
