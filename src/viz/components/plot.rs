use crossterm::event::{Event, KeyCode};
use ratatui::{prelude::*, style::Stylize, widgets::*};

use super::Component;
use crate::{
    chart::{ChartLayout, GridLayout},
    export::ScalarTable,
    viz::{util::event_keycode, Update},
};

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::LightBlue,
    Color::LightRed,
    Color::Green,
];

/// One series with bounds that grow to fit its points
pub struct Plot {
    name: String,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    data: Vec<(f64, f64)>,
}

impl Plot {
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            x_bounds: [f64::MAX, f64::MIN],
            y_bounds: [f64::MAX, f64::MIN],
            data: Vec::new(),
        }
    }

    /// Provide initial x bounds
    pub fn with_x_bounds(mut self, x_bounds: [f64; 2]) -> Self {
        self.x_bounds = x_bounds;
        self
    }

    pub fn update(&mut self, (x, y): (f64, f64)) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.x_bounds = [self.x_bounds[0].min(x), self.x_bounds[1].max(x)];
        self.y_bounds = [self.y_bounds[0].min(y), self.y_bounds[1].max(y)];
        self.data.push((x, y));
    }

    fn dataset(&self, color: Color) -> Dataset<'_> {
        Dataset::default()
            .name(self.name.as_str())
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .fg(color)
            .data(&self.data)
    }
}

/// Drawable bounds covering every plot in `plots`
fn bounds<'a>(plots: impl IntoIterator<Item = &'a Plot>, axis: fn(&Plot) -> [f64; 2]) -> [f64; 2] {
    let [lo, hi] = plots
        .into_iter()
        .map(axis)
        .fold([f64::MAX, f64::MIN], |[lo, hi], [a, b]| [lo.min(a), hi.max(b)]);
    if lo > hi {
        [0.0, 1.0]
    } else if lo == hi {
        [lo - 1.0, hi + 1.0]
    } else {
        [lo, hi]
    }
}

fn labels([lo, hi]: [f64; 2]) -> Vec<Span<'static>> {
    vec![format!("{lo:.2}").bold(), format!("{hi:.2}").bold()]
}

/// Every series of a table or a running experiment, drawn combined or as a grid
pub struct Plots {
    x_title: String,
    plots: Vec<Plot>,
    selected: usize,
    layout: ChartLayout,
}

impl Plots {
    pub fn new(names: &[&str], x_title: &str, x_bounds: Option<[f64; 2]>) -> Self {
        let plots = names
            .iter()
            .map(|name| {
                let plot = Plot::new(name);
                match x_bounds {
                    Some(b) => plot.with_x_bounds(b),
                    None => plot,
                }
            })
            .collect();
        Self {
            x_title: String::from(x_title),
            plots,
            selected: 0,
            layout: ChartLayout::Grid,
        }
    }

    pub fn from_table(table: &ScalarTable) -> Self {
        let names: Vec<_> = table.series.iter().map(String::as_str).collect();
        let mut plots = Self::new(&names, &table.x_label, None);
        for (col, plot) in plots.plots.iter_mut().enumerate() {
            for point in table.points(col) {
                plot.update(point);
            }
        }
        plots
    }

    pub fn with_layout(mut self, layout: ChartLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn next_plot(&mut self) {
        if !self.plots.is_empty() {
            self.selected = (self.selected + 1) % self.len();
        }
    }

    pub fn prev_plot(&mut self) {
        if !self.plots.is_empty() {
            let len = self.len();
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn update(&mut self, update: Update) {
        let Update { trial, data } = update;
        for (plot, value) in self.plots.iter_mut().zip(data) {
            plot.update((trial as f64, value));
        }
    }

    fn color(&self, i: usize) -> Color {
        if i == self.selected {
            Color::LightGreen
        } else {
            PALETTE[i % PALETTE.len()]
        }
    }

    fn render_combined(&self, area: Rect, buf: &mut Buffer) {
        let x_bounds = bounds(&self.plots, |p| p.x_bounds);
        let y_bounds = bounds(&self.plots, |p| p.y_bounds);
        let datasets = self
            .plots
            .iter()
            .enumerate()
            .map(|(i, plot)| plot.dataset(self.color(i)))
            .collect();

        Chart::new(datasets)
            .block(
                Block::bordered()
                    .border_type(BorderType::Rounded)
                    .title("Plots"),
            )
            .x_axis(
                Axis::default()
                    .title(self.x_title.as_str())
                    .dark_gray()
                    .labels(labels(x_bounds))
                    .bounds(x_bounds),
            )
            .y_axis(
                Axis::default()
                    .title(self.plots.first().map_or("", |p| p.name.as_str()))
                    .dark_gray()
                    .labels(labels(y_bounds))
                    .bounds(y_bounds),
            )
            .render(area, buf);
    }

    fn render_grid(&self, area: Rect, buf: &mut Buffer) {
        let grid = GridLayout::for_series(self.plots.len());
        let rows = Layout::vertical(vec![Constraint::Ratio(1, grid.rows as u32); grid.rows]).split(area);
        let cells: Vec<Rect> = rows
            .iter()
            .flat_map(|row| {
                Layout::horizontal(vec![Constraint::Ratio(1, grid.cols as u32); grid.cols])
                    .split(*row)
                    .to_vec()
            })
            .collect();

        // Cells past the last series stay blank
        for (i, (plot, cell)) in self.plots.iter().zip(cells).enumerate() {
            let x_bounds = bounds([plot], |p| p.x_bounds);
            let y_bounds = bounds([plot], |p| p.y_bounds);
            let title = if i == self.selected {
                plot.name.as_str().light_green().bold()
            } else {
                plot.name.as_str().white()
            };

            Chart::new(vec![plot.dataset(self.color(i))])
                .block(
                    Block::bordered()
                        .border_type(BorderType::Rounded)
                        .title(title),
                )
                .x_axis(
                    Axis::default()
                        .title(self.x_title.as_str())
                        .dark_gray()
                        .labels(labels(x_bounds))
                        .bounds(x_bounds),
                )
                .y_axis(
                    Axis::default()
                        .title(plot.name.as_str())
                        .dark_gray()
                        .labels(labels(y_bounds))
                        .bounds(y_bounds),
                )
                .hidden_legend_constraints((Constraint::Length(0), Constraint::Length(0)))
                .render(cell, buf);
        }
    }
}

impl WidgetRef for Plots {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        if self.plots.is_empty() {
            Paragraph::new("no series to plot")
                .block(Block::bordered().border_type(BorderType::Rounded))
                .render(area, buf);
            return;
        }
        match self.layout {
            ChartLayout::Combined => self.render_combined(area, buf),
            ChartLayout::Grid => self.render_grid(area, buf),
        }
    }
}

impl Component for Plots {
    fn handle_ui_event(&mut self, event: &Event) -> bool {
        match event_keycode(event) {
            Some(KeyCode::Left) => self.prev_plot(),
            Some(KeyCode::Right) => self.next_plot(),
            Some(KeyCode::Char('g')) => self.layout = self.layout.toggle(),
            _ => return false,
        }
        true
    }
}
