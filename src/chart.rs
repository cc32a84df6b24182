//! Charting of [`ScalarTable`]s
//!
//! A table is drawn either as one combined chart holding every series or as a near-square
//! grid with one subplot per series. The terminal viewer lives in `viz`, PNG output behind
//! the `png` feature.

use serde::{Deserialize, Serialize};

use crate::export::ScalarTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartLayout {
    /// All series on one set of axes
    Combined,
    /// One subplot per series
    #[default]
    Grid,
}

impl ChartLayout {
    pub fn toggle(self) -> Self {
        match self {
            Self::Combined => Self::Grid,
            Self::Grid => Self::Combined,
        }
    }
}

/// Subplot arrangement for a grid chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
    pub series: usize,
}

impl GridLayout {
    /// `rows = floor(sqrt(n))` and `cols = ceil(n / rows)`, both at least 1
    pub fn for_series(series: usize) -> Self {
        let rows = ((series as f64).sqrt().floor() as usize).max(1);
        let cols = series.div_ceil(rows).max(1);
        Self { rows, cols, series }
    }

    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Cells left blank after placing every series
    pub fn unused_cells(&self) -> usize {
        self.cells() - self.series
    }

    /// `(row, col)` of series `i`, filled row by row
    pub fn cell(&self, i: usize) -> Option<(usize, usize)> {
        (i < self.series).then(|| (i / self.cols, i % self.cols))
    }
}

/// Padded y bounds for the given series, `(0, 1)` when nothing is plottable
pub(crate) fn y_bounds(table: &ScalarTable, cols: impl IntoIterator<Item = usize>) -> (f64, f64) {
    match table.y_range(cols) {
        Some((lo, hi)) if hi > lo => {
            let pad = (hi - lo) * 0.05;
            (lo - pad, hi + pad)
        }
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (0.0, 1.0),
    }
}

/// X bounds of the table, widened when it holds a single row
pub(crate) fn x_bounds(table: &ScalarTable) -> (f64, f64) {
    match table.x_range() {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (0.0, 1.0),
    }
}

/// Y axis title of a combined chart, named after the first series
pub fn combined_y_label(table: &ScalarTable) -> &str {
    table.series.first().map_or("", String::as_str)
}

#[cfg(feature = "png")]
pub use self::png::render_png;

#[cfg(feature = "png")]
mod png {
    use std::path::Path;

    use plotters::{
        backend::BitMapBackend,
        chart::ChartBuilder,
        coord::Shift,
        drawing::{DrawingArea, IntoDrawingArea},
        element::PathElement,
        series::LineSeries,
        style::{Color, IntoFont, Palette, Palette99, BLACK, WHITE},
    };

    use super::{combined_y_label, x_bounds, y_bounds, ChartLayout, GridLayout};
    use crate::{
        error::{Error, Result},
        export::ScalarTable,
    };

    fn chart_err(e: impl std::fmt::Display) -> Error {
        Error::Chart(e.to_string())
    }

    /// Draw `table` to a PNG file of `size` pixels
    pub fn render_png(
        table: &ScalarTable,
        layout: ChartLayout,
        path: impl AsRef<Path>,
        size: (u32, u32),
    ) -> Result<()> {
        if table.series.is_empty() {
            return Err(Error::Chart(String::from("table has no series to plot")));
        }

        let root = BitMapBackend::new(path.as_ref(), size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        match layout {
            ChartLayout::Combined => draw_combined(&root, table)?,
            ChartLayout::Grid => {
                let grid = GridLayout::for_series(table.series.len());
                let areas = root.split_evenly((grid.rows, grid.cols));
                // Areas past the last series are left blank
                for (col, area) in areas.iter().take(grid.series).enumerate() {
                    draw_single(area, table, col)?;
                }
            }
        }

        root.present().map_err(chart_err)
    }

    fn draw_combined(area: &DrawingArea<BitMapBackend, Shift>, table: &ScalarTable) -> Result<()> {
        let (x0, x1) = x_bounds(table);
        let (y0, y1) = y_bounds(table, 0..table.series.len());
        let mut chart = ChartBuilder::on(area)
            .margin(5)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_desc(table.x_label.as_str())
            .y_desc(combined_y_label(table))
            .draw()
            .map_err(chart_err)?;

        for (col, name) in table.series.iter().enumerate() {
            let color = Palette99::pick(col).to_rgba();
            chart
                .draw_series(LineSeries::new(table.points(col), &color))
                .map_err(chart_err)?
                .label(name)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err)
    }

    fn draw_single(
        area: &DrawingArea<BitMapBackend, Shift>,
        table: &ScalarTable,
        col: usize,
    ) -> Result<()> {
        let (x0, x1) = x_bounds(table);
        let (y0, y1) = y_bounds(table, [col]);
        let name = &table.series[col];
        let mut chart = ChartBuilder::on(area)
            .caption(name, ("sans-serif", 16).into_font())
            .margin(5)
            .x_label_area_size(30)
            .y_label_area_size(45)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_desc(table.x_label.as_str())
            .y_desc(name.as_str())
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(LineSeries::new(
                table.points(col),
                &Palette99::pick(col).to_rgba(),
            ))
            .map_err(chart_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_for_seven_series() {
        let grid = GridLayout::for_series(7);
        assert_eq!((grid.rows, grid.cols), (2, 4));
        assert_eq!(grid.unused_cells(), 1);
        assert_eq!(grid.cell(6), Some((1, 2)));
        assert_eq!(grid.cell(7), None);
    }

    #[test]
    fn grid_shapes() {
        let shape = |n| {
            let g = GridLayout::for_series(n);
            (g.rows, g.cols, g.unused_cells())
        };
        assert_eq!(shape(0), (1, 1, 1));
        assert_eq!(shape(1), (1, 1, 0));
        assert_eq!(shape(3), (1, 3, 0));
        assert_eq!(shape(4), (2, 2, 0));
        assert_eq!(shape(10), (3, 4, 2));
    }

    #[test]
    fn bounds_are_padded() {
        let table = ScalarTable {
            x_label: String::from("step"),
            series: vec![String::from("a")],
            rows: vec![crate::export::ScalarLogRow {
                step: 0.0,
                values: vec![Some(3.0)],
            }],
        };
        assert_eq!(x_bounds(&table), (-1.0, 1.0));
        assert_eq!(y_bounds(&table, [0]), (2.0, 4.0));
    }

    #[test]
    fn combined_axis_named_after_first_series() {
        let mut table = ScalarTable {
            x_label: String::from("step"),
            series: vec![String::from("reward"), String::from("loss")],
            rows: Vec::new(),
        };
        assert_eq!(combined_y_label(&table), "reward");
        table.series.clear();
        assert_eq!(combined_y_label(&table), "");
    }

    #[test]
    fn layout_toggles() {
        assert_eq!(ChartLayout::Grid.toggle(), ChartLayout::Combined);
        assert_eq!(ChartLayout::default().toggle().toggle(), ChartLayout::Grid);
    }

    #[cfg(feature = "png")]
    #[test]
    fn renders_png_grid() {
        use crate::metrics::MemoryStore;

        let mut store = MemoryStore::new();
        for i in 0..20u64 {
            for name in ["a", "b", "c"] {
                store.record(name, i, (i as f64).sin());
            }
        }
        let table = ScalarTable::from_store(&store);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        render_png(&table, ChartLayout::Combined, &path, (320, 240)).unwrap();
        assert!(path.exists());
    }
}
