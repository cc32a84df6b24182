//! Flattening of recorded metrics into a tab-delimited table
//!
//! The exported table has a `step\t<metric>...` header and one row per point index. A metric
//! with fewer points than the longest one leaves its remaining fields empty.

use std::path::{Path, PathBuf};

use crate::{error::Result, metrics::MetricsStore};

/// File name of the exported table
pub const EXPORT_FILE: &str = "log.csv";

/// One row of a [`ScalarTable`]: an x value and one optional value per series
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarLogRow {
    pub step: f64,
    pub values: Vec<Option<f64>>,
}

/// A table whose first column is the independent variable and remaining columns are series
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarTable {
    /// Name of the first column
    pub x_label: String,
    /// Series names, in column order
    pub series: Vec<String>,
    pub rows: Vec<ScalarLogRow>,
}

impl ScalarTable {
    /// Build the table for `store`, columns in the store's discovery order
    pub fn from_store(store: &impl MetricsStore) -> Self {
        let series = store.metric_names();
        let columns: Vec<_> = series.iter().map(|name| store.values(name)).collect();
        let len = columns.iter().map(Vec::len).max().unwrap_or(0);

        let rows = (0..len)
            .map(|i| ScalarLogRow {
                step: i as f64,
                values: columns
                    .iter()
                    .map(|points| points.get(i).map(|&(_, v)| v))
                    .collect(),
            })
            .collect();

        Self {
            x_label: String::from("step"),
            series,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a series column by name
    pub fn series_index(&self, name: &str) -> Option<usize> {
        self.series.iter().position(|s| s == name)
    }

    /// Value of series `name` in row `row`, `None` when missing
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.series_index(name)?;
        self.rows.get(row)?.values[col]
    }

    /// The recorded points of series `col`, skipping missing values
    pub fn points(&self, col: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.rows
            .iter()
            .filter_map(move |row| row.values[col].map(|v| (row.step, v)))
    }

    /// Smallest and largest value over the given series
    pub fn y_range(&self, cols: impl IntoIterator<Item = usize>) -> Option<(f64, f64)> {
        cols.into_iter()
            .flat_map(|col| self.points(col).map(|(_, y)| y))
            .filter(|y| y.is_finite())
            .fold(None, |range, y| match range {
                None => Some((y, y)),
                Some((lo, hi)) => Some((f64::min(lo, y), f64::max(hi, y))),
            })
    }

    pub fn x_range(&self) -> Option<(f64, f64)> {
        let first = self.rows.first()?.step;
        let last = self.rows.last()?.step;
        Some((first.min(last), first.max(last)))
    }

    /// Write as tab-delimited text with a header row
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;
        writer.write_record(std::iter::once(&self.x_label).chain(&self.series))?;
        for row in &self.rows {
            let fields = std::iter::once(row.step.to_string()).chain(
                row.values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(fields)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a tab-delimited table with a header row, empty fields read as missing
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let mut names = headers.iter().map(str::to_owned);
        let x_label = names.next().unwrap_or_default();
        let series = names.collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter().map(|f| parse_field(f, &record));
            let step = fields.next().transpose()?.flatten().unwrap_or(rows.len() as f64);
            let values = fields.collect::<Result<_>>()?;
            rows.push(ScalarLogRow { step, values });
        }

        Ok(Self {
            x_label,
            series,
            rows,
        })
    }
}

fn parse_field(field: &str, record: &csv::StringRecord) -> Result<Option<f64>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    field.parse().map(Some).map_err(|e| {
        let line = record.position().map_or(0, |p| p.line());
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("line {line}: `{field}` is not a number: {e}"),
        )
        .into()
    })
}

/// Export every metric in `store` to the table at `out`
pub fn export_scalars(store: &impl MetricsStore, out: impl AsRef<Path>) -> Result<ScalarTable> {
    let table = ScalarTable::from_store(store);
    table.write(out)?;
    Ok(table)
}

/// Where an export of `source` goes by default
///
/// `<source>/log.csv` for a directory, a `log.csv` next to it for a file.
pub fn default_output_path(source: &Path) -> PathBuf {
    if source.is_dir() {
        source.join(EXPORT_FILE)
    } else {
        source
            .parent()
            .map_or_else(|| PathBuf::from(EXPORT_FILE), |dir| dir.join(EXPORT_FILE))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::metrics::MemoryStore;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        for i in 0..5 {
            store.record("A", i * 100, i as f64);
            if i < 3 {
                store.record("B", i * 100, 10.0 + i as f64);
            }
        }
        store
    }

    #[test]
    fn shorter_metrics_leave_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(EXPORT_FILE);
        let table = export_scalars(&store(), &out).unwrap();

        assert_eq!(table.series, ["A", "B"]);
        assert_eq!(table.rows.len(), 5);
        assert_eq!(table.value(2, "B"), Some(12.0));
        assert_eq!(table.value(3, "B"), None);
        assert_eq!(table.value(4, "B"), None);
        assert_eq!(table.value(4, "A"), Some(4.0));

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "step\tA\tB");
        assert_eq!(lines[1], "0\t0\t10");
        assert_eq!(lines[4], "3\t3\t");

        assert_eq!(ScalarTable::read(&out).unwrap(), table);
    }

    #[test]
    fn column_order_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let first = export_scalars(&store(), dir.path().join("a.csv")).unwrap();
        let second = export_scalars(&store(), dir.path().join("b.csv")).unwrap();
        assert_eq!(first.series, second.series);
        assert_eq!(
            fs::read(dir.path().join("a.csv")).unwrap(),
            fs::read(dir.path().join("b.csv")).unwrap()
        );
    }

    #[test]
    fn empty_store_exports_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(EXPORT_FILE);
        let table = export_scalars(&MemoryStore::new(), &out).unwrap();
        assert!(table.is_empty());
        assert_eq!(fs::read_to_string(&out).unwrap(), "step\n");
    }

    #[test]
    fn default_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(default_output_path(dir.path()), dir.path().join(EXPORT_FILE));
        let file = dir.path().join("events.jsonl");
        assert_eq!(default_output_path(&file), dir.path().join(EXPORT_FILE));
    }

    #[test]
    fn read_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tsv");
        fs::write(&path, "x\ty\n0\t1.5\n1\tabc\n").unwrap();
        assert!(ScalarTable::read(&path).is_err());
    }

    #[test]
    fn y_range_skips_missing() {
        let table = ScalarTable::from_store(&store());
        assert_eq!(table.y_range([0, 1]), Some((0.0, 12.0)));
        assert_eq!(table.y_range([1]), Some((10.0, 12.0)));
        assert_eq!(table.x_range(), Some((0.0, 4.0)));
    }
}
