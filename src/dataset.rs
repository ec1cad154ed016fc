//! Immutable, row-major view of the training-records table.
//!
//! A [`Dataset`] is built once per session, either from an explicit list of
//! rows or by loading a CSV/Parquet export through polars, and is only ever
//! read afterwards.

use crate::error::{CardError, Result};
use crate::value::CellValue;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// One dataset row; cells are aligned with [`Dataset::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    cells: Vec<CellValue>,
}

impl Record {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }

    pub fn cells(&self) -> &[CellValue] {
        &self.cells
    }
}

/// Options for reading a dataset file
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Field separator for CSV files
    pub csv_separator: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { csv_separator: b',' }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, checking that labels are unique and rows are rectangular.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for label in &columns {
            if !seen.insert(label.as_str()) {
                return Err(CardError::Dataset(format!("Duplicate column label: {}", label)));
            }
        }

        let width = columns.len();
        let mut records = Vec::with_capacity(rows.len());
        for (i, cells) in rows.into_iter().enumerate() {
            if cells.len() != width {
                return Err(CardError::Dataset(format!(
                    "Row {} has {} cells, expected {}",
                    i,
                    cells.len(),
                    width
                )));
            }
            records.push(Record::new(cells));
        }

        Ok(Self { columns, rows: records })
    }

    pub fn empty(columns: Vec<String>) -> Result<Self> {
        Self::new(columns, Vec::new())
    }

    /// Convert a polars frame into a row-major dataset.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let height = df.height();

        let mut rows: Vec<Vec<CellValue>> = (0..height)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for series in df.get_columns() {
            for (i, row) in rows.iter_mut().enumerate() {
                let value = series.get(i)?;
                row.push(CellValue::from_any_value(&value));
            }
        }

        Self::new(columns, rows)
    }

    /// Load a CSV or Parquet export.
    ///
    /// CSV columns are all read as text so identifiers keep their leading
    /// zeros; dates are normalised later, per row. Parquet keeps its types.
    pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CardError::Dataset(format!("Dataset file not found: {}", path.display())));
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());

        let df = match extension.as_deref() {
            Some("csv") => LazyCsvReader::new(path)
                .with_has_header(true)
                .with_separator(options.csv_separator)
                .with_infer_schema_length(Some(0))
                .finish()
                .and_then(|lf| lf.collect())
                .map_err(|e| CardError::Dataset(format!("Failed to read CSV {}: {}", path.display(), e)))?,
            Some("parquet") => LazyFrame::scan_parquet(path, ScanArgsParquet::default())
                .and_then(|lf| lf.collect())
                .map_err(|e| CardError::Dataset(format!("Failed to read Parquet {}: {}", path.display(), e)))?,
            _ => {
                return Err(CardError::Dataset(format!(
                    "Unsupported dataset format: {} (expected .csv or .parquet)",
                    path.display()
                )))
            }
        };

        debug!("Loaded frame {}x{} from {}", df.height(), df.width(), path.display());
        let dataset = Self::from_frame(&df)?;
        info!(
            rows = dataset.len(),
            columns = dataset.columns.len(),
            "Dataset loaded from {}",
            path.display()
        );
        Ok(dataset)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Record> {
        self.rows.get(index)
    }

    /// Cell at `row` under column `label`
    pub fn value(&self, row: usize, label: &str) -> Option<&CellValue> {
        let col = self.column_index(label)?;
        self.rows.get(row)?.get(col)
    }

    /// First `n` rows, for eyeballing which columns a file carries.
    pub fn head(&self, n: usize) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = Dataset::new(
            labels(&["RE", "NOME"]),
            vec![vec![CellValue::text("1"), CellValue::text("Ana")], vec![CellValue::text("2")]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Row 1 has 1 cells, expected 2"));
    }

    #[test]
    fn test_new_rejects_duplicate_labels() {
        let err = Dataset::empty(labels(&["RE", "RE"])).unwrap_err();
        assert!(matches!(err, CardError::Dataset(_)));
    }

    #[test]
    fn test_value_lookup_by_label() {
        let ds = Dataset::new(
            labels(&["RE", "NOME"]),
            vec![vec![CellValue::text("12345"), CellValue::text("Ana")]],
        )
        .unwrap();
        assert_eq!(ds.value(0, "NOME"), Some(&CellValue::text("Ana")));
        assert_eq!(ds.value(0, "CARGO"), None);
        assert_eq!(ds.value(1, "NOME"), None);
    }

    #[test]
    fn test_from_frame_keeps_types() {
        let admission = Series::new("DATA_ADMISSAO", &[19066i32, 19067])
            .cast(&DataType::Date)
            .unwrap();
        let mut df = df!(
            "RE" => &["012345", "54321"],
            "NOME" => &["Ana", "Bruno"],
            "HORAS" => &[8i64, 16]
        )
        .unwrap();
        df.with_column(admission).unwrap();

        let ds = Dataset::from_frame(&df).unwrap();
        assert_eq!(ds.columns(), &labels(&["RE", "NOME", "HORAS", "DATA_ADMISSAO"])[..]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(0, "RE"), Some(&CellValue::text("012345")));
        assert_eq!(ds.value(1, "HORAS"), Some(&CellValue::Integer(16)));
        assert_eq!(
            ds.value(0, "DATA_ADMISSAO").and_then(|v| v.to_date()),
            NaiveDate::from_ymd_opt(2022, 3, 15)
        );
    }

    #[test]
    fn test_head_truncates_rows_only() {
        let rows = (0..5).map(|i| vec![CellValue::Integer(i)]).collect();
        let ds = Dataset::new(labels(&["N"]), rows).unwrap();
        let head = ds.head(3);
        assert_eq!(head.len(), 3);
        assert_eq!(head.columns(), ds.columns());
        assert_eq!(ds.head(10).len(), 5);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let path = std::env::temp_dir().join(format!("training-card-{}.xlsx", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not a spreadsheet").unwrap();
        let err = Dataset::load(&path, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Unsupported dataset format"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Dataset::load("/definitely/not/here.csv", &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Dataset file not found"));
    }
}
