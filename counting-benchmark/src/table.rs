//! CSV-backed result table
//!
//! Every pipeline stage reads one flat table keyed by `filename`, fills in
//! its own columns and rewrites the whole file after each row. A missing
//! value is an empty cell. Numeric columns also read the spellings dataframe
//! tools leave behind (`NaN`, `<NA>`, ...) as missing; text cells keep them.

use indexmap::IndexSet;
use std::path::Path;

/// Column holding the image file name
pub const FILENAME: &str = "filename";
/// Column holding the object class name
pub const CLASS: &str = "class";
/// Column holding the ground-truth count
pub const OBJECT_COUNT: &str = "object_count";

const MISSING_SPELLINGS: &[&str] = &["", "nan", "NaN", "NA", "<NA>", "None", "null"];

fn is_empty_cell(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// True if a raw numeric cell denotes a missing value
pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    MISSING_SPELLINGS.contains(&cell)
}

/// Error type for table operations
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid value {value:?} in column {column} (row {row})")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Row {row} has {found} fields, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
}

pub type TableResult<T> = Result<T, TableError>;

/// In-memory copy of a CSV table with ordered columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: IndexSet<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// Create an empty table with the given header
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Read a table from a CSV file
    pub fn read(path: impl AsRef<Path>) -> TableResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Read a table from any CSV source
    pub fn from_reader<R: std::io::Read>(reader: R) -> TableResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: IndexSet<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            // Short rows come from older runs that predate a column
            if record.len() > columns.len() {
                return Err(TableError::RowWidth {
                    row: idx,
                    found: record.len(),
                    expected: columns.len(),
                });
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Rewrite the whole table to `path`.
    ///
    /// The file is written next to the target and renamed over it, so an
    /// interrupted run never leaves a truncated table behind.
    pub fn write(&self, path: impl AsRef<Path>) -> TableResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            self.write_records(&mut writer)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write_records<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> TableResult<()> {
        writer.write_record(self.columns.iter())?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    fn column_index(&self, column: &str) -> TableResult<usize> {
        self.columns
            .get_index_of(column)
            .ok_or_else(|| TableError::MissingColumn(column.to_string()))
    }

    /// Fail unless every listed column is present
    pub fn require_columns(&self, columns: &[&str]) -> TableResult<()> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    /// Add a column of missing values unless it already exists
    pub fn ensure_column(&mut self, column: &str) {
        if self.columns.insert(column.to_string()) {
            for row in &mut self.rows {
                row.push(String::new());
            }
        }
    }

    /// Set every cell of a column to missing, adding the column if needed
    pub fn clear_column(&mut self, column: &str) {
        self.ensure_column(column);
        if let Some(idx) = self.columns.get_index_of(column) {
            for row in &mut self.rows {
                row[idx].clear();
            }
        }
    }

    /// Append a row given as (column, value) pairs; unnamed columns stay missing
    pub fn push_row<'a>(&mut self, cells: impl IntoIterator<Item = (&'a str, String)>) -> TableResult<()> {
        let mut row = vec![String::new(); self.columns.len()];
        for (column, value) in cells {
            row[self.column_index(column)?] = value;
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell value, or `None` when the cell is missing
    pub fn get(&self, row: usize, column: &str) -> TableResult<Option<&str>> {
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .get(row)
            .map(|r| r[idx].as_str())
            .filter(|cell| !is_empty_cell(cell)))
    }

    /// Overwrite a cell; `None` writes the missing marker
    pub fn set(&mut self, row: usize, column: &str, value: Option<&str>) -> TableResult<()> {
        let idx = self.column_index(column)?;
        if let Some(r) = self.rows.get_mut(row) {
            r[idx] = value.unwrap_or_default().to_string();
        }
        Ok(())
    }

    /// Every value of a column, missing cells as `None`
    pub fn column(&self, column: &str) -> TableResult<Vec<Option<&str>>> {
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .map(|r| Some(r[idx].as_str()).filter(|cell| !is_empty_cell(cell)))
            .collect())
    }

    /// Numeric column, missing cells as `None`.
    ///
    /// Integers written by earlier runs may carry a trailing `.0`, so
    /// values are parsed as floats.
    pub fn numeric_column(&self, column: &str) -> TableResult<Vec<Option<f64>>> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, r)| {
                let text = r[idx].as_str();
                if is_missing(text) {
                    return Ok(None);
                }
                text.trim().parse::<f64>().map(Some).map_err(|_| TableError::InvalidValue {
                    row,
                    column: column.to_string(),
                    value: text.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "filename,class,object_count,human\n\
                          2.jpg,apples,12,11\n\
                          7.jpg,birds,150,\n";

    #[test]
    fn test_read_and_get() {
        let table = ResultTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, CLASS).unwrap(), Some("apples"));
        assert_eq!(table.get(1, "human").unwrap(), None);
        assert!(matches!(table.get(0, "nope"), Err(TableError::MissingColumn(_))));
    }

    #[test]
    fn test_numeric_column_accepts_float_spelling() {
        let csv = "filename,object_count,pred\na.jpg,3,3.0\nb.jpg,4,<NA>\nc.jpg,5,NaN\n";
        let table = ResultTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            table.numeric_column("pred").unwrap(),
            vec![Some(3.0), None, None]
        );
    }

    #[test]
    fn test_numeric_column_rejects_text() {
        let csv = "filename,object_count\na.jpg,many\n";
        let table = ResultTable::from_reader(csv.as_bytes()).unwrap();
        match table.numeric_column(OBJECT_COUNT) {
            Err(TableError::InvalidValue { row, value, .. }) => {
                assert_eq!(row, 0);
                assert_eq!(value, "many");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_ensure_and_clear_column() {
        let mut table = ResultTable::from_reader(SAMPLE.as_bytes()).unwrap();
        table.ensure_column("full_response");
        table.set(0, "full_response", Some("text")).unwrap();
        table.ensure_column("full_response");
        assert_eq!(table.get(0, "full_response").unwrap(), Some("text"));

        table.clear_column("full_response");
        assert_eq!(table.get(0, "full_response").unwrap(), None);
        assert_eq!(table.columns().count(), 5);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let csv = "filename,class,object_count,extra\na.jpg,cats,3\n";
        let table = ResultTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.get(0, "extra").unwrap(), None);
    }

    #[test]
    fn test_long_rows_are_rejected() {
        let csv = "filename,class\na.jpg,cats,3\n";
        assert!(matches!(
            ResultTable::from_reader(csv.as_bytes()),
            Err(TableError::RowWidth { row: 0, found: 3, expected: 2 })
        ));
    }

    #[test]
    fn test_write_round_trip_preserves_embedded_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.csv");

        let mut table = ResultTable::new([FILENAME, "full_response"]);
        table
            .push_row([(FILENAME, "a.jpg".to_string()), ("full_response", "line one,\n\"two\"".to_string())])
            .unwrap();
        table.write(&path).unwrap();

        let reloaded = ResultTable::read(&path).unwrap();
        assert_eq!(reloaded, table);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_text_cells_keep_missing_spellings() {
        let csv = "filename,answer_raw,pred\na.jpg,None,NA\nb.jpg,NA,null\nc.jpg,  ,4\n";
        let table = ResultTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.get(0, "answer_raw").unwrap(), Some("None"));
        assert_eq!(
            table.column("answer_raw").unwrap(),
            vec![Some("None"), Some("NA"), None]
        );
        assert_eq!(
            table.numeric_column("pred").unwrap(),
            vec![None, None, Some(4.0)]
        );
    }
}
