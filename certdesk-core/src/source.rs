//! Tabular employee data sources.
//!
//! The directory only needs a header row and text cells; where they come
//! from is behind [`EmployeeSource`].

use std::path::PathBuf;

use calamine::{Data, Reader, open_workbook_auto};

use crate::error::{DeskError, DeskResult};

/// A header row plus text rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

/// Anything that can produce an employee table.
pub trait EmployeeSource: Send + Sync {
    fn read_table(&self) -> DeskResult<Table>;
}

/// First worksheet of a spreadsheet file (xlsx, xls, ods).
#[derive(Debug, Clone)]
pub struct SpreadsheetSource {
    path: PathBuf,
}

impl SpreadsheetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EmployeeSource for SpreadsheetSource {
    fn read_table(&self) -> DeskResult<Table> {
        let mut workbook = open_workbook_auto(&self.path).map_err(|e| {
            DeskError::DataSource(format!("Cannot open {}: {}", self.path.display(), e))
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| {
                DeskError::DataSource(format!("{} has no worksheets", self.path.display()))
            })?
            .map_err(|e| {
                DeskError::DataSource(format!("Cannot read {}: {}", self.path.display(), e))
            })?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());

        let headers = rows.next().unwrap_or_default();
        Ok(Table::new(headers, rows.collect()))
    }
}

/// Cell as display text; whole floats lose their ".0" so extensions and
/// room numbers read naturally.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

/// In-memory table, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct TableSource {
    table: Table,
}

impl TableSource {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// Build from string slices, first row being the header.
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(Table::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        ))
    }
}

impl EmployeeSource for TableSource {
    fn read_table(&self) -> DeskResult<Table> {
        Ok(self.table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Float(1234.0)), "1234");
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::String(" PC01 ".into())), "PC01");
    }

    #[test]
    fn test_missing_spreadsheet_is_data_source_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = SpreadsheetSource::new(dir.path().join("missing.xlsx"));
        assert!(matches!(source.read_table(), Err(DeskError::DataSource(_))));
    }

    #[test]
    fn test_table_source_from_rows() {
        let source = TableSource::from_rows(&["A", "B"], &[&["1", "2"]]);
        let table = source.read_table().unwrap();
        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }
}
