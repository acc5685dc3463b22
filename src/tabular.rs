//! In-memory tabular data model: named, typed columns plus aligned rows.

use serde::{Deserialize, Serialize};

use crate::error::{SheetError, SheetResult};
use crate::value::{CellKind, CellValue};

/// A named column with its declared value kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularColumn {
    pub name: String,
    pub kind: CellKind,
}

impl TabularColumn {
    pub fn new(name: impl Into<String>, kind: CellKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered columns plus rows of cells aligned to them.
///
/// Every row has exactly `columns.len()` cells and column names are unique.
/// The mutating methods keep both invariants; [`TabularData::validate`]
/// checks them on values built elsewhere (e.g. deserialized JSON).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TabularData {
    pub name: String,
    columns: Vec<TabularColumn>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append a column; existing rows get a null cell for it.
    pub fn add_column(&mut self, name: impl Into<String>, kind: CellKind) -> SheetResult<()> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(SheetError::Validation(format!(
                "Duplicate column name '{}'",
                name
            )));
        }
        self.columns.push(TabularColumn::new(name, kind));
        for row in &mut self.rows {
            row.push(CellValue::Null);
        }
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, kind: CellKind) -> SheetResult<Self> {
        self.add_column(name, kind)?;
        Ok(self)
    }

    pub fn add_row(&mut self, row: Vec<CellValue>) -> SheetResult<()> {
        if row.len() != self.columns.len() {
            return Err(SheetError::Validation(format!(
                "Row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[TabularColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cell by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check row lengths and column name uniqueness
    pub fn validate(&self) -> SheetResult<()> {
        for (idx, column) in self.columns.iter().enumerate() {
            if self.columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(SheetError::Validation(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }
        for (idx, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(SheetError::Validation(format!(
                    "Row {} has {} cells, expected {}",
                    idx,
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn from_parts(
        name: String,
        columns: Vec<TabularColumn>,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        Self {
            name,
            columns,
            rows,
        }
    }
}
