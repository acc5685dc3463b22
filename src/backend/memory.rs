//! In-memory backend: a workbook is a list of dense cell grids, serialized
//! as JSON. Useful wherever a real file format is not needed.

use serde::{Deserialize, Serialize};

use super::{column_letter, SheetLayout, SpreadsheetBackend};
use crate::config::ExcelOptions;
use crate::error::{SheetError, SheetResult};
use crate::value::CellValue;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemorySheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
    /// Merged ranges in A1 notation
    #[serde(default)]
    pub merges: Vec<String>,
    #[serde(default)]
    pub autofit: bool,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sheet with the given rows starting at A1
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
            ..Default::default()
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&NULL)
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Null);
        }
        cells[col] = value;
    }

    fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryWorkbook {
    pub sheets: Vec<MemorySheet>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sheet(mut self, sheet: MemorySheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn to_bytes(&self) -> SheetResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> SheetResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| SheetError::Backend(format!("Failed to open workbook: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

impl SpreadsheetBackend for MemoryBackend {
    type Workbook = MemoryWorkbook;
    type Worksheet = MemorySheet;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn open_workbook(&self, bytes: &[u8]) -> SheetResult<MemoryWorkbook> {
        MemoryWorkbook::from_bytes(bytes)
    }

    fn get_worksheet(
        &self,
        workbook: &mut MemoryWorkbook,
        name: Option<&str>,
    ) -> SheetResult<Option<MemorySheet>> {
        let sheet = match name {
            Some(name) => workbook.sheet(name),
            None => workbook.sheets.first(),
        };
        Ok(sheet.cloned())
    }

    fn worksheet_name(&self, worksheet: &MemorySheet) -> String {
        worksheet.name.clone()
    }

    fn sheet_has_data(&self, worksheet: &MemorySheet) -> bool {
        worksheet.rows.iter().flatten().any(|c| !c.is_null())
    }

    fn estimate_column_count(&self, worksheet: &MemorySheet) -> usize {
        worksheet.width()
    }

    fn data_start_row(&self, _worksheet: &MemorySheet, header_row: Option<usize>) -> usize {
        header_row.map_or(0, |h| h + 1)
    }

    fn data_end_row(&self, worksheet: &MemorySheet) -> usize {
        worksheet.rows.len()
    }

    fn get_cell(&self, worksheet: &MemorySheet, row: usize, col: usize) -> CellValue {
        worksheet.cell(row, col).clone()
    }

    fn create_workbook(&self) -> SheetResult<MemoryWorkbook> {
        Ok(MemoryWorkbook::new())
    }

    fn create_worksheet(&self, workbook: &mut MemoryWorkbook, name: &str) -> SheetResult<MemorySheet> {
        if workbook.sheet(name).is_some() {
            return Err(SheetError::Backend(format!(
                "Worksheet '{}' already exists",
                name
            )));
        }
        Ok(MemorySheet::new(name))
    }

    fn write_title(
        &self,
        worksheet: &mut MemorySheet,
        row: u32,
        title: &str,
        column_count: usize,
        _options: &ExcelOptions,
    ) -> SheetResult<()> {
        let row = row as usize;
        worksheet.set_cell(row, 0, CellValue::String(title.to_string()));
        if column_count > 1 {
            worksheet.merges.push(format!(
                "A{}:{}{}",
                row + 1,
                column_letter(column_count - 1),
                row + 1
            ));
        }
        Ok(())
    }

    fn write_header_row(
        &self,
        worksheet: &mut MemorySheet,
        row: u32,
        headers: &[String],
        _options: &ExcelOptions,
    ) -> SheetResult<()> {
        for (col, header) in headers.iter().enumerate() {
            worksheet.set_cell(row as usize, col, CellValue::String(header.clone()));
        }
        Ok(())
    }

    fn write_data_rows(
        &self,
        worksheet: &mut MemorySheet,
        start_row: u32,
        rows: &[Vec<CellValue>],
        _options: &ExcelOptions,
    ) -> SheetResult<()> {
        for (offset, row) in rows.iter().enumerate() {
            let row_idx = start_row as usize + offset;
            if worksheet.rows.len() <= row_idx {
                worksheet.rows.resize_with(row_idx + 1, Vec::new);
            }
            for (col, cell) in row.iter().enumerate() {
                if !cell.is_null() {
                    worksheet.set_cell(row_idx, col, cell.clone());
                }
            }
        }
        Ok(())
    }

    fn finish_worksheet(
        &self,
        worksheet: &mut MemorySheet,
        _layout: &SheetLayout,
        options: &ExcelOptions,
    ) -> SheetResult<()> {
        worksheet.autofit = options.auto_fit_columns;
        Ok(())
    }

    fn attach_worksheet(&self, workbook: &mut MemoryWorkbook, worksheet: MemorySheet) -> SheetResult<()> {
        workbook.sheets.push(worksheet);
        Ok(())
    }

    fn save_to_stream(&self, workbook: &mut MemoryWorkbook) -> SheetResult<Vec<u8>> {
        workbook.to_bytes()
    }

    fn close_workbook(&self, _workbook: MemoryWorkbook) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cell_grows_grid() {
        let mut sheet = MemorySheet::new("s");
        sheet.set_cell(2, 3, CellValue::Integer(1));
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.width(), 4);
        assert_eq!(sheet.cell(2, 3), &CellValue::Integer(1));
        assert_eq!(sheet.cell(9, 9), &CellValue::Null);
    }

    #[test]
    fn test_title_merge_range() {
        let backend = MemoryBackend;
        let mut sheet = MemorySheet::new("s");
        backend
            .write_title(&mut sheet, 0, "Report", 3, &ExcelOptions::default())
            .unwrap();
        assert_eq!(sheet.merges, vec!["A1:C1".to_string()]);
    }

    #[test]
    fn test_blank_sheet_has_no_data() {
        let sheet = MemorySheet::from_rows("s", vec![vec![CellValue::from(" "), CellValue::Null]]);
        assert!(!MemoryBackend.sheet_has_data(&sheet));
    }

    #[test]
    fn test_garbage_bytes_fail_to_open() {
        assert!(matches!(
            MemoryBackend.open_workbook(b"not json"),
            Err(SheetError::Backend(_))
        ));
    }
}
