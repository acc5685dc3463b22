//! Spreadsheet backend contract
//!
//! A backend wraps one concrete spreadsheet engine. The import and export
//! pipelines only talk to this trait, so swapping engines never changes
//! pipeline logic.
//!
//! Coordinates are zero-based `(row, column)` worksheet positions.

mod memory;
mod xlsx;

pub use memory::{MemoryBackend, MemorySheet, MemoryWorkbook};
pub use xlsx::{XlsxBackend, XlsxWorkbook, XlsxWorksheet};

use crate::config::ExcelOptions;
use crate::error::SheetResult;
use crate::value::CellValue;

/// Where the export pipeline placed things on a worksheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub title_row: Option<u32>,
    pub header_row: u32,
    pub first_data_row: u32,
    pub row_count: usize,
    pub column_count: usize,
}

impl SheetLayout {
    /// Last written row, inclusive
    pub fn last_row(&self) -> u32 {
        if self.row_count == 0 {
            self.header_row
        } else {
            self.first_data_row + self.row_count as u32 - 1
        }
    }
}

pub trait SpreadsheetBackend: Send + Sync {
    /// Open or newly created document
    type Workbook;
    /// One sheet of a workbook. Import hands out read views; export
    /// builds sheets detached and attaches them before saving.
    type Worksheet;

    /// Short engine name for logs
    fn name(&self) -> &'static str;

    // Reading

    fn open_workbook(&self, bytes: &[u8]) -> SheetResult<Self::Workbook>;

    /// Sheet by name, or the first sheet; `Ok(None)` when absent
    fn get_worksheet(
        &self,
        workbook: &mut Self::Workbook,
        name: Option<&str>,
    ) -> SheetResult<Option<Self::Worksheet>>;

    fn worksheet_name(&self, worksheet: &Self::Worksheet) -> String;

    fn sheet_has_data(&self, worksheet: &Self::Worksheet) -> bool;

    /// One past the right-most used column
    fn estimate_column_count(&self, worksheet: &Self::Worksheet) -> usize;

    /// First body row given the header row (`None` = no header)
    fn data_start_row(&self, worksheet: &Self::Worksheet, header_row: Option<usize>) -> usize;

    /// One past the last used row
    fn data_end_row(&self, worksheet: &Self::Worksheet) -> usize;

    /// Cell content; unused cells read as [`CellValue::Null`]
    fn get_cell(&self, worksheet: &Self::Worksheet, row: usize, col: usize) -> CellValue;

    // Writing

    fn create_workbook(&self) -> SheetResult<Self::Workbook>;

    fn create_worksheet(
        &self,
        workbook: &mut Self::Workbook,
        name: &str,
    ) -> SheetResult<Self::Worksheet>;

    /// Title text merged across `column_count` columns of `row`
    fn write_title(
        &self,
        worksheet: &mut Self::Worksheet,
        row: u32,
        title: &str,
        column_count: usize,
        options: &ExcelOptions,
    ) -> SheetResult<()>;

    fn write_header_row(
        &self,
        worksheet: &mut Self::Worksheet,
        row: u32,
        headers: &[String],
        options: &ExcelOptions,
    ) -> SheetResult<()>;

    /// Write `rows` starting at `start_row`; null cells stay empty
    fn write_data_rows(
        &self,
        worksheet: &mut Self::Worksheet,
        start_row: u32,
        rows: &[Vec<CellValue>],
        options: &ExcelOptions,
    ) -> SheetResult<()>;

    /// Engine-specific post formatting such as column autofit
    fn finish_worksheet(
        &self,
        worksheet: &mut Self::Worksheet,
        layout: &SheetLayout,
        options: &ExcelOptions,
    ) -> SheetResult<()>;

    fn attach_worksheet(
        &self,
        workbook: &mut Self::Workbook,
        worksheet: Self::Worksheet,
    ) -> SheetResult<()>;

    fn save_to_stream(&self, workbook: &mut Self::Workbook) -> SheetResult<Vec<u8>>;

    /// Release the workbook. Called on every exit path once it was opened.
    fn close_workbook(&self, workbook: Self::Workbook);
}

/// Zero-based column index to letters (0 → A, 26 → AA)
pub fn column_letter(index: usize) -> String {
    let mut result = String::new();
    let mut num = index;

    loop {
        let remainder = num % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if num < 26 {
            break;
        }
        num = num / 26 - 1;
    }

    result
}
