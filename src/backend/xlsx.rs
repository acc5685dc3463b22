//! XLSX backend: calamine reads, rust_xlsxwriter writes

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use std::io::Cursor;

use super::{SheetLayout, SpreadsheetBackend};
use crate::coerce::{datetime_to_serial, serial_to_datetime};
use crate::config::{ExcelOptions, StyleOptions};
use crate::error::{SheetError, SheetResult};
use crate::value::CellValue;

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Workbook handle: a parsed file being read, or a new one being written
pub enum XlsxWorkbook {
    Reader(Box<Xlsx<Cursor<Vec<u8>>>>),
    Writer(Box<Workbook>),
}

/// Worksheet handle, matching the workbook mode
pub enum XlsxWorksheet {
    Reader { name: String, range: Range<Data> },
    Writer(Box<Worksheet>),
}

impl XlsxWorksheet {
    /// The rust_xlsxwriter sheet, for export hooks
    pub fn writer(&mut self) -> Option<&mut Worksheet> {
        match self {
            XlsxWorksheet::Writer(ws) => Some(ws.as_mut()),
            XlsxWorksheet::Reader { .. } => None,
        }
    }

    pub fn range(&self) -> Option<&Range<Data>> {
        match self {
            XlsxWorksheet::Reader { range, .. } => Some(range),
            XlsxWorksheet::Writer(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxBackend;

fn xlsx_error(e: XlsxError) -> SheetError {
    SheetError::Backend(e.to_string())
}

fn writer_sheet(worksheet: &mut XlsxWorksheet) -> SheetResult<&mut Worksheet> {
    worksheet
        .writer()
        .ok_or_else(|| SheetError::Backend("Worksheet was opened for reading".to_string()))
}

fn column_number(col: usize) -> SheetResult<u16> {
    u16::try_from(col).map_err(|_| SheetError::Backend(format!("Column {} out of range", col)))
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().map(Color::RGB)
}

fn header_format(style: &StyleOptions) -> Format {
    let mut format = Format::new();
    if style.header_bold {
        format = format.set_bold();
    }
    if let Some(color) = style.header_background.as_deref().and_then(parse_hex_color) {
        format = format.set_background_color(color);
    }
    if style.borders {
        format = format.set_border(FormatBorder::Thin);
    }
    format
}

fn title_format(style: &StyleOptions) -> Format {
    let mut format = Format::new()
        .set_font_size(style.title_font_size)
        .set_align(FormatAlign::Center);
    if style.title_bold {
        format = format.set_bold();
    }
    format
}

fn body_format(style: &StyleOptions) -> Format {
    if style.borders {
        Format::new().set_border(FormatBorder::Thin)
    } else {
        Format::new()
    }
}

/// calamine cell to [`CellValue`]; date cells become date-times via their serial
fn read_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => crate::coerce::parse_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::String(s.clone())),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(format!("#{:?}", e)),
    }
}

impl SpreadsheetBackend for XlsxBackend {
    type Workbook = XlsxWorkbook;
    type Worksheet = XlsxWorksheet;

    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn open_workbook(&self, bytes: &[u8]) -> SheetResult<XlsxWorkbook> {
        let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| SheetError::Backend(format!("Failed to open Excel file: {}", e)))?;
        Ok(XlsxWorkbook::Reader(Box::new(workbook)))
    }

    fn get_worksheet(
        &self,
        workbook: &mut XlsxWorkbook,
        name: Option<&str>,
    ) -> SheetResult<Option<XlsxWorksheet>> {
        let XlsxWorkbook::Reader(reader) = workbook else {
            return Err(SheetError::Backend(
                "Workbook was created for writing".to_string(),
            ));
        };
        let sheet_names = reader.sheet_names();
        let sheet_name = match name {
            Some(name) => sheet_names.iter().find(|s| s.as_str() == name).cloned(),
            None => sheet_names.first().cloned(),
        };
        let Some(sheet_name) = sheet_name else {
            return Ok(None);
        };
        let range = reader
            .worksheet_range(&sheet_name)
            .map_err(|e| SheetError::Backend(format!("Failed to read '{}': {}", sheet_name, e)))?;
        Ok(Some(XlsxWorksheet::Reader {
            name: sheet_name,
            range,
        }))
    }

    fn worksheet_name(&self, worksheet: &XlsxWorksheet) -> String {
        match worksheet {
            XlsxWorksheet::Reader { name, .. } => name.clone(),
            XlsxWorksheet::Writer(ws) => ws.name(),
        }
    }

    fn sheet_has_data(&self, worksheet: &XlsxWorksheet) -> bool {
        worksheet
            .range()
            .is_some_and(|r| r.used_cells().any(|(_, _, c)| !read_cell(c).is_null()))
    }

    fn estimate_column_count(&self, worksheet: &XlsxWorksheet) -> usize {
        worksheet
            .range()
            .and_then(|r| r.end())
            .map_or(0, |(_, col)| col as usize + 1)
    }

    fn data_start_row(&self, worksheet: &XlsxWorksheet, header_row: Option<usize>) -> usize {
        match header_row {
            Some(h) => h + 1,
            None => worksheet
                .range()
                .and_then(|r| r.start())
                .map_or(0, |(row, _)| row as usize),
        }
    }

    fn data_end_row(&self, worksheet: &XlsxWorksheet) -> usize {
        worksheet
            .range()
            .and_then(|r| r.end())
            .map_or(0, |(row, _)| row as usize + 1)
    }

    fn get_cell(&self, worksheet: &XlsxWorksheet, row: usize, col: usize) -> CellValue {
        let (Ok(row), Ok(col)) = (u32::try_from(row), u32::try_from(col)) else {
            return CellValue::Null;
        };
        worksheet
            .range()
            .and_then(|r| r.get_value((row, col)))
            .map_or(CellValue::Null, read_cell)
    }

    fn create_workbook(&self) -> SheetResult<XlsxWorkbook> {
        Ok(XlsxWorkbook::Writer(Box::new(Workbook::new())))
    }

    fn create_worksheet(&self, workbook: &mut XlsxWorkbook, name: &str) -> SheetResult<XlsxWorksheet> {
        if let XlsxWorkbook::Writer(book) = workbook {
            if book.worksheet_from_name(name).is_ok() {
                return Err(SheetError::Backend(format!(
                    "Worksheet '{}' already exists",
                    name
                )));
            }
        }
        let mut worksheet = Worksheet::new();
        worksheet.set_name(name).map_err(xlsx_error)?;
        Ok(XlsxWorksheet::Writer(Box::new(worksheet)))
    }

    fn write_title(
        &self,
        worksheet: &mut XlsxWorksheet,
        row: u32,
        title: &str,
        column_count: usize,
        options: &ExcelOptions,
    ) -> SheetResult<()> {
        let ws = writer_sheet(worksheet)?;
        let format = title_format(&options.style);
        if column_count > 1 {
            let last_col = column_number(column_count - 1)?;
            ws.merge_range(row, 0, row, last_col, title, &format)
                .map_err(xlsx_error)?;
        } else {
            ws.write_string_with_format(row, 0, title, &format)
                .map_err(xlsx_error)?;
        }
        Ok(())
    }

    fn write_header_row(
        &self,
        worksheet: &mut XlsxWorksheet,
        row: u32,
        headers: &[String],
        options: &ExcelOptions,
    ) -> SheetResult<()> {
        let ws = writer_sheet(worksheet)?;
        let format = header_format(&options.style);
        for (col, header) in headers.iter().enumerate() {
            ws.write_string_with_format(row, column_number(col)?, header, &format)
                .map_err(xlsx_error)?;
        }
        Ok(())
    }

    fn write_data_rows(
        &self,
        worksheet: &mut XlsxWorksheet,
        start_row: u32,
        rows: &[Vec<CellValue>],
        options: &ExcelOptions,
    ) -> SheetResult<()> {
        let ws = writer_sheet(worksheet)?;
        let body = body_format(&options.style);
        let date = body.clone().set_num_format(&options.default_date_format);
        let datetime = body.clone().set_num_format(DATETIME_FORMAT);

        for (offset, cells) in rows.iter().enumerate() {
            let row = start_row + offset as u32;
            for (col, cell) in cells.iter().enumerate() {
                let col = column_number(col)?;
                let written = match cell {
                    CellValue::Null => continue,
                    CellValue::String(s) if s.trim().is_empty() => continue,
                    CellValue::String(s) => ws.write_string_with_format(row, col, s, &body),
                    CellValue::Integer(i) => ws.write_number_with_format(row, col, *i as f64, &body),
                    CellValue::Float(f) => ws.write_number_with_format(row, col, *f, &body),
                    CellValue::Boolean(b) => ws.write_boolean_with_format(row, col, *b, &body),
                    CellValue::DateTime(dt) => {
                        let serial = datetime_to_serial(*dt);
                        let format = if serial.fract() == 0.0 { &date } else { &datetime };
                        ws.write_number_with_format(row, col, serial, format)
                    }
                };
                written.map_err(xlsx_error)?;
            }
        }
        Ok(())
    }

    fn finish_worksheet(
        &self,
        worksheet: &mut XlsxWorksheet,
        _layout: &SheetLayout,
        options: &ExcelOptions,
    ) -> SheetResult<()> {
        let ws = writer_sheet(worksheet)?;
        if options.auto_fit_columns {
            ws.autofit();
        }
        Ok(())
    }

    fn attach_worksheet(&self, workbook: &mut XlsxWorkbook, worksheet: XlsxWorksheet) -> SheetResult<()> {
        match (workbook, worksheet) {
            (XlsxWorkbook::Writer(book), XlsxWorksheet::Writer(ws)) => {
                book.push_worksheet(*ws);
                Ok(())
            }
            _ => Err(SheetError::Backend(
                "Cannot attach a worksheet to a workbook opened for reading".to_string(),
            )),
        }
    }

    fn save_to_stream(&self, workbook: &mut XlsxWorkbook) -> SheetResult<Vec<u8>> {
        match workbook {
            XlsxWorkbook::Writer(book) => book
                .save_to_buffer()
                .map_err(|e| SheetError::Backend(format!("Failed to save Excel file: {}", e))),
            XlsxWorkbook::Reader(_) => Err(SheetError::Backend(
                "Workbook was opened for reading".to_string(),
            )),
        }
    }

    fn close_workbook(&self, workbook: XlsxWorkbook) {
        drop(workbook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_hex_color() {
        assert!(parse_hex_color("#DDEBF7").is_some());
        assert!(parse_hex_color("DDEBF7").is_some());
        assert!(parse_hex_color("#FFF").is_none());
        assert!(parse_hex_color("zzzzzz").is_none());
    }

    #[test]
    fn test_read_cell_kinds() {
        assert_eq!(read_cell(&Data::Empty), CellValue::Null);
        assert_eq!(read_cell(&Data::Int(4)), CellValue::Integer(4));
        assert_eq!(read_cell(&Data::Bool(true)), CellValue::Boolean(true));
        assert_eq!(
            read_cell(&Data::DateTimeIso("2025-01-02".to_string())),
            CellValue::DateTime(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_duplicate_sheet_name_rejected() {
        let backend = XlsxBackend;
        let mut book = backend.create_workbook().unwrap();
        let ws = backend.create_worksheet(&mut book, "Data").unwrap();
        backend.attach_worksheet(&mut book, ws).unwrap();
        assert!(backend.create_worksheet(&mut book, "Data").is_err());
    }

    #[test]
    fn test_invalid_sheet_name_rejected() {
        let backend = XlsxBackend;
        let mut book = backend.create_workbook().unwrap();
        assert!(backend.create_worksheet(&mut book, "bad/name").is_err());
    }

    #[test]
    fn test_garbage_bytes_fail_to_open() {
        assert!(XlsxBackend.open_workbook(b"definitely not a zip").is_err());
    }
}
