//! Import and export pipelines shared by every backend
//!
//! Import: bytes → workbook → worksheet → header mapping → row scan → data.
//! Export: columns → workbook/worksheet → title → header → body rows →
//! hooks → post formatting → bytes.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::backend::{SheetLayout, SpreadsheetBackend};
use crate::coerce;
use crate::config::{ExcelOptions, ImportOptions};
use crate::error::{CoercionError, ExportStage, SheetError, SheetResult};
use crate::mapping::{mapping_for, RecordMapping};
use crate::perf::{convert_rows, PerformanceMonitor};
use crate::record::{FieldDef, Record};
use crate::tabular::{TabularColumn, TabularData};
use crate::value::{CellKind, CellValue};

/// Callback run against the backend's worksheet after the body is written
pub type WorksheetHook<'h, W> = Box<dyn FnMut(&mut W, &SheetLayout) -> SheetResult<()> + 'h>;

/// Optional export customization, run in order: `customize`, then `style`
pub struct ExportHooks<'h, W> {
    customize: Option<WorksheetHook<'h, W>>,
    style: Option<WorksheetHook<'h, W>>,
}

impl<'h, W> Default for ExportHooks<'h, W> {
    fn default() -> Self {
        Self {
            customize: None,
            style: None,
        }
    }
}

impl<'h, W> ExportHooks<'h, W> {
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn customize(
        mut self,
        hook: impl FnMut(&mut W, &SheetLayout) -> SheetResult<()> + 'h,
    ) -> Self {
        self.customize = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn style(mut self, hook: impl FnMut(&mut W, &SheetLayout) -> SheetResult<()> + 'h) -> Self {
        self.style = Some(Box::new(hook));
        self
    }
}

/// What an import did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub sheet_name: String,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub cells_skipped: usize,
}

/// What an export did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub rows_written: usize,
    pub columns: usize,
    pub cells_skipped: usize,
    pub parallel: bool,
    pub batches: usize,
}

/// Cells converted for one row plus the number of cells skipped
type ConvertedRow = (Vec<CellValue>, usize);

/// Import/export service over one spreadsheet backend
pub struct ExcelService<B: SpreadsheetBackend> {
    backend: B,
    options: ExcelOptions,
    monitor: PerformanceMonitor,
}

impl<B: SpreadsheetBackend + Default> Default for ExcelService<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: SpreadsheetBackend> ExcelService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, ExcelOptions::default())
    }

    pub fn with_options(backend: B, options: ExcelOptions) -> Self {
        let monitor = PerformanceMonitor::from_options(&options);
        Self {
            backend,
            options,
            monitor,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &ExcelOptions {
        &self.options
    }

    //==========================================================================
    // Import
    //==========================================================================

    /// Read a worksheet into tabular data.
    ///
    /// Returns `None` for empty or unreadable input, a missing or blank
    /// worksheet, or any backend failure; the cause is logged.
    pub fn import_bytes(&self, bytes: &[u8], options: &ImportOptions) -> Option<TabularData> {
        self.import_bytes_with_report(bytes, options)
            .map(|(data, _)| data)
    }

    pub fn import_bytes_with_report(
        &self,
        bytes: &[u8],
        options: &ImportOptions,
    ) -> Option<(TabularData, ImportReport)> {
        let result = self
            .monitor
            .measure("import", || self.try_import(bytes, options));
        match result {
            Ok(imported) => imported,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "import failed");
                None
            }
        }
    }

    pub fn import_reader<R: Read>(&self, mut reader: R, options: &ImportOptions) -> Option<TabularData> {
        let mut bytes = Vec::new();
        if let Err(e) = reader.read_to_end(&mut bytes) {
            warn!(error = %e, "failed to read import stream");
            return None;
        }
        self.import_bytes(&bytes, options)
    }

    pub fn import_file(&self, path: impl AsRef<Path>, options: &ImportOptions) -> Option<TabularData> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => self.import_bytes(&bytes, options),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read import file");
                None
            }
        }
    }

    /// Read a worksheet into typed records.
    ///
    /// Headers bind to fields by display name, then by field name. Absent
    /// input yields an empty list; in strict mode a bad cell fails the call.
    pub fn import_records<T: Record + Default>(
        &self,
        bytes: &[u8],
        options: &ImportOptions,
    ) -> SheetResult<Vec<T>> {
        if bytes.is_empty() {
            warn!("empty import stream");
            return Ok(Vec::new());
        }
        let mut workbook = match self.backend.open_workbook(bytes) {
            Ok(workbook) => workbook,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "import failed");
                return Ok(Vec::new());
            }
        };
        let result = self
            .monitor
            .measure("import_records", || self.read_records::<T>(&mut workbook, options));
        self.backend.close_workbook(workbook);
        result
    }

    pub fn import_records_file<T: Record + Default>(
        &self,
        path: impl AsRef<Path>,
        options: &ImportOptions,
    ) -> SheetResult<Vec<T>> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => self.import_records(&bytes, options),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read import file");
                Ok(Vec::new())
            }
        }
    }

    fn try_import(
        &self,
        bytes: &[u8],
        options: &ImportOptions,
    ) -> SheetResult<Option<(TabularData, ImportReport)>> {
        if bytes.is_empty() {
            warn!("empty import stream");
            return Ok(None);
        }
        let mut workbook = self.backend.open_workbook(bytes)?;
        let result = self.read_tabular(&mut workbook, options);
        self.backend.close_workbook(workbook);
        result
    }

    fn select_sheet(
        &self,
        workbook: &mut B::Workbook,
        options: &ImportOptions,
    ) -> SheetResult<Option<B::Worksheet>> {
        let requested = options.sheet_name.as_deref();
        match self.backend.get_worksheet(workbook, requested)? {
            None => {
                warn!(sheet = requested.unwrap_or("<first>"), "worksheet not found");
                Ok(None)
            }
            Some(sheet) if !self.backend.sheet_has_data(&sheet) => {
                warn!(sheet = %self.backend.worksheet_name(&sheet), "worksheet has no data");
                Ok(None)
            }
            Some(sheet) => Ok(Some(sheet)),
        }
    }

    fn read_headers(&self, sheet: &B::Worksheet, header_row: Option<usize>) -> Vec<String> {
        let width = self.backend.estimate_column_count(sheet);
        normalize_headers((0..width).map(|col| match header_row {
            Some(row) => self.backend.get_cell(sheet, row, col).to_text().trim().to_string(),
            None => String::new(),
        }))
    }

    /// Bounded row scan; rows without any value are dropped unless kept
    fn scan_rows(
        &self,
        sheet: &B::Worksheet,
        width: usize,
        options: &ImportOptions,
    ) -> (Vec<Vec<CellValue>>, ImportReport) {
        let start = self.backend.data_start_row(sheet, options.header_row);
        let end = self.backend.data_end_row(sheet);
        let mut rows = Vec::with_capacity(end.saturating_sub(start));
        let mut report = ImportReport {
            sheet_name: self.backend.worksheet_name(sheet),
            ..Default::default()
        };

        for row in start..end {
            let mut values = vec![CellValue::Null; width];
            let mut has_value = false;
            for (col, slot) in values.iter_mut().enumerate() {
                let cell = self.backend.get_cell(sheet, row, col).normalized();
                if !cell.is_null() {
                    *slot = cell;
                    has_value = true;
                }
            }
            if has_value || options.keep_empty_rows {
                rows.push(values);
                report.rows_read += 1;
            } else {
                report.rows_dropped += 1;
            }
        }

        debug!(
            sheet = %report.sheet_name,
            rows = report.rows_read,
            dropped = report.rows_dropped,
            "scanned worksheet"
        );
        (rows, report)
    }

    fn read_tabular(
        &self,
        workbook: &mut B::Workbook,
        options: &ImportOptions,
    ) -> SheetResult<Option<(TabularData, ImportReport)>> {
        let Some(sheet) = self.select_sheet(workbook, options)? else {
            return Ok(None);
        };
        let headers = self.read_headers(&sheet, options.header_row);
        let (mut rows, mut report) = self.scan_rows(&sheet, headers.len(), options);

        let kinds: Vec<CellKind> = if options.infer_types {
            (0..headers.len())
                .map(|col| coerce::infer_kind(rows.iter().map(|r| &r[col])))
                .collect()
        } else {
            vec![CellKind::Text; headers.len()]
        };

        if options.infer_types {
            for (row_idx, row) in rows.iter_mut().enumerate() {
                for (col, cell) in row.iter_mut().enumerate() {
                    if cell.is_null() {
                        continue;
                    }
                    match coerce::coerce_cell(cell, kinds[col]) {
                        Ok(value) => *cell = value,
                        Err(e) => {
                            self.tolerate(e, row_idx, &headers[col])?;
                            *cell = CellValue::Null;
                            report.cells_skipped += 1;
                        }
                    }
                }
            }
        }

        let columns = headers
            .into_iter()
            .zip(kinds)
            .map(|(name, kind)| TabularColumn::new(name, kind))
            .collect();
        let data = TabularData::from_parts(report.sheet_name.clone(), columns, rows);
        Ok(Some((data, report)))
    }

    fn read_records<T: Record + Default>(
        &self,
        workbook: &mut B::Workbook,
        options: &ImportOptions,
    ) -> SheetResult<Vec<T>> {
        let sheet = match self.select_sheet(workbook, options) {
            Ok(Some(sheet)) => sheet,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "import failed");
                return Ok(Vec::new());
            }
        };
        let headers = self.read_headers(&sheet, options.header_row);
        let (rows, report) = self.scan_rows(&sheet, headers.len(), options);
        let mapping = mapping_for::<T>();
        let bound = mapping.bind_headers(&headers);
        if bound.iter().all(Option::is_none) {
            warn!(
                sheet = %report.sheet_name,
                record = mapping.type_name,
                "no worksheet header matches a record field"
            );
        }

        let converted = convert_rows(
            &rows,
            self.options.parallel_processing_threshold,
            |idx, row| self.record_from_row::<T>(row, &bound, &headers, idx),
        )?;
        let skipped: usize = converted.iter().map(|(_, s)| s).sum();
        if skipped > 0 {
            debug!(sheet = %report.sheet_name, skipped, "cells skipped during record import");
        }
        Ok(converted.into_iter().map(|(record, _)| record).collect())
    }

    fn record_from_row<T: Record + Default>(
        &self,
        row: &[CellValue],
        bound: &[Option<&FieldDef>],
        headers: &[String],
        row_idx: usize,
    ) -> SheetResult<(T, usize)> {
        let mut record = T::default();
        let mut skipped = 0;
        for (col, cell) in row.iter().enumerate() {
            let Some(field) = bound.get(col).copied().flatten() else {
                continue;
            };
            // Null cells leave the field at its default.
            if cell.is_null() {
                continue;
            }
            let outcome = coerce::to_field(cell, &field.field_type)
                .and_then(|value| record.set(field.name, value));
            if let Err(e) = outcome {
                self.tolerate(e, row_idx, &headers[col])?;
                skipped += 1;
            }
        }
        Ok((record, skipped))
    }

    /// Log and swallow a cell failure, or fail the call in strict mode
    fn tolerate(&self, error: CoercionError, row: usize, column: &str) -> SheetResult<()> {
        if self.options.continue_on_error {
            warn!(row, column, error = %error, "skipping cell that failed coercion");
            Ok(())
        } else {
            Err(SheetError::Coercion(error))
        }
    }

    //==========================================================================
    // Export
    //==========================================================================

    /// Write records to a new workbook and return its bytes.
    pub fn export_records<T: Record>(
        &self,
        records: &[T],
        sheet_name: &str,
        title: &str,
        hooks: ExportHooks<'_, B::Worksheet>,
    ) -> SheetResult<Vec<u8>> {
        self.export_records_with_report(records, sheet_name, title, hooks)
            .map(|(bytes, _)| bytes)
    }

    pub fn export_records_with_report<T: Record>(
        &self,
        records: &[T],
        sheet_name: &str,
        title: &str,
        hooks: ExportHooks<'_, B::Worksheet>,
    ) -> SheetResult<(Vec<u8>, ExportReport)> {
        validate_sheet_name(sheet_name)?;
        self.monitor.measure("export_records", || {
            let mapping = mapping_for::<T>();
            let headers = mapping.export_headers();
            let converted = convert_rows(
                records,
                self.options.parallel_processing_threshold,
                |idx, record| self.row_from_record(record, &mapping, idx),
            )
            .map_err(|e| e.at_stage(ExportStage::Mapping))?;
            self.write_workbook(sheet_name, title, &headers, converted, hooks)
        })
    }

    /// Write tabular data to a new workbook and return its bytes.
    pub fn export_tabular(
        &self,
        data: &TabularData,
        sheet_name: &str,
        title: &str,
        hooks: ExportHooks<'_, B::Worksheet>,
    ) -> SheetResult<Vec<u8>> {
        self.export_tabular_with_report(data, sheet_name, title, hooks)
            .map(|(bytes, _)| bytes)
    }

    pub fn export_tabular_with_report(
        &self,
        data: &TabularData,
        sheet_name: &str,
        title: &str,
        hooks: ExportHooks<'_, B::Worksheet>,
    ) -> SheetResult<(Vec<u8>, ExportReport)> {
        validate_sheet_name(sheet_name)?;
        data.validate()?;
        self.monitor.measure("export_tabular", || {
            let headers = data.column_names();
            let converted = convert_rows(
                data.rows(),
                self.options.parallel_processing_threshold,
                |idx, row| self.row_from_cells(row, data.columns(), idx),
            )
            .map_err(|e| e.at_stage(ExportStage::Mapping))?;
            self.write_workbook(sheet_name, title, &headers, converted, hooks)
        })
    }

    pub fn export_records_to_file<T: Record>(
        &self,
        records: &[T],
        path: impl AsRef<Path>,
        sheet_name: &str,
        title: &str,
    ) -> SheetResult<PathBuf> {
        let path = validate_output_path(path.as_ref())?;
        let bytes = self.export_records(records, sheet_name, title, ExportHooks::none())?;
        write_output(&path, &bytes)?;
        Ok(path)
    }

    pub fn export_tabular_to_file(
        &self,
        data: &TabularData,
        path: impl AsRef<Path>,
        sheet_name: &str,
        title: &str,
    ) -> SheetResult<PathBuf> {
        let path = validate_output_path(path.as_ref())?;
        let bytes = self.export_tabular(data, sheet_name, title, ExportHooks::none())?;
        write_output(&path, &bytes)?;
        Ok(path)
    }

    fn row_from_record<T: Record>(
        &self,
        record: &T,
        mapping: &RecordMapping,
        row_idx: usize,
    ) -> SheetResult<ConvertedRow> {
        let mut skipped = 0;
        let mut cells = Vec::with_capacity(mapping.export_columns.len());
        for column in &mapping.export_columns {
            match record.get(column.field_name) {
                Some(value) => cells.push(coerce::to_cell(&value)),
                None => {
                    let error = CoercionError::UnknownField(column.field_name.to_string());
                    self.tolerate(error, row_idx, &column.display_name)?;
                    cells.push(CellValue::Null);
                    skipped += 1;
                }
            }
        }
        Ok((cells, skipped))
    }

    fn row_from_cells(
        &self,
        row: &[CellValue],
        columns: &[TabularColumn],
        row_idx: usize,
    ) -> SheetResult<ConvertedRow> {
        let mut skipped = 0;
        let mut cells = Vec::with_capacity(columns.len());
        for (cell, column) in row.iter().zip(columns) {
            if cell.is_null() {
                cells.push(CellValue::Null);
                continue;
            }
            match coerce::coerce_cell(cell, column.kind) {
                Ok(value) => cells.push(value),
                Err(e) => {
                    self.tolerate(e, row_idx, &column.name)?;
                    cells.push(CellValue::Null);
                    skipped += 1;
                }
            }
        }
        Ok((cells, skipped))
    }

    fn write_workbook(
        &self,
        sheet_name: &str,
        title: &str,
        headers: &[String],
        converted: Vec<ConvertedRow>,
        hooks: ExportHooks<'_, B::Worksheet>,
    ) -> SheetResult<(Vec<u8>, ExportReport)> {
        let mut report = ExportReport {
            rows_written: converted.len(),
            columns: headers.len(),
            parallel: converted.len() > self.options.parallel_processing_threshold,
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(converted.len());
        for (cells, skipped) in converted {
            report.cells_skipped += skipped;
            rows.push(cells);
        }

        let mut workbook = self
            .backend
            .create_workbook()
            .map_err(|e| e.at_stage(ExportStage::Layout))?;
        let outcome = self.fill_workbook(&mut workbook, sheet_name, title, headers, &rows, hooks);
        self.backend.close_workbook(workbook);
        let (bytes, batches) = outcome?;
        report.batches = batches;

        debug!(
            backend = self.backend.name(),
            sheet = sheet_name,
            rows = report.rows_written,
            columns = report.columns,
            bytes = bytes.len(),
            "exported worksheet"
        );
        Ok((bytes, report))
    }

    fn fill_workbook(
        &self,
        workbook: &mut B::Workbook,
        sheet_name: &str,
        title: &str,
        headers: &[String],
        rows: &[Vec<CellValue>],
        mut hooks: ExportHooks<'_, B::Worksheet>,
    ) -> SheetResult<(Vec<u8>, usize)> {
        let backend = &self.backend;
        let options = &self.options;
        let layout_err = |e: SheetError| e.at_stage(ExportStage::Layout);

        let mut sheet = backend
            .create_worksheet(workbook, sheet_name)
            .map_err(layout_err)?;

        let mut header_row = 0;
        let mut title_row = None;
        if !title.is_empty() {
            backend
                .write_title(&mut sheet, 0, title, headers.len(), options)
                .map_err(layout_err)?;
            title_row = Some(0);
            header_row = 1;
        }
        backend
            .write_header_row(&mut sheet, header_row, headers, options)
            .map_err(layout_err)?;

        let layout = SheetLayout {
            title_row,
            header_row,
            first_data_row: header_row + 1,
            row_count: rows.len(),
            column_count: headers.len(),
        };

        let batches = self
            .write_body(&mut sheet, layout.first_data_row, rows)
            .map_err(|e| e.at_stage(ExportStage::Write))?;

        for hook in [hooks.customize.as_mut(), hooks.style.as_mut()]
            .into_iter()
            .flatten()
        {
            hook(&mut sheet, &layout).map_err(|e| e.at_stage(ExportStage::Hook))?;
        }

        backend
            .finish_worksheet(&mut sheet, &layout, options)
            .map_err(layout_err)?;
        backend
            .attach_worksheet(workbook, sheet)
            .map_err(|e| e.at_stage(ExportStage::Save))?;
        let bytes = self
            .monitor
            .measure("save", || backend.save_to_stream(workbook))
            .map_err(|e| e.at_stage(ExportStage::Save))?;
        Ok((bytes, batches))
    }

    /// Hand body rows to the backend, in `batch_size` chunks when batching is on
    fn write_body(
        &self,
        sheet: &mut B::Worksheet,
        first_row: u32,
        rows: &[Vec<CellValue>],
    ) -> SheetResult<usize> {
        if !self.options.enable_batch_write {
            self.backend
                .write_data_rows(sheet, first_row, rows, &self.options)?;
            return Ok(1);
        }
        let batch_size = self.options.batch_size.max(1);
        let mut batches = 0;
        for (idx, chunk) in rows.chunks(batch_size).enumerate() {
            let start = first_row + (idx * batch_size) as u32;
            self.backend
                .write_data_rows(sheet, start, chunk, &self.options)?;
            batches += 1;
        }
        Ok(batches)
    }
}

/// Trim headers; blanks become `Column {n}` and repeats get `_2`, `_3`, ...
pub(crate) fn normalize_headers(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for (idx, name) in raw.into_iter().enumerate() {
        let name = name.trim();
        let base = if name.is_empty() {
            format!("Column {}", idx + 1)
        } else {
            name.to_string()
        };
        let mut candidate = base.clone();
        let mut suffix = 2;
        while headers.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        headers.push(candidate);
    }
    headers
}

fn validate_sheet_name(sheet_name: &str) -> SheetResult<()> {
    if sheet_name.trim().is_empty() {
        return Err(SheetError::Validation(
            "Sheet name must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_output_path(path: &Path) -> SheetResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(SheetError::Validation(
            "Output path is required".to_string(),
        ));
    }
    Ok(path.to_path_buf())
}

fn write_output(path: &Path, bytes: &[u8]) -> SheetResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
