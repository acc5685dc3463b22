//! Export pipeline tests: layout, null policy, hooks, batching, failures

use pretty_assertions::assert_eq;
use sheetforge::backend::{MemorySheet, MemoryWorkbook};
use sheetforge::value::{FieldKind, FieldType, FieldValue};
use sheetforge::{
    impl_record, CellKind, CellValue, CoercionError, ExcelOptions, ExcelService, ExportHooks,
    ExportStage, FieldDef, MemoryBackend, Record, SheetError, TabularData, XlsxBackend,
};
use std::cell::RefCell;
use tempfile::TempDir;

#[derive(Default)]
struct Product {
    sku: String,
    price: f64,
    note: Option<String>,
}

impl_record!(Product {
    sku: String => column(display = "SKU", order = 0),
    price: f64 => column(display = "Price", order = 1),
    note: Option<String> => column(display = "Note", order = 2),
});

fn product(sku: &str, price: f64, note: Option<&str>) -> Product {
    Product {
        sku: sku.to_string(),
        price,
        note: note.map(str::to_string),
    }
}

/// Declares a column it cannot produce
#[derive(Default)]
struct Broken {
    id: i64,
}

impl Record for Broken {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("id", FieldType::required(FieldKind::Integer)),
            FieldDef::new("ghost", FieldType::nullable(FieldKind::Text)),
        ]
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        (field == "id").then_some(FieldValue::Integer(self.id))
    }

    fn set(&mut self, field: &str, _value: FieldValue) -> Result<(), CoercionError> {
        Err(CoercionError::UnknownField(field.to_string()))
    }
}

fn sheet_of(bytes: &[u8], name: &str) -> MemorySheet {
    MemoryWorkbook::from_bytes(bytes)
        .unwrap()
        .sheet(name)
        .cloned()
        .unwrap()
}

fn strings(items: &[&str]) -> Vec<CellValue> {
    items.iter().map(|s| CellValue::from(*s)).collect()
}

fn memory_service() -> ExcelService<MemoryBackend> {
    ExcelService::new(MemoryBackend)
}

// ═══════════════════════════════════════════════════════════════════════════
// LAYOUT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_header_and_rows_in_order() {
    let products = vec![product("A-1", 9.5, Some("new")), product("B-2", 3.0, None)];
    let bytes = memory_service()
        .export_records(&products, "Products", "", ExportHooks::none())
        .unwrap();
    let sheet = sheet_of(&bytes, "Products");

    assert_eq!(sheet.rows[0], strings(&["SKU", "Price", "Note"]));
    assert_eq!(sheet.cell(1, 0), &CellValue::from("A-1"));
    assert_eq!(sheet.cell(1, 1), &CellValue::Float(9.5));
    assert_eq!(sheet.cell(1, 2), &CellValue::from("new"));
    assert_eq!(sheet.cell(2, 0), &CellValue::from("B-2"));
    assert!(sheet.merges.is_empty());
    assert!(sheet.autofit);
}

#[test]
fn test_null_field_is_empty_cell() {
    let bytes = memory_service()
        .export_records(&[product("C-3", 1.0, None)], "P", "", ExportHooks::none())
        .unwrap();
    let sheet = sheet_of(&bytes, "P");
    assert_eq!(sheet.cell(1, 2), &CellValue::Null);
    assert!(!sheet.rows.iter().flatten().any(|c| c.to_text() == "null"));
}

#[test]
fn test_title_shifts_header_down() {
    let bytes = memory_service()
        .export_records(&[product("A", 1.0, None)], "P", "Price List", ExportHooks::none())
        .unwrap();
    let sheet = sheet_of(&bytes, "P");

    assert_eq!(sheet.cell(0, 0), &CellValue::from("Price List"));
    assert_eq!(sheet.merges, vec!["A1:C1".to_string()]);
    assert_eq!(sheet.rows[1], strings(&["SKU", "Price", "Note"]));
    assert_eq!(sheet.cell(2, 0), &CellValue::from("A"));
}

#[test]
fn test_empty_list_writes_header_only() {
    let (bytes, report) = memory_service()
        .export_records_with_report::<Product>(&[], "P", "", ExportHooks::none())
        .unwrap();
    let sheet = sheet_of(&bytes, "P");
    assert_eq!(sheet.rows.len(), 1);
    assert_eq!(report.rows_written, 0);
    assert_eq!(report.columns, 3);
}

#[test]
fn test_autofit_follows_options() {
    let mut options = ExcelOptions::default();
    options.auto_fit_columns = false;
    let bytes = ExcelService::with_options(MemoryBackend, options)
        .export_records(&[product("A", 1.0, None)], "P", "", ExportHooks::none())
        .unwrap();
    assert!(!sheet_of(&bytes, "P").autofit);
}

// ═══════════════════════════════════════════════════════════════════════════
// BATCHING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_batched_writes_keep_row_positions() {
    let products: Vec<_> = (0..5).map(|i| product(&format!("S{i}"), i as f64, None)).collect();
    let service =
        ExcelService::with_options(MemoryBackend, ExcelOptions::default().with_batch_size(2));
    let (bytes, report) = service
        .export_records_with_report(&products, "P", "T", ExportHooks::none())
        .unwrap();
    assert_eq!(report.batches, 3);
    assert_eq!(report.rows_written, 5);

    let sheet = sheet_of(&bytes, "P");
    for i in 0..5 {
        assert_eq!(sheet.cell(2 + i, 0), &CellValue::from(format!("S{i}").as_str()));
    }
}

#[test]
fn test_unbatched_write_is_single_call() {
    let mut options = ExcelOptions::default().with_batch_size(1);
    options.enable_batch_write = false;
    let products: Vec<_> = (0..4).map(|i| product("S", i as f64, None)).collect();
    let (_, report) = ExcelService::with_options(MemoryBackend, options)
        .export_records_with_report(&products, "P", "", ExportHooks::none())
        .unwrap();
    assert_eq!(report.batches, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// HOOKS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_hooks_run_in_order_with_layout() {
    let calls = RefCell::new(Vec::new());
    let hooks = ExportHooks::none()
        .customize(|sheet: &mut MemorySheet, layout| {
            calls.borrow_mut().push("customize");
            sheet.set_cell(layout.last_row() as usize + 1, 0, CellValue::from("Total"));
            Ok(())
        })
        .style(|_sheet: &mut MemorySheet, layout| {
            calls.borrow_mut().push("style");
            assert_eq!(layout.title_row, Some(0));
            assert_eq!(layout.header_row, 1);
            assert_eq!(layout.first_data_row, 2);
            assert_eq!(layout.row_count, 2);
            assert_eq!(layout.column_count, 3);
            Ok(())
        });

    let products = vec![product("A", 1.0, None), product("B", 2.0, None)];
    let bytes = memory_service()
        .export_records(&products, "P", "Title", hooks)
        .unwrap();

    assert_eq!(*calls.borrow(), vec!["customize", "style"]);
    assert_eq!(sheet_of(&bytes, "P").cell(4, 0), &CellValue::from("Total"));
}

#[test]
fn test_failing_hook_reports_hook_stage() {
    let hooks = ExportHooks::none().style(|_: &mut MemorySheet, _| {
        Err(SheetError::Validation("bad style".to_string()))
    });
    let err = memory_service()
        .export_records(&[product("A", 1.0, None)], "P", "", hooks)
        .unwrap_err();
    assert_eq!(err.stage(), Some(ExportStage::Hook));
    assert!(err.to_string().contains("bad style"));
}

// ═══════════════════════════════════════════════════════════════════════════
// FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_empty_sheet_name_rejected_up_front() {
    let err = memory_service()
        .export_records(&[product("A", 1.0, None)], "  ", "", ExportHooks::none())
        .unwrap_err();
    assert!(matches!(err, SheetError::Validation(_)));
}

#[test]
fn test_missing_field_skipped_when_tolerant() {
    let (bytes, report) = memory_service()
        .export_records_with_report(&[Broken { id: 7 }], "B", "", ExportHooks::none())
        .unwrap();
    assert_eq!(report.cells_skipped, 1);
    let sheet = sheet_of(&bytes, "B");
    assert_eq!(sheet.cell(1, 0), &CellValue::Integer(7));
    assert_eq!(sheet.cell(1, 1), &CellValue::Null);
}

#[test]
fn test_missing_field_fails_mapping_stage_when_strict() {
    let service = ExcelService::with_options(
        MemoryBackend,
        ExcelOptions::default().with_continue_on_error(false),
    );
    let err = service
        .export_records(&[Broken { id: 7 }], "B", "", ExportHooks::none())
        .unwrap_err();
    assert_eq!(err.stage(), Some(ExportStage::Mapping));
}

#[test]
fn test_xlsx_invalid_sheet_name_is_layout_failure() {
    let err = ExcelService::new(XlsxBackend)
        .export_records(&[product("A", 1.0, None)], "bad[name]", "", ExportHooks::none())
        .unwrap_err();
    assert_eq!(err.stage(), Some(ExportStage::Layout));
}

// ═══════════════════════════════════════════════════════════════════════════
// TABULAR EXPORT
// ═══════════════════════════════════════════════════════════════════════════

fn inventory() -> TabularData {
    let mut data = TabularData::new("inventory")
        .with_column("Item", CellKind::Text)
        .unwrap()
        .with_column("Qty", CellKind::Integer)
        .unwrap();
    data.add_row(vec![CellValue::from("bolt"), CellValue::from("12")])
        .unwrap();
    data.add_row(vec![CellValue::from("nut"), CellValue::from("lots")])
        .unwrap();
    data
}

#[test]
fn test_tabular_cells_coerced_to_column_kind() {
    let (bytes, report) = memory_service()
        .export_tabular_with_report(&inventory(), "Inv", "", ExportHooks::none())
        .unwrap();
    let sheet = sheet_of(&bytes, "Inv");
    assert_eq!(sheet.rows[0], strings(&["Item", "Qty"]));
    assert_eq!(sheet.cell(1, 1), &CellValue::Integer(12));
    assert_eq!(sheet.cell(2, 1), &CellValue::Null);
    assert_eq!(report.cells_skipped, 1);
}

#[test]
fn test_tabular_bad_cell_fails_when_strict() {
    let service = ExcelService::with_options(
        MemoryBackend,
        ExcelOptions::default().with_continue_on_error(false),
    );
    let err = service
        .export_tabular(&inventory(), "Inv", "", ExportHooks::none())
        .unwrap_err();
    assert_eq!(err.stage(), Some(ExportStage::Mapping));
}

#[test]
fn test_ragged_tabular_rejected() {
    let data: TabularData = serde_json::from_str(
        r#"{"name":"t","columns":[{"name":"A","kind":"Text"},{"name":"B","kind":"Text"}],"rows":[[{"String":"x"}]]}"#,
    )
    .unwrap();
    let err = memory_service()
        .export_tabular(&data, "T", "", ExportHooks::none())
        .unwrap_err();
    assert!(matches!(err, SheetError::Validation(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// FILE OUTPUT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_export_to_file_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/out/products.xlsx");
    let written = ExcelService::new(XlsxBackend)
        .export_records_to_file(&[product("A", 1.0, None)], &path, "Products", "Catalog")
        .unwrap();
    assert_eq!(written, path);
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn test_export_to_empty_path_rejected() {
    let err = memory_service()
        .export_tabular_to_file(&inventory(), "", "Inv", "")
        .unwrap_err();
    assert!(matches!(err, SheetError::Validation(_)));
}
