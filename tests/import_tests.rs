//! Import pipeline tests: tabular and typed record import

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use sheetforge::backend::{MemorySheet, MemoryWorkbook};
use sheetforge::{
    impl_record, CellKind, CellValue, ExcelOptions, ExcelService, ImportOptions, MemoryBackend,
    SheetError, XlsxBackend,
};
use tempfile::TempDir;

#[derive(Debug, Default, PartialEq)]
struct Person {
    name: String,
    age: i32,
    active: bool,
    joined: Option<NaiveDate>,
}

impl_record!(Person {
    name: String => column(display = "Name", order = 0),
    age: i32 => column(display = "Age", order = 1),
    active: bool => column(display = "Active", order = 2),
    joined: Option<NaiveDate> => column(display = "Joined"),
});

fn text(s: &str) -> CellValue {
    CellValue::from(s)
}

fn grid(name: &str, rows: &[&[&str]]) -> Vec<u8> {
    let rows = rows
        .iter()
        .map(|r| r.iter().map(|c| text(c)).collect())
        .collect();
    MemoryWorkbook::new()
        .with_sheet(MemorySheet::from_rows(name, rows))
        .to_bytes()
        .unwrap()
}

fn scenario_bytes() -> Vec<u8> {
    grid(
        "Sheet1",
        &[
            &["Name", "Age", "Active"],
            &["Ann", "30", "true"],
            &["", "", " "],
        ],
    )
}

fn memory_service() -> ExcelService<MemoryBackend> {
    ExcelService::new(MemoryBackend)
}

// ═══════════════════════════════════════════════════════════════════════════
// TABULAR IMPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_scenario_drops_blank_row_and_infers_types() {
    let data = memory_service()
        .import_bytes(&scenario_bytes(), &ImportOptions::default())
        .unwrap();

    assert_eq!(data.name, "Sheet1");
    assert_eq!(data.column_names(), vec!["Name", "Age", "Active"]);
    assert_eq!(data.row_count(), 1);
    assert_eq!(data.get(0, "Name"), Some(&text("Ann")));
    assert_eq!(data.get(0, "Age"), Some(&CellValue::Integer(30)));
    assert_eq!(data.get(0, "Active"), Some(&CellValue::Boolean(true)));

    let kinds: Vec<_> = data.columns().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![CellKind::Text, CellKind::Integer, CellKind::Boolean]);
}

#[test]
fn test_large_integral_floats_stay_float() {
    let bytes = MemoryWorkbook::new()
        .with_sheet(MemorySheet::from_rows(
            "Sheet1",
            vec![
                vec![text("X")],
                vec![CellValue::Float(1e20)],
                vec![CellValue::Float(2.0)],
            ],
        ))
        .to_bytes()
        .unwrap();
    let data = memory_service()
        .import_bytes(&bytes, &ImportOptions::default())
        .unwrap();

    assert_eq!(data.columns()[0].kind, CellKind::Float);
    assert_eq!(data.get(0, "X"), Some(&CellValue::Float(1e20)));
    assert_eq!(data.get(1, "X"), Some(&CellValue::Float(2.0)));
}

#[test]
fn test_nan_and_inf_names_stay_text() {
    let bytes = grid("Sheet1", &[&["First"], &["Nan"], &["Inf"]]);
    let data = memory_service()
        .import_bytes(&bytes, &ImportOptions::default())
        .unwrap();

    assert_eq!(data.columns()[0].kind, CellKind::Text);
    assert_eq!(data.get(0, "First"), Some(&text("Nan")));
    assert_eq!(data.get(1, "First"), Some(&text("Inf")));
}

#[test]
fn test_keep_empty_rows_retains_all_null_row() {
    let options = ImportOptions::default().keep_empty_rows(true);
    let (data, report) = memory_service()
        .import_bytes_with_report(&scenario_bytes(), &options)
        .unwrap();

    assert_eq!(data.row_count(), 2);
    assert!(data.row(1).unwrap().iter().all(CellValue::is_null));
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.rows_dropped, 0);
}

#[test]
fn test_report_counts_dropped_rows() {
    let (_, report) = memory_service()
        .import_bytes_with_report(&scenario_bytes(), &ImportOptions::default())
        .unwrap();
    assert_eq!(report.sheet_name, "Sheet1");
    assert_eq!(report.rows_read, 1);
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.cells_skipped, 0);
}

#[test]
fn test_without_inference_cells_stay_raw() {
    let options = ImportOptions::default().infer_types(false);
    let data = memory_service()
        .import_bytes(&scenario_bytes(), &options)
        .unwrap();
    assert_eq!(data.get(0, "Age"), Some(&text("30")));
    assert!(data.columns().iter().all(|c| c.kind == CellKind::Text));
}

#[test]
fn test_headers_normalized() {
    let bytes = grid("S", &[&[" Id ", "", "Id"], &["1", "2", "3"]]);
    let data = memory_service()
        .import_bytes(&bytes, &ImportOptions::default())
        .unwrap();
    assert_eq!(data.column_names(), vec!["Id", "Column 2", "Id_2"]);
}

#[test]
fn test_no_header_row_synthesizes_names() {
    let bytes = grid("S", &[&["a", "1"], &["b", "2"]]);
    let options = ImportOptions::default().header_row(None);
    let data = memory_service().import_bytes(&bytes, &options).unwrap();
    assert_eq!(data.column_names(), vec!["Column 1", "Column 2"]);
    assert_eq!(data.row_count(), 2);
    assert_eq!(data.get(1, "Column 2"), Some(&CellValue::Integer(2)));
}

#[test]
fn test_header_row_offset() {
    let bytes = grid("S", &[&["Report"], &["Name", "Qty"], &["x", "4"]]);
    let options = ImportOptions::default().header_row(Some(1));
    let data = memory_service().import_bytes(&bytes, &options).unwrap();
    assert_eq!(data.column_names(), vec!["Name", "Qty"]);
    assert_eq!(data.get(0, "Qty"), Some(&CellValue::Integer(4)));
}

#[test]
fn test_select_sheet_by_name() {
    let bytes = MemoryWorkbook::new()
        .with_sheet(MemorySheet::from_rows("First", vec![vec![text("A")], vec![text("1")]]))
        .with_sheet(MemorySheet::from_rows("Second", vec![vec![text("B")], vec![text("2")]]))
        .to_bytes()
        .unwrap();
    let data = memory_service()
        .import_bytes(&bytes, &ImportOptions::default().sheet("Second"))
        .unwrap();
    assert_eq!(data.name, "Second");
    assert_eq!(data.column_names(), vec!["B"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// INPUT ABSENCE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_absent_input_yields_none() {
    let service = memory_service();
    let options = ImportOptions::default();
    assert!(service.import_bytes(&[], &options).is_none());
    assert!(service.import_bytes(b"{ not a workbook", &options).is_none());
    assert!(service
        .import_bytes(&scenario_bytes(), &ImportOptions::default().sheet("Missing"))
        .is_none());
    assert!(service.import_file("/definitely/not/here.json", &options).is_none());
}

#[test]
fn test_blank_sheet_yields_none() {
    let bytes = grid("Blank", &[&["", " "], &["  ", ""]]);
    assert!(memory_service()
        .import_bytes(&bytes, &ImportOptions::default())
        .is_none());
}

#[test]
fn test_import_reader_and_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.json");
    std::fs::write(&path, scenario_bytes()).unwrap();

    let service = memory_service();
    let from_file = service.import_file(&path, &ImportOptions::default()).unwrap();
    let from_reader = service
        .import_reader(std::fs::File::open(&path).unwrap(), &ImportOptions::default())
        .unwrap();
    assert_eq!(from_file, from_reader);
}

// ═══════════════════════════════════════════════════════════════════════════
// TYPED RECORD IMPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_import_records_binds_headers() {
    let bytes = grid(
        "People",
        &[
            &["age", " NAME ", "Active", "Joined", "Ignored"],
            &["41", "Bo", "no", "2021-06-01", "x"],
            &["", "Cy", "", "", ""],
        ],
    );
    let people: Vec<Person> = memory_service()
        .import_records(&bytes, &ImportOptions::default())
        .unwrap();
    assert_eq!(
        people,
        vec![
            Person {
                name: "Bo".to_string(),
                age: 41,
                active: false,
                joined: NaiveDate::from_ymd_opt(2021, 6, 1),
            },
            Person {
                name: "Cy".to_string(),
                ..Default::default()
            },
        ]
    );
}

#[test]
fn test_keep_empty_rows_gives_default_record() {
    let options = ImportOptions::default().keep_empty_rows(true);
    let people: Vec<Person> = memory_service()
        .import_records(&scenario_bytes(), &options)
        .unwrap();
    assert_eq!(people.len(), 2);
    assert_eq!(people[1], Person::default());
}

#[test]
fn test_bad_cell_skipped_in_tolerant_mode() {
    let bytes = grid("P", &[&["Name", "Age", "Active"], &["Dee", "old", "yes"]]);
    let people: Vec<Person> = memory_service()
        .import_records(&bytes, &ImportOptions::default())
        .unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].name, "Dee");
    assert_eq!(people[0].age, 0);
    assert!(people[0].active);
}

#[test]
fn test_bad_cell_fails_in_strict_mode() {
    let bytes = grid("P", &[&["Name", "Age"], &["Dee", "old"]]);
    let service = ExcelService::with_options(
        MemoryBackend,
        ExcelOptions::default().with_continue_on_error(false),
    );
    let result = service.import_records::<Person>(&bytes, &ImportOptions::default());
    assert!(matches!(result, Err(SheetError::Coercion(_))));
}

#[test]
fn test_import_records_absent_input_is_empty() {
    let people: Vec<Person> = memory_service()
        .import_records(&[], &ImportOptions::default())
        .unwrap();
    assert!(people.is_empty());
}

#[test]
fn test_import_records_in_parallel_keeps_order() {
    let mut rows: Vec<Vec<CellValue>> = vec![vec![text("Name"), text("Age")]];
    rows.extend((0..500).map(|i| vec![text(&format!("p{i}")), CellValue::Integer(i)]));
    let bytes = MemoryWorkbook::new()
        .with_sheet(MemorySheet::from_rows("P", rows))
        .to_bytes()
        .unwrap();
    let service =
        ExcelService::with_options(MemoryBackend, ExcelOptions::default().with_parallel_threshold(1));
    let people: Vec<Person> = service
        .import_records(&bytes, &ImportOptions::default())
        .unwrap();
    assert_eq!(people.len(), 500);
    assert!(people
        .iter()
        .enumerate()
        .all(|(i, p)| p.age == i as i32 && p.name == format!("p{i}")));
}

// ═══════════════════════════════════════════════════════════════════════════
// XLSX BACKEND
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_scenario_from_xlsx() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1").unwrap();
    for (col, header) in ["Name", "Age", "Active"].iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    sheet.write_string(1, 0, "Ann").unwrap();
    sheet.write_string(1, 1, "30").unwrap();
    sheet.write_string(1, 2, "true").unwrap();
    sheet.write_string(2, 2, " ").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let data = ExcelService::new(XlsxBackend)
        .import_bytes(&bytes, &ImportOptions::default())
        .unwrap();
    assert_eq!(data.name, "Sheet1");
    assert_eq!(data.row_count(), 1);
    assert_eq!(data.get(0, "Age"), Some(&CellValue::Integer(30)));
    assert_eq!(data.get(0, "Active"), Some(&CellValue::Boolean(true)));
}

#[test]
fn test_xlsx_garbage_yields_none() {
    assert!(ExcelService::new(XlsxBackend)
        .import_bytes(b"PK not really a zip", &ImportOptions::default())
        .is_none());
}
