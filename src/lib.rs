//! Sheetforge - spreadsheet import/export for typed records and tabular data
//!
//! This library moves data between worksheets and two in-memory shapes:
//! lists of typed records and [`TabularData`] (named, typed columns plus
//! aligned rows). One pipeline serves every spreadsheet engine through the
//! [`SpreadsheetBackend`] trait.
//!
//! # Features
//!
//! - Record layouts declared once per type and cached (`impl_record!`)
//! - Column ordering by explicit ordinal, unordered fields last
//! - Cell coercion with serial dates, enums and optional fields
//! - Tolerant mode: a bad cell is logged and skipped, never fatal
//! - Parallel row conversion above a configurable threshold (rayon)
//! - xlsx backend (calamine + rust_xlsxwriter) and an in-memory JSON backend
//! - Async facade with cooperative cancellation (tokio)
//!
//! # Example
//!
//! ```
//! use sheetforge::{impl_record, ExcelService, ExportHooks, ImportOptions, XlsxBackend};
//!
//! #[derive(Default)]
//! struct Employee {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl_record!(Employee {
//!     name: String => column(display = "Full Name", order = 0),
//!     age: i32 => column(order = 1),
//! });
//!
//! let service = ExcelService::new(XlsxBackend);
//! let staff = vec![Employee { name: "Ann".into(), age: 30 }];
//! let bytes = service.export_records(&staff, "Staff", "", ExportHooks::none())?;
//!
//! let table = service.import_bytes(&bytes, &ImportOptions::default()).unwrap();
//! assert_eq!(table.column_names(), vec!["Full Name", "age"]);
//! # Ok::<(), sheetforge::SheetError>(())
//! ```

pub mod asyncio;
pub mod backend;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod error;
pub mod mapping;
pub mod perf;
pub mod pipeline;
pub mod record;
pub mod tabular;
pub mod value;

// Re-export commonly used types
pub use asyncio::{AsyncExcelService, CancelToken};
pub use backend::{MemoryBackend, SheetLayout, SpreadsheetBackend, XlsxBackend};
pub use config::{ExcelOptions, ImportOptions, StyleOptions};
pub use error::{CoercionError, ExportStage, SheetError, SheetResult};
pub use pipeline::{ExcelService, ExportHooks, ExportReport, ImportReport};
pub use record::{FieldDef, Record};
pub use tabular::{TabularColumn, TabularData};
pub use value::{CellKind, CellValue, FieldKind, FieldType, FieldValue};
