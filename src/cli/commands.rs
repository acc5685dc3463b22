use crate::backend::{MemoryBackend, SpreadsheetBackend, XlsxBackend};
use crate::config::{ExcelOptions, ImportOptions};
use crate::error::{SheetError, SheetResult};
use crate::pipeline::{ExcelService, ExportHooks};
use crate::tabular::TabularData;
use clap::ValueEnum;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization used for imported data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Arguments of the import command
#[derive(Debug, Clone)]
pub struct ImportArgs {
    pub input: PathBuf,
    pub sheet: Option<String>,
    pub header_row: Option<usize>,
    pub keep_empty_rows: bool,
    pub infer_types: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// `.json` workbooks use the in-memory grid format, everything else is xlsx
fn is_memory_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn load_options(config: Option<&Path>) -> SheetResult<ExcelOptions> {
    match config {
        Some(path) => ExcelOptions::from_file(path),
        None => Ok(ExcelOptions::default()),
    }
}

/// Execute the import command
pub fn import(args: ImportArgs) -> SheetResult<()> {
    let options = load_options(args.config.as_deref())?;
    let mut import_options = ImportOptions::default()
        .header_row(args.header_row)
        .keep_empty_rows(args.keep_empty_rows)
        .infer_types(args.infer_types);
    if let Some(sheet) = &args.sheet {
        import_options = import_options.sheet(sheet.clone());
    }

    let bytes = fs::read(&args.input)?;
    let imported = if is_memory_workbook(&args.input) {
        ExcelService::with_options(MemoryBackend, options)
            .import_bytes_with_report(&bytes, &import_options)
    } else {
        ExcelService::with_options(XlsxBackend, options)
            .import_bytes_with_report(&bytes, &import_options)
    };
    let Some((data, report)) = imported else {
        return Err(SheetError::Validation(format!(
            "No worksheet data found in {}",
            args.input.display()
        )));
    };

    let document = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&data)?,
        OutputFormat::Yaml => serde_yaml::to_string(&data)?,
    };

    let Some(output) = args.output else {
        println!("{}", document);
        return Ok(());
    };

    println!("{}", "📥 Sheetforge - Import".bold().green());
    println!("   Input:  {}", args.input.display());
    println!("   Output: {}\n", output.display());

    if args.verbose {
        println!("   📊 Sheet: {}", report.sheet_name.bright_blue().bold());
        println!(
            "      {} columns, {} rows ({} blank rows dropped)",
            data.column_count(),
            report.rows_read,
            report.rows_dropped
        );
        for column in data.columns() {
            println!("      {} {}", column.name.bright_blue(), column.kind.name());
        }
        if report.cells_skipped > 0 {
            println!(
                "{}",
                format!("   ⚠️  {} cells skipped", report.cells_skipped).yellow()
            );
        }
        println!();
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, document)?;

    println!("{}", "✅ Import Complete!".bold().green());
    Ok(())
}

/// Execute the export command
pub fn export(
    input: PathBuf,
    output: PathBuf,
    sheet: String,
    title: Option<String>,
    config: Option<PathBuf>,
    verbose: bool,
) -> SheetResult<()> {
    println!("{}", "📤 Sheetforge - Export".bold().green());
    println!("   Input:  {}", input.display());
    println!("   Output: {}\n", output.display());

    let options = load_options(config.as_deref())?;
    let data = read_table(&input)?;

    if verbose {
        println!(
            "   📊 Table: {} ({} columns, {} rows)\n",
            data.name.bright_blue().bold(),
            data.column_count(),
            data.row_count()
        );
    }

    let title = title.unwrap_or_default();
    let skipped = if is_memory_workbook(&output) {
        export_with(ExcelService::with_options(MemoryBackend, options), &data, &output, &sheet, &title)?
    } else {
        export_with(ExcelService::with_options(XlsxBackend, options), &data, &output, &sheet, &title)?
    };

    if verbose && skipped > 0 {
        println!(
            "{}",
            format!("   ⚠️  {} cells skipped", skipped).yellow()
        );
    }

    println!("{}", "✅ Export Complete!".bold().green());
    println!("   Workbook: {}\n", output.display());
    Ok(())
}

/// Write `data` through `service`; returns the number of skipped cells
fn export_with<B: SpreadsheetBackend>(
    service: ExcelService<B>,
    data: &TabularData,
    output: &Path,
    sheet: &str,
    title: &str,
) -> SheetResult<usize> {
    let (bytes, report) = service.export_tabular_with_report(data, sheet, title, ExportHooks::none())?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, bytes)?;
    Ok(report.cells_skipped)
}

/// Tabular data from a `.json`, `.yaml` or `.yml` document
fn read_table(path: &Path) -> SheetResult<TabularData> {
    let content = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "yaml" | "yml"));
    let data: TabularData = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    data.validate()?;
    Ok(data)
}

/// Execute the config command
pub fn config(file: Option<PathBuf>) -> SheetResult<()> {
    let options = load_options(file.as_deref())?;
    match &file {
        Some(path) => println!("# Effective options from {}", path.display()),
        None => println!("# Default options"),
    }
    print!("{}", options.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{CellKind, CellValue};
    use tempfile::TempDir;

    #[test]
    fn test_memory_workbook_detection() {
        assert!(is_memory_workbook(Path::new("book.json")));
        assert!(is_memory_workbook(Path::new("book.JSON")));
        assert!(!is_memory_workbook(Path::new("book.xlsx")));
        assert!(!is_memory_workbook(Path::new("book")));
    }

    #[test]
    fn test_read_table_yaml_and_json() {
        let dir = TempDir::new().unwrap();
        let mut data = TabularData::new("people");
        data.add_column("Name", CellKind::Text).unwrap();
        data.add_row(vec![CellValue::from("Ann")]).unwrap();

        let json_path = dir.path().join("t.json");
        fs::write(&json_path, serde_json::to_string(&data).unwrap()).unwrap();
        assert_eq!(read_table(&json_path).unwrap(), data);

        let yaml_path = dir.path().join("t.yml");
        fs::write(&yaml_path, serde_yaml::to_string(&data).unwrap()).unwrap();
        assert_eq!(read_table(&yaml_path).unwrap(), data);
    }

    #[test]
    fn test_read_table_rejects_ragged_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"name":"t","columns":[{"name":"A","kind":"Text"}],"rows":[[{"String":"x"},"Null"]]}"#,
        )
        .unwrap();
        assert!(matches!(read_table(&path), Err(SheetError::Validation(_))));
    }
}
