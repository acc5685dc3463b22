use clap::{Parser, Subcommand};
use sheetforge::cli::{self, ImportArgs, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetforge")]
#[command(about = "Spreadsheet import/export between worksheets and tabular data")]
#[command(long_about = "Sheetforge - Spreadsheet import/export

Reads worksheets into typed tabular data and writes tabular data back to
workbooks. Columns are typed by inference; blank rows are dropped unless
asked otherwise.

COMMANDS:
  import  - Worksheet (.xlsx or .json grid) to JSON/YAML
  export  - JSON/YAML table to workbook (.xlsx or .json grid)
  config  - Print effective options

EXAMPLES:
  sheetforge import report.xlsx --sheet Q3 -o q3.json
  sheetforge import raw.xlsx --no-header --keep-empty-rows --format yaml
  sheetforge export table.json out.xlsx --title \"Quarterly Report\"
  sheetforge config --file options.yaml

Logging: set RUST_LOG (default sheetforge=info).")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Import a worksheet into tabular data.

The header row (first row by default) names the columns. Empty headers
become 'Column N' and repeated headers get a numeric suffix. Each column's
type is inferred from its values unless --no-infer is given.

Writes JSON (default) or YAML to stdout, or to --output.")]
    /// Import a worksheet to JSON or YAML
    Import {
        /// Workbook to read (.xlsx, or .json for the in-memory grid format)
        input: PathBuf,

        /// Worksheet name (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Zero-based header row
        #[arg(long, default_value_t = 0, conflicts_with = "no_header")]
        header_row: usize,

        /// The sheet has no header row
        #[arg(long)]
        no_header: bool,

        /// Keep fully blank rows
        #[arg(long)]
        keep_empty_rows: bool,

        /// Keep raw cell values instead of inferring column types
        #[arg(long)]
        no_infer: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Options file (YAML)
        #[arg(short, long, env = "SHEETFORGE_CONFIG")]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Export a JSON/YAML table to a workbook
    Export {
        /// Table document (.json, .yaml or .yml)
        input: PathBuf,

        /// Workbook to write (.xlsx, or .json for the in-memory grid format)
        output: PathBuf,

        /// Worksheet name
        #[arg(short, long, default_value = "Sheet1")]
        sheet: String,

        /// Title merged across the columns above the header
        #[arg(short, long)]
        title: Option<String>,

        /// Options file (YAML)
        #[arg(short, long, env = "SHEETFORGE_CONFIG")]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print effective options as YAML
    Config {
        /// Options file to load and validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sheetforge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            input,
            sheet,
            header_row,
            no_header,
            keep_empty_rows,
            no_infer,
            format,
            output,
            config,
            verbose,
        } => cli::import(ImportArgs {
            input,
            sheet,
            header_row: (!no_header).then_some(header_row),
            keep_empty_rows,
            infer_types: !no_infer,
            format,
            output,
            config,
            verbose,
        })?,

        Commands::Export {
            input,
            output,
            sheet,
            title,
            config,
            verbose,
        } => cli::export(input, output, sheet, title, config, verbose)?,

        Commands::Config { file } => cli::config(file)?,
    }

    Ok(())
}
