use clap::{Parser, Subcommand};
use excel_mapper::cli::{self, FileSetting, MapArg, MergeOptions};
use excel_mapper::core::PREVIEW_ROWS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "excel-mapper")]
#[command(about = "Map columns from source spreadsheets onto a template and export the result.")]
#[command(long_about = "Excel Mapper - template-driven spreadsheet column mapping

Pick a template workbook and its header row, pick header rows in one or more
source workbooks, map each template column to a source column, then preview
and export the merged table as a single-sheet .xlsx.

COMMANDS:
  sheets   - List sheets and the first rows, to choose a header row
  headers  - Show the headers derived from a header row
  merge    - Concatenate mapped rows from every source (one block per file)
  lookup   - Fill template rows from sources by matching values

MAPPINGS:
  --map \"TemplateColumn=source.xlsx:SourceColumn\"
  The file part is the source's file name, not its path.

EXAMPLES:
  excel-mapper sheets ledger.xlsx
  excel-mapper headers ledger.xlsx --sheet Q1 --header-row 2
  excel-mapper merge --template t.xlsx --source a.xlsx --source b.xlsx \\
      --map \"Name=a.xlsx:Client\" --map \"Amount=b.xlsx:Total\" -o out/
  excel-mapper lookup --template t.xlsx --source prices.xlsx \\
      --map \"Price=prices.xlsx:Price\" -o priced.xlsx")]
#[command(version)]
struct Cli {
    /// Log library diagnostics to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook and preview rows for header selection
    Sheets {
        /// Path to the workbook (.xlsx, .xls, .xlsb, .ods)
        file: PathBuf,

        /// Sheet to preview (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Show the headers read from a chosen header row
    Headers {
        /// Path to the workbook
        file: PathBuf,

        /// Sheet to read (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Zero-based header row index
        #[arg(short = 'r', long, default_value_t = 0)]
        header_row: usize,
    },

    #[command(long_about = "Concatenate mapped rows from every source workbook.

Each source contributes one block of rows, in the order the sources are
given. Template columns with no mapping for a source stay blank in that
source's block.

Per-source settings use the source's file name:
  --sheet ledger.xlsx=Q1 --header-row ledger.xlsx=2")]
    /// Merge sources onto the template by row concatenation
    Merge {
        /// Template workbook
        #[arg(short, long)]
        template: PathBuf,

        /// Template sheet (defaults to the first sheet)
        #[arg(long)]
        template_sheet: Option<String>,

        /// Template header row (zero-based)
        #[arg(long, default_value_t = 0)]
        template_header_row: usize,

        /// Source workbooks, in upload order
        #[arg(short, long = "source", required = true)]
        sources: Vec<PathBuf>,

        /// Source sheet choice: FILE=SHEET
        #[arg(long = "sheet")]
        sheets: Vec<FileSetting<String>>,

        /// Source header row choice: FILE=ROW
        #[arg(long = "header-row")]
        header_rows: Vec<FileSetting<usize>>,

        /// Column mapping: TEMPLATE_COLUMN=FILE:SOURCE_COLUMN
        #[arg(short, long = "map")]
        maps: Vec<MapArg>,

        /// Output .xlsx path, or a directory to write mapped_data.xlsx into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows to show in the preview
        #[arg(long, default_value_t = PREVIEW_ROWS)]
        preview: usize,
    },

    /// Fill template rows by matching values against source rows
    Lookup {
        /// Template workbook (first sheet, first row as headers)
        #[arg(short, long)]
        template: PathBuf,

        /// Source workbooks
        #[arg(short, long = "source", required = true)]
        sources: Vec<PathBuf>,

        /// Column mapping: TEMPLATE_COLUMN=FILE:SOURCE_COLUMN
        #[arg(short, long = "map")]
        maps: Vec<MapArg>,

        /// Output .xlsx path, or a directory to write mapped_data.xlsx into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows to show in the preview
        #[arg(long, default_value_t = PREVIEW_ROWS)]
        preview: usize,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "excel_mapper=debug"
    } else {
        "excel_mapper=error"
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sheets { file, sheet } => cli::sheets(file, sheet),

        Commands::Headers {
            file,
            sheet,
            header_row,
        } => cli::headers(file, sheet, header_row),

        Commands::Merge {
            template,
            template_sheet,
            template_header_row,
            sources,
            sheets,
            header_rows,
            maps,
            output,
            preview,
        } => cli::merge(MergeOptions {
            template,
            template_sheet,
            template_header_row,
            sources,
            sheets,
            header_rows,
            maps,
            output,
            preview,
            verbose: cli.verbose,
        }),

        Commands::Lookup {
            template,
            sources,
            maps,
            output,
            preview,
        } => cli::lookup(template, sources, maps, output, preview),
    };
    Ok(result?)
}
