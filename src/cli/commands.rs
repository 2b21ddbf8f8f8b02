use crate::core::KeyedLookup;
use crate::error::{MapperError, MapperResult};
use crate::excel::{ExcelExporter, ExcelImporter, EXPORT_FILE_NAME};
use crate::mapping::{ColumnMapping, MappingRegistry};
use crate::session::{ingest_workbooks, MappingSession};
use crate::types::{MergedTable, RecordTable};
use crate::workbook::Workbook;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Rows shown when picking a header row
pub const HEADER_PICKER_ROWS: usize = 10;

/// Longest cell text printed in a preview table
const MAX_CELL_WIDTH: usize = 24;

//==============================================================================
// Argument types
//==============================================================================

/// `TemplateColumn=source.xlsx:SourceColumn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapArg(pub ColumnMapping);

impl std::str::FromStr for MapArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (template_column, source) = s
            .split_once('=')
            .ok_or_else(|| format!("expected TemplateColumn=file:SourceColumn, got '{}'", s))?;
        if template_column.trim().is_empty() {
            return Err(format!("missing template column in '{}'", s));
        }
        let (file, column) = match source.split_once(':') {
            Some((file, column)) => (file, Some(column)),
            None => (source, None),
        };
        Ok(MapArg(ColumnMapping::with_source(
            template_column.trim(),
            Some(file.trim()),
            column,
        )))
    }
}

/// `file.xlsx=value`, used for per-file sheet and header-row choices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSetting<T> {
    pub file: String,
    pub value: T,
}

impl<T: std::str::FromStr> std::str::FromStr for FileSetting<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, value) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected file=value, got '{}'", s))?;
        let value = value
            .parse::<T>()
            .map_err(|_| format!("invalid value '{}' for '{}'", value, file))?;
        Ok(FileSetting {
            file: file.to_string(),
            value,
        })
    }
}

/// Options for the `merge` command
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub template: PathBuf,
    pub template_sheet: Option<String>,
    pub template_header_row: usize,
    pub sources: Vec<PathBuf>,
    pub sheets: Vec<FileSetting<String>>,
    pub header_rows: Vec<FileSetting<usize>>,
    pub maps: Vec<MapArg>,
    pub output: Option<PathBuf>,
    pub preview: usize,
    pub verbose: bool,
}

//==============================================================================
// Commands
//==============================================================================

/// Execute the sheets command: list sheets and the rows to pick a header from
pub fn sheets(file: PathBuf, sheet: Option<String>) -> MapperResult<()> {
    println!("{}", "📒 Excel Mapper - Sheets".bold().green());
    println!("   File: {}\n", file.display());

    let mut workbook = ExcelImporter::from_path(&file)?.import()?;
    if let Some(ref s) = sheet {
        workbook.select_sheet(s)?;
    }

    for (idx, name) in workbook.sheets().iter().enumerate() {
        let marker = if name == workbook.selected_sheet() {
            "▶".bright_yellow().to_string()
        } else {
            " ".to_string()
        };
        println!("   {} {}: {}", marker, idx, name.bright_blue());
    }
    println!();

    println!(
        "{}",
        format!(
            "   First {} rows of '{}' (pick one with --header-row):",
            HEADER_PICKER_ROWS,
            workbook.selected_sheet()
        )
        .cyan()
    );
    for (idx, row) in workbook.preview_rows(HEADER_PICKER_ROWS).iter().enumerate() {
        println!("   {:>3} │ {}", idx, row.join(" │ "));
    }
    if workbook.row_count() == 0 {
        println!("{}", "   ⚠️  Sheet is empty".yellow());
    }
    println!();
    Ok(())
}

/// Execute the headers command: show the header list derived from a row
pub fn headers(file: PathBuf, sheet: Option<String>, header_row: usize) -> MapperResult<()> {
    println!("{}", "📒 Excel Mapper - Headers".bold().green());
    println!("   File: {}", file.display());

    let mut workbook = ExcelImporter::from_path(&file)?.import()?;
    configure(&mut workbook, sheet.as_deref(), header_row)?;

    println!(
        "   Sheet: {}, header row: {}\n",
        workbook.selected_sheet().bright_blue(),
        workbook.header_row()
    );
    for (idx, header) in workbook.headers().iter().enumerate() {
        println!("   {:>3}  {}", idx, header.cyan());
    }
    println!(
        "\n   {} headers, {} data rows",
        workbook.headers().len(),
        workbook.data_rows().len()
    );
    warn_duplicates(&workbook);
    println!();
    Ok(())
}

/// Execute the merge command: row concatenation over the source files
pub fn merge(opts: MergeOptions) -> MapperResult<()> {
    println!("{}", "🔗 Excel Mapper - Merge".bold().green());
    println!("   Template: {}", opts.template.display());
    for source in &opts.sources {
        println!("   Source:   {}", source.display());
    }
    println!();

    let mut session = ingest_all(&opts.template, &opts.sources)?;
    let template = session
        .template_mut()
        .ok_or_else(|| MapperError::NotFound("template workbook".to_string()))?;
    configure(
        template,
        opts.template_sheet.as_deref(),
        opts.template_header_row,
    )?;
    warn_duplicates(template);

    let names: Vec<String> = session
        .sources()
        .iter()
        .map(|w| w.name().to_string())
        .collect();
    for name in &names {
        let sheet = opts
            .sheets
            .iter()
            .rev()
            .find(|s| &s.file == name)
            .map(|s| s.value.clone());
        let header_row = opts
            .header_rows
            .iter()
            .rev()
            .find(|s| &s.file == name)
            .map(|s| s.value)
            .unwrap_or(0);
        if let Some(workbook) = session.source_mut(name) {
            configure(workbook, sheet.as_deref(), header_row)?;
            warn_duplicates(workbook);
            if opts.verbose {
                println!(
                    "   📄 {} [{}] header row {}: {}",
                    name.bright_blue(),
                    workbook.selected_sheet(),
                    workbook.header_row(),
                    workbook.headers().join(", ")
                );
            }
        }
    }

    for MapArg(m) in &opts.maps {
        session.registry.set_mapping(
            &m.template_column,
            m.source_file.as_deref(),
            m.source_column.as_deref(),
        );
    }

    print_diagnostics(&session.diagnostics());

    let merged = session.preview()?;
    print_preview(&merged, opts.preview);

    if let Some(output) = opts.output {
        let path = output_path(&output);
        ExcelExporter::new(&merged).export(&path)?;
        println!("{}", "✅ Export Complete!".bold().green());
        println!("   Excel file: {}\n", path.display());
    }
    Ok(())
}

/// Execute the lookup command: keyed lookup over the template's own rows
pub fn lookup(
    template: PathBuf,
    sources: Vec<PathBuf>,
    maps: Vec<MapArg>,
    output: Option<PathBuf>,
    preview: usize,
) -> MapperResult<()> {
    println!("{}", "🔎 Excel Mapper - Lookup".bold().green());
    println!("   Template: {}\n", template.display());

    let template = ExcelImporter::from_path(&template)?.import_records()?;
    let sources = sources
        .iter()
        .map(|p| ExcelImporter::from_path(p)?.import_records())
        .collect::<MapperResult<Vec<RecordTable>>>()?;

    let registry = MappingRegistry::from_mappings(maps.into_iter().map(|MapArg(m)| m));
    for m in registry.iter().filter(|m| m.is_active()) {
        let file = m.source_file.as_deref().unwrap_or_default();
        if !sources.iter().any(|s| s.name == file) {
            print_diagnostics(&[MapperError::MissingMappingTarget {
                template_column: m.template_column.clone(),
                reason: format!("unknown source file '{}'", file),
            }]);
        }
    }

    let merged = KeyedLookup::new(&registry, &sources).merge(&template);
    print_preview(&merged, preview);

    if let Some(output) = output {
        let path = output_path(&output);
        ExcelExporter::new(&merged).export(&path)?;
        println!("{}", "✅ Export Complete!".bold().green());
        println!("   Excel file: {}\n", path.display());
    }
    Ok(())
}

//==============================================================================
// Helpers
//==============================================================================

/// Read the template and every source concurrently into a fresh session
fn ingest_all(template: &Path, sources: &[PathBuf]) -> MapperResult<MappingSession> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let shared = MappingSession::new().shared();
    let mut paths = Vec::with_capacity(sources.len() + 1);
    paths.push(template.to_path_buf());
    paths.extend_from_slice(sources);
    runtime.block_on(ingest_workbooks(&shared, paths))?;
    let session = runtime.block_on(async { std::mem::take(&mut *shared.lock().await) });
    Ok(session)
}

fn configure(workbook: &mut Workbook, sheet: Option<&str>, header_row: usize) -> MapperResult<()> {
    if let Some(sheet) = sheet {
        workbook.select_sheet(sheet)?;
    }
    workbook.select_header_row(header_row)
}

fn output_path(output: &Path) -> PathBuf {
    if output.is_dir() {
        output.join(EXPORT_FILE_NAME)
    } else {
        output.to_path_buf()
    }
}

fn warn_duplicates(workbook: &Workbook) {
    let duplicates = workbook.duplicate_headers();
    if !duplicates.is_empty() {
        println!(
            "{}",
            format!(
                "   ⚠️  '{}' has duplicate headers ({}); the first occurrence is used",
                workbook.name(),
                duplicates.join(", ")
            )
            .yellow()
        );
    }
}

fn print_diagnostics(problems: &[MapperError]) {
    for problem in problems {
        println!("{}", format!("   ⚠️  {}", problem).yellow());
    }
    if !problems.is_empty() {
        println!();
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{}…", cut)
    } else {
        text.to_string()
    }
}

/// Print headers and the first `limit` rows as an aligned table
fn print_preview(table: &MergedTable, limit: usize) {
    let rows: Vec<Vec<String>> = table
        .head(limit)
        .to_text_rows()
        .into_iter()
        .map(|row| row.iter().map(|c| truncate(c)).collect())
        .collect();

    let mut widths = vec![0usize; table.width()];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    let render = |row: &[String]| {
        row.iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" │ ")
    };

    println!("{}", "📊 Preview:".bold().green());
    if let Some((header, body)) = rows.split_first() {
        println!("   {}", render(header.as_slice()).bold());
        for row in body {
            println!("   {}", render(row.as_slice()));
        }
    }
    println!(
        "\n   {} of {} rows shown, {} columns\n",
        limit.min(table.row_count()),
        table.row_count(),
        table.width()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_spec_parse() {
        let MapArg(m) = "Amount=ledger.xlsx:Total".parse().unwrap();
        assert_eq!(m.template_column, "Amount");
        assert_eq!(m.source_file.as_deref(), Some("ledger.xlsx"));
        assert_eq!(m.source_column.as_deref(), Some("Total"));
    }

    #[test]
    fn test_map_spec_without_column_is_inactive() {
        let MapArg(m) = "Amount=ledger.xlsx".parse().unwrap();
        assert!(!m.is_active());
    }

    #[test]
    fn test_map_spec_rejects_missing_equals() {
        assert!("Amount".parse::<MapArg>().is_err());
        assert!("=a.xlsx:B".parse::<MapArg>().is_err());
    }

    #[test]
    fn test_file_setting_parse() {
        let s: FileSetting<usize> = "ledger.xlsx=2".parse().unwrap();
        assert_eq!(s.file, "ledger.xlsx");
        assert_eq!(s.value, 2);

        let s: FileSetting<String> = "a=b.xlsx=Sheet 2".parse().unwrap();
        assert_eq!(s.file, "a=b.xlsx");
        assert_eq!(s.value, "Sheet 2");

        assert!("ledger.xlsx=two".parse::<FileSetting<usize>>().is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(40);
        assert_eq!(truncate(&long).chars().count(), MAX_CELL_WIDTH);
    }

    #[test]
    fn test_output_path_for_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(output_path(dir.path()), dir.path().join(EXPORT_FILE_NAME));
        let file = dir.path().join("out.xlsx");
        assert_eq!(output_path(&file), file);
    }
}
