//! Excel import/export
//!
//! - Import: spreadsheet bytes (.xlsx, .xls, .xlsb, .ods) → sheets and row grids
//! - Export: merged table → single-sheet .xlsx

mod exporter;
mod importer;

pub use exporter::{ExcelExporter, EXPORT_FILE_NAME, SHEET_NAME, XLSX_CONTENT_TYPE};
pub use importer::ExcelImporter;
