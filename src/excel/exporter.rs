//! Excel exporter implementation - merged table → single-sheet .xlsx

use crate::error::{MapperError, MapperResult};
use crate::types::{CellValue, MergedTable};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;
use tracing::info;

/// Name of the only worksheet in an exported workbook
pub const SHEET_NAME: &str = "Mapped Data";

/// Download / save name for exported workbooks
pub const EXPORT_FILE_NAME: &str = "mapped_data.xlsx";

/// Content type of an .xlsx download
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Excel exporter for merged tables
pub struct ExcelExporter<'a> {
    table: &'a MergedTable,
}

impl<'a> ExcelExporter<'a> {
    /// Create a new Excel exporter
    pub fn new(table: &'a MergedTable) -> Self {
        Self { table }
    }

    /// Serialize to an in-memory .xlsx
    pub fn to_bytes(&self) -> MapperResult<Vec<u8>> {
        let mut workbook = self.build()?;
        let bytes = workbook
            .save_to_buffer()
            .map_err(|e| MapperError::Export(format!("Failed to serialize workbook: {}", e)))?;
        info!(
            rows = self.table.row_count(),
            columns = self.table.width(),
            bytes = bytes.len(),
            "exported merged table"
        );
        Ok(bytes)
    }

    /// Export the table to an Excel .xlsx file
    pub fn export(&self, output_path: &Path) -> MapperResult<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(output_path, bytes)?;
        Ok(())
    }

    fn build(&self) -> MapperResult<Workbook> {
        let (rows, cols) = (self.table.row_count() + 1, self.table.width());
        if rows > MAX_ROWS || cols > MAX_COLS {
            return Err(MapperError::Export(format!(
                "Table of {} rows x {} columns exceeds worksheet limits",
                rows, cols
            )));
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(SHEET_NAME)
            .map_err(|e| MapperError::Export(format!("Failed to set worksheet name: {}", e)))?;

        let blank = Format::new();

        // Header row (row 0)
        for (col_idx, header) in self.table.headers.iter().enumerate() {
            let header = CellValue::text(header.as_str());
            write_cell(worksheet, 0, col_idx as u16, &header, &blank)?;
        }

        // Data rows (starting at row 1)
        for (row_idx, row) in self.table.body.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                write_cell(worksheet, row_idx as u32 + 1, col_idx as u16, cell, &blank)?;
            }
        }

        Ok(workbook)
    }
}

/// Write a single cell. Empty cells become blanks so the sheet extent still
/// covers trailing empty rows and columns.
fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    blank: &Format,
) -> MapperResult<()> {
    match cell {
        CellValue::Text(s) if s.is_empty() => {
            worksheet
                .write_blank(row, col, blank)
                .map_err(|e| MapperError::Export(format!("Failed to write blank: {}", e)))?;
        }
        CellValue::Text(s) => {
            worksheet
                .write_string(row, col, s)
                .map_err(|e| MapperError::Export(format!("Failed to write text: {}", e)))?;
        }
        CellValue::Number(n) => {
            worksheet
                .write_number(row, col, *n)
                .map_err(|e| MapperError::Export(format!("Failed to write number: {}", e)))?;
        }
        CellValue::Empty => {
            worksheet
                .write_blank(row, col, blank)
                .map_err(|e| MapperError::Export(format!("Failed to write blank: {}", e)))?;
        }
    }
    Ok(())
}
