//! Ingested workbooks and the sheet / header-row selector.
//!
//! A `Workbook` keeps the bytes it was parsed from. Selecting a sheet always
//! re-reads that sheet from those bytes and clears the header state, so the
//! operator has to pick a header row again for the new grid.

use crate::error::{MapperError, MapperResult};
use crate::excel::ExcelImporter;
use crate::types::{CellValue, Row};
use std::sync::Arc;
use tracing::debug;

/// One uploaded spreadsheet with its current sheet and header selection
#[derive(Debug, Clone)]
pub struct Workbook {
    name: String,
    sheets: Vec<String>,
    selected_sheet: String,
    header_row: usize,
    /// Derived header names, blank cells removed
    headers: Vec<String>,
    /// Grid column of each entry in `headers`
    header_columns: Vec<usize>,
    grid: Vec<Row>,
    bytes: Arc<[u8]>,
}

impl Workbook {
    pub(crate) fn new(
        name: String,
        sheets: Vec<String>,
        selected_sheet: String,
        grid: Vec<Row>,
        bytes: Arc<[u8]>,
    ) -> Self {
        Self {
            name,
            sheets,
            selected_sheet,
            header_row: 0,
            headers: Vec::new(),
            header_columns: Vec::new(),
            grid,
            bytes,
        }
    }

    /// Parse uploaded bytes; the first sheet is selected
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> MapperResult<Self> {
        ExcelImporter::new(name, bytes).import()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sheets(&self) -> &[String] {
        &self.sheets
    }

    pub fn selected_sheet(&self) -> &str {
        &self.selected_sheet
    }

    pub fn header_row(&self) -> usize {
        self.header_row
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn grid(&self) -> &[Row] {
        &self.grid
    }

    pub fn row_count(&self) -> usize {
        self.grid.len()
    }

    pub fn has_headers(&self) -> bool {
        !self.headers.is_empty()
    }

    /// Switch to another sheet, re-reading it from the original bytes.
    ///
    /// Header row resets to 0 and the derived header list is cleared.
    pub fn select_sheet(&mut self, sheet: &str) -> MapperResult<()> {
        let importer = ExcelImporter::new(self.name.clone(), Arc::clone(&self.bytes));
        let grid = importer.read_grid(sheet)?;

        self.selected_sheet = sheet.to_string();
        self.grid = grid;
        self.header_row = 0;
        self.headers.clear();
        self.header_columns.clear();
        debug!(workbook = %self.name, sheet, rows = self.grid.len(), "sheet selected");
        Ok(())
    }

    /// Use `row_index` as the header row and derive the header list from it.
    ///
    /// Blank cells are dropped; order and duplicate names are kept.
    pub fn select_header_row(&mut self, row_index: usize) -> MapperResult<()> {
        let row = self
            .grid
            .get(row_index)
            .ok_or_else(|| MapperError::InvalidHeaderRow {
                workbook: self.name.clone(),
                index: row_index,
                rows: self.grid.len(),
            })?;

        let (columns, headers): (Vec<usize>, Vec<String>) = row
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_blank())
            .map(|(col, cell)| (col, cell.to_text()))
            .unzip();

        self.header_row = row_index;
        self.headers = headers;
        self.header_columns = columns;
        debug!(
            workbook = %self.name,
            header_row = row_index,
            headers = self.headers.len(),
            "header row selected"
        );
        Ok(())
    }

    /// Grid column of the first header named `header`
    pub fn column_of(&self, header: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == header)
            .map(|i| self.header_columns[i])
    }

    /// Rows strictly after the header row
    pub fn data_rows(&self) -> &[Row] {
        self.grid.get(self.header_row + 1..).unwrap_or(&[])
    }

    /// Header names that appear more than once; resolution picks the first
    pub fn duplicate_headers(&self) -> Vec<String> {
        let mut duplicates: Vec<String> = Vec::new();
        for (i, header) in self.headers.iter().enumerate() {
            if self.headers[..i].contains(header) && !duplicates.contains(header) {
                duplicates.push(header.clone());
            }
        }
        duplicates
    }

    /// The first `n` rows of the grid as text, for picking a header row
    pub fn preview_rows(&self, n: usize) -> Vec<Vec<String>> {
        self.grid
            .iter()
            .take(n)
            .map(|row| row.iter().map(CellValue::to_text).collect())
            .collect()
    }
}
