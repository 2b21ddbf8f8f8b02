//! Excel importer implementation - spreadsheet bytes → row grids

use crate::error::{MapperError, MapperResult};
use crate::types::{CellValue, RecordTable, Row};
use crate::workbook::Workbook;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

type ByteReader = Cursor<Arc<[u8]>>;

/// Largest grid a declared sheet dimension may pad to
const MAX_PADDED_CELLS: u64 = 16_777_216;

/// Excel importer reading workbooks from in-memory bytes.
///
/// The original bytes are kept so any sheet can be re-read later without
/// touching a previously derived grid.
#[derive(Clone)]
pub struct ExcelImporter {
    name: String,
    bytes: Arc<[u8]>,
}

impl ExcelImporter {
    /// Create a new importer over uploaded bytes
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, naming the workbook after the file
    pub fn from_path<P: AsRef<Path>>(path: P) -> MapperResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self::new(file_name(path), bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open the workbook, sniffing xlsx/xls/xlsb/ods from the bytes
    fn open(&self) -> MapperResult<Sheets<ByteReader>> {
        if self.bytes.is_empty() {
            return Err(MapperError::Parse(format!("'{}' is empty", self.name)));
        }
        open_workbook_auto_from_rs(Cursor::new(Arc::clone(&self.bytes))).map_err(|e| {
            MapperError::Parse(format!("Failed to open '{}' as a spreadsheet: {}", self.name, e))
        })
    }

    /// Sheet names in file order. Fails if the workbook declares none.
    pub fn sheet_names(&self) -> MapperResult<Vec<String>> {
        let workbook = self.open()?;
        let sheets = workbook.sheet_names().to_vec();
        if sheets.is_empty() {
            return Err(MapperError::EmptyWorkbook(self.name.clone()));
        }
        Ok(sheets)
    }

    /// Read one sheet as a rectangular grid addressed from A1
    pub fn read_grid(&self, sheet: &str) -> MapperResult<Vec<Row>> {
        self.read_sheet(sheet).map(|(_, grid)| grid)
    }

    /// Used range of a sheet together with its absolute grid
    fn read_sheet(&self, sheet: &str) -> MapperResult<(Range<Data>, Vec<Row>)> {
        let mut workbook = self.open()?;
        if !workbook.sheet_names().iter().any(|s| s == sheet) {
            return Err(MapperError::SheetNotFound {
                workbook: self.name.clone(),
                sheet: sheet.to_string(),
            });
        }
        let range = workbook.worksheet_range(sheet)?;
        let grid = range_to_grid(&range, declared_end(&mut workbook, sheet));
        debug!(
            workbook = %self.name,
            sheet,
            rows = grid.len(),
            "read sheet grid"
        );
        Ok((range, grid))
    }

    /// Import into a `Workbook` with the first sheet selected
    pub fn import(&self) -> MapperResult<Workbook> {
        let sheets = self.sheet_names()?;
        let selected = sheets[0].clone();
        let grid = self.read_grid(&selected)?;
        Ok(Workbook::new(
            self.name.clone(),
            sheets,
            selected,
            grid,
            Arc::clone(&self.bytes),
        ))
    }

    /// Import the first sheet as header-keyed records.
    ///
    /// The first row of the used range supplies the headers (blank cells
    /// skipped); every later row is projected onto those columns and wholly
    /// blank rows are dropped.
    pub fn import_records(&self) -> MapperResult<RecordTable> {
        let sheets = self.sheet_names()?;
        let (range, grid) = self.read_sheet(&sheets[0])?;
        let first_row = range.start().map_or(0, |(row, _)| row as usize);

        let mut headers = Vec::new();
        let mut columns = Vec::new();
        if let Some(header_row) = grid.get(first_row) {
            for (col, cell) in header_row.iter().enumerate() {
                if !cell.is_blank() {
                    headers.push(cell.to_text());
                    columns.push(col);
                }
            }
        }

        let rows: Vec<Row> = grid
            .iter()
            .skip(first_row + 1)
            .map(|row| {
                columns
                    .iter()
                    .map(|&col| row.get(col).cloned().unwrap_or_default())
                    .collect::<Row>()
            })
            .filter(|row| !row.iter().all(CellValue::is_blank))
            .collect();

        Ok(RecordTable {
            name: self.name.clone(),
            headers,
            rows,
        })
    }
}

/// Materialize a calamine range into an absolute grid.
///
/// Leading rows and columns outside the used range become empty cells so
/// that row N of the grid is row N+1 in the spreadsheet. A declared sheet
/// extent past the last valued cell pads the grid with trailing empty cells.
fn range_to_grid(range: &Range<Data>, declared: Option<(u32, u32)>) -> Vec<Row> {
    let (Some((row0, col0)), Some((row1, col1))) = (range.start(), range.end()) else {
        return Vec::new();
    };
    let (row1, col1) = declared.map_or((row1, col1), |(r, c)| (row1.max(r), col1.max(c)));
    let (row0, col0) = (row0 as usize, col0 as usize);
    let height = row1 as usize + 1;
    let width = col1 as usize + 1;

    let mut grid = vec![vec![CellValue::Empty; width]; height];
    for (i, row) in range.rows().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            grid[row0 + i][col0 + j] = CellValue::from(cell);
        }
    }
    grid
}

/// Bottom-right corner of an xlsx sheet's `<dimension>`, which also covers
/// blank cells that calamine leaves out of the range
fn declared_end(workbook: &mut Sheets<ByteReader>, sheet: &str) -> Option<(u32, u32)> {
    match workbook {
        Sheets::Xlsx(xlsx) => xlsx
            .worksheet_cells_reader(sheet)
            .ok()
            .map(|reader| reader.dimensions().end)
            .filter(|&(row, col)| (row as u64 + 1) * (col as u64 + 1) <= MAX_PADDED_CELLS),
        _ => None,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
