use calamine::Data;
use serde::{Deserialize, Serialize};
use std::fmt;

//==============================================================================
// Cell Values
//==============================================================================

/// A single spreadsheet cell as seen by the mapper.
///
/// Dates are carried as their Excel serial number. Values are only turned
/// into text when a table is displayed, compared for export, or written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    #[default]
    Empty,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Empty, or text consisting only of whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Render the cell the way it is displayed in previews and headers
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Empty => String::new(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::String(s) => CellValue::text(s.as_str()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
            Data::Error(e) => CellValue::Text(e.to_string()),
            Data::Empty => CellValue::Empty,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Format a number for display: integral values lose the decimal point
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One row of cells, positionally aligned to some header list
pub type Row = Vec<CellValue>;

//==============================================================================
// Merged Output
//==============================================================================

/// Output of a merge: headers plus body rows of exactly `headers.len()` cells
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MergedTable {
    pub headers: Vec<String>,
    pub body: Vec<Row>,
}

impl MergedTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            body: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.body.len()
    }

    /// Append a row, padding or truncating it to the header width
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.headers.len(), CellValue::Empty);
        self.body.push(row);
    }

    /// A copy holding only the first `n` body rows
    pub fn head(&self, n: usize) -> MergedTable {
        MergedTable {
            headers: self.headers.clone(),
            body: self.body.iter().take(n).cloned().collect(),
        }
    }

    /// Headers followed by every body row, all rendered as text
    pub fn to_text_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.body.len() + 1);
        rows.push(self.headers.clone());
        for row in &self.body {
            rows.push(row.iter().map(CellValue::to_text).collect());
        }
        rows
    }
}

//==============================================================================
// Record Tables
//==============================================================================

/// A sheet addressed by header name: header row 0, data rows aligned to `headers`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl RecordTable {
    /// Position of the first header with this name
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn into_merged(self) -> MergedTable {
        MergedTable {
            headers: self.headers,
            body: self.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(CellValue::Number(100.0).to_text(), "100");
        assert_eq!(CellValue::Number(-3.0).to_text(), "-3");
        assert_eq!(CellValue::Number(2.5).to_text(), "2.5");
        assert_eq!(CellValue::Number(0.1).to_text(), "0.1");
    }

    #[test]
    fn test_blank_detection() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("   ".to_string()).is_blank());
        assert!(!CellValue::Text("x".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_empty_string_becomes_empty() {
        assert_eq!(CellValue::text(""), CellValue::Empty);
        assert_eq!(CellValue::from(&Data::String(String::new())), CellValue::Empty);
    }

    #[test]
    fn test_from_calamine_data() {
        assert_eq!(CellValue::from(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(CellValue::from(&Data::Float(1.5)), CellValue::Number(1.5));
        assert_eq!(
            CellValue::from(&Data::Bool(true)),
            CellValue::Text("TRUE".to_string())
        );
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_strict_equality() {
        assert_ne!(CellValue::Text("100".to_string()), CellValue::Number(100.0));
    }

    #[test]
    fn test_json_shape() {
        let row = vec![
            CellValue::Text("Alice".to_string()),
            CellValue::Number(100.0),
            CellValue::Empty,
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["Alice",100.0,null]"#);

        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_push_row_pads_to_width() {
        let mut table = MergedTable::new(vec!["A".to_string(), "B".to_string()]);
        table.push_row(vec![CellValue::Number(1.0)]);
        assert_eq!(table.body[0], vec![CellValue::Number(1.0), CellValue::Empty]);
    }

    #[test]
    fn test_text_rows() {
        let mut table = MergedTable::new(vec!["Name".to_string(), "Amount".to_string()]);
        table.push_row(vec![CellValue::from("Alice"), CellValue::from(100.0)]);
        assert_eq!(
            table.to_text_rows(),
            vec![vec!["Name", "Amount"], vec!["Alice", "100"]]
        );
    }
}
