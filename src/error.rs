use thiserror::Error;

pub type MapperResult<T> = Result<T, MapperError>;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Workbook '{0}' contains no sheets")]
    EmptyWorkbook(String),

    #[error("Sheet '{sheet}' not found in workbook '{workbook}'")]
    SheetNotFound { workbook: String, sheet: String },

    #[error("Header row {index} is out of bounds for '{workbook}' ({rows} rows)")]
    InvalidHeaderRow {
        workbook: String,
        index: usize,
        rows: usize,
    },

    #[error("Headers have not been selected for '{0}'")]
    HeadersNotSelected(String),

    #[error("Mapping for '{template_column}' cannot be resolved: {reason}")]
    MissingMappingTarget {
        template_column: String,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl From<calamine::Error> for MapperError {
    fn from(e: calamine::Error) -> Self {
        MapperError::Parse(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for MapperError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        MapperError::Export(e.to_string())
    }
}

impl MapperError {
    /// True for errors that only degrade output (blank cells) and never abort.
    pub fn is_degraded(&self) -> bool {
        matches!(self, MapperError::MissingMappingTarget { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_is_degraded() {
        let err = MapperError::MissingMappingTarget {
            template_column: "Amount".to_string(),
            reason: "unknown source file 'b.xlsx'".to_string(),
        };
        assert!(err.is_degraded());
        assert!(err.to_string().contains("Amount"));
        assert!(err.to_string().contains("b.xlsx"));
    }

    #[test]
    fn test_parse_error_is_not_degraded() {
        let err = MapperError::Parse("bad zip".to_string());
        assert!(!err.is_degraded());
        assert_eq!(err.to_string(), "Parse error: bad zip");
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: MapperError = io.into();
        assert!(matches!(err, MapperError::Io(_)));
    }
}
