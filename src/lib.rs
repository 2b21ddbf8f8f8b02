//! Excel Mapper - spreadsheet column mapping and merge
//!
//! Ingests a template workbook and any number of source workbooks, lets the
//! operator choose the active sheet and header row of each file, declares
//! template-column → source-column mappings and produces a merged table that
//! can be previewed or exported as a new spreadsheet.
//!
//! # Features
//!
//! - Workbook ingestion from bytes (.xlsx, .xls, .xlsb, .ods)
//! - Per-file sheet and header-row selection
//! - Mapping registry with one entry per template column
//! - Two merge strategies: row concatenation and keyed lookup
//! - Single-sheet .xlsx export
//! - HTTP server with keyed template/source stores
//!
//! # Example
//!
//! ```no_run
//! use excel_mapper::core::RowConcatenator;
//! use excel_mapper::excel::ExcelImporter;
//! use excel_mapper::mapping::MappingRegistry;
//!
//! let mut template = ExcelImporter::from_path("template.xlsx")?.import()?;
//! template.select_header_row(0)?;
//! let mut source = ExcelImporter::from_path("ledger.xlsx")?.import()?;
//! source.select_header_row(2)?;
//!
//! let mut registry = MappingRegistry::new();
//! registry.set_mapping("Amount", Some("ledger.xlsx"), Some("Total"));
//!
//! let merged = RowConcatenator::for_template(&template, &registry)?.merge([&source]);
//! println!("{} rows", merged.row_count());
//! # Ok::<(), excel_mapper::error::MapperError>(())
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod mapping;
pub mod session;
pub mod store;
pub mod types;
pub mod workbook;

// Re-export commonly used types
pub use error::{MapperError, MapperResult};
pub use mapping::{ColumnMapping, MappingRegistry};
pub use types::{CellValue, MergedTable, RecordTable};
pub use workbook::Workbook;
