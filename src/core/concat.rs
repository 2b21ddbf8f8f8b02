use crate::error::{MapperError, MapperResult};
use crate::mapping::MappingRegistry;
use crate::types::{CellValue, MergedTable, Row};
use crate::workbook::Workbook;
use tracing::{debug, warn};

/// Row concatenation merge.
///
/// Every source workbook with at least one active mapping contributes one
/// output row per data row (rows after its own header row), in upload order.
/// The template only supplies the header list; its data rows are ignored.
pub struct RowConcatenator<'a> {
    headers: &'a [String],
    registry: &'a MappingRegistry,
}

impl<'a> RowConcatenator<'a> {
    #[must_use]
    pub fn new(headers: &'a [String], registry: &'a MappingRegistry) -> Self {
        Self { headers, registry }
    }

    /// Use the template workbook's derived headers
    pub fn for_template(
        template: &'a Workbook,
        registry: &'a MappingRegistry,
    ) -> MapperResult<Self> {
        if !template.has_headers() {
            return Err(MapperError::HeadersNotSelected(template.name().to_string()));
        }
        Ok(Self::new(template.headers(), registry))
    }

    pub fn merge<'w, I>(&self, sources: I) -> MergedTable
    where
        I: IntoIterator<Item = &'w Workbook>,
    {
        let sources: Vec<&Workbook> = sources.into_iter().collect();
        let mut table = MergedTable::new(self.headers.to_vec());

        for m in self.registry.iter().filter(|m| m.is_active()) {
            let file = m.source_file.as_deref().unwrap_or_default();
            if !sources.iter().any(|w| w.name() == file) {
                warn!(
                    template_column = %m.template_column,
                    source_file = file,
                    "mapping names a source file that was never ingested"
                );
            }
            if !self.headers.contains(&m.template_column) {
                warn!(
                    template_column = %m.template_column,
                    "mapping targets a column that is not a template header"
                );
            }
        }

        for source in sources {
            let columns = match self.resolve_columns(source) {
                Some(columns) => columns,
                None => continue,
            };

            let before = table.row_count();
            for row in source.data_rows() {
                table.push_row(project(row, &columns));
            }
            debug!(
                source = source.name(),
                rows = table.row_count() - before,
                "concatenated source rows"
            );
        }

        table
    }

    /// Grid column feeding each template header from this source.
    ///
    /// `None` when the source has no active mapping at all.
    fn resolve_columns(&self, source: &Workbook) -> Option<Vec<Option<usize>>> {
        let active = self.registry.active_for_source(source.name());
        if active.is_empty() {
            return None;
        }

        let columns = self
            .headers
            .iter()
            .map(|header| {
                let mapping = active.iter().find(|m| &m.template_column == header)?;
                let source_column = mapping.source_column.as_deref()?;
                let column = source.column_of(source_column);
                if column.is_none() {
                    warn!(
                        template_column = %header,
                        source = source.name(),
                        source_column,
                        "source column not in current header list, emitting blanks"
                    );
                }
                column
            })
            .collect();
        Some(columns)
    }
}

fn project(row: &Row, columns: &[Option<usize>]) -> Row {
    columns
        .iter()
        .map(|col| {
            col.and_then(|c| row.get(c).cloned())
                .unwrap_or(CellValue::Empty)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;

    fn workbook(name: &str, rows: &[&[&str]]) -> Workbook {
        let mut wb = XlsxWorkbook::new();
        let ws = wb.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    ws.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        Workbook::from_bytes(name, wb.save_to_buffer().unwrap()).unwrap()
    }

    fn template(headers: &[&str]) -> Workbook {
        let mut t = workbook("template.xlsx", &[headers]);
        t.select_header_row(0).unwrap();
        t
    }

    #[test]
    fn test_name_amount_scenario() {
        let template = template(&["Name", "Amount"]);
        let mut a = workbook(
            "A",
            &[&["Name", "Amount", "Date"], &["Alice", "100", "2024-01-01"]],
        );
        a.select_header_row(0).unwrap();

        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("A"), Some("Name"));
        registry.set_mapping("Amount", Some("A"), Some("Amount"));

        let merged = RowConcatenator::for_template(&template, &registry)
            .unwrap()
            .merge(&[a]);
        assert_eq!(
            merged.to_text_rows(),
            vec![vec!["Name", "Amount"], vec!["Alice", "100"]]
        );
    }

    #[test]
    fn test_header_with_trailing_space_resolves() {
        let template = template(&["Name"]);
        let mut a = workbook("A", &[&["Name "], &["Alice"]]);
        a.select_header_row(0).unwrap();

        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("A"), Some("Name "));

        let merged = RowConcatenator::for_template(&template, &registry)
            .unwrap()
            .merge(&[a]);
        assert_eq!(merged.body, vec![vec![CellValue::Text("Alice".to_string())]]);
    }

    #[test]
    fn test_template_without_headers_is_rejected() {
        let t = workbook("template.xlsx", &[&["Name"]]);
        let registry = MappingRegistry::new();
        assert!(matches!(
            RowConcatenator::for_template(&t, &registry),
            Err(MapperError::HeadersNotSelected(_))
        ));
    }

    #[test]
    fn test_row_count_is_sum_of_mapped_sources() {
        let template = template(&["Id", "Value"]);
        let mut a = workbook("a", &[&["title"], &["Id", "V"], &["1", "x"], &["2", "y"]]);
        a.select_header_row(1).unwrap();
        let mut b = workbook("b", &[&["Id"], &["3"], &["4"], &["5"]]);
        b.select_header_row(0).unwrap();
        let mut c = workbook("c", &[&["Id"], &["9"]]);
        c.select_header_row(0).unwrap();

        let mut registry = MappingRegistry::new();
        registry.set_mapping("Id", Some("a"), Some("Id"));
        registry.set_mapping("Value", Some("b"), Some("Id"));

        let merged = RowConcatenator::new(template.headers(), &registry).merge(&[a, b, c]);
        // a: 4 - 1 - 1 = 2 rows, b: 4 - 0 - 1 = 3 rows, c unmapped
        assert_eq!(merged.row_count(), 5);
        assert_eq!(merged.body[0][0].to_text(), "1");
        assert_eq!(merged.body[0][1], CellValue::Empty);
        assert_eq!(merged.body[2][0], CellValue::Empty);
        assert_eq!(merged.body[2][1].to_text(), "3");
        assert!(merged.body.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_unmapped_and_missing_columns_are_blank() {
        let template = template(&["Name", "Amount", "Notes"]);
        let mut a = workbook("a", &[&["Name", "Total"], &["Alice", "5"]]);
        a.select_header_row(0).unwrap();

        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("a"), Some("Name"));
        registry.set_mapping("Amount", Some("a"), Some("Amount"));

        let merged = RowConcatenator::new(template.headers(), &registry).merge(&[a]);
        assert_eq!(
            merged.body,
            vec![vec![
                CellValue::Text("Alice".to_string()),
                CellValue::Empty,
                CellValue::Empty
            ]]
        );
    }

    #[test]
    fn test_unknown_source_and_empty_registry() {
        let template = template(&["Name"]);
        let mut a = workbook("a", &[&["Name"], &["Alice"]]);
        a.select_header_row(0).unwrap();

        let empty = MappingRegistry::new();
        let merged = RowConcatenator::new(template.headers(), &empty).merge(&[a.clone()]);
        assert_eq!(merged.row_count(), 0);
        assert_eq!(merged.headers, vec!["Name"]);

        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("ghost.xlsx"), Some("Name"));
        let merged = RowConcatenator::new(template.headers(), &registry).merge(&[a]);
        assert_eq!(merged.row_count(), 0);
    }

    #[test]
    fn test_header_row_change_moves_data_start() {
        let template = template(&["Name"]);
        let mut a = workbook("a", &[&["Name"], &["Alice"], &["Bob"]]);
        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("a"), Some("Alice"));

        a.select_header_row(0).unwrap();
        a.select_header_row(1).unwrap();
        let merged = RowConcatenator::new(template.headers(), &registry).merge(&[a]);
        assert_eq!(merged.to_text_rows(), vec![vec!["Name"], vec!["Bob"]]);
    }

    #[test]
    fn test_merge_is_repeatable() {
        let template = template(&["Name"]);
        let mut a = workbook("a", &[&["Name"], &["Alice"], &["Bob"]]);
        a.select_header_row(0).unwrap();
        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("a"), Some("Name"));

        let sources = vec![a];
        let engine = RowConcatenator::new(template.headers(), &registry);
        assert_eq!(engine.merge(&sources), engine.merge(&sources));
    }
}
