use crate::mapping::{ColumnMapping, MappingRegistry};
use crate::types::{MergedTable, RecordTable};
use tracing::{debug, warn};

/// Number of rows returned by a mapping preview
pub const PREVIEW_ROWS: usize = 5;

/// Keyed lookup merge over the template's own rows.
///
/// For each template row and mapping, the first source row whose
/// `source_column` equals the row's current `template_column` value replaces
/// that cell. Unmatched cells are left as they were, so the output always has
/// exactly the template's row count.
///
/// The join key and the overwritten column are the same field, which means a
/// match only ever rewrites a cell with an equal value. This mirrors the
/// download behaviour clients already rely on.
pub struct KeyedLookup<'a> {
    registry: &'a MappingRegistry,
    sources: &'a [RecordTable],
}

/// A mapping resolved to column positions
struct ResolvedMapping<'a> {
    template_index: usize,
    source: &'a RecordTable,
    source_index: usize,
}

impl<'a> KeyedLookup<'a> {
    #[must_use]
    pub fn new(registry: &'a MappingRegistry, sources: &'a [RecordTable]) -> Self {
        Self { registry, sources }
    }

    pub fn merge(&self, template: &RecordTable) -> MergedTable {
        let resolved: Vec<ResolvedMapping<'a>> = self
            .registry
            .iter()
            .filter_map(|m| self.resolve(template, m))
            .collect();

        let mut table = MergedTable::new(template.headers.clone());
        let mut replaced = 0usize;

        for row in &template.rows {
            let mut out = row.clone();
            for r in &resolved {
                let Some(key) = row.get(r.template_index) else {
                    continue;
                };
                let matched = r
                    .source
                    .rows
                    .iter()
                    .find_map(|src| src.get(r.source_index).filter(|v| *v == key));
                if let Some(value) = matched {
                    out[r.template_index] = value.clone();
                    replaced += 1;
                }
            }
            table.push_row(out);
        }

        debug!(
            template = %template.name,
            rows = table.row_count(),
            mappings = resolved.len(),
            replaced,
            "keyed lookup complete"
        );
        table
    }

    /// Preview: the first [`PREVIEW_ROWS`] rows of [`merge`](Self::merge)
    pub fn preview(&self, template: &RecordTable) -> MergedTable {
        self.merge(template).head(PREVIEW_ROWS)
    }

    fn resolve(&self, template: &RecordTable, m: &ColumnMapping) -> Option<ResolvedMapping<'a>> {
        let (file, column) = (m.source_file.as_deref()?, m.source_column.as_deref()?);

        let Some(template_index) = template.column_index(&m.template_column) else {
            warn!(
                template_column = %m.template_column,
                "mapping targets a column that is not a template header"
            );
            return None;
        };
        let Some(source) = self.sources.iter().find(|s| s.name == file) else {
            warn!(source_file = file, "mapping names an unknown source file");
            return None;
        };
        let Some(source_index) = source.column_index(column) else {
            warn!(
                source_file = file,
                source_column = column,
                "source column not found, template values left unchanged"
            );
            return None;
        };

        Some(ResolvedMapping {
            template_index,
            source,
            source_index,
        })
    }
}
