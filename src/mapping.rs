//! Column mappings: template column → (source file, source column)

use crate::error::MapperError;
use crate::workbook::Workbook;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Sentinel the mapping form sends for "no selection"
const NONE_SENTINEL: &str = "none";

/// One template column and where its values come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub template_column: String,
    #[serde(default, deserialize_with = "unset_as_none")]
    pub source_file: Option<String>,
    #[serde(default, deserialize_with = "unset_as_none")]
    pub source_column: Option<String>,
}

impl ColumnMapping {
    pub fn new(template_column: impl Into<String>) -> Self {
        Self {
            template_column: template_column.into(),
            source_file: None,
            source_column: None,
        }
    }

    /// Mapping with "none" and blank selections normalized to unset
    pub fn with_source(
        template_column: impl Into<String>,
        source_file: Option<&str>,
        source_column: Option<&str>,
    ) -> Self {
        Self {
            template_column: template_column.into(),
            source_file: normalize(source_file),
            source_column: normalize(source_column),
        }
    }

    /// Both the source file and the source column are chosen
    pub fn is_active(&self) -> bool {
        self.source_file.is_some() && self.source_column.is_some()
    }
}

/// Blank and "none" read as unset; anything else is kept verbatim
fn normalize(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty() && *v != NONE_SENTINEL)
        .map(str::to_string)
}

fn unset_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(normalize(value.as_deref()))
}

/// Ordered set of mappings, at most one per template column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRegistry {
    entries: Vec<ColumnMapping>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, later entries for the same template column winning
    pub fn from_mappings<I>(mappings: I) -> Self
    where
        I: IntoIterator<Item = ColumnMapping>,
    {
        let mut registry = Self::new();
        for m in mappings {
            registry.set_mapping(
                &m.template_column,
                m.source_file.as_deref(),
                m.source_column.as_deref(),
            );
        }
        registry
    }

    fn entry_mut(&mut self, template_column: &str) -> &mut ColumnMapping {
        let index = match self
            .entries
            .iter()
            .position(|m| m.template_column == template_column)
        {
            Some(i) => i,
            None => {
                self.entries.push(ColumnMapping::new(template_column));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    /// Point a template column at a source file.
    ///
    /// Changing the file unsets the source column.
    pub fn set_source_file(&mut self, template_column: &str, source_file: Option<&str>) {
        let source_file = normalize(source_file);
        let entry = self.entry_mut(template_column);
        if entry.source_file != source_file {
            entry.source_column = None;
        }
        entry.source_file = source_file;
    }

    pub fn set_source_column(&mut self, template_column: &str, source_column: Option<&str>) {
        let source_column = normalize(source_column);
        self.entry_mut(template_column).source_column = source_column;
    }

    /// Upsert the whole mapping for a template column
    pub fn set_mapping(
        &mut self,
        template_column: &str,
        source_file: Option<&str>,
        source_column: Option<&str>,
    ) {
        self.set_source_file(template_column, source_file);
        self.set_source_column(template_column, source_column);
        debug!(
            template_column,
            source_file = ?source_file,
            source_column = ?source_column,
            "mapping set"
        );
    }

    pub fn clear_mapping(&mut self, template_column: &str) -> Option<ColumnMapping> {
        let index = self
            .entries
            .iter()
            .position(|m| m.template_column == template_column)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, template_column: &str) -> Option<&ColumnMapping> {
        self.entries
            .iter()
            .find(|m| m.template_column == template_column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every mapping that reads from `source_file`
    pub fn mappings_for_source(&self, source_file: &str) -> Vec<&ColumnMapping> {
        self.entries
            .iter()
            .filter(|m| m.source_file.as_deref() == Some(source_file))
            .collect()
    }

    /// Mappings from `source_file` that also have a source column chosen
    pub fn active_for_source(&self, source_file: &str) -> Vec<&ColumnMapping> {
        self.mappings_for_source(source_file)
            .into_iter()
            .filter(|m| m.source_column.is_some())
            .collect()
    }

    /// Explain every mapping that will contribute blank cells.
    ///
    /// Unset mappings are not reported; they are simply inactive.
    pub fn diagnose<'w, I>(&self, sources: I) -> Vec<MapperError>
    where
        I: IntoIterator<Item = &'w Workbook>,
    {
        let sources: Vec<&Workbook> = sources.into_iter().collect();
        let mut problems = Vec::new();
        for m in self.entries.iter().filter(|m| m.is_active()) {
            let (Some(file), Some(column)) = (&m.source_file, &m.source_column) else {
                continue;
            };
            let reason = match sources.iter().find(|w| w.name() == file.as_str()) {
                None => format!("unknown source file '{}'", file),
                Some(wb) if wb.column_of(column).is_none() => format!(
                    "column '{}' is not a header of '{}' (sheet '{}', row {})",
                    column,
                    file,
                    wb.selected_sheet(),
                    wb.header_row()
                ),
                Some(_) => continue,
            };
            problems.push(MapperError::MissingMappingTarget {
                template_column: m.template_column.clone(),
                reason,
            });
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_mapping_overwrites() {
        let mut registry = MappingRegistry::new();
        registry.set_mapping("Amount", Some("a.xlsx"), Some("Total"));
        registry.set_mapping("Amount", Some("b.xlsx"), Some("Sum"));

        assert_eq!(registry.len(), 1);
        let m = registry.get("Amount").unwrap();
        assert_eq!(m.source_file.as_deref(), Some("b.xlsx"));
        assert_eq!(m.source_column.as_deref(), Some("Sum"));
    }

    #[test]
    fn test_changing_file_resets_column() {
        let mut registry = MappingRegistry::new();
        registry.set_mapping("Amount", Some("a.xlsx"), Some("Total"));
        registry.set_source_file("Amount", Some("b.xlsx"));
        assert_eq!(registry.get("Amount").unwrap().source_column, None);

        registry.set_source_column("Amount", Some("Sum"));
        registry.set_source_file("Amount", Some("b.xlsx"));
        assert_eq!(
            registry.get("Amount").unwrap().source_column.as_deref(),
            Some("Sum")
        );
    }

    #[test]
    fn test_none_sentinel_is_unset() {
        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("a.xlsx"), Some("none"));
        assert!(!registry.get("Name").unwrap().is_active());
        assert!(registry.active_for_source("a.xlsx").is_empty());
        assert_eq!(registry.mappings_for_source("a.xlsx").len(), 1);
    }

    #[test]
    fn test_names_kept_verbatim() {
        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("a.xlsx"), Some("Name "));
        registry.set_mapping("Amount", Some("a.xlsx"), Some("   "));

        let name = registry.get("Name").unwrap();
        assert_eq!(name.source_column.as_deref(), Some("Name "));
        assert!(name.is_active());
        assert_eq!(registry.get("Amount").unwrap().source_column, None);
    }

    #[test]
    fn test_clear_mapping() {
        let mut registry = MappingRegistry::new();
        registry.set_mapping("Name", Some("a.xlsx"), Some("Name"));
        assert!(registry.clear_mapping("Name").is_some());
        assert!(registry.clear_mapping("Name").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_order_is_first_insertion() {
        let mut registry = MappingRegistry::new();
        registry.set_mapping("A", Some("x"), Some("1"));
        registry.set_mapping("B", Some("x"), Some("2"));
        registry.set_mapping("A", Some("y"), Some("3"));
        let order: Vec<&str> = registry.iter().map(|m| m.template_column.as_str()).collect();
        assert_eq!(order, vec!["A", "B"]);
        assert_eq!(registry.mappings_for_source("x").len(), 1);
    }

    #[test]
    fn test_wire_format() {
        let json = r#"[
            {"templateColumn": "Name", "sourceColumn": "Client", "sourceFile": "a.xlsx"},
            {"templateColumn": "Amount", "sourceColumn": "", "sourceFile": "none"},
            {"templateColumn": "Name", "sourceColumn": "Customer", "sourceFile": "b.xlsx"}
        ]"#;
        let mappings: Vec<ColumnMapping> = serde_json::from_str(json).unwrap();
        assert_eq!(mappings[1].source_file, None);
        assert_eq!(mappings[1].source_column, None);

        let registry = MappingRegistry::from_mappings(mappings);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("Name").unwrap().source_column.as_deref(),
            Some("Customer")
        );

        let out = serde_json::to_string(registry.get("Name").unwrap()).unwrap();
        assert!(out.contains("\"templateColumn\":\"Name\""));
        assert!(out.contains("\"sourceFile\":\"b.xlsx\""));
    }
}
