//! Client-side mapping session.
//!
//! Holds the template workbook, the source workbooks in upload order and the
//! mapping registry. Files may be read concurrently; each finished upload is
//! appended under the session lock, at the position of its submission ordinal,
//! so completions arriving out of order never drop or reorder a workbook.

use crate::core::RowConcatenator;
use crate::error::{MapperError, MapperResult};
use crate::excel::{ExcelExporter, ExcelImporter};
use crate::mapping::MappingRegistry;
use crate::types::MergedTable;
use crate::workbook::Workbook;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub type SharedSession = Arc<Mutex<MappingSession>>;

/// Role a workbook took when it was added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookRole {
    Template,
    Source,
}

#[derive(Debug, Default)]
pub struct MappingSession {
    template: Option<Workbook>,
    /// Sources with the ordinal they were submitted under
    sources: Vec<(u64, Workbook)>,
    next_ordinal: u64,
    pub registry: MappingRegistry,
}

impl MappingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// The first workbook becomes the template, later ones are sources
    pub fn add_workbook(&mut self, workbook: Workbook) -> WorkbookRole {
        if self.template.is_none() {
            self.set_template(workbook);
            WorkbookRole::Template
        } else {
            let ordinal = self.reserve_ordinal();
            self.insert_source(ordinal, workbook);
            WorkbookRole::Source
        }
    }

    pub fn set_template(&mut self, workbook: Workbook) {
        info!(template = workbook.name(), "template set");
        self.template = Some(workbook);
    }

    /// Claim the next upload position before the file has been read
    pub fn reserve_ordinal(&mut self) -> u64 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }

    /// Insert a source at the position given by its ordinal
    pub fn insert_source(&mut self, ordinal: u64, workbook: Workbook) {
        let at = self.sources.partition_point(|(o, _)| *o < ordinal);
        debug!(source = workbook.name(), ordinal, position = at, "source added");
        self.sources.insert(at, (ordinal, workbook));
    }

    pub fn template(&self) -> Option<&Workbook> {
        self.template.as_ref()
    }

    pub fn template_mut(&mut self) -> Option<&mut Workbook> {
        self.template.as_mut()
    }

    pub fn sources(&self) -> Vec<&Workbook> {
        self.sources.iter().map(|(_, w)| w).collect()
    }

    /// First source with this name
    pub fn source_mut(&mut self, name: &str) -> Option<&mut Workbook> {
        self.sources
            .iter_mut()
            .map(|(_, w)| w)
            .find(|w| w.name() == name)
    }

    /// Unresolvable mappings, for display next to the preview
    pub fn diagnostics(&self) -> Vec<MapperError> {
        self.registry.diagnose(self.sources.iter().map(|(_, w)| w))
    }

    /// Row-concatenation merge over the current state
    pub fn preview(&self) -> MapperResult<MergedTable> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| MapperError::NotFound("template workbook".to_string()))?;
        let engine = RowConcatenator::for_template(template, &self.registry)?;
        Ok(engine.merge(self.sources.iter().map(|(_, w)| w)))
    }

    /// Serialized preview, ready to save as `mapped_data.xlsx`
    pub fn export_bytes(&self) -> MapperResult<Vec<u8>> {
        let table = self.preview()?;
        ExcelExporter::new(&table).to_bytes()
    }
}

/// Read and parse workbook files concurrently, adding each to the session.
///
/// Roles follow `add_workbook`: when the session has no template yet, the
/// first path becomes the template and the rest are sources. Every file is
/// read by its own task. Ordinals are reserved up front so the final source
/// order matches `paths` however the reads complete. The first failure is
/// returned after all tasks have finished; successful uploads stay in the
/// session.
pub async fn ingest_workbooks(session: &SharedSession, paths: Vec<PathBuf>) -> MapperResult<usize> {
    let mut handles = Vec::with_capacity(paths.len());
    let mut template_open = session.lock().await.template().is_none();
    for path in paths {
        let role = if template_open {
            template_open = false;
            None
        } else {
            Some(session.lock().await.reserve_ordinal())
        };
        let session = Arc::clone(session);
        handles.push(tokio::spawn(async move {
            let bytes = tokio::fs::read(&path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let workbook = ExcelImporter::new(name, bytes).import()?;
            let mut session = session.lock().await;
            match role {
                Some(ordinal) => session.insert_source(ordinal, workbook),
                None => session.set_template(workbook),
            }
            Ok::<(), MapperError>(())
        }));
    }

    let mut added = 0;
    let mut first_error = None;
    for handle in handles {
        let result = handle
            .await
            .map_err(|e| MapperError::Io(std::io::Error::other(e.to_string())))
            .and_then(|r| r);
        match result {
            Ok(()) => added += 1,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(added),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;

    fn bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut wb = XlsxWorkbook::new();
        let ws = wb.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                ws.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
        wb.save_to_buffer().unwrap()
    }

    fn workbook(name: &str, rows: &[&[&str]]) -> Workbook {
        Workbook::from_bytes(name, bytes(rows)).unwrap()
    }

    #[test]
    fn test_first_workbook_is_template() {
        let mut session = MappingSession::new();
        assert_eq!(
            session.add_workbook(workbook("t.xlsx", &[&["Name"]])),
            WorkbookRole::Template
        );
        assert_eq!(
            session.add_workbook(workbook("a.xlsx", &[&["Name"]])),
            WorkbookRole::Source
        );
        assert_eq!(session.template().unwrap().name(), "t.xlsx");
        assert_eq!(session.sources().len(), 1);
    }

    #[test]
    fn test_out_of_order_inserts_keep_ordinal_order() {
        let mut session = MappingSession::new();
        let first = session.reserve_ordinal();
        let second = session.reserve_ordinal();
        session.insert_source(second, workbook("b.xlsx", &[&["x"]]));
        session.insert_source(first, workbook("a.xlsx", &[&["x"]]));
        let names: Vec<&str> = session.sources().iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["a.xlsx", "b.xlsx"]);
    }

    #[test]
    fn test_preview_requires_template_headers() {
        let mut session = MappingSession::new();
        assert!(matches!(session.preview(), Err(MapperError::NotFound(_))));
        session.add_workbook(workbook("t.xlsx", &[&["Name"]]));
        assert!(matches!(
            session.preview(),
            Err(MapperError::HeadersNotSelected(_))
        ));
    }

    #[test]
    fn test_preview_and_export() {
        let mut session = MappingSession::new();
        session.add_workbook(workbook("t.xlsx", &[&["Name", "Amount"]]));
        session.add_workbook(workbook(
            "A",
            &[&["Name", "Amount", "Date"], &["Alice", "100", "2024-01-01"]],
        ));
        session.template_mut().unwrap().select_header_row(0).unwrap();
        session.source_mut("A").unwrap().select_header_row(0).unwrap();
        session.registry.set_mapping("Name", Some("A"), Some("Name"));
        session.registry.set_mapping("Amount", Some("A"), Some("Amount"));

        let preview = session.preview().unwrap();
        assert_eq!(
            preview.to_text_rows(),
            vec![vec!["Name", "Amount"], vec!["Alice", "100"]]
        );
        assert!(session.diagnostics().is_empty());

        let exported = session.export_bytes().unwrap();
        let mut back = Workbook::from_bytes("mapped_data.xlsx", exported).unwrap();
        back.select_header_row(0).unwrap();
        assert_eq!(back.headers(), ["Name", "Amount"]);
    }

    #[tokio::test]
    async fn test_ingest_sources_concurrently() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut paths = Vec::new();
        for name in ["one.xlsx", "two.xlsx", "three.xlsx"] {
            let path = dir.path().join(name);
            std::fs::write(&path, bytes(&[&["Id"], &[name]])).unwrap();
            paths.push(path);
        }

        let mut session = MappingSession::new();
        session.set_template(workbook("t.xlsx", &[&["Id"]]));
        let session = session.shared();
        let added = ingest_workbooks(&session, paths).await.unwrap();
        assert_eq!(added, 3);

        let guard = session.lock().await;
        let names: Vec<&str> = guard.sources().iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["one.xlsx", "two.xlsx", "three.xlsx"]);
        assert_eq!(guard.template().unwrap().name(), "t.xlsx");
    }

    #[tokio::test]
    async fn test_ingest_first_path_becomes_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut paths = Vec::new();
        for name in ["template.xlsx", "a.xlsx", "b.xlsx"] {
            let path = dir.path().join(name);
            std::fs::write(&path, bytes(&[&["Id"], &[name]])).unwrap();
            paths.push(path);
        }

        let session = MappingSession::new().shared();
        assert_eq!(ingest_workbooks(&session, paths).await.unwrap(), 3);

        let guard = session.lock().await;
        assert_eq!(guard.template().unwrap().name(), "template.xlsx");
        let names: Vec<&str> = guard.sources().iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["a.xlsx", "b.xlsx"]);
    }

    #[tokio::test]
    async fn test_ingest_reports_bad_file_but_keeps_good_ones() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.xlsx");
        let bad = dir.path().join("bad.xlsx");
        std::fs::write(&good, bytes(&[&["Id"]])).unwrap();
        std::fs::write(&bad, b"").unwrap();

        let mut session = MappingSession::new();
        session.set_template(workbook("t.xlsx", &[&["Id"]]));
        let session = session.shared();
        let result = ingest_workbooks(&session, vec![bad, good]).await;
        assert!(matches!(result, Err(MapperError::Parse(_))));
        assert_eq!(session.lock().await.sources().len(), 1);
    }
}
