//! Keyed holding area for uploaded templates and source files.
//!
//! The server keeps two independent stores. Records live as long as the
//! process; nothing expires. Stores carry no locking of their own, the caller
//! wraps them (see `api::server::AppState`).

use crate::error::{MapperError, MapperResult};
use crate::excel::ExcelImporter;
use crate::types::RecordTable;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// One uploaded file, parsed as header-keyed records
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub table: RecordTable,
}

impl SessionRecord {
    /// Parse an upload and give it a fresh identifier
    pub fn from_upload(name: impl Into<String>, bytes: Vec<u8>) -> MapperResult<Self> {
        let table = ExcelImporter::new(name, bytes).import_records()?;
        Ok(Self {
            id: Uuid::new_v4(),
            table,
        })
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn headers(&self) -> &[String] {
        &self.table.headers
    }
}

/// Storage accessors used by the HTTP handlers
pub trait RecordStore: Send + Sync {
    fn get(&self, id: &Uuid) -> Option<&SessionRecord>;

    fn put(&mut self, record: SessionRecord);

    fn delete(&mut self, id: &Uuid) -> Option<SessionRecord>;

    /// First record with this original file name, in insertion order
    fn find_by_name(&self, name: &str) -> Option<&SessionRecord>;

    /// Every record, in insertion order
    fn records(&self) -> Vec<&SessionRecord>;

    fn len(&self) -> usize {
        self.records().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require(&self, id: &Uuid) -> MapperResult<&SessionRecord> {
        self.get(id)
            .ok_or_else(|| MapperError::NotFound(format!("record {}", id)))
    }
}

/// In-memory store keeping insertion order for name lookups
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<Uuid, SessionRecord>,
    order: Vec<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: &Uuid) -> Option<&SessionRecord> {
        self.records.get(id)
    }

    fn put(&mut self, record: SessionRecord) {
        if !self.records.contains_key(&record.id) {
            self.order.push(record.id);
        }
        self.records.insert(record.id, record);
    }

    fn delete(&mut self, id: &Uuid) -> Option<SessionRecord> {
        self.order.retain(|o| o != id);
        self.records.remove(id)
    }

    fn find_by_name(&self, name: &str) -> Option<&SessionRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .find(|r| r.name() == name)
    }

    fn records(&self) -> Vec<&SessionRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Summary of a stored record for listings
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    pub id: Uuid,
    pub name: String,
    pub headers: Vec<String>,
    pub rows: usize,
}

impl From<&SessionRecord> for RecordSummary {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id,
            name: record.name().to_string(),
            headers: record.headers().to_vec(),
            rows: record.table.row_count(),
        }
    }
}
