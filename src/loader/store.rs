use std::collections::BTreeMap;

use super::events::FileId;
use crate::handle::Payload;

/// Finished payloads keyed by `(kind, key)`. Nothing is ever evicted.
#[derive(Debug, Clone, Default)]
pub struct PayloadStore {
    entries: BTreeMap<FileId, Payload>,
}

impl PayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload previously stored under `file`, if any
    pub fn insert(&mut self, file: FileId, payload: Payload) -> Option<Payload> {
        self.entries.insert(file, payload)
    }

    pub fn get(&self, kind: &str, key: &str) -> Option<&Payload> {
        self.entries.get(&FileId::new(kind, key))
    }

    pub fn contains(&self, kind: &str, key: &str) -> bool {
        self.get(kind, key).is_some()
    }

    pub fn remove(&mut self, kind: &str, key: &str) -> Option<Payload> {
        self.entries.remove(&FileId::new(kind, key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FileId, &Payload)> {
        self.entries.iter()
    }
}
