//! Per-item metadata kept alongside the index.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use sonority_core::CatalogRecord;

/// Maps catalog ids to their standardized features and release year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    records: HashMap<u32, CatalogRecord>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: CatalogRecord) -> Option<CatalogRecord> {
        self.records.insert(record.id, record)
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&CatalogRecord> {
        self.records.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.records.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records sorted by id.
    #[must_use]
    pub fn to_sorted_records(&self) -> Vec<CatalogRecord> {
        let mut records: Vec<_> = self.records.values().copied().collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Smallest and largest release year, if any records exist.
    #[must_use]
    pub fn year_range(&self) -> Option<(u16, u16)> {
        let min = self.records.values().map(|r| r.year).min()?;
        let max = self.records.values().map(|r| r.year).max()?;
        Some((min, max))
    }

    /// Drop a record. Only used to simulate index/metadata drift in tests.
    #[cfg(test)]
    pub(crate) fn remove(&mut self, id: u32) -> Option<CatalogRecord> {
        self.records.remove(&id)
    }
}

impl FromIterator<CatalogRecord> for Metadata {
    fn from_iter<I: IntoIterator<Item = CatalogRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(|record| (record.id, record)).collect(),
        }
    }
}
