//! Ordered seed data: model name to documents.

use docstore::Document;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Documents to insert, grouped by model.
///
/// Models keep the order in which they were first added, and documents keep
/// their order within a model. Deserialized data keeps the key order of its
/// source, whether JSON text or a `serde_json::Value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedData {
    entries: IndexMap<String, Vec<Document>>,
}

impl SeedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(
        mut self,
        name: impl Into<String>,
        documents: impl IntoIterator<Item = Document>,
    ) -> Self {
        self.push(name, documents);
        self
    }

    /// Adds documents for a model. Documents for a model that is already
    /// present are appended to its entry, which keeps its position.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        documents: impl IntoIterator<Item = Document>,
    ) {
        self.entries
            .entry(name.into())
            .or_default()
            .extend(documents);
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Document])> {
        self.entries
            .iter()
            .map(|(name, documents)| (name.as_str(), documents.as_slice()))
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of documents across all models.
    pub fn document_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl<N: Into<String>> FromIterator<(N, Vec<Document>)> for SeedData {
    fn from_iter<I: IntoIterator<Item = (N, Vec<Document>)>>(iter: I) -> Self {
        let mut data = SeedData::new();
        for (name, documents) in iter {
            data.push(name, documents);
        }
        data
    }
}
