use std::sync::Arc;

use common::{DbError, DbResult, ObjectKind};
use serde::{Deserialize, Serialize};

use crate::{Map, Sequence, resolve_with_fallback};

/// A named namespace of sequences.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    sequences: Vec<Arc<Sequence>>,
    #[serde(skip)]
    #[serde(default)]
    sequence_lookup: Map<String, usize>,
}

impl Schema {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            sequences: Vec::new(),
            sequence_lookup: Map::default(),
        }
    }

    /// Exact-name lookup.
    pub fn find_sequence(&self, name: &str) -> Option<&Arc<Sequence>> {
        let idx = self.sequence_lookup.get(name).copied()?;
        self.sequences.get(idx)
    }

    /// Exact-name lookup that fails when the sequence does not exist.
    pub fn sequence(&self, name: &str) -> DbResult<&Arc<Sequence>> {
        self.find_sequence(name)
            .ok_or_else(|| DbError::not_found(ObjectKind::Sequence, name))
    }

    /// Exact-name lookup, retried with the name upper-cased.
    pub fn resolve_sequence(&self, name: &str) -> DbResult<&Arc<Sequence>> {
        resolve_with_fallback(name, |candidate| self.find_sequence(candidate))
            .map_err(|tried| DbError::not_found(ObjectKind::Sequence, tried))
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.sequences.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub(crate) fn add_sequence(&mut self, sequence: Sequence) -> DbResult<()> {
        if self.sequence_lookup.contains_key(sequence.name()) {
            return Err(DbError::Catalog(format!(
                "sequence '{}' already exists in schema '{}'",
                sequence.name(),
                self.name
            )));
        }
        self.sequences.push(Arc::new(sequence));
        self.rebuild_lookup();
        Ok(())
    }

    pub(crate) fn remove_sequence(&mut self, name: &str) -> DbResult<Arc<Sequence>> {
        let idx = self
            .sequence_lookup
            .get(name)
            .copied()
            .ok_or_else(|| DbError::not_found(ObjectKind::Sequence, name))?;
        let removed = self.sequences.remove(idx);
        self.rebuild_lookup();
        Ok(removed)
    }

    pub(crate) fn rebuild_lookup(&mut self) {
        self.sequence_lookup.clear();
        for (idx, sequence) in self.sequences.iter().enumerate() {
            self.sequence_lookup.insert(sequence.name().to_string(), idx);
        }
    }
}
