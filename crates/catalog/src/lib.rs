//! Schema catalog: schemas and the sequences they own.
//!
//! Primary lookups (`find_*`, `schema`, `sequence`) match names exactly.
//! Case-insensitive resolution is layered on top by [`resolve_with_fallback`]
//! so both behaviours stay observable on their own.

mod schema;
mod sequence;

pub use schema::Schema;
pub use sequence::{Sequence, SequenceId, SequenceOptions};

use std::{fs, path::Path, sync::Arc};

use ahash::RandomState;
use common::{DbError, DbResult, ObjectKind};
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub(crate) type Map<K, V> = HashMap<K, V, RandomState>;

/// Name of the schema every catalog starts with.
pub const DEFAULT_SCHEMA: &str = "PUBLIC";

/// Catalog shared by every session of a database.
pub type SharedCatalog = Arc<RwLock<Catalog>>;

/// Read access to a [`SharedCatalog`].
pub type CatalogGuard<'a> = RwLockReadGuard<'a, Catalog>;

/// Look `name` up exactly, then upper-cased.
///
/// Returns the found object, or the last name tried when neither matches.
pub fn resolve_with_fallback<T>(
    name: &str,
    mut find: impl FnMut(&str) -> Option<T>,
) -> Result<T, String> {
    if let Some(found) = find(name) {
        return Ok(found);
    }
    let upper = name.to_uppercase();
    if upper != name {
        if let Some(found) = find(&upper) {
            debug!(name, resolved = %upper, "resolved via upper-case fallback");
            return Ok(found);
        }
    }
    Err(upper)
}

/// Persistent catalog that stores schemas and their sequences.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    schemas: Vec<Schema>,
    next_sequence_id: u64,
    #[serde(skip)]
    #[serde(default)]
    schema_name_index: Map<String, usize>,
}

impl Catalog {
    /// Create a catalog holding only the default schema.
    pub fn new() -> Self {
        let mut catalog = Self {
            schemas: vec![Schema::new(DEFAULT_SCHEMA.to_string())],
            next_sequence_id: 1,
            schema_name_index: Map::default(),
        };
        catalog.rebuild_indexes();
        catalog
    }

    /// Wrap the catalog for sharing between sessions.
    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    /// Load a catalog from disk, returning a fresh catalog if the file does not exist.
    pub fn load(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)?;
        let mut catalog: Catalog = serde_json::from_str(&data)
            .map_err(|err| DbError::Catalog(format!("invalid catalog file: {err}")))?;
        catalog.rebuild_indexes();
        debug!(path = %path.display(), schemas = catalog.schemas.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Persist the catalog contents as pretty JSON.
    pub fn save(&self, path: &Path) -> DbResult<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| DbError::Catalog(format!("serialize failed: {err}")))?;
        fs::write(path, data)?;
        debug!(path = %path.display(), "catalog saved");
        Ok(())
    }

    /// Exact-name schema lookup.
    pub fn find_schema(&self, name: &str) -> Option<&Schema> {
        let idx = self.schema_name_index.get(name).copied()?;
        self.schemas.get(idx)
    }

    /// Exact-name schema lookup that fails when the schema does not exist.
    pub fn schema(&self, name: &str) -> DbResult<&Schema> {
        self.find_schema(name)
            .ok_or_else(|| DbError::not_found(ObjectKind::Schema, name))
    }

    /// Exact-name schema lookup, retried with the name upper-cased.
    pub fn resolve_schema(&self, name: &str) -> DbResult<&Schema> {
        resolve_with_fallback(name, |candidate| self.find_schema(candidate))
            .map_err(|tried| DbError::not_found(ObjectKind::Schema, tried))
    }

    fn schema_mut(&mut self, name: &str) -> DbResult<&mut Schema> {
        let idx = self
            .schema_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::not_found(ObjectKind::Schema, name))?;
        self.schemas
            .get_mut(idx)
            .ok_or_else(|| DbError::not_found(ObjectKind::Schema, name))
    }

    /// Immutable iterator over all schemas.
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.iter()
    }

    pub fn create_schema(&mut self, name: &str) -> DbResult<()> {
        if self.schema_name_index.contains_key(name) {
            return Err(DbError::Catalog(format!("schema '{name}' already exists")));
        }
        self.schemas.push(Schema::new(name.to_string()));
        self.rebuild_indexes();
        Ok(())
    }

    /// Remove a schema. Without `cascade` the schema must not own sequences.
    pub fn drop_schema(&mut self, name: &str, cascade: bool) -> DbResult<()> {
        if name == DEFAULT_SCHEMA {
            return Err(DbError::Catalog(format!(
                "schema '{DEFAULT_SCHEMA}' cannot be dropped"
            )));
        }
        let schema = self.schema(name)?;
        if !cascade && !schema.is_empty() {
            return Err(DbError::Catalog(format!(
                "schema '{name}' still contains sequences"
            )));
        }
        self.schemas.retain(|schema| schema.name != name);
        self.rebuild_indexes();
        Ok(())
    }

    /// Create a sequence in an existing schema, returning its identifier.
    pub fn create_sequence(
        &mut self,
        schema_name: &str,
        name: &str,
        options: SequenceOptions,
    ) -> DbResult<SequenceId> {
        let id = SequenceId(self.next_sequence_id);
        let sequence = Sequence::new(id, schema_name.to_string(), name.to_string(), options)?;
        self.schema_mut(schema_name)?.add_sequence(sequence)?;
        self.next_sequence_id += 1;
        Ok(id)
    }

    pub fn drop_sequence(&mut self, schema_name: &str, name: &str) -> DbResult<()> {
        self.schema_mut(schema_name)?.remove_sequence(name)?;
        Ok(())
    }

    fn rebuild_indexes(&mut self) {
        self.schema_name_index.clear();
        for (idx, schema) in self.schemas.iter_mut().enumerate() {
            self.schema_name_index.insert(schema.name.clone(), idx);
            schema.rebuild_lookup();
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
