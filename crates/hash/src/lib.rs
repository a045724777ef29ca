//! Non-unique hash index.
//!
//! Maps a key tuple to every row position holding that key, in insertion
//! order. Only equality probes are supported; a probe hands its match set to a
//! [`NonUniqueHashCursor`] which fetches rows from the row store on demand.

mod cursor;

pub use cursor::NonUniqueHashCursor;

use ahash::RandomState;
use common::{ColumnId, DbError, DbResult, RecordId, Row};
use hashbrown::HashMap;
use storage::RowStore;
use tracing::debug;
use types::Value;

type Buckets = HashMap<Vec<Value>, Vec<RecordId>, RandomState>;

/// In-memory hash index allowing duplicate keys.
#[derive(Debug)]
pub struct NonUniqueHashIndex {
    name: String,
    /// Column ordinals that form the key, in key order.
    columns: Vec<ColumnId>,
    buckets: Buckets,
    row_count: usize,
}

impl NonUniqueHashIndex {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnId>) -> DbResult<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(DbError::Catalog(format!(
                "hash index '{name}' must reference at least one column"
            )));
        }
        Ok(Self {
            name,
            columns,
            buckets: Buckets::default(),
            row_count: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    /// Number of indexed rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Index a stored row. The row must carry its position.
    pub fn add(&mut self, row: &Row) -> DbResult<()> {
        let rid = self.position_of(row)?;
        let key = self.extract_key(row)?;
        self.buckets.entry(key).or_default().push(rid);
        self.row_count += 1;
        Ok(())
    }

    /// Remove a row's entry. Returns `false` if the row was not indexed.
    pub fn remove(&mut self, row: &Row) -> DbResult<bool> {
        let rid = self.position_of(row)?;
        let key = self.extract_key(row)?;
        let Some(positions) = self.buckets.get_mut(&key) else {
            return Ok(false);
        };
        let Some(at) = positions.iter().position(|p| *p == rid) else {
            return Ok(false);
        };
        positions.remove(at);
        if positions.is_empty() {
            self.buckets.remove(&key);
        }
        self.row_count -= 1;
        Ok(true)
    }

    /// Positions stored under `key`, `None` if the key was never indexed.
    pub fn find(&self, key: &[Value]) -> Option<&[RecordId]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Open a cursor over the rows matching `key`.
    ///
    /// A key containing NULL matches nothing, as equality with NULL is never
    /// true.
    pub fn cursor<'a, S: RowStore + ?Sized>(
        &self,
        store: &'a S,
        key: &[Value],
    ) -> NonUniqueHashCursor<'a, S> {
        let positions = if key.iter().any(Value::is_null) {
            None
        } else {
            self.find(key).map(<[RecordId]>::to_vec)
        };
        debug!(
            index = %self.name,
            matches = positions.as_ref().map_or(0, Vec::len),
            "hash index probe"
        );
        NonUniqueHashCursor::new(store, positions)
    }

    /// Drop every entry.
    pub fn truncate(&mut self) {
        self.buckets.clear();
        self.row_count = 0;
    }

    /// Extract key values from a row based on the configured columns.
    pub fn extract_key(&self, row: &Row) -> DbResult<Vec<Value>> {
        self.columns
            .iter()
            .map(|&col| {
                row.values.get(usize::from(col)).cloned().ok_or_else(|| {
                    DbError::Executor(format!(
                        "index column {} out of bounds (row has {} columns)",
                        col,
                        row.values.len()
                    ))
                })
            })
            .collect()
    }

    fn position_of(&self, row: &Row) -> DbResult<RecordId> {
        row.rid().ok_or_else(|| {
            DbError::Executor(format!(
                "row indexed by '{}' has no storage position",
                self.name
            ))
        })
    }
}
