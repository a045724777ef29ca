//! Row store: maps a stable [`RecordId`] to row contents.

use common::{DbError, DbResult, PageId, RecordId, Row};
use tracing::trace;
use types::Value;

/// Slots per logical page of a [`MemTable`].
pub const SLOTS_PER_PAGE: usize = 128;

/// Read side of a row store.
///
/// A position is either resolvable to a live row or the lookup fails; a row
/// store never silently substitutes another row. Lookups take no session;
/// a store with per-session visibility carries that state itself.
pub trait RowStore {
    /// Materialize the row at `position`, with its `rid` set.
    fn row(&self, position: RecordId) -> DbResult<Row>;
}

impl<S: RowStore + ?Sized> RowStore for &S {
    fn row(&self, position: RecordId) -> DbResult<Row> {
        (**self).row(position)
    }
}

/// Bidirectional cursor over the rows an index lookup produced.
///
/// A fresh cursor sits before the first row. Running off either end is a
/// normal outcome reported by `false`, not an error.
pub trait Cursor {
    /// Row under the cursor, `None` when the cursor is not on a row.
    fn get(&self) -> DbResult<Option<Row>>;

    /// Row usable for key comparison. May be cheaper than [`Cursor::get`]
    /// for indexes that keep key snapshots.
    fn search_row(&self) -> DbResult<Option<Row>> {
        self.get()
    }

    fn next(&mut self) -> bool;

    fn previous(&mut self) -> bool;
}

/// In-memory slotted table.
///
/// Slots are never reused, so a position stays bound to its row until the row
/// is deleted; afterwards the position resolves to an error.
#[derive(Debug, Default)]
pub struct MemTable {
    pub table_id: u64,
    slots: Vec<Option<Vec<Value>>>,
    live: usize,
}

impl MemTable {
    pub fn new(table_id: u64) -> Self {
        Self {
            table_id,
            slots: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, row: &Row) -> DbResult<RecordId> {
        let idx = self.slots.len();
        let rid = position_of(idx)?;
        self.slots.push(Some(row.values.clone()));
        self.live += 1;
        trace!(table = self.table_id, %rid, "row inserted");
        Ok(rid)
    }

    pub fn update(&mut self, rid: RecordId, row: &Row) -> DbResult<()> {
        let slot = self.slot_mut(rid)?;
        if slot.is_none() {
            return Err(DbError::Storage(format!("slot {rid} empty")));
        }
        *slot = Some(row.values.clone());
        Ok(())
    }

    pub fn delete(&mut self, rid: RecordId) -> DbResult<()> {
        let slot = self.slot_mut(rid)?;
        if slot.take().is_none() {
            return Err(DbError::Storage(format!("slot {rid} already empty")));
        }
        self.live -= 1;
        trace!(table = self.table_id, %rid, "row deleted");
        Ok(())
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live rows in position order.
    pub fn scan(&self) -> impl Iterator<Item = Row> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let values = slot.as_ref()?;
            let rid = position_of(idx).ok()?;
            Some(Row::new(values.clone()).with_rid(rid))
        })
    }

    fn slot_index(&self, rid: RecordId) -> DbResult<usize> {
        let slot = usize::from(rid.slot);
        if slot >= SLOTS_PER_PAGE {
            return Err(DbError::Storage(format!("invalid slot {}", rid.slot)));
        }
        let page = usize::try_from(rid.page_id.0)
            .map_err(|_| DbError::Storage(format!("page {} not allocated", rid.page_id.0)))?;
        let idx = page
            .checked_mul(SLOTS_PER_PAGE)
            .and_then(|base| base.checked_add(slot))
            .filter(|idx| *idx < self.slots.len())
            .ok_or_else(|| DbError::Storage(format!("position {rid} not allocated")))?;
        Ok(idx)
    }

    fn slot_mut(&mut self, rid: RecordId) -> DbResult<&mut Option<Vec<Value>>> {
        let idx = self.slot_index(rid)?;
        Ok(&mut self.slots[idx])
    }
}

impl RowStore for MemTable {
    fn row(&self, position: RecordId) -> DbResult<Row> {
        let idx = self.slot_index(position)?;
        let values = self.slots[idx]
            .as_ref()
            .ok_or_else(|| DbError::Storage(format!("slot {position} empty")))?;
        Ok(Row::new(values.clone()).with_rid(position))
    }
}

fn position_of(idx: usize) -> DbResult<RecordId> {
    let page = u64::try_from(idx / SLOTS_PER_PAGE)
        .map_err(|_| DbError::Storage("table exceeds addressable pages".into()))?;
    // SLOTS_PER_PAGE fits in u16.
    let slot = (idx % SLOTS_PER_PAGE) as u16;
    Ok(RecordId::new(PageId(page), slot))
}
