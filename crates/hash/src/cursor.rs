use common::{DbResult, RecordId, Row};
use storage::{Cursor, RowStore};
use tracing::trace;

/// Cursor over the positions one hash bucket matched.
///
/// The position list is captured when the cursor is built and does not change
/// while it is open. `None` means the probe matched nothing; such a cursor
/// never moves. Rows are fetched from the row store only when asked for.
///
/// The offset starts at -1 (before the first row) and is clamped to
/// `-1..=len`, so extra `next` or `previous` calls at either end keep
/// returning `false` without drifting.
pub struct NonUniqueHashCursor<'a, S: ?Sized> {
    store: &'a S,
    positions: Option<Vec<RecordId>>,
    index: isize,
}

impl<'a, S: RowStore + ?Sized> NonUniqueHashCursor<'a, S> {
    pub fn new(store: &'a S, positions: Option<Vec<RecordId>>) -> Self {
        trace!(
            matches = positions.as_ref().map_or(0, Vec::len),
            "hash cursor opened"
        );
        Self {
            store,
            positions,
            index: -1,
        }
    }

    /// Number of matched positions.
    pub fn len(&self) -> usize {
        self.positions.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current offset; -1 before the first row, `len` past the last.
    pub fn offset(&self) -> isize {
        self.index
    }

    /// Position under the cursor, if it is on a row.
    pub fn position(&self) -> Option<RecordId> {
        let positions = self.positions.as_ref()?;
        usize::try_from(self.index)
            .ok()
            .and_then(|idx| positions.get(idx))
            .copied()
    }
}

impl<S: RowStore + ?Sized> Cursor for NonUniqueHashCursor<'_, S> {
    fn get(&self) -> DbResult<Option<Row>> {
        match self.position() {
            Some(position) => self.store.row(position).map(Some),
            None => Ok(None),
        }
    }

    fn next(&mut self) -> bool {
        let Some(positions) = &self.positions else {
            return false;
        };
        let len = positions.len() as isize;
        if self.index < len {
            self.index += 1;
        }
        self.index < len
    }

    fn previous(&mut self) -> bool {
        if self.positions.is_none() {
            return false;
        }
        if self.index >= 0 {
            self.index -= 1;
        }
        self.index >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::DbError;
    use pretty_assertions::assert_eq;
    use storage::MemTable;
    use types::Value;

    fn table_with_rows(n: i64) -> (MemTable, Vec<RecordId>) {
        let mut table = MemTable::new(1);
        let rids = (0..n)
            .map(|i| table.insert(&Row::new(vec![Value::Int(i)])).unwrap())
            .collect();
        (table, rids)
    }

    fn current_id(cursor: &impl Cursor) -> Option<Value> {
        cursor.get().unwrap().map(|row| row.values[0].clone())
    }

    #[test]
    fn forward_traversal_then_exhaustion() {
        let (table, rids) = table_with_rows(3);
        let mut cursor = NonUniqueHashCursor::new(&table, Some(rids.clone()));

        assert_eq!(current_id(&cursor), None);
        for (i, rid) in rids.iter().enumerate() {
            assert!(cursor.next());
            assert_eq!(cursor.position(), Some(*rid));
            assert_eq!(current_id(&cursor), Some(Value::Int(i as i64)));
        }
        assert!(!cursor.next());
        assert_eq!(current_id(&cursor), None);
        assert!(!cursor.next());
        assert_eq!(cursor.offset(), 3);
    }

    #[test]
    fn backward_traversal_from_last_row() {
        let (table, rids) = table_with_rows(3);
        let mut cursor = NonUniqueHashCursor::new(&table, Some(rids));
        while cursor.next() {}

        assert!(cursor.previous());
        assert_eq!(current_id(&cursor), Some(Value::Int(2)));
        assert!(cursor.previous());
        assert!(cursor.previous());
        assert_eq!(current_id(&cursor), Some(Value::Int(0)));
        assert!(!cursor.previous());
        assert_eq!(cursor.offset(), -1);
        assert_eq!(current_id(&cursor), None);
    }

    #[test]
    fn extra_moves_do_not_drift() {
        let (table, rids) = table_with_rows(2);
        let mut cursor = NonUniqueHashCursor::new(&table, Some(rids));
        for _ in 0..5 {
            cursor.next();
        }
        assert!(cursor.previous());
        assert_eq!(current_id(&cursor), Some(Value::Int(1)));

        for _ in 0..5 {
            cursor.previous();
        }
        assert!(cursor.next());
        assert_eq!(current_id(&cursor), Some(Value::Int(0)));
    }

    #[test]
    fn null_match_set_never_moves() {
        let (table, _) = table_with_rows(1);
        let mut cursor = NonUniqueHashCursor::new(&table, None);
        assert!(!cursor.next());
        assert!(!cursor.previous());
        assert!(!cursor.next());
        assert_eq!(cursor.get().unwrap(), None);
        assert_eq!(cursor.search_row().unwrap(), None);
        assert!(cursor.is_empty());
    }

    #[test]
    fn empty_match_set_behaves_like_no_rows() {
        let (table, _) = table_with_rows(1);
        let mut cursor = NonUniqueHashCursor::new(&table, Some(Vec::new()));
        assert!(!cursor.next());
        assert_eq!(cursor.get().unwrap(), None);
        assert!(!cursor.previous());
    }

    #[test]
    fn search_row_matches_get() {
        let (table, rids) = table_with_rows(2);
        let mut cursor = NonUniqueHashCursor::new(&table, Some(rids));
        cursor.next();
        assert_eq!(cursor.search_row().unwrap(), cursor.get().unwrap());
    }

    #[test]
    fn row_store_failures_propagate() {
        let (mut table, rids) = table_with_rows(2);
        table.delete(rids[0]).unwrap();
        let mut cursor = NonUniqueHashCursor::new(&table, Some(rids));

        assert!(cursor.next());
        assert!(matches!(cursor.get(), Err(DbError::Storage(_))));
        assert!(cursor.next());
        assert!(cursor.get().unwrap().is_some());
    }

    #[test]
    fn positions_need_not_be_sorted() {
        let (table, rids) = table_with_rows(3);
        let shuffled = vec![rids[2], rids[0], rids[1]];
        let mut cursor = NonUniqueHashCursor::new(&table, Some(shuffled));
        let mut seen = Vec::new();
        while cursor.next() {
            seen.push(current_id(&cursor).unwrap());
        }
        assert_eq!(seen, vec![Value::Int(2), Value::Int(0), Value::Int(1)]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn cursor_follows_clamped_offset_model(
                len in 0usize..8,
                moves in proptest::collection::vec(any::<bool>(), 0..40),
            ) {
                let (table, rids) = table_with_rows(len as i64);
                let mut cursor = NonUniqueHashCursor::new(&table, Some(rids.clone()));
                let mut model: isize = -1;

                for forward in moves {
                    let moved = if forward {
                        model = (model + 1).min(len as isize);
                        cursor.next()
                    } else {
                        model = (model - 1).max(-1);
                        cursor.previous()
                    };
                    let on_row = model >= 0 && model < len as isize;
                    prop_assert_eq!(moved, on_row);
                    prop_assert_eq!(cursor.offset(), model);
                    let expected = if on_row { Some(rids[model as usize]) } else { None };
                    prop_assert_eq!(cursor.position(), expected);
                    prop_assert_eq!(cursor.get().unwrap().is_some(), on_row);
                }
            }
        }
    }
}
