// SPDX-License-Identifier: Apache-2.0

//! Table internals: row storage, the unique index, and the committed log.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::error::StoreError;
use crate::log::LogEntry;
use crate::schema::{ColMask, TableSchema};
use crate::store::TableHandle;
use crate::trigger::TriggerSet;
use crate::value::{IndexKey, Row};

/// Retired log entries kept per table; oldest entries drop beyond this.
pub(crate) const COMMITTED_LOG_CAP: usize = 1024;

/// Internal row identity, never exposed; rows are addressed externally by
/// index key or by selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RowId(u32);

#[derive(Debug)]
pub(crate) struct Table {
    pub(crate) name: String,
    pub(crate) handle: TableHandle,
    pub(crate) schema: TableSchema,
    pub(crate) stamp: u32,
    rows: FxHashMap<RowId, Row>,
    /// Insertion order; iteration and selection follow it.
    order: Vec<RowId>,
    index: FxHashMap<IndexKey, RowId>,
    next_row: u32,
    pub(crate) committed: VecDeque<LogEntry>,
    pub(crate) triggers: TriggerSet,
}

impl Table {
    pub(crate) fn new(name: String, handle: TableHandle, schema: TableSchema) -> Self {
        Self {
            name,
            handle,
            schema,
            stamp: 0,
            rows: FxHashMap::default(),
            order: Vec::new(),
            index: FxHashMap::default(),
            next_row: 0,
            committed: VecDeque::new(),
            triggers: TriggerSet::default(),
        }
    }

    pub(crate) fn row_count(&self) -> usize {
        self.order.len()
    }

    /// Iterates rows in insertion order.
    pub(crate) fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    pub(crate) fn validate_row(&self, row: &Row) -> Result<(), StoreError> {
        if row.len() != self.schema.width() {
            return Err(StoreError::SchemaInvalid(format!(
                "row has {} values, table {} has {} columns",
                row.len(),
                self.name,
                self.schema.width()
            )));
        }
        for (value, col) in row.iter().zip(self.schema.columns()) {
            if value.column_type() != col.ty {
                return Err(StoreError::TypeMismatch {
                    column: col.name.clone(),
                    expected: col.ty.name(),
                    got: value.column_type().name(),
                });
            }
        }
        Ok(())
    }

    fn key_of(&self, row: &Row) -> Option<IndexKey> {
        if !self.schema.has_index() {
            return None;
        }
        Some(IndexKey(
            self.schema
                .index_columns()
                .iter()
                .map(|pos| row[*pos].clone())
                .collect(),
        ))
    }

    /// Inserts a validated row; returns the order slot it landed in.
    pub(crate) fn insert_row(&mut self, row: Row) -> Result<usize, StoreError> {
        self.validate_row(&row)?;
        if let Some(key) = self.key_of(&row) {
            if self.index.contains_key(&key) {
                return Err(StoreError::Constraint(key.to_string()));
            }
            let id = self.fresh_id();
            self.index.insert(key, id);
            self.rows.insert(id, row);
            self.order.push(id);
        } else {
            let id = self.fresh_id();
            self.rows.insert(id, row);
            self.order.push(id);
        }
        Ok(self.order.len() - 1)
    }

    /// Deletes the row addressed by `key`; returns its image and slot.
    pub(crate) fn delete_row(&mut self, key: &IndexKey) -> Result<(Row, usize), StoreError> {
        if !self.schema.has_index() {
            return Err(StoreError::NoIndex);
        }
        let id = self.index.remove(key).ok_or(StoreError::NoSuchRow)?;
        let slot = self
            .order
            .iter()
            .position(|x| *x == id)
            .ok_or(StoreError::NoSuchRow)?;
        self.order.remove(slot);
        let row = self.rows.remove(&id).ok_or(StoreError::NoSuchRow)?;
        Ok((row, slot))
    }

    /// Applies the masked columns of `new` to the row addressed by `key`.
    /// Returns `(before, after, slot)`.
    pub(crate) fn update_row(
        &mut self,
        key: &IndexKey,
        colmask: ColMask,
        new: &Row,
    ) -> Result<(Row, Row, usize), StoreError> {
        if !self.schema.has_index() {
            return Err(StoreError::NoIndex);
        }
        self.validate_row(new)?;
        let id = *self.index.get(key).ok_or(StoreError::NoSuchRow)?;
        let slot = self
            .order
            .iter()
            .position(|x| *x == id)
            .ok_or(StoreError::NoSuchRow)?;

        let before = self.rows.get(&id).cloned().ok_or(StoreError::NoSuchRow)?;
        let mut after = before.clone();
        for (pos, value) in new.iter().enumerate() {
            if colmask & (1 << pos) != 0 {
                after[pos] = value.clone();
            }
        }

        // Re-key when an indexed column moved; uniqueness re-checked first.
        let new_key = self.key_of(&after);
        if let Some(nk) = &new_key {
            if nk != key {
                if self.index.contains_key(nk) {
                    return Err(StoreError::Constraint(nk.to_string()));
                }
                self.index.remove(key);
                self.index.insert(nk.clone(), id);
            }
        }
        self.rows.insert(id, after.clone());
        Ok((before, after, slot))
    }

    // ------------------------------------------------------------------
    // Rollback support: undo operations, applied newest-first so recorded
    // slots line up with the state being unwound.
    // ------------------------------------------------------------------

    pub(crate) fn undo_insert(&mut self, slot: usize) {
        if slot >= self.order.len() {
            return;
        }
        let id = self.order.remove(slot);
        if let Some(row) = self.rows.remove(&id) {
            if let Some(key) = self.key_of(&row) {
                self.index.remove(&key);
            }
        }
    }

    pub(crate) fn undo_delete(&mut self, slot: usize, row: Row) {
        let id = self.fresh_id();
        if let Some(key) = self.key_of(&row) {
            self.index.insert(key, id);
        }
        self.rows.insert(id, row);
        let slot = slot.min(self.order.len());
        self.order.insert(slot, id);
    }

    pub(crate) fn undo_update(&mut self, slot: usize, before: Row) {
        let Some(id) = self.order.get(slot).copied() else {
            return;
        };
        if let Some(after) = self.rows.get(&id) {
            if let Some(after_key) = self.key_of(after) {
                self.index.remove(&after_key);
            }
        }
        if let Some(key) = self.key_of(&before) {
            self.index.insert(key, id);
        }
        self.rows.insert(id, before);
    }

    pub(crate) fn retire(&mut self, entry: LogEntry) {
        if self.committed.len() == COMMITTED_LOG_CAP {
            self.committed.pop_front();
        }
        self.committed.push_back(entry);
    }

    fn fresh_id(&mut self) -> RowId {
        let id = RowId(self.next_row);
        self.next_row = self.next_row.wrapping_add(1);
        id
    }
}
