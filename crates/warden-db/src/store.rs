// SPDX-License-Identifier: Apache-2.0

//! The table store: named tables, nestable transactions, trigger dispatch.
//!
//! Transaction invariants:
//! - Every mutation lands in the innermost open frame; commit re-parents the
//!   frame one level down, the outermost commit dispatches triggers in log
//!   insertion order and retires entries to the owning tables.
//! - Rollback replays before-images newest-first and fires no trigger.
//! - A mutation with no open transaction behaves as an implicit single-entry
//!   transaction: applied, logged, and trigger-dispatched immediately.
//! - A schema-shaped failure (type mismatch, unknown column, malformed row)
//!   inside an open transaction rolls the innermost frame back before the
//!   error is returned.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::StoreError;
use crate::log::{ChangeKind, Direction, LogEntry};
use crate::schema::{full_mask, ColMask, TableSchema};
use crate::select::Query;
use crate::table::Table;
use crate::trigger::{RowChange, TableTrigger};
use crate::value::{IndexKey, Row, Value};

use std::sync::Arc;

/// Opaque handle to a table, stable for the life of the store.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableHandle(u32);

impl TableHandle {
    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct PendingEntry {
    entry: LogEntry,
    /// Insertion-order slot of the affected row, recorded so rollback can
    /// restore row order exactly.
    slot: usize,
}

#[derive(Debug, Default)]
struct TxFrame {
    entries: Vec<PendingEntry>,
    /// Tables whose pre-frame stamp has already been logged in this frame.
    stamped: FxHashSet<TableHandle>,
}

/// In-memory transactional table store.
#[derive(Default)]
pub struct TableStore {
    tables: Vec<Table>,
    by_name: FxHashMap<String, TableHandle>,
    frames: Vec<TxFrame>,
}

impl std::fmt::Debug for TableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStore")
            .field("tables", &self.tables.len())
            .field("depth", &self.frames.len())
            .finish_non_exhaustive()
    }
}

impl TableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Creates a table with the given schema.
    pub fn create_table(
        &mut self,
        name: &str,
        schema: TableSchema,
    ) -> Result<TableHandle, StoreError> {
        if self.by_name.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_owned()));
        }
        let handle = TableHandle(u32::try_from(self.tables.len()).unwrap_or(u32::MAX));
        self.tables.push(Table::new(name.to_owned(), handle, schema));
        self.by_name.insert(name.to_owned(), handle);
        debug!(table = name, handle = handle.value(), "created table");
        Ok(handle)
    }

    /// Resolves a table name to its handle.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TableHandle> {
        self.by_name.get(name).copied()
    }

    /// Name of the table behind `handle`.
    pub fn table_name(&self, handle: TableHandle) -> Result<&str, StoreError> {
        self.table(handle).map(|t| t.name.as_str())
    }

    /// Current mutation stamp of a table.
    pub fn stamp(&self, handle: TableHandle) -> Result<u32, StoreError> {
        self.table(handle).map(|t| t.stamp)
    }

    /// Stamp lookup by name; `None` when the table does not exist (yet).
    #[must_use]
    pub fn stamp_by_name(&self, name: &str) -> Option<u32> {
        self.lookup(name).and_then(|h| self.stamp(h).ok())
    }

    /// Number of live rows in a table.
    pub fn row_count(&self, handle: TableHandle) -> Result<usize, StoreError> {
        self.table(handle).map(Table::row_count)
    }

    /// Schema of a table.
    pub fn schema(&self, handle: TableHandle) -> Result<&TableSchema, StoreError> {
        self.table(handle).map(|t| &t.schema)
    }

    /// Names of all tables, in creation order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Current transaction depth; zero when no transaction is open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a transaction frame.
    pub fn begin(&mut self) {
        self.frames.push(TxFrame::default());
        debug!(depth = self.frames.len(), "begin");
    }

    /// Commits the innermost frame.
    ///
    /// For nested frames the entries are re-parented one level down in order;
    /// the outermost commit dispatches triggers and retires the entries.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        let frame = self.frames.pop().ok_or(StoreError::NoTransaction)?;
        debug!(
            depth = self.frames.len() + 1,
            entries = frame.entries.len(),
            "commit"
        );

        if let Some(parent) = self.frames.last_mut() {
            for pe in frame.entries {
                if pe.entry.kind == ChangeKind::Stamp {
                    // The parent's stamp entry records the older value; keep it.
                    if !parent.stamped.insert(pe.entry.table) {
                        continue;
                    }
                }
                parent.entries.push(pe);
            }
            return Ok(());
        }

        let mut dispatches = Vec::new();
        for pe in frame.entries {
            let entry = pe.entry;
            if entry.kind == ChangeKind::Stamp {
                continue;
            }
            let table = self
                .tables
                .get(entry.table.index())
                .ok_or_else(|| StoreError::UnknownTable(format!("#{}", entry.table.value())))?;
            let triggers = table.triggers.matching(entry.colmask);
            if !triggers.is_empty() {
                dispatches.push((
                    triggers,
                    RowChange {
                        table: entry.table,
                        kind: entry.kind,
                        colmask: entry.colmask,
                        before: entry.before.clone(),
                        after: entry.after.clone(),
                    },
                ));
            }
            if let Some(t) = self.tables.get_mut(entry.table.index()) {
                t.retire(entry);
            }
        }

        let store: &Self = self;
        for (triggers, change) in &dispatches {
            for trigger in triggers {
                trigger.on_change(store, change);
            }
        }
        Ok(())
    }

    /// Discards the innermost frame, replaying before-images newest-first.
    /// No trigger fires for the discarded mutations.
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        let frame = self.frames.pop().ok_or(StoreError::NoTransaction)?;
        debug!(
            depth = self.frames.len() + 1,
            entries = frame.entries.len(),
            "rollback"
        );
        for pe in frame.entries.into_iter().rev() {
            let Some(table) = self.tables.get_mut(pe.entry.table.index()) else {
                continue;
            };
            match pe.entry.kind {
                ChangeKind::Insert => table.undo_insert(pe.slot),
                ChangeKind::Delete => {
                    if let Some(row) = pe.entry.before {
                        table.undo_delete(pe.slot, row);
                    }
                }
                ChangeKind::Update => {
                    if let Some(row) = pe.entry.before {
                        table.undo_update(pe.slot, row);
                    }
                }
                ChangeKind::Stamp => table.stamp = pe.entry.stamp,
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Inserts a row.
    pub fn insert(&mut self, handle: TableHandle, row: Row) -> Result<(), StoreError> {
        let res = self.insert_inner(handle, row);
        self.autorollback(res)
    }

    /// Applies the masked columns of `row` to the row addressed by `key`.
    pub fn update(
        &mut self,
        handle: TableHandle,
        key: &[Value],
        colmask: ColMask,
        row: &Row,
    ) -> Result<(), StoreError> {
        let res = self.update_inner(handle, key, colmask, row);
        self.autorollback(res)
    }

    /// Deletes the row addressed by `key`.
    pub fn delete(&mut self, handle: TableHandle, key: &[Value]) -> Result<(), StoreError> {
        let res = self.delete_inner(handle, key);
        self.autorollback(res)
    }

    fn insert_inner(&mut self, handle: TableHandle, row: Row) -> Result<(), StoreError> {
        let image = row.clone();
        let table = self.table_mut(handle)?;
        let prev_stamp = table.stamp;
        let slot = table.insert_row(row)?;
        table.stamp = table.stamp.wrapping_add(1);
        let entry = LogEntry {
            table: handle,
            kind: ChangeKind::Insert,
            colmask: full_mask(table.schema.width()),
            before: None,
            after: Some(image),
            stamp: table.stamp,
        };
        self.record(handle, prev_stamp, entry, slot);
        Ok(())
    }

    fn update_inner(
        &mut self,
        handle: TableHandle,
        key: &[Value],
        colmask: ColMask,
        row: &Row,
    ) -> Result<(), StoreError> {
        let key = IndexKey(key.to_vec());
        let table = self.table_mut(handle)?;
        let prev_stamp = table.stamp;
        let (before, after, slot) = table.update_row(&key, colmask, row)?;
        table.stamp = table.stamp.wrapping_add(1);
        let entry = LogEntry {
            table: handle,
            kind: ChangeKind::Update,
            colmask,
            before: Some(before),
            after: Some(after),
            stamp: table.stamp,
        };
        self.record(handle, prev_stamp, entry, slot);
        Ok(())
    }

    fn delete_inner(&mut self, handle: TableHandle, key: &[Value]) -> Result<(), StoreError> {
        let key = IndexKey(key.to_vec());
        let table = self.table_mut(handle)?;
        let prev_stamp = table.stamp;
        let (before, slot) = table.delete_row(&key)?;
        table.stamp = table.stamp.wrapping_add(1);
        let entry = LogEntry {
            table: handle,
            kind: ChangeKind::Delete,
            colmask: full_mask(table.schema.width()),
            before: Some(before),
            after: None,
            stamp: table.stamp,
        };
        self.record(handle, prev_stamp, entry, slot);
        Ok(())
    }

    /// Routes a fresh entry to the innermost frame, or applies the implicit
    /// single-entry transaction semantics when none is open.
    fn record(&mut self, handle: TableHandle, prev_stamp: u32, entry: LogEntry, slot: usize) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.stamped.insert(handle) {
                frame.entries.push(PendingEntry {
                    entry: LogEntry {
                        table: handle,
                        kind: ChangeKind::Stamp,
                        colmask: 0,
                        before: None,
                        after: None,
                        stamp: prev_stamp,
                    },
                    slot: 0,
                });
            }
            frame.entries.push(PendingEntry { entry, slot });
            return;
        }

        let triggers = self
            .tables
            .get(handle.index())
            .map(|t| t.triggers.matching(entry.colmask))
            .unwrap_or_default();
        let change = RowChange {
            table: entry.table,
            kind: entry.kind,
            colmask: entry.colmask,
            before: entry.before.clone(),
            after: entry.after.clone(),
        };
        if let Some(t) = self.tables.get_mut(handle.index()) {
            t.retire(entry);
        }
        let store: &Self = self;
        for trigger in &triggers {
            trigger.on_change(store, &change);
        }
    }

    /// Schema-shaped failures abort the innermost frame: rollback is issued
    /// automatically at the depth where the error occurred.
    fn autorollback<T>(&mut self, res: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(err) = &res {
            let fatal = matches!(
                err,
                StoreError::TypeMismatch { .. }
                    | StoreError::SchemaInvalid(_)
                    | StoreError::UnknownColumn(_)
            );
            if fatal && !self.frames.is_empty() {
                let _ = self.rollback();
            }
        }
        res
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Selects rows matching `query`, in insertion order, reflecting all
    /// mutations of the open transaction.
    pub fn select<'a>(
        &'a self,
        handle: TableHandle,
        query: &Query,
    ) -> Result<impl Iterator<Item = &'a Row> + 'a, StoreError> {
        let table = self.table(handle)?;
        let compiled = query.compile(&table.schema)?;
        Ok(table.iter_rows().filter(move |row| compiled.matches(row)))
    }

    /// Iterates all rows of a table in insertion order.
    pub fn rows(&self, handle: TableHandle) -> Result<impl Iterator<Item = &Row>, StoreError> {
        self.table(handle).map(Table::iter_rows)
    }

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Iterates a table's committed log without consuming it.
    pub fn table_log(
        &self,
        handle: TableHandle,
        direction: Direction,
    ) -> Result<Box<dyn Iterator<Item = &LogEntry> + '_>, StoreError> {
        let table = self.table(handle)?;
        Ok(match direction {
            Direction::Forward => Box::new(table.committed.iter()),
            Direction::Backward => Box::new(table.committed.iter().rev()),
        })
    }

    /// Drains a table's committed log, returning entries in the requested
    /// direction.
    pub fn take_table_log(
        &mut self,
        handle: TableHandle,
        direction: Direction,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let table = self.table_mut(handle)?;
        let mut out: Vec<LogEntry> = table.committed.drain(..).collect();
        if direction == Direction::Backward {
            out.reverse();
        }
        Ok(out)
    }

    /// Iterates the innermost open frame's entries; empty with no open
    /// transaction.
    pub fn tx_log(&self, direction: Direction) -> Box<dyn Iterator<Item = &LogEntry> + '_> {
        let entries = self.frames.last().map_or(&[][..], |f| f.entries.as_slice());
        match direction {
            Direction::Forward => Box::new(entries.iter().map(|pe| &pe.entry)),
            Direction::Backward => Box::new(entries.iter().rev().map(|pe| &pe.entry)),
        }
    }

    // ------------------------------------------------------------------
    // Triggers
    // ------------------------------------------------------------------

    /// Registers a trigger fired on every committed data mutation of the
    /// table.
    pub fn add_row_trigger(
        &mut self,
        handle: TableHandle,
        trigger: Arc<dyn TableTrigger>,
    ) -> Result<(), StoreError> {
        self.table_mut(handle)?.triggers.row.push(trigger);
        Ok(())
    }

    /// Registers a trigger fired on committed mutations touching `column`.
    pub fn add_column_trigger(
        &mut self,
        handle: TableHandle,
        column: &str,
        trigger: Arc<dyn TableTrigger>,
    ) -> Result<(), StoreError> {
        let table = self.table_mut(handle)?;
        let pos = table.schema.column_position(column)?;
        table.triggers.column.push((pos, trigger));
        Ok(())
    }

    // ------------------------------------------------------------------

    fn table(&self, handle: TableHandle) -> Result<&Table, StoreError> {
        self.tables
            .get(handle.index())
            .ok_or_else(|| StoreError::UnknownTable(format!("#{}", handle.value())))
    }

    fn table_mut(&mut self, handle: TableHandle) -> Result<&mut Table, StoreError> {
        self.tables
            .get_mut(handle.index())
            .ok_or_else(|| StoreError::UnknownTable(format!("#{}", handle.value())))
    }
}
