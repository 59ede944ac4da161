// SPDX-License-Identifier: Apache-2.0

//! Row- and column-level triggers.
//!
//! Triggers fire at commit of the outermost transaction, in the change log's
//! insertion order; mutations rolled back before that point never reach a
//! trigger. Row triggers match every data mutation of their table; column
//! triggers match mutations whose column mask covers their column (inserts
//! and deletes touch every column).

use std::sync::Arc;

use crate::log::ChangeKind;
use crate::schema::ColMask;
use crate::store::{TableHandle, TableStore};
use crate::value::Row;

/// A change record handed to triggers.
#[derive(Debug, Clone)]
pub struct RowChange {
    /// Table the change applies to.
    pub table: TableHandle,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Columns touched.
    pub colmask: ColMask,
    /// Row image before the change, when one existed.
    pub before: Option<Row>,
    /// Row image after the change, when one remains.
    pub after: Option<Row>,
}

/// Observer invoked after committed mutations.
///
/// The store is passed back immutably so a trigger may read other tables; it
/// cannot mutate the store mid-dispatch.
pub trait TableTrigger {
    /// Called once per matching committed change.
    fn on_change(&self, store: &TableStore, change: &RowChange);
}

/// Trigger registration bookkeeping, owned by each table.
#[derive(Default)]
pub(crate) struct TriggerSet {
    pub(crate) row: Vec<Arc<dyn TableTrigger>>,
    pub(crate) column: Vec<(usize, Arc<dyn TableTrigger>)>,
}

impl std::fmt::Debug for TriggerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerSet")
            .field("row", &self.row.len())
            .field("column", &self.column.len())
            .finish()
    }
}

impl TriggerSet {
    /// Collects the triggers matching a change, row triggers first.
    pub(crate) fn matching(&self, colmask: ColMask) -> Vec<Arc<dyn TableTrigger>> {
        let mut out: Vec<Arc<dyn TableTrigger>> = self.row.clone();
        for (pos, trigger) in &self.column {
            if colmask & (1 << *pos) != 0 {
                out.push(Arc::clone(trigger));
            }
        }
        out
    }
}
