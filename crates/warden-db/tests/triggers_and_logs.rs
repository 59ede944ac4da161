// SPDX-License-Identifier: Apache-2.0
//! Trigger dispatch order and change-log iteration.

use std::sync::{Arc, Mutex};

use warden_db::{
    ChangeKind, ColumnDef, ColumnType, Direction, Row, RowChange, TableHandle, TableStore,
    TableTrigger, Value,
};

#[derive(Default)]
struct Recorder {
    changes: Mutex<Vec<RowChange>>,
}

impl Recorder {
    fn kinds(&self) -> Vec<ChangeKind> {
        self.changes
            .lock()
            .map(|c| c.iter().map(|ch| ch.kind).collect())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.changes.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl TableTrigger for Recorder {
    fn on_change(&self, _store: &TableStore, change: &RowChange) {
        if let Ok(mut changes) = self.changes.lock() {
            changes.push(change.clone());
        }
    }
}

fn setup() -> (TableStore, TableHandle) {
    let mut store = TableStore::new();
    let schema = warden_db::TableSchema::new(
        vec![
            ColumnDef::new("key", ColumnType::String),
            ColumnDef::new("value", ColumnType::Integer),
        ],
        &["key"],
    )
    .unwrap_or_else(|e| panic!("schema: {e}"));
    let handle = store
        .create_table("facts", schema)
        .unwrap_or_else(|e| panic!("create_table: {e}"));
    (store, handle)
}

fn row(key: &str, value: i64) -> Row {
    vec![Value::from(key), Value::from(value)]
}

#[test]
fn triggers_fire_only_at_the_outermost_commit() {
    let (mut store, handle) = setup();
    let rec = Arc::new(Recorder::default());
    store.add_row_trigger(handle, rec.clone()).unwrap();

    store.begin();
    store.insert(handle, row("a", 1)).unwrap();
    store.begin();
    store.insert(handle, row("b", 2)).unwrap();
    store.commit().unwrap();
    assert_eq!(rec.len(), 0, "no dispatch before the outer commit");

    store.commit().unwrap();
    assert_eq!(rec.kinds(), vec![ChangeKind::Insert, ChangeKind::Insert]);
}

#[test]
fn rolled_back_mutations_never_reach_a_trigger() {
    // Scenario: begin; insert X; begin; update X; rollback; commit.
    // The surviving insert fires exactly one trigger carrying the original
    // image; the rolled-back update fires none.
    let (mut store, handle) = setup();
    let rec = Arc::new(Recorder::default());
    store.add_row_trigger(handle, rec.clone()).unwrap();

    store.begin();
    store.insert(handle, row("x", 7)).unwrap();
    store.begin();
    store
        .update(handle, &[Value::from("x")], 0b10, &row("x", 99))
        .unwrap();
    store.rollback().unwrap();
    store.commit().unwrap();

    let changes = rec.changes.lock().unwrap_or_else(|e| panic!("lock: {e}"));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Insert);
    assert_eq!(changes[0].before, None);
    assert_eq!(changes[0].after, Some(row("x", 7)));

    let survivors: Vec<Row> = store.rows(handle).unwrap().cloned().collect();
    assert_eq!(survivors, vec![row("x", 7)]);
}

#[test]
fn column_triggers_only_see_mutations_touching_their_column() {
    let (mut store, handle) = setup();
    let rec = Arc::new(Recorder::default());
    store
        .add_column_trigger(handle, "value", rec.clone())
        .unwrap();

    store.insert(handle, row("a", 1)).unwrap(); // touches all columns
    store
        .update(handle, &[Value::from("a")], 0b01, &row("b", 1))
        .unwrap(); // key only
    store
        .update(handle, &[Value::from("b")], 0b10, &row("b", 2))
        .unwrap(); // value only

    assert_eq!(rec.kinds(), vec![ChangeKind::Insert, ChangeKind::Update]);
}

#[test]
fn implicit_transactions_dispatch_immediately() {
    let (mut store, handle) = setup();
    let rec = Arc::new(Recorder::default());
    store.add_row_trigger(handle, rec.clone()).unwrap();

    store.insert(handle, row("now", 1)).unwrap();
    assert_eq!(rec.len(), 1);
}

#[test]
fn committed_log_iterates_both_directions_and_drains() {
    let (mut store, handle) = setup();
    store.insert(handle, row("a", 1)).unwrap();
    store.insert(handle, row("b", 2)).unwrap();
    store.delete(handle, &[Value::from("a")]).unwrap();

    let kinds: Vec<ChangeKind> = store
        .table_log(handle, Direction::Forward)
        .unwrap()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Insert, ChangeKind::Insert, ChangeKind::Delete]
    );

    let backwards: Vec<ChangeKind> = store
        .table_log(handle, Direction::Backward)
        .unwrap()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        backwards,
        vec![ChangeKind::Delete, ChangeKind::Insert, ChangeKind::Insert]
    );

    let drained = store.take_table_log(handle, Direction::Forward).unwrap();
    assert_eq!(drained.len(), 3);
    assert_eq!(
        store.table_log(handle, Direction::Forward).unwrap().count(),
        0
    );
}

#[test]
fn open_frame_log_exposes_pending_entries_in_order() {
    let (mut store, handle) = setup();
    store.begin();
    store.insert(handle, row("a", 1)).unwrap();
    store.insert(handle, row("b", 2)).unwrap();

    // First entry is the table's stamp record, then the two inserts.
    let kinds: Vec<ChangeKind> = store.tx_log(Direction::Forward).map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Stamp, ChangeKind::Insert, ChangeKind::Insert]
    );
    store.rollback().unwrap();
}
