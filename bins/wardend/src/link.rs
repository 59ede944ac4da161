// SPDX-License-Identifier: Apache-2.0

//! Grant-event fan-out into the fact store.
//!
//! Every grant change is upserted into the `resource_owner` fact table keyed
//! by set id; the commit fires the store's triggers, and the daemon then
//! re-resolves the configured policy target.

use warden_db::{
    ColumnDef, ColumnType, StoreError, TableHandle, TableSchema, TableStore, Value,
};
use warden_resource::{Engine, GrantEvent};

/// Name of the ownership fact table.
pub const OWNER_FACT: &str = "resource_owner";

const COL_ZONE: u32 = 0b0001;
const COL_SET: u32 = 0b0010;
const COL_GRANT: u32 = 0b0100;
const COL_ADVICE: u32 = 0b1000;

/// Creates the `resource_owner` fact table: one row per set, keyed by set id.
pub fn create_owner_table(store: &mut TableStore) -> Result<TableHandle, StoreError> {
    let schema = TableSchema::new(
        vec![
            ColumnDef::new("zone", ColumnType::String),
            ColumnDef::new("set", ColumnType::Unsigned),
            ColumnDef::new("grant", ColumnType::Unsigned),
            ColumnDef::new("advice", ColumnType::Unsigned),
        ],
        &["set"],
    )?;
    store.create_table(OWNER_FACT, schema)
}

/// Writes a batch of grant events into the fact table inside one
/// transaction; the commit fires the store triggers.
pub fn publish_grants(
    engine: &Engine,
    store: &mut TableStore,
    table: TableHandle,
    events: &[GrantEvent],
) -> Result<(), StoreError> {
    if events.is_empty() {
        return Ok(());
    }
    store.begin();
    for event in events {
        let zone = engine
            .set(event.set)
            .ok()
            .and_then(|s| engine.registry().zone(s.zone()).ok())
            .map_or_else(String::new, |z| z.name.clone());
        let row = vec![
            Value::from(zone),
            Value::from(u64::from(event.set.value())),
            Value::from(u64::from(event.grant.value())),
            Value::from(u64::from(event.advice.value())),
        ];
        let key = [Value::from(u64::from(event.set.value()))];
        let colmask = COL_ZONE | COL_SET | COL_GRANT | COL_ADVICE;
        match store.update(table, &key, colmask, &row) {
            Ok(()) => {}
            Err(StoreError::NoSuchRow) => store.insert(table, row)?,
            Err(e) => {
                store.rollback()?;
                return Err(e);
            }
        }
    }
    store.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_db::{Cond, Query};
    use warden_resource::{AttrSchema, Registry};

    #[test]
    fn grant_events_are_upserted_by_set_id() {
        let mut registry = Registry::new();
        let zone = registry
            .create_zone("cabin", &[])
            .unwrap_or_else(|e| panic!("zone: {e}"));
        let class = registry
            .create_class("player", 1)
            .unwrap_or_else(|e| panic!("class: {e}"));
        registry
            .create_resource("audio", false, AttrSchema::empty())
            .unwrap_or_else(|e| panic!("resource: {e}"));

        let mut engine = Engine::new(registry);
        let client = engine.create_client("link-test");
        let set = engine
            .create_set(client, zone, class)
            .unwrap_or_else(|e| panic!("set: {e}"));
        engine
            .add_resource(set, "audio", false, &[], true)
            .unwrap_or_else(|e| panic!("add: {e}"));

        let mut store = TableStore::new();
        let table = create_owner_table(&mut store).unwrap_or_else(|e| panic!("table: {e}"));

        engine.acquire(set).unwrap_or_else(|e| panic!("acquire: {e}"));
        let events = engine.run_pending();
        publish_grants(&engine, &mut store, table, &events)
            .unwrap_or_else(|e| panic!("publish: {e}"));

        engine.release(set).unwrap_or_else(|e| panic!("release: {e}"));
        let events = engine.run_pending();
        publish_grants(&engine, &mut store, table, &events)
            .unwrap_or_else(|e| panic!("publish: {e}"));

        // One row per set, carrying the latest grant.
        let query = Query::all().and("set", Cond::Eq, u64::from(set.value()));
        let rows: Vec<_> = store
            .select(table, &query)
            .unwrap_or_else(|e| panic!("select: {e}"))
            .cloned()
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::from("cabin"));
        assert_eq!(rows[0][2], Value::from(0u64));
    }
}
