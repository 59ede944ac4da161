// SPDX-License-Identifier: Apache-2.0
//! Target evaluation: cascades, failure rollback, staleness laws.

use std::cell::RefCell;
use std::rc::Rc;

use warden_db::{ColumnDef, ColumnType, TableStore, Value};
use warden_resolver::{
    ContextSnapshot, Interpreter, Resolver, ResolverBuilder, ResolverError, Script, ScriptEnv,
    ScriptType, ScriptValue,
};

/// Test runtime: the script source is `label` or `label!status`; every
/// execution appends the label (and the `x` context variable when set) to a
/// shared log and exits with the status.
struct TraceInterpreter {
    log: Rc<RefCell<Vec<String>>>,
}

impl Interpreter for TraceInterpreter {
    fn name(&self) -> &str {
        "trace"
    }

    fn compile(&self, source: &str) -> Result<Box<dyn Script>, String> {
        if source == "bad-syntax" {
            return Err("bad syntax".into());
        }
        let (label, status) = match source.split_once('!') {
            Some((label, status)) => (
                label.to_owned(),
                status.parse().map_err(|_| "bad status".to_owned())?,
            ),
            None => (source.to_owned(), 0),
        };
        Ok(Box::new(TraceScript {
            label,
            status,
            log: Rc::clone(&self.log),
        }))
    }
}

struct TraceScript {
    label: String,
    status: i32,
    log: Rc<RefCell<Vec<String>>>,
}

impl Script for TraceScript {
    fn prepare(&mut self, _ctx: &ContextSnapshot) -> Result<(), String> {
        Ok(())
    }

    fn execute(&mut self, env: &mut ScriptEnv<'_>) -> i32 {
        let entry = match env.ctx.get("x") {
            Some(v) => format!("{}(x={v})", self.label),
            None => self.label.clone(),
        };
        self.log.borrow_mut().push(entry);
        self.status
    }
}

fn build(source: &str) -> (Resolver, Rc<RefCell<Vec<String>>>) {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let resolver = ResolverBuilder::new()
        .register_interpreter(Box::new(TraceInterpreter {
            log: Rc::clone(&log),
        }))
        .parse_str(source)
        .unwrap_or_else(|e| panic!("parse: {e}"));
    (resolver, log)
}

fn store_with_fact(name: &str) -> TableStore {
    let mut store = TableStore::new();
    let schema = warden_db::TableSchema::new(vec![ColumnDef::new("v", ColumnType::Unsigned)], &[])
        .unwrap_or_else(|e| panic!("schema: {e}"));
    store
        .create_table(name, schema)
        .unwrap_or_else(|e| panic!("create_table: {e}"));
    store
}

fn bump_fact(store: &mut TableStore, name: &str, v: u64) {
    let handle = store.lookup(name).unwrap_or_else(|| panic!("no fact table"));
    store
        .insert(handle, vec![Value::from(v)])
        .unwrap_or_else(|e| panic!("insert: {e}"));
}

const CASCADE: &str = r"
    target t1 { depends = [$f]; update = [trace] { t1 }; }
    target t2 { depends = [t1]; update = [trace] { t2 }; }
";

#[test]
fn fact_write_cascades_through_dependent_targets_in_order() {
    let (mut resolver, log) = build(CASCADE);
    let mut store = store_with_fact("f");

    // First update runs the whole (initially stale) closure.
    resolver.update_target(&mut store, "t2", &[]).unwrap();
    assert_eq!(*log.borrow(), vec!["t1", "t2"]);
    log.borrow_mut().clear();

    bump_fact(&mut store, "f", 1);
    let executed = resolver.update_target(&mut store, "t2", &[]).unwrap();
    assert_eq!(executed, 2);
    assert_eq!(*log.borrow(), vec!["t1", "t2"]);
}

#[test]
fn settled_targets_execute_zero_scripts() {
    let (mut resolver, log) = build(CASCADE);
    let mut store = store_with_fact("f");

    resolver.update_target(&mut store, "t2", &[]).unwrap();
    log.borrow_mut().clear();

    let executed = resolver.update_target(&mut store, "t2", &[]).unwrap();
    assert_eq!(executed, 0);
    assert!(log.borrow().is_empty());
}

#[test]
fn script_failure_restores_stamps_and_staleness() {
    // t1 succeeds, t2 exits 1: the call fails, t1's stamp is rolled back to
    // its pre-call value, and both targets stay due for re-evaluation.
    let (mut resolver, log) = build(
        r"
        target t1 { depends = [$f]; update = [trace] { t1 }; }
        target t2 { depends = [t1]; update = [trace] { t2!1 }; }
    ",
    );
    let mut store = store_with_fact("f");

    let before = resolver.target("t1").map(warden_resolver::Target::stamp);
    match resolver.update_target(&mut store, "t2", &[]) {
        Err(ResolverError::ScriptFailed { target, code }) => {
            assert_eq!(target, "t2");
            assert_eq!(code, 1);
        }
        other => unreachable!("expected ScriptFailed, got {other:?}"),
    }
    assert_eq!(*log.borrow(), vec!["t1", "t2"]);

    let t1 = resolver.target("t1").unwrap_or_else(|| panic!("t1"));
    assert_eq!(Some(t1.stamp()), before);
    assert!(t1.is_stale());
    assert!(resolver.target("t2").unwrap_or_else(|| panic!("t2")).is_stale());

    // The next attempt re-runs the whole closure (and fails the same way).
    log.borrow_mut().clear();
    assert!(resolver.update_target(&mut store, "t2", &[]).is_err());
    assert_eq!(*log.borrow(), vec!["t1", "t2"]);
}

#[test]
fn bindings_are_framed_and_visible_to_scripts() {
    let (mut resolver, log) = build("target t { depends = [$f]; update = [trace] { t }; }");
    let mut store = store_with_fact("f");
    resolver.declare_variable("x", ScriptType::U32).unwrap();

    resolver
        .update_target(&mut store, "t", &[("x", ScriptValue::U32(7))])
        .unwrap();
    assert_eq!(*log.borrow(), vec!["t(x=7)"]);

    // The frame is popped afterwards; the binding does not leak.
    assert_eq!(resolver.context().get("x"), None);
}

#[test]
fn binding_an_undeclared_variable_fails() {
    let (mut resolver, _) = build("target t {}");
    let mut store = TableStore::new();
    assert!(matches!(
        resolver.update_target(&mut store, "t", &[("ghost", ScriptValue::Bool(true))]),
        Err(ResolverError::UnknownVariable(_))
    ));
}

#[test]
fn binding_with_the_wrong_type_fails() {
    let (mut resolver, _) = build("target t {}");
    let mut store = TableStore::new();
    resolver.declare_variable("x", ScriptType::String).unwrap();
    assert!(matches!(
        resolver.update_target(&mut store, "t", &[("x", ScriptValue::U32(1))]),
        Err(ResolverError::TypeMismatch { .. })
    ));
}

#[test]
fn cyclic_graphs_are_rejected_at_parse_time() {
    let err = ResolverBuilder::new()
        .parse_str("target a { depends = [b]; } target b { depends = [a]; }")
        .err();
    match err {
        Some(ResolverError::CyclicGraph { path }) => {
            assert!(path.len() >= 3);
            assert_eq!(path.first(), path.last());
        }
        other => unreachable!("expected CyclicGraph, got {other:?}"),
    }
}

#[test]
fn unknown_dependencies_are_rejected_at_link_time() {
    let err = ResolverBuilder::new()
        .parse_str("target a { depends = [nope]; }")
        .err();
    assert!(matches!(
        err,
        Some(ResolverError::UnknownDependency { .. })
    ));
}

#[test]
fn unknown_interpreter_tags_are_rejected() {
    let err = ResolverBuilder::new()
        .parse_str("target a { update = [lua] { x }; }")
        .err();
    assert!(matches!(err, Some(ResolverError::UnknownInterpreter(_))));
}

#[test]
fn compile_errors_carry_the_target_and_detail() {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let err = ResolverBuilder::new()
        .register_interpreter(Box::new(TraceInterpreter { log }))
        .parse_str("target a { update = [trace] { bad-syntax }; }")
        .err();
    match err {
        Some(ResolverError::CompileFailed { target, detail }) => {
            assert_eq!(target, "a");
            assert_eq!(detail, "bad syntax");
        }
        other => unreachable!("expected CompileFailed, got {other:?}"),
    }
}

#[test]
fn unknown_target_update_is_an_error() {
    let (mut resolver, _) = build("target t {}");
    let mut store = TableStore::new();
    assert!(matches!(
        resolver.update_target(&mut store, "missing", &[]),
        Err(ResolverError::UnknownTarget(_))
    ));
}

#[test]
fn facts_may_appear_after_linking() {
    // $ghost has no table at link time; its stamp reads as absent. Once the
    // table shows up and changes, the dependent target goes stale again.
    let (mut resolver, log) = build("target t { depends = [$ghost]; update = [trace] { t }; }");
    let mut store = TableStore::new();

    resolver.update_target(&mut store, "t", &[]).unwrap();
    assert_eq!(resolver.update_target(&mut store, "t", &[]).unwrap(), 0);
    log.borrow_mut().clear();

    let schema = warden_db::TableSchema::new(vec![ColumnDef::new("v", ColumnType::Unsigned)], &[])
        .unwrap_or_else(|e| panic!("schema: {e}"));
    store.create_table("ghost", schema).unwrap();
    bump_fact(&mut store, "ghost", 1);

    assert_eq!(resolver.update_target(&mut store, "t", &[]).unwrap(), 1);
    assert_eq!(*log.borrow(), vec!["t"]);
}

#[test]
fn diamond_dependencies_run_each_target_once() {
    // top depends on left and right, both depend on the same fact; a fact
    // write runs each script exactly once, leaves before the join.
    let (mut resolver, log) = build(
        r"
        target left  { depends = [$f]; update = [trace] { left }; }
        target right { depends = [$f]; update = [trace] { right }; }
        target top   { depends = [left, right]; update = [trace] { top }; }
    ",
    );
    let mut store = store_with_fact("f");

    resolver.update_target(&mut store, "top", &[]).unwrap();
    assert_eq!(*log.borrow(), vec!["left", "right", "top"]);
    log.borrow_mut().clear();

    bump_fact(&mut store, "f", 2);
    let executed = resolver.update_target(&mut store, "top", &[]).unwrap();
    assert_eq!(executed, 3);
    assert_eq!(*log.borrow(), vec!["left", "right", "top"]);
}

#[test]
fn dumps_render_targets_and_facts() {
    let (resolver, _) = build(CASCADE);
    let mut buf = String::new();
    resolver.dump_targets(&mut buf).unwrap();
    assert!(buf.contains("2 targets"));
    assert!(buf.contains("t2"));
    assert!(buf.contains("$f"));

    buf.clear();
    resolver.dump_facts(&mut buf).unwrap();
    assert!(buf.contains("1 facts"));
    assert!(buf.contains("#0: f"));
}
