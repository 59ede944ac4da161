// SPDX-License-Identifier: Apache-2.0

//! The resolver: link step, staleness tracking, topological evaluation.
//!
//! Staleness clock: the resolver keeps a logical u64 clock. Each fact records
//! the backing table's last-seen stamp and the clock value at which it last
//! advanced; each target records the clock value of its last successful
//! evaluation. A target needs re-evaluation when it is flagged stale or when
//! any dependency (fact advance, or dependency target stamp) is newer than
//! its own stamp.
//!
//! Failure rollback: when a script exits non-zero the stamps and stale flags
//! of every target evaluated earlier in the same call are restored, so the
//! whole closure re-runs on the next attempt.

use std::fmt;
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use warden_db::TableStore;

use crate::context::ContextTable;
use crate::error::ResolverError;
use crate::interp::{Interpreter, ScriptEnv};
use crate::parser::{parse_rules, RawDep, RawTarget};
use crate::target::{DepRef, Fact, FactId, ScriptBlock, Target, TargetId};
use crate::value::{ScriptType, ScriptValue};

/// Assembles a [`Resolver`]: register interpreters, then parse the rule set.
#[derive(Default)]
pub struct ResolverBuilder {
    interpreters: Vec<Box<dyn Interpreter>>,
}

impl fmt::Debug for ResolverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverBuilder")
            .field("interpreters", &self.interpreters.len())
            .finish()
    }
}

impl ResolverBuilder {
    /// Creates a builder with no interpreters registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a script runtime; a later registration under the same tag
    /// replaces the earlier one.
    #[must_use]
    pub fn register_interpreter(mut self, interpreter: Box<dyn Interpreter>) -> Self {
        if let Some(slot) = self
            .interpreters
            .iter_mut()
            .find(|i| i.name() == interpreter.name())
        {
            *slot = interpreter;
        } else {
            self.interpreters.push(interpreter);
        }
        self
    }

    /// Parses and links a rule file from disk.
    pub fn parse_file(self, path: impl AsRef<Path>) -> Result<Resolver, ResolverError> {
        let source = std::fs::read_to_string(path)?;
        self.parse_str(&source)
    }

    /// Parses and links a rule set from a string.
    pub fn parse_str(self, source: &str) -> Result<Resolver, ResolverError> {
        let raw = parse_rules(source)?;
        link(self.interpreters, raw)
    }
}

/// Resolves dependency names, rejects cycles, computes ranks, compiles
/// scripts.
fn link(
    interpreters: Vec<Box<dyn Interpreter>>,
    raw: Vec<RawTarget>,
) -> Result<Resolver, ResolverError> {
    let mut by_name: FxHashMap<String, TargetId> = FxHashMap::default();
    for (i, rt) in raw.iter().enumerate() {
        by_name.insert(rt.name.clone(), TargetId(u32::try_from(i).unwrap_or(0)));
    }

    let mut facts: Vec<Fact> = Vec::new();
    let mut fact_by_name: FxHashMap<String, FactId> = FxHashMap::default();
    let mut resolved: Vec<Vec<DepRef>> = Vec::with_capacity(raw.len());

    for rt in &raw {
        let mut deps = Vec::with_capacity(rt.deps.len());
        for dep in &rt.deps {
            match dep {
                RawDep::Target(name) => {
                    let id = by_name.get(name).copied().ok_or_else(|| {
                        ResolverError::UnknownDependency {
                            target: rt.name.clone(),
                            dependency: name.clone(),
                        }
                    })?;
                    deps.push(DepRef::Target(id));
                }
                RawDep::Fact(name) => {
                    let id = *fact_by_name.entry(name.clone()).or_insert_with(|| {
                        let id = FactId(u32::try_from(facts.len()).unwrap_or(0));
                        facts.push(Fact::new(name.clone()));
                        id
                    });
                    deps.push(DepRef::Fact(id));
                }
            }
        }
        resolved.push(deps);
    }

    if let Some(path) = find_cycle(&raw, &resolved) {
        return Err(ResolverError::CyclicGraph { path });
    }
    let ranks = compute_ranks(&resolved);

    let mut targets = Vec::with_capacity(raw.len());
    for ((rt, deps), rank) in raw.into_iter().zip(resolved).zip(ranks) {
        let script = match rt.script {
            None => None,
            Some((tag, source)) => {
                let interpreter = interpreters
                    .iter()
                    .find(|i| i.name() == tag)
                    .ok_or_else(|| ResolverError::UnknownInterpreter(tag.clone()))?;
                let compiled =
                    interpreter
                        .compile(&source)
                        .map_err(|detail| ResolverError::CompileFailed {
                            target: rt.name.clone(),
                            detail,
                        })?;
                Some(ScriptBlock { tag, compiled })
            }
        };
        targets.push(Target {
            name: rt.name,
            deps,
            script,
            stale: true,
            stamp: 0,
            rank,
        });
    }

    debug!(targets = targets.len(), facts = facts.len(), "resolver linked");
    Ok(Resolver {
        targets,
        by_name,
        facts,
        ctx: ContextTable::new(),
        clock: 0,
        active: None,
    })
}

/// Three-colour DFS; returns one full walk of a cycle when present.
fn find_cycle(raw: &[RawTarget], deps: &[Vec<DepRef>]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    fn visit(
        id: usize,
        raw: &[RawTarget],
        deps: &[Vec<DepRef>],
        colours: &mut [Colour],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        colours[id] = Colour::Grey;
        stack.push(id);
        for dep in &deps[id] {
            let DepRef::Target(tid) = *dep else { continue };
            let next = tid.index();
            match colours[next] {
                Colour::White => {
                    if let Some(path) = visit(next, raw, deps, colours, stack) {
                        return Some(path);
                    }
                }
                Colour::Grey => {
                    let start = stack.iter().position(|x| *x == next).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|i| raw[*i].name.clone()).collect();
                    path.push(raw[next].name.clone());
                    return Some(path);
                }
                Colour::Black => {}
            }
        }
        stack.pop();
        colours[id] = Colour::Black;
        None
    }

    let mut colours = vec![Colour::White; raw.len()];
    let mut stack = Vec::new();
    for id in 0..raw.len() {
        if colours[id] == Colour::White {
            if let Some(path) = visit(id, raw, deps, &mut colours, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}

/// Topological rank: zero for targets with no target dependencies, otherwise
/// one past the deepest dependency. Call only on an acyclic graph.
fn compute_ranks(deps: &[Vec<DepRef>]) -> Vec<u32> {
    fn rank_of(id: usize, deps: &[Vec<DepRef>], memo: &mut [Option<u32>]) -> u32 {
        if let Some(r) = memo[id] {
            return r;
        }
        let r = deps[id]
            .iter()
            .filter_map(|d| match d {
                DepRef::Target(tid) => Some(rank_of(tid.index(), deps, memo) + 1),
                DepRef::Fact(_) => None,
            })
            .max()
            .unwrap_or(0);
        memo[id] = Some(r);
        r
    }

    let mut memo = vec![None; deps.len()];
    (0..deps.len())
        .map(|id| rank_of(id, deps, &mut memo))
        .collect()
}

/// The linked target graph plus its evaluation state.
#[derive(Debug)]
pub struct Resolver {
    targets: Vec<Target>,
    by_name: FxHashMap<String, TargetId>,
    facts: Vec<Fact>,
    ctx: ContextTable,
    clock: u64,
    active: Option<String>,
}

impl Resolver {
    /// Declares a typed context variable; scripts see it once set.
    pub fn declare_variable(&mut self, name: &str, ty: ScriptType) -> Result<(), ResolverError> {
        self.ctx.declare(name, ty)
    }

    /// The context table (current variable values).
    #[must_use]
    pub fn context(&self) -> &ContextTable {
        &self.ctx
    }

    /// A target by name.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.by_name.get(name).map(|id| &self.targets[id.index()])
    }

    /// All targets, in rule-file order.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// All facts, in first-reference order.
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Re-evaluates `name` and its stale transitive dependencies, visiting
    /// them in topological order (rank, then name). Returns the number of
    /// scripts executed.
    ///
    /// `bindings` are pushed as a context frame for the duration of the call;
    /// every name must have been declared. On script failure the stamps and
    /// stale flags touched by this call are restored and
    /// [`ResolverError::ScriptFailed`] is returned.
    pub fn update_target(
        &mut self,
        store: &mut TableStore,
        name: &str,
        bindings: &[(&str, ScriptValue)],
    ) -> Result<usize, ResolverError> {
        if let Some(active) = &self.active {
            return Err(ResolverError::Reentrancy(active.clone()));
        }
        let root = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| ResolverError::UnknownTarget(name.to_owned()))?;

        self.active = Some(name.to_owned());
        self.ctx.push_frame();
        let result = self.evaluate(store, root, bindings);
        self.ctx.pop_frame();
        self.active = None;
        result
    }

    fn evaluate(
        &mut self,
        store: &mut TableStore,
        root: TargetId,
        bindings: &[(&str, ScriptValue)],
    ) -> Result<usize, ResolverError> {
        for (name, value) in bindings {
            self.ctx.set(name, value.clone())?;
        }
        self.refresh_facts(store);

        let mut closure = self.closure(root);
        closure.sort_by(|a, b| {
            let ta = &self.targets[a.index()];
            let tb = &self.targets[b.index()];
            ta.rank.cmp(&tb.rank).then_with(|| ta.name.cmp(&tb.name))
        });

        let snapshot = self.ctx.snapshot();
        let mut touched: Vec<(TargetId, u64, bool)> = Vec::new();
        let mut scripts_run = 0usize;

        for id in closure {
            if !self.needs_update(id) {
                continue;
            }
            let target_name = self.targets[id.index()].name.clone();
            debug!(target = %target_name, "evaluating target");

            let status = match self.targets[id.index()].script.as_mut() {
                None => None,
                Some(block) => {
                    if let Err(detail) = block.compiled.prepare(&snapshot) {
                        warn!(target = %target_name, %detail, "script prepare failed");
                        Some(-1)
                    } else {
                        let status = block.compiled.execute(&mut ScriptEnv {
                            store: &mut *store,
                            ctx: &snapshot,
                        });
                        block.compiled.cleanup();
                        Some(status)
                    }
                }
            };
            if let Some(status) = status {
                if status != 0 {
                    self.restore(&touched);
                    return Err(ResolverError::ScriptFailed {
                        target: target_name,
                        code: status,
                    });
                }
                scripts_run += 1;
            }

            let target = &self.targets[id.index()];
            touched.push((id, target.stamp, target.stale));
            self.clock += 1;
            let target = &mut self.targets[id.index()];
            target.stamp = self.clock;
            target.stale = false;
        }

        Ok(scripts_run)
    }

    /// Advances the fact clock for every fact whose backing table stamp moved
    /// since the last look.
    fn refresh_facts(&mut self, store: &TableStore) {
        for fact in &mut self.facts {
            let current = store.stamp_by_name(&fact.name);
            if current != fact.last_stamp {
                self.clock += 1;
                fact.changed_at = self.clock;
                fact.last_stamp = current;
            }
        }
    }

    fn needs_update(&self, id: TargetId) -> bool {
        let target = &self.targets[id.index()];
        if target.stale {
            return true;
        }
        target.deps.iter().any(|dep| match dep {
            DepRef::Target(tid) => self.targets[tid.index()].stamp > target.stamp,
            DepRef::Fact(fid) => self.facts[fid.index()].changed_at > target.stamp,
        })
    }

    /// Transitive target dependencies of `root`, root included.
    fn closure(&self, root: TargetId) -> Vec<TargetId> {
        let mut seen = vec![false; self.targets.len()];
        let mut stack = vec![root];
        let mut out = Vec::new();
        while let Some(id) = stack.pop() {
            if seen[id.index()] {
                continue;
            }
            seen[id.index()] = true;
            out.push(id);
            for dep in &self.targets[id.index()].deps {
                if let DepRef::Target(tid) = dep {
                    stack.push(*tid);
                }
            }
        }
        out
    }

    fn restore(&mut self, touched: &[(TargetId, u64, bool)]) {
        for (id, stamp, stale) in touched {
            let target = &mut self.targets[id.index()];
            target.stamp = *stamp;
            target.stale = *stale;
        }
    }

    // ------------------------------------------------------------------
    // Dumps
    // ------------------------------------------------------------------

    /// Renders the target graph to `out`.
    pub fn dump_targets(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{} targets", self.targets.len())?;
        for (i, target) in self.targets.iter().enumerate() {
            let deps: Vec<String> = target
                .deps
                .iter()
                .map(|dep| match dep {
                    DepRef::Target(tid) => self.targets[tid.index()].name.clone(),
                    DepRef::Fact(fid) => format!("${}", self.facts[fid.index()].name),
                })
                .collect();
            let stale = if target.stale { ", stale" } else { "" };
            write!(
                out,
                "  #{i}: {} (rank {}, stamp {}{stale})",
                target.name, target.rank, target.stamp
            )?;
            if !deps.is_empty() {
                write!(out, " <- {}", deps.join(", "))?;
            }
            if let Some(block) = &target.script {
                write!(out, " [{}]", block.tag)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Renders the fact list to `out`.
    pub fn dump_facts(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{} facts", self.facts.len())?;
        for (i, fact) in self.facts.iter().enumerate() {
            writeln!(out, "  #{i}: {} (changed at {})", fact.name, fact.changed_at)?;
        }
        Ok(())
    }
}
