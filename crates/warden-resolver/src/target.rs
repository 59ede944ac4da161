// SPDX-License-Identifier: Apache-2.0

//! Target and fact records.
//!
//! Targets live in a vector keyed by stable [`TargetId`]; dependency edges
//! are id arrays referencing either other targets or facts. Facts track the
//! backing table's stamp and the resolver clock value at which the table last
//! advanced.

use crate::interp::Script;

/// Stable index of a target in the resolver's target vector.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) u32);

impl TargetId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable index of a fact in the resolver's fact vector.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactId(pub(crate) u32);

impl FactId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resolved dependency edge.
#[derive(Debug, Clone, Copy)]
pub enum DepRef {
    /// Another target, by id.
    Target(TargetId),
    /// A fact table, by id.
    Fact(FactId),
}

/// A fact: an observable store table referenced with the `$` sigil.
///
/// The table does not have to exist when the rule file is linked; its stamp
/// reads as absent until it appears, and the first observation counts as an
/// advance.
#[derive(Debug)]
pub struct Fact {
    pub(crate) name: String,
    pub(crate) last_stamp: Option<u32>,
    pub(crate) changed_at: u64,
}

impl Fact {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            last_stamp: None,
            changed_at: 0,
        }
    }

    /// The fact (table) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A compiled script block attached to a target.
pub(crate) struct ScriptBlock {
    pub(crate) tag: String,
    pub(crate) compiled: Box<dyn Script>,
}

impl std::fmt::Debug for ScriptBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBlock")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// A declarative rule: dependencies plus an optional update script.
#[derive(Debug)]
pub struct Target {
    pub(crate) name: String,
    pub(crate) deps: Vec<DepRef>,
    pub(crate) script: Option<ScriptBlock>,
    pub(crate) stale: bool,
    pub(crate) stamp: u64,
    pub(crate) rank: u32,
}

impl Target {
    /// The target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the target is flagged for re-evaluation.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Logical-clock stamp of the last successful evaluation.
    #[must_use]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Precomputed topological rank (leaves have rank zero).
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.rank
    }
}
