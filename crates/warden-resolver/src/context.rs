// SPDX-License-Identifier: Apache-2.0

//! Scoped context variables.
//!
//! A variable must be declared (with its type) before first use; redeclaring
//! with the same type is a no-op, with a different type an error. Frames nest
//! to arbitrary depth: `push_frame` opens a scope, assignments inside it are
//! undone by `pop_frame`.

use rustc_hash::FxHashMap;

use crate::error::ResolverError;
use crate::value::{ScriptType, ScriptValue};

#[derive(Debug)]
struct Variable {
    name: String,
    ty: ScriptType,
    value: Option<ScriptValue>,
}

/// One saved assignment: variable slot and its value before the frame.
type FrameEntry = (usize, Option<ScriptValue>);

/// Scoped, typed symbol table for script bindings.
#[derive(Debug, Default)]
pub struct ContextTable {
    vars: Vec<Variable>,
    by_name: FxHashMap<String, usize>,
    frames: Vec<Vec<FrameEntry>>,
}

impl ContextTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable. Redeclaration with the same type is accepted;
    /// with a different type it fails.
    pub fn declare(&mut self, name: &str, ty: ScriptType) -> Result<(), ResolverError> {
        if let Some(&slot) = self.by_name.get(name) {
            let existing = self.vars[slot].ty;
            if existing != ty {
                return Err(ResolverError::TypeMismatch {
                    name: name.to_owned(),
                    expected: existing.name(),
                    got: ty.name(),
                });
            }
            return Ok(());
        }
        let slot = self.vars.len();
        self.vars.push(Variable {
            name: name.to_owned(),
            ty,
            value: None,
        });
        self.by_name.insert(name.to_owned(), slot);
        Ok(())
    }

    /// Assigns a declared variable; the innermost open frame records the
    /// previous value for restoration.
    pub fn set(&mut self, name: &str, value: ScriptValue) -> Result<(), ResolverError> {
        let slot = *self
            .by_name
            .get(name)
            .ok_or_else(|| ResolverError::UnknownVariable(name.to_owned()))?;
        let var = &mut self.vars[slot];
        if value.script_type() != var.ty {
            return Err(ResolverError::TypeMismatch {
                name: name.to_owned(),
                expected: var.ty.name(),
                got: value.script_type().name(),
            });
        }
        let previous = var.value.replace(value);
        if let Some(frame) = self.frames.last_mut() {
            // Record only the first overwrite per frame; that is the value to
            // come back to.
            if !frame.iter().any(|(s, _)| *s == slot) {
                frame.push((slot, previous));
            }
        }
        Ok(())
    }

    /// Reads a variable's current value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScriptValue> {
        self.by_name
            .get(name)
            .and_then(|slot| self.vars[*slot].value.as_ref())
    }

    /// Declared type of a variable.
    #[must_use]
    pub fn type_of(&self, name: &str) -> Option<ScriptType> {
        self.by_name.get(name).map(|slot| self.vars[*slot].ty)
    }

    /// Opens a scope.
    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Closes the innermost scope, restoring every variable assigned in it.
    pub fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            for (slot, previous) in frame.into_iter().rev() {
                self.vars[slot].value = previous;
            }
        }
    }

    /// Immutable snapshot of all currently-set variables, in declaration
    /// order; handed to scripts at prepare time.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            values: self
                .vars
                .iter()
                .filter_map(|v| v.value.clone().map(|value| (v.name.clone(), value)))
                .collect(),
        }
    }
}

/// Frozen view of the context at script-prepare time.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    values: Vec<(String, ScriptValue)>,
}

impl ContextSnapshot {
    /// Reads a variable from the snapshot.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScriptValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterates `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScriptValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_restore_previous_values() {
        let mut ctx = ContextTable::new();
        ctx.declare("x", ScriptType::U32).ok();
        ctx.set("x", ScriptValue::U32(1)).ok();

        ctx.push_frame();
        ctx.set("x", ScriptValue::U32(2)).ok();
        ctx.set("x", ScriptValue::U32(3)).ok();
        assert_eq!(ctx.get("x"), Some(&ScriptValue::U32(3)));
        ctx.pop_frame();

        assert_eq!(ctx.get("x"), Some(&ScriptValue::U32(1)));
    }

    #[test]
    fn frames_nest() {
        let mut ctx = ContextTable::new();
        ctx.declare("x", ScriptType::String).ok();
        ctx.push_frame();
        ctx.set("x", ScriptValue::from("outer")).ok();
        ctx.push_frame();
        ctx.set("x", ScriptValue::from("inner")).ok();
        ctx.pop_frame();
        assert_eq!(ctx.get("x"), Some(&ScriptValue::from("outer")));
        ctx.pop_frame();
        assert_eq!(ctx.get("x"), None);
    }

    #[test]
    fn redeclaration_with_another_type_fails() {
        let mut ctx = ContextTable::new();
        ctx.declare("x", ScriptType::U32).ok();
        assert!(ctx.declare("x", ScriptType::U32).is_ok());
        assert!(matches!(
            ctx.declare("x", ScriptType::String),
            Err(ResolverError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn assignment_requires_declaration_and_matching_type() {
        let mut ctx = ContextTable::new();
        assert!(matches!(
            ctx.set("ghost", ScriptValue::Bool(true)),
            Err(ResolverError::UnknownVariable(_))
        ));
        ctx.declare("flag", ScriptType::Bool).ok();
        assert!(matches!(
            ctx.set("flag", ScriptValue::U32(1)),
            Err(ResolverError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn snapshot_sees_only_set_variables() {
        let mut ctx = ContextTable::new();
        ctx.declare("a", ScriptType::U32).ok();
        ctx.declare("b", ScriptType::U32).ok();
        ctx.set("a", ScriptValue::U32(7)).ok();

        let snap = ctx.snapshot();
        assert_eq!(snap.get("a"), Some(&ScriptValue::U32(7)));
        assert_eq!(snap.get("b"), None);
    }
}
