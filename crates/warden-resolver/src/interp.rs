// SPDX-License-Identifier: Apache-2.0

//! The interpreter bridge.
//!
//! Script runtimes plug in behind two narrow traits: an [`Interpreter`]
//! compiles source text into a [`Script`], which the resolver prepares with a
//! context snapshot and executes against the fact store. Exactly one
//! interpreter owns each target's script, chosen by the bracketed tag in the
//! rule file.

use warden_db::TableStore;

use crate::context::ContextSnapshot;

/// Environment handed to a script at execution time: the fact store and the
/// frozen context bindings.
pub struct ScriptEnv<'a> {
    /// The fact tables; scripts may read and write them.
    pub store: &'a mut TableStore,
    /// Context variables as of prepare time.
    pub ctx: &'a ContextSnapshot,
}

impl std::fmt::Debug for ScriptEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEnv").finish_non_exhaustive()
    }
}

/// A compiled script artifact.
pub trait Script {
    /// Binds the context snapshot; called before every execution.
    fn prepare(&mut self, ctx: &ContextSnapshot) -> Result<(), String>;

    /// Runs the script; zero means success, anything else aborts the update.
    fn execute(&mut self, env: &mut ScriptEnv<'_>) -> i32;

    /// Releases per-execution state; idempotent.
    fn cleanup(&mut self) {}
}

/// A pluggable script runtime, registered under a short tag.
pub trait Interpreter {
    /// The registration tag matched against `[tag]` in rule files.
    fn name(&self) -> &str;

    /// Compiles source text; the error string becomes the compile diagnostic.
    fn compile(&self, source: &str) -> Result<Box<dyn Script>, String>;
}

/// Built-in interpreter whose scripts accept anything and always succeed.
/// Stands in where a real runtime is a plugin concern.
#[derive(Debug, Default)]
pub struct NoopInterpreter;

impl Interpreter for NoopInterpreter {
    fn name(&self) -> &str {
        "noop"
    }

    fn compile(&self, _source: &str) -> Result<Box<dyn Script>, String> {
        Ok(Box::new(NoopScript))
    }
}

struct NoopScript;

impl Script for NoopScript {
    fn prepare(&mut self, _ctx: &ContextSnapshot) -> Result<(), String> {
        Ok(())
    }

    fn execute(&mut self, _env: &mut ScriptEnv<'_>) -> i32 {
        0
    }
}
