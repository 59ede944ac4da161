// SPDX-License-Identifier: Apache-2.0

//! Resolver error taxonomy.

use thiserror::Error;

/// Errors emitted by rule parsing, graph linking, and target evaluation.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Rule file could not be read.
    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),
    /// Rule file syntax error.
    #[error("parse error at line {line}: {detail}")]
    Parse {
        /// 1-based line of the offending token.
        line: usize,
        /// What went wrong.
        detail: String,
    },
    /// A dependency names neither a target nor a fact reference.
    #[error("target {target}: unknown dependency {dependency}")]
    UnknownDependency {
        /// Target whose dependency list failed to link.
        target: String,
        /// The unresolvable name.
        dependency: String,
    },
    /// The target graph contains a cycle; the path walks it once.
    #[error("cyclic target graph: {}", path.join(" -> "))]
    CyclicGraph {
        /// One full walk of the cycle, first node repeated last.
        path: Vec<String>,
    },
    /// No target is registered under this name.
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    /// A script block names an unregistered interpreter.
    #[error("unknown interpreter: {0}")]
    UnknownInterpreter(String),
    /// A binding names an undeclared context variable.
    #[error("unknown context variable: {0}")]
    UnknownVariable(String),
    /// A context variable was redeclared or bound with a different type.
    #[error("type mismatch for variable {name}: expected {expected}, got {got}")]
    TypeMismatch {
        /// Variable name.
        name: String,
        /// Declared type.
        expected: &'static str,
        /// Supplied type.
        got: &'static str,
    },
    /// Script compilation failed at link time.
    #[error("failed to compile script of target {target}: {detail}")]
    CompileFailed {
        /// Target whose script failed to compile.
        target: String,
        /// Interpreter diagnostic.
        detail: String,
    },
    /// A script returned a non-zero status during evaluation.
    #[error("script of target {target} failed with status {code}")]
    ScriptFailed {
        /// Target whose script failed.
        target: String,
        /// The non-zero status.
        code: i32,
    },
    /// `update_target` was re-entered while an update was in flight.
    #[error("resolver re-entered while updating {0}")]
    Reentrancy(String),
}
