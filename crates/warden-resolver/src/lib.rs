// SPDX-License-Identifier: Apache-2.0
//! warden-resolver: declarative dependency re-evaluation.
//!
//! A rule file declares named targets with dependencies on other targets and
//! on fact tables (`$name`), plus optional update scripts run by pluggable
//! interpreters. Updating a target re-runs the scripts of its stale
//! transitive dependencies in topological order.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod context;
mod error;
mod interp;
mod parser;
mod resolver;
mod target;
mod value;

pub use context::{ContextSnapshot, ContextTable};
pub use error::ResolverError;
pub use interp::{Interpreter, NoopInterpreter, Script, ScriptEnv};
pub use resolver::{Resolver, ResolverBuilder};
pub use target::{DepRef, Fact, FactId, Target, TargetId};
pub use value::{ScriptType, ScriptValue};
