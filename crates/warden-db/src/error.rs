// SPDX-License-Identifier: Apache-2.0

//! Store error taxonomy.

use thiserror::Error;

/// Errors emitted by the table store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A table with the requested name already exists.
    #[error("table already exists: {0}")]
    AlreadyExists(String),
    /// The supplied schema is malformed (empty, duplicate columns, bad index).
    #[error("invalid schema: {0}")]
    SchemaInvalid(String),
    /// No table is registered under the given name or handle.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// The named column does not exist in the table schema.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    /// A value's type does not match the column it is destined for.
    #[error("type mismatch in column {column}: expected {expected}, got {got}")]
    TypeMismatch {
        /// Column the offending value was destined for.
        column: String,
        /// Type the schema declares.
        expected: &'static str,
        /// Type of the supplied value.
        got: &'static str,
    },
    /// A unique-index constraint was violated.
    #[error("unique constraint violated for key {0}")]
    Constraint(String),
    /// No row matches the given index key.
    #[error("no such row")]
    NoSuchRow,
    /// The table has no index; keyed update/delete is not possible.
    #[error("table has no index")]
    NoIndex,
    /// Commit or rollback was requested with no open transaction.
    #[error("no open transaction")]
    NoTransaction,
}
