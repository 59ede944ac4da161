// SPDX-License-Identifier: Apache-2.0

//! Row selection: a conjunction of per-column conditions.

use std::cmp::Ordering;

use crate::error::StoreError;
use crate::schema::TableSchema;
use crate::value::{Row, Value};

/// Comparison operator of a query clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl Cond {
    fn admits(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone)]
struct Clause {
    column: String,
    cond: Cond,
    value: Value,
}

/// A conjunction of column conditions; an empty query matches every row.
///
/// Column names are resolved against the table schema when the query runs, so
/// a query can be built without a schema in hand. Unknown columns surface as
/// [`StoreError::UnknownColumn`] at select time.
#[derive(Debug, Clone, Default)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// An empty query matching all rows.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds a clause; clauses combine with logical AND.
    #[must_use]
    pub fn and(mut self, column: &str, cond: Cond, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause {
            column: column.to_owned(),
            cond,
            value: value.into(),
        });
        self
    }

    /// Resolves the clause columns against `schema`.
    pub(crate) fn compile(&self, schema: &TableSchema) -> Result<CompiledQuery, StoreError> {
        let mut clauses = Vec::with_capacity(self.clauses.len());
        for c in &self.clauses {
            let pos = schema.column_position(&c.column)?;
            let col = &schema.columns()[pos];
            if c.value.column_type() != col.ty {
                return Err(StoreError::TypeMismatch {
                    column: col.name.clone(),
                    expected: col.ty.name(),
                    got: c.value.column_type().name(),
                });
            }
            clauses.push((pos, c.cond, c.value.clone()));
        }
        Ok(CompiledQuery { clauses })
    }
}

/// A query with column names resolved to positions.
#[derive(Debug)]
pub(crate) struct CompiledQuery {
    clauses: Vec<(usize, Cond, Value)>,
}

impl CompiledQuery {
    pub(crate) fn matches(&self, row: &Row) -> bool {
        self.clauses
            .iter()
            .all(|(pos, cond, value)| cond.admits(row[*pos].total_cmp(value)))
    }
}
