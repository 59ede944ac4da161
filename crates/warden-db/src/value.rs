// SPDX-License-Identifier: Apache-2.0

//! Column value types.
//!
//! Tables carry a fixed column schema; every cell holds a [`Value`] whose
//! variant must match the column's declared [`ColumnType`]. The four types
//! mirror the classic varchar/integer/unsigned/floating quartet.

use std::cmp::Ordering;
use std::fmt;

/// Declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text of arbitrary length.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// Unsigned 64-bit integer.
    Unsigned,
    /// 64-bit IEEE float.
    Floating,
}

impl ColumnType {
    /// Short lowercase name used in diagnostics and dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Unsigned => "unsigned",
            Self::Floating => "floating",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer.
    Unsigned(u64),
    /// Floating point.
    Floating(f64),
}

impl Value {
    /// Returns the column type this value conforms to.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::String(_) => ColumnType::String,
            Self::Integer(_) => ColumnType::Integer,
            Self::Unsigned(_) => ColumnType::Unsigned,
            Self::Floating(_) => ColumnType::Floating,
        }
    }

    /// Total order within a single column type; values of differing types
    /// compare by type tag so index keys stay well ordered.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Unsigned(a), Self::Unsigned(b)) => a.cmp(b),
            (Self::Floating(a), Self::Floating(b)) => a.total_cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    const fn type_rank(&self) -> u8 {
        match self {
            Self::String(_) => 0,
            Self::Integer(_) => 1,
            Self::Unsigned(_) => 2,
            Self::Floating(_) => 3,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Unsigned(u) => write!(f, "{u}"),
            Self::Floating(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Self::Unsigned(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Floating(x)
    }
}

/// A row is one value per schema column, in schema order.
pub type Row = Vec<Value>;

/// Index key: the values of the indexed columns, in index order.
///
/// Hashed by the canonical display rendering so `Floating` cells (which do
/// not implement `Hash`) can participate; index columns are normally strings
/// or integers.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKey(pub Vec<Value>);

impl Eq for IndexKey {}

impl std::hash::Hash for IndexKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for v in &self.0 {
            match v {
                Value::String(s) => {
                    state.write_u8(0);
                    s.hash(state);
                }
                Value::Integer(i) => {
                    state.write_u8(1);
                    i.hash(state);
                }
                Value::Unsigned(u) => {
                    state.write_u8(2);
                    u.hash(state);
                }
                Value::Floating(x) => {
                    state.write_u8(3);
                    x.to_bits().hash(state);
                }
            }
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}
