// SPDX-License-Identifier: Apache-2.0

//! Table schemas: column definitions and the optional unique index.

use crate::error::StoreError;
use crate::value::ColumnType;

/// Bitfield over table columns, bit *i* = column *i* in schema order.
pub type ColMask = u32;

/// Mask covering every column of a `width`-column table.
#[must_use]
pub fn full_mask(width: usize) -> ColMask {
    if width >= 32 {
        ColMask::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// One column of a table schema.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name, unique within the table.
    pub name: String,
    /// Declared cell type.
    pub ty: ColumnType,
}

impl ColumnDef {
    /// Convenience constructor.
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_owned(),
            ty,
        }
    }
}

/// Fixed column layout of a table plus the optional unique index.
///
/// The index, when present, is a non-empty list of column names; the tuple of
/// those columns' values must be unique across the table's rows.
#[derive(Debug, Clone)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
    index: Vec<usize>,
}

impl TableSchema {
    /// Maximum number of columns; bounded by the [`ColMask`] width.
    pub const MAX_COLUMNS: usize = 32;

    /// Builds a schema, validating column names and the index column list.
    pub fn new(columns: Vec<ColumnDef>, index_columns: &[&str]) -> Result<Self, StoreError> {
        if columns.is_empty() {
            return Err(StoreError::SchemaInvalid("no columns".into()));
        }
        if columns.len() > Self::MAX_COLUMNS {
            return Err(StoreError::SchemaInvalid(format!(
                "{} columns exceeds the maximum of {}",
                columns.len(),
                Self::MAX_COLUMNS
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(StoreError::SchemaInvalid(format!("column {i} has no name")));
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(StoreError::SchemaInvalid(format!(
                    "duplicate column name: {}",
                    col.name
                )));
            }
        }

        let mut index = Vec::with_capacity(index_columns.len());
        for name in index_columns {
            let pos = columns
                .iter()
                .position(|c| c.name == *name)
                .ok_or_else(|| {
                    StoreError::SchemaInvalid(format!("index references unknown column: {name}"))
                })?;
            if index.contains(&pos) {
                return Err(StoreError::SchemaInvalid(format!(
                    "index lists column twice: {name}"
                )));
            }
            index.push(pos);
        }

        Ok(Self { columns, index })
    }

    /// The ordered column definitions.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Positions of the indexed columns, empty when the table has no index.
    #[must_use]
    pub fn index_columns(&self) -> &[usize] {
        &self.index
    }

    /// Whether the table carries a unique index.
    #[must_use]
    pub fn has_index(&self) -> bool {
        !self.index.is_empty()
    }

    /// Resolves a column name to its position.
    pub fn column_position(&self, name: &str) -> Result<usize, StoreError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownColumn(name.to_owned()))
    }
}
