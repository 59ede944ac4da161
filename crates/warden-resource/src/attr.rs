// SPDX-License-Identifier: Apache-2.0

//! Typed attribute records attached to zones and resource instances.
//!
//! An [`AttrSchema`] is an ordered list of named defaults; instantiating it
//! merges caller overrides over the defaults, rejecting unknown names and
//! type changes. The default value doubles as the type declaration.

use std::fmt;

use crate::error::ResourceError;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// UTF-8 text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer.
    Unsigned(u64),
    /// Floating point.
    Floating(f64),
}

impl AttrValue {
    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Unsigned(_) => "unsigned",
            Self::Floating(_) => "floating",
        }
    }

    fn same_type(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::String(_), Self::String(_))
                | (Self::Integer(_), Self::Integer(_))
                | (Self::Unsigned(_), Self::Unsigned(_))
                | (Self::Floating(_), Self::Floating(_))
        )
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Unsigned(u) => write!(f, "{u}"),
            Self::Floating(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u64> for AttrValue {
    fn from(u: u64) -> Self {
        Self::Unsigned(u)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        Self::Floating(x)
    }
}

/// One attribute definition: a name and its default value (which fixes the
/// type).
#[derive(Debug, Clone)]
pub struct AttrDef {
    /// Attribute name, unique within its schema.
    pub name: String,
    /// Default value; also the type declaration.
    pub value: AttrValue,
}

impl AttrDef {
    /// Convenience constructor.
    pub fn new(name: &str, value: impl Into<AttrValue>) -> Self {
        Self {
            name: name.to_owned(),
            value: value.into(),
        }
    }
}

/// Ordered attribute schema with unique names.
#[derive(Debug, Clone, Default)]
pub struct AttrSchema {
    defs: Vec<AttrDef>,
}

impl AttrSchema {
    /// Builds a schema; duplicate names are rejected.
    pub fn new(defs: Vec<AttrDef>) -> Result<Self, ResourceError> {
        for (i, def) in defs.iter().enumerate() {
            if defs[..i].iter().any(|d| d.name == def.name) {
                return Err(ResourceError::SchemaInvalid(format!(
                    "duplicate attribute name: {}",
                    def.name
                )));
            }
        }
        Ok(Self { defs })
    }

    /// The empty schema.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Ordered attribute definitions.
    #[must_use]
    pub fn defs(&self) -> &[AttrDef] {
        &self.defs
    }

    /// Merges `overrides` over the schema defaults.
    ///
    /// Unknown names are [`ResourceError::UnknownName`]; a value of the wrong
    /// type is [`ResourceError::TypeMismatch`].
    pub fn instantiate(&self, overrides: &[(&str, AttrValue)]) -> Result<AttrRecord, ResourceError> {
        let mut values: Vec<(String, AttrValue)> = self
            .defs
            .iter()
            .map(|d| (d.name.clone(), d.value.clone()))
            .collect();

        for (name, value) in overrides {
            let slot = values
                .iter_mut()
                .find(|(n, _)| n == name)
                .ok_or_else(|| ResourceError::UnknownName((*name).to_owned()))?;
            if !slot.1.same_type(value) {
                return Err(ResourceError::TypeMismatch {
                    name: (*name).to_owned(),
                    expected: slot.1.type_name(),
                    got: value.type_name(),
                });
            }
            slot.1 = value.clone();
        }
        Ok(AttrRecord { values })
    }
}

/// Materialized attribute values, in schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrRecord {
    values: Vec<(String, AttrValue)>,
}

impl AttrRecord {
    /// Looks an attribute up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterates `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AttrSchema {
        match AttrSchema::new(vec![
            AttrDef::new("role", "none"),
            AttrDef::new("weight", 1i64),
        ]) {
            Ok(s) => s,
            Err(e) => unreachable!("schema should build: {e}"),
        }
    }

    #[test]
    fn defaults_apply_when_no_override_given() {
        let rec = match schema().instantiate(&[]) {
            Ok(r) => r,
            Err(e) => unreachable!("instantiate: {e}"),
        };
        assert_eq!(rec.get("role"), Some(&AttrValue::from("none")));
        assert_eq!(rec.get("weight"), Some(&AttrValue::from(1i64)));
    }

    #[test]
    fn overrides_replace_defaults() {
        let rec = match schema().instantiate(&[("role", AttrValue::from("nav"))]) {
            Ok(r) => r,
            Err(e) => unreachable!("instantiate: {e}"),
        };
        assert_eq!(rec.get("role"), Some(&AttrValue::from("nav")));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        assert!(matches!(
            schema().instantiate(&[("bogus", AttrValue::from(1i64))]),
            Err(ResourceError::UnknownName(_))
        ));
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(matches!(
            schema().instantiate(&[("weight", AttrValue::from("heavy"))]),
            Err(ResourceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_names_are_rejected_at_schema_build() {
        assert!(matches!(
            AttrSchema::new(vec![AttrDef::new("a", 1i64), AttrDef::new("a", 2i64)]),
            Err(ResourceError::SchemaInvalid(_))
        ));
    }
}
