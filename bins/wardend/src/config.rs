// SPDX-License-Identifier: Apache-2.0

//! Bootstrap configuration: zones, classes, and resource definitions,
//! loaded from a JSON file and applied to a fresh registry.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use warden_resource::{AttrDef, AttrSchema, AttrValue, Registry, ResourceError};

#[derive(Debug, Deserialize)]
pub struct AttrDefCfg {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub default: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ZoneCfg {
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ClassCfg {
    pub name: String,
    pub priority: u32,
}

#[derive(Debug, Deserialize)]
pub struct ResourceCfg {
    pub name: String,
    #[serde(default)]
    pub shareable: bool,
    #[serde(default)]
    pub attributes: Vec<AttrDefCfg>,
}

/// Top-level bootstrap file.
#[derive(Debug, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub zone_attributes: Vec<AttrDefCfg>,
    pub zones: Vec<ZoneCfg>,
    pub classes: Vec<ClassCfg>,
    pub resources: Vec<ResourceCfg>,
    /// Target re-resolved after grant changes, when a rule file is loaded.
    #[serde(default)]
    pub resolve_on_grant: Option<String>,
}

impl BootstrapConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Builds the registry this config describes.
    pub fn build_registry(&self) -> Result<Registry, ResourceError> {
        let mut registry = Registry::new();

        if !self.zone_attributes.is_empty() {
            let schema = attr_schema(&self.zone_attributes)?;
            registry.define_zone_schema(schema)?;
        }
        for zone in &self.zones {
            let overrides = zone_overrides(&self.zone_attributes, &zone.attributes)?;
            let refs: Vec<(&str, AttrValue)> = overrides
                .iter()
                .map(|(n, v)| (n.as_str(), v.clone()))
                .collect();
            registry.create_zone(&zone.name, &refs)?;
        }
        for class in &self.classes {
            registry.create_class(&class.name, class.priority)?;
        }
        for resource in &self.resources {
            let schema = attr_schema(&resource.attributes)?;
            registry.create_resource(&resource.name, resource.shareable, schema)?;
        }
        Ok(registry)
    }
}

fn attr_schema(cfgs: &[AttrDefCfg]) -> Result<AttrSchema, ResourceError> {
    let mut defs = Vec::with_capacity(cfgs.len());
    for cfg in cfgs {
        let value = attr_value(&cfg.ty, &cfg.default).map_err(|e| {
            ResourceError::SchemaInvalid(format!("attribute {}: {e}", cfg.name))
        })?;
        defs.push(AttrDef {
            name: cfg.name.clone(),
            value,
        });
    }
    AttrSchema::new(defs)
}

fn zone_overrides(
    schema: &[AttrDefCfg],
    values: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<(String, AttrValue)>, ResourceError> {
    let mut out = Vec::with_capacity(values.len());
    for (name, value) in values {
        let def = schema
            .iter()
            .find(|d| &d.name == name)
            .ok_or_else(|| ResourceError::UnknownName(name.clone()))?;
        let value = attr_value(&def.ty, value)
            .map_err(|e| ResourceError::SchemaInvalid(format!("zone attribute {name}: {e}")))?;
        out.push((name.clone(), value));
    }
    Ok(out)
}

/// Converts a JSON value to an attribute value of the declared type.
fn attr_value(ty: &str, value: &serde_json::Value) -> Result<AttrValue> {
    use serde_json::Value as Json;
    Ok(match (ty, value) {
        ("string", Json::String(s)) => AttrValue::String(s.clone()),
        ("integer", Json::Number(n)) => match n.as_i64() {
            Some(i) => AttrValue::Integer(i),
            None => bail!("not an integer: {n}"),
        },
        ("unsigned", Json::Number(n)) => match n.as_u64() {
            Some(u) => AttrValue::Unsigned(u),
            None => bail!("not an unsigned integer: {n}"),
        },
        ("floating", Json::Number(n)) => match n.as_f64() {
            Some(x) => AttrValue::Floating(x),
            None => bail!("not a float: {n}"),
        },
        (ty @ ("string" | "integer" | "unsigned" | "floating"), other) => {
            bail!("expected a {ty}, got {other}")
        }
        (other, _) => bail!("unknown attribute type: {other}"),
    })
}
