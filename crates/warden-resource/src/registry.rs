// SPDX-License-Identifier: Apache-2.0

//! Startup-time catalogues: zones, priority classes, resource definitions.
//!
//! All three are populated during initialisation and frozen by [`Registry::seal`]
//! (the engine seals implicitly on the first arbitration-affecting call).
//! Zones and resource definitions are fixed-capacity because a
//! [`ResourceMask`] is 32 bits wide and zones are addressed the same way;
//! classes are unbounded.

use tracing::debug;

use crate::attr::{AttrRecord, AttrSchema, AttrValue};
use crate::error::ResourceError;
use crate::ids::{ClassId, ResourceId, ZoneId};
use crate::mask::ResourceMask;

/// Maximum number of arbitration zones.
pub const MAX_ZONES: usize = 32;
/// Maximum number of resource definitions, bounded by the mask width.
pub const MAX_RESOURCES: usize = 32;

/// One arbitration zone: a disjoint universe of resource ownership.
#[derive(Debug)]
pub struct Zone {
    /// Zone id, also its index.
    pub id: ZoneId,
    /// Unique zone name.
    pub name: String,
    /// Attribute values conforming to the process-wide zone schema.
    pub attrs: AttrRecord,
}

/// Named priority band; higher priority wins arbitration.
#[derive(Debug)]
pub struct ResourceClass {
    /// Class id.
    pub id: ClassId,
    /// Unique class name.
    pub name: String,
    /// Priority, 0 = lowest.
    pub priority: u32,
}

/// A resource definition: a named capability with a shareability flag and an
/// attribute schema for its instances.
#[derive(Debug)]
pub struct ResourceDef {
    /// Definition id, the bit position in masks.
    pub id: ResourceId,
    /// Unique resource name.
    pub name: String,
    /// Whether grants of this resource may be shared at all.
    pub shareable: bool,
    /// Schema for per-instance attributes.
    pub attrs: AttrSchema,
}

/// The process-wide catalogues, owned by the engine and passed explicitly.
#[derive(Debug, Default)]
pub struct Registry {
    zone_schema: Option<AttrSchema>,
    zones: Vec<Zone>,
    classes: Vec<ResourceClass>,
    defs: Vec<ResourceDef>,
    sealed: bool,
}

impl Registry {
    /// Creates an empty, unsealed registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the single process-wide zone attribute schema.
    pub fn define_zone_schema(&mut self, schema: AttrSchema) -> Result<(), ResourceError> {
        self.check_open()?;
        if self.zone_schema.is_some() {
            return Err(ResourceError::SchemaInvalid(
                "zone attribute schema already defined".into(),
            ));
        }
        self.zone_schema = Some(schema);
        Ok(())
    }

    /// Creates a zone; attributes conform to the zone schema.
    pub fn create_zone(
        &mut self,
        name: &str,
        attrs: &[(&str, AttrValue)],
    ) -> Result<ZoneId, ResourceError> {
        self.check_open()?;
        if self.zones.len() == MAX_ZONES {
            return Err(ResourceError::CapacityExceeded {
                what: "zones",
                limit: MAX_ZONES,
            });
        }
        if self.zones.iter().any(|z| z.name == name) {
            return Err(ResourceError::NameCollision(name.to_owned()));
        }
        let schema = self.zone_schema.clone().unwrap_or_default();
        let record = schema.instantiate(attrs)?;
        let id = ZoneId(u32::try_from(self.zones.len()).unwrap_or(0));
        self.zones.push(Zone {
            id,
            name: name.to_owned(),
            attrs: record,
        });
        debug!(zone = name, id = id.value(), "created zone");
        Ok(id)
    }

    /// Creates a priority class.
    pub fn create_class(&mut self, name: &str, priority: u32) -> Result<ClassId, ResourceError> {
        self.check_open()?;
        if self.classes.iter().any(|c| c.name == name) {
            return Err(ResourceError::NameCollision(name.to_owned()));
        }
        let id = ClassId(u32::try_from(self.classes.len()).unwrap_or(0));
        self.classes.push(ResourceClass {
            id,
            name: name.to_owned(),
            priority,
        });
        debug!(class = name, priority, "created class");
        Ok(id)
    }

    /// Creates a resource definition.
    pub fn create_resource(
        &mut self,
        name: &str,
        shareable: bool,
        attrs: AttrSchema,
    ) -> Result<ResourceId, ResourceError> {
        self.check_open()?;
        if self.defs.len() == MAX_RESOURCES {
            return Err(ResourceError::CapacityExceeded {
                what: "resource definitions",
                limit: MAX_RESOURCES,
            });
        }
        if self.defs.iter().any(|d| d.name == name) {
            return Err(ResourceError::NameCollision(name.to_owned()));
        }
        let id = ResourceId(u32::try_from(self.defs.len()).unwrap_or(0));
        self.defs.push(ResourceDef {
            id,
            name: name.to_owned(),
            shareable,
            attrs,
        });
        debug!(resource = name, id = id.value(), shareable, "created resource definition");
        Ok(id)
    }

    /// Freezes the catalogues; later registration returns
    /// [`ResourceError::InitSealed`].
    pub fn seal(&mut self) {
        if !self.sealed {
            debug!(
                zones = self.zones.len(),
                classes = self.classes.len(),
                resources = self.defs.len(),
                "registry sealed"
            );
        }
        self.sealed = true;
    }

    /// Whether the registry has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn check_open(&self) -> Result<(), ResourceError> {
        if self.sealed {
            Err(ResourceError::InitSealed)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Zone by id.
    pub fn zone(&self, id: ZoneId) -> Result<&Zone, ResourceError> {
        self.zones
            .get(id.value() as usize)
            .ok_or(ResourceError::UnknownZone)
    }

    /// Zone by name.
    pub fn zone_by_name(&self, name: &str) -> Result<&Zone, ResourceError> {
        self.zones
            .iter()
            .find(|z| z.name == name)
            .ok_or_else(|| ResourceError::UnknownName(name.to_owned()))
    }

    /// All zones, in id order.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Class by id.
    pub fn class(&self, id: ClassId) -> Result<&ResourceClass, ResourceError> {
        self.classes
            .get(id.value() as usize)
            .ok_or(ResourceError::UnknownClass)
    }

    /// Class by name.
    pub fn class_by_name(&self, name: &str) -> Result<&ResourceClass, ResourceError> {
        self.classes
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ResourceError::UnknownName(name.to_owned()))
    }

    /// All classes, in creation order.
    #[must_use]
    pub fn classes(&self) -> &[ResourceClass] {
        &self.classes
    }

    /// Resource definition by id.
    pub fn resource(&self, id: ResourceId) -> Result<&ResourceDef, ResourceError> {
        self.defs
            .get(id.value() as usize)
            .ok_or_else(|| ResourceError::UnknownName(format!("resource #{}", id.value())))
    }

    /// Resource definition by name.
    pub fn resource_by_name(&self, name: &str) -> Result<&ResourceDef, ResourceError> {
        self.defs
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ResourceError::UnknownName(name.to_owned()))
    }

    /// All resource definitions, in id order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceDef] {
        &self.defs
    }

    /// Mask of definitions marked shareable (instance flags still apply).
    #[must_use]
    pub fn shareable_mask(&self) -> ResourceMask {
        self.defs
            .iter()
            .filter(|d| d.shareable)
            .fold(ResourceMask::EMPTY, |m, d| m | d.id.mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealing_blocks_further_registration() {
        let mut reg = Registry::new();
        reg.create_class("base", 0).ok();
        reg.seal();
        assert!(matches!(
            reg.create_zone("late", &[]),
            Err(ResourceError::InitSealed)
        ));
        assert!(matches!(
            reg.create_class("late", 1),
            Err(ResourceError::InitSealed)
        ));
        assert!(matches!(
            reg.create_resource("late", false, AttrSchema::empty()),
            Err(ResourceError::InitSealed)
        ));
    }

    #[test]
    fn resource_capacity_is_32() {
        let mut reg = Registry::new();
        for i in 0..MAX_RESOURCES {
            let name = format!("res{i}");
            assert!(reg.create_resource(&name, false, AttrSchema::empty()).is_ok());
        }
        assert!(matches!(
            reg.create_resource("one-too-many", false, AttrSchema::empty()),
            Err(ResourceError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn names_must_be_unique_per_catalogue() {
        let mut reg = Registry::new();
        reg.create_zone("z", &[]).ok();
        assert!(matches!(
            reg.create_zone("z", &[]),
            Err(ResourceError::NameCollision(_))
        ));
    }

    #[test]
    fn shareable_mask_reflects_definitions() {
        let mut reg = Registry::new();
        let a = match reg.create_resource("a", true, AttrSchema::empty()) {
            Ok(id) => id,
            Err(e) => unreachable!("create: {e}"),
        };
        reg.create_resource("b", false, AttrSchema::empty()).ok();
        assert_eq!(reg.shareable_mask(), a.mask());
    }
}
