// SPDX-License-Identifier: Apache-2.0

//! Identifier newtypes for zones, classes, definitions, sets, and clients.
//!
//! Dedicated wrappers keep the five id spaces from mixing; all are plain
//! `u32` under the hood for cheap copies across the public API.

use crate::mask::ResourceMask;

/// Identifier of an arbitration zone (0..31).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub(crate) u32);

impl ZoneId {
    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Identifier of a priority class.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Identifier of a resource definition (0..31, the bit position in a
/// [`ResourceMask`]).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The single-bit mask for this definition.
    #[must_use]
    pub const fn mask(self) -> ResourceMask {
        ResourceMask::from_raw(1 << self.0)
    }
}

/// Identifier of a resource set, unique process-wide.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(pub(crate) u32);

impl SetId {
    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Identifier of a client owning resource sets.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub(crate) u32);

impl ClientId {
    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}
