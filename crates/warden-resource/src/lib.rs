// SPDX-License-Identifier: Apache-2.0
//! warden-resource: per-zone resource arbitration.
//!
//! Clients register declarative resource sets (bundles of shareable or
//! exclusive resources) and acquire them; the engine decides, per arbitration
//! zone, which sets hold which resources based on class priority, request
//! age, and shareability, and notifies subscribers of grant changes.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod attr;
mod client;
mod engine;
mod error;
mod ids;
mod mask;
mod print;
mod registry;
mod set;

pub use attr::{AttrDef, AttrRecord, AttrSchema, AttrValue};
pub use client::Client;
pub use engine::{Engine, GrantCallback, GrantEvent};
pub use error::ResourceError;
pub use ids::{ClassId, ClientId, ResourceId, SetId, ZoneId};
pub use mask::ResourceMask;
pub use print::{print_classes, print_owners, print_set};
pub use registry::{Registry, ResourceClass, ResourceDef, Zone, MAX_RESOURCES, MAX_ZONES};
pub use set::{Request, RequestKind, ResourceInstance, ResourceSet, SetState};
