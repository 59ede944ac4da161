// SPDX-License-Identifier: Apache-2.0

//! Resource sets: a client's atomic acquisition unit.
//!
//! Mask invariants, maintained by instance addition and the engine's
//! arbitration pass:
//! - `mandatory ⊆ all`, `grant ⊆ all`, `advice ⊆ all`.
//! - A set is granted iff `grant != 0` and `mandatory ⊆ grant`; otherwise
//!   `grant == 0`.
//! - `request.stamp` is zero iff `request.kind == NoRequest`, and unique
//!   across the process otherwise.

use crate::attr::AttrRecord;
use crate::error::ResourceError;
use crate::ids::{ClassId, ClientId, ResourceId, SetId, ZoneId};
use crate::mask::ResourceMask;

/// Pending client intent on a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    /// No outstanding request.
    #[default]
    NoRequest,
    /// Give everything up.
    Release,
    /// Obtain the set's resources.
    Acquire,
}

/// The request state machine's stored half: kind plus the arbitration
/// ordering stamp (older requests win ties within a priority band).
#[derive(Debug, Clone, Copy, Default)]
pub struct Request {
    /// Outstanding intent.
    pub kind: RequestKind,
    /// Process-unique ordering stamp; zero iff `kind == NoRequest`.
    pub stamp: u64,
}

/// Observable lifecycle state, derived rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetState {
    /// No grant, no outstanding request.
    Idle,
    /// A request is queued but not yet arbitrated.
    Pending,
    /// The mandatory subset (and possibly more) is granted.
    Granted,
    /// An acquire was arbitrated but could not be satisfied; the set waits
    /// for holders to release.
    Waiting,
}

/// A resource definition materialized inside a set.
#[derive(Debug)]
pub struct ResourceInstance {
    /// The definition this instance refers to.
    pub def: ResourceId,
    /// Per-instance attribute values.
    pub attrs: AttrRecord,
    /// The set cannot be granted without this resource.
    pub mandatory: bool,
    /// The instance asks for shared access; effective only when the
    /// definition is shareable too.
    pub shareable_request: bool,
}

/// A client-owned bundle of resource instances arbitrated as a unit.
#[derive(Debug)]
pub struct ResourceSet {
    pub(crate) id: SetId,
    pub(crate) client: ClientId,
    pub(crate) zone: ZoneId,
    pub(crate) class: ClassId,
    pub(crate) instances: Vec<ResourceInstance>,
    pub(crate) all: ResourceMask,
    pub(crate) mandatory: ResourceMask,
    /// Bits both defined shareable and requested shared by this set.
    pub(crate) shareable: ResourceMask,
    pub(crate) grant: ResourceMask,
    pub(crate) advice: ResourceMask,
    pub(crate) request: Request,
    pub(crate) reqno: u32,
}

impl ResourceSet {
    pub(crate) fn new(id: SetId, client: ClientId, zone: ZoneId, class: ClassId) -> Self {
        Self {
            id,
            client,
            zone,
            class,
            instances: Vec::new(),
            all: ResourceMask::EMPTY,
            mandatory: ResourceMask::EMPTY,
            shareable: ResourceMask::EMPTY,
            grant: ResourceMask::EMPTY,
            advice: ResourceMask::EMPTY,
            request: Request::default(),
            reqno: 0,
        }
    }

    /// The set id.
    #[must_use]
    pub fn id(&self) -> SetId {
        self.id
    }

    /// Owning client.
    #[must_use]
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Arbitration zone.
    #[must_use]
    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    /// Priority class.
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Mask of resources present in the set.
    #[must_use]
    pub fn all(&self) -> ResourceMask {
        self.all
    }

    /// Mask of resources that must all be granted together.
    #[must_use]
    pub fn mandatory(&self) -> ResourceMask {
        self.mandatory
    }

    /// Currently granted mask.
    #[must_use]
    pub fn grant(&self) -> ResourceMask {
        self.grant
    }

    /// What an immediate acquire would yield.
    #[must_use]
    pub fn advice(&self) -> ResourceMask {
        self.advice
    }

    /// Outstanding request.
    #[must_use]
    pub fn request(&self) -> Request {
        self.request
    }

    /// Request sequence number echoed in events.
    #[must_use]
    pub fn reqno(&self) -> u32 {
        self.reqno
    }

    /// The resource instances.
    #[must_use]
    pub fn instances(&self) -> &[ResourceInstance] {
        &self.instances
    }

    /// True when the mandatory subset is granted and the grant is non-empty.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        !self.grant.is_empty() && self.grant.contains(self.mandatory)
    }

    pub(crate) fn add_instance(
        &mut self,
        instance: ResourceInstance,
        def_shareable: bool,
        def_name: &str,
    ) -> Result<(), ResourceError> {
        if self.instances.iter().any(|i| i.def == instance.def) {
            return Err(ResourceError::AlreadyPresent(def_name.to_owned()));
        }
        let bit = instance.def.mask();
        self.all |= bit;
        if instance.mandatory {
            self.mandatory |= bit;
        }
        if def_shareable && instance.shareable_request {
            self.shareable |= bit;
        }
        self.instances.push(instance);
        Ok(())
    }
}
