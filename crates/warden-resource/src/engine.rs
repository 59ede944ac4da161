// SPDX-License-Identifier: Apache-2.0

//! The per-zone arbitration engine.
//!
//! Ordering invariant: within a zone, sets are arbitrated by descending class
//! priority, then ascending request stamp (holders carry stamp zero and so
//! outrank same-priority newcomers), then ascending set id. Every run
//! re-derives all grants from scratch; previous grants are never inherited.
//!
//! Event invariant: among the sets whose `(grant, advice)` changed, pure
//! revocations are delivered first so a preempted holder hears about its loss
//! before the preemptor hears about its gain; both groups preserve the run's
//! iteration order. An unchanged run emits nothing.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::attr::AttrValue;
use crate::client::Client;
use crate::error::ResourceError;
use crate::ids::{ClassId, ClientId, SetId, ZoneId};
use crate::mask::ResourceMask;
use crate::registry::Registry;
use crate::set::{Request, RequestKind, ResourceInstance, ResourceSet, SetState};

/// Notification payload delivered when a set's grant or advice changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantEvent {
    /// The set the event concerns.
    pub set: SetId,
    /// New grant mask.
    pub grant: ResourceMask,
    /// New advice mask.
    pub advice: ResourceMask,
    /// The set's request sequence number at emission time.
    pub reqno: u32,
}

/// Per-set subscriber callback.
pub type GrantCallback = Box<dyn FnMut(&GrantEvent)>;

/// Pending-request queue with per-set coalescing: a second request for the
/// same set overwrites the first (the set itself carries the latest kind and
/// stamp), keeping the original queue position.
#[derive(Debug, Default)]
struct PendingQueue {
    order: Vec<SetId>,
    members: FxHashSet<SetId>,
}

impl PendingQueue {
    fn push(&mut self, id: SetId) {
        if self.members.insert(id) {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: SetId) {
        if self.members.remove(&id) {
            self.order.retain(|x| *x != id);
        }
    }

    fn contains(&self, id: SetId) -> bool {
        self.members.contains(&id)
    }

    fn drain(&mut self) -> Vec<SetId> {
        self.members.clear();
        std::mem::take(&mut self.order)
    }
}

/// Single authority over all zones: owns the registry, the sets, the clients,
/// and the serialised request queue.
pub struct Engine {
    registry: Registry,
    clients: FxHashMap<ClientId, Client>,
    sets: FxHashMap<SetId, ResourceSet>,
    subscribers: FxHashMap<SetId, Vec<GrantCallback>>,
    queue: PendingQueue,
    dirty_zones: Vec<ZoneId>,
    next_client: u32,
    next_set: u32,
    next_stamp: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("clients", &self.clients.len())
            .field("sets", &self.sets.len())
            .field("queued", &self.queue.order.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine around a populated (not necessarily sealed)
    /// registry.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            clients: FxHashMap::default(),
            sets: FxHashMap::default(),
            subscribers: FxHashMap::default(),
            queue: PendingQueue::default(),
            dirty_zones: Vec::new(),
            next_client: 0,
            next_set: 0,
            next_stamp: 1,
        }
    }

    /// The catalogues.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable catalogue access for startup wiring; registration fails with
    /// [`ResourceError::InitSealed`] once the first request has been issued.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    // ------------------------------------------------------------------
    // Clients and sets
    // ------------------------------------------------------------------

    /// Registers a client.
    pub fn create_client(&mut self, name: &str) -> ClientId {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        self.clients.insert(
            id,
            Client {
                id,
                name: name.to_owned(),
                sets: Vec::new(),
            },
        );
        debug!(client = name, id = id.value(), "created client");
        id
    }

    /// Removes a client and all of its sets. Affected zones are re-arbitrated
    /// on the next [`Engine::run_pending`] call.
    pub fn destroy_client(&mut self, id: ClientId) -> Result<(), ResourceError> {
        let client = self.clients.remove(&id).ok_or(ResourceError::UnknownClient)?;
        for set_id in client.sets {
            if let Some(set) = self.sets.remove(&set_id) {
                if !set.grant.is_empty() {
                    self.mark_dirty(set.zone);
                }
            }
            self.subscribers.remove(&set_id);
            self.queue.remove(set_id);
        }
        debug!(client = %client.name, "destroyed client");
        Ok(())
    }

    /// A client by id.
    pub fn client(&self, id: ClientId) -> Result<&Client, ResourceError> {
        self.clients.get(&id).ok_or(ResourceError::UnknownClient)
    }

    /// Creates an empty set bound to a zone and a priority class.
    pub fn create_set(
        &mut self,
        client: ClientId,
        zone: ZoneId,
        class: ClassId,
    ) -> Result<SetId, ResourceError> {
        self.registry.zone(zone)?;
        self.registry.class(class)?;
        let owner = self
            .clients
            .get_mut(&client)
            .ok_or(ResourceError::UnknownClient)?;
        let id = SetId(self.next_set);
        self.next_set += 1;
        owner.sets.push(id);
        self.sets
            .insert(id, ResourceSet::new(id, client, zone, class));
        Ok(id)
    }

    /// Adds a resource instance to a set.
    ///
    /// `shared` asks for shareable access; it is effective only when the
    /// definition is shareable as well. `mandatory` marks the resource as
    /// required for the set to count as granted.
    pub fn add_resource(
        &mut self,
        set: SetId,
        resource: &str,
        shared: bool,
        attrs: &[(&str, AttrValue)],
        mandatory: bool,
    ) -> Result<(), ResourceError> {
        let def = self.registry.resource_by_name(resource)?;
        let instance = ResourceInstance {
            def: def.id,
            attrs: def.attrs.instantiate(attrs)?,
            mandatory,
            shareable_request: shared,
        };
        let def_shareable = def.shareable;
        let def_name = def.name.clone();
        let set = self.sets.get_mut(&set).ok_or(ResourceError::UnknownSet)?;
        set.add_instance(instance, def_shareable, &def_name)
    }

    /// A set by id.
    pub fn set(&self, id: SetId) -> Result<&ResourceSet, ResourceError> {
        self.sets.get(&id).ok_or(ResourceError::UnknownSet)
    }

    /// Iterates the sets bound to `zone`, in ascending id order.
    pub fn sets_in_zone(&self, zone: ZoneId) -> Vec<&ResourceSet> {
        let mut out: Vec<&ResourceSet> = self.sets.values().filter(|s| s.zone == zone).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// Registers a callback for a set's grant events.
    pub fn subscribe(&mut self, set: SetId, callback: GrantCallback) -> Result<(), ResourceError> {
        if !self.sets.contains_key(&set) {
            return Err(ResourceError::UnknownSet);
        }
        self.subscribers.entry(set).or_default().push(callback);
        Ok(())
    }

    /// Derived lifecycle state of a set.
    pub fn set_state(&self, id: SetId) -> Result<SetState, ResourceError> {
        let set = self.set(id)?;
        if self.queue.contains(id) {
            return Ok(SetState::Pending);
        }
        Ok(match set.request.kind {
            RequestKind::Acquire | RequestKind::Release => SetState::Waiting,
            RequestKind::NoRequest => {
                if set.is_granted() {
                    SetState::Granted
                } else {
                    SetState::Idle
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Asks the engine to grant the set's resources.
    pub fn acquire(&mut self, set: SetId) -> Result<(), ResourceError> {
        self.request(set, RequestKind::Acquire)
    }

    /// Gives the set's resources up; a release over a still-pending acquire
    /// cancels it (per-set coalescing).
    pub fn release(&mut self, set: SetId) -> Result<(), ResourceError> {
        self.request(set, RequestKind::Release)
    }

    fn request(&mut self, id: SetId, kind: RequestKind) -> Result<(), ResourceError> {
        self.registry.seal();
        let stamp = self.next_stamp;
        let set = self.sets.get_mut(&id).ok_or(ResourceError::UnknownSet)?;
        self.next_stamp += 1;
        set.reqno = set.reqno.wrapping_add(1);
        set.request = Request { kind, stamp };
        debug!(set = id.value(), ?kind, stamp, "request queued");
        self.queue.push(id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Arbitration
    // ------------------------------------------------------------------

    /// Drains the request queue, arbitrates every affected zone once, and
    /// delivers the resulting events to subscribers. Returns the events in
    /// delivery order.
    pub fn run_pending(&mut self) -> Vec<GrantEvent> {
        self.registry.seal();

        let mut zones: Vec<ZoneId> = std::mem::take(&mut self.dirty_zones);
        for set_id in self.queue.drain() {
            if let Some(set) = self.sets.get(&set_id) {
                zones.push(set.zone);
            }
        }
        zones.sort_unstable();
        zones.dedup();

        let mut events = Vec::new();
        for zone in zones {
            self.arbitrate_zone(zone, &mut events);
        }

        for event in &events {
            if let Some(callbacks) = self.subscribers.get_mut(&event.set) {
                for callback in callbacks.iter_mut() {
                    callback(event);
                }
            }
        }
        events
    }

    /// Forces a re-arbitration of `zone` even with an empty queue; an
    /// unchanged zone produces no events.
    pub fn refresh_zone(&mut self, zone: ZoneId) -> Vec<GrantEvent> {
        self.mark_dirty(zone);
        self.run_pending()
    }

    fn mark_dirty(&mut self, zone: ZoneId) {
        if !self.dirty_zones.contains(&zone) {
            self.dirty_zones.push(zone);
        }
    }

    fn class_priority(&self, class: ClassId) -> u32 {
        self.registry.class(class).map_or(0, |c| c.priority)
    }

    /// One arbitration pass over a zone; see the module docs for the
    /// ordering and event invariants.
    fn arbitrate_zone(&mut self, zone: ZoneId, events: &mut Vec<GrantEvent>) {
        let mut order: Vec<(u32, u64, SetId)> = self
            .sets
            .values()
            .filter(|s| {
                s.zone == zone && (s.request.kind != RequestKind::NoRequest || !s.grant.is_empty())
            })
            .map(|s| (self.class_priority(s.class), s.request.stamp, s.id))
            .collect();
        order.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        debug!(zone = zone.value(), sets = order.len(), "arbitrating zone");

        let mut owned_any = ResourceMask::EMPTY;
        let mut owned_excl = ResourceMask::EMPTY;
        let mut changed: Vec<(SetId, bool)> = Vec::new();

        for (_, _, id) in order {
            let Some(set) = self.sets.get_mut(&id) else {
                continue;
            };
            let old_grant = set.grant;
            let old_advice = set.advice;

            let want = set.all;
            let shareable = set.shareable;
            // Exclusively held resources are gone for everyone; resources we
            // want exclusively conflict with any earlier holder at all.
            let blocked_excl = want & owned_excl;
            let excl_want = want & !shareable;
            let conflict = (excl_want & owned_any) | blocked_excl;
            let avail = want & !conflict;

            let (new_grant, new_advice) = match set.request.kind {
                RequestKind::Release => (ResourceMask::EMPTY, ResourceMask::EMPTY),
                RequestKind::Acquire => {
                    let grant = if conflict.intersects(set.mandatory) {
                        ResourceMask::EMPTY
                    } else {
                        avail
                    };
                    (grant, avail)
                }
                RequestKind::NoRequest => {
                    // Holders shrink under preemption but never silently
                    // gain; losing a mandatory bit forfeits the whole grant.
                    let grant = if set.grant.is_empty() || conflict.intersects(set.mandatory) {
                        ResourceMask::EMPTY
                    } else {
                        set.grant & !conflict
                    };
                    (grant, avail)
                }
            };

            set.grant = new_grant;
            set.advice = new_advice;
            owned_any |= new_grant;
            owned_excl |= new_grant & !shareable;

            let honoured = match set.request.kind {
                RequestKind::Release => true,
                RequestKind::Acquire => set.is_granted(),
                RequestKind::NoRequest => false,
            };
            if honoured {
                set.request = Request::default();
            }

            if old_grant != new_grant || old_advice != new_advice {
                let lost = old_grant & !new_grant;
                let gained = new_grant & !old_grant;
                let revocation = !lost.is_empty() && gained.is_empty();
                changed.push((id, revocation));
            }
        }

        for pass in [true, false] {
            for &(id, _) in changed.iter().filter(|(_, r)| *r == pass) {
                if let Some(set) = self.sets.get(&id) {
                    events.push(GrantEvent {
                        set: id,
                        grant: set.grant,
                        advice: set.advice,
                        reqno: set.reqno,
                    });
                }
            }
        }
    }
}
