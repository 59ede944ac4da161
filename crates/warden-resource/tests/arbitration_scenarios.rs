// SPDX-License-Identifier: Apache-2.0
//! Arbitration behaviour: contention, sharing, partial grants, event order.

use std::cell::RefCell;
use std::rc::Rc;

use warden_resource::{
    AttrSchema, ClassId, Engine, GrantEvent, Registry, ResourceError, ResourceMask, SetId,
    SetState, ZoneId,
};

fn engine() -> Engine {
    let mut reg = Registry::new();
    reg.create_zone("z0", &[]).unwrap_or_else(|e| panic!("zone: {e}"));
    for (name, priority) in [("low", 0), ("mid", 5), ("high", 10)] {
        reg.create_class(name, priority)
            .unwrap_or_else(|e| panic!("class: {e}"));
    }
    for (name, shareable) in [
        ("audio", false),
        ("video", false),
        ("mic", true),
        ("vibra", false),
    ] {
        reg.create_resource(name, shareable, AttrSchema::empty())
            .unwrap_or_else(|e| panic!("resource: {e}"));
    }
    Engine::new(reg)
}

fn zone(engine: &Engine) -> ZoneId {
    engine
        .registry()
        .zone_by_name("z0")
        .map(|z| z.id)
        .unwrap_or_else(|e| panic!("zone: {e}"))
}

fn class(engine: &Engine, name: &str) -> ClassId {
    engine
        .registry()
        .class_by_name(name)
        .map(|c| c.id)
        .unwrap_or_else(|e| panic!("class: {e}"))
}

fn mask(engine: &Engine, names: &[&str]) -> ResourceMask {
    names.iter().fold(ResourceMask::EMPTY, |m, name| {
        m | engine
            .registry()
            .resource_by_name(name)
            .map(|d| d.id.mask())
            .unwrap_or_else(|e| panic!("resource: {e}"))
    })
}

fn set_with(engine: &mut Engine, class_name: &str, resources: &[(&str, bool, bool)]) -> SetId {
    let client = engine.create_client("test");
    let z = zone(engine);
    let c = class(engine, class_name);
    let set = engine
        .create_set(client, z, c)
        .unwrap_or_else(|e| panic!("set: {e}"));
    for (name, shared, mandatory) in resources {
        engine
            .add_resource(set, name, *shared, &[], *mandatory)
            .unwrap_or_else(|e| panic!("add_resource: {e}"));
    }
    set
}

#[test]
fn exclusive_contention_preempts_the_lower_class() {
    // Scenario: A (class low) holds audio; B (class high) then acquires it.
    // A's revocation is delivered before B's grant.
    let mut e = engine();
    let a = set_with(&mut e, "low", &[("audio", false, true)]);
    let b = set_with(&mut e, "high", &[("audio", false, true)]);
    let audio = mask(&e, &["audio"]);

    e.acquire(a).unwrap();
    let events = e.run_pending();
    assert_eq!(
        events,
        vec![GrantEvent {
            set: a,
            grant: audio,
            advice: audio,
            reqno: 1
        }]
    );
    assert_eq!(e.set_state(a).unwrap(), SetState::Granted);

    e.acquire(b).unwrap();
    let events = e.run_pending();
    assert_eq!(
        events,
        vec![
            GrantEvent {
                set: a,
                grant: ResourceMask::EMPTY,
                advice: ResourceMask::EMPTY,
                reqno: 1
            },
            GrantEvent {
                set: b,
                grant: audio,
                advice: audio,
                reqno: 1
            },
        ]
    );
    assert_eq!(e.set_state(a).unwrap(), SetState::Idle);
    assert_eq!(e.set_state(b).unwrap(), SetState::Granted);
}

#[test]
fn shareable_resource_is_granted_to_both_requesters() {
    let mut e = engine();
    let p = set_with(&mut e, "mid", &[("mic", true, true)]);
    let q = set_with(&mut e, "mid", &[("mic", true, true)]);
    let mic = mask(&e, &["mic"]);

    e.acquire(p).unwrap();
    e.acquire(q).unwrap();
    e.run_pending();

    assert_eq!(e.set(p).unwrap().grant(), mic);
    assert_eq!(e.set(q).unwrap().grant(), mic);
}

#[test]
fn shareable_definition_requested_exclusively_blocks_sharing() {
    // Shareability needs both the definition flag and the instance request;
    // an exclusive request for a shareable definition behaves exclusively.
    let mut e = engine();
    let p = set_with(&mut e, "mid", &[("mic", false, true)]);
    let q = set_with(&mut e, "mid", &[("mic", true, true)]);
    let mic = mask(&e, &["mic"]);

    e.acquire(p).unwrap();
    e.run_pending();
    e.acquire(q).unwrap();
    e.run_pending();

    assert_eq!(e.set(p).unwrap().grant(), mic);
    assert_eq!(e.set(q).unwrap().grant(), ResourceMask::EMPTY);
    assert_eq!(e.set_state(q).unwrap(), SetState::Waiting);
}

#[test]
fn partial_grant_waits_for_the_mandatory_resource() {
    // Scenario: holder owns audio; R wants {audio, vibra} with audio
    // mandatory. R gets nothing but is advised vibra would be available;
    // once the holder releases, R gets both.
    let mut e = engine();
    let holder = set_with(&mut e, "low", &[("audio", false, true)]);
    let r = set_with(&mut e, "low", &[("audio", false, true), ("vibra", false, false)]);

    e.acquire(holder).unwrap();
    e.run_pending();

    e.acquire(r).unwrap();
    e.run_pending();
    assert_eq!(e.set(r).unwrap().grant(), ResourceMask::EMPTY);
    assert_eq!(e.set(r).unwrap().advice(), mask(&e, &["vibra"]));
    assert_eq!(e.set_state(r).unwrap(), SetState::Waiting);

    e.release(holder).unwrap();
    e.run_pending();
    assert_eq!(e.set(r).unwrap().grant(), mask(&e, &["audio", "vibra"]));
    assert_eq!(e.set_state(r).unwrap(), SetState::Granted);
}

#[test]
fn rerunning_an_unchanged_zone_emits_nothing() {
    let mut e = engine();
    let a = set_with(&mut e, "low", &[("audio", false, true)]);
    e.acquire(a).unwrap();
    e.run_pending();

    let z = zone(&e);
    assert!(e.refresh_zone(z).is_empty());
    assert!(e.refresh_zone(z).is_empty());
}

#[test]
fn holder_revocations_are_ordered_by_set_id() {
    // Two holders with identical priority and stamp (both cleared after their
    // acquires were honoured) lose to a high-class set wanting both
    // resources; their revocations arrive in ascending set id order, before
    // the preemptor's grant.
    let mut e = engine();
    let h1 = set_with(&mut e, "low", &[("audio", false, true)]);
    let h2 = set_with(&mut e, "low", &[("video", false, true)]);
    let both = set_with(
        &mut e,
        "high",
        &[("audio", false, true), ("video", false, true)],
    );

    e.acquire(h1).unwrap();
    e.acquire(h2).unwrap();
    e.run_pending();

    e.acquire(both).unwrap();
    let events = e.run_pending();
    let order: Vec<SetId> = events.iter().map(|ev| ev.set).collect();
    assert_eq!(order, vec![h1, h2, both]);
}

#[test]
fn release_cancels_a_pending_acquire() {
    // Coalescing: the release overwrites the queued acquire; the set never
    // becomes granted and ends idle with its request consumed.
    let mut e = engine();
    let a = set_with(&mut e, "low", &[("audio", false, true)]);

    e.acquire(a).unwrap();
    assert_eq!(e.set_state(a).unwrap(), SetState::Pending);
    e.release(a).unwrap();
    e.run_pending();

    assert_eq!(e.set(a).unwrap().grant(), ResourceMask::EMPTY);
    assert_eq!(e.set_state(a).unwrap(), SetState::Idle);
    assert_eq!(e.set(a).unwrap().request().stamp, 0);
}

#[test]
fn subscribers_receive_the_emitted_events() {
    let mut e = engine();
    let a = set_with(&mut e, "low", &[("audio", false, true)]);
    let seen: Rc<RefCell<Vec<GrantEvent>>> = Rc::default();
    let sink = Rc::clone(&seen);
    e.subscribe(a, Box::new(move |ev| sink.borrow_mut().push(*ev)))
        .unwrap();

    e.acquire(a).unwrap();
    let events = e.run_pending();
    assert_eq!(*seen.borrow(), events);
}

#[test]
fn waiting_set_is_granted_once_the_holder_goes_away() {
    let mut e = engine();
    let holder = set_with(&mut e, "high", &[("audio", false, true)]);
    let waiter = set_with(&mut e, "low", &[("audio", false, true)]);
    let audio = mask(&e, &["audio"]);

    e.acquire(holder).unwrap();
    e.run_pending();
    e.acquire(waiter).unwrap();
    e.run_pending();
    assert_eq!(e.set_state(waiter).unwrap(), SetState::Waiting);

    e.release(holder).unwrap();
    e.run_pending();
    assert_eq!(e.set(waiter).unwrap().grant(), audio);
}

#[test]
fn registration_after_the_first_request_is_sealed() {
    let mut e = engine();
    let a = set_with(&mut e, "low", &[("audio", false, true)]);
    e.acquire(a).unwrap();

    assert!(matches!(
        e.registry_mut().create_resource("late", false, AttrSchema::empty()),
        Err(ResourceError::InitSealed)
    ));
}

#[test]
fn adding_the_same_resource_twice_is_rejected() {
    let mut e = engine();
    let a = set_with(&mut e, "low", &[("audio", false, true)]);
    assert!(matches!(
        e.add_resource(a, "audio", false, &[], false),
        Err(ResourceError::AlreadyPresent(_))
    ));
}

#[test]
fn destroying_a_client_frees_its_grants() {
    let mut e = engine();
    let client = e.create_client("doomed");
    let z = zone(&e);
    let c = class(&e, "high");
    let holder = e.create_set(client, z, c).unwrap();
    e.add_resource(holder, "audio", false, &[], true).unwrap();
    let waiter = set_with(&mut e, "low", &[("audio", false, true)]);

    e.acquire(holder).unwrap();
    e.run_pending();
    e.acquire(waiter).unwrap();
    e.run_pending();
    assert_eq!(e.set_state(waiter).unwrap(), SetState::Waiting);

    e.destroy_client(client).unwrap();
    e.run_pending();
    assert_eq!(e.set(waiter).unwrap().grant(), mask(&e, &["audio"]));
}

#[test]
fn introspection_renders_grants() {
    let mut e = engine();
    let a = set_with(&mut e, "low", &[("audio", false, true)]);
    e.acquire(a).unwrap();
    e.run_pending();

    let mut buf = String::new();
    warden_resource::print_classes(&e, &mut buf).unwrap();
    assert!(buf.contains("class low (priority 0)"));
    assert!(buf.contains(&format!("{}:", a.value())));

    buf.clear();
    warden_resource::print_owners(&e, &mut buf).unwrap();
    assert!(buf.contains("zone z0:"));
    assert!(buf.contains(&format!("audio: {}", a.value())));

    buf.clear();
    warden_resource::print_set(&e, a, &mut buf).unwrap();
    assert!(buf.contains("state:     granted"));
}
