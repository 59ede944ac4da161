// SPDX-License-Identifier: Apache-2.0

//! ASCII introspection of classes, owners, and sets.
//!
//! Renders to any [`fmt::Write`] sink so callers can route the output to a
//! console, a log line, or a test buffer.

use std::fmt;

use crate::engine::Engine;
use crate::ids::SetId;
use crate::set::SetState;

/// Renders every class with its per-zone ownership, one set per line:
/// `set_id:grant_mask/advice_mask`.
pub fn print_classes(engine: &Engine, out: &mut impl fmt::Write) -> fmt::Result {
    for class in engine.registry().classes() {
        writeln!(out, "class {} (priority {})", class.name, class.priority)?;
        for zone in engine.registry().zones() {
            let members: Vec<&crate::set::ResourceSet> = engine
                .sets_in_zone(zone.id)
                .into_iter()
                .filter(|s| s.class() == class.id)
                .collect();
            if members.is_empty() {
                continue;
            }
            writeln!(out, "  zone {}:", zone.name)?;
            for set in members {
                writeln!(
                    out,
                    "    {}:{}/{}",
                    set.id().value(),
                    set.grant(),
                    set.advice()
                )?;
            }
        }
    }
    Ok(())
}

/// Renders current ownership per zone and resource definition.
pub fn print_owners(engine: &Engine, out: &mut impl fmt::Write) -> fmt::Result {
    for zone in engine.registry().zones() {
        writeln!(out, "zone {}:", zone.name)?;
        for def in engine.registry().resources() {
            let holders: Vec<String> = engine
                .sets_in_zone(zone.id)
                .into_iter()
                .filter(|s| s.grant().contains(def.id.mask()))
                .map(|s| s.id().value().to_string())
                .collect();
            if holders.is_empty() {
                writeln!(out, "  {}: -", def.name)?;
            } else {
                writeln!(out, "  {}: {}", def.name, holders.join(", "))?;
            }
        }
    }
    Ok(())
}

/// Renders one set's masks, request, and derived state.
pub fn print_set(engine: &Engine, id: SetId, out: &mut impl fmt::Write) -> fmt::Result {
    let Ok(set) = engine.set(id) else {
        return writeln!(out, "set {}: <unknown>", id.value());
    };
    let zone = engine
        .registry()
        .zone(set.zone())
        .map_or("?", |z| z.name.as_str());
    let class = engine
        .registry()
        .class(set.class())
        .map_or("?", |c| c.name.as_str());
    let state = match engine.set_state(id) {
        Ok(SetState::Idle) => "idle",
        Ok(SetState::Pending) => "pending",
        Ok(SetState::Granted) => "granted",
        Ok(SetState::Waiting) => "waiting",
        Err(_) => "?",
    };
    writeln!(
        out,
        "set {} (client {}, zone {}, class {})",
        set.id().value(),
        set.client().value(),
        zone,
        class
    )?;
    writeln!(out, "  all:       {}", set.all())?;
    writeln!(out, "  mandatory: {}", set.mandatory())?;
    writeln!(out, "  grant:     {}", set.grant())?;
    writeln!(out, "  advice:    {}", set.advice())?;
    writeln!(out, "  state:     {state}")
}
