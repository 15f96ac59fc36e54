//! # Sketch
//!
//! Describe a small patch (two pattern-driven synth branches, an LFO on a
//! filter cutoff, and an ambience return fed over a named bus), then start
//! it, drive the clock by hand, and reshape it live with `update`.
//!
//! **Concepts:** Blueprints, buses, patterns, start gating, reconciliation
//!
//! ```bash
//! cargo run --example sketch
//! ```

use std::sync::Arc;

use patchbay::prelude::*;

fn patch(rig: &VirtualRig, wobble: bool) -> Blueprint {
    // Ambience return: anything sent to "amb" comes back through a long
    // reverb into the main output.
    let ambience = {
        let rig = rig.clone();
        Blueprint::node(move || rig.reverb(8.0)).child(Blueprint::channel().receive("amb"))
    };

    // Lead: synth through a filter, routed onto the "amb" bus instead of
    // the direct output. The LFO wobbles the filter cutoff.
    let mut lead = {
        let rig = rig.clone();
        Blueprint::node(move || rig.filter(1200.0, 2.0))
    }
    .child(Blueprint::channel().send("amb").child({
        let rig = rig.clone();
        Blueprint::instrument(move || rig.mono_synth()).topic("lead")
    }));
    if wobble {
        lead = lead.child({
            let rig = rig.clone();
            Blueprint::source(move || rig.lfo(400.0, 2400.0, 4.0)).port("frequency")
        });
    }

    // Bass: dry synth straight into a short reverb.
    let bass = {
        let rig = rig.clone();
        Blueprint::node(move || rig.reverb(1.5))
    }
    .child({
        let rig = rig.clone();
        Blueprint::instrument(move || rig.mono_synth())
            .topic("bassline")
            .duration(0.3)
            .velocity(0.9)
    });

    Blueprint::group()
        .child(ambience)
        .child(lead)
        .child(bass)
        .child(Blueprint::pattern(
            PatternSpec::new("lead")
                .step(0.0, "C4")
                .step(0.5, NoteSpec::new("E4").with_duration(0.2).with_velocity(0.6))
                .step(1.0, "G4")
                .looped(2.0),
        ))
        .child(Blueprint::pattern(
            PatternSpec::new("bassline")
                .step(0.0, "C2")
                .step(1.0, "G1")
                .looped(2.0),
        ))
}

fn drain(rig: &VirtualRig) {
    for event in rig.events() {
        println!("  {:?}", event);
    }
    rig.clear_events();
}

fn main() -> patchbay::Result<()> {
    tracing_subscriber::fmt::init();

    let rig = VirtualRig::new();
    let clock = Arc::new(StepClock::new(120.0));
    let engine = PatchbayEngine::builder()
        .backend(Arc::new(rig.clone()))
        .transport(clock.clone())
        .build()?;

    engine.install(patch(&rig, true));
    println!("Patch installed; nothing mounted yet.");

    engine.start()?;
    println!("\nStarted. Wiring:");
    drain(&rig);

    println!("\nAdvancing 4 beats...");
    clock.advance_beats(4.0);
    drain(&rig);

    println!("\nDropping the LFO; everything else survives in place:");
    engine.update(patch(&rig, false))?;
    drain(&rig);

    println!("\nAdvancing 2 more beats...");
    clock.advance_beats(2.0);
    drain(&rig);

    engine.stop();
    println!("\nStopped.");
    Ok(())
}
