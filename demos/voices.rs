//! # Voices
//!
//! A polyphonic voice pool: spawn template voices on demand, trigger them
//! before their instrument has materialized, and watch the queued calls
//! replay the moment the binding resolves.
//!
//! **Concepts:** Voice pools, deferred binding, trigger replay
//!
//! ```bash
//! cargo run --example voices
//! ```

use std::sync::Arc;
use std::time::Duration;

use patchbay::prelude::*;
use patchbay::{NodeRef, NoteDuration, VoiceSpawner};

fn main() -> patchbay::Result<()> {
    tracing_subscriber::fmt::init();

    let rig = VirtualRig::new();
    let clock = Arc::new(StepClock::new(120.0));
    let engine = PatchbayEngine::builder()
        .backend(Arc::new(rig.clone()))
        .transport(clock)
        .build()?;

    // The pool lives inside a shared reverb; every spawned voice is
    // patched in right there.
    let pool: NodeRef<VoiceSpawner> = NodeRef::new();
    let template_rig = rig.clone();
    engine.install(
        {
            let rig = rig.clone();
            Blueprint::node(move || rig.reverb(3.0))
        }
        .child(
            Blueprint::poly_voices(move |voice_ref| {
                let rig = template_rig.clone();
                Blueprint::instrument(move || rig.mono_synth())
                    .instrument_ref(voice_ref)
                    .detached()
            })
            .pool_ref(pool.clone()),
        ),
    );
    engine.start()?;
    rig.clear_events();

    let spawner = pool.get().expect("pool mounted");

    println!("Spawning three voices for a C major chord...");
    let notes = ["C4", "E4", "G4"];
    let mut voices = Vec::new();
    for (i, note) in notes.iter().enumerate() {
        let voice = spawner.spawn()?;
        // Trigger immediately; if the binding were still pending this
        // would queue and replay, never drop.
        voice.trigger_attack_release(note, NoteDuration::Seconds(1.0), i as f64 * 0.01, Some(0.8));
        voices.push(voice);
    }
    for voice in &voices {
        voice.await_bound(Duration::from_secs(1))?;
    }

    println!("\nWhat the backend saw:");
    for event in rig.events() {
        println!("  {:?}", event);
    }

    println!("\nRetiring the chord...");
    for voice in &voices {
        spawner.retire(voice);
    }
    println!("Live voices: {}", spawner.voice_count());

    engine.stop();
    Ok(())
}
