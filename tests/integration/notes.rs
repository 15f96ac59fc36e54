//! Note transport integration tests
//!
//! Pattern players publishing on topics, instruments adapting events into
//! trigger calls, and the duration/velocity fallback chain.

use approx::assert_relative_eq;
use patchbay::prelude::*;
use patchbay::{NodeRef, NoteDuration, NoteEvent, PatchEvent};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// A looped pattern keeps firing its instrument as the clock advances.
#[test]
fn test_pattern_drives_topic_instrument() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine.install(
        Blueprint::group()
            .child(synth(&t.rig, "bassline").instrument_ref(r.clone()))
            .child(Blueprint::pattern(
                PatternSpec::new("bassline")
                    .step(0.0, "C2")
                    .step(1.0, "E2")
                    .looped(2.0),
            )),
    );
    t.engine.start().unwrap();
    let synth_id = r.get().unwrap().id();

    t.clock.advance_beats(4.0);

    let triggers = t.rig.triggers_on(synth_id);
    let notes: Vec<&str> = triggers
        .iter()
        .filter_map(|e| match e {
            PatchEvent::AttackRelease { note, .. } => Some(note.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(notes, vec!["C2", "E2", "C2", "E2"]);

    // Scheduled times follow the tempo: a beat is half a second at 120.
    match &triggers[1] {
        PatchEvent::AttackRelease { time, .. } => assert_relative_eq!(*time, 0.5),
        other => panic!("expected attack-release, got {:?}", other),
    }
}

/// Pattern players go quiet when their declaration leaves the tree.
#[test]
fn test_pattern_unmount_cancels_schedule() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine.install(
        Blueprint::group()
            .child(synth(&t.rig, "beep").instrument_ref(r.clone()))
            .child(Blueprint::pattern(
                PatternSpec::new("beep").step(0.0, "C4").looped(1.0),
            )),
    );
    t.engine.start().unwrap();
    let synth_id = r.get().unwrap().id();

    t.clock.advance_beats(1.0);
    assert_eq!(t.rig.triggers_on(synth_id).len(), 1);

    t.engine
        .update(Blueprint::group().child(synth(&t.rig, "beep").instrument_ref(r.clone())))
        .unwrap();
    t.clock.advance_beats(4.0);
    assert_eq!(t.rig.triggers_on(synth_id).len(), 1);
}

/// Events without a scheduled time never reach the instrument.
#[test]
fn test_untimed_event_is_dropped() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine
        .install(synth(&t.rig, "keys").instrument_ref(r.clone()));
    t.engine.start().unwrap();

    t.engine.notes().emit("keys", &NoteEvent::untimed("C4"));
    assert!(t.rig.triggers_on(r.get().unwrap().id()).is_empty());
}

/// A bare note name plays with the configured fallback duration and no
/// velocity opinion.
#[test]
fn test_name_event_uses_fallback_duration() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine
        .install(synth(&t.rig, "keys").instrument_ref(r.clone()));
    t.engine.start().unwrap();

    t.engine.notes().emit("keys", &NoteEvent::at(1.0, "C4"));

    let triggers = t.rig.triggers_on(r.get().unwrap().id());
    match &triggers[0] {
        PatchEvent::AttackRelease {
            note,
            duration,
            time,
            velocity,
            ..
        } => {
            assert_eq!(note, "C4");
            assert_eq!(*duration, NoteDuration::Seconds(0.1));
            assert_eq!(*time, 1.0);
            assert_eq!(*velocity, None);
        }
        other => panic!("expected attack-release, got {:?}", other),
    }
}

/// Declared duration/velocity props fill in where events are silent.
#[test]
fn test_declared_props_supply_defaults() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine.install(
        synth(&t.rig, "keys")
            .duration(0.5)
            .velocity(0.8)
            .instrument_ref(r.clone()),
    );
    t.engine.start().unwrap();

    t.engine.notes().emit("keys", &NoteEvent::at(0.0, "C4"));

    let triggers = t.rig.triggers_on(r.get().unwrap().id());
    match &triggers[0] {
        PatchEvent::AttackRelease {
            duration, velocity, ..
        } => {
            assert_eq!(*duration, NoteDuration::Seconds(0.5));
            assert_eq!(*velocity, Some(0.8));
        }
        other => panic!("expected attack-release, got {:?}", other),
    }
}

/// Structured payload fields beat the declared props.
#[test]
fn test_spec_fields_override_props() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine.install(
        synth(&t.rig, "keys")
            .duration(0.5)
            .velocity(0.8)
            .instrument_ref(r.clone()),
    );
    t.engine.start().unwrap();

    t.engine.notes().emit(
        "keys",
        &NoteEvent::at(
            0.0,
            NoteSpec::new("E3").with_duration(0.25).with_velocity(0.95),
        ),
    );

    let triggers = t.rig.triggers_on(r.get().unwrap().id());
    match &triggers[0] {
        PatchEvent::AttackRelease {
            note,
            duration,
            velocity,
            ..
        } => {
            assert_eq!(note, "E3");
            assert_eq!(*duration, NoteDuration::Seconds(0.25));
            assert_eq!(*velocity, Some(0.95));
        }
        other => panic!("expected attack-release, got {:?}", other),
    }
}

/// Malformed payload fields fall back per-field instead of failing the
/// event.
#[test]
fn test_bad_spec_fields_fall_back() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine.install(
        synth(&t.rig, "keys")
            .duration(0.5)
            .velocity(0.7)
            .instrument_ref(r.clone()),
    );
    t.engine.start().unwrap();

    // Duration is a boolean, velocity is prose. Both unusable. A bad
    // duration collapses to the configured constant, skipping the 0.5
    // prop; a bad velocity goes to the prop instead.
    t.engine.notes().emit(
        "keys",
        &NoteEvent::at(
            0.0,
            NoteSpec::new("G3").with_duration(true).with_velocity("loud"),
        ),
    );

    let triggers = t.rig.triggers_on(r.get().unwrap().id());
    match &triggers[0] {
        PatchEvent::AttackRelease {
            duration, velocity, ..
        } => {
            assert_eq!(*duration, NoteDuration::Seconds(0.1));
            assert_eq!(*velocity, Some(0.7));
        }
        other => panic!("expected attack-release, got {:?}", other),
    }
}

/// Duration and velocity are live props: updates apply to later events
/// without remounting.
#[test]
fn test_prop_updates_are_live() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine.install(
        synth(&t.rig, "keys")
            .duration(0.5)
            .instrument_ref(r.clone()),
    );
    t.engine.start().unwrap();
    let synth_id = r.get().unwrap().id();

    t.engine
        .update(
            synth(&t.rig, "keys")
                .duration(2.0)
                .instrument_ref(r.clone()),
        )
        .unwrap();
    // Same node, no remount.
    assert_eq!(r.get().unwrap().id(), synth_id);

    t.engine.notes().emit("keys", &NoteEvent::at(0.0, "C4"));
    match &t.rig.triggers_on(synth_id)[0] {
        PatchEvent::AttackRelease { duration, .. } => {
            assert_eq!(*duration, NoteDuration::Seconds(2.0));
        }
        other => panic!("expected attack-release, got {:?}", other),
    }
}

/// Instruments follow the transport by default; `.unsynced()` opts out.
#[test]
fn test_instrument_sync_modes() {
    let t = test_engine();
    let synced_ref = NodeRef::new();
    let free_ref = NodeRef::new();

    t.engine.install(
        Blueprint::group()
            .child(synth(&t.rig, "a").instrument_ref(synced_ref.clone()))
            .child(synth(&t.rig, "b").unsynced().instrument_ref(free_ref.clone())),
    );
    t.engine.start().unwrap();

    let synced_id = synced_ref.get().unwrap().id();
    let free_id = free_ref.get().unwrap().id();
    let events = t.rig.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PatchEvent::Synced { node } if *node == synced_id)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PatchEvent::Synced { node } if *node == free_id)));

    t.engine.stop();
    let events = t.rig.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PatchEvent::Unsynced { node } if *node == synced_id)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PatchEvent::Unsynced { node } if *node == free_id)));
}

/// An unmounted instrument stops listening; its topic empties out.
#[test]
fn test_unmount_stops_listening() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine.install(
        Blueprint::group().child(synth(&t.rig, "keys").instrument_ref(r.clone())),
    );
    t.engine.start().unwrap();
    let synth_id = r.get().unwrap().id();
    assert_eq!(t.engine.notes().listener_count("keys"), 1);

    t.engine.update(Blueprint::group()).unwrap();
    assert_eq!(t.engine.notes().listener_count("keys"), 0);

    t.engine.notes().emit("keys", &NoteEvent::at(0.0, "C4"));
    assert!(t.rig.triggers_on(synth_id).is_empty());
}
