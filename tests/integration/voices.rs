//! Voice pool integration tests
//!
//! Spawning template voices, the proxy's deferred binding, and trigger
//! replay ordering.

use std::time::Duration;

use patchbay::prelude::*;
use patchbay::{Inlet, NodeRef, NoteDuration, PatchEvent, VoiceProxy, VoiceSpawner};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

fn voice_pool(rig: &VirtualRig) -> Blueprint {
    let rig = rig.clone();
    Blueprint::poly_voices(move |r| {
        let rig = rig.clone();
        Blueprint::instrument(move || rig.mono_synth())
            .instrument_ref(r)
            .detached()
    })
}

/// Spawning wires a sink into the pool's position and binds the template
/// instrument into it.
#[test]
fn test_spawn_wires_voice_into_tree() {
    let t = test_engine();
    let parent: NodeRef = NodeRef::new();
    let pool: NodeRef<VoiceSpawner> = NodeRef::new();

    t.engine.install(
        reverb(&t.rig)
            .node_ref(parent.clone())
            .child(voice_pool(&t.rig).pool_ref(pool.clone())),
    );
    t.engine.start().unwrap();

    let spawner = pool.get().unwrap();
    let proxy = spawner.spawn().unwrap();
    proxy.await_bound(Duration::from_millis(100)).unwrap();
    assert_eq!(spawner.voice_count(), 1);

    // The sink sits where the pool was declared.
    let parent_id = parent.get().unwrap().id();
    let sink_id = proxy.sink().id();
    assert!(t.rig.has_edge(sink_id, &Inlet::of(parent_id)));

    // The instrument feeds the sink and nothing else.
    let inst_id = t
        .rig
        .events()
        .iter()
        .find_map(|e| match e {
            PatchEvent::Connected { source, target } if target.node == sink_id => Some(*source),
            _ => None,
        })
        .expect("instrument connected into sink");
    assert_eq!(t.rig.edges_from(inst_id), vec![Inlet::of(sink_id)]);
}

/// Triggers after binding pass straight through to the instrument.
#[test]
fn test_bound_proxy_forwards_triggers() {
    let t = test_engine();
    let pool: NodeRef<VoiceSpawner> = NodeRef::new();

    t.engine
        .install(reverb(&t.rig).child(voice_pool(&t.rig).pool_ref(pool.clone())));
    t.engine.start().unwrap();

    let proxy = pool.get().unwrap().spawn().unwrap();
    proxy.await_bound(Duration::from_millis(100)).unwrap();

    proxy.trigger_attack_release("C4", NoteDuration::Seconds(0.25), 0.0, Some(0.9));

    assert!(t.rig.events().iter().any(|e| matches!(
        e,
        PatchEvent::AttackRelease { note, velocity, .. }
            if note == "C4" && *velocity == Some(0.9)
    )));
}

/// Triggers before binding queue up and replay in arrival order.
#[test]
fn test_prebind_triggers_replay_in_order() {
    let t = test_engine();
    let proxy = VoiceProxy::new(t.rig.gain(), 8);

    proxy.trigger_attack("C3", 0.0, None);
    proxy.trigger_attack_release("E3", NoteDuration::Seconds(0.1), 0.5, None);
    proxy.trigger_release(1.0);
    assert!(!proxy.is_bound());
    assert_eq!(proxy.pending(), 3);

    let instrument = t.rig.mono_synth();
    let inst_id = instrument.id();
    proxy.bind(instrument);

    let triggers = t.rig.triggers_on(inst_id);
    assert_eq!(triggers.len(), 3);
    assert!(matches!(&triggers[0], PatchEvent::Attack { note, .. } if note == "C3"));
    assert!(matches!(&triggers[1], PatchEvent::AttackRelease { note, .. } if note == "E3"));
    assert!(matches!(&triggers[2], PatchEvent::Release { time, .. } if *time == 1.0));
    assert_eq!(proxy.pending(), 0);
}

/// A full queue drops further triggers instead of blocking.
#[test]
fn test_queue_overflow_drops_triggers() {
    let t = test_engine();
    let proxy = VoiceProxy::new(t.rig.gain(), 2);

    proxy.trigger_attack("C3", 0.0, None);
    proxy.trigger_attack("D3", 0.0, None);
    proxy.trigger_attack("E3", 0.0, None);
    assert_eq!(proxy.pending(), 2);

    let instrument = t.rig.mono_synth();
    let inst_id = instrument.id();
    proxy.bind(instrument);

    let triggers = t.rig.triggers_on(inst_id);
    assert_eq!(triggers.len(), 2);
    assert!(matches!(&triggers[1], PatchEvent::Attack { note, .. } if note == "D3"));
}

/// `await_bound` reports failure instead of hanging forever.
#[test]
fn test_await_bound_times_out() {
    let t = test_engine();
    let proxy = VoiceProxy::new(t.rig.gain(), 4);

    let err = proxy.await_bound(Duration::from_millis(10)).unwrap_err();
    assert!(matches!(err, Error::VoiceBindTimeout { .. }));
}

/// Retiring a voice unmounts its template clone.
#[test]
fn test_retire_unmounts_voice() {
    let t = test_engine();
    let pool: NodeRef<VoiceSpawner> = NodeRef::new();

    t.engine
        .install(reverb(&t.rig).child(voice_pool(&t.rig).pool_ref(pool.clone())));
    t.engine.start().unwrap();

    let spawner = pool.get().unwrap();
    let proxy = spawner.spawn().unwrap();
    proxy.await_bound(Duration::from_millis(100)).unwrap();
    let sink_id = proxy.sink().id();
    let inst_id = t
        .rig
        .events()
        .iter()
        .find_map(|e| match e {
            PatchEvent::Connected { source, target } if target.node == sink_id => Some(*source),
            _ => None,
        })
        .expect("instrument connected into sink");

    spawner.retire(&proxy);
    assert_eq!(spawner.voice_count(), 0);
    assert!(t.rig.is_disposed(inst_id));
}

/// Unmounting the pool retires every live voice with it.
#[test]
fn test_pool_unmount_retires_voices() {
    let t = test_engine();
    let pool: NodeRef<VoiceSpawner> = NodeRef::new();

    t.engine
        .install(reverb(&t.rig).child(voice_pool(&t.rig).pool_ref(pool.clone())));
    t.engine.start().unwrap();

    let spawner = pool.get().unwrap();
    let a = spawner.spawn().unwrap();
    let b = spawner.spawn().unwrap();
    a.await_bound(Duration::from_millis(100)).unwrap();
    b.await_bound(Duration::from_millis(100)).unwrap();
    assert_eq!(spawner.voice_count(), 2);

    t.engine.update(reverb(&t.rig)).unwrap();
    assert_eq!(spawner.voice_count(), 0);
    assert!(t.rig.is_disposed(a.sink().id()));
    assert!(t.rig.is_disposed(b.sink().id()));
}
