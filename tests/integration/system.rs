//! System facade tests
//!
//! Start gating, staged vs mounted blueprints, stop/restart.

use patchbay::prelude::*;
use patchbay::{NodeRef, PatchEvent};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// Starting with nothing staged must fail loudly.
#[test]
fn test_start_without_install_errors() {
    let t = test_engine();
    let err = t.engine.start().unwrap_err();
    assert!(matches!(err, Error::NothingInstalled));
    assert!(!t.engine.is_started());
}

/// Install stages silently; start mounts and opens the clock.
#[test]
fn test_install_is_silent_until_start() {
    let t = test_engine();
    t.engine.install(reverb(&t.rig));

    assert!(t.rig.events().is_empty());
    assert!(!t.clock.is_running());

    t.engine.start().unwrap();
    assert!(t.engine.is_started());
    assert!(t.clock.is_running());
    // The root landed on the destination.
    assert!(t
        .rig
        .events()
        .iter()
        .any(|e| matches!(e, PatchEvent::Connected { .. })));
}

#[test]
fn test_double_start_errors() {
    let t = test_engine();
    t.engine.install(reverb(&t.rig));
    t.engine.start().unwrap();

    let err = t.engine.start().unwrap_err();
    assert!(matches!(err, Error::AlreadyStarted));
}

/// Update before start only restages; nothing touches the backend.
#[test]
fn test_update_before_start_stages_only() {
    let t = test_engine();
    t.engine.install(reverb(&t.rig));
    t.engine.update(filter(&t.rig)).unwrap();

    assert!(t.rig.events().is_empty());

    // The most recently staged tree is what start mounts.
    let r: NodeRef = NodeRef::new();
    t.engine.update(filter(&t.rig).node_ref(r.clone())).unwrap();
    t.engine.start().unwrap();
    assert!(r.is_bound());
}

/// Stop unmounts everything and halts the clock; the staged blueprint
/// survives for a later restart.
#[test]
fn test_stop_unmounts_and_allows_restart() {
    let t = test_engine();
    let r: NodeRef = NodeRef::new();
    t.engine.install(reverb(&t.rig).node_ref(r.clone()));
    t.engine.start().unwrap();
    let first = r.get().unwrap().id();

    t.engine.stop();
    assert!(!t.engine.is_started());
    assert!(!t.clock.is_running());
    assert!(t.rig.is_disposed(first));
    assert!(!r.is_bound());

    t.engine.start().unwrap();
    let second = r.get().unwrap().id();
    assert_ne!(first, second);
    assert!(t.clock.is_running());
}

#[test]
fn test_stop_is_idempotent() {
    let t = test_engine();
    t.engine.stop();
    t.engine.stop();
    assert!(t.rig.events().is_empty());
}

/// Config knobs flow through the builder.
#[test]
fn test_builder_config_overrides() {
    let rig = VirtualRig::new();
    let engine = PatchbayEngine::builder()
        .backend(std::sync::Arc::new(rig.clone()))
        .transport(std::sync::Arc::new(StepClock::new(90.0)))
        .fallback_duration(0.25)
        .voice_queue_cap(16)
        .build()
        .unwrap();

    assert_eq!(engine.config().fallback_duration, 0.25);
    assert_eq!(engine.config().voice_queue_cap, 16);
    assert_eq!(engine.transport().bpm(), 90.0);
}

/// The builder refuses bad configuration instead of limping along.
#[test]
fn test_builder_rejects_invalid_config() {
    let rig = VirtualRig::new();
    let Err(err) = PatchbayEngine::builder()
        .backend(std::sync::Arc::new(rig))
        .transport(std::sync::Arc::new(StepClock::new(120.0)))
        .fallback_duration(0.0)
        .build()
    else {
        panic!("invalid config must be rejected");
    };
    assert!(matches!(err, Error::InvalidConfig(_)));
}
