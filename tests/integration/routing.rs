//! Routing integration tests
//!
//! Hierarchical wiring through nested declarations, named control ports,
//! and in-place reconciliation on update.

use patchbay::prelude::*;
use patchbay::{Inlet, NodeRef, PatchEvent, RoutingContext};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// A child's output lands on its parent; the root lands on the
/// destination.
#[test]
fn test_nested_nodes_chain_upward() {
    let t = test_engine();
    let outer: NodeRef = NodeRef::new();
    let inner: NodeRef = NodeRef::new();

    t.engine.install(
        reverb(&t.rig)
            .node_ref(outer.clone())
            .child(filter(&t.rig).node_ref(inner.clone())),
    );
    t.engine.start().unwrap();

    let outer_id = outer.get().unwrap().id();
    let inner_id = inner.get().unwrap().id();
    assert!(t.rig.has_edge(outer_id, &Inlet::of(destination_id(&t.rig))));
    assert!(t.rig.has_edge(inner_id, &Inlet::of(outer_id)));
}

/// `.port()` routes into a named control inlet instead of the audio input.
#[test]
fn test_port_routes_into_control_inlet() {
    let t = test_engine();
    let filter_ref: NodeRef = NodeRef::new();
    let lfo_ref = NodeRef::new();

    t.engine.install(
        filter(&t.rig)
            .node_ref(filter_ref.clone())
            .child(lfo(&t.rig).port("frequency").source_ref(lfo_ref.clone())),
    );
    t.engine.start().unwrap();

    let filter_id = filter_ref.get().unwrap().id();
    let lfo_id = lfo_ref.get().unwrap().id();
    assert!(t
        .rig
        .has_edge(lfo_id, &Inlet::control(filter_id, "frequency")));
}

/// Asking for a control the target does not expose fails the mount and
/// unwinds what was already wired.
#[test]
fn test_unknown_port_fails_mount() {
    let t = test_engine();
    let outer: NodeRef = NodeRef::new();

    t.engine.install(
        reverb(&t.rig)
            .node_ref(outer.clone())
            .child(lfo(&t.rig).port("frequency")),
    );
    let err = t.engine.start().unwrap_err();
    assert!(matches!(err, Error::NoSuchControl(name) if name == "frequency"));

    // The partial mount was torn back down.
    assert!(!t.engine.is_started());
    assert!(!outer.is_bound());
}

/// Mounting outside any routing container has no output to connect to.
#[test]
fn test_mount_without_target_errors() {
    let t = test_engine();
    let Err(err) = t
        .engine
        .rack()
        .mount(&reverb(&t.rig), &RoutingContext::detached())
    else {
        panic!("mount without a target must fail");
    };
    assert!(matches!(err, Error::NoRoutingTarget));
    assert_eq!(err.to_string(), "no output to connect to");
}

/// Re-applying a description never re-invokes factories; surviving
/// declarations keep their nodes.
#[test]
fn test_update_keeps_existing_nodes() {
    let t = test_engine();
    let r: NodeRef = NodeRef::new();

    t.engine
        .install(reverb(&t.rig).node_ref(r.clone()).child(filter(&t.rig)));
    t.engine.start().unwrap();
    let first = r.get().unwrap().id();
    t.rig.clear_events();

    t.engine
        .update(reverb(&t.rig).node_ref(r.clone()).child(filter(&t.rig)))
        .unwrap();

    assert_eq!(r.get().unwrap().id(), first);
    // An identical description causes no rewiring at all.
    assert!(t.rig.events().is_empty());
}

/// Removing a child from the description unmounts exactly that child.
#[test]
fn test_update_removes_surplus_child() {
    let t = test_engine();
    let child_ref: NodeRef = NodeRef::new();

    t.engine
        .install(reverb(&t.rig).child(filter(&t.rig).node_ref(child_ref.clone())));
    t.engine.start().unwrap();
    let child_id = child_ref.get().unwrap().id();

    t.engine.update(reverb(&t.rig)).unwrap();

    assert!(t.rig.is_disposed(child_id));
    assert!(t
        .rig
        .events()
        .iter()
        .any(|e| matches!(e, PatchEvent::DisconnectedAll { source } if *source == child_id)));
}

/// Appending a child to the description mounts it under the surviving
/// parent.
#[test]
fn test_update_appends_child() {
    let t = test_engine();
    let parent: NodeRef = NodeRef::new();
    let child: NodeRef = NodeRef::new();

    t.engine.install(reverb(&t.rig).node_ref(parent.clone()));
    t.engine.start().unwrap();

    t.engine
        .update(
            reverb(&t.rig)
                .node_ref(parent.clone())
                .child(filter(&t.rig).node_ref(child.clone())),
        )
        .unwrap();

    let parent_id = parent.get().unwrap().id();
    let child_id = child.get().unwrap().id();
    assert!(t.rig.has_edge(child_id, &Inlet::of(parent_id)));
}

/// A kind change at one position replaces that whole subtree.
#[test]
fn test_update_kind_change_remounts() {
    let t = test_engine();
    let r: NodeRef = NodeRef::new();

    t.engine
        .install(Blueprint::group().child(reverb(&t.rig).node_ref(r.clone())));
    t.engine.start().unwrap();
    let first = r.get().unwrap().id();

    // Same position, different kind: the node goes away...
    t.engine
        .update(Blueprint::group().child(synth(&t.rig, "keys")))
        .unwrap();
    assert!(t.rig.is_disposed(first));

    // ...and coming back means a fresh node.
    t.engine
        .update(Blueprint::group().child(reverb(&t.rig).node_ref(r.clone())))
        .unwrap();
    assert_ne!(r.get().unwrap().id(), first);
}

/// Sources get transport lifecycle calls around their mount.
#[test]
fn test_source_synced_and_started() {
    let t = test_engine();
    let r = NodeRef::new();

    t.engine
        .install(filter(&t.rig).child(lfo(&t.rig).port("frequency").source_ref(r.clone())));
    t.engine.start().unwrap();
    let lfo_id = r.get().unwrap().id();

    let events = t.rig.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PatchEvent::Synced { node } if *node == lfo_id)));
    assert!(events
        .iter()
        .any(|e| matches!(e, PatchEvent::Started { node, time } if *node == lfo_id && *time == 0.0)));

    t.engine.stop();
    let events = t.rig.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PatchEvent::Unsynced { node } if *node == lfo_id)));
    assert!(events
        .iter()
        .any(|e| matches!(e, PatchEvent::Stopped { node } if *node == lfo_id)));
}
