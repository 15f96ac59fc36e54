//! Named audio buses: virtual wires between otherwise-unrelated branches
//! of the tree.
//!
//! A label holds at most one sender and any number of receivers. With that
//! cardinality the registry wires the sender straight into each receiver's
//! main inlet, no junction node required, connecting eagerly as either
//! side appears.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::node::{NodeId, SharedNode};
use crate::{Error, Result};

#[derive(Default)]
struct BusState {
    sender: Option<SharedNode>,
    receivers: Vec<SharedNode>,
}

/// Registry of named send/receive buses.
///
/// Clones share the same underlying table. All wiring performed here uses
/// the sender's `connect`/`disconnect`; the sender side's own teardown
/// (`disconnect_all`) is the caller's job, so `release_sender` is pure
/// bookkeeping.
#[derive(Clone, Default)]
pub struct BusRegistry {
    buses: Arc<DashMap<String, BusState>>,
}

impl BusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the sender slot of `label` and wire the node to every
    /// registered receiver. Fails if another sender holds the slot.
    pub fn bind_sender(&self, label: &str, node: SharedNode) -> Result<()> {
        let mut state = self.buses.entry(label.to_string()).or_default();
        if let Some(current) = &state.sender {
            trace!(label, holder = %current.id(), "sender slot already held");
            return Err(Error::BusOccupied(label.to_string()));
        }
        for receiver in &state.receivers {
            if let Some(inlet) = receiver.inlet() {
                node.connect(&inlet);
            }
        }
        debug!(label, sender = %node.id(), receivers = state.receivers.len(), "bus sender bound");
        state.sender = Some(node);
        Ok(())
    }

    /// Clear the sender slot if `node` holds it. Bookkeeping only; the
    /// caller has already torn down the node's outputs.
    pub fn release_sender(&self, label: &str, node: NodeId) {
        if let Some(mut state) = self.buses.get_mut(label) {
            if state.sender.as_ref().map(|s| s.id()) == Some(node) {
                state.sender = None;
                debug!(label, sender = %node, "bus sender released");
            }
        }
        self.prune(label);
    }

    /// Register a receiver on `label`; if a sender is live, wire it in
    /// immediately.
    pub fn bind_receiver(&self, label: &str, node: SharedNode) -> Result<()> {
        let inlet = node.inlet().ok_or(Error::TargetNotConnectable)?;
        let mut state = self.buses.entry(label.to_string()).or_default();
        if state.receivers.iter().any(|r| r.id() == node.id()) {
            trace!(label, receiver = %node.id(), "receiver already registered");
            return Ok(());
        }
        if let Some(sender) = &state.sender {
            sender.connect(&inlet);
        }
        debug!(label, receiver = %node.id(), "bus receiver bound");
        state.receivers.push(node);
        Ok(())
    }

    /// Unregister a receiver, dropping the sender edge into it if one is
    /// live.
    pub fn release_receiver(&self, label: &str, node: NodeId) {
        if let Some(mut state) = self.buses.get_mut(label) {
            if let Some(pos) = state.receivers.iter().position(|r| r.id() == node) {
                let receiver = state.receivers.remove(pos);
                if let (Some(sender), Some(inlet)) = (&state.sender, receiver.inlet()) {
                    sender.disconnect(&inlet);
                }
                debug!(label, receiver = %node, "bus receiver released");
            }
        }
        self.prune(label);
    }

    pub fn has_sender(&self, label: &str) -> bool {
        self.buses
            .get(label)
            .map(|state| state.sender.is_some())
            .unwrap_or(false)
    }

    pub fn receiver_count(&self, label: &str) -> usize {
        self.buses
            .get(label)
            .map(|state| state.receivers.len())
            .unwrap_or(0)
    }

    fn prune(&self, label: &str) {
        self.buses
            .remove_if(label, |_, state| {
                state.sender.is_none() && state.receivers.is_empty()
            });
    }
}
