//! Channel entities: the long-lived owners of send/receive state.
//!
//! A channel wraps a backend channel-strip node and carries two sticky
//! one-shot flags. Send and receive are each meant to be set up once per
//! channel instance; the flags record that an invocation happened and are
//! never cleared, not even by disposal. A channel that has
//! ever sent keeps its hierarchical output suppressed for good.

use parking_lot::Mutex;

use crate::bus::BusRegistry;
use crate::node::{NodeId, SharedNode};
use tracing::{debug, warn};

#[derive(Default)]
struct ChannelState {
    /// Sticky: a send was invoked at some point. Never cleared.
    sent: bool,
    /// Sticky: a receive was invoked at some point. Never cleared.
    received: bool,
    /// Label of the live send binding, if any.
    send_label: Option<String>,
    /// Label of the live receive binding, if any.
    receive_label: Option<String>,
}

/// A mounted channel: pass-through strip plus bus wiring state.
pub struct Channel {
    node: SharedNode,
    registry: BusRegistry,
    state: Mutex<ChannelState>,
}

impl Channel {
    pub fn new(node: SharedNode, registry: BusRegistry) -> Self {
        Channel {
            node,
            registry,
            state: Mutex::new(ChannelState::default()),
        }
    }

    pub fn node(&self) -> &SharedNode {
        &self.node
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// Route this channel's output onto the named bus.
    ///
    /// First invocation binds and sets the sticky flag. Any later
    /// invocation, same label or not, even after the first binding was
    /// torn down, logs a diagnostic and leaves the original binding
    /// untouched. A contested sender slot is downgraded to the same
    /// non-fatal diagnostic.
    pub fn send(&self, label: &str) {
        let mut state = self.state.lock();
        if state.sent {
            warn!(
                channel = %self.node.id(),
                label,
                "channel was sending output elsewhere, cannot reuse it"
            );
            return;
        }
        state.sent = true;
        match self.registry.bind_sender(label, self.node.clone()) {
            Ok(()) => {
                debug!(channel = %self.node.id(), label, "channel sending to bus");
                state.send_label = Some(label.to_string());
            }
            Err(e) => {
                warn!(channel = %self.node.id(), label, %e, "send not wired");
            }
        }
    }

    /// Receive audio from the named bus, in addition to this channel's own
    /// input. Sticky semantics mirror `send`.
    pub fn receive(&self, label: &str) {
        let mut state = self.state.lock();
        if state.received {
            warn!(
                channel = %self.node.id(),
                label,
                "channel was receiving output from elsewhere, cannot disconnect it"
            );
            return;
        }
        state.received = true;
        match self.registry.bind_receiver(label, self.node.clone()) {
            Ok(()) => {
                debug!(channel = %self.node.id(), label, "channel receiving from bus");
                state.receive_label = Some(label.to_string());
            }
            Err(e) => {
                warn!(channel = %self.node.id(), label, %e, "receive not wired");
            }
        }
    }

    /// Teardown of the sending declaration: drop all of this channel's
    /// outputs (bus receivers downstream go silent) and free the sender
    /// slot. The sticky flag stays set.
    pub fn unbind_send(&self) {
        let label = self.state.lock().send_label.take();
        if let Some(label) = label {
            self.registry.release_sender(&label, self.node.id());
            self.node.disconnect_all();
            debug!(channel = %self.node.id(), label, "channel send unbound");
        }
    }

    /// Teardown of the receiving declaration: unregister from the bus and
    /// drop this channel's outputs. The sticky flag stays set.
    pub fn unbind_receive(&self) {
        let label = self.state.lock().receive_label.take();
        if let Some(label) = label {
            self.registry.release_receiver(&label, self.node.id());
            self.node.disconnect_all();
            debug!(channel = %self.node.id(), label, "channel receive unbound");
        }
    }

    /// Whether a send was ever invoked on this channel. While true, the
    /// channel's hierarchical output connection stays suppressed.
    pub fn has_sent(&self) -> bool {
        self.state.lock().sent
    }

    pub fn has_received(&self) -> bool {
        self.state.lock().received
    }

    /// Whether a send binding is currently live.
    pub fn is_sending(&self) -> bool {
        self.state.lock().send_label.is_some()
    }

    pub fn is_receiving(&self) -> bool {
        self.state.lock().receive_label.is_some()
    }

    /// Full teardown: release any live bindings, drop all outputs, dispose
    /// the strip.
    pub fn dispose(&self) {
        self.unbind_send();
        self.unbind_receive();
        self.node.disconnect_all();
        self.node.dispose();
    }
}
