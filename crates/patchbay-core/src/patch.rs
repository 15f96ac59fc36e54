//! The connection resolver: turns an ambient routing context into a
//! concrete inlet and keeps the edge alive for exactly as long as the
//! owning declaration.

use tracing::debug;

use crate::context::RoutingContext;
use crate::node::{Inlet, SharedNode};
use crate::{Error, Result};

/// Resolve the effective output target under `ctx`.
///
/// Without a port name the target is the ambient node's main inlet; with
/// one it is that node's named control inlet. Fails when no ambient target
/// is established, when the target accepts no input, or when the named
/// control does not exist.
pub fn resolve(ctx: &RoutingContext, port: Option<&str>) -> Result<Inlet> {
    let target = ctx.target().ok_or(Error::NoRoutingTarget)?;
    match port {
        Some(name) => target
            .control_inlet(name)
            .ok_or_else(|| Error::NoSuchControl(name.to_string())),
        None => target.inlet().ok_or(Error::TargetNotConnectable),
    }
}

/// A live, owned connection from one node's output to a resolved inlet.
///
/// Connects on construction, disconnects exactly once on `release` (or
/// Drop). `retarget` re-resolves against a new context and rewires only
/// when the resolved identity actually changed; unrelated re-declaration
/// never touches the edge. The port name is captured at construction and
/// never re-read; pointing at a different control requires a new cord.
pub struct PatchCord {
    source: SharedNode,
    port: Option<String>,
    bound: Option<Inlet>,
}

impl PatchCord {
    /// Resolve under `ctx` and connect `source` there.
    pub fn connect(source: SharedNode, ctx: &RoutingContext, port: Option<&str>) -> Result<Self> {
        let inlet = resolve(ctx, port)?;
        source.connect(&inlet);
        debug!(source = %source.id(), target = %inlet, "patch cord connected");
        Ok(PatchCord {
            source,
            port: port.map(str::to_string),
            bound: Some(inlet),
        })
    }

    /// Re-resolve under a new context.
    ///
    /// Same identity: no-op. New identity: disconnect the old edge, connect
    /// the new one. Failed resolution releases the existing edge before
    /// reporting; the scope that justified it is gone.
    pub fn retarget(&mut self, ctx: &RoutingContext) -> Result<()> {
        let next = match resolve(ctx, self.port.as_deref()) {
            Ok(inlet) => inlet,
            Err(e) => {
                self.release();
                return Err(e);
            }
        };
        if self.bound.as_ref() == Some(&next) {
            return Ok(());
        }
        if let Some(old) = self.bound.take() {
            self.source.disconnect(&old);
            debug!(source = %self.source.id(), target = %old, "patch cord moved off");
        }
        self.source.connect(&next);
        debug!(source = %self.source.id(), target = %next, "patch cord connected");
        self.bound = Some(next);
        Ok(())
    }

    /// Disconnect if connected. Idempotent; also runs on Drop.
    pub fn release(&mut self) {
        if let Some(inlet) = self.bound.take() {
            self.source.disconnect(&inlet);
            debug!(source = %self.source.id(), target = %inlet, "patch cord released");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.bound.is_some()
    }

    /// The inlet currently connected to, if any.
    pub fn target(&self) -> Option<&Inlet> {
        self.bound.as_ref()
    }
}

impl Drop for PatchCord {
    fn drop(&mut self) {
        self.release();
    }
}
