//! Routing contexts: where audio leaving a subtree goes.
//!
//! The context is passed explicitly down the declaration tree. Containers
//! derive a child context targeting themselves, so the nearest enclosing
//! node wins; the system roots the whole tree at the backend destination.

use crate::node::SharedNode;

/// The ambient routing target for one point in the declaration tree.
///
/// Cheap to clone; contexts are handed to every child during mounting and
/// captured by containers that mount dynamically later (voice pools).
#[derive(Clone)]
pub struct RoutingContext {
    target: Option<SharedNode>,
}

impl RoutingContext {
    /// Root context bound to a destination node.
    pub fn rooted(destination: SharedNode) -> Self {
        RoutingContext {
            target: Some(destination),
        }
    }

    /// A context with no target. Resolution under it fails, which is the
    /// correct outcome for declarations mounted outside any container.
    pub fn detached() -> Self {
        RoutingContext { target: None }
    }

    /// Derive the context a container provides to its children: the
    /// container's own node becomes the default target.
    pub fn scoped(&self, node: SharedNode) -> Self {
        RoutingContext { target: Some(node) }
    }

    pub fn target(&self) -> Option<&SharedNode> {
        self.target.as_ref()
    }
}

impl std::fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(node) => write!(f, "RoutingContext({})", node.id()),
            None => write!(f, "RoutingContext(detached)"),
        }
    }
}
