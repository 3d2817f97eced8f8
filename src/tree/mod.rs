//! The subscription tree: model, renderer and unread propagation.
//!
//! The [`Tree`] is rebuilt wholesale from the server payload on every
//! resync. Rendering ([`render`], [`flatten`]) is a pure function of the
//! tree, the `unread_only` flag and the [`ActiveContext`]; the only local
//! mutations are the optimistic fold toggle and [`UnreadBatch::apply`].

mod model;
mod render;
mod unread;

pub use model::{Category, InvariantViolation, Subscription, Tree};
pub use render::{
    flatten, render, NodeMarkers, Placeholder, Rendered, RenderedCategory, RenderedNode,
    RenderedSubscription, TreeRow,
};
pub use unread::{CounterPatch, ReadTransition, UnreadBatch, UnreadDelta, UnreadUpdate};

#[cfg(test)]
pub(crate) use model::fixtures;

use std::fmt;

/// Deepest nesting level a category may reach (root is level 0).
pub const MAX_NESTING_LEVEL: u32 = 5;

/// A subscription with this many consecutive failed syncs is flagged.
pub const FAILING_SYNC_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub String);

impl CategoryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SubscriptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Either kind of tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Category(CategoryId),
    Subscription(SubscriptionId),
}

/// What the article panel is currently showing.
///
/// `Unread` is the home context every delete navigates back to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveContext {
    #[default]
    Unread,
    Category(CategoryId),
    Subscription(SubscriptionId),
}

impl ActiveContext {
    pub fn matches(&self, node: &NodeRef) -> bool {
        match (self, node) {
            (ActiveContext::Category(a), NodeRef::Category(b)) => a == b,
            (ActiveContext::Subscription(a), NodeRef::Subscription(b)) => a == b,
            _ => false,
        }
    }
}

impl From<NodeRef> for ActiveContext {
    fn from(node: NodeRef) -> Self {
        match node {
            NodeRef::Category(id) => ActiveContext::Category(id),
            NodeRef::Subscription(id) => ActiveContext::Subscription(id),
        }
    }
}
