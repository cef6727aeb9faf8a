//! The slice of the DOM the lifecycle watcher needs.
//!
//! A [`DomTree`] answers structural queries about nodes and streams subtree
//! mutations as batches, one batch per observer callback in a browser.
//! [`MemoryDom`] is an in-memory tree with the same batching behavior.

mod memory;

pub use memory::MemoryDom;

use tokio::sync::mpsc;

/// Opaque, copyable node identity.
///
/// Two ids are equal iff they name the same node, so a node that is removed
/// and reinserted keeps its identity while a freshly created node with the
/// same content does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One change to a node's child list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRecord {
    /// The node whose children changed.
    pub target: Option<NodeId>,
    /// Nodes inserted under `target`, in order.
    pub added: Vec<NodeId>,
    /// Nodes removed from `target`, in order.
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    /// A record of `nodes` being inserted under `target`.
    pub fn added(target: NodeId, nodes: Vec<NodeId>) -> Self {
        Self {
            target: Some(target),
            added: nodes,
            removed: Vec::new(),
        }
    }

    /// A record of `nodes` being removed from `target`.
    pub fn removed(target: NodeId, nodes: Vec<NodeId>) -> Self {
        Self {
            target: Some(target),
            added: Vec::new(),
            removed: nodes,
        }
    }
}

/// Records delivered together in one observer callback.
pub type MutationBatch = Vec<MutationRecord>;

/// Structural queries and mutation observation over a document.
pub trait DomTree: Send + Sync {
    /// The default observation root (the document body).
    fn root(&self) -> NodeId;

    /// Returns `true` for element nodes; `false` for text and unknown ids.
    fn is_element(&self, node: NodeId) -> bool;

    /// Returns `true` if `node` is an element carrying `class_name`.
    fn has_class(&self, node: NodeId, class_name: &str) -> bool;

    /// First descendant of `root` (excluding `root`) carrying `class_name`,
    /// in document order.
    fn query_class(&self, root: NodeId, class_name: &str) -> Option<NodeId>;

    /// Returns `true` if `node` is `ancestor` or one of its descendants.
    ///
    /// Must keep working for subtrees that have been detached.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    /// Subscribes to child-list mutations anywhere under `root`.
    ///
    /// The stream ends when the tree is dropped.
    fn observe(&self, root: NodeId) -> mpsc::UnboundedReceiver<MutationBatch>;
}
