//! In-memory DOM with observer batching.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{DomTree, MutationBatch, MutationRecord, NodeId};

#[derive(Debug)]
enum NodeKind {
    Element { tag: String, classes: Vec<String> },
    Text,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Observer {
    id: u64,
    root: NodeId,
    tx: mpsc::UnboundedSender<MutationBatch>,
}

struct Inner {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    body: NodeId,
    observers: Vec<Observer>,
    next_observer_id: u64,
    /// Queued records, each with the observers whose subtree it touched when
    /// it was made.
    pending: Vec<(MutationRecord, Vec<u64>)>,
    transaction_depth: usize,
}

impl Inner {
    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    /// Unlinks `node` from its parent. Returns the former parent.
    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(&node)?.parent.take()?;
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&child| child != node);
        }
        Some(parent)
    }

    fn record(&mut self, record: MutationRecord) {
        let scope = match record.target {
            Some(target) => self
                .observers
                .iter()
                .filter(|o| self.contains(o.root, target))
                .map(|o| o.id)
                .collect(),
            None => Vec::new(),
        };
        self.pending.push((record, scope));
        if self.transaction_depth == 0 {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let records = std::mem::take(&mut self.pending);
        let observers = std::mem::take(&mut self.observers);

        for observer in observers {
            let batch: MutationBatch = records
                .iter()
                .filter(|(_, scope)| scope.contains(&observer.id))
                .map(|(record, _)| record.clone())
                .collect();

            let alive = if batch.is_empty() {
                !observer.tx.is_closed()
            } else {
                observer.tx.send(batch).is_ok()
            };
            if alive {
                self.observers.push(observer);
            }
        }
    }
}

/// An in-memory document for driving a
/// [`LifecycleWatcher`](crate::LifecycleWatcher) without a browser.
///
/// Starts with a single `body` element. Each mutation outside a
/// [`transaction`](Self::transaction) is delivered to observers as its own
/// batch; mutations inside one are delivered together when it ends, the way
/// a browser coalesces the changes of one task into a single observer
/// callback.
///
/// # Example
///
/// ```
/// use page_capture::{DomTree, MemoryDom};
///
/// let dom = MemoryDom::new();
/// let mask = dom.create_element("div", &["note-detail-mask"]);
/// dom.append_child(dom.root(), mask);
///
/// assert_eq!(dom.query_class(dom.root(), "note-detail-mask"), Some(mask));
/// ```
pub struct MemoryDom {
    inner: Mutex<Inner>,
}

impl MemoryDom {
    /// Creates a document containing only `body`.
    pub fn new() -> Self {
        let mut inner = Inner {
            nodes: HashMap::new(),
            next_id: 1,
            body: NodeId::new(0),
            observers: Vec::new(),
            next_observer_id: 0,
            pending: Vec::new(),
            transaction_depth: 0,
        };
        inner.body = inner.insert(NodeKind::Element {
            tag: "body".to_string(),
            classes: Vec::new(),
        });
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str, classes: &[&str]) -> NodeId {
        self.inner.lock().insert(NodeKind::Element {
            tag: tag.to_string(),
            classes: classes.iter().map(|c| (*c).to_string()).collect(),
        })
    }

    /// Creates a detached text node.
    pub fn create_text(&self) -> NodeId {
        self.inner.lock().insert(NodeKind::Text)
    }

    /// Tag name of an element.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.inner.lock().nodes.get(&node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text => None,
        }
    }

    /// Parent of `node`, if attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.lock().nodes.get(&node)?.parent
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Moves `child` to the end of `parent`'s children.
    ///
    /// A child that already has a parent is removed from it first, which is
    /// recorded as a separate removal. Returns `false` if either node is
    /// unknown, `parent` is not an element, or the move would create a cycle.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut inner = self.inner.lock();
        let parent_is_element = matches!(
            inner.nodes.get(&parent).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        );
        if !parent_is_element || !inner.nodes.contains_key(&child) || inner.contains(child, parent)
        {
            return false;
        }

        if let Some(old_parent) = inner.detach(child) {
            inner.record(MutationRecord::removed(old_parent, vec![child]));
        }

        if let Some(p) = inner.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = inner.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
        inner.record(MutationRecord::added(parent, vec![child]));
        true
    }

    /// Detaches `node` from its parent. Its subtree stays intact.
    ///
    /// Returns `false` if the node was not attached.
    pub fn remove(&self, node: NodeId) -> bool {
        let mut inner = self.inner.lock();
        match inner.detach(node) {
            Some(parent) => {
                inner.record(MutationRecord::removed(parent, vec![node]));
                true
            }
            None => false,
        }
    }

    /// Replaces `old` (a child of `parent`) with `new`, recorded as one
    /// mutation with both an insertion and a removal.
    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> bool {
        let mut inner = self.inner.lock();
        let Some(index) = inner
            .nodes
            .get(&parent)
            .and_then(|p| p.children.iter().position(|&c| c == old))
        else {
            return false;
        };
        if !inner.nodes.contains_key(&new) || new == old || inner.contains(new, parent) {
            return false;
        }

        if let Some(previous) = inner.detach(new) {
            inner.record(MutationRecord::removed(previous, vec![new]));
        }
        // Detaching `new` may have shifted `old` within the same parent
        let index = inner
            .nodes
            .get(&parent)
            .and_then(|p| p.children.iter().position(|&c| c == old))
            .unwrap_or(index);

        if let Some(slot) = inner
            .nodes
            .get_mut(&parent)
            .and_then(|p| p.children.get_mut(index))
        {
            *slot = new;
        }
        if let Some(n) = inner.nodes.get_mut(&new) {
            n.parent = Some(parent);
        }
        if let Some(o) = inner.nodes.get_mut(&old) {
            o.parent = None;
        }

        inner.record(MutationRecord {
            target: Some(parent),
            added: vec![new],
            removed: vec![old],
        });
        true
    }

    /// Adds a class to an element. Attribute changes are not observed.
    pub fn add_class(&self, node: NodeId, class_name: &str) {
        if let Some(Node {
            kind: NodeKind::Element { classes, .. },
            ..
        }) = self.inner.lock().nodes.get_mut(&node)
        {
            if !classes.iter().any(|c| c == class_name) {
                classes.push(class_name.to_string());
            }
        }
    }

    /// Removes a class from an element. Attribute changes are not observed.
    pub fn remove_class(&self, node: NodeId, class_name: &str) {
        if let Some(Node {
            kind: NodeKind::Element { classes, .. },
            ..
        }) = self.inner.lock().nodes.get_mut(&node)
        {
            classes.retain(|c| c != class_name);
        }
    }

    /// Runs `f`, delivering every mutation it makes as a single batch.
    ///
    /// Transactions nest; the batch is delivered when the outermost ends.
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.inner.lock().transaction_depth += 1;
        let result = f(self);

        let mut inner = self.inner.lock();
        inner.transaction_depth -= 1;
        if inner.transaction_depth == 0 {
            inner.flush();
        }
        result
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.inner
            .lock()
            .observers
            .iter()
            .filter(|o| !o.tx.is_closed())
            .count()
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree for MemoryDom {
    fn root(&self) -> NodeId {
        self.inner.lock().body
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.inner.lock().nodes.get(&node).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    fn has_class(&self, node: NodeId, class_name: &str) -> bool {
        match self.inner.lock().nodes.get(&node).map(|n| &n.kind) {
            Some(NodeKind::Element { classes, .. }) => classes.iter().any(|c| c == class_name),
            _ => false,
        }
    }

    fn query_class(&self, root: NodeId, class_name: &str) -> Option<NodeId> {
        let inner = self.inner.lock();
        let mut stack: Vec<NodeId> = inner
            .nodes
            .get(&root)?
            .children
            .iter()
            .rev()
            .copied()
            .collect();

        while let Some(id) = stack.pop() {
            let Some(node) = inner.nodes.get(&id) else {
                continue;
            };
            if let NodeKind::Element { classes, .. } = &node.kind {
                if classes.iter().any(|c| c == class_name) {
                    return Some(id);
                }
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.lock().contains(ancestor, node)
    }

    fn observe(&self, root: NodeId) -> mpsc::UnboundedReceiver<MutationBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_observer_id;
        inner.next_observer_id += 1;
        inner.observers.push(Observer { id, root, tx });
        rx
    }
}
