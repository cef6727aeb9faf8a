//! Element tracking state machine.
//!
//! [`ElementTracker`] holds at most one tracked element and turns DOM
//! observations into [`Transition`]s. It never calls back into user code;
//! the watcher dispatches the returned transitions.

use crate::dom::{DomTree, MutationRecord, NodeId};

/// Whether an element is currently tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    /// Nothing tracked.
    #[default]
    Absent,
    /// This element is tracked.
    Present(NodeId),
}

/// A change in the tracked element, to be reported to callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The element became tracked (`on_add`).
    Added(NodeId),
    /// The element stopped being tracked (`on_remove`).
    Removed(NodeId),
}

/// Tracks the single element carrying a class name.
///
/// # Example
///
/// ```
/// use page_capture::{DomTree, MemoryDom};
/// use page_capture::watcher::{ElementTracker, Transition};
///
/// let dom = MemoryDom::new();
/// let mask = dom.create_element("div", &["mask"]);
/// dom.append_child(dom.root(), mask);
///
/// let mut tracker = ElementTracker::new("mask");
/// assert_eq!(tracker.observe_insertion(&dom, mask), Some(Transition::Added(mask)));
/// assert_eq!(tracker.observe_insertion(&dom, mask), None);
///
/// dom.remove(mask);
/// assert_eq!(
///     tracker.observe_removal(&dom, dom.root(), mask),
///     Some(Transition::Removed(mask))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ElementTracker {
    class_name: String,
    state: TrackerState,
}

impl ElementTracker {
    /// Creates a tracker for `class_name`, initially [`TrackerState::Absent`].
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            state: TrackerState::Absent,
        }
    }

    /// The class name being tracked.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Current state.
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// The tracked element, if any.
    pub fn current(&self) -> Option<NodeId> {
        match self.state {
            TrackerState::Absent => None,
            TrackerState::Present(node) => Some(node),
        }
    }

    /// The element `node` contributes: itself if it carries the class,
    /// otherwise its first matching descendant. Non-elements never match.
    pub fn matching_element(&self, dom: &dyn DomTree, node: NodeId) -> Option<NodeId> {
        if !dom.is_element(node) {
            return None;
        }
        if dom.has_class(node, &self.class_name) {
            return Some(node);
        }
        dom.query_class(node, &self.class_name)
    }

    /// Handles an inserted node.
    pub fn observe_insertion(&mut self, dom: &dyn DomTree, node: NodeId) -> Option<Transition> {
        let found = self.matching_element(dom, node)?;
        if self.current() == Some(found) {
            return None;
        }
        self.state = TrackerState::Present(found);
        Some(Transition::Added(found))
    }

    /// Handles a node removed from under `root`.
    ///
    /// A tracked element that is still attached under `root` was moved, not
    /// removed, and stays tracked.
    pub fn observe_removal(
        &mut self,
        dom: &dyn DomTree,
        root: NodeId,
        node: NodeId,
    ) -> Option<Transition> {
        let current = self.current()?;
        if node != current && !dom.contains(node, current) {
            return None;
        }
        if dom.contains(root, current) {
            return None;
        }
        self.state = TrackerState::Absent;
        Some(Transition::Removed(current))
    }

    /// Handles one observer batch observed under `root`: every insertion
    /// first, then every removal, each in record order.
    pub fn apply_batch(
        &mut self,
        dom: &dyn DomTree,
        root: NodeId,
        batch: &[MutationRecord],
    ) -> Vec<Transition> {
        let insertions = batch
            .iter()
            .flat_map(|r| r.added.iter().copied())
            .collect::<Vec<_>>();
        let removals = batch
            .iter()
            .flat_map(|r| r.removed.iter().copied())
            .collect::<Vec<_>>();

        let mut transitions = Vec::new();
        for node in insertions {
            transitions.extend(self.observe_insertion(dom, node));
        }
        for node in removals {
            transitions.extend(self.observe_removal(dom, root, node));
        }
        transitions
    }

    /// Looks for a match already present under `root`.
    pub fn scan(&mut self, dom: &dyn DomTree, root: NodeId) -> Option<Transition> {
        let found = dom.query_class(root, &self.class_name)?;
        if self.current() == Some(found) {
            return None;
        }
        self.state = TrackerState::Present(found);
        Some(Transition::Added(found))
    }

    /// Forgets the tracked element without reporting a transition.
    pub fn reset(&mut self) {
        self.state = TrackerState::Absent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDom;

    const CLASS: &str = "note-detail-mask";

    #[test]
    fn test_insertion_of_match_and_ancestor() {
        let dom = MemoryDom::new();
        let wrapper = dom.create_element("div", &[]);
        let mask = dom.create_element("div", &[CLASS]);
        dom.append_child(wrapper, mask);

        let mut tracker = ElementTracker::new(CLASS);
        assert_eq!(tracker.observe_insertion(&dom, wrapper), Some(Transition::Added(mask)));
        assert_eq!(tracker.state(), TrackerState::Present(mask));
        // Touching the tracked element again never re-fires
        assert_eq!(tracker.observe_insertion(&dom, wrapper), None);
        assert_eq!(tracker.observe_insertion(&dom, mask), None);
    }

    #[test]
    fn test_text_and_unrelated_nodes_ignored() {
        let dom = MemoryDom::new();
        let mut tracker = ElementTracker::new(CLASS);
        assert_eq!(tracker.observe_insertion(&dom, dom.create_text()), None);
        assert_eq!(tracker.observe_insertion(&dom, dom.create_element("p", &[])), None);
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn test_distinct_match_replaces_current() {
        let dom = MemoryDom::new();
        let first = dom.create_element("div", &[CLASS]);
        let second = dom.create_element("div", &[CLASS]);

        let mut tracker = ElementTracker::new(CLASS);
        tracker.observe_insertion(&dom, first);
        assert_eq!(tracker.observe_insertion(&dom, second), Some(Transition::Added(second)));
        assert_eq!(tracker.current(), Some(second));
    }

    #[test]
    fn test_removal_of_ancestor_clears() {
        let dom = MemoryDom::new();
        let wrapper = dom.create_element("div", &[]);
        let mask = dom.create_element("div", &[CLASS]);
        dom.append_child(dom.root(), wrapper);
        dom.append_child(wrapper, mask);

        let mut tracker = ElementTracker::new(CLASS);
        tracker.scan(&dom, dom.root());
        dom.remove(wrapper);

        assert_eq!(
            tracker.observe_removal(&dom, dom.root(), wrapper),
            Some(Transition::Removed(mask))
        );
        assert_eq!(tracker.observe_removal(&dom, dom.root(), wrapper), None);
        assert_eq!(tracker.state(), TrackerState::Absent);
    }

    #[test]
    fn test_unrelated_removal_keeps_current() {
        let dom = MemoryDom::new();
        let mask = dom.create_element("div", &[CLASS]);
        let other = dom.create_element("div", &[]);
        dom.append_child(dom.root(), mask);
        dom.append_child(dom.root(), other);

        let mut tracker = ElementTracker::new(CLASS);
        tracker.scan(&dom, dom.root());
        dom.remove(other);
        assert_eq!(tracker.observe_removal(&dom, dom.root(), other), None);
        assert_eq!(tracker.current(), Some(mask));
    }

    #[test]
    fn test_move_within_one_batch_keeps_element() {
        let dom = MemoryDom::new();
        let holder = dom.create_element("div", &[]);
        let mask = dom.create_element("div", &[CLASS]);
        dom.append_child(dom.root(), holder);
        dom.append_child(dom.root(), mask);

        let mut tracker = ElementTracker::new(CLASS);
        tracker.scan(&dom, dom.root());
        dom.append_child(holder, mask);

        let batch = vec![
            MutationRecord::removed(dom.root(), vec![mask]),
            MutationRecord::added(holder, vec![mask]),
        ];
        assert!(tracker.apply_batch(&dom, dom.root(), &batch).is_empty());
        assert_eq!(tracker.current(), Some(mask));
    }

    #[test]
    fn test_insert_then_remove_in_one_batch() {
        let dom = MemoryDom::new();
        let mask = dom.create_element("div", &[CLASS]);

        // Inserted and removed again before the batch was delivered
        let batch = vec![
            MutationRecord::added(dom.root(), vec![mask]),
            MutationRecord::removed(dom.root(), vec![mask]),
        ];
        let mut tracker = ElementTracker::new(CLASS);
        let transitions = tracker.apply_batch(&dom, dom.root(), &batch);
        assert_eq!(transitions, vec![Transition::Added(mask), Transition::Removed(mask)]);
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn test_content_swap_in_one_batch() {
        let dom = MemoryDom::new();
        let old = dom.create_element("div", &[CLASS]);
        let new = dom.create_element("div", &[CLASS]);
        dom.append_child(dom.root(), old);

        let mut tracker = ElementTracker::new(CLASS);
        tracker.scan(&dom, dom.root());
        dom.replace_child(dom.root(), new, old);

        let batch = vec![MutationRecord {
            target: Some(dom.root()),
            added: vec![new],
            removed: vec![old],
        }];
        assert_eq!(
            tracker.apply_batch(&dom, dom.root(), &batch),
            vec![Transition::Added(new)]
        );
        assert_eq!(tracker.current(), Some(new));
    }

    #[test]
    fn test_scan_excludes_root_itself() {
        let dom = MemoryDom::new();
        let mut tracker = ElementTracker::new(CLASS);
        let root = dom.root();
        dom.add_class(root, CLASS);
        assert_eq!(tracker.scan(&dom, root), None);
    }

    #[test]
    fn test_reset_is_silent() {
        let dom = MemoryDom::new();
        let mask = dom.create_element("div", &[CLASS]);
        let mut tracker = ElementTracker::new(CLASS);
        tracker.observe_insertion(&dom, mask);
        tracker.reset();
        assert_eq!(tracker.current(), None);
        assert_eq!(tracker.observe_removal(&dom, dom.root(), mask), None);
    }
}
