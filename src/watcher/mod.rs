//! Lifecycle watcher for a class-tagged overlay element.
//!
//! The watcher subscribes to child-list mutations under a root node and
//! reports when the element carrying its class name appears (`on_add`) or
//! leaves the document (`on_remove`). At most one element is tracked at a
//! time; a new distinct match replaces the current one.

mod tracker;

pub use tracker::{ElementTracker, TrackerState, Transition};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dom::{DomTree, MutationBatch, NodeId};
use crate::CaptureError;

/// Class name watched when none is configured.
pub const DEFAULT_CLASS_NAME: &str = "note-detail-mask";

/// Callback invoked with the element that was added or removed.
pub type ElementCallback = Arc<dyn Fn(NodeId) + Send + Sync>;

/// Watcher settings.
///
/// # Example
///
/// ```
/// use page_capture::WatcherOptions;
///
/// let options = WatcherOptions::default()
///     .class_name("video-overlay")
///     .on_add(|node| println!("overlay {node} shown"))
///     .on_remove(|node| println!("overlay {node} gone"));
/// ```
#[derive(Clone)]
#[must_use]
pub struct WatcherOptions {
    /// Class carried by the tracked element, with or without a leading `.`.
    ///
    /// Default: [`DEFAULT_CLASS_NAME`]
    pub class_name: String,
    /// Called when an element becomes tracked.
    pub on_add: Option<ElementCallback>,
    /// Called when the tracked element leaves the document.
    pub on_remove: Option<ElementCallback>,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_CLASS_NAME.to_string(),
            on_add: None,
            on_remove: None,
        }
    }
}

impl WatcherOptions {
    /// Sets the class name to watch.
    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// Sets the add callback.
    pub fn on_add<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeId) + Send + Sync + 'static,
    {
        self.on_add = Some(Arc::new(f));
        self
    }

    /// Sets the remove callback.
    pub fn on_remove<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeId) + Send + Sync + 'static,
    {
        self.on_remove = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for WatcherOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherOptions")
            .field("class_name", &self.class_name)
            .field("on_add", &self.on_add.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .finish()
    }
}

/// Trims a class name and strips one leading `.`.
fn normalize_class_name(raw: &str) -> Result<String, CaptureError> {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(CaptureError::InvalidClassName {
            class_name: raw.to_string(),
        });
    }
    Ok(name.to_string())
}

#[derive(Clone)]
struct Callbacks {
    on_add: Option<ElementCallback>,
    on_remove: Option<ElementCallback>,
}

impl Callbacks {
    fn dispatch(&self, transition: Transition) {
        match transition {
            Transition::Added(node) => {
                tracing::debug!(node = %node, "tracked element added");
                if let Some(ref f) = self.on_add {
                    f(node);
                }
            }
            Transition::Removed(node) => {
                tracing::debug!(node = %node, "tracked element removed");
                if let Some(ref f) = self.on_remove {
                    f(node);
                }
            }
        }
    }
}

struct WatchState {
    tracker: ElementTracker,
    active: bool,
}

/// Watches a subtree for the element carrying a class name.
///
/// [`start`](Self::start) must be called from within a tokio runtime; the
/// mutation stream is consumed by a spawned task. Callbacks run on that task
/// (or synchronously inside `start` for a pre-existing match) and must not
/// block.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), page_capture::CaptureError> {
/// use std::sync::Arc;
/// use page_capture::{DomTree, LifecycleWatcher, MemoryDom, WatcherOptions};
///
/// let dom = Arc::new(MemoryDom::new());
/// let mask = dom.create_element("div", &["note-detail-mask"]);
/// dom.append_child(dom.root(), mask);
///
/// let mut watcher = LifecycleWatcher::new(dom.clone(), WatcherOptions::default())?;
/// watcher.start();
/// assert_eq!(watcher.current(), Some(mask));
///
/// watcher.destroy();
/// assert_eq!(watcher.current(), None);
/// # Ok(())
/// # }
/// ```
pub struct LifecycleWatcher {
    dom: Arc<dyn DomTree>,
    root: NodeId,
    class_name: String,
    callbacks: Callbacks,
    state: Arc<Mutex<WatchState>>,
    task: Option<JoinHandle<()>>,
}

impl LifecycleWatcher {
    /// Creates a watcher over the document root. Does not start observing.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidClassName`] if the class name is empty
    /// or contains whitespace.
    pub fn new(dom: Arc<dyn DomTree>, options: WatcherOptions) -> Result<Self, CaptureError> {
        let class_name = normalize_class_name(&options.class_name)?;
        let root = dom.root();
        Ok(Self {
            dom,
            root,
            state: Arc::new(Mutex::new(WatchState {
                tracker: ElementTracker::new(class_name.clone()),
                active: false,
            })),
            class_name,
            callbacks: Callbacks {
                on_add: options.on_add,
                on_remove: options.on_remove,
            },
            task: None,
        })
    }

    /// Observes `root` instead of the document root.
    #[must_use]
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = root;
        self
    }

    /// The normalized class name being watched.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns `true` between `start` and `destroy`.
    pub fn is_observing(&self) -> bool {
        self.task.is_some()
    }

    /// The tracked element, if any.
    pub fn current(&self) -> Option<NodeId> {
        self.state.lock().tracker.current()
    }

    /// Starts observing. A match already in the subtree is reported through
    /// `on_add` before this returns. Calling `start` again is a no-op.
    pub fn start(&mut self) {
        if self.task.is_some() {
            tracing::debug!(class_name = %self.class_name, "watcher already observing");
            return;
        }

        // Subscribe before scanning so nothing inserted in between is missed
        let batches = self.dom.observe(self.root);

        let initial = {
            let mut state = self.state.lock();
            state.active = true;
            state.tracker.scan(self.dom.as_ref(), self.root)
        };
        if let Some(transition) = initial {
            self.callbacks.dispatch(transition);
        }

        self.task = Some(tokio::spawn(observe_loop(
            Arc::clone(&self.dom),
            self.root,
            Arc::clone(&self.state),
            self.callbacks.clone(),
            batches,
        )));

        tracing::info!(class_name = %self.class_name, root = %self.root, "watcher started");
    }

    /// Stops observing and forgets the tracked element without firing
    /// `on_remove`. Idempotent; the watcher can be started again.
    pub fn destroy(&mut self) {
        {
            let mut state = self.state.lock();
            state.active = false;
            state.tracker.reset();
        }

        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!(class_name = %self.class_name, "watcher destroyed");
        }
    }
}

impl Drop for LifecycleWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for LifecycleWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleWatcher")
            .field("class_name", &self.class_name)
            .field("root", &self.root)
            .field("observing", &self.is_observing())
            .field("current", &self.current())
            .finish()
    }
}

async fn observe_loop(
    dom: Arc<dyn DomTree>,
    root: NodeId,
    state: Arc<Mutex<WatchState>>,
    callbacks: Callbacks,
    mut batches: mpsc::UnboundedReceiver<MutationBatch>,
) {
    while let Some(batch) = batches.recv().await {
        let transitions = {
            let mut state = state.lock();
            if !state.active {
                break;
            }
            state.tracker.apply_batch(dom.as_ref(), root, &batch)
        };

        tracing::trace!(records = batch.len(), transitions = transitions.len(), "mutation batch");
        for transition in transitions {
            callbacks.dispatch(transition);
        }
    }
}
