//! The isolated subtree.
//!
//! A [`View`] is a cloneable handle over the cell's private render
//! tree. The tree itself is never reachable from outside: the host
//! sees serialized snapshots, scripts see `NodeId` handles through the
//! bounded `dom` capability, and nothing else. Every structural write
//! pushes a [`Mutation`] notification onto an internal channel; the
//! mutation watcher consumes those in coalesced batches. Notifications
//! are emitted only for attached structure: creating a detached node
//! is not observable until it is appended, matching how change
//! observation works on a real render tree.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;

use crate::markup::codec;
use crate::markup::{MarkupError, NodeId, Tree, ROOT};

/// One structural change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The whole content was replaced (activation or resanitization).
    ContentReplaced,
    /// A node was appended under `parent`.
    ChildAppended { parent: NodeId },
}

struct ViewShared {
    tree: Mutex<Tree>,
    mutations: mpsc::UnboundedSender<Mutation>,
}

/// Cloneable handle to the isolated subtree.
#[derive(Clone)]
pub struct View {
    inner: Arc<ViewShared>,
}

/// Non-owning handle used by the mutation watcher, so the watcher
/// itself does not keep the subtree alive.
pub(crate) struct WeakView {
    inner: Weak<ViewShared>,
}

impl WeakView {
    pub(crate) fn upgrade(&self) -> Option<View> {
        self.inner.upgrade().map(|inner| View { inner })
    }
}

impl View {
    /// Creates the subtree and the receiving end of its mutation
    /// channel. Called once per cell, at construction.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Mutation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let view = Self {
            inner: Arc::new(ViewShared {
                tree: Mutex::new(Tree::new()),
                mutations: tx,
            }),
        };
        (view, rx)
    }

    pub(crate) fn downgrade(&self) -> WeakView {
        WeakView {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        // A poisoned lock means a panic mid-mutation; the tree is
        // still structurally sound, so recover rather than cascade.
        self.inner
            .tree
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, mutation: Mutation) {
        // The watcher may already be gone during teardown.
        let _ = self.inner.mutations.send(mutation);
    }

    /// Root of the subtree. This is the node the component exposes to
    /// scripts as `view`.
    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn create_element(&self, name: &str) -> Result<NodeId, MarkupError> {
        self.tree().create_element(name)
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.tree().create_text(text)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), MarkupError> {
        self.tree().append_child(parent, child)?;
        self.notify(Mutation::ChildAppended { parent });
        Ok(())
    }

    pub fn query(&self, from: NodeId, selector: &str) -> Result<Option<NodeId>, MarkupError> {
        self.tree().query(from, selector)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.tree().contains(id)
    }

    /// Replaces the subtree's content with parsed `markup`. The write
    /// is synchronous; the notification it produces is delivered
    /// afterwards, never before.
    pub fn set_content(&self, markup: &str) -> Result<(), MarkupError> {
        {
            let mut tree = self.tree();
            codec::parse_into(&mut tree, ROOT, markup)?;
        }
        self.notify(Mutation::ContentReplaced);
        Ok(())
    }

    /// Serialized snapshot of the current content.
    pub fn content(&self) -> String {
        let tree = self.tree();
        codec::serialize_children(&tree, ROOT).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_content_and_snapshot() {
        let (view, _rx) = View::new();
        view.set_content("<div><p>hi</p></div>").unwrap();
        assert_eq!(view.content(), "<div><p>hi</p></div>");
    }

    #[tokio::test]
    async fn test_mutations_emitted_in_order() {
        let (view, mut rx) = View::new();
        view.set_content("<div/>").unwrap();
        let div = view.query(ROOT, "div").unwrap().unwrap();
        let span = view.create_element("span").unwrap();
        view.append_child(div, span).unwrap();

        assert_eq!(rx.try_recv().unwrap(), Mutation::ContentReplaced);
        assert_eq!(
            rx.try_recv().unwrap(),
            Mutation::ChildAppended { parent: div }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_detached_create_is_not_observable() {
        let (view, mut rx) = View::new();
        let _orphan = view.create_element("span").unwrap();
        let _text = view.create_text("x");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_content_replacement_drops_old_ids() {
        let (view, _rx) = View::new();
        view.set_content("<div/>").unwrap();
        let div = view.query(ROOT, "div").unwrap().unwrap();
        view.set_content("<p/>").unwrap();
        assert!(!view.contains(div));
    }
}
