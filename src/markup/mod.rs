//! Tree model for the isolated subtree.
//!
//! Nodes live in an arena addressed by [`NodeId`]; the arena hands out
//! ids instead of references so the subtree's internals never leak to
//! sandboxed code. Freed slots are reused, and every operation checks
//! that the id still points at a live node. A stale id is an error,
//! never a panic.

pub mod codec;

use thiserror::Error;

/// The fragment root. Always live, never removable, never serialized
/// itself; `serialize_children(ROOT)` is the subtree's content.
pub const ROOT: NodeId = NodeId(0);

/// Opaque handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("unknown or removed node")]
    UnknownNode,

    #[error("text nodes cannot have children")]
    NotAnElement,

    #[error("a node cannot be appended into its own subtree")]
    Cycle,

    #[error("the fragment root cannot be moved or removed")]
    RootNode,

    #[error("invalid element name `{0}`")]
    InvalidName(String),

    #[error("malformed markup: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        name: String,
        /// Attributes in source order; order is preserved through
        /// parse/serialize round trips.
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed fragment tree.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                kind: NodeKind::Element {
                    name: "#fragment".to_string(),
                    attrs: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            })],
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(node);
            NodeId(slot)
        } else {
            self.nodes.push(Some(node));
            NodeId(self.nodes.len() - 1)
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, MarkupError> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(MarkupError::UnknownNode)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, MarkupError> {
        self.nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(MarkupError::UnknownNode)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|slot| slot.is_some())
    }

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind, MarkupError> {
        self.node(id).map(|n| &n.kind)
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, MarkupError> {
        self.node(id).map(|n| n.children.clone())
    }

    /// Creates a detached element. `name` must be a plausible markup
    /// name: leading ASCII letter, then letters, digits or dashes.
    pub fn create_element(&mut self, name: &str) -> Result<NodeId, MarkupError> {
        if !is_valid_element_name(name) {
            return Err(MarkupError::InvalidName(name.to_string()));
        }
        Ok(self.alloc(Node {
            kind: NodeKind::Element {
                name: name.to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node {
            kind: NodeKind::Text(text.to_string()),
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) -> Result<(), MarkupError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attrs, .. } => {
                if let Some(slot) = attrs.iter_mut().find(|(k, _)| k == key) {
                    slot.1 = value.to_string();
                } else {
                    attrs.push((key.to_string(), value.to_string()));
                }
                Ok(())
            }
            NodeKind::Text(_) => Err(MarkupError::NotAnElement),
        }
    }

    /// Keeps only the attributes for which `keep` returns true.
    pub fn retain_attrs(
        &mut self,
        id: NodeId,
        keep: impl Fn(&str) -> bool,
    ) -> Result<(), MarkupError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attrs, .. } => {
                attrs.retain(|(k, _)| keep(k));
                Ok(())
            }
            NodeKind::Text(_) => Err(MarkupError::NotAnElement),
        }
    }

    /// Appends `child` as the last child of `parent`. A child attached
    /// elsewhere is moved, matching host-tree append semantics.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), MarkupError> {
        if !matches!(self.node(parent)?.kind, NodeKind::Element { .. }) {
            return Err(MarkupError::NotAnElement);
        }
        self.node(child)?;
        if child == ROOT {
            return Err(MarkupError::RootNode);
        }
        // Walk up from the parent: appending an ancestor would cycle.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(MarkupError::Cycle);
            }
            cursor = self.node(id)?.parent;
        }
        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> Result<(), MarkupError> {
        if let Some(parent) = self.node(id)?.parent {
            let siblings = &mut self.node_mut(parent)?.children;
            siblings.retain(|&c| c != id);
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    /// Removes a node and its entire subtree, freeing the slots.
    pub fn remove(&mut self, id: NodeId) -> Result<(), MarkupError> {
        if id == ROOT {
            return Err(MarkupError::RootNode);
        }
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(|slot| slot.take()) {
                stack.extend(node.children);
                self.free.push(next.0);
            }
        }
        Ok(())
    }

    pub fn clear_children(&mut self, parent: NodeId) -> Result<(), MarkupError> {
        for child in self.children(parent)? {
            self.remove(child)?;
        }
        Ok(())
    }

    /// Depth-first search below `from` for the first element matching
    /// `selector`: either a tag name or an `#id` form.
    pub fn query(&self, from: NodeId, selector: &str) -> Result<Option<NodeId>, MarkupError> {
        let want_id = selector.strip_prefix('#');
        let mut stack: Vec<NodeId> = self.node(from)?.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if let NodeKind::Element { name, attrs } = &node.kind {
                let hit = match want_id {
                    Some(wanted) => attrs.iter().any(|(k, v)| k == "id" && v == wanted),
                    None => name.eq_ignore_ascii_case(selector),
                };
                if hit {
                    return Ok(Some(id));
                }
            }
            stack.extend(node.children.iter().rev());
        }
        Ok(None)
    }
}

pub fn is_valid_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}
