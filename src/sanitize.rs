//! Markup sanitization against an allow-list policy.
//!
//! The runtime treats the sanitizer as a collaborator contract: any
//! implementation must be idempotent (`sanitize(sanitize(x)) ==
//! sanitize(x)`), because the mutation watcher relies on that to
//! converge instead of looping on its own rewrites.

use std::collections::HashSet;

use tracing::warn;

use crate::markup::codec::{parse_fragment, serialize_children};
use crate::markup::{NodeKind, Tree, ROOT};

/// Collaborator contract consumed by the cell and its watcher.
pub trait Sanitizer: Send + Sync {
    /// Returns `markup` with disallowed structure removed. Must be
    /// idempotent and must never panic on hostile input.
    fn sanitize(&self, markup: &str) -> String;
}

/// Structural allow-list: which element names may persist in the
/// subtree, and which attribute names may persist on them.
#[derive(Debug, Clone)]
pub struct SanitizePolicy {
    pub elements: HashSet<String>,
    pub attributes: HashSet<String>,
}

impl SanitizePolicy {
    pub fn new(
        elements: impl IntoIterator<Item = String>,
        attributes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            elements: elements.into_iter().map(|e| e.to_ascii_lowercase()).collect(),
            attributes: attributes
                .into_iter()
                .map(|a| a.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn default_elements() -> Vec<String> {
        [
            "a", "abbr", "b", "blockquote", "br", "button", "code", "div", "em", "h1", "h2",
            "h3", "h4", "h5", "h6", "hr", "i", "img", "label", "li", "ol", "p", "pre", "s",
            "small", "span", "strong", "sub", "sup", "table", "tbody", "td", "th", "thead",
            "tr", "u", "ul",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn default_attributes() -> Vec<String> {
        ["alt", "class", "href", "id", "src", "style", "title"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self::new(Self::default_elements(), Self::default_attributes())
    }
}

/// Reference sanitizer: parses the fragment, drops every element whose
/// name is not allow-listed (subtree included), strips disallowed
/// attributes, and re-serializes canonically. Text nodes are kept.
/// Unparseable input collapses to empty output.
pub struct AllowListSanitizer {
    policy: SanitizePolicy,
}

impl AllowListSanitizer {
    pub fn new(policy: SanitizePolicy) -> Self {
        Self { policy }
    }

    fn filter(&self, tree: &mut Tree, parent: crate::markup::NodeId) {
        let Ok(children) = tree.children(parent) else {
            return;
        };
        for child in children {
            let keep = match tree.kind(child) {
                Ok(NodeKind::Text(_)) => true,
                Ok(NodeKind::Element { name, .. }) => {
                    self.policy.elements.contains(&name.to_ascii_lowercase())
                }
                Err(_) => false,
            };
            if keep {
                let _ = tree.retain_attrs(child, |key| {
                    self.policy.attributes.contains(&key.to_ascii_lowercase())
                });
                self.filter(tree, child);
            } else {
                let _ = tree.remove(child);
            }
        }
    }
}

impl Default for AllowListSanitizer {
    fn default() -> Self {
        Self::new(SanitizePolicy::default())
    }
}

impl Sanitizer for AllowListSanitizer {
    fn sanitize(&self, markup: &str) -> String {
        let mut tree = match parse_fragment(markup) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("dropping unparseable markup: {e}");
                return String::new();
            }
        };
        self.filter(&mut tree, ROOT);
        serialize_children(&tree, ROOT).unwrap_or_default()
    }
}
