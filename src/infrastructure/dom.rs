//! Document tree access and mutation
//!
//! Wraps `dom_query` behind a narrow surface so the engine is portable
//! across document-model implementations and never handles tree internals
//! directly. Nodes are exposed as [`NodeHandle`] values: weak arena ids,
//! never owning references. The document owns every node, and handle
//! validity against the live tree is checked with [`PageDocument::is_attached`].
//!
//! Query expressions are CSS selector groups. A malformed expression
//! evaluates to an empty result and is logged, never raised to the caller.

use dom_query::{Document, Matcher, NodeId, Selection};
use tracing::warn;

/// Weak reference to a node in a [`PageDocument`].
///
/// Valid for the lifetime of the document it came from; detaching the node
/// keeps the handle usable for lookups (it simply stops being attached).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(NodeId);

/// A parsed HTML document with query and splice primitives.
pub struct PageDocument {
    doc: Document,
}

impl PageDocument {
    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Document::from(html),
        }
    }

    /// Handle of the tree root (the document node itself).
    pub fn root(&self) -> NodeHandle {
        NodeHandle(self.doc.tree.root().id)
    }

    fn compile(expr: &str) -> Option<Matcher> {
        match Matcher::new(expr) {
            Ok(matcher) => Some(matcher),
            Err(e) => {
                warn!(selector = expr, error = ?e, "malformed query expression, evaluating to empty");
                None
            }
        }
    }

    /// Ordered matches for `expr` among the descendants of `scope`.
    pub fn query_all(&self, scope: NodeHandle, expr: &str) -> Vec<NodeHandle> {
        let Some(matcher) = Self::compile(expr) else {
            return Vec::new();
        };
        let Some(node) = self.doc.tree.get(&scope.0) else {
            return Vec::new();
        };
        Selection::from(node)
            .select_matcher(&matcher)
            .nodes()
            .iter()
            .map(|n| NodeHandle(n.id))
            .collect()
    }

    /// First ordered match for `expr` under `scope`, if any.
    pub fn query_first(&self, scope: NodeHandle, expr: &str) -> Option<NodeHandle> {
        self.query_all(scope, expr).into_iter().next()
    }

    /// Whether walking parent links from `handle` reaches the tree root.
    /// Detached subtrees (and nodes the page's own scripts removed) fail
    /// this check.
    pub fn is_attached(&self, handle: NodeHandle) -> bool {
        let root = self.doc.tree.root().id;
        if handle.0 == root {
            return true;
        }
        let mut current = self.doc.tree.get(&handle.0);
        while let Some(node) = current {
            if node.id == root {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Create a new, detached element in this document's arena.
    pub fn create_element(&self, name: &str) -> NodeHandle {
        NodeHandle(self.doc.tree.new_element(name).id)
    }

    /// Replace the children of `handle` with the parse of `html`.
    pub fn set_inner_html(&self, handle: NodeHandle, html: &str) {
        if let Some(node) = self.doc.tree.get(&handle.0) {
            Selection::from(node).set_html(html);
        }
    }

    pub fn attr(&self, handle: NodeHandle, name: &str) -> Option<String> {
        self.doc
            .tree
            .get(&handle.0)
            .and_then(|node| node.attr(name))
            .map(|value| value.to_string())
    }

    pub fn set_attr(&self, handle: NodeHandle, name: &str, value: &str) {
        if let Some(node) = self.doc.tree.get(&handle.0) {
            node.set_attr(name, value);
        }
    }

    pub fn remove_attr(&self, handle: NodeHandle, name: &str) {
        if let Some(node) = self.doc.tree.get(&handle.0) {
            node.remove_attr(name);
        }
    }

    /// Concatenated text content of the subtree rooted at `handle`.
    pub fn text(&self, handle: NodeHandle) -> String {
        self.doc
            .tree
            .get(&handle.0)
            .map(|node| node.text().to_string())
            .unwrap_or_default()
    }

    /// Lowercased element name, or `None` for non-element nodes.
    pub fn node_name(&self, handle: NodeHandle) -> Option<String> {
        let node = self.doc.tree.get(&handle.0)?;
        if !node.is_element() {
            return None;
        }
        node.node_name().map(|name| name.to_lowercase())
    }

    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.doc
            .tree
            .get(&handle.0)
            .and_then(|node| node.parent())
            .map(|node| NodeHandle(node.id))
    }

    pub fn next_sibling(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.doc
            .tree
            .get(&handle.0)
            .and_then(|node| node.next_sibling())
            .map(|node| NodeHandle(node.id))
    }

    pub fn first_child(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.doc
            .tree
            .get(&handle.0)
            .and_then(|node| node.first_child())
            .map(|node| NodeHandle(node.id))
    }

    /// Direct element children of `handle`, in document order.
    pub fn child_elements(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut children = Vec::new();
        let mut current = self.first_child(handle);
        while let Some(child) = current {
            if self.node_name(child).is_some() {
                children.push(child);
            }
            current = self.next_sibling(child);
        }
        children
    }

    /// Insert `new` into the tree immediately before `anchor`.
    pub fn insert_before(&self, new: NodeHandle, anchor: NodeHandle) {
        let (Some(anchor_node), Some(new_node)) =
            (self.doc.tree.get(&anchor.0), self.doc.tree.get(&new.0))
        else {
            return;
        };
        anchor_node.insert_before(&new_node);
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&self, parent: NodeHandle, child: NodeHandle) {
        let (Some(parent_node), Some(child_node)) =
            (self.doc.tree.get(&parent.0), self.doc.tree.get(&child.0))
        else {
            return;
        };
        parent_node.append_child(&child_node);
    }

    /// Unlink `handle` (and its subtree) from its parent. The handle stays
    /// valid for lookups but is no longer attached.
    pub fn detach(&self, handle: NodeHandle) {
        if let Some(node) = self.doc.tree.get(&handle.0) {
            node.remove_from_parent();
        }
    }

    /// Detach every match for `expr` under `scope`.
    pub fn remove_all(&self, scope: NodeHandle, expr: &str) -> usize {
        let matches = self.query_all(scope, expr);
        let count = matches.len();
        for handle in matches {
            self.detach(handle);
        }
        count
    }

    /// Serialized HTML of the whole document.
    pub fn html(&self) -> String {
        self.doc.html().to_string()
    }
}

impl std::fmt::Debug for PageDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageDocument").finish_non_exhaustive()
    }
}
