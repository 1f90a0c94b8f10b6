//! Node surface the dialogs are attached to
//!
//! Dialogs never see a concrete rendering technology. They own opaque
//! [`NodeId`] handles into a [`Surface`], which only has to support building a
//! tree, detaching subtrees, ancestry checks, focus and a text selection.
//! [`NodeTree`] is the in-memory implementation used by the front ends and the
//! tests.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Opaque handle to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A text range inside one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("cannot append {child} under its own descendant {parent}")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("the root node cannot be removed")]
    RootRemoval,
}

/// Operations the dialog manager needs from a UI tree.
pub trait Surface {
    /// The node dialogs attach to when no parent is given.
    fn root(&self) -> NodeId;

    /// Create a detached node.
    fn create(&mut self, tag: &str) -> NodeId;

    /// Append `child` as the last child of `parent`, detaching it first if it
    /// already has a parent.
    fn append(&mut self, parent: NodeId, child: NodeId) -> SurfaceResult<()>;

    /// Detach `node` and discard it together with its whole subtree.
    fn remove(&mut self, node: NodeId) -> SurfaceResult<()>;

    fn exists(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn tag(&self, node: NodeId) -> Option<&str>;

    fn text(&self, node: NodeId) -> Option<&str>;

    fn set_text(&mut self, node: NodeId, text: &str) -> SurfaceResult<()>;

    fn attr(&self, node: NodeId, key: &str) -> Option<&str>;

    fn set_attr(&mut self, node: NodeId, key: &str, value: &str) -> SurfaceResult<()>;

    fn focused(&self) -> Option<NodeId>;

    fn focus(&mut self, node: NodeId) -> SurfaceResult<()>;

    fn selection(&self) -> Option<Selection>;

    fn set_selection(&mut self, selection: Option<Selection>) -> SurfaceResult<()>;

    /// Whether `node` is `ancestor` or lies somewhere below it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Whether `node` is reachable from the root.
    fn is_attached(&self, node: NodeId) -> bool {
        self.exists(node) && self.contains(self.root(), node)
    }

    /// Number of ancestors between `node` and the top of its tree.
    fn depth(&self, node: NodeId) -> usize {
        std::iter::successors(self.parent(node), |n| self.parent(*n)).count()
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    text: String,
    attrs: HashMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: String::new(),
            attrs: HashMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Arena-backed [`Surface`].
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    next_id: u32,
    root: NodeId,
    focused: Option<NodeId>,
    selection: Option<Selection>,
}

impl NodeTree {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new("body"));
        Self {
            nodes,
            next_id: 1,
            root,
            focused: None,
            selection: None,
        }
    }

    /// Total number of live nodes, attached or not, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Convenience for building page content: create `tag` under `parent`.
    pub fn add_child(&mut self, parent: NodeId, tag: &str) -> SurfaceResult<NodeId> {
        let node = self.create(tag);
        self.append(parent, node)?;
        Ok(node)
    }

    /// Concatenated text of `node` and its descendants, depth first.
    pub fn full_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(n) = self.nodes.get(&node) {
            out.push_str(&n.text);
            for child in &n.children {
                self.collect_text(*child, out);
            }
        }
    }

    fn node(&self, id: NodeId) -> SurfaceResult<&Node> {
        self.nodes.get(&id).ok_or(SurfaceError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> SurfaceResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(SurfaceError::UnknownNode(id))
    }

    fn detach(&mut self, node: NodeId) -> SurfaceResult<()> {
        if let Some(parent) = self.node(node)?.parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
            self.node_mut(node)?.parent = None;
        }
        Ok(())
    }

    fn discard(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.remove(&node) {
            for child in n.children {
                self.discard(child);
            }
        }
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for NodeTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn create(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(tag));
        id
    }

    fn append(&mut self, parent: NodeId, child: NodeId) -> SurfaceResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if self.contains(child, parent) {
            return Err(SurfaceError::Cycle { parent, child });
        }
        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove(&mut self, node: NodeId) -> SurfaceResult<()> {
        if node == self.root {
            return Err(SurfaceError::RootRemoval);
        }
        self.detach(node)?;
        self.discard(node);

        if self.focused.is_some_and(|f| !self.nodes.contains_key(&f)) {
            self.focused = None;
        }
        if self.selection.is_some_and(|s| !self.nodes.contains_key(&s.node)) {
            self.selection = None;
        }
        Ok(())
    }

    fn exists(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.tag.as_str())
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.text.as_str())
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> SurfaceResult<()> {
        self.node_mut(node)?.text = text.to_string();
        Ok(())
    }

    fn attr(&self, node: NodeId, key: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|n| n.attrs.get(key))
            .map(String::as_str)
    }

    fn set_attr(&mut self, node: NodeId, key: &str, value: &str) -> SurfaceResult<()> {
        self.node_mut(node)?
            .attrs
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    fn focus(&mut self, node: NodeId) -> SurfaceResult<()> {
        self.node(node)?;
        self.focused = Some(node);
        Ok(())
    }

    fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn set_selection(&mut self, selection: Option<Selection>) -> SurfaceResult<()> {
        if let Some(sel) = selection {
            self.node(sel.node)?;
        }
        self.selection = selection;
        Ok(())
    }
}
