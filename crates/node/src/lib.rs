//! Defines the core abstraction for a navigable, read-only document tree.
//!
//! The expression engine never owns documents. It walks them through the
//! [`Node`] trait, so any tree (an XML DOM, a JSON view, the in-memory
//! [`testing::TestTree`]) can be queried once it hands out cheap, copyable
//! node handles.
use std::fmt;
use std::hash::Hash;

pub mod testing;

/// A qualified name, consisting of an optional prefix and a local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'n> {
    pub prefix: Option<&'n str>,
    pub local_part: &'n str,
}

impl<'n> QName<'n> {
    pub fn local(local_part: &'n str) -> Self {
        Self {
            prefix: None,
            local_part,
        }
    }
}

impl fmt::Display for QName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local_part),
            None => f.write_str(self.local_part),
        }
    }
}

/// The kind of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// The contract every queryable tree implements.
///
/// Handles are `Copy` and compare by identity: two handles are equal exactly
/// when they denote the same node of the same tree.
///
/// Attribute nodes have their owning element as `parent()` but are not
/// reachable through `first_child`/`next_sibling`, and have no siblings.
pub trait Node: fmt::Debug + Clone + Copy + PartialEq + Eq + Hash {
    fn kind(&self) -> NodeKind;

    /// The qualified name of elements and attributes, or the target of a
    /// processing instruction. `None` for every other kind.
    fn name(&self) -> Option<QName<'_>>;

    /// The string value: the text of text, comment and attribute nodes, or
    /// the concatenated descendant text of documents and elements.
    fn text(&self) -> String;

    /// Attribute nodes of an element, in source order. Empty for other kinds.
    fn attributes(&self) -> Vec<Self>;

    fn first_child(&self) -> Option<Self>;

    fn next_sibling(&self) -> Option<Self>;

    fn prev_sibling(&self) -> Option<Self>;

    fn parent(&self) -> Option<Self>;

    /// Iterates over the children of this node.
    fn children(&self) -> Children<Self> {
        Children {
            next: self.first_child(),
        }
    }
}

/// Iterator returned by [`Node::children`].
#[derive(Debug, Clone)]
pub struct Children<N> {
    next: Option<N>,
}

impl<N: Node> Iterator for Children<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        let current = self.next?;
        self.next = current.next_sibling();
        Some(current)
    }
}
