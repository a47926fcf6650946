//! An in-memory tree for tests, publicly available so downstream crates can
//! drive the engine without a real document.

use std::hash::{Hash, Hasher};

use crate::{Node, NodeKind, QName};

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    prefix: Option<String>,
    local: Option<String>,
    value: String,
    parent: Option<usize>,
    children: Vec<usize>,
    attributes: Vec<usize>,
}

/// A mutable arena of nodes. Node `0` is always the document node.
#[derive(Debug, Clone)]
pub struct TestTree {
    nodes: Vec<NodeData>,
}

/// A handle into a [`TestTree`].
#[derive(Debug, Clone, Copy)]
pub struct TestNode<'t> {
    pub id: usize,
    tree: &'t TestTree,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                prefix: None,
                local: None,
                value: String::new(),
                parent: None,
                children: Vec::new(),
                attributes: Vec::new(),
            }],
        }
    }

    pub fn document(&self) -> TestNode<'_> {
        self.node(0)
    }

    pub fn node(&self, id: usize) -> TestNode<'_> {
        TestNode { id, tree: self }
    }

    /// Appends an element. `name` may carry a prefix (`p:item`).
    pub fn element(&mut self, parent: usize, name: &str) -> usize {
        let id = self.push(NodeKind::Element, Some(name), String::new(), parent);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn attribute(&mut self, owner: usize, name: &str, value: &str) -> usize {
        let id = self.push(NodeKind::Attribute, Some(name), value.to_string(), owner);
        self.nodes[owner].attributes.push(id);
        id
    }

    pub fn text(&mut self, parent: usize, value: &str) -> usize {
        let id = self.push(NodeKind::Text, None, value.to_string(), parent);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn comment(&mut self, parent: usize, value: &str) -> usize {
        let id = self.push(NodeKind::Comment, None, value.to_string(), parent);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn processing_instruction(&mut self, parent: usize, target: &str, value: &str) -> usize {
        let id = self.push(
            NodeKind::ProcessingInstruction,
            Some(target),
            value.to_string(),
            parent,
        );
        self.nodes[parent].children.push(id);
        id
    }

    /// Appends an element holding a single text child.
    pub fn leaf(&mut self, parent: usize, name: &str, text: &str) -> usize {
        let id = self.element(parent, name);
        self.text(id, text);
        id
    }

    /// The first element with the given local name, in document order.
    pub fn find(&self, local: &str) -> Option<TestNode<'_>> {
        (0..self.nodes.len())
            .map(|id| self.node(id))
            .filter(|n| n.kind() == NodeKind::Element)
            .find(|n| self.nodes[n.id].local.as_deref() == Some(local))
    }

    fn push(&mut self, kind: NodeKind, name: Option<&str>, value: String, parent: usize) -> usize {
        let (prefix, local) = match name.map(|n| n.split_once(':').unwrap_or(("", n))) {
            Some(("", local)) => (None, Some(local.to_string())),
            Some((prefix, local)) => (Some(prefix.to_string()), Some(local.to_string())),
            None => (None, None),
        };
        self.nodes.push(NodeData {
            kind,
            prefix,
            local,
            value,
            parent: Some(parent),
            children: Vec::new(),
            attributes: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn sibling(&self, id: usize, offset: isize) -> Option<usize> {
        let data = &self.nodes[id];
        if data.kind == NodeKind::Attribute {
            return None;
        }
        let siblings = &self.nodes[data.parent?].children;
        let index = siblings.iter().position(|&c| c == id)?;
        let target = index.checked_add_signed(offset)?;
        siblings.get(target).copied()
    }

    fn string_value(&self, id: usize) -> String {
        let data = &self.nodes[id];
        match data.kind {
            NodeKind::Document | NodeKind::Element => {
                let mut out = String::new();
                self.collect_text(id, &mut out);
                out
            }
            _ => data.value.clone(),
        }
    }

    fn collect_text(&self, id: usize, out: &mut String) {
        for &child in &self.nodes[id].children {
            match self.nodes[child].kind {
                NodeKind::Text => out.push_str(&self.nodes[child].value),
                NodeKind::Element => self.collect_text(child, out),
                _ => {}
            }
        }
    }
}

impl PartialEq for TestNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.tree, other.tree)
    }
}

impl Eq for TestNode<'_> {}

impl Hash for TestNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Node for TestNode<'_> {
    fn kind(&self) -> NodeKind {
        self.tree.nodes[self.id].kind
    }

    fn name(&self) -> Option<QName<'_>> {
        let data = &self.tree.nodes[self.id];
        data.local.as_deref().map(|local_part| QName {
            prefix: data.prefix.as_deref(),
            local_part,
        })
    }

    fn text(&self) -> String {
        self.tree.string_value(self.id)
    }

    fn attributes(&self) -> Vec<Self> {
        self.tree.nodes[self.id]
            .attributes
            .iter()
            .map(|&id| self.tree.node(id))
            .collect()
    }

    fn first_child(&self) -> Option<Self> {
        let first = *self.tree.nodes[self.id].children.first()?;
        Some(self.tree.node(first))
    }

    fn next_sibling(&self) -> Option<Self> {
        self.tree.sibling(self.id, 1).map(|id| self.tree.node(id))
    }

    fn prev_sibling(&self) -> Option<Self> {
        self.tree.sibling(self.id, -1).map(|id| self.tree.node(id))
    }

    fn parent(&self) -> Option<Self> {
        self.tree.nodes[self.id].parent.map(|id| self.tree.node(id))
    }
}

/// Builds a small library catalogue:
///
/// ```text
/// <library>                                  id 1
///   <book id="b1" lang="en">                 id 2, attrs 3 4
///     <title>Dune</title>                    id 5, text 6
///     <price>9.5</price>                     id 7, text 8
///   </book>
///   <!-- shelf two -->                       id 9
///   <book id="b2">                           id 10, attr 11
///     <title>Emma</title>                    id 12, text 13
///     <price>4</price>                       id 14, text 15
///   </book>
///   <?sort by-title?>                        id 16
///   <magazine>                               id 17
///     <title>Wired</title>                   id 18, text 19
///   </magazine>
/// </library>
/// ```
pub fn sample_tree() -> TestTree {
    let mut tree = TestTree::new();
    let library = tree.element(0, "library");

    let dune = tree.element(library, "book");
    tree.attribute(dune, "id", "b1");
    tree.attribute(dune, "lang", "en");
    tree.leaf(dune, "title", "Dune");
    tree.leaf(dune, "price", "9.5");

    tree.comment(library, " shelf two ");

    let emma = tree.element(library, "book");
    tree.attribute(emma, "id", "b2");
    tree.leaf(emma, "title", "Emma");
    tree.leaf(emma, "price", "4");

    tree.processing_instruction(library, "sort", "by-title");

    let magazine = tree.element(library, "magazine");
    tree.leaf(magazine, "title", "Wired");

    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_tree_shape() {
        let tree = sample_tree();
        let library = tree.node(1);
        let kinds: Vec<NodeKind> = library.children().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Element,
                NodeKind::Comment,
                NodeKind::Element,
                NodeKind::ProcessingInstruction,
                NodeKind::Element
            ]
        );
        assert_eq!(tree.node(16).name().map(|n| n.local_part), Some("sort"));
    }

    #[test]
    fn test_sibling_links() {
        let tree = sample_tree();
        let comment = tree.node(9);
        assert_eq!(comment.prev_sibling().map(|n| n.id), Some(2));
        assert_eq!(comment.next_sibling().map(|n| n.id), Some(10));
        assert_eq!(tree.node(2).prev_sibling(), None);
        assert_eq!(tree.node(17).next_sibling(), None);
    }

    #[test]
    fn test_attributes_have_owner_but_no_siblings() {
        let tree = sample_tree();
        let book = tree.node(2);
        let attrs = book.attributes();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].parent(), Some(book));
        assert_eq!(attrs[0].next_sibling(), None);
        assert_eq!(attrs[1].text(), "en");
    }

    #[test]
    fn test_string_value_concatenates_descendant_text() {
        let tree = sample_tree();
        assert_eq!(tree.node(2).text(), "Dune9.5");
        assert_eq!(tree.document().text(), "Dune9.5Emma4Wired");
        assert_eq!(tree.node(9).text(), " shelf two ");
    }

    #[test]
    fn test_prefixed_names() {
        let mut tree = TestTree::new();
        let el = tree.element(0, "fo:block");
        let node = tree.node(el);
        let name = node.name().expect("element has a name");
        assert_eq!(name.prefix, Some("fo"));
        assert_eq!(name.local_part, "block");
        assert_eq!(name.to_string(), "fo:block");
    }

    #[test]
    fn test_find_by_local_name() {
        let tree = sample_tree();
        assert_eq!(tree.find("magazine").map(|n| n.id), Some(17));
        assert!(tree.find("missing").is_none());
    }
}
