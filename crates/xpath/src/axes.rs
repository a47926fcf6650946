//! Axis traversal, node tests and document order over any [`Node`] tree.
//!
//! Forward axes return nodes in document order and reverse axes nearest
//! first, so a positional predicate on a step counts along the axis.

use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};
use quarry_node::{Node, NodeKind};

use crate::ast::{Axis, KindTest, NameTest, NodeTest};

/// All nodes reachable from `node` along `axis`.
pub fn collect<N: Node>(node: N, axis: Axis) -> Vec<N> {
    let mut out = Vec::new();
    match axis {
        Axis::Child => out.extend(node.children()),
        Axis::Descendant => push_descendants(node, &mut out),
        Axis::DescendantOrSelf => {
            out.push(node);
            push_descendants(node, &mut out);
        }
        Axis::Parent => out.extend(node.parent()),
        Axis::Ancestor => push_ancestors(node, &mut out),
        Axis::AncestorOrSelf => {
            out.push(node);
            push_ancestors(node, &mut out);
        }
        Axis::FollowingSibling => {
            let mut next = node.next_sibling();
            while let Some(sibling) = next {
                out.push(sibling);
                next = sibling.next_sibling();
            }
        }
        Axis::PrecedingSibling => {
            let mut prev = node.prev_sibling();
            while let Some(sibling) = prev {
                out.push(sibling);
                prev = sibling.prev_sibling();
            }
        }
        Axis::Following => push_following(node, &mut out),
        Axis::Preceding => push_preceding(node, &mut out),
        Axis::Attribute => {
            if node.kind() == NodeKind::Element {
                out.extend(node.attributes());
            }
        }
        Axis::SelfAxis => out.push(node),
    }
    out
}

/// Pre-order walk of everything below `node`.
fn push_descendants<N: Node>(node: N, out: &mut Vec<N>) {
    let mut stack: Vec<N> = node.children().collect();
    stack.reverse();
    while let Some(current) = stack.pop() {
        out.push(current);
        let start = stack.len();
        stack.extend(current.children());
        stack[start..].reverse();
    }
}

fn push_ancestors<N: Node>(node: N, out: &mut Vec<N>) {
    let mut parent = node.parent();
    while let Some(p) = parent {
        out.push(p);
        parent = p.parent();
    }
}

fn push_following<N: Node>(node: N, out: &mut Vec<N>) {
    let mut current = Some(node);
    if node.kind() == NodeKind::Attribute {
        // Everything inside the owning element follows its attributes.
        current = node.parent();
        if let Some(owner) = current {
            push_descendants(owner, out);
        }
    }
    while let Some(n) = current {
        let mut next = n.next_sibling();
        while let Some(sibling) = next {
            out.push(sibling);
            push_descendants(sibling, out);
            next = sibling.next_sibling();
        }
        current = n.parent();
    }
}

fn push_preceding<N: Node>(node: N, out: &mut Vec<N>) {
    let mut current = if node.kind() == NodeKind::Attribute {
        node.parent()
    } else {
        Some(node)
    };
    while let Some(n) = current {
        let mut prev = n.prev_sibling();
        while let Some(sibling) = prev {
            let start = out.len();
            out.push(sibling);
            push_descendants(sibling, out);
            out[start..].reverse();
            prev = sibling.prev_sibling();
        }
        current = n.parent();
    }
}

/// Applies a node test to a node reached along `axis`.
pub fn matches<N: Node>(node: &N, test: &NodeTest, axis: Axis) -> bool {
    match test {
        NodeTest::Kind(kind) => matches_kind(node, kind),
        NodeTest::Name(name_test) => {
            if node.kind() != axis.principal_kind() {
                return false;
            }
            let Some(name) = node.name() else {
                return false;
            };
            match name_test {
                NameTest::Any => true,
                NameTest::Name(qname) => qname.matches(&name),
                NameTest::AnyPrefix(local) => name.local_part == local,
                NameTest::AnyLocal(prefix) => name.prefix == Some(prefix.as_str()),
            }
        }
    }
}

/// Applies a kind test on its own, as `instance of` does.
pub fn matches_kind<N: Node>(node: &N, test: &KindTest) -> bool {
    let kind = node.kind();
    match test {
        KindTest::AnyNode => true,
        KindTest::Text => kind == NodeKind::Text,
        KindTest::Comment => kind == NodeKind::Comment,
        KindTest::Document => kind == NodeKind::Document,
        KindTest::ProcessingInstruction(target) => {
            kind == NodeKind::ProcessingInstruction
                && target
                    .as_deref()
                    .is_none_or(|t| node.name().is_some_and(|n| n.local_part == t))
        }
        KindTest::Element(name) => kind == NodeKind::Element && named(node, name.as_ref()),
        KindTest::Attribute(name) => kind == NodeKind::Attribute && named(node, name.as_ref()),
    }
}

fn named<N: Node>(node: &N, name: Option<&crate::ast::QName>) -> bool {
    match name {
        None => true,
        Some(q) => node.name().is_some_and(|n| q.matches(&n)),
    }
}

/// The chain from the root down to `node`, inclusive.
fn path_from_root<N: Node>(node: N) -> Vec<N> {
    let mut path = vec![node];
    push_ancestors(node, &mut path);
    path.reverse();
    path
}

/// Orders two nodes of the same tree by document order. Attributes come
/// after their element and before its children. Nodes of different trees
/// compare equal; use [`sort_document_order`] to order mixed node sets.
pub fn compare_document_order<N: Node>(a: &N, b: &N) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let path_a = path_from_root(*a);
    let path_b = path_from_root(*b);
    let shared = path_a
        .iter()
        .zip(&path_b)
        .take_while(|(x, y)| x == y)
        .count();
    if shared == 0 {
        return Ordering::Equal;
    }
    let (x, y) = match (path_a.get(shared), path_b.get(shared)) {
        (None, _) => return Ordering::Less,
        (_, None) => return Ordering::Greater,
        (Some(x), Some(y)) => (*x, *y),
    };
    match (x.kind() == NodeKind::Attribute, y.kind() == NodeKind::Attribute) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => {
            let owner = path_a[shared - 1];
            let attributes = owner.attributes();
            let index = |n: N| attributes.iter().position(|&at| at == n);
            index(x).cmp(&index(y))
        }
        (false, false) => {
            let mut next = x.next_sibling();
            while let Some(sibling) = next {
                if sibling == y {
                    return Ordering::Less;
                }
                next = sibling.next_sibling();
            }
            Ordering::Greater
        }
    }
}

/// Sorts into document order and drops duplicates. Nodes from several
/// trees are grouped per tree, trees in the order they first appear.
pub fn sort_document_order<N: Node>(nodes: &mut Vec<N>) {
    let unique: IndexSet<N> = nodes.drain(..).collect();
    let mut trees: IndexMap<N, Vec<N>> = IndexMap::new();
    for node in unique {
        let root = path_from_root(node)[0];
        trees.entry(root).or_default().push(node);
    }
    for (_, mut group) in trees {
        group.sort_by(compare_document_order);
        nodes.extend(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::QName;
    use quarry_node::testing::{TestNode, sample_tree};

    fn ids(nodes: &[TestNode]) -> Vec<usize> {
        nodes.iter().map(|n| n.id).collect()
    }

    fn elements(nodes: Vec<TestNode>) -> Vec<TestNode> {
        let any = NodeTest::Name(NameTest::Any);
        nodes
            .into_iter()
            .filter(|n| matches(n, &any, Axis::Child))
            .collect()
    }

    #[test]
    fn test_child_and_descendant() {
        let tree = sample_tree();
        assert_eq!(ids(&collect(tree.node(1), Axis::Child)), vec![2, 9, 10, 16, 17]);
        let all = elements(collect(tree.document(), Axis::Descendant));
        assert_eq!(ids(&all), vec![1, 2, 5, 7, 10, 12, 14, 17, 18]);
        assert_eq!(
            ids(&collect(tree.node(2), Axis::DescendantOrSelf)),
            vec![2, 5, 6, 7, 8]
        );
    }

    #[test]
    fn test_reverse_axes_are_nearest_first() {
        let tree = sample_tree();
        assert_eq!(ids(&collect(tree.node(6), Axis::Ancestor)), vec![5, 2, 1, 0]);
        assert_eq!(
            ids(&collect(tree.node(6), Axis::AncestorOrSelf)),
            vec![6, 5, 2, 1, 0]
        );
        assert_eq!(
            ids(&collect(tree.node(16), Axis::PrecedingSibling)),
            vec![10, 9, 2]
        );
        assert_eq!(
            ids(&collect(tree.node(12), Axis::Preceding)),
            vec![9, 8, 7, 6, 5, 2]
        );
    }

    #[test]
    fn test_following() {
        let tree = sample_tree();
        assert_eq!(
            ids(&collect(tree.node(5), Axis::Following)),
            vec![7, 8, 9, 10, 12, 13, 14, 15, 16, 17, 18, 19]
        );
        assert_eq!(
            ids(&collect(tree.node(3), Axis::Following)),
            vec![5, 6, 7, 8, 9, 10, 12, 13, 14, 15, 16, 17, 18, 19]
        );
        assert_eq!(ids(&collect(tree.node(9), Axis::FollowingSibling)), vec![10, 16, 17]);
    }

    #[test]
    fn test_attribute_axis() {
        let tree = sample_tree();
        assert_eq!(ids(&collect(tree.node(2), Axis::Attribute)), vec![3, 4]);
        assert!(collect(tree.node(5), Axis::Attribute).is_empty());
        assert_eq!(ids(&collect(tree.node(3), Axis::Parent)), vec![2]);
        assert!(collect(tree.node(3), Axis::FollowingSibling).is_empty());
    }

    #[test]
    fn test_name_tests_use_principal_kind() {
        let tree = sample_tree();
        let id = NodeTest::Name(NameTest::Name(QName::local("id")));
        assert!(matches(&tree.node(3), &id, Axis::Attribute));
        assert!(!matches(&tree.node(3), &id, Axis::Child));

        let pi = NodeTest::Kind(KindTest::ProcessingInstruction(Some("sort".into())));
        assert!(matches(&tree.node(16), &pi, Axis::Child));
        let other_pi = NodeTest::Kind(KindTest::ProcessingInstruction(Some("x".into())));
        assert!(!matches(&tree.node(16), &other_pi, Axis::Child));

        let title = NodeTest::Kind(KindTest::Element(Some(QName::local("title"))));
        assert!(matches(&tree.node(5), &title, Axis::Descendant));
        assert!(!matches(&tree.node(7), &title, Axis::Descendant));
    }

    #[test]
    fn test_document_order() {
        let tree = sample_tree();
        let n = |id| tree.node(id);
        assert_eq!(compare_document_order(&n(3), &n(5)), Ordering::Less);
        assert_eq!(compare_document_order(&n(4), &n(3)), Ordering::Greater);
        assert_eq!(compare_document_order(&n(2), &n(6)), Ordering::Less);
        assert_eq!(compare_document_order(&n(18), &n(13)), Ordering::Greater);
        assert_eq!(compare_document_order(&n(9), &n(9)), Ordering::Equal);

        let mut nodes = vec![n(17), n(3), n(2), n(17), n(9)];
        sort_document_order(&mut nodes);
        assert_eq!(ids(&nodes), vec![2, 3, 9, 17]);
    }

    #[test]
    fn test_sort_keeps_trees_apart() {
        let first = sample_tree();
        let second = sample_tree();
        let mut nodes = vec![
            second.node(5),
            first.node(10),
            second.node(2),
            first.node(2),
            first.node(10),
            second.node(5),
        ];
        sort_document_order(&mut nodes);
        assert_eq!(
            nodes,
            vec![second.node(2), second.node(5), first.node(2), first.node(10)]
        );
    }
}
