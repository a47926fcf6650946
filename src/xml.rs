//! [`Node`] implementation over a `roxmltree` document.

use std::hash::{Hash, Hasher};

use quarry_node::{Node, NodeKind, QName};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A parsed XML document that can hand out [`XmlNode`] handles.
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(Self { doc })
    }

    /// The document node.
    pub fn root(&self) -> XmlNode<'_, 'input> {
        XmlNode::Tree(self.doc.root())
    }
}

/// A node of an [`XmlDocument`].
///
/// roxmltree keeps attributes as data on their element, so an attribute is
/// addressed by its owner and its index there.
#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a, 'input> {
    Tree(roxmltree::Node<'a, 'input>),
    Attribute {
        owner: roxmltree::Node<'a, 'input>,
        index: usize,
    },
}

impl<'a, 'input> XmlNode<'a, 'input> {
    fn attribute(&self) -> Option<roxmltree::Attribute<'a, 'input>> {
        match self {
            XmlNode::Tree(_) => None,
            XmlNode::Attribute { owner, index } => owner.attributes().nth(*index),
        }
    }

    fn tree(&self) -> Option<roxmltree::Node<'a, 'input>> {
        match self {
            XmlNode::Tree(node) => Some(*node),
            XmlNode::Attribute { .. } => None,
        }
    }
}

impl PartialEq for XmlNode<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (XmlNode::Tree(a), XmlNode::Tree(b)) => a == b,
            (
                XmlNode::Attribute { owner: o1, index: i1 },
                XmlNode::Attribute { owner: o2, index: i2 },
            ) => o1 == o2 && i1 == i2,
            _ => false,
        }
    }
}

impl Eq for XmlNode<'_, '_> {}

impl Hash for XmlNode<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            XmlNode::Tree(node) => {
                0u8.hash(state);
                node.id().hash(state);
            }
            XmlNode::Attribute { owner, index } => {
                1u8.hash(state);
                owner.id().hash(state);
                index.hash(state);
            }
        }
    }
}

impl Node for XmlNode<'_, '_> {
    fn kind(&self) -> NodeKind {
        let node = match self {
            XmlNode::Attribute { .. } => return NodeKind::Attribute,
            XmlNode::Tree(node) => node,
        };
        match node.node_type() {
            roxmltree::NodeType::Root => NodeKind::Document,
            roxmltree::NodeType::Element => NodeKind::Element,
            roxmltree::NodeType::PI => NodeKind::ProcessingInstruction,
            roxmltree::NodeType::Comment => NodeKind::Comment,
            roxmltree::NodeType::Text => NodeKind::Text,
        }
    }

    fn name(&self) -> Option<QName<'_>> {
        match self {
            XmlNode::Tree(node) if node.is_element() => {
                let tag = node.tag_name();
                let prefix = tag.namespace().and_then(|uri| node.lookup_prefix(uri));
                Some(QName {
                    prefix,
                    local_part: tag.name(),
                })
            }
            XmlNode::Tree(node) => node.pi().map(|pi| QName::local(pi.target)),
            XmlNode::Attribute { owner, .. } => self.attribute().map(|attr| {
                let prefix = match attr.namespace() {
                    Some(XML_NAMESPACE) => Some("xml"),
                    Some(uri) => owner.lookup_prefix(uri),
                    None => None,
                };
                QName {
                    prefix,
                    local_part: attr.name(),
                }
            }),
        }
    }

    fn text(&self) -> String {
        if let Some(attr) = self.attribute() {
            return attr.value().to_string();
        }
        let Some(node) = self.tree() else {
            return String::new();
        };
        match node.node_type() {
            roxmltree::NodeType::Root | roxmltree::NodeType::Element => node
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect(),
            roxmltree::NodeType::PI => node
                .pi()
                .and_then(|pi| pi.value)
                .unwrap_or_default()
                .to_string(),
            roxmltree::NodeType::Comment | roxmltree::NodeType::Text => {
                node.text().unwrap_or_default().to_string()
            }
        }
    }

    fn attributes(&self) -> Vec<Self> {
        match self {
            XmlNode::Tree(node) if node.is_element() => (0..node.attributes().len())
                .map(|index| XmlNode::Attribute {
                    owner: *node,
                    index,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn first_child(&self) -> Option<Self> {
        self.tree()?.first_child().map(XmlNode::Tree)
    }

    fn next_sibling(&self) -> Option<Self> {
        self.tree()?.next_sibling().map(XmlNode::Tree)
    }

    fn prev_sibling(&self) -> Option<Self> {
        self.tree()?.prev_sibling().map(XmlNode::Tree)
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Tree(node) => node.parent().map(XmlNode::Tree),
            XmlNode::Attribute { owner, .. } => Some(XmlNode::Tree(*owner)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"<?xml version="1.0"?>
<catalog xmlns:c="urn:codes" xml:lang="en">
  <!-- stock -->
  <c:item sku="A1" c:grade="gold">Lamp</c:item>
  <?audit weekly?>
  <item sku="B2">Desk <b>oak</b></item>
</catalog>"#;

    #[test]
    fn test_kinds_and_names() {
        let doc = XmlDocument::parse(CATALOG).unwrap();
        let root = doc.root();
        assert_eq!(root.kind(), NodeKind::Document);
        assert_eq!(root.name(), None);

        let catalog = root.children().find(|n| n.kind() == NodeKind::Element).unwrap();
        assert_eq!(catalog.name().map(|n| n.to_string()), Some("catalog".to_string()));
        let lang = catalog.attributes();
        assert_eq!(lang.len(), 1);
        assert_eq!(lang[0].name().map(|n| n.to_string()), Some("xml:lang".to_string()));

        let items: Vec<_> = catalog
            .children()
            .filter(|n| n.kind() != NodeKind::Text)
            .collect();
        let kinds: Vec<NodeKind> = items.iter().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Comment,
                NodeKind::Element,
                NodeKind::ProcessingInstruction,
                NodeKind::Element
            ]
        );
        assert_eq!(items[1].name().map(|n| n.to_string()), Some("c:item".to_string()));
        assert_eq!(items[2].name().map(|n| n.to_string()), Some("audit".to_string()));
        assert_eq!(items[2].text(), "weekly");
        assert_eq!(items[0].text(), " stock ");
    }

    #[test]
    fn test_attributes_and_text() {
        let doc = XmlDocument::parse(CATALOG).unwrap();
        let catalog = doc.root().first_child().unwrap();
        let desk = catalog
            .children()
            .filter(|n| n.kind() == NodeKind::Element)
            .nth(1)
            .unwrap();
        assert_eq!(desk.text(), "Desk oak");

        let lamp = catalog.children().find(|n| n.kind() == NodeKind::Element).unwrap();
        let attrs = lamp.attributes();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].text(), "A1");
        assert_eq!(attrs[1].name().map(|n| n.to_string()), Some("c:grade".to_string()));
        assert_eq!(attrs[0].parent(), Some(lamp));
        assert_eq!(attrs[0].next_sibling(), None);
        assert_eq!(attrs[0].first_child(), None);
        assert_ne!(attrs[0], attrs[1]);
    }
}
