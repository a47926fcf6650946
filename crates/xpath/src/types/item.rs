use std::fmt;
use std::slice;

use quarry_node::{Node, NodeKind};
use rust_decimal::Decimal;

use super::{Atomic, Function, ItemMap, format_double};
use crate::error::EvalError;

/// A runtime value.
///
/// Sequences are never nested: [`Item::sequence`] splices inner sequences
/// into the outer one, and a one-item sequence is the item itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Item<N> {
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    String(String),
    Boolean(bool),
    Sequence(Vec<Item<N>>),
    Array(Vec<Item<N>>),
    Map(ItemMap<N>),
    Node(N),
    Function(Function<N>),
    Error(EvalError),
    /// Absence of a value, distinct from the empty sequence.
    Nil,
}

impl<N> Item<N> {
    pub fn empty() -> Self {
        Item::Sequence(Vec::new())
    }

    /// Builds a flat sequence. The first error among `items` wins.
    pub fn sequence(items: Vec<Item<N>>) -> Self {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::Sequence(inner) => flat.extend(inner),
                Item::Error(e) => return Item::Error(e),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Item::Sequence(flat)
        }
    }

    pub fn is_empty_sequence(&self) -> bool {
        matches!(self, Item::Sequence(items) if items.is_empty()) || matches!(self, Item::Nil)
    }

    /// The items of this value seen as a sequence.
    pub fn as_slice(&self) -> &[Item<N>] {
        match self {
            Item::Sequence(items) => items,
            Item::Nil => &[],
            other => slice::from_ref(other),
        }
    }

    pub fn into_items(self) -> Vec<Item<N>> {
        match self {
            Item::Sequence(items) => items,
            Item::Nil => Vec::new(),
            other => vec![other],
        }
    }

    pub fn count(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Item::Error(_))
    }

    /// Turns an error item into `Err`.
    pub fn into_result(self) -> Result<Self, EvalError> {
        match self {
            Item::Error(e) => Err(e),
            other => Ok(other),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Integer(_) => "xs:integer",
            Item::Decimal(_) => "xs:decimal",
            Item::Double(_) => "xs:double",
            Item::String(_) => "xs:string",
            Item::Boolean(_) => "xs:boolean",
            Item::Sequence(items) if items.is_empty() => "empty-sequence()",
            Item::Sequence(_) => "item()*",
            Item::Array(_) => "array(*)",
            Item::Map(_) => "map(*)",
            Item::Node(_) => "node()",
            Item::Function(_) => "function(*)",
            Item::Error(_) => "error",
            Item::Nil => "nil",
        }
    }

    /// The atomic view of an atomic item, `None` for everything else.
    pub fn as_atomic(&self) -> Option<Atomic> {
        Some(match self {
            Item::Integer(i) => Atomic::Integer(*i),
            Item::Decimal(d) => Atomic::Decimal(*d),
            Item::Double(d) => Atomic::Double(*d),
            Item::String(s) => Atomic::String(s.clone()),
            Item::Boolean(b) => Atomic::Boolean(*b),
            _ => return None,
        })
    }
}

impl<N: Node> Item<N> {
    /// Atomizes into a flat list: nodes give their untyped string value and
    /// arrays their atomized members.
    pub fn atomize(&self) -> Result<Vec<Atomic>, EvalError> {
        let mut out = Vec::new();
        self.atomize_into(&mut out)?;
        Ok(out)
    }

    fn atomize_into(&self, out: &mut Vec<Atomic>) -> Result<(), EvalError> {
        match self {
            Item::Sequence(items) | Item::Array(items) => {
                for item in items {
                    item.atomize_into(out)?;
                }
            }
            Item::Node(node) => out.push(Atomic::Untyped(node.text())),
            Item::Nil => {}
            Item::Error(e) => return Err(e.clone()),
            Item::Map(_) | Item::Function(_) => {
                return Err(EvalError::type_error(format!(
                    "cannot atomize {}",
                    self.type_name()
                )));
            }
            atomic => {
                if let Some(a) = atomic.as_atomic() {
                    out.push(a);
                }
            }
        }
        Ok(())
    }

    /// Atomizes to at most one value.
    pub fn atomize_optional(&self) -> Result<Option<Atomic>, EvalError> {
        let mut atoms = self.atomize()?;
        match atoms.len() {
            0 => Ok(None),
            1 => Ok(atoms.pop()),
            n => Err(EvalError::cardinality("zero or one item", n)),
        }
    }

    /// The effective boolean value used by predicates, `if` and the logical operators.
    pub fn effective_boolean_value(&self) -> Result<bool, EvalError> {
        match self {
            Item::Boolean(b) => Ok(*b),
            Item::String(s) => Ok(!s.is_empty()),
            Item::Integer(i) => Ok(*i != 0),
            Item::Decimal(d) => Ok(!d.is_zero()),
            Item::Double(d) => Ok(*d != 0.0 && !d.is_nan()),
            Item::Node(_) => Ok(true),
            Item::Nil => Ok(false),
            Item::Sequence(items) => match items.first() {
                None => Ok(false),
                Some(Item::Node(_)) => Ok(true),
                Some(_) => Err(EvalError::type_error(
                    "effective boolean value of a sequence of more than one atomic value",
                )),
            },
            Item::Error(e) => Err(e.clone()),
            Item::Array(_) | Item::Map(_) | Item::Function(_) => Err(EvalError::type_error(
                format!("no effective boolean value for {}", self.type_name()),
            )),
        }
    }

    /// The string value of a single item, as `fn:string` computes it.
    pub fn string_value(&self) -> Result<String, EvalError> {
        match self {
            Item::Node(node) => Ok(node.text()),
            Item::Nil => Ok(String::new()),
            other => match other.as_atomic() {
                Some(a) => Ok(a.to_string_value()),
                None if other.is_empty_sequence() => Ok(String::new()),
                None => match other {
                    Item::Error(e) => Err(e.clone()),
                    Item::Sequence(items) => Err(EvalError::cardinality("zero or one item", items.len())),
                    _ => Err(EvalError::type_error(format!(
                        "no string value for {}",
                        other.type_name()
                    ))),
                },
            },
        }
    }

    /// A readable rendering of any value, used by the REPL.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl<N> From<Atomic> for Item<N> {
    fn from(a: Atomic) -> Self {
        match a {
            Atomic::Integer(i) => Item::Integer(i),
            Atomic::Decimal(d) => Item::Decimal(d),
            Atomic::Double(d) => Item::Double(d),
            Atomic::String(s) | Atomic::Untyped(s) => Item::String(s),
            Atomic::Boolean(b) => Item::Boolean(b),
        }
    }
}

impl<N> From<Result<Item<N>, EvalError>> for Item<N> {
    fn from(result: Result<Item<N>, EvalError>) -> Self {
        result.unwrap_or_else(Item::Error)
    }
}

impl<N> From<bool> for Item<N> {
    fn from(b: bool) -> Self {
        Item::Boolean(b)
    }
}

impl<N> From<i64> for Item<N> {
    fn from(i: i64) -> Self {
        Item::Integer(i)
    }
}

impl<N> From<f64> for Item<N> {
    fn from(d: f64) -> Self {
        Item::Double(d)
    }
}

impl<N> From<&str> for Item<N> {
    fn from(s: &str) -> Self {
        Item::String(s.to_string())
    }
}

impl<N> From<String> for Item<N> {
    fn from(s: String) -> Self {
        Item::String(s)
    }
}

fn write_items<N: Node>(f: &mut fmt::Formatter<'_>, items: &[Item<N>]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_node<N: Node>(f: &mut fmt::Formatter<'_>, node: &N) -> fmt::Result {
    let name = node.name().map(|n| n.to_string()).unwrap_or_default();
    match node.kind() {
        NodeKind::Document => f.write_str("document-node()"),
        NodeKind::Element => write!(f, "<{}>", name),
        NodeKind::Attribute => write!(f, "@{}=\"{}\"", name, node.text()),
        NodeKind::Text => write!(f, "text({:?})", node.text()),
        NodeKind::Comment => write!(f, "comment({:?})", node.text()),
        NodeKind::ProcessingInstruction => write!(f, "processing-instruction({})", name),
    }
}

impl<N: Node> fmt::Display for Item<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Integer(i) => write!(f, "{}", i),
            Item::Decimal(d) => write!(f, "{}", d.normalize()),
            Item::Double(d) => f.write_str(&format_double(*d)),
            Item::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Item::Boolean(b) => write!(f, "{}()", b),
            Item::Sequence(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                f.write_str(")")
            }
            Item::Array(members) => {
                f.write_str("[")?;
                write_items(f, members)?;
                f.write_str("]")
            }
            Item::Map(map) if map.is_empty() => f.write_str("map {}"),
            Item::Map(map) => {
                f.write_str("map { ")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str(" }")
            }
            Item::Node(node) => write_node(f, node),
            Item::Function(func) => write!(f, "{}", func),
            Item::Error(e) => write!(f, "error: {}", e),
            Item::Nil => f.write_str("nil"),
        }
    }
}
