//! Expression AST and its canonical printer.
//!
//! Core types: [`Expr`], [`Step`], [`SequenceType`], [`QName`].
//!
//! `Display` on an [`Expr`] produces the canonical form: every operator
//! application is fully parenthesized and abbreviated steps are spelled
//! out, so reparsing the output yields the same canonical string.

use std::fmt;
use std::sync::Arc;

use quarry_node::NodeKind;
use rust_decimal::Decimal;

use crate::error::EvalError;
use crate::lexer::is_ncname;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
        }
    }

    pub fn prefixed(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
        }
    }

    /// Parses `local` or `prefix:local`, rejecting anything else.
    pub fn parse(text: &str) -> Result<Self, EvalError> {
        match text.split_once(':') {
            Some((prefix, local)) if is_ncname(prefix) && is_ncname(local) => {
                Ok(Self::prefixed(prefix, local))
            }
            None if is_ncname(text) => Ok(Self::local(text)),
            _ => Err(EvalError::InvalidName(text.to_string())),
        }
    }

    /// Compares against a name handed out by a document tree.
    pub fn matches(&self, name: &quarry_node::QName<'_>) -> bool {
        self.local == name.local_part && self.prefix.as_deref() == name.prefix
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    String(String),
    Variable(QName),
    ContextItem,
    Sequence(Vec<Expr>),

    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comparison {
        op: Comparison,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Concat {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    SetOp {
        op: SetOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// `/` on its own, or `/` followed by a relative path.
    RootPath(Option<Box<Expr>>),
    /// `left/right`: evaluates `right` once per node of `left`.
    Path {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Step(Step),
    Postfix {
        base: Box<Expr>,
        ops: Vec<PostfixOp>,
    },

    FunctionCall {
        name: QName,
        args: Vec<Argument>,
    },
    NamedFunctionRef {
        name: QName,
        arity: usize,
    },
    InlineFunction {
        params: Vec<Param>,
        return_type: Option<SequenceType>,
        body: Arc<Expr>,
    },

    For {
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    Quantified {
        quantifier: Quantifier,
        bindings: Vec<Binding>,
        satisfies: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    Map(Vec<MapEntry>),
    Array(ArrayConstructor),
    Arrow {
        base: Box<Expr>,
        target: ArrowTarget,
        args: Vec<Argument>,
    },
    SimpleMap {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryLookup(LookupKey),

    InstanceOf {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    TreatAs {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    CastableAs {
        expr: Box<Expr>,
        ty: SingleType,
    },
    CastAs {
        expr: Box<Expr>,
        ty: SingleType,
    },
}

impl Expr {
    /// Builds a sequence, splicing nested sequences in one level and
    /// collapsing a single member to the member itself.
    pub fn sequence(items: Vec<Expr>) -> Expr {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Sequence(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Expr::Sequence(flat)
        }
    }

    pub fn empty_sequence() -> Expr {
        Expr::Sequence(Vec::new())
    }

    pub fn step(axis: Axis, test: NodeTest) -> Expr {
        Expr::Step(Step {
            axis,
            test,
            predicates: Vec::new(),
        })
    }

    /// `descendant-or-self::node()`, the expansion of `//`.
    pub fn descendant_or_self() -> Expr {
        Expr::step(Axis::DescendantOrSelf, NodeTest::Kind(KindTest::AnyNode))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "div",
            ArithmeticOp::IDiv => "idiv",
            ArithmeticOp::Mod => "mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeComparison {
    Is,
    Precedes,
    Follows,
}

/// The three comparison families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `eq ne lt le gt ge`: singleton operands.
    Value(CompareOp),
    /// `= != < <= > >=`: existential over both operands.
    General(CompareOp),
    /// `is << >>`: node identity and document order.
    Node(NodeComparison),
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Value(op) => match op {
                CompareOp::Eq => "eq",
                CompareOp::Ne => "ne",
                CompareOp::Lt => "lt",
                CompareOp::Le => "le",
                CompareOp::Gt => "gt",
                CompareOp::Ge => "ge",
            },
            Comparison::General(op) => match op {
                CompareOp::Eq => "=",
                CompareOp::Ne => "!=",
                CompareOp::Lt => "<",
                CompareOp::Le => "<=",
                CompareOp::Gt => ">",
                CompareOp::Ge => ">=",
            },
            Comparison::Node(op) => match op {
                NodeComparison::Is => "is",
                NodeComparison::Precedes => "<<",
                NodeComparison::Follows => ">>",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersect,
    Except,
}

impl SetOp {
    pub fn symbol(self) -> &'static str {
        match self {
            SetOp::Union => "|",
            SetOp::Intersect => "intersect",
            SetOp::Except => "except",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Some,
    Every,
}

/// One `$name := value` or `$name in value` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: QName,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: QName,
    pub ty: Option<SequenceType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayConstructor {
    /// `[a, b]`: one member per expression.
    Square(Vec<Expr>),
    /// `array { e }`: one member per item of `e`.
    Curly(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowTarget {
    Name(QName),
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Expr(Expr),
    /// `?` in an argument list: makes the call a partial application.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupKey {
    Name(String),
    Integer(i64),
    Expr(Box<Expr>),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostfixOp {
    Predicate(Expr),
    Call(Vec<Argument>),
    Lookup(LookupKey),
}

/// `axis::test[predicate]...`
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
    SelfAxis,
    DescendantOrSelf,
    AncestorOrSelf,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Following => "following",
            Axis::Preceding => "preceding",
            Axis::Attribute => "attribute",
            Axis::SelfAxis => "self",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::AncestorOrSelf => "ancestor-or-self",
        }
    }

    /// Reverse axes yield nodes nearest-first.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::Preceding
                | Axis::PrecedingSibling
        )
    }

    /// The node kind a bare name test selects on this axis.
    pub fn principal_kind(self) -> NodeKind {
        if self == Axis::Attribute {
            NodeKind::Attribute
        } else {
            NodeKind::Element
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(NameTest),
    Kind(KindTest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    Name(QName),
    /// `*`
    Any,
    /// `*:local`
    AnyPrefix(String),
    /// `prefix:*`
    AnyLocal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindTest {
    AnyNode,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
    Document,
    Element(Option<QName>),
    Attribute(Option<QName>),
}

impl KindTest {
    /// Maps a kind-test keyword to its test, without arguments.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "node" => KindTest::AnyNode,
            "text" => KindTest::Text,
            "comment" => KindTest::Comment,
            "processing-instruction" => KindTest::ProcessingInstruction(None),
            "document-node" => KindTest::Document,
            "element" => KindTest::Element(None),
            "attribute" => KindTest::Attribute(None),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    AnyAtomic,
    Numeric,
    Integer,
    Decimal,
    Double,
    String,
    Boolean,
    Untyped,
}

impl AtomicType {
    /// Resolves `xs:name` (or an unprefixed `name`) to an atomic type.
    pub fn from_qname(name: &QName) -> Option<Self> {
        if !matches!(name.prefix.as_deref(), None | Some("xs")) {
            return None;
        }
        Some(match name.local.as_str() {
            "anyAtomicType" => AtomicType::AnyAtomic,
            "numeric" => AtomicType::Numeric,
            "integer" => AtomicType::Integer,
            "decimal" => AtomicType::Decimal,
            "double" => AtomicType::Double,
            "string" => AtomicType::String,
            "boolean" => AtomicType::Boolean,
            "untypedAtomic" => AtomicType::Untyped,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            AtomicType::AnyAtomic => "xs:anyAtomicType",
            AtomicType::Numeric => "xs:numeric",
            AtomicType::Integer => "xs:integer",
            AtomicType::Decimal => "xs:decimal",
            AtomicType::Double => "xs:double",
            AtomicType::String => "xs:string",
            AtomicType::Boolean => "xs:boolean",
            AtomicType::Untyped => "xs:untypedAtomic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceType {
    Empty,
    Items(ItemType, Occurrence),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemType {
    Item,
    Atomic(AtomicType),
    Kind(KindTest),
    Map,
    Array,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    One,
    Optional,
    Many,
    OneOrMore,
}

impl Occurrence {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Occurrence::One => count == 1,
            Occurrence::Optional => count <= 1,
            Occurrence::Many => true,
            Occurrence::OneOrMore => count >= 1,
        }
    }
}

/// Target of `cast as` / `castable as`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleType {
    pub ty: AtomicType,
    pub optional: bool,
}

/// Writes an expression where it sits among commas or next to an
/// operator; a sequence there must keep its parentheses.
struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Sequence(items) if !items.is_empty() => write!(f, "({})", self.0),
            other => write!(f, "{}", other),
        }
    }
}

/// Writes the base of a postfix chain. Paths and steps are wrapped so
/// their trailing predicates are not reabsorbed into the last step.
struct Base<'a>(&'a Expr);

impl fmt::Display for Base<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Path { .. } | Expr::RootPath(_) | Expr::Step(_) => write!(f, "({})", self.0),
            other => write!(f, "{}", Operand(other)),
        }
    }
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut each: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Argument]) -> fmt::Result {
    f.write_str("(")?;
    write_list(f, args, |f, arg| match arg {
        Argument::Expr(e) => write!(f, "{}", Operand(e)),
        Argument::Placeholder => f.write_str("?"),
    })?;
    f.write_str(")")
}

fn write_bindings(f: &mut fmt::Formatter<'_>, bindings: &[Binding], sep: &str) -> fmt::Result {
    write_list(f, bindings, |f, b| {
        write!(f, "${} {} {}", b.name, sep, Operand(&b.value))
    })
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(i) => write!(f, "{}", i),
            Expr::Decimal(d) => {
                let text = d.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Expr::Double(d) if d.is_nan() => f.write_str("(\"NaN\" cast as xs:double)"),
            Expr::Double(d) if d.is_infinite() => {
                let text = if *d > 0.0 { "INF" } else { "-INF" };
                write!(f, "(\"{}\" cast as xs:double)", text)
            }
            Expr::Double(d) => write!(f, "{:e}", d),
            Expr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Expr::Variable(name) => write!(f, "${}", name),
            Expr::ContextItem => f.write_str("."),
            Expr::Sequence(items) if items.is_empty() => f.write_str("()"),
            Expr::Sequence(items) => write_list(f, items, |f, e| write!(f, "{}", Operand(e))),

            Expr::Arithmetic { op, left, right } => {
                write!(f, "({} {} {})", Operand(left), op.symbol(), Operand(right))
            }
            Expr::Comparison { op, left, right } => {
                write!(f, "({} {} {})", Operand(left), op.symbol(), Operand(right))
            }
            Expr::Logical { op, left, right } => {
                let word = match op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                write!(f, "({} {} {})", Operand(left), word, Operand(right))
            }
            Expr::Concat { left, right } => write!(f, "({} || {})", Operand(left), Operand(right)),
            Expr::Range { start, end } => write!(f, "({} to {})", Operand(start), Operand(end)),
            Expr::SetOp { op, left, right } => {
                write!(f, "({} {} {})", Operand(left), op.symbol(), Operand(right))
            }
            Expr::Unary { op, operand } => {
                let sign = match op {
                    UnaryOp::Minus => "-",
                    UnaryOp::Plus => "+",
                };
                write!(f, "({}{})", sign, Operand(operand))
            }

            Expr::RootPath(None) => f.write_str("/"),
            Expr::RootPath(Some(rel)) => write!(f, "/{}", Operand(rel)),
            Expr::Path { left, right } => write!(f, "{}/{}", Operand(left), Operand(right)),
            Expr::Step(step) => write!(f, "{}", step),
            Expr::Postfix { base, ops } => {
                write!(f, "{}", Base(base))?;
                for op in ops {
                    match op {
                        PostfixOp::Predicate(p) => write!(f, "[{}]", p)?,
                        PostfixOp::Call(args) => write_args(f, args)?,
                        PostfixOp::Lookup(key) => write!(f, "?{}", key)?,
                    }
                }
                Ok(())
            }

            Expr::FunctionCall { name, args } => {
                write!(f, "{}", name)?;
                write_args(f, args)
            }
            Expr::NamedFunctionRef { name, arity } => write!(f, "{}#{}", name, arity),
            Expr::InlineFunction {
                params,
                return_type,
                body,
            } => {
                f.write_str("function(")?;
                write_list(f, params, |f, p| match &p.ty {
                    Some(ty) => write!(f, "${} as {}", p.name, ty),
                    None => write!(f, "${}", p.name),
                })?;
                f.write_str(")")?;
                if let Some(ty) = return_type {
                    write!(f, " as {}", ty)?;
                }
                write!(f, " {{ {} }}", body)
            }

            Expr::For { bindings, body } => {
                f.write_str("(for ")?;
                write_bindings(f, bindings, "in")?;
                write!(f, " return {})", Operand(body))
            }
            Expr::Let { bindings, body } => {
                f.write_str("(let ")?;
                write_bindings(f, bindings, ":=")?;
                write!(f, " return {})", Operand(body))
            }
            Expr::Quantified {
                quantifier,
                bindings,
                satisfies,
            } => {
                let word = match quantifier {
                    Quantifier::Some => "some",
                    Quantifier::Every => "every",
                };
                write!(f, "({} ", word)?;
                write_bindings(f, bindings, "in")?;
                write!(f, " satisfies {})", Operand(satisfies))
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => write!(
                f,
                "(if ({}) then {} else {})",
                condition,
                Operand(then_branch),
                Operand(else_branch)
            ),

            Expr::Map(entries) if entries.is_empty() => f.write_str("map {}"),
            Expr::Map(entries) => {
                f.write_str("map { ")?;
                write_list(f, entries, |f, e| {
                    write!(f, "{}: {}", Operand(&e.key), Operand(&e.value))
                })?;
                f.write_str(" }")
            }
            Expr::Array(ArrayConstructor::Square(members)) => {
                f.write_str("[")?;
                write_list(f, members, |f, m| write!(f, "{}", Operand(m)))?;
                f.write_str("]")
            }
            Expr::Array(ArrayConstructor::Curly(content)) => write!(f, "array {{ {} }}", content),
            Expr::Arrow { base, target, args } => {
                write!(f, "({} => ", Operand(base))?;
                match target {
                    ArrowTarget::Name(name) => write!(f, "{}", name)?,
                    ArrowTarget::Dynamic(e) if matches!(**e, Expr::Variable(_)) => {
                        write!(f, "{}", e)?
                    }
                    ArrowTarget::Dynamic(e) => write!(f, "({})", e)?,
                }
                write_args(f, args)?;
                f.write_str(")")
            }
            Expr::SimpleMap { left, right } => {
                write!(f, "({} ! {})", Operand(left), Operand(right))
            }
            Expr::UnaryLookup(key) => write!(f, "?{}", key),

            Expr::InstanceOf { expr, ty } => write!(f, "({} instance of {})", Operand(expr), ty),
            Expr::TreatAs { expr, ty } => write!(f, "({} treat as {})", Operand(expr), ty),
            Expr::CastableAs { expr, ty } => {
                write!(f, "({} castable as {})", Operand(expr), ty)
            }
            Expr::CastAs { expr, ty } => write!(f, "({} cast as {})", Operand(expr), ty),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.axis.name(), self.test)?;
        for p in &self.predicates {
            write!(f, "[{}]", p)?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTest::Name(NameTest::Name(name)) => write!(f, "{}", name),
            NodeTest::Name(NameTest::Any) => f.write_str("*"),
            NodeTest::Name(NameTest::AnyPrefix(local)) => write!(f, "*:{}", local),
            NodeTest::Name(NameTest::AnyLocal(prefix)) => write!(f, "{}:*", prefix),
            NodeTest::Kind(kind) => write!(f, "{}", kind),
        }
    }
}

impl fmt::Display for KindTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindTest::AnyNode => f.write_str("node()"),
            KindTest::Text => f.write_str("text()"),
            KindTest::Comment => f.write_str("comment()"),
            KindTest::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
            KindTest::ProcessingInstruction(Some(target)) => {
                write!(f, "processing-instruction({})", target)
            }
            KindTest::Document => f.write_str("document-node()"),
            KindTest::Element(None) => f.write_str("element()"),
            KindTest::Element(Some(name)) => write!(f, "element({})", name),
            KindTest::Attribute(None) => f.write_str("attribute()"),
            KindTest::Attribute(Some(name)) => write!(f, "attribute({})", name),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Name(name) => f.write_str(name),
            LookupKey::Integer(i) => write!(f, "{}", i),
            LookupKey::Expr(e) => write!(f, "({})", e),
            LookupKey::Wildcard => f.write_str("*"),
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceType::Empty => f.write_str("empty-sequence()"),
            SequenceType::Items(item, occurrence) => {
                let suffix = match occurrence {
                    Occurrence::One => "",
                    Occurrence::Optional => "?",
                    Occurrence::Many => "*",
                    Occurrence::OneOrMore => "+",
                };
                write!(f, "{}{}", item, suffix)
            }
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Item => f.write_str("item()"),
            ItemType::Atomic(ty) => f.write_str(ty.name()),
            ItemType::Kind(kind) => write!(f, "{}", kind),
            ItemType::Map => f.write_str("map(*)"),
            ItemType::Array => f.write_str("array(*)"),
            ItemType::Function => f.write_str("function(*)"),
        }
    }
}

impl fmt::Display for SingleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ty.name())?;
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}
