//! Binary and unary operators over items.
//!
//! Every public operator is total: it returns a typed result or an
//! [`Item::Error`], and an error operand is handed back unchanged.

use std::cmp::Ordering;
use std::collections::HashSet;

use quarry_node::Node;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::ast::{ArithmeticOp, AtomicType, CompareOp, Comparison, NodeComparison, SetOp, UnaryOp};
use crate::axes::{compare_document_order, sort_document_order};
use crate::error::EvalError;
use crate::types::{Atomic, Item, Numeric, promote};

fn pass_error<N: Clone>(left: &Item<N>, right: &Item<N>) -> Option<Item<N>> {
    [left, right].into_iter().find(|item| item.is_error()).cloned()
}

// --- arithmetic ---

pub fn arithmetic<N: Node>(op: ArithmeticOp, left: &Item<N>, right: &Item<N>) -> Item<N> {
    if let Some(err) = pass_error(left, right) {
        return err;
    }
    try_arithmetic(op, left, right).into()
}

fn try_arithmetic<N: Node>(
    op: ArithmeticOp,
    left: &Item<N>,
    right: &Item<N>,
) -> Result<Item<N>, EvalError> {
    let (Some(a), Some(b)) = (left.atomize_optional()?, right.atomize_optional()?) else {
        return Ok(Item::empty());
    };
    arithmetic_atomic(op, &a, &b).map(Item::from)
}

/// Applies `op` to two atomic values after numeric promotion.
pub fn arithmetic_atomic(op: ArithmeticOp, a: &Atomic, b: &Atomic) -> Result<Atomic, EvalError> {
    let symbol = op.symbol();
    for operand in [a, b] {
        if matches!(operand, Atomic::String(_) | Atomic::Boolean(_)) {
            return Err(EvalError::mismatch(symbol, a.type_name(), b.type_name()));
        }
    }
    let x = a.to_numeric(symbol, b)?;
    let y = b.to_numeric(symbol, a)?;
    match promote(x, y) {
        (Numeric::Integer(x), Numeric::Integer(y)) => integer_op(op, x, y),
        (Numeric::Decimal(x), Numeric::Decimal(y)) => decimal_op(op, x, y),
        (x, y) => double_op(op, x.to_f64(), y.to_f64()),
    }
}

fn overflow(op: ArithmeticOp) -> EvalError {
    EvalError::Overflow {
        op: op.symbol().to_string(),
    }
}

fn integer_op(op: ArithmeticOp, x: i64, y: i64) -> Result<Atomic, EvalError> {
    let checked = match op {
        ArithmeticOp::Add => x.checked_add(y),
        ArithmeticOp::Sub => x.checked_sub(y),
        ArithmeticOp::Mul => x.checked_mul(y),
        ArithmeticOp::Div => return decimal_op(op, Decimal::from(x), Decimal::from(y)),
        ArithmeticOp::IDiv | ArithmeticOp::Mod if y == 0 => return Err(EvalError::DivisionByZero),
        ArithmeticOp::IDiv => x.checked_div(y),
        ArithmeticOp::Mod => Some(x.wrapping_rem(y)),
    };
    checked.map(Atomic::Integer).ok_or_else(|| overflow(op))
}

fn decimal_op(op: ArithmeticOp, x: Decimal, y: Decimal) -> Result<Atomic, EvalError> {
    if matches!(op, ArithmeticOp::Div | ArithmeticOp::IDiv | ArithmeticOp::Mod) && y.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    let result = match op {
        ArithmeticOp::Add => x.checked_add(y),
        ArithmeticOp::Sub => x.checked_sub(y),
        ArithmeticOp::Mul => x.checked_mul(y),
        ArithmeticOp::Div => x.checked_div(y),
        ArithmeticOp::Mod => x.checked_rem(y),
        ArithmeticOp::IDiv => {
            return x
                .checked_div(y)
                .and_then(|q| q.trunc().to_i64())
                .map(Atomic::Integer)
                .ok_or_else(|| overflow(op));
        }
    };
    result.map(Atomic::Decimal).ok_or_else(|| overflow(op))
}

fn double_op(op: ArithmeticOp, x: f64, y: f64) -> Result<Atomic, EvalError> {
    Ok(Atomic::Double(match op {
        ArithmeticOp::Add => x + y,
        ArithmeticOp::Sub => x - y,
        ArithmeticOp::Mul => x * y,
        ArithmeticOp::Div => x / y,
        ArithmeticOp::Mod => x % y,
        ArithmeticOp::IDiv => {
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let quotient = (x / y).trunc();
            if !quotient.is_finite() || quotient < i64::MIN as f64 || quotient >= i64::MAX as f64 {
                return Err(overflow(op));
            }
            return Ok(Atomic::Integer(quotient as i64));
        }
    }))
}

pub fn unary<N: Node>(op: UnaryOp, operand: &Item<N>) -> Item<N> {
    if operand.is_error() {
        return operand.clone();
    }
    try_unary(op, operand).into()
}

fn try_unary<N: Node>(op: UnaryOp, operand: &Item<N>) -> Result<Item<N>, EvalError> {
    let Some(a) = operand.atomize_optional()? else {
        return Ok(Item::empty());
    };
    let symbol = match op {
        UnaryOp::Minus => "-",
        UnaryOp::Plus => "+",
    };
    if matches!(a, Atomic::String(_) | Atomic::Boolean(_)) {
        return Err(EvalError::type_error(format!(
            "unary '{}' cannot be applied to {}",
            symbol,
            a.type_name()
        )));
    }
    let n = a.to_numeric(symbol, &a)?;
    let result = match (op, n) {
        (UnaryOp::Plus, n) => n,
        (UnaryOp::Minus, Numeric::Integer(i)) => Numeric::Integer(i.checked_neg().ok_or_else(
            || EvalError::Overflow {
                op: symbol.to_string(),
            },
        )?),
        (UnaryOp::Minus, Numeric::Decimal(d)) => Numeric::Decimal(-d),
        (UnaryOp::Minus, Numeric::Double(d)) => Numeric::Double(-d),
    };
    Ok(Atomic::from(result).into())
}

// --- comparison ---

pub fn compare<N: Node>(op: Comparison, left: &Item<N>, right: &Item<N>) -> Item<N> {
    if let Some(err) = pass_error(left, right) {
        return err;
    }
    match op {
        Comparison::Value(o) => value_compare(o, left, right),
        Comparison::General(o) => general_compare(o, left, right),
        Comparison::Node(o) => node_compare(o, left, right),
    }
    .into()
}

fn number(a: &Atomic) -> Option<Numeric> {
    match a {
        Atomic::Integer(i) => Some(Numeric::Integer(*i)),
        Atomic::Decimal(d) => Some(Numeric::Decimal(*d)),
        Atomic::Double(d) => Some(Numeric::Double(*d)),
        _ => None,
    }
}

/// Orders two atomic values of comparable types; `Ok(None)` when a NaN is
/// involved. Untyped values order as strings.
pub fn atomic_order(symbol: &str, a: &Atomic, b: &Atomic) -> Result<Option<Ordering>, EvalError> {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return Ok(x.compare(y));
    }
    match (a, b) {
        (
            Atomic::String(x) | Atomic::Untyped(x),
            Atomic::String(y) | Atomic::Untyped(y),
        ) => Ok(Some(x.cmp(y))),
        (Atomic::Boolean(x), Atomic::Boolean(y)) => Ok(Some(x.cmp(y))),
        _ => Err(EvalError::mismatch(symbol, a.type_name(), b.type_name())),
    }
}

fn holds(op: CompareOp, order: Option<Ordering>) -> bool {
    match order {
        None => op == CompareOp::Ne,
        Some(o) => match op {
            CompareOp::Eq => o == Ordering::Equal,
            CompareOp::Ne => o != Ordering::Equal,
            CompareOp::Lt => o == Ordering::Less,
            CompareOp::Le => o != Ordering::Greater,
            CompareOp::Gt => o == Ordering::Greater,
            CompareOp::Ge => o != Ordering::Less,
        },
    }
}

fn value_compare<N: Node>(op: CompareOp, left: &Item<N>, right: &Item<N>) -> Result<Item<N>, EvalError> {
    let (Some(a), Some(b)) = (left.atomize_optional()?, right.atomize_optional()?) else {
        return Ok(Item::empty());
    };
    let order = atomic_order(Comparison::Value(op).symbol(), &a, &b)?;
    Ok(Item::Boolean(holds(op, order)))
}

/// The type an untyped operand is cast to when compared with `other`.
fn untyped_target(other: &Atomic) -> AtomicType {
    match other {
        Atomic::Integer(_) | Atomic::Decimal(_) | Atomic::Double(_) => AtomicType::Double,
        Atomic::Boolean(_) => AtomicType::Boolean,
        _ => AtomicType::String,
    }
}

fn general_operands(a: &Atomic, b: &Atomic) -> Result<(Atomic, Atomic), EvalError> {
    Ok(match (a, b) {
        (Atomic::Untyped(_), Atomic::Untyped(_)) => (a.clone(), b.clone()),
        (Atomic::Untyped(_), other) => (a.cast(untyped_target(other))?, b.clone()),
        (other, Atomic::Untyped(_)) => (a.clone(), b.cast(untyped_target(other))?),
        _ => (a.clone(), b.clone()),
    })
}

/// Existential comparison: true as soon as one pair of atomized values
/// satisfies `op`.
fn general_compare<N: Node>(op: CompareOp, left: &Item<N>, right: &Item<N>) -> Result<Item<N>, EvalError> {
    let symbol = Comparison::General(op).symbol();
    let lhs = left.atomize()?;
    let rhs = right.atomize()?;
    for a in &lhs {
        for b in &rhs {
            let (x, y) = general_operands(a, b)?;
            if holds(op, atomic_order(symbol, &x, &y)?) {
                return Ok(Item::Boolean(true));
            }
        }
    }
    Ok(Item::Boolean(false))
}

fn single_node<N: Node>(item: &Item<N>) -> Result<Option<N>, EvalError> {
    match item.as_slice() {
        [] => Ok(None),
        [Item::Node(node)] => Ok(Some(*node)),
        [other] => Err(EvalError::type_error(format!(
            "node comparison requires a node, got {}",
            other.type_name()
        ))),
        items => Err(EvalError::cardinality("zero or one node", items.len())),
    }
}

fn node_compare<N: Node>(
    op: NodeComparison,
    left: &Item<N>,
    right: &Item<N>,
) -> Result<Item<N>, EvalError> {
    let (Some(a), Some(b)) = (single_node(left)?, single_node(right)?) else {
        return Ok(Item::empty());
    };
    Ok(Item::Boolean(match op {
        NodeComparison::Is => a == b,
        NodeComparison::Precedes => compare_document_order(&a, &b) == Ordering::Less,
        NodeComparison::Follows => compare_document_order(&a, &b) == Ordering::Greater,
    }))
}

// --- strings, ranges, node sets ---

/// `a || b`. Each side is atomized and its values joined with a single
/// space, so sequences and arrays concatenate too.
pub fn concat<N: Node>(left: &Item<N>, right: &Item<N>) -> Item<N> {
    if let Some(err) = pass_error(left, right) {
        return err;
    }
    let text = |item: &Item<N>| -> Result<String, EvalError> {
        let values: Vec<String> = item.atomize()?.iter().map(Atomic::to_string_value).collect();
        Ok(values.join(" "))
    };
    match (text(left), text(right)) {
        (Ok(l), Ok(r)) => Item::String(l + &r),
        (Err(e), _) | (_, Err(e)) => Item::Error(e),
    }
}

pub fn range<N: Node>(start: &Item<N>, end: &Item<N>, limit: usize) -> Item<N> {
    if let Some(err) = pass_error(start, end) {
        return err;
    }
    try_range(start, end, limit).into()
}

fn range_bound(a: &Atomic, other: &Atomic) -> Result<i64, EvalError> {
    match a {
        Atomic::Integer(i) => Ok(*i),
        Atomic::Untyped(_) => match a.cast(AtomicType::Integer)? {
            Atomic::Integer(i) => Ok(i),
            _ => Err(EvalError::cast(a.type_name(), "xs:integer")),
        },
        _ => Err(EvalError::mismatch("to", a.type_name(), other.type_name())),
    }
}

fn try_range<N: Node>(start: &Item<N>, end: &Item<N>, limit: usize) -> Result<Item<N>, EvalError> {
    let (Some(a), Some(b)) = (start.atomize_optional()?, end.atomize_optional()?) else {
        return Ok(Item::empty());
    };
    let from = range_bound(&a, &b)?;
    let to = range_bound(&b, &a)?;
    if from > to {
        return Ok(Item::empty());
    }
    let length = i128::from(to) - i128::from(from) + 1;
    if length > limit as i128 {
        return Err(EvalError::RangeTooLarge {
            length: u64::try_from(length).unwrap_or(u64::MAX),
            limit,
        });
    }
    Ok(Item::sequence((from..=to).map(Item::Integer).collect()))
}

pub fn set_operation<N: Node>(op: SetOp, left: &Item<N>, right: &Item<N>) -> Item<N> {
    if let Some(err) = pass_error(left, right) {
        return err;
    }
    try_set_operation(op, left, right).into()
}

fn nodes_of<N: Node>(op: SetOp, item: &Item<N>) -> Result<Vec<N>, EvalError> {
    item.as_slice()
        .iter()
        .map(|i| match i {
            Item::Node(node) => Ok(*node),
            other => Err(EvalError::type_error(format!(
                "'{}' requires node sequences, got {}",
                op.symbol(),
                other.type_name()
            ))),
        })
        .collect()
}

fn try_set_operation<N: Node>(op: SetOp, left: &Item<N>, right: &Item<N>) -> Result<Item<N>, EvalError> {
    let lhs = nodes_of(op, left)?;
    let rhs = nodes_of(op, right)?;
    let mut nodes: Vec<N> = match op {
        SetOp::Union => lhs.into_iter().chain(rhs).collect(),
        SetOp::Intersect | SetOp::Except => {
            let other: HashSet<N> = rhs.into_iter().collect();
            let keep = op == SetOp::Intersect;
            lhs.into_iter()
                .filter(|n| other.contains(n) == keep)
                .collect()
        }
    };
    sort_document_order(&mut nodes);
    Ok(Item::sequence(nodes.into_iter().map(Item::Node).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_node::testing::{TestNode, sample_tree};

    type TestItem<'t> = Item<TestNode<'t>>;

    fn dec(num: i64, scale: u32) -> TestItem<'static> {
        Item::Decimal(Decimal::new(num, scale))
    }

    fn add<'t>(a: TestItem<'t>, b: TestItem<'t>) -> TestItem<'t> {
        arithmetic(ArithmeticOp::Add, &a, &b)
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(add(Item::Integer(3), dec(15, 1)), dec(45, 1));
        assert_eq!(add(Item::Integer(3), Item::Double(1.5)), Item::Double(4.5));
        assert_eq!(add(dec(10, 1), Item::Double(1.0)), Item::Double(2.0));
        assert_eq!(add(Item::Integer(2), Item::Integer(2)), Item::Integer(4));
    }

    #[test]
    fn test_division() {
        let div = |a: TestItem<'static>, b: TestItem<'static>| arithmetic(ArithmeticOp::Div, &a, &b);
        assert_eq!(div(Item::Integer(5), Item::Integer(2)), dec(25, 1));
        assert_eq!(
            div(Item::Integer(1), Item::Integer(0)),
            Item::Error(EvalError::DivisionByZero)
        );
        assert_eq!(div(Item::Double(1.0), Item::Integer(0)), Item::Double(f64::INFINITY));

        let idiv = |a: i64, b: i64| arithmetic::<TestNode>(ArithmeticOp::IDiv, &Item::Integer(a), &Item::Integer(b));
        assert_eq!(idiv(-7, 2), Item::Integer(-3));
        assert_eq!(idiv(1, 0), Item::Error(EvalError::DivisionByZero));

        let modulo = |a: i64, b: i64| arithmetic::<TestNode>(ArithmeticOp::Mod, &Item::Integer(a), &Item::Integer(b));
        assert_eq!(modulo(-7, 2), Item::Integer(-1));
        assert_eq!(modulo(7, -2), Item::Integer(1));
    }

    #[test]
    fn test_overflow_and_type_errors() {
        assert_eq!(
            add(Item::Integer(i64::MAX), Item::Integer(1)),
            Item::Error(EvalError::Overflow { op: "+".into() })
        );
        assert_eq!(
            add(Item::from("a"), Item::Integer(1)),
            Item::Error(EvalError::mismatch("+", "xs:string", "xs:integer"))
        );
        assert_eq!(
            add(Item::Integer(1), Item::Boolean(true)),
            Item::Error(EvalError::mismatch("+", "xs:integer", "xs:boolean"))
        );
        assert_eq!(add(Item::empty(), Item::Integer(1)), Item::empty());
    }

    #[test]
    fn test_untyped_nodes_promote_to_double() {
        let tree = sample_tree();
        let price: TestItem = Item::Node(tree.node(7));
        assert_eq!(add(price, Item::Integer(1)), Item::Double(10.5));
        let title: TestItem = Item::Node(tree.node(5));
        assert_eq!(
            add(title, Item::Integer(1)),
            Item::Error(EvalError::cast("xs:untypedAtomic", "xs:double"))
        );
    }

    #[test]
    fn test_error_operands_pass_through() {
        let err: TestItem = Item::Error(EvalError::UndefinedContext);
        let one: TestItem = Item::Integer(1);
        assert_eq!(add(err.clone(), one.clone()), err);
        assert_eq!(add(one.clone(), err.clone()), err);
        assert_eq!(compare(Comparison::General(CompareOp::Eq), &one, &err), err);
        assert_eq!(concat(&err, &one), err);
        assert_eq!(range(&one, &err, 10), err);
        assert_eq!(set_operation(SetOp::Union, &err, &one), err);
        assert_eq!(unary(UnaryOp::Minus, &err), err);
    }

    #[test]
    fn test_value_comparison() {
        let eq = |a: &TestItem<'static>, b: &TestItem<'static>| compare(Comparison::Value(CompareOp::Eq), a, b);
        assert_eq!(eq(&Item::Integer(1), &Item::Double(1.0)), Item::Boolean(true));
        assert_eq!(eq(&Item::empty(), &Item::Integer(1)), Item::empty());
        assert_eq!(
            eq(
                &Item::Sequence(vec![Item::Integer(1), Item::Integer(2)]),
                &Item::Integer(1)
            ),
            Item::Error(EvalError::cardinality("zero or one item", 2))
        );
        assert_eq!(
            eq(&Item::from("1"), &Item::Integer(1)),
            Item::Error(EvalError::mismatch("eq", "xs:string", "xs:integer"))
        );
        let lt = compare::<TestNode>(
            Comparison::Value(CompareOp::Lt),
            &Item::from("abc"),
            &Item::from("abd"),
        );
        assert_eq!(lt, Item::Boolean(true));
    }

    #[test]
    fn test_general_comparison_is_existential() {
        let tree = sample_tree();
        let eq = |a: &_, b: &_| compare(Comparison::General(CompareOp::Eq), a, b);
        let seq: TestItem = Item::Sequence(vec![Item::Integer(1), Item::Integer(2), Item::Integer(3)]);
        assert_eq!(eq(&seq, &Item::Integer(3)), Item::Boolean(true));
        assert_eq!(eq(&seq, &Item::Integer(4)), Item::Boolean(false));
        assert_eq!(eq(&seq, &Item::empty()), Item::Boolean(false));

        let nested: TestItem = Item::Array(vec![Item::Array(vec![Item::Integer(3)])]);
        assert_eq!(eq(&nested, &Item::Integer(3)), Item::Boolean(true));

        let price: TestItem = Item::Node(tree.node(7));
        let gt = compare(Comparison::General(CompareOp::Gt), &price, &Item::Integer(5));
        assert_eq!(gt, Item::Boolean(true));
        let title: TestItem = Item::Node(tree.node(5));
        assert_eq!(eq(&title, &Item::from("Dune")), Item::Boolean(true));
    }

    #[test]
    fn test_nan_compares_unequal() {
        let nan: TestItem = Item::Double(f64::NAN);
        let ne = compare(Comparison::Value(CompareOp::Ne), &nan, &nan);
        let eq = compare(Comparison::Value(CompareOp::Eq), &nan, &nan);
        assert_eq!((ne, eq), (Item::Boolean(true), Item::Boolean(false)));
    }

    #[test]
    fn test_node_comparison() {
        let tree = sample_tree();
        let a: TestItem = Item::Node(tree.node(2));
        let b: TestItem = Item::Node(tree.node(10));
        let is = compare(Comparison::Node(NodeComparison::Is), &a, &a);
        assert_eq!(is, Item::Boolean(true));
        let before = compare(Comparison::Node(NodeComparison::Precedes), &a, &b);
        assert_eq!(before, Item::Boolean(true));
        let after = compare(Comparison::Node(NodeComparison::Follows), &a, &b);
        assert_eq!(after, Item::Boolean(false));
        assert!(compare(Comparison::Node(NodeComparison::Is), &a, &Item::Integer(1)).is_error());
    }

    #[test]
    fn test_ranges() {
        let r = |a: i64, b: i64| range::<TestNode>(&Item::Integer(a), &Item::Integer(b), 100);
        assert_eq!(
            r(1, 5),
            Item::Sequence((1..=5).map(Item::Integer).collect())
        );
        assert_eq!(r(5, 1), Item::empty());
        assert_eq!(r(3, 3), Item::Integer(3));
        assert_eq!(
            r(1, 1000),
            Item::Error(EvalError::RangeTooLarge {
                length: 1000,
                limit: 100
            })
        );
        assert!(range::<TestNode>(&Item::Double(1.0), &Item::Integer(2), 100).is_error());
    }

    #[test]
    fn test_concat_and_unary() {
        let joined = concat::<TestNode>(&Item::Integer(1), &Item::Double(2.5));
        assert_eq!(joined, Item::from("12.5"));
        assert_eq!(concat::<TestNode>(&Item::empty(), &Item::from("x")), Item::from("x"));
        let pair = Item::Sequence(vec![Item::Integer(1), Item::Integer(2)]);
        assert_eq!(concat::<TestNode>(&pair, &Item::from("a")), Item::from("1 2a"));
        let array = Item::Array(vec![Item::Integer(1), pair.clone()]);
        assert_eq!(concat::<TestNode>(&Item::from("a"), &array), Item::from("a1 1 2"));
        let map = Item::Map(crate::types::ItemMap::new());
        assert!(concat::<TestNode>(&map, &Item::from("a")).is_error());
        assert_eq!(unary::<TestNode>(UnaryOp::Minus, &Item::Integer(3)), Item::Integer(-3));
        assert!(unary::<TestNode>(UnaryOp::Minus, &Item::from("3")).is_error());
    }

    #[test]
    fn test_set_operations_sort_and_dedupe() {
        let tree = sample_tree();
        let nodes = |ids: &[usize]| -> TestItem {
            Item::Sequence(ids.iter().map(|&id| Item::Node(tree.node(id))).collect())
        };
        let union = set_operation(SetOp::Union, &nodes(&[17, 2]), &nodes(&[10, 2]));
        assert_eq!(union, nodes(&[2, 10, 17]));
        let both = set_operation(SetOp::Intersect, &nodes(&[2, 10, 17]), &nodes(&[17, 2]));
        assert_eq!(both, nodes(&[2, 17]));
        let rest = set_operation(SetOp::Except, &nodes(&[2, 10, 17]), &nodes(&[10]));
        assert_eq!(rest, nodes(&[2, 17]));
        assert!(set_operation(SetOp::Union, &nodes(&[2]), &Item::Integer(1)).is_error());
    }
}
