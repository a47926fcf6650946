use std::cmp::Ordering;

use quarry_node::Node;

use super::{Registry, double_arg, native, round_half_up};
use crate::context::Context;
use crate::error::EvalError;
use crate::operators::atomic_order;
use crate::types::{Atomic, Item};

pub(super) fn register<N: Node>(registry: &mut Registry<N>) {
    registry.register("count", 1..=1, native!(count));
    registry.register("empty", 1..=1, native!(empty));
    registry.register("exists", 1..=1, native!(exists));
    registry.register("head", 1..=1, native!(head));
    registry.register("tail", 1..=1, native!(tail));
    registry.register("reverse", 1..=1, native!(reverse));
    registry.register("distinct-values", 1..=1, native!(distinct_values));
    registry.register("subsequence", 2..=3, native!(subsequence));
    registry.register("index-of", 2..=2, native!(index_of));
}

fn count<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Integer(args[0].count() as i64))
}

fn empty<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(args[0].is_empty_sequence()))
}

fn exists<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(!args[0].is_empty_sequence()))
}

fn head<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(args[0]
        .as_slice()
        .first()
        .cloned()
        .unwrap_or_else(Item::empty))
}

fn tail<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let items = args[0].as_slice();
    Ok(Item::sequence(items.iter().skip(1).cloned().collect()))
}

fn reverse<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut items = args[0].clone().into_items();
    items.reverse();
    Ok(Item::sequence(items))
}

/// Equality as `distinct-values` and `index-of` see it: NaN equals NaN and
/// incomparable values are simply different.
fn same_value(a: &Atomic, b: &Atomic) -> bool {
    match atomic_order("eq", a, b) {
        Ok(Some(order)) => order == Ordering::Equal,
        Ok(None) => matches!((a, b), (Atomic::Double(x), Atomic::Double(y)) if x.is_nan() && y.is_nan()),
        Err(_) => false,
    }
}

fn distinct_values<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut seen: Vec<Atomic> = Vec::new();
    for value in args[0].atomize()? {
        if !seen.iter().any(|s| same_value(s, &value)) {
            seen.push(value);
        }
    }
    Ok(Item::sequence(seen.into_iter().map(Item::from).collect()))
}

fn subsequence<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let start = round_half_up(double_arg("subsequence", &args[1])?);
    let end = match args.get(2) {
        Some(length) => start + round_half_up(double_arg("subsequence", length)?),
        None => f64::INFINITY,
    };
    let items = args[0]
        .as_slice()
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let position = (i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, item)| item.clone())
        .collect();
    Ok(Item::sequence(items))
}

fn index_of<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let Some(target) = args[1].atomize_optional()? else {
        return Err(EvalError::cardinality("exactly one search value", 0));
    };
    let positions = args[0]
        .atomize()?
        .iter()
        .enumerate()
        .filter(|(_, value)| same_value(value, &target))
        .map(|(i, _)| Item::Integer(i as i64 + 1))
        .collect();
    Ok(Item::sequence(positions))
}

#[cfg(test)]
mod tests {
    use crate::test_util::eval;
    use crate::types::Item;

    #[test]
    fn test_cardinality_functions() {
        assert_eq!(eval("count((1, 2, 3))"), Item::Integer(3));
        assert_eq!(eval("count(())"), Item::Integer(0));
        assert_eq!(eval("empty(())"), Item::Boolean(true));
        assert_eq!(eval("exists(//book)"), Item::Boolean(true));
        assert_eq!(eval("head((4, 5))"), Item::Integer(4));
        assert_eq!(eval("head(())").count(), 0);
        assert_eq!(eval("tail((4, 5, 6))").to_string(), "(5, 6)");
        assert_eq!(eval("reverse(1 to 3)").to_string(), "(3, 2, 1)");
    }

    #[test]
    fn test_distinct_values() {
        assert_eq!(
            eval("distinct-values((1, 2.0, 1e0, 'a', 'a', 3))").to_string(),
            "(1, 2, \"a\", 3)"
        );
        assert_eq!(
            eval("count(distinct-values((0e0 div 0, 0e0 div 0)))"),
            Item::Integer(1)
        );
    }

    #[test]
    fn test_subsequence() {
        assert_eq!(eval("subsequence(1 to 5, 2, 2)").to_string(), "(2, 3)");
        assert_eq!(eval("subsequence(1 to 5, 4)").to_string(), "(4, 5)");
        assert_eq!(eval("subsequence(1 to 5, 1.5, 1)"), Item::Integer(2));
        assert_eq!(eval("subsequence(1 to 5, 0)").count(), 5);
    }

    #[test]
    fn test_index_of() {
        assert_eq!(eval("index-of((10, 20, 10), 10)").to_string(), "(1, 3)");
        assert_eq!(eval("index-of(('a', 'b'), 'c')").count(), 0);
    }
}
