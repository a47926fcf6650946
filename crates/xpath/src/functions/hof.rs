//! Higher-order functions. Each one calls back into the evaluator through
//! [`call_function`], so inline functions, partial applications, maps and
//! arrays are all accepted wherever a function is expected.

use quarry_node::Node;

use super::{Registry, native};
use crate::context::Context;
use crate::engine::call_function;
use crate::error::EvalError;
use crate::types::Item;

pub(super) fn register<N: Node>(registry: &mut Registry<N>) {
    registry.register("for-each", 2..=2, native!(for_each));
    registry.register("filter", 2..=2, native!(filter));
    registry.register("fold-left", 3..=3, native!(fold_left));
    registry.register("fold-right", 3..=3, native!(fold_right));
}

fn apply<N: Node>(ctx: &mut Context<'_, N>, function: &Item<N>, args: Vec<Item<N>>) -> Result<Item<N>, EvalError> {
    call_function(ctx, function, args).into_result()
}

fn for_each<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut out = Vec::new();
    for item in args[0].as_slice() {
        out.push(apply(ctx, &args[1], vec![item.clone()])?);
    }
    Ok(Item::sequence(out))
}

fn filter<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut out = Vec::new();
    for item in args[0].as_slice() {
        match apply(ctx, &args[1], vec![item.clone()])? {
            Item::Boolean(true) => out.push(item.clone()),
            Item::Boolean(false) => {}
            other => {
                return Err(EvalError::type_error(format!(
                    "filter() predicate must return xs:boolean, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Item::sequence(out))
}

fn fold_left<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut acc = args[1].clone();
    for item in args[0].as_slice() {
        acc = apply(ctx, &args[2], vec![acc, item.clone()])?;
    }
    Ok(acc)
}

fn fold_right<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut acc = args[1].clone();
    for item in args[0].as_slice().iter().rev() {
        acc = apply(ctx, &args[2], vec![item.clone(), acc])?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::test_util::eval;
    use crate::types::Item;

    #[test]
    fn test_for_each() {
        assert_eq!(
            eval("for-each(1 to 3, function($x) { $x * $x })").to_string(),
            "(1, 4, 9)"
        );
        assert_eq!(
            eval("for-each(//title, string#1)").to_string(),
            "(\"Dune\", \"Emma\", \"Wired\")"
        );
        assert_eq!(
            eval("for-each((1, 2), substring('abc', ?, 1))").to_string(),
            "(\"a\", \"b\")"
        );
    }

    #[test]
    fn test_filter() {
        assert_eq!(
            eval("filter(1 to 6, function($n) { $n mod 2 = 0 })").to_string(),
            "(2, 4, 6)"
        );
        assert!(matches!(
            eval("filter(1 to 3, function($n) { $n })"),
            Item::Error(EvalError::TypeError(_))
        ));
    }

    #[test]
    fn test_folds() {
        assert_eq!(
            eval("fold-left(1 to 4, 0, function($acc, $x) { $acc + $x })"),
            Item::Integer(10)
        );
        assert_eq!(
            eval("fold-left(('a', 'b', 'c'), '', concat#2)"),
            Item::from("abc")
        );
        assert_eq!(
            eval("fold-right(('a', 'b', 'c'), '', concat#2)"),
            Item::from("abc")
        );
        assert_eq!(
            eval("fold-left((), 7, function($a, $b) { $a + $b })"),
            Item::Integer(7)
        );
    }

    #[test]
    fn test_callback_arity_is_checked() {
        assert!(matches!(
            eval("for-each(1 to 2, function($a, $b) { $a })"),
            Item::Error(EvalError::ArityMismatch { got: 1, .. })
        ));
    }
}
