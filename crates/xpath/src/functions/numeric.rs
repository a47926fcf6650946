use std::cmp::Ordering;

use quarry_node::Node;
use rust_decimal::Decimal;

use super::{Registry, double_arg, native, number_arg, round_half_up};
use crate::ast::{ArithmeticOp, AtomicType};
use crate::context::Context;
use crate::error::EvalError;
use crate::operators::{arithmetic_atomic, atomic_order};
use crate::types::{Atomic, Item, Numeric};

pub(super) fn register<N: Node>(registry: &mut Registry<N>) {
    registry.register("number", 0..=1, native!(number));
    registry.register("sum", 1..=2, native!(sum));
    registry.register("avg", 1..=1, native!(avg));
    registry.register("min", 1..=1, native!(min));
    registry.register("max", 1..=1, native!(max));
    registry.register("abs", 1..=1, native!(abs));
    registry.register("floor", 1..=1, native!(floor));
    registry.register("ceiling", 1..=1, native!(ceiling));
    registry.register("round", 1..=1, native!(round));
    registry.register("math:sqrt", 1..=1, native!(sqrt));
    registry.register("math:pi", 0..=0, native!(pi));
}

/// `number()` never fails on bad input: anything that is not a number is NaN.
fn number<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let value = match args.first() {
        Some(arg) => arg.atomize_optional()?,
        None => ctx.context_item()?.atomize_optional()?,
    };
    let number = value
        .and_then(|a| a.cast(AtomicType::Double).ok())
        .and_then(|a| match a {
            Atomic::Double(d) => Some(d),
            _ => None,
        })
        .unwrap_or(f64::NAN);
    Ok(Item::Double(number))
}

/// Atomized operands of an aggregate, with untyped values read as doubles.
fn aggregate_values<N: Node>(function: &str, item: &Item<N>) -> Result<Vec<Atomic>, EvalError> {
    item.atomize()?
        .into_iter()
        .map(|a| match a {
            Atomic::Untyped(_) => a.cast(AtomicType::Double),
            Atomic::String(_) | Atomic::Boolean(_) if function != "min" && function != "max" => {
                Err(EvalError::type_error(format!(
                    "{}() expects numbers, got {}",
                    function,
                    a.type_name()
                )))
            }
            other => Ok(other),
        })
        .collect()
}

fn total(values: Vec<Atomic>) -> Result<Option<Atomic>, EvalError> {
    let mut values = values.into_iter();
    let Some(first) = values.next() else {
        return Ok(None);
    };
    values
        .try_fold(first, |acc, v| arithmetic_atomic(ArithmeticOp::Add, &acc, &v))
        .map(Some)
}

fn sum<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    match total(aggregate_values("sum", &args[0])?)? {
        Some(result) => Ok(result.into()),
        None => Ok(args.get(1).cloned().unwrap_or(Item::Integer(0))),
    }
}

fn avg<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let values = aggregate_values("avg", &args[0])?;
    let count = Atomic::Integer(values.len() as i64);
    match total(values)? {
        Some(result) => Ok(arithmetic_atomic(ArithmeticOp::Div, &result, &count)?.into()),
        None => Ok(Item::empty()),
    }
}

fn extreme<N: Node>(function: &str, item: &Item<N>, keep: Ordering) -> Result<Item<N>, EvalError> {
    let mut best: Option<Atomic> = None;
    for value in aggregate_values(function, item)? {
        if matches!(value, Atomic::Double(d) if d.is_nan()) {
            return Ok(Item::Double(f64::NAN));
        }
        best = Some(match best {
            None => value,
            Some(current) => match atomic_order(function, &value, &current)? {
                Some(order) if order == keep => value,
                _ => current,
            },
        });
    }
    Ok(best.map(Item::from).unwrap_or_else(Item::empty))
}

fn min<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    extreme("min", &args[0], Ordering::Less)
}

fn max<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    extreme("max", &args[0], Ordering::Greater)
}

/// Applies a rounding function while keeping the argument's numeric type.
fn map_numeric<N: Node>(
    function: &str,
    item: &Item<N>,
    on_integer: fn(i64) -> Option<i64>,
    on_decimal: fn(Decimal) -> Decimal,
    on_double: fn(f64) -> f64,
) -> Result<Item<N>, EvalError> {
    let result = match number_arg(function, item)? {
        None => return Ok(Item::empty()),
        Some(Numeric::Integer(i)) => {
            Numeric::Integer(on_integer(i).ok_or_else(|| EvalError::Overflow {
                op: function.to_string(),
            })?)
        }
        Some(Numeric::Decimal(d)) => Numeric::Decimal(on_decimal(d)),
        Some(Numeric::Double(d)) => Numeric::Double(on_double(d)),
    };
    Ok(Atomic::from(result).into())
}

fn abs<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    map_numeric("abs", &args[0], i64::checked_abs, |d| d.abs(), f64::abs)
}

fn floor<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    map_numeric("floor", &args[0], Some, |d| d.floor(), f64::floor)
}

fn ceiling<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    map_numeric("ceiling", &args[0], Some, |d| d.ceil(), f64::ceil)
}

fn round<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    map_numeric(
        "round",
        &args[0],
        Some,
        |d| (d + Decimal::new(5, 1)).floor(),
        round_half_up,
    )
}

fn sqrt<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    if args[0].is_empty_sequence() {
        return Ok(Item::empty());
    }
    Ok(Item::Double(double_arg("math:sqrt", &args[0])?.sqrt()))
}

fn pi<N: Node>(_: &mut Context<'_, N>, _: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Double(std::f64::consts::PI))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::eval;

    #[test]
    fn test_number() {
        assert_eq!(eval("number('12')"), Item::Double(12.0));
        assert_eq!(eval("number(//book[1]/price)"), Item::Double(9.5));
        assert!(matches!(eval("number('twelve')"), Item::Double(d) if d.is_nan()));
        assert!(matches!(eval("number(())"), Item::Double(d) if d.is_nan()));
        assert_eq!(eval("//book[2]/price/number()"), Item::Double(4.0));
    }

    #[test]
    fn test_sum_and_avg() {
        assert_eq!(eval("sum((1, 2, 3))"), Item::Integer(6));
        assert_eq!(eval("sum(())"), Item::Integer(0));
        assert_eq!(eval("sum((), 'none')"), Item::from("none"));
        assert_eq!(eval("sum(//price)"), Item::Double(13.5));
        assert_eq!(eval("sum((1, 2.5))"), Item::Decimal(Decimal::new(35, 1)));
        let avg = eval("avg((1, 2, 4))");
        assert!(matches!(avg, Item::Decimal(d) if d.round_dp(4) == Decimal::new(23333, 4)));
        assert_eq!(eval("avg(())").count(), 0);
        assert!(eval("sum(('a', 1))").is_error());
    }

    #[test]
    fn test_min_max() {
        assert_eq!(eval("max((3, 1, 2))"), Item::Integer(3));
        assert_eq!(eval("min((3, 1.5, 2))"), Item::Decimal(Decimal::new(15, 1)));
        assert_eq!(eval("max(('b', 'a'))"), Item::from("b"));
        assert_eq!(eval("min(//price)"), Item::Double(4.0));
        assert!(matches!(eval("max((1, 0e0 div 0))"), Item::Double(d) if d.is_nan()));
        assert!(eval("max((1, 'a'))").is_error());
        assert_eq!(eval("min(())").count(), 0);
    }

    #[test]
    fn test_rounding_keeps_type() {
        assert_eq!(eval("abs(-3)"), Item::Integer(3));
        assert_eq!(eval("floor(2.7)"), Item::Decimal(Decimal::from(2)));
        assert_eq!(eval("ceiling(-2.5e0)"), Item::Double(-2.0));
        assert_eq!(eval("round(2.5)"), Item::Decimal(Decimal::from(3)));
        assert_eq!(eval("round(-2.5)"), Item::Decimal(Decimal::from(-2)));
        assert_eq!(eval("round(-2.5e0)"), Item::Double(-2.0));
        assert_eq!(eval("round(0.49999999999999994e0)"), Item::Double(0.0));
        assert_eq!(eval("floor(())").count(), 0);
    }

    #[test]
    fn test_math() {
        assert_eq!(eval("math:sqrt(16)"), Item::Double(4.0));
        assert_eq!(eval("math:pi()"), Item::Double(std::f64::consts::PI));
    }
}
