use quarry_node::Node;

use super::{Registry, native};
use crate::context::Context;
use crate::error::EvalError;
use crate::types::Item;

pub(super) fn register<N: Node>(registry: &mut Registry<N>) {
    registry.register("true", 0..=0, native!(fn_true));
    registry.register("false", 0..=0, native!(fn_false));
    registry.register("not", 1..=1, native!(fn_not));
    registry.register("boolean", 1..=1, native!(fn_boolean));
}

fn fn_true<N: Node>(_: &mut Context<'_, N>, _: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(true))
}

fn fn_false<N: Node>(_: &mut Context<'_, N>, _: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(false))
}

fn fn_not<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(!args[0].effective_boolean_value()?))
}

fn fn_boolean<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(args[0].effective_boolean_value()?))
}
