//! `map:*` and `array:*` functions.

use quarry_node::Node;

use super::{Registry, array_arg, map_arg, native};
use crate::context::Context;
use crate::engine::array_member;
use crate::error::EvalError;
use crate::types::{Atomic, Item, MapKey};

pub(super) fn register<N: Node>(registry: &mut Registry<N>) {
    registry.register("map:size", 1..=1, native!(map_size));
    registry.register("map:keys", 1..=1, native!(map_keys));
    registry.register("map:get", 2..=2, native!(map_get));
    registry.register("map:contains", 2..=2, native!(map_contains));
    registry.register("map:put", 3..=3, native!(map_put));
    registry.register("array:size", 1..=1, native!(array_size));
    registry.register("array:get", 2..=2, native!(array_get));
    registry.register("array:append", 2..=2, native!(array_append));
}

fn key_arg<N: Node>(item: &Item<N>) -> Result<MapKey, EvalError> {
    item.atomize_optional()?
        .map(MapKey::from_atomic)
        .ok_or_else(|| EvalError::cardinality("exactly one key", 0))
}

fn map_size<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Integer(map_arg("map:size", &args[0])?.len() as i64))
}

fn map_keys<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let map = map_arg("map:keys", &args[0])?;
    Ok(Item::sequence(
        map.keys().map(|k| Item::from(k.to_atomic())).collect(),
    ))
}

fn map_get<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let map = map_arg("map:get", &args[0])?;
    let key = key_arg(&args[1])?;
    Ok(map.get(&key).cloned().unwrap_or_else(Item::empty))
}

fn map_contains<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let map = map_arg("map:contains", &args[0])?;
    Ok(Item::Boolean(map.contains_key(&key_arg(&args[1])?)))
}

fn map_put<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let map = map_arg("map:put", &args[0])?;
    Ok(Item::Map(map.put(key_arg(&args[1])?, args[2].clone())))
}

fn array_size<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Integer(array_arg("array:size", &args[0])?.len() as i64))
}

fn array_get<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let members = array_arg("array:get", &args[0])?;
    match args[1].atomize_optional()? {
        Some(Atomic::Integer(index)) => array_member(members, index),
        other => Err(EvalError::type_error(format!(
            "array:get() expects an xs:integer position, got {}",
            other.map_or("empty-sequence()", |a| a.type_name())
        ))),
    }
}

fn array_append<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut members = array_arg("array:append", &args[0])?.to_vec();
    members.push(args[1].clone());
    Ok(Item::Array(members))
}
