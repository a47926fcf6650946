use quarry_node::Node;

use super::{Registry, double_arg, native, round_half_up, string_arg};
use crate::context::Context;
use crate::error::EvalError;
use crate::types::Item;

pub(super) fn register<N: Node>(registry: &mut Registry<N>) {
    registry.register("string", 0..=1, native!(string));
    registry.register("concat", 2..=usize::MAX, native!(concat));
    registry.register("string-length", 0..=1, native!(string_length));
    registry.register("normalize-space", 0..=1, native!(normalize_space));
    registry.register("contains", 2..=2, native!(contains));
    registry.register("starts-with", 2..=2, native!(starts_with));
    registry.register("ends-with", 2..=2, native!(ends_with));
    registry.register("substring-before", 2..=2, native!(substring_before));
    registry.register("substring-after", 2..=2, native!(substring_after));
    registry.register("upper-case", 1..=1, native!(upper_case));
    registry.register("lower-case", 1..=1, native!(lower_case));
    registry.register("string-join", 1..=2, native!(string_join));
    registry.register("substring", 2..=3, native!(substring));
}

/// The argument, or the context item when the argument is omitted.
fn arg_or_context<'a, N: Node>(ctx: &'a Context<'_, N>, args: &'a [Item<N>]) -> Result<&'a Item<N>, EvalError> {
    match args.first() {
        Some(arg) => Ok(arg),
        None => ctx.context_item(),
    }
}

fn string<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::String(arg_or_context(ctx, args)?.string_value()?))
}

fn concat<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&string_arg(arg)?);
    }
    Ok(Item::String(out))
}

fn string_length<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let text = arg_or_context(ctx, args)?.string_value()?;
    Ok(Item::Integer(text.chars().count() as i64))
}

fn normalize_space<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let text = arg_or_context(ctx, args)?.string_value()?;
    Ok(Item::String(text.split_whitespace().collect::<Vec<_>>().join(" ")))
}

fn contains<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(string_arg(&args[0])?.contains(&string_arg(&args[1])?)))
}

fn starts_with<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(string_arg(&args[0])?.starts_with(&string_arg(&args[1])?)))
}

fn ends_with<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::Boolean(string_arg(&args[0])?.ends_with(&string_arg(&args[1])?)))
}

fn substring_before<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let text = string_arg(&args[0])?;
    let pattern = string_arg(&args[1])?;
    let before = text.find(&pattern).map(|i| &text[..i]).unwrap_or_default();
    Ok(Item::String(before.to_string()))
}

fn substring_after<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let text = string_arg(&args[0])?;
    let pattern = string_arg(&args[1])?;
    let after = text
        .find(&pattern)
        .map(|i| &text[i + pattern.len()..])
        .unwrap_or_default();
    Ok(Item::String(after.to_string()))
}

fn upper_case<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::String(string_arg(&args[0])?.to_uppercase()))
}

fn lower_case<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    Ok(Item::String(string_arg(&args[0])?.to_lowercase()))
}

fn string_join<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let separator = match args.get(1) {
        Some(sep) => string_arg(sep)?,
        None => String::new(),
    };
    let parts: Vec<String> = args[0]
        .atomize()?
        .iter()
        .map(|a| a.to_string_value())
        .collect();
    Ok(Item::String(parts.join(&separator)))
}

/// Characters at positions `p` with `round(start) <= p < round(start) + round(length)`.
fn substring<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let text = string_arg(&args[0])?;
    let start = round_half_up(double_arg("substring", &args[1])?);
    let end = match args.get(2) {
        Some(length) => start + round_half_up(double_arg("substring", length)?),
        None => f64::INFINITY,
    };
    let out: String = text
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(Item::String(out))
}
