use quarry_node::Node;

use super::{Registry, native, string_arg};
use crate::context::Context;
use crate::error::EvalError;
use crate::types::Item;

pub(super) fn register<N: Node>(registry: &mut Registry<N>) {
    registry.register("position", 0..=0, native!(position));
    registry.register("last", 0..=0, native!(last));
    registry.register("name", 0..=1, native!(name));
    registry.register("local-name", 0..=1, native!(local_name));
    registry.register("data", 0..=1, native!(data));
    registry.register("root", 0..=1, native!(root));
    registry.register("error", 0..=2, native!(error));
}

fn position<N: Node>(ctx: &mut Context<'_, N>, _: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let focus = ctx.focus().ok_or(EvalError::UndefinedContext)?;
    Ok(Item::Integer(focus.position as i64))
}

fn last<N: Node>(ctx: &mut Context<'_, N>, _: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let focus = ctx.focus().ok_or(EvalError::UndefinedContext)?;
    Ok(Item::Integer(focus.size as i64))
}

/// The node argument, or the context item when omitted. `None` for `()`.
fn node_arg<N: Node>(function: &str, ctx: &Context<'_, N>, args: &[Item<N>]) -> Result<Option<N>, EvalError> {
    let item = match args.first() {
        Some(arg) => arg,
        None => ctx.context_item()?,
    };
    match item.as_slice() {
        [] => Ok(None),
        [Item::Node(node)] => Ok(Some(*node)),
        [other] => Err(EvalError::type_error(format!(
            "{}() expects a node, got {}",
            function,
            other.type_name()
        ))),
        items => Err(EvalError::cardinality("zero or one node", items.len())),
    }
}

fn name<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let node = node_arg("name", ctx, args)?;
    let text = node
        .and_then(|n| n.name().map(|q| q.to_string()))
        .unwrap_or_default();
    Ok(Item::String(text))
}

fn local_name<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let node = node_arg("local-name", ctx, args)?;
    let text = node
        .and_then(|n| n.name().map(|q| q.local_part.to_string()))
        .unwrap_or_default();
    Ok(Item::String(text))
}

fn data<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let item = match args.first() {
        Some(arg) => arg,
        None => ctx.context_item()?,
    };
    Ok(Item::sequence(
        item.atomize()?.into_iter().map(Item::from).collect(),
    ))
}

fn root<N: Node>(ctx: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let Some(mut node) = node_arg("root", ctx, args)? else {
        return Ok(Item::empty());
    };
    while let Some(parent) = node.parent() {
        node = parent;
    }
    Ok(Item::Node(node))
}

/// `error()`, `error(code)`, `error(code, description)`.
fn error<N: Node>(_: &mut Context<'_, N>, args: &[Item<N>]) -> Result<Item<N>, EvalError> {
    let code = match args.first() {
        Some(code) if !code.is_empty_sequence() => string_arg(code)?,
        _ => "FOER0000".to_string(),
    };
    let message = match args.get(1) {
        Some(description) => string_arg(description)?,
        None => "error raised by fn:error".to_string(),
    };
    Err(EvalError::User { code, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::eval;
    use quarry_node::NodeKind;

    #[test]
    fn test_position_and_last() {
        assert_eq!(eval("(//title)[last()]/string()"), Item::from("Wired"));
        assert_eq!(eval("//book[position() = 2]/@id/string()"), Item::from("b2"));
        assert_eq!(eval("(5, 6, 7) ! position()").to_string(), "(1, 2, 3)");
        assert_eq!(eval("count(/library/*[position() < last()])"), Item::Integer(2));
    }

    #[test]
    fn test_names() {
        assert_eq!(eval("name(/library)"), Item::from("library"));
        assert_eq!(eval("//book[1]/@lang/local-name()"), Item::from("lang"));
        assert_eq!(eval("name(())"), Item::from(""));
        assert_eq!(eval("//book[1]/title/text()/name()"), Item::from(""));
        assert!(eval("name(1)").is_error());
    }

    #[test]
    fn test_data_and_root() {
        assert_eq!(eval("data(//book[1]/@id)"), Item::from("b1"));
        assert_eq!(eval("data((1, 'a'))").to_string(), "(1, \"a\")");
        let root = eval("root((//title)[1])");
        assert!(matches!(root, Item::Node(n) if n.kind() == NodeKind::Document));
        assert!(eval("root(//title[1])").is_error());
        assert_eq!(eval("root(())").count(), 0);
    }

    #[test]
    fn test_error() {
        assert_eq!(
            eval("error('E1', 'bad input')"),
            Item::Error(EvalError::User {
                code: "E1".into(),
                message: "bad input".into()
            })
        );
        assert!(matches!(
            eval("1 + error()"),
            Item::Error(EvalError::User { code, .. }) if code == "FOER0000"
        ));
    }
}
