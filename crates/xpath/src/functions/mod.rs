//! The builtin function registry.
//!
//! A [`Registry`] is an explicit value: build one with
//! [`Registry::with_builtins`], add host functions with
//! [`Registry::register`], and hand a reference to each
//! [`Context`](crate::Context).

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

use quarry_node::Node;

use crate::ast::QName;
use crate::context::Context;
use crate::error::EvalError;
use crate::types::{Atomic, Item, ItemMap, Numeric};

mod boolean;
mod collections;
mod core;
mod hof;
mod numeric;
mod sequence;
mod string;

/// A native function. Arguments arrive evaluated and already checked
/// against the registered arity; an error is returned as [`Item::Error`].
pub type NativeFn<N> = fn(&mut Context<'_, N>, &[Item<N>]) -> Item<N>;

/// Registers a builtin written as `fn(ctx, args) -> Result<Item, EvalError>`.
macro_rules! native {
    ($f:path) => {{
        fn wrapper<N: quarry_node::Node>(
            ctx: &mut $crate::Context<'_, N>,
            args: &[$crate::Item<N>],
        ) -> $crate::Item<N> {
            $f(ctx, args).into()
        }
        wrapper::<N> as $crate::functions::NativeFn<N>
    }};
}
pub(crate) use native;

pub struct Builtin<N> {
    pub name: String,
    pub arity: RangeInclusive<usize>,
    pub func: NativeFn<N>,
}

impl<N> Builtin<N> {
    /// The accepted argument counts, as shown in arity errors.
    pub fn describe_arity(&self) -> String {
        let (min, max) = (*self.arity.start(), *self.arity.end());
        if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("{} or more", min)
        } else if max == min + 1 {
            format!("{} or {}", min, max)
        } else {
            format!("{} to {}", min, max)
        }
    }
}

impl<N> fmt::Debug for Builtin<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

pub struct Registry<N> {
    functions: HashMap<String, Builtin<N>>,
}

impl<N> Registry<N> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Adds or replaces a function. Names in the default function
    /// namespace are registered without the `fn:` prefix.
    pub fn register(&mut self, name: &str, arity: RangeInclusive<usize>, func: NativeFn<N>) {
        let name = name.strip_prefix("fn:").unwrap_or(name).to_string();
        self.functions.insert(
            name.clone(),
            Builtin {
                name,
                arity,
                func,
            },
        );
    }

    /// Looks a function up by its lexical name, with or without `fn:`.
    pub fn lookup(&self, name: &str) -> Option<&Builtin<N>> {
        self.functions.get(name.strip_prefix("fn:").unwrap_or(name))
    }

    pub fn resolve(&self, name: &QName) -> Option<&Builtin<N>> {
        match name.prefix.as_deref() {
            None | Some("fn") => self.functions.get(&name.local),
            Some(_) => self.functions.get(&name.to_string()),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl<N: Node> Registry<N> {
    /// A registry holding the core function library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        boolean::register(&mut registry);
        sequence::register(&mut registry);
        string::register(&mut registry);
        numeric::register(&mut registry);
        core::register(&mut registry);
        hof::register(&mut registry);
        collections::register(&mut registry);
        registry
    }
}

impl<N> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for Registry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.names())
            .finish()
    }
}

// --- argument helpers shared by the builtin modules ---

/// The string value of an optional atomic argument; empty for `()`.
fn string_arg<N: Node>(item: &Item<N>) -> Result<String, EvalError> {
    Ok(item
        .atomize_optional()?
        .map(|a| a.to_string_value())
        .unwrap_or_default())
}

/// An optional numeric argument. Untyped values are read as doubles.
fn number_arg<N: Node>(function: &str, item: &Item<N>) -> Result<Option<Numeric>, EvalError> {
    match item.atomize_optional()? {
        None => Ok(None),
        Some(Atomic::Integer(i)) => Ok(Some(Numeric::Integer(i))),
        Some(Atomic::Decimal(d)) => Ok(Some(Numeric::Decimal(d))),
        Some(Atomic::Double(d)) => Ok(Some(Numeric::Double(d))),
        Some(a @ Atomic::Untyped(_)) => a.to_numeric(function, &a).map(Some),
        Some(other) => Err(EvalError::type_error(format!(
            "{}() expects a number, got {}",
            function,
            other.type_name()
        ))),
    }
}

/// A required numeric argument as a double.
fn double_arg<N: Node>(function: &str, item: &Item<N>) -> Result<f64, EvalError> {
    number_arg(function, item)?
        .map(Numeric::to_f64)
        .ok_or_else(|| EvalError::cardinality("exactly one number", 0))
}

fn map_arg<'a, N>(function: &str, item: &'a Item<N>) -> Result<&'a ItemMap<N>, EvalError> {
    match item {
        Item::Map(map) => Ok(map),
        other => Err(EvalError::type_error(format!(
            "{}() expects a map, got {}",
            function,
            other.type_name()
        ))),
    }
}

fn array_arg<'a, N>(function: &str, item: &'a Item<N>) -> Result<&'a [Item<N>], EvalError> {
    match item {
        Item::Array(members) => Ok(members),
        other => Err(EvalError::type_error(format!(
            "{}() expects an array, got {}",
            function,
            other.type_name()
        ))),
    }
}

/// Rounds half towards positive infinity, as `fn:round` does.
fn round_half_up(x: f64) -> f64 {
    let rounded = x.round();
    if (rounded - x).abs() == 0.5 { x.ceil() } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_node::testing::TestNode;

    fn answer<N: Node>(_: &mut Context<'_, N>, _: &[Item<N>]) -> Item<N> {
        Item::Integer(42)
    }

    #[test]
    fn test_lookup_strips_default_prefix() {
        let registry: Registry<TestNode> = Registry::with_builtins();
        assert!(registry.lookup("count").is_some());
        assert!(registry.lookup("fn:count").is_some());
        assert!(registry.lookup("map:size").is_some());
        assert!(registry.lookup("size").is_none());
        assert!(registry.resolve(&QName::prefixed("fn", "count")).is_some());
        assert!(registry.resolve(&QName::prefixed("math", "pi")).is_some());
        assert!(registry.resolve(&QName::local("no-such-function")).is_none());
    }

    #[test]
    fn test_register_host_function() {
        let mut registry: Registry<TestNode> = Registry::new();
        assert!(registry.is_empty());
        registry.register("fn:answer", 0..=0, answer);
        registry.register("ext:answer", 0..=0, answer);
        assert_eq!(registry.names(), vec!["answer", "ext:answer"]);

        let builtin = registry.lookup("answer").map(|b| (b.name.clone(), b.describe_arity()));
        assert_eq!(builtin, Some(("answer".to_string(), "0".to_string())));
        let mut ctx = Context::new(&registry);
        let func = registry.lookup("answer").map(|b| b.func);
        assert_eq!(func.map(|f| f(&mut ctx, &[])), Some(Item::Integer(42)));
    }

    #[test]
    fn test_describe_arity() {
        let registry: Registry<TestNode> = Registry::with_builtins();
        let arity = |name: &str| registry.lookup(name).map(|b| b.describe_arity());
        assert_eq!(arity("concat").as_deref(), Some("2 or more"));
        assert_eq!(arity("substring").as_deref(), Some("2 or 3"));
        assert_eq!(arity("error").as_deref(), Some("0 to 2"));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(0.49999999999999994), 0.0);
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(f64::INFINITY), f64::INFINITY);
        assert!(round_half_up(f64::NAN).is_nan());
    }
}
