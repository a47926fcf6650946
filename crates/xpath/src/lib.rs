//! An embeddable XPath-family expression interpreter.
//!
//! Source text goes through the [`lexer`], the precedence-climbing [`parser`]
//! and into an [`ast::Expr`], which [`evaluate`] walks against any tree that
//! implements [`Node`].
//!
//! # Key Types
//!
//! - [`Expr`]: the syntax tree; its `Display` is the canonical form
//! - [`Item`]: every runtime value, including [`Item::Error`]
//! - [`Context`]: variables, focus, document root and the builtin [`Registry`]
//!
//! # Example
//!
//! ```
//! use quarry_node::testing::sample_tree;
//! use quarry_xpath::{Context, Item, Registry, run};
//!
//! let tree = sample_tree();
//! let registry = Registry::with_builtins();
//! let mut ctx = Context::new(&registry).with_document(tree.document());
//! let titles = run("count(//book/title)", &mut ctx).unwrap();
//! assert_eq!(titles, Item::Integer(2));
//! ```

pub mod ast;
pub mod axes;
mod config;
mod context;
pub mod engine;
mod error;
pub mod functions;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod token;
pub mod types;

#[cfg(test)]
mod test_util;

pub use ast::{Expr, QName};
pub use config::EvaluatorConfig;
pub use context::{Context, Focus};
pub use engine::{call_function, evaluate, instance_of};
pub use error::{EvalError, ParseError, XPathError};
pub use functions::{Builtin, NativeFn, Registry};
pub use parser::{parse, parse_expression};
pub use types::{Atomic, Item};

pub use quarry_node::{Node, NodeKind};

/// Parses and evaluates `source` in one go. Evaluation errors come back as
/// [`XPathError::Eval`] instead of an [`Item::Error`].
pub fn run<N: Node>(source: &str, ctx: &mut Context<'_, N>) -> Result<Item<N>, XPathError> {
    let expr = parse_expression(source)?;
    Ok(evaluate(&expr, ctx).into_result()?)
}
