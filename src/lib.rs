//! Host-side pieces around the expression engine: an XML document adapter
//! and the error type of the `quarry` command.
//!
//! The engine itself lives in [`quarry_xpath`] and is re-exported here.

pub mod error;
pub mod xml;

pub use error::CliError;
pub use xml::{XmlDocument, XmlNode};

pub use quarry_node::{Node, NodeKind};
pub use quarry_xpath::{
    Context, EvalError, EvaluatorConfig, Item, Registry, XPathError, evaluate, parse_expression,
    run,
};
