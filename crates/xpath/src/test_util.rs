use std::sync::OnceLock;

use quarry_node::testing::{TestNode, TestTree, sample_tree};

use crate::context::Context;
use crate::engine::evaluate;
use crate::functions::Registry;
use crate::parser::parse_expression;
use crate::types::Item;

pub(crate) fn tree() -> &'static TestTree {
    static TREE: OnceLock<TestTree> = OnceLock::new();
    TREE.get_or_init(sample_tree)
}

/// Parses and evaluates `source` against the sample library, with the
/// document node as context item.
pub(crate) fn eval(source: &str) -> Item<TestNode<'static>> {
    let expr = parse_expression(source)
        .unwrap_or_else(|e| panic!("failed to parse {:?}: {}", source, e));
    let registry = Registry::with_builtins();
    let mut ctx = Context::new(&registry).with_document(tree().document());
    evaluate(&expr, &mut ctx)
}
