//! The mutable evaluation environment.
//!
//! Variable scopes live in an arena: each scope points at its parent by
//! index, and leaving a scope truncates the arena back to where it was.
//! Function values never hold on to a scope: an inline function body runs
//! in a child scope of whichever context calls it.

use std::collections::HashMap;

use quarry_node::Node;

use crate::ast::QName;
use crate::config::EvaluatorConfig;
use crate::error::EvalError;
use crate::functions::Registry;
use crate::types::Item;

/// The context item with its position in the sequence being processed.
#[derive(Debug, Clone, PartialEq)]
pub struct Focus<N> {
    pub item: Item<N>,
    /// 1-based.
    pub position: usize,
    pub size: usize,
}

impl<N> Focus<N> {
    pub fn new(item: Item<N>, position: usize, size: usize) -> Self {
        Self {
            item,
            position,
            size,
        }
    }

    pub fn single(item: Item<N>) -> Self {
        Self::new(item, 1, 1)
    }
}

#[derive(Debug)]
struct Scope<N> {
    parent: Option<usize>,
    vars: HashMap<QName, Item<N>>,
}

pub struct Context<'r, N> {
    scopes: Vec<Scope<N>>,
    current: usize,
    focus: Option<Focus<N>>,
    root: Option<N>,
    registry: &'r Registry<N>,
    config: EvaluatorConfig,
    depth: usize,
}

impl<'r, N: Node> Context<'r, N> {
    pub fn new(registry: &'r Registry<N>) -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                vars: HashMap::new(),
            }],
            current: 0,
            focus: None,
            root: None,
            registry,
            config: EvaluatorConfig::default(),
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the document root and makes it the context item.
    pub fn with_document(mut self, root: N) -> Self {
        self.set_document(root);
        self
    }

    pub fn set_document(&mut self, root: N) {
        self.root = Some(root);
        self.focus = Some(Focus::single(Item::Node(root)));
    }

    pub fn set_context_item(&mut self, item: Item<N>) {
        self.focus = Some(Focus::single(item));
    }

    pub fn root(&self) -> Option<N> {
        self.root
    }

    pub fn registry(&self) -> &'r Registry<N> {
        self.registry
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn focus(&self) -> Option<&Focus<N>> {
        self.focus.as_ref()
    }

    pub fn context_item(&self) -> Result<&Item<N>, EvalError> {
        self.focus
            .as_ref()
            .map(|f| &f.item)
            .ok_or(EvalError::UndefinedContext)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Binds a variable in the current scope, replacing any binding of the
    /// same name there.
    pub fn bind(&mut self, name: QName, value: Item<N>) {
        self.scopes[self.current].vars.insert(name, value);
    }

    /// Binds `name` given as text (`x` or `p:x`).
    pub fn set_variable(&mut self, name: &str, value: Item<N>) -> Result<(), EvalError> {
        let name = QName::parse(name.trim_start_matches('$'))?;
        self.bind(name, value);
        Ok(())
    }

    /// Resolves a variable, innermost scope first.
    pub fn lookup(&self, name: &QName) -> Option<&Item<N>> {
        let mut index = Some(self.current);
        while let Some(i) = index {
            let scope = &self.scopes[i];
            if let Some(value) = scope.vars.get(name) {
                return Some(value);
            }
            index = scope.parent;
        }
        None
    }

    /// Runs `f` in a fresh child scope that is discarded afterwards.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let index = self.scopes.len();
        let saved = self.current;
        self.scopes.push(Scope {
            parent: Some(saved),
            vars: HashMap::new(),
        });
        self.current = index;
        let result = f(self);
        self.scopes.truncate(index);
        self.current = saved;
        result
    }

    /// Runs `f` with the focus replaced; `None` leaves no context item.
    pub fn with_focus<T>(&mut self, focus: Option<Focus<N>>, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.focus, focus);
        let result = f(self);
        self.focus = saved;
        result
    }

    /// Runs `f` one call level deeper, failing once the configured depth is reached.
    pub fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        if self.depth >= self.config.max_depth {
            return Err(EvalError::RecursionLimit(self.config.max_depth));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}
