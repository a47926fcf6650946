use std::fmt;
use std::sync::Arc;

use super::Item;
use crate::ast::{Expr, Param, QName, SequenceType};

/// A function value.
#[derive(Debug, Clone, PartialEq)]
pub enum Function<N> {
    /// `name#arity`, resolved against the registry when called.
    Named { name: QName, arity: usize },
    /// `function($a) { ... }`. Nothing is captured: the body sees the
    /// variables of whoever calls it, plus its parameters.
    Inline {
        params: Vec<Param>,
        return_type: Option<SequenceType>,
        body: Arc<Expr>,
    },
    /// A call with `?` placeholders; `None` slots are filled in order by
    /// the arguments of a later call.
    Partial {
        base: Box<Item<N>>,
        bound: Vec<Option<Item<N>>>,
    },
}

impl<N> Function<N> {
    pub fn named(name: QName, arity: usize) -> Self {
        Self::Named { name, arity }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Named { arity, .. } => *arity,
            Function::Inline { params, .. } => params.len(),
            Function::Partial { bound, .. } => bound.iter().filter(|slot| slot.is_none()).count(),
        }
    }

    pub fn name(&self) -> Option<&QName> {
        match self {
            Function::Named { name, .. } => Some(name),
            Function::Inline { .. } => None,
            Function::Partial { base, .. } => match base.as_ref() {
                Item::Function(f) => f.name(),
                _ => None,
            },
        }
    }
}

impl<N> fmt::Display for Function<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.name()) {
            (Function::Partial { .. }, Some(name)) => write!(f, "partial {}#{}", name, self.arity()),
            (Function::Partial { .. }, None) => write!(f, "partial (anonymous)#{}", self.arity()),
            (_, Some(name)) => write!(f, "{}#{}", name, self.arity()),
            (_, None) => write!(f, "(anonymous)#{}", self.arity()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        let count: Function<()> = Function::named(QName::local("count"), 1);
        assert_eq!(count.arity(), 1);
        assert_eq!(count.to_string(), "count#1");

        let partial: Function<()> = Function::Partial {
            base: Box::new(Item::Function(Function::named(QName::local("substring"), 3))),
            bound: vec![None, Some(Item::Integer(2)), None],
        };
        assert_eq!(partial.arity(), 2);
        assert_eq!(partial.to_string(), "partial substring#2");

        let inline: Function<()> = Function::Inline {
            params: vec![Param {
                name: QName::local("x"),
                ty: None,
            }],
            return_type: None,
            body: Arc::new(Expr::ContextItem),
        };
        assert_eq!(inline.to_string(), "(anonymous)#1");
    }
}
