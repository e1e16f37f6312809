use std::fmt;

use crate::ast::Block;
use crate::scope::ScopeId;

/// A user-defined function, bound to the scope it was declared in
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    /// Calls run in a fresh child of this scope, never of the caller's
    pub definition_scope: ScopeId,
}

impl Function {
    pub fn new(name: String, params: Vec<String>, body: Block, definition_scope: ScopeId) -> Self {
        Function {
            name,
            params,
            body,
            definition_scope,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fun {}({})", self.name, self.params.join(", "))
    }
}
