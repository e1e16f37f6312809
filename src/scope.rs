//! Lexical scopes for the evaluator.
//!
//! Scopes live in an arena and refer to their parent by index. A block or a
//! function call pushes a scope on entry and pops it on exit, so scopes are
//! always freed in the reverse order they were created. A call frame's parent
//! is the function's definition scope, which may sit well below the top of the
//! arena; it is still alive because a function can only be reached by name
//! from inside the scope that declared it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Span;
use crate::error::{ExpError, ExpResult};
use crate::function::Function;
use crate::value::Value;

/// Index of a scope in a [`ScopeArena`]
pub type ScopeId = usize;

/// The outermost user scope; never popped
pub const GLOBAL_SCOPE: ScopeId = 0;

/// One level of bindings. Values and functions are separate namespaces.
#[derive(Debug, Default)]
pub struct ScopeFrame {
    /// `None` marks a variable declared without an initializer
    values: HashMap<String, Option<Value>>,
    functions: HashMap<String, Rc<Function>>,
    parent: Option<ScopeId>,
}

impl ScopeFrame {
    fn with_parent(parent: ScopeId) -> Self {
        ScopeFrame {
            parent: Some(parent),
            ..Default::default()
        }
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }
}

#[derive(Debug)]
pub struct ScopeArena {
    frames: Vec<ScopeFrame>,
}

impl ScopeArena {
    /// An arena holding just the global scope
    pub fn new() -> Self {
        ScopeArena {
            frames: vec![ScopeFrame::default()],
        }
    }

    pub fn global(&self) -> ScopeId {
        GLOBAL_SCOPE
    }

    /// Number of live scopes, the global one included
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// How many scopes sit above the global one
    pub fn depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    /// Open a new scope under `parent` and return its id
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.frames.push(ScopeFrame::with_parent(parent));
        self.frames.len() - 1
    }

    /// Free `id` and everything opened after it
    pub fn pop(&mut self, id: ScopeId, span: Span) -> ExpResult<()> {
        if id == GLOBAL_SCOPE || id >= self.frames.len() {
            return Err(ExpError::ScopeUnderflow {
                line: span.line,
                column: span.column,
            });
        }
        self.frames.truncate(id);
        Ok(())
    }

    /// Drop every binding, leaving an empty global scope
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frames.push(ScopeFrame::default());
    }

    pub fn declare_value(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Option<Value>,
        span: Span,
    ) -> ExpResult<()> {
        let frame = &mut self.frames[scope];
        if frame.values.contains_key(name) {
            return Err(already_declared(name, span));
        }
        frame.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn declare_function(
        &mut self,
        scope: ScopeId,
        function: Function,
        span: Span,
    ) -> ExpResult<()> {
        let frame = &mut self.frames[scope];
        if frame.functions.contains_key(&function.name) {
            return Err(already_declared(&function.name, span));
        }
        frame
            .functions
            .insert(function.name.clone(), Rc::new(function));
        Ok(())
    }

    /// Value of the nearest binding of `name`
    pub fn read_value(&self, scope: ScopeId, name: &str, span: Span) -> ExpResult<Value> {
        match self.find(scope, |frame| frame.values.get(name)) {
            Some(Some(value)) => Ok(*value),
            Some(None) => Err(ExpError::UninitializedValue {
                name: name.to_string(),
                line: span.line,
                column: span.column,
            }),
            None => Err(ExpError::unbound(name, span)),
        }
    }

    /// Overwrite the nearest binding of `name`; never creates one
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value, span: Span) -> ExpResult<()> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = &mut self.frames[id];
            if let Some(slot) = frame.values.get_mut(name) {
                *slot = Some(value);
                return Ok(());
            }
            current = frame.parent;
        }
        Err(ExpError::unbound(name, span))
    }

    /// Nearest function named `name`, if any scope in the chain has one
    pub fn lookup_function(&self, scope: ScopeId, name: &str) -> Option<Rc<Function>> {
        self.find(scope, |frame| frame.functions.get(name)).cloned()
    }

    pub fn read_function(&self, scope: ScopeId, name: &str, span: Span) -> ExpResult<Rc<Function>> {
        self.lookup_function(scope, name)
            .ok_or_else(|| ExpError::unbound(name, span))
    }

    /// Names declared directly in `scope`, sorted, functions marked with `()`
    pub fn local_names(&self, scope: ScopeId) -> Vec<String> {
        let Some(frame) = self.frames.get(scope) else {
            return Vec::new();
        };

        let mut names: Vec<String> = frame
            .values
            .iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{} = {}", name, v),
                None => format!("{} (unset)", name),
            })
            .chain(frame.functions.values().map(|f| f.to_string()))
            .collect();
        names.sort();
        names
    }

    pub fn frame(&self, scope: ScopeId) -> Option<&ScopeFrame> {
        self.frames.get(scope)
    }

    fn find<'a, T>(
        &'a self,
        scope: ScopeId,
        lookup: impl Fn(&'a ScopeFrame) -> Option<T>,
    ) -> Option<T> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = self.frames.get(id)?;
            if let Some(found) = lookup(frame) {
                return Some(found);
            }
            current = frame.parent;
        }
        None
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

fn already_declared(name: &str, span: Span) -> ExpError {
    ExpError::AlreadyDeclared {
        name: name.to_string(),
        line: span.line,
        column: span.column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Block;

    fn span() -> Span {
        Span::new(1, 1)
    }

    fn function(name: &str, scope: ScopeId) -> Function {
        Function::new(name.to_string(), Vec::new(), Block::new(Vec::new(), span()), scope)
    }

    #[test]
    fn test_declare_and_read() {
        let mut arena = ScopeArena::new();
        let global = arena.global();
        arena
            .declare_value(global, "x", Some(Value::new(5)), span())
            .unwrap();

        assert_eq!(arena.read_value(global, "x", span()).unwrap(), Value::new(5));
        // Reading twice without an assignment in between gives the same value
        assert_eq!(arena.read_value(global, "x", span()).unwrap(), Value::new(5));
    }

    #[test]
    fn test_redeclaration_is_an_error() {
        let mut arena = ScopeArena::new();
        arena.declare_value(0, "x", None, span()).unwrap();
        let err = arena
            .declare_value(0, "x", Some(Value::ONE), Span::new(2, 5))
            .unwrap_err();
        assert_eq!(
            err,
            ExpError::AlreadyDeclared {
                name: "x".to_string(),
                line: 2,
                column: 5
            }
        );

        arena.declare_function(0, function("f", 0), span()).unwrap();
        assert!(matches!(
            arena.declare_function(0, function("f", 0), span()),
            Err(ExpError::AlreadyDeclared { .. })
        ));
    }

    #[test]
    fn test_values_and_functions_are_separate_namespaces() {
        let mut arena = ScopeArena::new();
        arena.declare_value(0, "f", Some(Value::ONE), span()).unwrap();
        arena.declare_function(0, function("f", 0), span()).unwrap();

        assert_eq!(arena.read_value(0, "f", span()).unwrap(), Value::ONE);
        assert_eq!(arena.read_function(0, "f", span()).unwrap().name, "f");
    }

    #[test]
    fn test_shadowing_and_restore() {
        let mut arena = ScopeArena::new();
        arena.declare_value(0, "x", Some(Value::new(1)), span()).unwrap();

        let inner = arena.push(0);
        arena
            .declare_value(inner, "x", Some(Value::new(2)), span())
            .unwrap();
        assert_eq!(arena.read_value(inner, "x", span()).unwrap(), Value::new(2));

        arena.pop(inner, span()).unwrap();
        assert_eq!(arena.read_value(0, "x", span()).unwrap(), Value::new(1));
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let mut arena = ScopeArena::new();
        arena.declare_value(0, "x", Some(Value::new(1)), span()).unwrap();
        let inner = arena.push(0);

        arena.assign(inner, "x", Value::new(9), span()).unwrap();
        arena.pop(inner, span()).unwrap();
        assert_eq!(arena.read_value(0, "x", span()).unwrap(), Value::new(9));
    }

    #[test]
    fn test_assign_never_creates_a_binding() {
        let mut arena = ScopeArena::new();
        let err = arena.assign(0, "y", Value::ONE, Span::new(3, 1)).unwrap_err();
        assert!(matches!(err, ExpError::UnboundName { name, line: 3, .. } if name == "y"));
        assert!(arena.read_value(0, "y", span()).is_err());
    }

    #[test]
    fn test_uninitialized_read() {
        let mut arena = ScopeArena::new();
        arena.declare_value(0, "x", None, span()).unwrap();
        assert!(matches!(
            arena.read_value(0, "x", span()),
            Err(ExpError::UninitializedValue { .. })
        ));

        arena.assign(0, "x", Value::new(4), span()).unwrap();
        assert_eq!(arena.read_value(0, "x", span()).unwrap(), Value::new(4));
    }

    #[test]
    fn test_unbound_function() {
        let arena = ScopeArena::new();
        assert!(arena.lookup_function(0, "nope").is_none());
        assert!(matches!(
            arena.read_function(0, "nope", span()),
            Err(ExpError::UnboundName { .. })
        ));
    }

    #[test]
    fn test_pop_global_underflows() {
        let mut arena = ScopeArena::new();
        let err = arena.pop(arena.global(), Span::new(4, 2)).unwrap_err();
        assert_eq!(err, ExpError::ScopeUnderflow { line: 4, column: 2 });
    }

    #[test]
    fn test_pop_frees_later_scopes() {
        let mut arena = ScopeArena::new();
        let a = arena.push(0);
        let _b = arena.push(a);
        assert_eq!(arena.depth(), 2);

        arena.pop(a, span()).unwrap();
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_call_frame_parents_to_definition_scope() {
        let mut arena = ScopeArena::new();
        arena.declare_value(0, "x", Some(Value::new(3)), span()).unwrap();

        let caller = arena.push(0);
        arena
            .declare_value(caller, "x", Some(Value::new(10)), span())
            .unwrap();

        // A frame under the global scope sees the global x, not the caller's
        let frame = arena.push(0);
        assert_eq!(arena.read_value(frame, "x", span()).unwrap(), Value::new(3));
    }

    #[test]
    fn test_local_names_and_reset() {
        let mut arena = ScopeArena::new();
        arena.declare_value(0, "b", Some(Value::new(2)), span()).unwrap();
        arena.declare_value(0, "a", None, span()).unwrap();
        arena.declare_function(0, function("f", 0), span()).unwrap();

        assert_eq!(
            arena.local_names(0),
            vec!["a (unset)".to_string(), "b = 2".to_string(), "fun f()".to_string()]
        );

        arena.reset();
        assert!(arena.local_names(0).is_empty());
        assert_eq!(arena.len(), 1);
    }
}
