//! Built-in functions, looked up after the user's scope chain misses.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::Span;
use crate::error::{ExpError, ExpResult};
use crate::value::Value;

/// What a built-in produces: a value, or nothing for side-effect-only calls
pub type NativeResult = io::Result<Option<Value>>;

type NativeFn = Box<dyn Fn(&[Value], &mut dyn Write) -> NativeResult>;

/// A native/built-in function
pub struct NativeFunction {
    pub name: String,
    /// `None` accepts any number of arguments
    pub arity: Option<usize>,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new<F>(name: &str, arity: usize, func: F) -> Self
    where
        F: Fn(&[Value], &mut dyn Write) -> NativeResult + 'static,
    {
        NativeFunction {
            name: name.to_string(),
            arity: Some(arity),
            func: Box::new(func),
        }
    }

    pub fn variadic<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value], &mut dyn Write) -> NativeResult + 'static,
    {
        NativeFunction {
            name: name.to_string(),
            arity: None,
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// The root scope: built-ins plus the sink they write to
pub struct Library {
    functions: HashMap<String, NativeFunction>,
    sink: Box<dyn Write>,
}

impl Library {
    /// Standard built-ins writing to stdout
    pub fn new() -> Self {
        Self::with_sink(io::stdout())
    }

    /// Standard built-ins writing to `sink`
    pub fn with_sink(sink: impl Write + 'static) -> Self {
        let mut library = Library {
            functions: HashMap::new(),
            sink: Box::new(sink),
        };
        library.define_natives();
        library
    }

    fn define_natives(&mut self) {
        self.register(NativeFunction::variadic("print", print));
        // Older programs call it println
        self.register(NativeFunction::variadic("println", print));
    }

    /// Add a built-in, replacing any existing one with the same name
    pub fn register(&mut self, function: NativeFunction) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn lookup(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Sorted names of every built-in
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn call(&mut self, name: &str, args: &[Value], span: Span) -> ExpResult<Option<Value>> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| ExpError::unbound(name, span))?;

        if let Some(expected) = function.arity {
            if expected != args.len() {
                return Err(ExpError::ArityMismatch {
                    name: name.to_string(),
                    expected,
                    got: args.len(),
                    line: span.line,
                    column: span.column,
                });
            }
        }

        (function.func)(args, self.sink.as_mut()).map_err(ExpError::io)
    }

    pub fn flush(&mut self) -> ExpResult<()> {
        self.sink.flush().map_err(ExpError::io)
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("functions", &self.names())
            .finish()
    }
}

/// Arguments separated by single spaces, then a newline
fn print(args: &[Value], out: &mut dyn Write) -> NativeResult {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{}", line)?;
    Ok(None)
}

/// An in-memory sink that can be read back after the run
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Output split into lines, without the trailing newlines
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
