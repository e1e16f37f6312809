//! explang - a small language of integers, nested functions and while loops
//!
//! This crate provides the lexer, parser, tree-walking interpreter and
//! formatter for explang, plus the `explang` command-line tool.

pub mod ast;
pub mod config;
pub mod error;
pub mod formatter;
pub mod function;
pub mod interpreter;
pub mod lexer;
pub mod library;
pub mod logging;
pub mod parser;
pub mod scope;
pub mod stack;
pub mod token;
pub mod value;

// Re-export commonly used types
pub use config::{InterpreterConfig, TraceMode};
pub use error::{ExpError, ExpResult};
pub use interpreter::Interpreter;
pub use library::{Library, NativeFunction, SharedBuffer};
pub use parser::parse;
pub use value::Value;

/// Run explang source code, printing to stdout
///
/// Returns the value of a top-level `return`, if the program ran one.
///
/// # Example
/// ```
/// use explang::run;
///
/// let code = r#"
///     var x = 21
///     return x * 2
/// "#;
/// assert_eq!(run(code).unwrap(), Some(explang::Value::new(42)));
/// ```
pub fn run(source: &str) -> ExpResult<Option<Value>> {
    let program = parse(source)?;
    let mut interpreter = Interpreter::new();
    interpreter.interpret(&program)
}

/// Run explang source code and capture what it prints, one entry per line
pub fn run_with_output(source: &str) -> ExpResult<Vec<String>> {
    let program = parse(source)?;
    let buffer = SharedBuffer::new();
    let mut interpreter = Interpreter::with_output(buffer.clone());
    interpreter.interpret(&program)?;
    Ok(buffer.lines())
}

/// Format explang source code
pub fn format_source(source: &str) -> ExpResult<String> {
    formatter::format_source(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_returns_top_level_value() {
        assert_eq!(run("return 10 + 5 * 2").unwrap(), Some(Value::new(20)));
        assert_eq!(run("var x = 1").unwrap(), None);
    }

    #[test]
    fn test_run_function() {
        let result = run(r#"
            fun add(a, b) {
                return a + b
            }
            return add(3, 4)
        "#)
        .unwrap();
        assert_eq!(result, Some(Value::new(7)));
    }

    #[test]
    fn test_run_error() {
        assert!(matches!(
            run("return undefined_var"),
            Err(ExpError::UnboundName { .. })
        ));
    }

    #[test]
    fn test_run_with_output() {
        let output = run_with_output("print(1)\nprint(2, 3)").unwrap();
        assert_eq!(output, vec!["1", "2 3"]);
        assert!(run_with_output("var x = 5 + 5").unwrap().is_empty());
    }

    #[test]
    fn test_run_with_output_parse_error() {
        assert!(run_with_output("var = 5").unwrap_err().is_syntax_error());
    }

    #[test]
    fn test_format_source() {
        assert_eq!(format_source("var  x=1").unwrap(), "var x = 1\n");
    }
}
