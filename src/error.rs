use thiserror::Error;

use crate::ast::Span;

/// Every way a program can fail, from the lexer through to the evaluator.
/// All of them are fatal to the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpError {
    #[error("{line}:{column}: unknown token '{lexeme}'")]
    UnknownToken {
        lexeme: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: unexpected '{found}', expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: integer literal '{value}' does not fit in 32 bits")]
    InvalidNumber {
        value: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: '{name}' is not in scope")]
    UnboundName {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: '{name}' is already declared in this scope")]
    AlreadyDeclared {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: '{name}' is read before it is assigned")]
    UninitializedValue {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: function '{name}' expects {expected} arguments but got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: division by zero in '{operator}'")]
    DivisionByZero {
        operator: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: expression should return a value")]
    MissingValue { line: usize, column: usize },

    #[error("{line}:{column}: end of global scope reached")]
    ScopeUnderflow { line: usize, column: usize },

    #[error("{line}:{column}: unknown operator '{operator}'")]
    UnknownOperator {
        operator: String,
        line: usize,
        column: usize,
    },

    #[error("{line}:{column}: call to '{name}' exceeds the maximum call depth of {limit}")]
    StackOverflow {
        name: String,
        limit: usize,
        line: usize,
        column: usize,
    },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl ExpError {
    /// Source position the error points at, if it has one
    pub fn position(&self) -> Option<Span> {
        match self {
            ExpError::UnknownToken { line, column, .. }
            | ExpError::UnexpectedToken { line, column, .. }
            | ExpError::InvalidNumber { line, column, .. }
            | ExpError::ParseError { line, column, .. }
            | ExpError::UnboundName { line, column, .. }
            | ExpError::AlreadyDeclared { line, column, .. }
            | ExpError::UninitializedValue { line, column, .. }
            | ExpError::ArityMismatch { line, column, .. }
            | ExpError::DivisionByZero { line, column, .. }
            | ExpError::MissingValue { line, column }
            | ExpError::ScopeUnderflow { line, column }
            | ExpError::UnknownOperator { line, column, .. }
            | ExpError::StackOverflow { line, column, .. } => Some(Span::new(*line, *column)),
            ExpError::Io { .. } => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.position().map(|span| span.line)
    }

    /// Whether the error came from lexing or parsing rather than evaluation
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            ExpError::UnknownToken { .. }
                | ExpError::UnexpectedToken { .. }
                | ExpError::InvalidNumber { .. }
                | ExpError::ParseError { .. }
        )
    }

    pub fn unbound(name: &str, span: Span) -> Self {
        ExpError::UnboundName {
            name: name.to_string(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn io(err: std::io::Error) -> Self {
        ExpError::Io {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ExpError {
    fn from(err: std::io::Error) -> Self {
        ExpError::io(err)
    }
}

pub type ExpResult<T> = Result<T, ExpError>;

/// A hint for common mistakes, shown under the error by the CLI
pub fn get_error_suggestion(error: &ExpError) -> Option<&'static str> {
    match error {
        ExpError::UnboundName { name, .. } => match name.as_str() {
            "true" | "false" => Some("hint: there are no booleans, use 1 for true and 0 for false"),
            "let" | "const" | "int" => Some("hint: declare variables with 'var name = value'"),
            "function" | "func" | "fn" | "def" => {
                Some("hint: declare functions with 'fun name(a, b) { ... }'")
            }
            "for" | "loop" => Some("hint: the only loop is 'while (condition) { ... }'"),
            "elif" | "elseif" => Some("hint: nest another 'if' inside the 'else' block"),
            _ => None,
        },
        ExpError::UninitializedValue { .. } => {
            Some("hint: give the variable a value with 'name = value' before reading it")
        }
        ExpError::AlreadyDeclared { .. } => {
            Some("hint: use plain assignment 'name = value' to change an existing variable")
        }
        ExpError::MissingValue { .. } => {
            Some("hint: built-ins like 'print' produce no value and cannot be used in expressions")
        }
        ExpError::ScopeUnderflow { .. } => {
            Some("hint: this is an interpreter bug, please report it with the program that caused it")
        }
        _ => None,
    }
}

/// Render the offending line with its neighbours and a caret under the column
pub fn format_error_context(source: &str, line: usize, column: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return String::new();
    }

    let mut result = String::new();
    let line_idx = line - 1;
    let width = (line + 1).to_string().len();

    if line_idx > 0 {
        result.push_str(&format!("  {:>width$} | {}\n", line - 1, lines[line_idx - 1]));
    }
    result.push_str(&format!("> {:>width$} | {}\n", line, lines[line_idx]));
    if column > 0 {
        result.push_str(&format!(
            "  {:>width$} | {}^\n",
            "",
            " ".repeat(column - 1)
        ));
    }
    if line_idx + 1 < lines.len() {
        result.push_str(&format!("  {:>width$} | {}\n", line + 1, lines[line_idx + 1]));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display_names_position_and_subject() {
        let err = ExpError::UnboundName {
            name: "x".to_string(),
            line: 5,
            column: 3,
        };
        assert_eq!(err.to_string(), "5:3: 'x' is not in scope");

        let err = ExpError::ArityMismatch {
            name: "foo".to_string(),
            expected: 2,
            got: 3,
            line: 7,
            column: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("foo"));
        assert!(msg.contains('2'));
        assert!(msg.contains('3'));

        let err = ExpError::DivisionByZero {
            operator: "%".to_string(),
            line: 1,
            column: 1,
        };
        assert!(err.to_string().contains("'%'"));
    }

    #[test]
    fn test_position() {
        let err = ExpError::MissingValue { line: 2, column: 9 };
        assert_eq!(err.position(), Some(Span::new(2, 9)));
        assert_eq!(err.line(), Some(2));

        let err = ExpError::Io {
            message: "gone".to_string(),
        };
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_is_syntax_error() {
        assert!(ExpError::ParseError {
            message: "x".to_string(),
            line: 1,
            column: 1
        }
        .is_syntax_error());
        assert!(!ExpError::ScopeUnderflow { line: 1, column: 1 }.is_syntax_error());
    }

    #[test]
    fn test_error_suggestions() {
        let err = ExpError::unbound("true", Span::new(1, 1));
        assert!(get_error_suggestion(&err).unwrap().contains("1 for true"));

        let err = ExpError::unbound("def", Span::new(1, 1));
        assert!(get_error_suggestion(&err).unwrap().contains("fun"));

        let err = ExpError::unbound("my_counter", Span::new(1, 1));
        assert!(get_error_suggestion(&err).is_none());
    }

    #[test]
    fn test_format_error_context() {
        let source = "var a = 1\nvar b = a / 0\nprint(b)";
        let context = format_error_context(source, 2, 11);
        assert_eq!(
            context,
            "  1 | var a = 1\n> 2 | var b = a / 0\n    |           ^\n  3 | print(b)\n"
        );
    }

    #[test]
    fn test_format_error_context_edge_cases() {
        assert_eq!(format_error_context("x", 0, 1), "");
        assert_eq!(format_error_context("x", 5, 1), "");
        assert_eq!(format_error_context("x", 1, 1), "> 1 | x\n    | ^\n");
    }
}
