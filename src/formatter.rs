//! Pretty printer for explang code.
//!
//! Output reparses to the same tree: binary chains already nest to the right
//! and parentheses are kept as nodes, so nothing needs re-bracketing.
//! Comments are not preserved.

use crate::ast::*;
use crate::stack::ensure_sufficient_stack;

/// Configuration for the formatter
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterConfig {
    /// Number of spaces per indentation level
    pub indent_size: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        FormatterConfig { indent_size: 4 }
    }
}

/// The formatter itself
pub struct Formatter {
    config: FormatterConfig,
    output: String,
    indent_level: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Formatter::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Formatter {
            config,
            output: String::new(),
            indent_level: 0,
        }
    }

    /// Format a whole program
    pub fn format(&mut self, program: &Program) -> String {
        self.output.clear();
        self.indent_level = 0;

        self.format_statements(program.statements(), true);
        self.output.clone()
    }

    fn format_statements(&mut self, statements: &[Stmt], top_level: bool) {
        for (i, stmt) in statements.iter().enumerate() {
            self.format_stmt(stmt);

            let Some(next) = statements.get(i + 1) else {
                break;
            };
            if needs_separator(next) {
                // `x` then `(y)` would otherwise read back as the call `x(y)`
                self.output.insert(self.output.len() - 1, ';');
            }
            if top_level && matches!(stmt, Stmt::Function { .. }) {
                self.output.push('\n');
            }
        }
    }

    fn indent(&self) -> String {
        " ".repeat(self.config.indent_size * self.indent_level)
    }

    fn writeln(&mut self, s: &str) {
        self.output.push_str(&self.indent());
        self.output.push_str(s);
        self.output.push('\n');
    }

    fn format_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl {
                name, initializer, ..
            } => {
                let init = if let Some(expr) = initializer {
                    format!(" = {}", format_expr(expr))
                } else {
                    String::new()
                };
                self.writeln(&format!("var {}{}", name, init));
            }

            Stmt::Assign { name, value, .. } => {
                self.writeln(&format!("{} = {}", name, format_expr(value)));
            }

            Stmt::Function {
                name, params, body, ..
            } => {
                self.writeln(&format!("fun {}({}) {{", name, params.join(", ")));
                self.format_body(body);
                self.writeln("}");
            }

            Stmt::While {
                condition, body, ..
            } => {
                self.writeln(&format!("while ({}) {{", format_expr(condition)));
                self.format_body(body);
                self.writeln("}");
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.writeln(&format!("if ({}) {{", format_expr(condition)));
                self.format_body(then_branch);
                if let Some(else_branch) = else_branch {
                    self.writeln("} else {");
                    self.format_body(else_branch);
                }
                self.writeln("}");
            }

            Stmt::Return { value, .. } => {
                self.writeln(&format!("return {}", format_expr(value)));
            }

            Stmt::Expression { expr, .. } => {
                self.writeln(&format_expr(expr));
            }
        }
    }

    fn format_body(&mut self, block: &Block) {
        ensure_sufficient_stack(|| {
            self.indent_level += 1;
            self.format_statements(&block.statements, false);
            self.indent_level -= 1;
        })
    }
}

/// An expression statement opening with `(` or `-` would glue onto the line before it
fn needs_separator(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expression { expr, .. } => format_expr(expr).starts_with(['(', '-']),
        _ => false,
    }
}

pub fn format_expr(expr: &Expr) -> String {
    ensure_sufficient_stack(|| match expr {
        Expr::Literal { value, .. } => format!("{}", value),

        Expr::Identifier { name, .. } => name.clone(),

        Expr::Binary {
            left,
            operator,
            right,
            ..
        } => format!("{} {} {}", format_expr(left), operator, format_expr(right)),

        Expr::Call {
            name, arguments, ..
        } => {
            let args: Vec<String> = arguments.iter().map(format_expr).collect();
            format!("{}({})", name, args.join(", "))
        }

        Expr::Paren { expr, .. } => format!("({})", format_expr(expr)),
    })
}

/// Format source code (convenience function)
pub fn format_source(source: &str) -> crate::error::ExpResult<String> {
    let program = crate::parser::parse(source)?;
    let mut formatter = Formatter::new();
    Ok(formatter.format(&program))
}
