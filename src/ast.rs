use serde::Serialize;
use std::fmt;

use crate::value::Value;

/// Span information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A whole source file: one top-level block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub block: Block,
}

impl Program {
    pub fn new(block: Block) -> Self {
        Program { block }
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.block.statements
    }
}

/// An ordered sequence of statements. Braced blocks open a fresh scope when run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(statements: Vec<Stmt>, span: Span) -> Self {
        Block { statements, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Stmt {
    /// var x = 5, or var x
    VarDecl {
        name: String,
        initializer: Option<Expr>,
        span: Span,
    },

    /// x = expr
    Assign { name: String, value: Expr, span: Span },

    /// fun f(a, b) { ... }
    Function {
        name: String,
        params: Vec<String>,
        body: Block,
        span: Span,
    },

    /// while (cond) { ... }
    While {
        condition: Expr,
        body: Block,
        span: Span,
    },

    /// if (cond) { ... } else { ... }
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
        span: Span,
    },

    /// return expr
    Return { value: Expr, span: Span },

    /// A bare expression, usually a call
    Expression { expr: Expr, span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Function { span, .. }
            | Stmt::While { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Expression { span, .. } => *span,
        }
    }

    /// Short name of the statement kind, used in trace output
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::VarDecl { .. } => "variable",
            Stmt::Assign { .. } => "assignment",
            Stmt::Function { .. } => "function",
            Stmt::While { .. } => "while",
            Stmt::If { .. } => "if",
            Stmt::Return { .. } => "return",
            Stmt::Expression { .. } => "expression",
        }
    }
}

/// Levels of the binary-operator ladder, loosest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Level {
    Or,
    And,
    Relational,
    Additive,
    Multiplicative,
}

impl Level {
    pub fn name(self) -> &'static str {
        match self {
            Level::Or => "or",
            Level::And => "and",
            Level::Relational => "relational",
            Level::Additive => "additive",
            Level::Multiplicative => "multiplicative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Expr {
    /// `left op right`; `operator` is the source symbol, resolved by the evaluator.
    /// The right operand is the rest of the same level, so `a - b - c` is `a - (b - c)`.
    Binary {
        level: Level,
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },

    Literal { value: Value, span: Span },

    Identifier { name: String, span: Span },

    Call {
        name: String,
        arguments: Vec<Expr>,
        span: Span,
    },

    /// ( expr )
    Paren { expr: Box<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Binary { span, .. }
            | Expr::Literal { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Call { span, .. }
            | Expr::Paren { span, .. } => *span,
        }
    }

    pub fn binary(level: Level, operator: &str, left: Expr, right: Expr, span: Span) -> Self {
        Expr::Binary {
            level,
            operator: operator.to_string(),
            left: Box::new(left),
            right: Box::new(right),
            span,
        }
    }

    pub fn literal(value: i32, span: Span) -> Self {
        Expr::Literal {
            value: Value::new(value),
            span,
        }
    }

    pub fn identifier(name: &str, span: Span) -> Self {
        Expr::Identifier {
            name: name.to_string(),
            span,
        }
    }

    /// Move sub-expressions onto `pending`, leaving cheap leaves behind
    fn take_children(&mut self, pending: &mut Vec<Expr>) {
        match self {
            Expr::Binary { left, right, .. } => {
                pending.push(std::mem::replace(left.as_mut(), Expr::placeholder()));
                pending.push(std::mem::replace(right.as_mut(), Expr::placeholder()));
            }
            Expr::Paren { expr, .. } => {
                pending.push(std::mem::replace(expr.as_mut(), Expr::placeholder()));
            }
            Expr::Call { arguments, .. } => pending.append(arguments),
            Expr::Literal { .. } | Expr::Identifier { .. } => {}
        }
    }

    fn placeholder() -> Self {
        Expr::Literal {
            value: Value::ZERO,
            span: Span::default(),
        }
    }
}

// Long operator chains and deep nesting would otherwise be freed recursively,
// one native frame per level.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut expr) = pending.pop() {
            expr.take_children(&mut pending);
        }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.statements);
        while let Some(mut stmt) = pending.pop() {
            match &mut stmt {
                Stmt::Function { body, .. } | Stmt::While { body, .. } => {
                    pending.append(&mut body.statements);
                }
                Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    pending.append(&mut then_branch.statements);
                    if let Some(else_branch) = else_branch {
                        pending.append(&mut else_branch.statements);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans() {
        let span = Span::new(3, 4);
        let expr = Expr::binary(
            Level::Additive,
            "+",
            Expr::literal(1, Span::new(3, 2)),
            Expr::identifier("x", Span::new(3, 6)),
            span,
        );
        assert_eq!(expr.span(), span);

        let stmt = Stmt::Expression {
            expr,
            span: Span::new(3, 2),
        };
        assert_eq!(stmt.span(), Span::new(3, 2));
        assert_eq!(stmt.kind_name(), "expression");
        assert_eq!(format!("{}", span), "3:4");
    }

    #[test]
    fn test_long_chain_drops_without_recursion() {
        let mut expr = Expr::literal(1, Span::new(1, 1));
        for i in 0..100_000 {
            expr = Expr::binary(
                Level::Additive,
                "+",
                Expr::literal(1, Span::new(1, 1)),
                Expr::Paren {
                    expr: Box::new(expr),
                    span: Span::new(1, i),
                },
                Span::new(1, 2),
            );
        }
        drop(expr);
    }

    #[test]
    fn test_deeply_nested_blocks_drop_without_recursion() {
        let mut block = Block::new(vec![], Span::new(1, 1));
        for _ in 0..100_000 {
            let stmt = Stmt::If {
                condition: Expr::literal(1, Span::new(1, 4)),
                then_branch: block,
                else_branch: Some(Block::new(vec![], Span::new(1, 1))),
                span: Span::new(1, 1),
            };
            block = Block::new(vec![stmt], Span::new(1, 1));
        }
        drop(Program::new(block));
    }

    #[test]
    fn test_serializes_with_kind_tags() {
        let stmt = Stmt::Return {
            value: Expr::literal(7, Span::new(1, 8)),
            span: Span::new(1, 1),
        };
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json["kind"], "Return");
        assert_eq!(json["value"]["kind"], "Literal");
        assert_eq!(json["value"]["value"], 7);
    }
}
