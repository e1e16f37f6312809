use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Block, Expr, Level, Program, Span, Stmt};
use crate::config::{InterpreterConfig, TraceMode};
use crate::error::{ExpError, ExpResult};
use crate::function::Function;
use crate::library::Library;
use crate::logging::{LogLevel, LogRecord, LoggerCore};
use crate::scope::{ScopeArena, ScopeId};
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

/// What a statement tells the block running it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Carry on with the next statement
    Continue,
    /// A `return` ran; unwind to the nearest call
    Return(Value),
}

/// The evaluator's operator table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    /// Resolve a source symbol at one level of the ladder
    pub fn lookup(level: Level, symbol: &str) -> Option<BinaryOp> {
        let op = match (level, symbol) {
            (Level::Or, "||") => BinaryOp::Or,
            (Level::And, "&&") => BinaryOp::And,
            (Level::Relational, "<") => BinaryOp::Less,
            (Level::Relational, "<=") => BinaryOp::LessEqual,
            (Level::Relational, ">") => BinaryOp::Greater,
            (Level::Relational, ">=") => BinaryOp::GreaterEqual,
            (Level::Relational, "==") => BinaryOp::Equal,
            (Level::Relational, "!=") => BinaryOp::NotEqual,
            (Level::Additive, "+") => BinaryOp::Add,
            (Level::Additive, "-") => BinaryOp::Subtract,
            (Level::Multiplicative, "*") => BinaryOp::Multiply,
            (Level::Multiplicative, "/") => BinaryOp::Divide,
            (Level::Multiplicative, "%") => BinaryOp::Modulo,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }

    pub fn apply(self, left: Value, right: Value, span: Span) -> ExpResult<Value> {
        let result = match self {
            BinaryOp::Or => Value::from_bool(left.is_truthy() || right.is_truthy()),
            BinaryOp::And => Value::from_bool(left.is_truthy() && right.is_truthy()),
            BinaryOp::Less => Value::from_bool(left < right),
            BinaryOp::LessEqual => Value::from_bool(left <= right),
            BinaryOp::Greater => Value::from_bool(left > right),
            BinaryOp::GreaterEqual => Value::from_bool(left >= right),
            BinaryOp::Equal => Value::from_bool(left == right),
            BinaryOp::NotEqual => Value::from_bool(left != right),
            BinaryOp::Add => left.wrapping_add(right),
            BinaryOp::Subtract => left.wrapping_sub(right),
            BinaryOp::Multiply => left.wrapping_mul(right),
            BinaryOp::Divide => left
                .checked_div(right)
                .ok_or_else(|| self.division_by_zero(span))?,
            BinaryOp::Modulo => left
                .checked_rem(right)
                .ok_or_else(|| self.division_by_zero(span))?,
        };
        Ok(result)
    }

    fn division_by_zero(self, span: Span) -> ExpError {
        ExpError::DivisionByZero {
            operator: self.symbol().to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

/// The interpreter - runs explang programs
pub struct Interpreter {
    arena: ScopeArena,
    /// Scope the running statement reads and declares in
    current: ScopeId,
    library: Library,
    config: InterpreterConfig,
    logger: LoggerCore,
    trace_sink: Box<dyn Write>,
    trace_depth: usize,
    trace_failed: bool,
    call_depth: usize,
}

impl Interpreter {
    /// Interpreter with the standard library writing to stdout
    pub fn new() -> Self {
        Self::with_library(Library::new(), InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self::with_library(Library::new(), config)
    }

    pub fn with_library(library: Library, config: InterpreterConfig) -> Self {
        let mut logger = LoggerCore::with_filter(config.log_filter.clone());
        logger.format = config.log_format;

        let arena = ScopeArena::new();
        let current = arena.global();

        Interpreter {
            arena,
            current,
            library,
            config,
            logger,
            trace_sink: Box::new(io::stderr()),
            trace_depth: 0,
            trace_failed: false,
            call_depth: 0,
        }
    }

    /// Interpreter whose built-ins write to `sink` instead of stdout
    pub fn with_output(sink: impl Write + 'static) -> Self {
        Self::with_library(Library::with_sink(sink), InterpreterConfig::default())
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    pub fn logger_mut(&mut self) -> &mut LoggerCore {
        &mut self.logger
    }

    /// Enable trace mode for debugging
    pub fn set_trace_mode(&mut self, mode: TraceMode) {
        self.config.trace = mode;
    }

    pub fn trace_mode(&self) -> TraceMode {
        self.config.trace
    }

    /// Where trace lines go; stderr unless replaced
    pub fn set_trace_sink(&mut self, sink: impl Write + 'static) {
        self.trace_sink = Box::new(sink);
        self.trace_failed = false;
    }

    /// Forget every user declaration
    pub fn reset(&mut self) {
        self.arena.reset();
        self.current = self.arena.global();
        self.call_depth = 0;
        self.trace_depth = 0;
    }

    /// Bindings in the global scope, for the REPL
    pub fn environment_names(&self) -> Vec<String> {
        self.arena.local_names(self.arena.global())
    }

    /// Run a program in the global scope, so declarations persist across calls.
    /// Returns the value of a top-level `return`, if one ran.
    pub fn interpret(&mut self, program: &Program) -> ExpResult<Option<Value>> {
        self.log(LogLevel::Debug, "interpreter", program.block.span, || {
            format!("running {} statements", program.statements().len())
        });

        let result = self.execute_statements(program.statements());
        let flushed = self.library.flush();

        match result {
            Ok(flow) => {
                flushed?;
                Ok(match flow {
                    Flow::Return(value) => Some(value),
                    Flow::Continue => None,
                })
            }
            Err(err) => {
                self.current = self.arena.global();
                self.call_depth = 0;
                self.trace_depth = 0;
                self.log(LogLevel::Debug, "interpreter", Span::default(), || {
                    format!("aborted: {}", err)
                });
                Err(err)
            }
        }
    }

    /// Parse and run source text
    pub fn run_source(&mut self, source: &str) -> ExpResult<Option<Value>> {
        let program = crate::parser::parse(source)?;
        self.interpret(&program)
    }

    // === Statements ===

    fn execute_statements(&mut self, statements: &[Stmt]) -> ExpResult<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute_stmt(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> ExpResult<Flow> {
        self.log(LogLevel::Trace, "interpreter::stmt", stmt.span(), || {
            stmt.kind_name().to_string()
        });

        match stmt {
            Stmt::VarDecl {
                name,
                initializer,
                span,
            } => {
                self.trace(&format!("[line {}] var {}", span.line, name));
                let value = match initializer {
                    Some(init) => Some(self.evaluate_value(init)?),
                    None => None,
                };
                match value {
                    Some(v) => self.trace_verbose(&format!("-> {} = {}", name, v)),
                    None => self.trace_verbose(&format!("-> {} is unset", name)),
                }
                self.arena.declare_value(self.current, name, value, *span)?;
                Ok(Flow::Continue)
            }

            Stmt::Assign { name, value, span } => {
                self.trace(&format!("[line {}] {} = ...", span.line, name));
                let v = self.evaluate_value(value)?;
                self.trace_verbose(&format!("-> {} = {}", name, v));
                self.arena.assign(self.current, name, v, *span)?;
                Ok(Flow::Continue)
            }

            Stmt::Function {
                name,
                params,
                body,
                span,
            } => {
                self.trace(&format!(
                    "[line {}] fun {}({})",
                    span.line,
                    name,
                    params.join(", ")
                ));
                let function = Function::new(name.clone(), params.clone(), body.clone(), self.current);
                self.arena.declare_function(self.current, function, *span)?;
                Ok(Flow::Continue)
            }

            Stmt::While {
                condition,
                body,
                span,
            } => {
                self.trace(&format!("[line {}] while", span.line));
                loop {
                    let test = self.evaluate_value(condition)?;
                    self.trace_verbose(&format!("-> condition is {}", test));
                    if !test.is_truthy() {
                        break;
                    }
                    if let Flow::Return(value) = self.execute_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Continue)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => {
                self.trace(&format!("[line {}] if", span.line));
                let test = self.evaluate_value(condition)?;
                if test.is_truthy() {
                    self.trace_verbose(&format!("-> condition is {}, taking then", test));
                    self.execute_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.trace_verbose("-> condition is 0, taking else");
                    self.execute_block(else_branch)
                } else {
                    self.trace_verbose("-> condition is 0, skipping");
                    Ok(Flow::Continue)
                }
            }

            Stmt::Return { value, span } => {
                let v = self.evaluate_value(value)?;
                self.trace(&format!("[line {}] return {}", span.line, v));
                Ok(Flow::Return(v))
            }

            Stmt::Expression { expr, span } => {
                self.trace(&format!("[line {}] expression", span.line));
                if let Some(v) = self.evaluate(expr)? {
                    self.trace_verbose(&format!("-> result: {}", v));
                }
                Ok(Flow::Continue)
            }
        }
    }

    /// Run a braced block in a fresh child of the current scope
    fn execute_block(&mut self, block: &Block) -> ExpResult<Flow> {
        ensure_sufficient_stack(|| {
            let scope = self.arena.push(self.current);
            self.trace_depth += 1;
            let result = self.execute_in_scope(&block.statements, scope, block.span);
            self.trace_depth = self.trace_depth.saturating_sub(1);
            result
        })
    }

    /// Run `statements` with `scope` current, then free `scope` whatever happened
    fn execute_in_scope(&mut self, statements: &[Stmt], scope: ScopeId, span: Span) -> ExpResult<Flow> {
        self.log(LogLevel::Trace, "interpreter::scope", span, || {
            format!("push scope {}", scope)
        });
        self.trace_verbose(&format!("push scope {}", scope));

        let previous = std::mem::replace(&mut self.current, scope);
        let result = self.execute_statements(statements);
        self.current = previous;
        let popped = self.arena.pop(scope, span);

        self.trace_verbose(&format!("pop scope {}", scope));
        self.log(LogLevel::Trace, "interpreter::scope", span, || {
            format!("pop scope {}", scope)
        });

        let flow = result?;
        popped?;
        Ok(flow)
    }

    // === Expressions ===

    /// Evaluate an expression; `None` when it produces no value
    pub fn evaluate(&mut self, expr: &Expr) -> ExpResult<Option<Value>> {
        ensure_sufficient_stack(|| match expr {
            Expr::Literal { value, .. } => Ok(Some(*value)),

            Expr::Identifier { name, span } => {
                Ok(Some(self.arena.read_value(self.current, name, *span)?))
            }

            Expr::Paren { expr, .. } => self.evaluate(expr),

            Expr::Binary {
                level,
                operator,
                left,
                right,
                span,
            } => {
                // Both operands, left first, even when the left one decides the result
                let l = self.evaluate_value(left)?;
                let r = self.evaluate_value(right)?;
                let op = BinaryOp::lookup(*level, operator).ok_or_else(|| {
                    ExpError::UnknownOperator {
                        operator: operator.clone(),
                        line: span.line,
                        column: span.column,
                    }
                })?;
                Ok(Some(op.apply(l, r, *span)?))
            }

            Expr::Call {
                name,
                arguments,
                span,
            } => self.evaluate_call(name, arguments, *span),
        })
    }

    /// Evaluate an expression that must produce a value
    pub fn evaluate_value(&mut self, expr: &Expr) -> ExpResult<Value> {
        self.evaluate(expr)?.ok_or_else(|| {
            let span = expr.span();
            ExpError::MissingValue {
                line: span.line,
                column: span.column,
            }
        })
    }

    fn evaluate_call(&mut self, name: &str, arguments: &[Expr], span: Span) -> ExpResult<Option<Value>> {
        // User functions shadow built-ins
        let function = self.arena.lookup_function(self.current, name);
        if function.is_none() && !self.library.contains(name) {
            return Err(ExpError::unbound(name, span));
        }

        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate_value(arg)?);
        }

        match function {
            Some(function) => self.call_function(function, args, span).map(Some),
            None => {
                self.trace(&format!("[line {}] call {}{}", span.line, name, format_args(&args)));
                self.library.call(name, &args, span)
            }
        }
    }

    fn call_function(&mut self, func: Rc<Function>, args: Vec<Value>, span: Span) -> ExpResult<Value> {
        if args.len() != func.arity() {
            return Err(ExpError::ArityMismatch {
                name: func.name.clone(),
                expected: func.arity(),
                got: args.len(),
                line: span.line,
                column: span.column,
            });
        }

        if self.call_depth >= self.config.max_call_depth {
            return Err(ExpError::StackOverflow {
                name: func.name.clone(),
                limit: self.config.max_call_depth,
                line: span.line,
                column: span.column,
            });
        }

        self.trace(&format!("[line {}] call {}{}", span.line, func.name, format_args(&args)));
        let depth = self.call_depth + 1;
        self.log(LogLevel::Debug, "interpreter::call", span, || {
            format!("call {}{} depth={}", func.name, format_args(&args), depth)
        });

        let frame = self.arena.push(func.definition_scope);
        for (param, value) in func.params.iter().zip(args) {
            if let Err(err) = self.arena.declare_value(frame, param, Some(value), func.body.span) {
                self.arena.pop(frame, span)?;
                return Err(err);
            }
        }

        self.call_depth += 1;
        self.trace_depth += 1;
        let result = ensure_sufficient_stack(|| {
            self.execute_in_scope(&func.body.statements, frame, func.body.span)
        });
        self.trace_depth = self.trace_depth.saturating_sub(1);
        self.call_depth -= 1;

        let value = match result? {
            Flow::Return(value) => value,
            Flow::Continue => Value::ZERO,
        };

        self.trace(&format!("[line {}] {} returned {}", span.line, func.name, value));
        self.log(LogLevel::Debug, "interpreter::call", span, || {
            format!("return {} = {}", func.name, value)
        });

        Ok(value)
    }

    // === Tracing and logging ===

    fn trace(&mut self, msg: &str) {
        if self.config.trace != TraceMode::Off {
            let indent = "  ".repeat(self.trace_depth);
            let written = writeln!(self.trace_sink, "{}{}", indent, msg);
            self.check_trace_write(written);
        }
    }

    /// Only in verbose mode
    fn trace_verbose(&mut self, msg: &str) {
        if self.config.trace == TraceMode::Verbose {
            let indent = "  ".repeat(self.trace_depth);
            let written = writeln!(self.trace_sink, "{}   {}", indent, msg);
            self.check_trace_write(written);
        }
    }

    /// Tracing never fails the run; the first broken write is logged once
    fn check_trace_write(&mut self, written: io::Result<()>) {
        if let Err(err) = written {
            if !self.trace_failed {
                self.trace_failed = true;
                self.log(LogLevel::Warn, "interpreter", Span::default(), || {
                    format!("trace output failed: {}", err)
                });
            }
        }
    }

    fn log(&mut self, level: LogLevel, target: &str, span: Span, message: impl FnOnce() -> String) {
        if !self.logger.enabled(level, target) {
            return;
        }
        let record = LogRecord::new(level, target, message()).at(span.line, span.column);
        self.logger.log(&record);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_args(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("({})", parts.join(", "))
}
