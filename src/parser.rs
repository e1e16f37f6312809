use crate::ast::*;
use crate::error::{ExpError, ExpResult};
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Recursive-descent parser that turns tokens into a parse tree
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens = tokens;
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let (line, column) = tokens.last().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            tokens.push(Token::eof(line, column));
        }
        Parser { tokens, current: 0 }
    }

    /// Parse the tokens into a program
    pub fn parse(&mut self) -> ExpResult<Program> {
        let span = self.current_span();
        let statements = self.statements()?;

        if !self.is_at_end() {
            let token = self.peek();
            return Err(ExpError::ParseError {
                message: format!("unmatched '{}'", token.kind),
                line: token.line,
                column: token.column,
            });
        }

        Ok(Program::new(Block::new(statements, span)))
    }

    /// Statements up to a closing brace or the end of input
    fn statements(&mut self) -> ExpResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        self.skip_separators();

        while !self.is_at_end() && !self.check(&TokenKind::RightBrace) {
            statements.push(self.statement()?);
            self.skip_separators();
        }

        Ok(statements)
    }

    // === Statement parsing ===

    fn statement(&mut self) -> ExpResult<Stmt> {
        let kind = self.peek().kind.clone();
        ensure_sufficient_stack(|| match kind {
            TokenKind::Fun => self.function_declaration(),
            TokenKind::Var => self.var_declaration(),
            TokenKind::While => self.while_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Else => {
                let token = self.peek();
                Err(ExpError::ParseError {
                    message: "'else' without a matching 'if'".to_string(),
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::Identifier(_) if self.peek_next_is(&TokenKind::Equals) => self.assignment(),
            _ => self.expression_statement(),
        })
    }

    fn function_declaration(&mut self) -> ExpResult<Stmt> {
        let span = self.current_span();
        self.advance(); // consume 'fun'

        let name = self.expect_identifier("function name")?;
        self.expect(&TokenKind::LeftParen, "'('")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')'")?;

        let body = self.braced_block()?;

        Ok(Stmt::Function {
            name,
            params,
            body,
            span,
        })
    }

    fn var_declaration(&mut self) -> ExpResult<Stmt> {
        let span = self.current_span();
        self.advance(); // consume 'var'

        let name = self.expect_identifier("variable name")?;
        let initializer = if self.match_token(&TokenKind::Equals) {
            Some(self.expression()?)
        } else {
            None
        };

        Ok(Stmt::VarDecl {
            name,
            initializer,
            span,
        })
    }

    fn while_statement(&mut self) -> ExpResult<Stmt> {
        let span = self.current_span();
        self.advance(); // consume 'while'

        let condition = self.parenthesized_condition()?;
        let body = self.braced_block()?;

        Ok(Stmt::While {
            condition,
            body,
            span,
        })
    }

    fn if_statement(&mut self) -> ExpResult<Stmt> {
        let span = self.current_span();
        self.advance(); // consume 'if'

        let condition = self.parenthesized_condition()?;
        let then_branch = self.braced_block()?;
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(self.braced_block()?)
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span,
        })
    }

    fn return_statement(&mut self) -> ExpResult<Stmt> {
        let span = self.current_span();
        self.advance(); // consume 'return'

        let value = self.expression()?;
        Ok(Stmt::Return { value, span })
    }

    fn assignment(&mut self) -> ExpResult<Stmt> {
        let span = self.current_span();
        let name = self.expect_identifier("variable name")?;
        self.expect(&TokenKind::Equals, "'='")?;
        let value = self.expression()?;

        Ok(Stmt::Assign { name, value, span })
    }

    fn expression_statement(&mut self) -> ExpResult<Stmt> {
        let span = self.current_span();
        let expr = self.expression()?;
        Ok(Stmt::Expression { expr, span })
    }

    fn parenthesized_condition(&mut self) -> ExpResult<Expr> {
        self.expect(&TokenKind::LeftParen, "'('")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')'")?;
        Ok(condition)
    }

    fn braced_block(&mut self) -> ExpResult<Block> {
        let span = self.current_span();
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        let statements = self.statements()?;
        self.expect(&TokenKind::RightBrace, "'}'")?;
        Ok(Block::new(statements, span))
    }

    // === Expression parsing ===

    pub fn expression(&mut self) -> ExpResult<Expr> {
        self.binary(Level::Or)
    }

    /// One rung of the ladder: `tighter (op this-level)?`, so chains nest to the right
    fn binary(&mut self, level: Level) -> ExpResult<Expr> {
        ensure_sufficient_stack(|| {
            let left = match tighter(level) {
                Some(next) => self.binary(next)?,
                None => self.atom()?,
            };

            if !operator_at(level, &self.peek().kind) {
                return Ok(left);
            }

            let operator = self.advance();
            let span = Span::new(operator.line, operator.column);
            let right = self.binary(level)?;

            Ok(Expr::binary(level, &operator.lexeme, left, right, span))
        })
    }

    fn atom(&mut self) -> ExpResult<Expr> {
        let token = self.peek().clone();
        let span = Span::new(token.line, token.column);

        match &token.kind {
            TokenKind::Integer(digits) => {
                self.advance();
                Ok(Expr::Literal {
                    value: parse_literal(digits, false, span)?,
                    span,
                })
            }
            TokenKind::Minus => {
                self.advance();
                let next = self.peek().clone();
                match &next.kind {
                    TokenKind::Integer(digits) => {
                        self.advance();
                        Ok(Expr::Literal {
                            value: parse_literal(digits, true, span)?,
                            span,
                        })
                    }
                    _ => Err(unexpected(&next, "integer literal after '-'")),
                }
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                if self.match_token(&TokenKind::LeftParen) {
                    let arguments = self.arguments()?;
                    Ok(Expr::Call {
                        name,
                        arguments,
                        span,
                    })
                } else {
                    Ok(Expr::Identifier { name, span })
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(Expr::Paren {
                    expr: Box::new(expr),
                    span,
                })
            }
            _ => Err(unexpected(&token, "expression")),
        }
    }

    fn arguments(&mut self) -> ExpResult<Vec<Expr>> {
        let mut arguments = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::RightParen, "')'")?;
        Ok(arguments)
    }

    // === Helper methods ===

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_next_is(&self, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.current + 1)
            .map(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
            .unwrap_or(false)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> ExpResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(unexpected(self.peek(), expected))
        }
    }

    fn expect_identifier(&mut self, context: &str) -> ExpResult<String> {
        let token = self.peek().clone();
        if let TokenKind::Identifier(name) = token.kind {
            self.advance();
            Ok(name)
        } else {
            Err(unexpected(&token, context))
        }
    }

    fn skip_separators(&mut self) {
        while self.match_token(&TokenKind::Semicolon) {}
    }

    fn current_span(&self) -> Span {
        let token = self.peek();
        Span::new(token.line, token.column)
    }
}

fn tighter(level: Level) -> Option<Level> {
    match level {
        Level::Or => Some(Level::And),
        Level::And => Some(Level::Relational),
        Level::Relational => Some(Level::Additive),
        Level::Additive => Some(Level::Multiplicative),
        Level::Multiplicative => None,
    }
}

fn operator_at(level: Level, kind: &TokenKind) -> bool {
    match level {
        Level::Or => matches!(kind, TokenKind::OrOr),
        Level::And => matches!(kind, TokenKind::AndAnd),
        Level::Relational => kind.is_relational(),
        Level::Additive => kind.is_additive(),
        Level::Multiplicative => kind.is_multiplicative(),
    }
}

fn parse_literal(digits: &str, negative: bool, span: Span) -> ExpResult<Value> {
    let text = if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    };

    text.parse::<i32>()
        .map(Value::new)
        .map_err(|_| ExpError::InvalidNumber {
            value: text,
            line: span.line,
            column: span.column,
        })
}

fn unexpected(token: &Token, expected: &str) -> ExpError {
    ExpError::UnexpectedToken {
        expected: expected.to_string(),
        found: token.kind.to_string(),
        line: token.line,
        column: token.column,
    }
}

/// Convenience function to parse source code
pub fn parse(source: &str) -> ExpResult<Program> {
    let tokens = crate::lexer::lex(source)?;
    let mut parser = Parser::new(tokens);
    parser.parse()
}

/// Parse a single expression, rejecting trailing input
pub fn parse_expression(source: &str) -> ExpResult<Expr> {
    let tokens = crate::lexer::lex(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    if !parser.is_at_end() {
        return Err(unexpected(parser.peek(), "end of expression"));
    }
    Ok(expr)
}
