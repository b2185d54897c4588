use blc_common::Diagnostic;

use crate::ast::*;
use crate::lexer::token::TokenKind;

use super::Parser;

impl Parser {
    /// Parse one statement. Declarations are statements too.
    pub(super) fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek() {
            TokenKind::Fun => self.parse_function().map(Stmt::Function),
            TokenKind::Struct => self.parse_struct().map(Stmt::Struct),
            TokenKind::Class => self.parse_class().map(Stmt::Class),
            TokenKind::Var => self.parse_variable().map(Stmt::Variable),
            TokenKind::LeftBrace => self.parse_block().map(Stmt::Block),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            _ => self.parse_expr_stmt(),
        }
    }

    /// Parse `{ statement* }`, recovering from bad statements inside.
    pub(super) fn parse_block(&mut self) -> Option<Block> {
        let start = self.current_span();
        self.expect(TokenKind::LeftBrace)?;

        let mut statements: Vec<Stmt> = Vec::new();
        let mut returned_at = None;
        while self.peek() != TokenKind::RightBrace && !self.is_at_end() {
            match self.parse_statement() {
                Some(stmt) => {
                    if let Some(return_span) = returned_at.take() {
                        self.diagnostics.report(
                            Diagnostic::warning("unreachable statement")
                                .with_span(stmt.span())
                                .with_related(return_span, "any code after this return is never run"),
                        );
                    }
                    if let Stmt::Return(ret) = &stmt {
                        if !statements.iter().any(|s| matches!(s, Stmt::Return(_))) {
                            returned_at = Some(ret.span);
                        }
                    }
                    statements.push(stmt);
                }
                None => self.synchronize(),
            }
        }

        self.expect(TokenKind::RightBrace)?;
        let span = start.merge(&self.previous_span());

        Some(Block {
            id: self.next_id(),
            statements,
            span,
        })
    }

    /// Parse `if (cond) stmt [else stmt]`
    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // consume 'if'

        let condition = self.parse_condition()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.eat(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let span = start.merge(&self.previous_span());

        Some(Stmt::If(IfStmt {
            id: self.next_id(),
            condition,
            then_branch,
            else_branch,
            span,
        }))
    }

    /// Parse `while (cond) stmt`
    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // consume 'while'

        let condition = self.parse_condition()?;
        let body = Box::new(self.parse_statement()?);
        let span = start.merge(&self.previous_span());

        Some(Stmt::While(WhileStmt {
            id: self.next_id(),
            condition,
            body,
            span,
        }))
    }

    fn parse_condition(&mut self) -> Option<Expr> {
        self.expect(TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;
        Some(condition)
    }

    /// Parse `return [expr];`
    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // consume 'return'

        let value = if self.peek() != TokenKind::Semicolon {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.expect(TokenKind::Semicolon)?;
        let span = start.merge(&self.previous_span());

        Some(Stmt::Return(ReturnStmt {
            id: self.next_id(),
            value,
            span,
        }))
    }

    /// Parse `expr;`
    fn parse_expr_stmt(&mut self) -> Option<Stmt> {
        let expr = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let span = expr.span.merge(&self.previous_span());

        Some(Stmt::Expr(ExprStmt {
            id: self.next_id(),
            expr,
            span,
        }))
    }
}
