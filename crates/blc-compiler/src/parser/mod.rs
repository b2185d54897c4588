mod declarations;
mod expressions;
mod statements;

use blc_common::{Diagnostic, DiagnosticBag, Span};

use crate::ast::*;
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::Lexer;

/// Lex and parse a whole source text.
///
/// Lexer and parser diagnostics are returned together; the unit is
/// only meaningful when the bag holds no errors.
pub fn parse(source: &str) -> (CompilationUnit, DiagnosticBag) {
    let (tokens, mut diagnostics) = Lexer::new(source).tokenize();
    let (unit, parse_diags) = Parser::new(tokens).parse();
    diagnostics.extend(parse_diags.into_diagnostics());
    (unit, diagnostics)
}

/// Recursive descent parser for the BL language.
///
/// Uses Pratt parsing for expression precedence. Every node gets a
/// fresh `NodeId` when it is built.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_id: u32,
    diagnostics: DiagnosticBag,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token::eof(Span::new(end, end)));
        }
        Self {
            tokens,
            pos: 0,
            next_id: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    /// Parse the entire token stream into a compilation unit.
    pub fn parse(mut self) -> (CompilationUnit, DiagnosticBag) {
        let mut statements = Vec::new();
        let start = self.current_span();

        while !self.is_at_end() {
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(),
            }
        }

        let span = start.merge(&self.current_span());
        let unit = CompilationUnit {
            id: self.next_id(),
            statements,
            span,
        };
        (unit, self.diagnostics)
    }

    // ========================================================================
    // Token manipulation helpers
    // ========================================================================

    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    /// The current token; the trailing `Eof` once input is exhausted.
    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    /// The token just consumed.
    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    /// Consume a token of the expected kind, or report an error.
    fn expect(&mut self, kind: TokenKind) -> Option<&Token> {
        if self.peek() == kind {
            return Some(self.advance());
        }
        let token = self.current();
        let mut diagnostic = Diagnostic::error(format!(
            "expected {}, found {}",
            kind.describe(),
            token.kind.describe()
        ))
        .with_span(token.span);
        if kind == TokenKind::Semicolon {
            let end = self.previous_span().end;
            diagnostic = diagnostic
                .with_related(Span::new(end, end), "statement ends here")
                .with_suggestion("add ';' after the statement");
        }
        self.diagnostics.report(diagnostic);
        None
    }

    /// Consume an identifier, returning its name and span.
    fn expect_identifier(&mut self) -> Option<(String, Span)> {
        let token = self.expect(TokenKind::Identifier)?;
        Some((token.lexeme.clone(), token.span))
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.peek() == TokenKind::Eof
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn previous_span(&self) -> Span {
        self.previous().span
    }

    fn error_at_current(&mut self, expected: &str) {
        let token = self.current();
        let message = format!("expected {}, found {}", expected, token.kind.describe());
        let span = token.span;
        self.diagnostics.error(message, span);
    }

    /// Error recovery: skip tokens until a statement boundary.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek() {
                TokenKind::Fun
                | TokenKind::Var
                | TokenKind::Struct
                | TokenKind::Class
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::RightBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn parse_ok(source: &str) -> CompilationUnit {
        let (unit, diags) = parse(source);
        assert!(
            !diags.has_errors(),
            "parse errors: {:?}",
            diags.diagnostics()
        );
        unit
    }

    fn parse_errors(source: &str) -> Vec<String> {
        let (_, diags) = parse(source);
        diags
            .into_diagnostics()
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn empty_unit() {
        let unit = parse_ok("");
        assert!(unit.statements.is_empty());
    }

    #[test]
    fn node_ids_are_unique() {
        let unit = parse_ok("fun f(a: Int) -> Int { return a + 1; } var x = f(2);");
        let mut ids = Vec::new();
        collect_ids(&unit, &mut ids);
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
        assert!(count > 10);
    }

    fn collect_ids(unit: &CompilationUnit, ids: &mut Vec<NodeId>) {
        use crate::ast::visitor::{walk_expr, walk_stmt, walk_type, Visitor};

        struct Collector<'a>(&'a mut Vec<NodeId>);
        impl<'ast> Visitor<'ast> for Collector<'_> {
            type Error = ();
            fn visit_stmt(&mut self, stmt: &'ast Stmt) -> Result<(), ()> {
                // blocks record themselves in visit_block
                if !matches!(stmt, Stmt::Block(_)) {
                    self.0.push(stmt.id());
                }
                walk_stmt(self, stmt)
            }
            fn visit_param(&mut self, param: &'ast Param) -> Result<(), ()> {
                self.0.push(param.id);
                self.visit_type(&param.ty)
            }
            fn visit_block(&mut self, block: &'ast Block) -> Result<(), ()> {
                self.0.push(block.id);
                for stmt in &block.statements {
                    self.visit_stmt(stmt)?;
                }
                Ok(())
            }
            fn visit_expr(&mut self, expr: &'ast Expr) -> Result<(), ()> {
                self.0.push(expr.id);
                walk_expr(self, expr)
            }
            fn visit_type(&mut self, ty: &'ast TypeExpr) -> Result<(), ()> {
                self.0.push(ty.id);
                walk_type(self, ty)
            }
        }

        ids.push(unit.id);
        let _ = Collector(ids).visit_unit(unit);
    }

    #[test]
    fn reports_missing_semicolon() {
        let errs = parse_errors("var x = 1");
        assert_eq!(errs, vec!["expected ';', found end of file"]);
    }

    #[test]
    fn recovers_after_bad_statement() {
        let (unit, diags) = parse("var = 1; fun ok() { } var y = ;");
        assert_eq!(diags.diagnostics().len(), 2);
        assert!(unit
            .statements
            .iter()
            .any(|s| matches!(s, Stmt::Function(f) if f.name == "ok")));
    }

    #[test]
    fn lexer_errors_are_included() {
        let errs = parse_errors("var s = \"open;");
        assert!(errs.iter().any(|e| e.contains("unterminated string")));
    }
}
