use crate::ast::*;
use crate::lexer::token::TokenKind;

use super::Parser;

// ============================================================================
// Binding powers for Pratt parsing
// ============================================================================
//
// Higher values bind tighter. (left_bp, right_bp): left < right = left-assoc.
//
//  Assignment   =                (2, 1)   right-assoc
//  Logical OR   ||               (3, 4)
//  Logical AND  &&               (5, 6)
//  Equality     ==, !=           (7, 8)
//  Comparison   <, >, <=, >=     (9, 10)
//  Additive     +, -             (11, 12)
//  Multiplicative *, /, %        (13, 14)
//  Prefix       !, - (unary)     15
//  Postfix      (), [], .        handled in parse_postfix

fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
    match kind {
        TokenKind::Equal => Some((2, 1)),
        TokenKind::PipePipe => Some((3, 4)),
        TokenKind::AmpAmp => Some((5, 6)),
        TokenKind::EqualEqual | TokenKind::BangEqual => Some((7, 8)),
        TokenKind::Less | TokenKind::Greater | TokenKind::LessEqual | TokenKind::GreaterEqual => {
            Some((9, 10))
        }
        TokenKind::Plus | TokenKind::Minus => Some((11, 12)),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some((13, 14)),
        _ => None,
    }
}

const PREFIX_BP: u8 = 15;

impl Parser {
    /// Parse an expression using Pratt parsing.
    pub(super) fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_expr_bp(0)
    }

    /// Core Pratt parser: parse an expression with a minimum binding power.
    fn parse_expr_bp(&mut self, min_bp: u8) -> Option<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            lhs = self.parse_postfix(lhs)?;

            let op_kind = self.peek();
            let Some((left_bp, right_bp)) = infix_binding_power(op_kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.advance(); // consume operator

            let rhs = self.parse_expr_bp(right_bp)?;
            let span = lhs.span.merge(&rhs.span);
            let kind = match token_to_binary_op(op_kind) {
                Some(op) => ExprKind::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
                None => ExprKind::Assign {
                    target: Box::new(lhs),
                    value: Box::new(rhs),
                },
            };
            lhs = Expr::new(self.next_id(), kind, span);
        }

        Some(lhs)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let start = self.current_span();
        self.advance(); // consume operator

        let operand = self.parse_expr_bp(PREFIX_BP)?;
        let span = start.merge(&operand.span);
        Some(Expr::new(
            self.next_id(),
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// Parse a primary expression.
    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let kind = match self.peek() {
            TokenKind::IntLiteral => {
                let token = self.advance().clone();
                let clean = token.lexeme.replace('_', "");
                match clean.parse::<i64>() {
                    Ok(value) => ExprKind::Int(value),
                    Err(_) => {
                        self.diagnostics.error(
                            format!("integer literal '{}' is out of range", token.lexeme),
                            token.span,
                        );
                        ExprKind::Int(0)
                    }
                }
            }
            TokenKind::FloatLiteral => {
                let token = self.advance().clone();
                let clean = token.lexeme.replace('_', "");
                match clean.parse::<f64>() {
                    Ok(value) => ExprKind::Float(value),
                    Err(_) => {
                        self.diagnostics.error(
                            format!("invalid float literal '{}'", token.lexeme),
                            token.span,
                        );
                        ExprKind::Float(0.0)
                    }
                }
            }
            TokenKind::StringLiteral => ExprKind::String(self.advance().lexeme.clone()),
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Unit => {
                self.advance();
                ExprKind::Unit
            }
            TokenKind::SelfKw => {
                self.advance();
                ExprKind::SelfRef
            }
            TokenKind::Identifier => ExprKind::Reference(self.advance().lexeme.clone()),
            TokenKind::LeftParen => {
                self.advance(); // consume '('
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParen)?;
                // Grouping keeps the inner node; only the span widens.
                let span = start.merge(&self.previous_span());
                return Some(Expr { span, ..inner });
            }
            TokenKind::LeftBracket => {
                self.advance(); // consume '['
                let elements = self.parse_comma_list(TokenKind::RightBracket)?;
                ExprKind::Array(elements)
            }
            _ => {
                self.error_at_current("expression");
                return None;
            }
        };
        let span = start.merge(&self.previous_span());
        Some(Expr::new(self.next_id(), kind, span))
    }

    /// Apply call, member and index suffixes to `expr`.
    fn parse_postfix(&mut self, mut expr: Expr) -> Option<Expr> {
        loop {
            match self.peek() {
                // Function call: expr(args)
                TokenKind::LeftParen => {
                    self.advance(); // consume '('
                    let args = self.parse_comma_list(TokenKind::RightParen)?;
                    let span = expr.span.merge(&self.previous_span());
                    expr = Expr::new(
                        self.next_id(),
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }

                // Method call `e.m(args)` or field select `e.f`
                TokenKind::Dot => {
                    self.advance(); // consume '.'
                    let start = expr.span;
                    let (name, _) = self.expect_identifier()?;

                    let kind = if self.eat(TokenKind::LeftParen) {
                        let args = self.parse_comma_list(TokenKind::RightParen)?;
                        ExprKind::MethodCall {
                            receiver: Box::new(expr),
                            method: name,
                            args,
                        }
                    } else {
                        ExprKind::FieldSelect {
                            object: Box::new(expr),
                            field: name,
                        }
                    };
                    let span = start.merge(&self.previous_span());
                    expr = Expr::new(self.next_id(), kind, span);
                }

                // Index: expr[index]
                TokenKind::LeftBracket => {
                    self.advance(); // consume '['
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RightBracket)?;
                    let span = expr.span.merge(&self.previous_span());
                    expr = Expr::new(
                        self.next_id(),
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }

                _ => return Some(expr),
            }
        }
    }

    /// Parse `e, e, ...` up to and including `close`. The opening
    /// delimiter has already been consumed.
    fn parse_comma_list(&mut self, close: TokenKind) -> Option<Vec<Expr>> {
        let mut items = Vec::new();
        if self.peek() != close {
            loop {
                items.push(self.parse_expression()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(close)?;
        Some(items)
    }
}

fn token_to_binary_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        TokenKind::Percent => Some(BinaryOp::Mod),
        TokenKind::EqualEqual => Some(BinaryOp::Eq),
        TokenKind::BangEqual => Some(BinaryOp::Neq),
        TokenKind::Less => Some(BinaryOp::Lt),
        TokenKind::Greater => Some(BinaryOp::Gt),
        TokenKind::LessEqual => Some(BinaryOp::Lte),
        TokenKind::GreaterEqual => Some(BinaryOp::Gte),
        TokenKind::AmpAmp => Some(BinaryOp::And),
        TokenKind::PipePipe => Some(BinaryOp::Or),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::parse;
    use crate::parser::tests::parse_ok;

    fn expr(source: &str) -> Expr {
        let unit = parse_ok(&format!("{};", source));
        match unit.statements.into_iter().next() {
            Some(Stmt::Expr(stmt)) => stmt.expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    /// Render an expression with explicit grouping.
    fn show(e: &Expr) -> String {
        match &e.kind {
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Float(v) => v.to_string(),
            ExprKind::String(s) => format!("{:?}", s),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Unit => "unit".into(),
            ExprKind::Array(items) => {
                format!("[{}]", items.iter().map(show).collect::<Vec<_>>().join(", "))
            }
            ExprKind::Reference(name) => name.clone(),
            ExprKind::SelfRef => "self".into(),
            ExprKind::Unary { op, operand } => format!("({}{})", op.symbol(), show(operand)),
            ExprKind::Binary { op, left, right } => {
                format!("({} {} {})", show(left), op.symbol(), show(right))
            }
            ExprKind::Assign { target, value } => format!("({} = {})", show(target), show(value)),
            ExprKind::Call { callee, args } => format!(
                "{}({})",
                show(callee),
                args.iter().map(show).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => format!(
                "{}.{}({})",
                show(receiver),
                method,
                args.iter().map(show).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::FieldSelect { object, field } => format!("{}.{}", show(object), field),
            ExprKind::Index { object, index } => format!("{}[{}]", show(object), show(index)),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(show(&expr("1 + 2 * 3 - 4")), "((1 + (2 * 3)) - 4)");
        assert_eq!(show(&expr("(1 + 2) * 3")), "((1 + 2) * 3)");
    }

    #[test]
    fn logical_and_comparison_precedence() {
        assert_eq!(
            show(&expr("a < b && c == d || !e")),
            "(((a < b) && (c == d)) || (!e))"
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(show(&expr("a = b = 1 + 2")), "(a = (b = (1 + 2)))");
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        assert_eq!(show(&expr("-a * b")), "((-a) * b)");
        assert_eq!(show(&expr("-a.b")), "(-a.b)");
    }

    #[test]
    fn postfix_chain() {
        assert_eq!(
            show(&expr("p.items[0].name.len(1, x)")),
            "p.items[0].name.len(1, x)"
        );
        let e = expr("self.pos.x");
        assert!(matches!(e.kind, ExprKind::FieldSelect { ref field, .. } if field == "x"));
    }

    #[test]
    fn literals() {
        assert_eq!(
            show(&expr("[1_000, 2.5, \"s\", true, unit, []]")),
            "[1000, 2.5, \"s\", true, unit, []]"
        );
    }

    #[test]
    fn member_access_span_starts_at_receiver() {
        let e = expr("abc.def");
        assert_eq!(e.span.start, 0);
        assert_eq!(e.span.end, 7);
    }

    #[test]
    fn missing_expression_is_reported() {
        let (_, diags) = parse("var x = );");
        assert_eq!(
            diags.diagnostics()[0].message,
            "expected expression, found ')'"
        );
    }

    #[test]
    fn integer_overflow_is_reported() {
        let (_, diags) = parse("99999999999999999999;");
        assert!(diags.diagnostics()[0].message.contains("out of range"));
    }
}
