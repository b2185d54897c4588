//! Structural type rules over the resolved types.
//!
//! Every check is a rule with no exports: it reads the types it needs and
//! reports a root error for each violation.

use blc_common::Span;

use crate::ast::visitor::{self, Visitor};
use crate::ast::*;

use super::attribute::{AttrName, Attribute};
use super::error::{ReactorError, SemanticError};
use super::reactor::{Reactor, RunStats};
use super::scope::{SymbolId, SymbolKind, SymbolTable};
use super::symbol_of;
use super::type_checker::{
    binary_operand_types, call_parameters, check_arguments, check_comparable, expect_assignable,
    expect_one_of, unary_operand_types, ArgumentError,
};
use super::types::Type;

pub fn run<'a>(
    unit: &'a CompilationUnit,
    reactor: &mut Reactor<'a>,
    symbols: &SymbolTable,
) -> Result<RunStats, ReactorError> {
    CheckTypes {
        reactor: &mut *reactor,
        symbols,
    }
    .visit_unit(unit)?;
    reactor.run(symbols)
}

struct CheckTypes<'r, 'a> {
    reactor: &'r mut Reactor<'a>,
    symbols: &'r SymbolTable,
}

fn type_of(owner: impl Into<super::attribute::Owner>) -> Attribute {
    AttrName::Type.of(owner)
}

impl<'r, 'a> CheckTypes<'r, 'a> {
    /// Register a check over the types in `deps`.
    fn check<F>(&mut self, name: &'static str, deps: Vec<Attribute>, f: F)
    where
        F: FnOnce(Vec<Type>) -> Vec<SemanticError> + 'a,
    {
        self.reactor
            .rule(name)
            .using(deps.iter().copied())
            .by(move |scope| {
                let mut types = Vec::with_capacity(deps.len());
                for dep in &deps {
                    types.push(scope.get::<Type>(dep)?);
                }
                for error in f(types) {
                    scope.report(error);
                }
                Ok(())
            });
    }

    /// The type of `expr` must be one of `accepted`.
    fn check_one_of(&mut self, name: &'static str, expr: &Expr, accepted: Vec<Type>) {
        let span = expr.span;
        self.check(name, vec![type_of(expr.id)], move |types| {
            types
                .iter()
                .filter_map(|ty| expect_one_of(ty, &accepted).err())
                .map(|message| SemanticError::new(span, message))
                .collect()
        });
    }

    /// `value` must be assignable to the type held by `target`.
    fn check_assignable(&mut self, name: &'static str, value: &Expr, target: Attribute) {
        let span = value.span;
        self.check(name, vec![type_of(value.id), target], move |types| match types.as_slice() {
            [value, target] => expect_assignable(value, target)
                .err()
                .map(|message| SemanticError::new(span, message))
                .into_iter()
                .collect(),
            _ => vec![],
        });
    }

    /// Arity and per-position argument checks against a parameter list
    /// taken from the first dependency's type.
    fn check_call(
        &mut self,
        name: &'static str,
        span: Span,
        source: Attribute,
        args: &[Expr],
        parameters: impl FnOnce(&Type) -> Option<Vec<(String, Type)>> + 'a,
    ) {
        let spans: Vec<Span> = args.iter().map(|arg| arg.span).collect();
        let deps = std::iter::once(source)
            .chain(args.iter().map(|arg| type_of(arg.id)))
            .collect();
        self.check(name, deps, move |mut types| {
            let args = types.split_off(1);
            let Some(params) = types.first().and_then(parameters) else {
                return vec![];
            };
            check_arguments(&params, &args)
                .into_iter()
                .map(|error| {
                    let at = match &error {
                        ArgumentError::Arity { .. } => span,
                        ArgumentError::Incompatible { position, .. } => spans[*position],
                    };
                    SemanticError::new(at, error.message())
                })
                .collect()
        });
    }

    fn check_assignment_target(&mut self, target: &Expr) -> Result<bool, ReactorError> {
        let valid = match &target.kind {
            ExprKind::Reference(_) => {
                let symbol = symbol_of(self.reactor, target.id)?;
                matches!(
                    self.symbols.symbol(symbol).kind,
                    SymbolKind::Variable | SymbolKind::Field
                )
            }
            ExprKind::FieldSelect { .. } | ExprKind::Index { .. } => true,
            _ => false,
        };
        if !valid {
            self.reactor.error(
                SemanticError::new(target.span, "invalid assignment target"),
                &[],
            );
        }
        Ok(valid)
    }

    fn binary(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        let accepted = binary_operand_types(op);
        if !accepted.is_empty() {
            self.check_one_of("check left operand", left, accepted.clone());
            self.check_one_of("check right operand", right, accepted);
        }
        if op.is_comparison() || op.is_equality() {
            let span = expr.span;
            self.check(
                "check operands are comparable",
                vec![type_of(left.id), type_of(right.id)],
                move |types| match types.as_slice() {
                    [left, right] => check_comparable(op, left, right)
                        .err()
                        .map(|message| SemanticError::new(span, message))
                        .into_iter()
                        .collect(),
                    _ => vec![],
                },
            );
        }
    }

    fn returned(&mut self, stmt: &ReturnStmt) -> Result<(), ReactorError> {
        let attr = AttrName::ContainingFunction.of(stmt.id);
        let function: SymbolId =
            self.reactor
                .get_as(&attr)
                .ok_or(ReactorError::UnexpectedValue {
                    attribute: attr,
                    expected: "symbol",
                })?;
        let span = stmt.span;
        let value_span = stmt.value.as_ref().map(|value| value.span);
        let deps = std::iter::once(type_of(function))
            .chain(stmt.value.as_ref().map(|value| type_of(value.id)))
            .collect();

        self.check("check return", deps, move |types| {
            let Some(Type::Function(function)) = types.first() else {
                return vec![];
            };
            let expected = &*function.ret;
            match (types.get(1), value_span) {
                (None, _) if *expected != Type::Unit => vec![SemanticError::new(
                    span,
                    "return without value in a function with non-Unit return type",
                )],
                (Some(actual), Some(value_span)) if !actual.is_assignable_to(expected) => {
                    vec![SemanticError::new(
                        value_span,
                        format!(
                            "incompatible return value, expected {} but got {}",
                            expected, actual
                        ),
                    )]
                }
                _ => vec![],
            }
        });
        Ok(())
    }
}

impl<'r, 'a> Visitor<'a> for CheckTypes<'r, 'a> {
    type Error = ReactorError;

    fn visit_variable(&mut self, decl: &'a VariableDecl) -> Result<(), ReactorError> {
        let symbol = symbol_of(self.reactor, decl.id)?;
        self.check_assignable(
            "check initializer matches variable type",
            &decl.initializer,
            type_of(symbol),
        );
        visitor::walk_variable(self, decl)
    }

    fn visit_if(&mut self, stmt: &'a IfStmt) -> Result<(), ReactorError> {
        self.check_one_of("check if condition", &stmt.condition, vec![Type::Boolean]);
        visitor::walk_if(self, stmt)
    }

    fn visit_while(&mut self, stmt: &'a WhileStmt) -> Result<(), ReactorError> {
        self.check_one_of("check while condition", &stmt.condition, vec![Type::Boolean]);
        self.visit_expr(&stmt.condition)?;
        self.visit_stmt(&stmt.body)
    }

    fn visit_return(&mut self, stmt: &'a ReturnStmt) -> Result<(), ReactorError> {
        self.returned(stmt)?;
        match &stmt.value {
            Some(value) => self.visit_expr(value),
            None => Ok(()),
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) -> Result<(), ReactorError> {
        match &expr.kind {
            ExprKind::Index { index, .. } => {
                self.check_one_of("check index is Int", index, vec![Type::Int]);
            }
            ExprKind::Binary { op, left, right } => self.binary(expr, *op, left, right),
            ExprKind::Unary { op, operand } => {
                self.check_one_of("check unary operand", operand, unary_operand_types(*op));
            }
            ExprKind::Assign { target, value } => {
                if self.check_assignment_target(target)? {
                    self.check_assignable(
                        "check assigned value matches target type",
                        value,
                        type_of(target.id),
                    );
                }
            }
            ExprKind::Call { callee, args } => self.check_call(
                "check call arguments",
                expr.span,
                type_of(callee.id),
                args,
                call_parameters,
            ),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let method: &'a str = method;
                self.check_call(
                    "check method call arguments",
                    expr.span,
                    type_of(receiver.id),
                    args,
                    move |ty| match ty {
                        Type::Class(class) => class.method(method).and_then(call_parameters),
                        _ => None,
                    },
                );
            }
            _ => {}
        }
        visitor::walk_expr(self, expr)
    }
}
