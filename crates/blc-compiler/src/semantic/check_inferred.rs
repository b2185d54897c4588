//! Everything type inference was responsible for must have a type by now.
//!
//! Inference leaves an attribute unset when its rule never became ready,
//! typically a cycle such as a function whose return type depends on a call
//! to itself. Those holes are reported here.

use std::collections::HashSet;

use blc_common::Span;

use crate::ast::visitor::{self, Visitor};
use crate::ast::*;

use super::attribute::{AttrName, Attribute};
use super::error::{ReactorError, SemanticError};
use super::reactor::{Reactor, RunStats};
use super::scope::{SymbolId, SymbolTable};
use super::symbol_of;

pub fn run<'a>(
    unit: &'a CompilationUnit,
    reactor: &mut Reactor<'a>,
    symbols: &SymbolTable,
) -> Result<RunStats, ReactorError> {
    CheckInferred {
        reactor: &mut *reactor,
        reported: HashSet::new(),
    }
    .visit_unit(unit)?;
    reactor.run(symbols)
}

struct CheckInferred<'r, 'a> {
    reactor: &'r mut Reactor<'a>,
    /// Symbols whose missing type has already been reported.
    reported: HashSet<SymbolId>,
}

impl CheckInferred<'_, '_> {
    fn expect(&mut self, attr: Attribute, span: Span, what: &str) {
        if self.reactor.get(&attr).is_none() {
            self.reactor.error(
                SemanticError::new(span, format!("unable to infer type for {}", what)),
                &[],
            );
        }
    }

    fn expect_symbol(&mut self, node: NodeId, span: Span, name: &str) -> Result<(), ReactorError> {
        let symbol = symbol_of(self.reactor, node)?;
        self.expect_once(symbol, span, name);
        Ok(())
    }

    /// A use of a symbol whose own type is missing repeats the symbol's
    /// error, so only its first occurrence is reported.
    fn expect_use(&mut self, node: NodeId, span: Span, name: &str) {
        let symbol = self
            .reactor
            .get_as::<SymbolId>(&AttrName::Symbol.of(node));
        match symbol {
            Some(symbol) if self.reactor.get(&AttrName::Type.of(symbol)).is_none() => {
                self.expect_once(symbol, span, name)
            }
            _ => self.expect(AttrName::Type.of(node), span, name),
        }
    }

    fn expect_once(&mut self, symbol: SymbolId, span: Span, name: &str) {
        if self.reported.contains(&symbol) {
            return;
        }
        if self.reactor.get(&AttrName::Type.of(symbol)).is_none() {
            self.reported.insert(symbol);
            self.expect(AttrName::Type.of(symbol), span, name);
        }
    }
}

impl<'a> Visitor<'a> for CheckInferred<'_, 'a> {
    type Error = ReactorError;

    fn visit_function(&mut self, func: &'a FunctionDecl) -> Result<(), ReactorError> {
        self.expect_symbol(func.id, func.span, &func.name)?;
        visitor::walk_function(self, func)
    }

    fn visit_struct(&mut self, decl: &'a StructDecl) -> Result<(), ReactorError> {
        self.expect_symbol(decl.id, decl.span, &decl.name)?;
        for field in &decl.fields {
            self.visit_field(field)?;
        }
        Ok(())
    }

    fn visit_class(&mut self, decl: &'a ClassDecl) -> Result<(), ReactorError> {
        self.expect_symbol(decl.id, decl.span, &decl.name)?;
        visitor::walk_class(self, decl)
    }

    fn visit_variable(&mut self, decl: &'a VariableDecl) -> Result<(), ReactorError> {
        self.expect_symbol(decl.id, decl.span, &decl.name)?;
        visitor::walk_variable(self, decl)
    }

    fn visit_expr(&mut self, expr: &'a Expr) -> Result<(), ReactorError> {
        match &expr.kind {
            ExprKind::Reference(name) => self.expect_use(expr.id, expr.span, name),
            ExprKind::Array(_) => {
                self.expect(AttrName::Type.of(expr.id), expr.span, "array literal")
            }
            _ => {}
        }
        visitor::walk_expr(self, expr)
    }

    fn visit_type(&mut self, ty: &'a TypeExpr) -> Result<(), ReactorError> {
        if let TypeExprKind::Named(name) = &ty.kind {
            self.expect_use(ty.id, ty.span, name);
        }
        visitor::walk_type(self, ty)
    }
}

#[cfg(test)]
mod tests {
    use blc_common::Phase;

    use crate::parse;
    use crate::semantic::{analyze_until, AnalysisError};

    fn rejection(source: &str) -> Option<(Phase, Vec<String>)> {
        let (unit, diagnostics) = parse(source);
        assert!(!diagnostics.has_errors(), "parse failed: {:?}", diagnostics);
        let result = match analyze_until(&unit, Phase::CheckInferred) {
            Ok(_) => None,
            Err(AnalysisError::Rejected { phase, errors }) => {
                Some((phase, errors.into_iter().map(|e| e.message).collect()))
            }
            Err(err) => panic!("{}", err),
        };
        result
    }

    #[test]
    fn well_typed_program_passes() {
        assert_eq!(
            rejection("fun f(n: Int) -> Int { if (n < 1) { return 1; } return n * f(n - 1); }"),
            None
        );
    }

    #[test]
    fn self_recursive_inference_is_reported() {
        let (phase, errors) =
            rejection("fun f(n: Int) { if (n < 1) { return 1; } return f(n - 1); }").unwrap();
        assert_eq!(phase, Phase::CheckInferred);
        assert_eq!(errors, vec!["unable to infer type for f"]);
    }

    #[test]
    fn each_uninferred_symbol_is_reported_once() {
        let source = "
            fun f(n: Int) { if (n < 1) { return 1; } return f(n - 1) + f(n - 2); }
            fun g() { print(f(3)); }
        ";
        let (_, errors) = rejection(source).unwrap();
        assert_eq!(errors, vec!["unable to infer type for f"]);
    }

    #[test]
    fn dependents_of_a_cycle_are_reported() {
        let source = "fun f() { return f(); } var x = f();";
        let (_, errors) = rejection(source).unwrap();
        assert!(errors.contains(&"unable to infer type for x".to_string()));
    }
}
