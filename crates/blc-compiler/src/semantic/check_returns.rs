//! Callables with a non-Unit type must return on every path.

use crate::ast::visitor::{self, Visitor};
use crate::ast::*;

use super::attribute::AttrName;
use super::error::{ReactorError, SemanticError};
use super::reactor::{Reactor, RunStats};
use super::scope::SymbolTable;
use super::types::Type;
use super::{contributes, contributing_statements, symbol_of};

pub fn run<'a>(
    unit: &'a CompilationUnit,
    reactor: &mut Reactor<'a>,
    symbols: &SymbolTable,
) -> Result<RunStats, ReactorError> {
    CheckReturns {
        reactor: &mut *reactor,
    }
    .visit_unit(unit)?;
    reactor.run(symbols)
}

struct CheckReturns<'r, 'a> {
    reactor: &'r mut Reactor<'a>,
}

impl<'a> Visitor<'a> for CheckReturns<'_, 'a> {
    type Error = ReactorError;

    fn visit_function(&mut self, func: &'a FunctionDecl) -> Result<(), ReactorError> {
        visitor::walk_function(self, func)?;
        let symbol = symbol_of(self.reactor, func.id)?;
        let ty = AttrName::Type.of(symbol);
        let returns = AttrName::Returns.of(func.body.id);
        let span = func.span;

        self.reactor
            .rule("check function returns")
            .using([ty, returns])
            .by(move |scope| {
                let needs_return = match scope.get::<Type>(&ty)? {
                    Type::Function(function) => *function.ret != Type::Unit,
                    _ => false,
                };
                if needs_return && !scope.get::<bool>(&returns)? {
                    scope.report(SemanticError::new(span, "missing return"));
                }
                Ok(())
            });
        Ok(())
    }

    fn visit_block(&mut self, block: &'a Block) -> Result<(), ReactorError> {
        for stmt in &block.statements {
            self.visit_stmt(stmt)?;
        }
        let returns = contributing_statements(&block.statements)
            .into_iter()
            .map(|id| AttrName::Returns.of(id))
            .collect();
        self.reactor.flat_map(
            "block returns",
            returns,
            AttrName::Returns.of(block.id),
            |returns: Vec<bool>, _| Ok::<_, SemanticError>(returns.into_iter().any(|r| r)),
        );
        Ok(())
    }

    fn visit_if(&mut self, stmt: &'a IfStmt) -> Result<(), ReactorError> {
        visitor::walk_if(self, stmt)?;
        let target = AttrName::Returns.of(stmt.id);
        let branches: Vec<&Stmt> = std::iter::once(&*stmt.then_branch)
            .chain(stmt.else_branch.as_deref())
            .collect();

        // without an else, or with a branch that cannot return, some path
        // falls through
        if branches.len() < 2 || !branches.iter().all(|branch| contributes(branch)) {
            return self.reactor.set(target, false);
        }
        self.reactor.flat_map(
            "if returns",
            branches
                .iter()
                .map(|branch| AttrName::Returns.of(branch.id()))
                .collect(),
            target,
            |returns: Vec<bool>, _| Ok::<_, SemanticError>(returns.into_iter().all(|r| r)),
        );
        Ok(())
    }

    fn visit_return(&mut self, stmt: &'a ReturnStmt) -> Result<(), ReactorError> {
        self.reactor.set(AttrName::Returns.of(stmt.id), true)?;
        match &stmt.value {
            Some(value) => self.visit_expr(value),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parse;
    use crate::semantic::{analyze, AnalysisError};

    fn errors(source: &str) -> Vec<String> {
        let (unit, diagnostics) = parse(source);
        assert!(!diagnostics.has_errors(), "parse failed: {:?}", diagnostics);
        let result = match analyze(&unit) {
            Ok(_) => vec![],
            Err(AnalysisError::Rejected { errors, .. }) => {
                errors.into_iter().map(|e| e.message).collect()
            }
            Err(err) => panic!("{}", err),
        };
        result
    }

    #[test]
    fn if_without_else_can_fall_through() {
        assert_eq!(
            errors("fun f(c: Boolean) -> Int { if (c) { return 1; } }"),
            vec!["missing return"]
        );
        assert!(errors("fun f(c: Boolean) -> Int { if (c) { return 1; } else { return 2; } }")
            .is_empty());
    }

    #[test]
    fn nested_blocks_and_chains() {
        assert!(errors("fun f() -> Int { { { return 1; } } }").is_empty());
        assert!(errors(
            "fun f(n: Int) -> Int { if (n < 0) return 0; else if (n == 0) { return 1; } else return 2; }"
        )
        .is_empty());
        assert_eq!(
            errors("fun f(n: Int) -> Int { if (n < 0) return 0; else if (n == 0) { return 1; } }"),
            vec!["missing return"]
        );
    }

    #[test]
    fn loops_do_not_count() {
        assert_eq!(
            errors("fun f() -> Int { while (true) { return 1; } }"),
            vec!["missing return"]
        );
        assert_eq!(
            errors("fun f(c: Boolean) -> Int { if (c) { var x = 1; } else { return 1; } }"),
            vec!["missing return"]
        );
    }

    #[test]
    fn unit_functions_and_methods() {
        assert!(errors("fun f() { } fun g() -> Unit { }").is_empty());
        assert_eq!(
            errors("class C { fun m() -> Int { } }"),
            vec!["missing return"]
        );
    }
}
