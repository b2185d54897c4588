pub mod attribute;
pub mod error;
pub mod reactor;
pub mod scope;
pub mod type_checker;
pub mod types;

mod check_inferred;
mod check_returns;
mod check_types;
mod resolve_references;
mod resolve_types;

use blc_common::Phase;
use tracing::{debug, info, warn};

use crate::ast::{CompilationUnit, NodeId, Stmt};

pub use attribute::{AttrName, Attribute, Owner, ReturnFlow, Value};
pub use error::{AnalysisError, ReactorError, SemanticError};
pub use reactor::{Reactor, RunStats};
pub use scope::{ScopeId, SymbolId, SymbolKind, SymbolTable};
pub use types::Type;

/// A compilation unit that passed semantic analysis, with every resolved
/// attribute.
pub struct Analysis<'a> {
    unit: &'a CompilationUnit,
    symbols: SymbolTable,
    reactor: Reactor<'a>,
}

impl<'a> Analysis<'a> {
    pub fn unit(&self) -> &'a CompilationUnit {
        self.unit
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn reactor(&self) -> &Reactor<'a> {
        &self.reactor
    }

    pub fn get(&self, owner: impl Into<Owner>, name: AttrName) -> Option<&Value> {
        self.reactor.get(&Attribute::new(owner, name))
    }

    pub fn type_of(&self, node: NodeId) -> Option<Type> {
        self.reactor.get_as(&AttrName::Type.of(node))
    }

    pub fn symbol_of(&self, node: NodeId) -> Option<SymbolId> {
        self.reactor.get_as(&AttrName::Symbol.of(node))
    }

    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.reactor.get_as(&AttrName::Scope.of(node))
    }

    pub fn symbol_type(&self, symbol: SymbolId) -> Option<Type> {
        self.reactor.get_as(&AttrName::Type.of(symbol))
    }
}

impl std::fmt::Debug for Analysis<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analysis")
            .field("symbols", &self.symbols.symbols().count())
            .field("reactor", &self.reactor)
            .finish()
    }
}

/// Run every phase on `unit`.
pub fn analyze(unit: &CompilationUnit) -> Result<Analysis<'_>, AnalysisError> {
    analyze_until(unit, Phase::CheckReturns)
}

/// Run the phases up to and including `last`.
///
/// Phases share one reactor. A phase that leaves root errors stops the
/// pipeline: the result lists all of that phase's errors and no later
/// phase runs.
pub fn analyze_until(unit: &CompilationUnit, last: Phase) -> Result<Analysis<'_>, AnalysisError> {
    let mut symbols = SymbolTable::new();
    let mut reactor = Reactor::new();
    for (symbol, ty) in symbols.builtin_types() {
        reactor.set(AttrName::Type.of(*symbol), ty.clone())?;
    }

    for phase in Phase::ALL {
        info!(phase = %phase, "starting phase");
        let stats = match phase {
            Phase::ResolveReferences => resolve_references::run(unit, &mut reactor, &mut symbols)?,
            Phase::ResolveTypes => resolve_types::run(unit, &mut reactor, &symbols)?,
            Phase::CheckInferred => check_inferred::run(unit, &mut reactor, &symbols)?,
            Phase::CheckTypes => check_types::run(unit, &mut reactor, &symbols)?,
            Phase::CheckReturns => check_returns::run(unit, &mut reactor, &symbols)?,
        };

        let errors = reactor.errors();
        debug!(
            phase = %phase,
            rules = stats.executed,
            discarded = stats.discarded,
            errors = errors.len(),
            "finished phase"
        );
        if !errors.is_empty() {
            warn!(phase = %phase, errors = errors.len(), "phase rejected the program");
            return Err(AnalysisError::Rejected { phase, errors });
        }
        if phase == last {
            break;
        }
    }

    Ok(Analysis {
        unit,
        symbols,
        reactor,
    })
}

/// The symbol a declaration or reference node was bound to.
fn symbol_of(reactor: &Reactor<'_>, node: NodeId) -> Result<SymbolId, ReactorError> {
    let attribute = AttrName::Symbol.of(node);
    reactor
        .get_as(&attribute)
        .ok_or(ReactorError::UnexpectedValue {
            attribute,
            expected: "symbol",
        })
}

/// Whether a statement takes part in return analysis.
fn contributes(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Block(_) | Stmt::If(_) | Stmt::Return(_))
}

/// Return-contributing statements of a block, up to and including the
/// first direct `return`.
fn contributing_statements(statements: &[Stmt]) -> Vec<NodeId> {
    let mut ids = Vec::new();
    for stmt in statements.iter().filter(|s| contributes(s)) {
        ids.push(stmt.id());
        if matches!(stmt, Stmt::Return(_)) {
            break;
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn stops_at_the_requested_phase() {
        // fails only in check-returns
        let source = "fun f() -> Int { }";
        let (unit, _) = parse(source);
        assert!(analyze_until(&unit, Phase::CheckTypes).is_ok());
        match analyze(&unit) {
            Err(AnalysisError::Rejected { phase, errors }) => {
                assert_eq!(phase, Phase::CheckReturns);
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        };
    }

    #[test]
    fn earlier_phase_errors_stop_the_pipeline() {
        let (unit, _) = parse("fun f() -> Int { return missing; }");
        match analyze(&unit) {
            Err(AnalysisError::Rejected { phase, errors }) => {
                assert_eq!(phase, Phase::ResolveReferences);
                assert_eq!(errors[0].message, "unknown identifier: missing");
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        };
    }

    #[test]
    fn contributing_stops_at_first_return() {
        let (unit, _) = parse("fun f() { var a = 1; { } return 1; if (true) { } }");
        let Stmt::Function(f) = &unit.statements[0] else {
            panic!("expected function")
        };
        let ids = contributing_statements(&f.body.statements);
        assert_eq!(ids, vec![f.body.statements[1].id(), f.body.statements[2].id()]);
    }

    #[test]
    fn queries_on_a_successful_analysis() {
        let (unit, _) = parse("var x = 1;");
        let analysis = analyze(&unit).unwrap();
        let Stmt::Variable(decl) = &unit.statements[0] else {
            panic!("expected variable")
        };
        let symbol = analysis.symbol_of(decl.id).unwrap();
        assert_eq!(analysis.symbol_type(symbol), Some(Type::Int));
        assert_eq!(analysis.type_of(decl.initializer.id), Some(Type::Int));
        assert!(analysis.scope_of(decl.initializer.id).is_some());
        assert_eq!(
            analysis.get(symbol, AttrName::Type),
            Some(&Value::Type(Type::Int))
        );
    }
}
