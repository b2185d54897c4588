//! Dependency-driven attribute resolution.
//!
//! A [`Reactor`] owns a write-once attribute store and a set of rules. Each
//! rule declares the attributes it reads and the attributes it exports; it
//! runs once, as soon as every dependency holds a value. Errors are values
//! too: when an attribute fails, every rule that depended on it is dropped
//! and its exports fail with a derived error pointing at the cause, so one
//! mistake is reported once.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::attribute::{Attribute, FromValue, Value};
use super::error::{ReactorError, SemanticError};
use super::scope::SymbolTable;

/// A rule body. It receives the dependency values through the scope and
/// must write each export exactly once.
pub type Computation<'a> =
    Box<dyn for<'r, 's> FnOnce(&'r mut RuleScope<'s, 'a>) -> Result<(), ReactorError> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RuleId(usize);

/// Index of an entry in the reactor's error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorId(usize);

/// An error together with the error that caused it, if it was derived.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub error: SemanticError,
    pub cause: Option<ErrorId>,
}

#[derive(Debug, Clone)]
enum Slot {
    Value(Value),
    Error(ErrorId),
}

struct Rule<'a> {
    name: &'static str,
    deps: Vec<Attribute>,
    exports: Vec<Attribute>,
    waiting: usize,
    computation: Computation<'a>,
}

/// What one call to [`Reactor::run`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub executed: usize,
    /// Rules whose dependencies never resolved; they are dropped.
    pub discarded: usize,
}

pub struct Reactor<'a> {
    store: IndexMap<Attribute, Slot>,
    errors: Vec<ErrorRecord>,
    rules: Vec<Option<Rule<'a>>>,
    dependents: HashMap<Attribute, Vec<RuleId>>,
    queue: VecDeque<RuleId>,
    running: bool,
}

impl Default for Reactor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reactor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("attributes", &self.store.len())
            .field("errors", &self.errors.len())
            .field("pending", &self.pending())
            .field("running", &self.running)
            .finish()
    }
}

impl<'a> Reactor<'a> {
    pub fn new() -> Self {
        Self {
            store: IndexMap::new(),
            errors: Vec::new(),
            rules: Vec::new(),
            dependents: HashMap::new(),
            queue: VecDeque::new(),
            running: false,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The value of `attr`, if it resolved without error.
    pub fn get(&self, attr: &Attribute) -> Option<&Value> {
        match self.store.get(attr) {
            Some(Slot::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Typed read of a resolved attribute.
    pub fn get_as<T: FromValue>(&self, attr: &Attribute) -> Option<T> {
        self.get(attr).cloned().and_then(T::from_value)
    }

    /// Whether `attr` holds a value or an error.
    pub fn is_resolved(&self, attr: &Attribute) -> bool {
        self.store.contains_key(attr)
    }

    /// The error recorded on `attr`, if it failed.
    pub fn error_of(&self, attr: &Attribute) -> Option<ErrorId> {
        match self.store.get(attr) {
            Some(Slot::Error(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn error_record(&self, id: ErrorId) -> &ErrorRecord {
        &self.errors[id.0]
    }

    /// Follow the cause chain of `id` to the root error.
    pub fn root_cause(&self, mut id: ErrorId) -> &SemanticError {
        while let Some(cause) = self.errors[id.0].cause {
            id = cause;
        }
        &self.errors[id.0].error
    }

    /// Resolved values in resolution order.
    pub fn attributes(&self) -> impl Iterator<Item = (&Attribute, &Value)> + '_ {
        self.store.iter().filter_map(|(attr, slot)| match slot {
            Slot::Value(value) => Some((attr, value)),
            Slot::Error(_) => None,
        })
    }

    /// Root errors: those not caused by another error, in reporting order.
    pub fn errors(&self) -> Vec<SemanticError> {
        self.errors
            .iter()
            .filter(|record| record.cause.is_none())
            .map(|record| record.error.clone())
            .collect()
    }

    /// Every error, including derived ones.
    pub fn all_errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Registered rules that have not run yet.
    pub fn pending(&self) -> usize {
        self.rules.iter().filter(|rule| rule.is_some()).count()
    }

    // ========================================================================
    // Seeding and errors
    // ========================================================================

    /// Pre-seed an attribute whose value is known statically. Only valid
    /// between runs.
    pub fn set(&mut self, attr: Attribute, value: impl Into<Value>) -> Result<(), ReactorError> {
        if self.running {
            return Err(ReactorError::AlreadyRunning);
        }
        if self.store.contains_key(&attr) {
            return Err(ReactorError::Redefined { attribute: attr });
        }
        self.resolve_value(attr, value.into())
    }

    /// Record `error`. With no affected attributes it is a root error on its
    /// own; otherwise each unresolved affected attribute fails with it. An
    /// error whose attributes have all failed already is dropped.
    pub fn error(&mut self, error: SemanticError, affected: &[Attribute]) {
        if affected.is_empty() {
            self.push_error(error, None);
            return;
        }
        let all_failed = affected
            .iter()
            .all(|attr| matches!(self.store.get(attr), Some(Slot::Error(_))));
        if all_failed {
            trace!(error = %error, "dropping error on already failed attributes");
            return;
        }
        let id = self.push_error(error, None);
        for attr in affected {
            self.fail(*attr, id);
        }
    }

    fn push_error(&mut self, error: SemanticError, cause: Option<ErrorId>) -> ErrorId {
        let id = ErrorId(self.errors.len());
        self.errors.push(ErrorRecord { error, cause });
        id
    }

    fn resolve_value(&mut self, attr: Attribute, value: Value) -> Result<(), ReactorError> {
        match self.store.get(&attr) {
            // first error wins
            Some(Slot::Error(_)) => return Ok(()),
            Some(Slot::Value(_)) => return Err(ReactorError::Redefined { attribute: attr }),
            None => {}
        }
        self.store.insert(attr, Slot::Value(value));

        for id in self.dependents.remove(&attr).unwrap_or_default() {
            if let Some(rule) = self.rules[id.0].as_mut() {
                rule.waiting -= 1;
                if rule.waiting == 0 {
                    self.queue.push_back(id);
                }
            }
        }
        Ok(())
    }

    /// Fail `attr` with `error` and poison everything downstream of it.
    fn fail(&mut self, attr: Attribute, error: ErrorId) {
        let mut work = VecDeque::from([(attr, error)]);
        while let Some((attr, error)) = work.pop_front() {
            if self.store.contains_key(&attr) {
                continue;
            }
            self.store.insert(attr, Slot::Error(error));

            for id in self.dependents.remove(&attr).unwrap_or_default() {
                let Some(rule) = self.rules[id.0].take() else {
                    continue;
                };
                trace!(rule = rule.name, attribute = %attr, "poisoned rule");
                if let Some(derived) = self.derive(&rule.exports, attr, error) {
                    work.extend(rule.exports.into_iter().map(|export| (export, derived)));
                }
            }
        }
    }

    /// Derived error for a rule that lost `attr`; `None` when the rule
    /// exports nothing.
    fn derive(&mut self, exports: &[Attribute], attr: Attribute, cause: ErrorId) -> Option<ErrorId> {
        if exports.is_empty() {
            return None;
        }
        let span = self.errors[cause.0].error.span;
        let error = SemanticError::new(span, format!("missing dependency {}", attr));
        Some(self.push_error(error, Some(cause)))
    }

    // ========================================================================
    // Rules
    // ========================================================================

    /// Start building a rule.
    pub fn rule(&mut self, name: &'static str) -> RuleBuilder<'_, 'a> {
        RuleBuilder {
            reactor: self,
            name,
            deps: Vec::new(),
            exports: Vec::new(),
        }
    }

    fn register(
        &mut self,
        name: &'static str,
        deps: Vec<Attribute>,
        exports: Vec<Attribute>,
        computation: Computation<'a>,
    ) {
        let mut unique = Vec::with_capacity(deps.len());
        for dep in deps {
            if !unique.contains(&dep) {
                unique.push(dep);
            }
        }
        let deps = unique;

        let failed = deps.iter().find_map(|dep| match self.store.get(dep) {
            Some(Slot::Error(id)) => Some((*dep, *id)),
            _ => None,
        });
        if let Some((attr, error)) = failed {
            trace!(rule = name, attribute = %attr, "rule registered against failed dependency");
            if let Some(derived) = self.derive(&exports, attr, error) {
                for export in exports {
                    self.fail(export, derived);
                }
            }
            return;
        }

        let id = RuleId(self.rules.len());
        let mut waiting = 0;
        for dep in &deps {
            if !self.store.contains_key(dep) {
                waiting += 1;
                self.dependents.entry(*dep).or_default().push(id);
            }
        }
        self.rules.push(Some(Rule {
            name,
            deps,
            exports,
            waiting,
            computation,
        }));
        if waiting == 0 {
            self.queue.push_back(id);
        }
    }

    /// One input to one output.
    pub fn map<T, U, F>(&mut self, name: &'static str, from: Attribute, to: Attribute, f: F)
    where
        T: FromValue,
        U: Into<Value>,
        F: FnOnce(T, &SymbolTable) -> Result<U, SemanticError> + 'a,
    {
        self.rule(name)
            .using([from])
            .exports([to])
            .by(move |scope| {
                let input = scope.get::<T>(&from)?;
                match f(input, scope.symbols()) {
                    Ok(value) => scope.set(to, value),
                    Err(error) => scope.fail(to, error),
                }
            });
    }

    /// Copy a value unchanged.
    pub fn copy(&mut self, name: &'static str, from: Attribute, to: Attribute) {
        self.map(name, from, to, |value: Value, _| Ok(value));
    }

    /// Many inputs, in order, to one output.
    pub fn flat_map<T, U, F>(&mut self, name: &'static str, from: Vec<Attribute>, to: Attribute, f: F)
    where
        T: FromValue,
        U: Into<Value>,
        F: FnOnce(Vec<T>, &SymbolTable) -> Result<U, SemanticError> + 'a,
    {
        self.rule(name)
            .using(from.iter().copied())
            .exports([to])
            .by(move |scope| {
                let inputs = from
                    .iter()
                    .map(|attr| scope.get::<T>(attr))
                    .collect::<Result<Vec<_>, _>>()?;
                match f(inputs, scope.symbols()) {
                    Ok(value) => scope.set(to, value),
                    Err(error) => scope.fail(to, error),
                }
            });
    }

    /// Run a side effect once `attr` resolves. The callback may register
    /// further rules through [`RuleScope::reactor`].
    pub fn on<T, F>(&mut self, name: &'static str, attr: Attribute, f: F)
    where
        T: FromValue,
        F: FnOnce(T, &mut RuleScope<'_, 'a>) -> Result<(), ReactorError> + 'a,
    {
        self.rule(name).using([attr]).by(move |scope| {
            let value = scope.get::<T>(&attr)?;
            f(value, scope)
        });
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Drain the ready queue to a fixpoint. Rules still waiting afterwards
    /// can never run and are discarded.
    pub fn run(&mut self, symbols: &SymbolTable) -> Result<RunStats, ReactorError> {
        self.running = true;
        let executed = self.drain(symbols);
        self.running = false;
        let executed = executed?;

        let discarded = self.pending();
        self.rules.clear();
        self.dependents.clear();

        let stats = RunStats {
            executed,
            discarded,
        };
        debug!(
            executed = stats.executed,
            discarded = stats.discarded,
            root_errors = self.errors.iter().filter(|r| r.cause.is_none()).count(),
            "reactor reached fixpoint"
        );
        Ok(stats)
    }

    fn drain(&mut self, symbols: &SymbolTable) -> Result<usize, ReactorError> {
        let mut executed = 0;
        while let Some(id) = self.queue.pop_front() {
            let Some(rule) = self.rules[id.0].take() else {
                continue;
            };
            let Rule {
                name,
                deps,
                exports,
                computation,
                ..
            } = rule;
            trace!(rule = name, exports = exports.len(), "running rule");

            let mut scope = RuleScope {
                reactor: self,
                symbols,
                rule: name,
                deps,
                exports,
                outputs: Vec::new(),
            };
            computation(&mut scope)?;
            let RuleScope {
                exports, outputs, ..
            } = scope;

            let missing: Vec<Attribute> = exports
                .iter()
                .filter(|export| !outputs.iter().any(|(attr, _)| attr == *export))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(ReactorError::MissingExports {
                    rule: name,
                    attributes: missing,
                });
            }

            for (attr, output) in outputs {
                match output {
                    Output::Value(value) => self.resolve_value(attr, value)?,
                    Output::Error(error) => self.error(error, &[attr]),
                }
            }
            executed += 1;
        }
        Ok(executed)
    }
}

/// Builder returned by [`Reactor::rule`].
pub struct RuleBuilder<'r, 'a> {
    reactor: &'r mut Reactor<'a>,
    name: &'static str,
    deps: Vec<Attribute>,
    exports: Vec<Attribute>,
}

impl<'r, 'a> RuleBuilder<'r, 'a> {
    pub fn using(mut self, attrs: impl IntoIterator<Item = Attribute>) -> Self {
        self.deps.extend(attrs);
        self
    }

    pub fn exports(mut self, attrs: impl IntoIterator<Item = Attribute>) -> Self {
        self.exports.extend(attrs);
        self
    }

    /// Register the rule with its computation.
    pub fn by<F>(self, computation: F)
    where
        F: for<'x, 's> FnOnce(&'x mut RuleScope<'s, 'a>) -> Result<(), ReactorError> + 'a,
    {
        self.reactor
            .register(self.name, self.deps, self.exports, Box::new(computation));
    }
}

enum Output {
    Value(Value),
    Error(SemanticError),
}

/// The view a running rule has of the reactor.
pub struct RuleScope<'r, 'a> {
    reactor: &'r mut Reactor<'a>,
    symbols: &'r SymbolTable,
    rule: &'static str,
    deps: Vec<Attribute>,
    exports: Vec<Attribute>,
    outputs: Vec<(Attribute, Output)>,
}

impl<'r, 'a> RuleScope<'r, 'a> {
    pub fn name(&self) -> &'static str {
        self.rule
    }

    /// Read a declared dependency.
    pub fn get<T: FromValue>(&self, attr: &Attribute) -> Result<T, ReactorError> {
        if !self.deps.contains(attr) {
            return Err(ReactorError::UndeclaredDependency {
                rule: self.rule,
                attribute: *attr,
            });
        }
        let value = self
            .reactor
            .get(attr)
            .cloned()
            .ok_or(ReactorError::UnexpectedValue {
                attribute: *attr,
                expected: T::KIND,
            })?;
        T::from_value(value).ok_or(ReactorError::UnexpectedValue {
            attribute: *attr,
            expected: T::KIND,
        })
    }

    fn check_export(&self, attr: &Attribute) -> Result<(), ReactorError> {
        if self.exports.contains(attr) {
            Ok(())
        } else {
            Err(ReactorError::UndeclaredExport {
                rule: self.rule,
                attribute: *attr,
            })
        }
    }

    /// Write an export.
    pub fn set(&mut self, export: Attribute, value: impl Into<Value>) -> Result<(), ReactorError> {
        self.check_export(&export)?;
        self.outputs.push((export, Output::Value(value.into())));
        Ok(())
    }

    /// Fail an export with a root error.
    pub fn fail(&mut self, export: Attribute, error: SemanticError) -> Result<(), ReactorError> {
        self.check_export(&export)?;
        self.outputs.push((export, Output::Error(error)));
        Ok(())
    }

    /// Report a root error that affects no attribute.
    pub fn report(&mut self, error: SemanticError) {
        self.reactor.error(error, &[]);
    }

    /// The reactor itself, for registering lazy rules.
    pub fn reactor(&mut self) -> &mut Reactor<'a> {
        self.reactor
    }

    pub fn symbols(&self) -> &'r SymbolTable {
        self.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;
    use crate::semantic::attribute::AttrName;
    use crate::semantic::types::Type;
    use blc_common::Span;

    fn ty(n: u32) -> Attribute {
        Attribute::node(NodeId(n), AttrName::Type)
    }

    fn err(message: &str) -> SemanticError {
        SemanticError::new(Span::new(0, 1), message)
    }

    fn run(reactor: &mut Reactor<'_>) -> RunStats {
        reactor.run(&SymbolTable::new()).unwrap()
    }

    #[test]
    fn map_runs_once_dependency_resolves() {
        let mut reactor = Reactor::new();
        reactor.map(
            "array of",
            ty(1),
            ty(2),
            |t: Type, _| Ok::<_, SemanticError>(Type::array(t)),
        );
        reactor.copy("copy", ty(2), ty(3));
        reactor.set(ty(1), Type::Int).unwrap();
        let stats = run(&mut reactor);
        assert_eq!(stats.executed, 2);
        assert_eq!(reactor.get_as::<Type>(&ty(3)), Some(Type::array(Type::Int)));
    }

    #[test]
    fn seeding_twice_is_fatal() {
        let mut reactor = Reactor::new();
        reactor.set(ty(1), Type::Int).unwrap();
        let result = reactor.set(ty(1), Type::Int);
        assert!(matches!(result, Err(ReactorError::Redefined { .. })));
    }

    #[test]
    fn rule_redefining_a_value_is_fatal() {
        let mut reactor = Reactor::new();
        reactor.set(ty(1), Type::Int).unwrap();
        reactor.set(ty(2), Type::Int).unwrap();
        reactor.copy("clobber", ty(1), ty(2));
        let result = reactor.run(&SymbolTable::new());
        assert!(matches!(result, Err(ReactorError::Redefined { attribute }) if attribute == ty(2)));
    }

    #[test]
    fn first_error_wins() {
        let mut reactor = Reactor::new();
        reactor.error(err("first"), &[ty(1)]);
        reactor.error(err("second"), &[ty(1)]);
        assert_eq!(reactor.errors(), vec![err("first")]);
    }

    #[test]
    fn value_after_error_is_dropped() {
        let mut reactor = Reactor::new();
        reactor.error(err("boom"), &[ty(2)]);
        reactor.set(ty(1), Type::Int).unwrap();
        reactor.copy("late", ty(1), ty(2));
        run(&mut reactor);
        assert!(reactor.get(&ty(2)).is_none());
        assert!(reactor.error_of(&ty(2)).is_some());
    }

    #[test]
    fn poisoning_reports_one_root_cause() {
        let mut reactor = Reactor::new();
        reactor.map("fails", ty(1), ty(2), |_: Type, _| {
            Err::<Type, _>(err("unknown identifier: x"))
        });
        reactor.copy("b", ty(2), ty(3));
        reactor.copy("c", ty(3), ty(4));
        reactor.flat_map("d", vec![ty(4), ty(5)], ty(6), |types: Vec<Type>, _| {
            Ok::<_, SemanticError>(types[0].clone())
        });
        let observed = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = observed.clone();
        reactor.on("watch", ty(6), move |_: Type, _| {
            flag.set(true);
            Ok(())
        });
        reactor.set(ty(1), Type::Int).unwrap();
        reactor.set(ty(5), Type::Int).unwrap();
        run(&mut reactor);

        assert_eq!(reactor.errors(), vec![err("unknown identifier: x")]);
        assert!(reactor.all_errors().len() > 1);
        for n in 2..=4 {
            assert!(reactor.get(&ty(n)).is_none());
        }
        let failed = reactor.error_of(&ty(6)).unwrap();
        assert!(reactor.error_record(failed).cause.is_some());
        assert_eq!(reactor.root_cause(failed), &err("unknown identifier: x"));
        assert!(!observed.get());
    }

    #[test]
    fn registering_against_failed_attribute_poisons_immediately() {
        let mut reactor = Reactor::new();
        reactor.error(err("root"), &[ty(1)]);
        reactor.copy("late", ty(1), ty(2));
        assert!(reactor.error_of(&ty(2)).is_some());
        assert_eq!(reactor.pending(), 0);
        assert_eq!(reactor.errors().len(), 1);
    }

    #[test]
    fn lazy_rules_see_resolved_values() {
        let mut reactor = Reactor::new();
        reactor.set(ty(1), Type::Int).unwrap();
        reactor.set(ty(2), Type::String).unwrap();
        reactor.on("spawn", ty(1), |_: Type, scope| {
            scope.reactor().copy("lazy copy", ty(2), ty(3));
            Ok(())
        });
        run(&mut reactor);
        assert_eq!(reactor.get_as::<Type>(&ty(3)), Some(Type::String));
    }

    #[test]
    fn seeding_inside_a_rule_is_rejected() {
        let mut reactor = Reactor::new();
        reactor.rule("seeder").by(|scope| scope.reactor().set(ty(9), Type::Int));
        let result = reactor.run(&SymbolTable::new());
        assert!(matches!(result, Err(ReactorError::AlreadyRunning)));
    }

    #[test]
    fn missing_export_is_fatal() {
        let mut reactor = Reactor::new();
        reactor.rule("lazy").exports([ty(1)]).by(|_| Ok(()));
        let result = reactor.run(&SymbolTable::new());
        assert!(matches!(
            result,
            Err(ReactorError::MissingExports { rule: "lazy", .. })
        ));
    }

    #[test]
    fn undeclared_access_is_fatal() {
        let mut reactor = Reactor::new();
        reactor.set(ty(1), Type::Int).unwrap();
        reactor
            .rule("peek")
            .by(|scope| scope.get::<Type>(&ty(1)).map(|_| ()));
        let result = reactor.run(&SymbolTable::new());
        assert!(matches!(result, Err(ReactorError::UndeclaredDependency { .. })));

        let mut reactor = Reactor::new();
        reactor.rule("poke").by(|scope| scope.set(ty(2), Type::Int));
        let result = reactor.run(&SymbolTable::new());
        assert!(matches!(result, Err(ReactorError::UndeclaredExport { .. })));
    }

    #[test]
    fn wrong_value_kind_is_fatal() {
        let mut reactor = Reactor::new();
        reactor.set(ty(1), true).unwrap();
        reactor.map("as type", ty(1), ty(2), |t: Type, _| Ok::<_, SemanticError>(t));
        let result = reactor.run(&SymbolTable::new());
        assert!(matches!(
            result,
            Err(ReactorError::UnexpectedValue { expected: "type", .. })
        ));
    }

    #[test]
    fn unready_rules_are_discarded() {
        let mut reactor = Reactor::new();
        reactor.copy("never", ty(1), ty(2));
        reactor.copy("cycle a", ty(3), ty(4));
        reactor.copy("cycle b", ty(4), ty(3));
        let stats = run(&mut reactor);
        assert_eq!(stats.executed, 0);
        assert_eq!(stats.discarded, 3);
        assert_eq!(reactor.pending(), 0);
        assert!(reactor.errors().is_empty());
    }

    #[test]
    fn fixpoint_is_deterministic() {
        fn build_and_run() -> Vec<(Attribute, Value)> {
            let mut reactor = Reactor::new();
            for n in 0..20 {
                reactor.copy("chain", ty(n), ty(n + 1));
                reactor.flat_map("pair", vec![ty(n), ty(n + 1)], ty(100 + n), |ts: Vec<Type>, _| {
                    Ok::<_, SemanticError>(Type::array(ts[1].clone()))
                });
            }
            reactor.set(ty(0), Type::Float).unwrap();
            reactor.run(&SymbolTable::new()).unwrap();
            reactor
                .attributes()
                .map(|(attr, value)| (*attr, value.clone()))
                .collect()
        }
        let first = build_and_run();
        assert_eq!(first.len(), 41);
        assert_eq!(first, build_and_run());
    }
}
