//! Name resolution.
//!
//! One walk builds the scope tree, declares a symbol for every binding and
//! tags each node with the scope active when it was visited. References
//! that resolve during the walk are bound on the spot; the rest get a rule
//! that retries once the tree, and so every scope, is fully populated.

use blc_common::Span;

use crate::ast::visitor::{self, Visitor};
use crate::ast::*;

use super::attribute::AttrName;
use super::error::{ReactorError, SemanticError};
use super::reactor::{Reactor, RunStats};
use super::scope::{ScopeId, ScopeKind, SymbolId, SymbolKind, SymbolTable};

pub fn run<'a>(
    unit: &'a CompilationUnit,
    reactor: &mut Reactor<'a>,
    symbols: &mut SymbolTable,
) -> Result<RunStats, ReactorError> {
    let mut pass = ResolveReferences {
        current: symbols.builtin_scope(),
        reactor: &mut *reactor,
        symbols: &mut *symbols,
        classes: Vec::new(),
    };
    pass.visit_unit(unit)?;
    pass.check_superclasses()?;
    reactor.run(symbols)
}

struct ResolveReferences<'r, 'a> {
    reactor: &'r mut Reactor<'a>,
    symbols: &'r mut SymbolTable,
    current: ScopeId,
    classes: Vec<(SymbolId, &'a ClassDecl)>,
}

impl<'r, 'a> ResolveReferences<'r, 'a> {
    fn tag(&mut self, id: NodeId) -> Result<(), ReactorError> {
        self.reactor.set(AttrName::Scope.of(id), self.current)
    }

    fn bind(&mut self, id: NodeId, symbol: SymbolId) -> Result<(), ReactorError> {
        self.reactor.set(AttrName::Symbol.of(id), symbol)
    }

    /// Run `f` with `scope` as the current scope.
    fn within<F>(&mut self, scope: ScopeId, f: F) -> Result<(), ReactorError>
    where
        F: FnOnce(&mut Self) -> Result<(), ReactorError>,
    {
        let outer = std::mem::replace(&mut self.current, scope);
        let result = f(self);
        self.current = outer;
        result
    }

    fn members(&self, symbol: SymbolId) -> ScopeId {
        self.symbols.members(symbol).unwrap_or(self.current)
    }

    /// Bind a name now if possible, otherwise once the tree is walked.
    fn resolve_name(&mut self, id: NodeId, name: &'a str, span: Span) -> Result<(), ReactorError> {
        if let Some(symbol) = self.symbols.lookup(self.current, name) {
            return self.bind(id, symbol);
        }
        self.reactor.map(
            "resolve reference",
            AttrName::Scope.of(id),
            AttrName::Symbol.of(id),
            move |scope: ScopeId, symbols: &SymbolTable| match symbols.lookup(scope, name) {
                Some(symbol) if symbols.symbol(symbol).kind != SymbolKind::Variable => Ok(symbol),
                _ => Err(SemanticError::new(span, format!("unknown identifier: {}", name))),
            },
        );
        Ok(())
    }

    /// Superclass names resolve against the complete tree.
    fn check_superclasses(&mut self) -> Result<(), ReactorError> {
        for (class, decl) in std::mem::take(&mut self.classes) {
            let Some(name) = &decl.superclass else {
                continue;
            };
            let attr = AttrName::Superclass.of(class);
            match self.symbols.superclass(class) {
                None => self.reactor.error(
                    SemanticError::new(name.span, format!("unknown superclass {}", name.name)),
                    &[attr],
                ),
                Some(_) if self.symbols.is_cyclic(class) => self.reactor.error(
                    SemanticError::new(
                        name.span,
                        format!("cyclic inheritance involving {}", decl.name),
                    ),
                    &[attr],
                ),
                Some(superclass) => self.reactor.set(attr, superclass)?,
            }
        }
        Ok(())
    }
}

impl<'r, 'a> Visitor<'a> for ResolveReferences<'r, 'a> {
    type Error = ReactorError;

    fn visit_unit(&mut self, unit: &'a CompilationUnit) -> Result<(), ReactorError> {
        self.tag(unit.id)?;
        let global = self.symbols.push_scope(Some(self.current), ScopeKind::Global);
        self.within(global, |this| visitor::walk_unit(this, unit))
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) -> Result<(), ReactorError> {
        // blocks and declarations tag themselves
        if matches!(stmt, Stmt::If(_) | Stmt::While(_) | Stmt::Expr(_)) {
            self.tag(stmt.id())?;
        }
        visitor::walk_stmt(self, stmt)
    }

    fn visit_function(&mut self, func: &'a FunctionDecl) -> Result<(), ReactorError> {
        self.tag(func.id)?;
        let symbol = self
            .symbols
            .declare_function(self.current, &func.name, Some(func.span));
        self.bind(func.id, symbol)?;
        let members = self.members(symbol);
        self.within(members, |this| visitor::walk_function(this, func))
    }

    fn visit_param(&mut self, param: &'a Param) -> Result<(), ReactorError> {
        self.tag(param.id)?;
        self.visit_type(&param.ty)?;
        let symbol = self
            .symbols
            .declare_variable(self.current, &param.name, Some(param.span));
        self.bind(param.id, symbol)
    }

    fn visit_struct(&mut self, decl: &'a StructDecl) -> Result<(), ReactorError> {
        self.tag(decl.id)?;
        let symbol = self
            .symbols
            .declare_struct(self.current, &decl.name, Some(decl.span));
        self.bind(decl.id, symbol)?;
        let members = self.members(symbol);
        self.within(members, |this| {
            for field in &decl.fields {
                this.visit_field(field)?;
            }
            Ok(())
        })
    }

    fn visit_class(&mut self, decl: &'a ClassDecl) -> Result<(), ReactorError> {
        self.tag(decl.id)?;
        let superclass = decl.superclass.as_ref().map(|s| s.name.clone());
        let symbol =
            self.symbols
                .declare_class(self.current, &decl.name, superclass, Some(decl.span));
        self.bind(decl.id, symbol)?;
        self.classes.push((symbol, decl));
        let members = self.members(symbol);
        self.within(members, |this| visitor::walk_class(this, decl))
    }

    fn visit_field(&mut self, field: &'a FieldDecl) -> Result<(), ReactorError> {
        self.tag(field.id)?;
        self.visit_type(&field.ty)?;
        let symbol = self
            .symbols
            .declare_field(self.current, &field.name, Some(field.span));
        self.bind(field.id, symbol)
    }

    fn visit_variable(&mut self, decl: &'a VariableDecl) -> Result<(), ReactorError> {
        self.tag(decl.id)?;
        // the initializer sees the enclosing binding, not this one
        visitor::walk_variable(self, decl)?;
        let symbol = self
            .symbols
            .declare_variable(self.current, &decl.name, Some(decl.span));
        self.bind(decl.id, symbol)
    }

    fn visit_block(&mut self, block: &'a Block) -> Result<(), ReactorError> {
        self.tag(block.id)?;
        let local = self.symbols.push_scope(Some(self.current), ScopeKind::Local);
        self.within(local, |this| {
            for stmt in &block.statements {
                this.visit_stmt(stmt)?;
            }
            Ok(())
        })
    }

    fn visit_return(&mut self, stmt: &'a ReturnStmt) -> Result<(), ReactorError> {
        self.tag(stmt.id)?;
        let attr = AttrName::ContainingFunction.of(stmt.id);
        match self.symbols.containing_function(self.current) {
            Some(function) => self.reactor.set(attr, function)?,
            None => self.reactor.error(
                SemanticError::new(stmt.span, "return outside of function"),
                &[attr],
            ),
        }
        if let Some(value) = &stmt.value {
            self.visit_expr(value)?;
        }
        Ok(())
    }

    fn visit_expr(&mut self, expr: &'a Expr) -> Result<(), ReactorError> {
        self.tag(expr.id)?;
        match &expr.kind {
            ExprKind::Reference(name) => self.resolve_name(expr.id, name, expr.span),
            ExprKind::SelfRef => {
                let attr = AttrName::ContainingClass.of(expr.id);
                match self.symbols.containing_class(self.current) {
                    Some(class) => self.reactor.set(attr, class),
                    None => {
                        self.reactor.error(
                            SemanticError::new(expr.span, "self outside of class"),
                            &[attr],
                        );
                        Ok(())
                    }
                }
            }
            _ => visitor::walk_expr(self, expr),
        }
    }

    fn visit_type(&mut self, ty: &'a TypeExpr) -> Result<(), ReactorError> {
        self.tag(ty.id)?;
        match &ty.kind {
            TypeExprKind::Named(name) => self.resolve_name(ty.id, name, ty.span),
            TypeExprKind::Array(_) => visitor::walk_type(self, ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use blc_common::Phase;

    use crate::parse;
    use crate::semantic::{analyze_until, AnalysisError};

    use super::*;

    fn errors(source: &str) -> Vec<String> {
        let (unit, diagnostics) = parse(source);
        assert!(!diagnostics.has_errors(), "parse failed: {:?}", diagnostics);
        let result = match analyze_until(&unit, Phase::ResolveReferences) {
            Ok(_) => vec![],
            Err(AnalysisError::Rejected { errors, .. }) => {
                errors.into_iter().map(|e| e.message).collect()
            }
            Err(err) => panic!("{}", err),
        };
        result
    }

    fn reference_symbol(source: &str, name: &str) -> (String, SymbolKind) {
        let (unit, _) = parse(source);
        let analysis = analyze_until(&unit, Phase::ResolveReferences).unwrap();
        let mut found = None;
        let mut finder = FindReference {
            name,
            found: &mut found,
        };
        finder.visit_unit(&unit).unwrap();
        let id = found.expect("reference not found");
        let symbol = analysis.symbol_of(id).expect("reference not bound");
        let table = analysis.symbols();
        (
            table.qualified_name(symbol, "_"),
            table.symbol(symbol).kind.clone(),
        )
    }

    /// Finds the last reference to `name`.
    struct FindReference<'n, 'f> {
        name: &'n str,
        found: &'f mut Option<NodeId>,
    }

    impl<'ast> Visitor<'ast> for FindReference<'_, '_> {
        type Error = ();

        fn visit_expr(&mut self, expr: &'ast Expr) -> Result<(), ()> {
            if matches!(&expr.kind, ExprKind::Reference(n) if n == self.name) {
                *self.found = Some(expr.id);
            }
            visitor::walk_expr(self, expr)
        }
    }

    #[test]
    fn forward_references_to_declarations() {
        let source = "fun main() { helper(Point(1)); } fun helper(p: Point) {} struct Point { x: Int }";
        assert!(errors(source).is_empty());
        let (name, kind) = reference_symbol(source, "helper");
        assert_eq!(name, "helper");
        assert!(matches!(kind, SymbolKind::Function { .. }));
    }

    #[test]
    fn local_use_before_declaration_is_unknown() {
        assert_eq!(
            errors("fun f() { print(y); var y = 1; }"),
            vec!["unknown identifier: y"]
        );
        assert_eq!(errors("var a = b;"), vec!["unknown identifier: b"]);
    }

    #[test]
    fn initializer_sees_outer_binding() {
        let source = "var x = 1; fun f() { var x = x; }";
        assert!(errors(source).is_empty());
        let (unit, _) = parse(source);
        let analysis = analyze_until(&unit, Phase::ResolveReferences).unwrap();
        let Stmt::Function(f) = &unit.statements[1] else {
            panic!("expected function")
        };
        let Stmt::Variable(inner) = &f.body.statements[0] else {
            panic!("expected variable")
        };
        let outer = analysis.symbol_of(unit.statements[0].id()).unwrap();
        assert_eq!(analysis.symbol_of(inner.initializer.id), Some(outer));
        assert_ne!(analysis.symbol_of(inner.id), Some(outer));
    }

    #[test]
    fn return_and_self_need_context() {
        assert_eq!(errors("return 1;"), vec!["return outside of function"]);
        assert_eq!(
            errors("fun f() { print(self); }"),
            vec!["self outside of class"]
        );
        assert!(errors("class A { x: Int; fun get() -> Int { return self.x; } }").is_empty());
    }

    #[test]
    fn every_error_in_the_phase_is_reported() {
        let errors = errors("fun f() { print(a); print(b); } fun g() { return c; }");
        assert_eq!(
            errors,
            vec![
                "unknown identifier: a",
                "unknown identifier: b",
                "unknown identifier: c"
            ]
        );
    }

    #[test]
    fn superclass_checks() {
        assert_eq!(errors("class B : Nope {}"), vec!["unknown superclass Nope"]);
        assert_eq!(
            errors("struct S { x: Int } class B : S {}"),
            vec!["unknown superclass S"]
        );
        assert_eq!(
            errors("class A : A {}"),
            vec!["cyclic inheritance involving A"]
        );
        assert!(errors("class B : A {} class A {}").is_empty());
    }

    #[test]
    fn methods_see_fields_and_parameters() {
        let source = "class C { n: Int; fun add(k: Int) -> Int { return n + k; } }";
        assert!(errors(source).is_empty());
        let (name, kind) = reference_symbol(source, "n");
        assert_eq!(name, "C_n");
        assert_eq!(kind, SymbolKind::Field);
        let (name, kind) = reference_symbol(source, "k");
        assert_eq!(name, "C_add_k");
        assert_eq!(kind, SymbolKind::Variable);
    }

    #[test]
    fn builtins_resolve() {
        let (name, kind) = reference_symbol("fun f() { print(len([1])); }", "print");
        assert_eq!(name, "print");
        assert!(matches!(kind, SymbolKind::Function { .. }));
    }
}
