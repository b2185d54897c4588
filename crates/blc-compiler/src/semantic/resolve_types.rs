//! Type resolution and inference.
//!
//! Types flow bottom-up from literals, annotations and the builtin scope.
//! An annotated variable pushes its type down into empty array literals,
//! including ones nested inside other literals.
//! Function return types come from the annotation or, failing that, from
//! the merged types of every reachable `return` in the body.

use crate::ast::visitor::{self, Visitor};
use crate::ast::*;

use super::attribute::{AttrName, Attribute, ReturnFlow};
use super::error::{ReactorError, SemanticError};
use super::reactor::{Reactor, RunStats};
use super::scope::{SymbolId, SymbolTable};
use super::type_checker::{binary_result, unary_result};
use super::types::{ClassType, StructType, Type};
use super::{contributes, contributing_statements, symbol_of};

pub fn run<'a>(
    unit: &'a CompilationUnit,
    reactor: &mut Reactor<'a>,
    symbols: &SymbolTable,
) -> Result<RunStats, ReactorError> {
    ResolveTypes {
        reactor: &mut *reactor,
        symbols,
    }
    .visit_unit(unit)?;
    reactor.run(symbols)
}

struct ResolveTypes<'r, 'a> {
    reactor: &'r mut Reactor<'a>,
    symbols: &'r SymbolTable,
}

fn type_of(owner: impl Into<super::attribute::Owner>) -> Attribute {
    AttrName::Type.of(owner)
}

fn merge(a: Option<Type>, b: Option<Type>) -> Option<Type> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.common_supertype(&b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Flows of consecutive statements: merge until one terminates.
fn sequence(flows: Vec<ReturnFlow>) -> ReturnFlow {
    let mut ty = None;
    for flow in flows {
        ty = merge(ty, flow.ty);
        if flow.terminates {
            return ReturnFlow {
                ty,
                terminates: true,
            };
        }
    }
    ReturnFlow {
        ty,
        terminates: false,
    }
}

impl<'r, 'a> ResolveTypes<'r, 'a> {
    fn symbol(&self, id: NodeId) -> Result<SymbolId, ReactorError> {
        symbol_of(&*self.reactor, id)
    }

    /// `(name, type attribute)` of each declaration's symbol, in order.
    fn typed_members<'n>(
        &self,
        members: impl IntoIterator<Item = (&'n str, NodeId)>,
    ) -> Result<Vec<(String, Attribute)>, ReactorError> {
        let mut typed = Vec::new();
        for (name, id) in members {
            typed.push((name.to_string(), type_of(self.symbol(id)?)));
        }
        Ok(typed)
    }

    /// Types `expr`, an initializer nested `depth` array literals deep
    /// inside a value whose type `expected` holds. Empty literals take the
    /// expected type peeled by their depth.
    fn visit_against(
        &mut self,
        expr: &'a Expr,
        expected: Attribute,
        depth: usize,
    ) -> Result<(), ReactorError> {
        let ExprKind::Array(elements) = &expr.kind else {
            return self.visit_expr(expr);
        };
        if !contains_empty_array(expr) {
            return self.visit_expr(expr);
        }
        let span = expr.span;
        if elements.is_empty() {
            self.reactor.map(
                "type empty array literal",
                expected,
                type_of(expr.id),
                move |expected: Type, _| match peel_arrays(expected, depth) {
                    Some(ty @ Type::Array(_)) => Ok(ty),
                    _ => Err(SemanticError::new(
                        span,
                        "unable to determine type for array literal",
                    )),
                },
            );
            return Ok(());
        }
        for element in elements {
            self.visit_against(element, expected, depth + 1)?;
        }
        self.type_array_literal(elements, type_of(expr.id));
        Ok(())
    }

    /// A non-empty literal is an array of its elements' common supertype.
    fn type_array_literal(&mut self, elements: &[Expr], target: Attribute) {
        self.reactor.flat_map(
            "type array literal",
            elements.iter().map(|e| type_of(e.id)).collect(),
            target,
            |types: Vec<Type>, _| {
                let element = types
                    .into_iter()
                    .reduce(|a, b| a.common_supertype(&b))
                    .unwrap_or(Type::Any);
                Ok::<_, SemanticError>(Type::array(element))
            },
        );
    }
}

impl<'r, 'a> Visitor<'a> for ResolveTypes<'r, 'a> {
    type Error = ReactorError;

    fn visit_function(&mut self, func: &'a FunctionDecl) -> Result<(), ReactorError> {
        visitor::walk_function(self, func)?;
        let symbol = self.symbol(func.id)?;
        let params =
            self.typed_members(func.params.iter().map(|p| (p.name.as_str(), p.id)))?;
        let ret = match &func.return_type {
            Some(annotation) => type_of(annotation.id),
            None => AttrName::ReturnType.of(func.body.id),
        };
        let annotated = func.return_type.is_some();
        let target = type_of(symbol);

        self.reactor
            .rule("type function")
            .using(params.iter().map(|(_, attr)| *attr).chain([ret]))
            .exports([target])
            .by(move |scope| {
                let mut typed = Vec::with_capacity(params.len());
                for (name, attr) in &params {
                    typed.push((name.clone(), scope.get::<Type>(attr)?));
                }
                let ret = if annotated {
                    scope.get::<Type>(&ret)?
                } else {
                    scope.get::<ReturnFlow>(&ret)?.ty.unwrap_or(Type::Unit)
                };
                scope.set(target, Type::function(typed, ret))
            });
        Ok(())
    }

    fn visit_param(&mut self, param: &'a Param) -> Result<(), ReactorError> {
        self.visit_type(&param.ty)?;
        let symbol = self.symbol(param.id)?;
        self.reactor
            .copy("type parameter", type_of(param.ty.id), type_of(symbol));
        Ok(())
    }

    fn visit_field(&mut self, field: &'a FieldDecl) -> Result<(), ReactorError> {
        self.visit_type(&field.ty)?;
        let symbol = self.symbol(field.id)?;
        self.reactor
            .copy("type field", type_of(field.ty.id), type_of(symbol));
        Ok(())
    }

    fn visit_struct(&mut self, decl: &'a StructDecl) -> Result<(), ReactorError> {
        for field in &decl.fields {
            self.visit_field(field)?;
        }
        let symbol = self.symbol(decl.id)?;
        let fields = self.typed_members(decl.fields.iter().map(|f| (f.name.as_str(), f.id)))?;
        let name = self.symbols.qualified_name(symbol, "_");
        let (names, attrs): (Vec<String>, Vec<Attribute>) = fields.into_iter().unzip();

        self.reactor.flat_map(
            "type struct",
            attrs,
            type_of(symbol),
            move |types: Vec<Type>, _| {
                Ok::<_, SemanticError>(Type::Struct(StructType {
                    symbol,
                    name,
                    fields: names.into_iter().zip(types).collect(),
                }))
            },
        );
        Ok(())
    }

    fn visit_class(&mut self, decl: &'a ClassDecl) -> Result<(), ReactorError> {
        visitor::walk_class(self, decl)?;
        let symbol = self.symbol(decl.id)?;
        let fields = self.typed_members(decl.fields.iter().map(|f| (f.name.as_str(), f.id)))?;
        let methods =
            self.typed_members(decl.methods.iter().map(|m| (m.name.as_str(), m.id)))?;
        let superclass = self
            .reactor
            .get_as::<SymbolId>(&AttrName::Superclass.of(symbol))
            .map(type_of);
        let name = self.symbols.qualified_name(symbol, "_");
        let target = type_of(symbol);

        let deps: Vec<Attribute> = fields
            .iter()
            .chain(&methods)
            .map(|(_, attr)| *attr)
            .chain(superclass)
            .collect();
        self.reactor
            .rule("type class")
            .using(deps)
            .exports([target])
            .by(move |scope| {
                let mut typed = [Vec::new(), Vec::new()];
                for (members, out) in [&fields, &methods].into_iter().zip(&mut typed) {
                    for (name, attr) in members {
                        out.push((name.clone(), scope.get::<Type>(attr)?));
                    }
                }
                let [fields, methods] = typed;
                let superclass = match superclass {
                    Some(attr) => match scope.get::<Type>(&attr)? {
                        Type::Class(class) => Some(Box::new(class)),
                        _ => None,
                    },
                    None => None,
                };
                scope.set(
                    target,
                    Type::Class(ClassType {
                        symbol,
                        name,
                        fields,
                        methods,
                        superclass,
                    }),
                )
            });
        Ok(())
    }

    fn visit_variable(&mut self, decl: &'a VariableDecl) -> Result<(), ReactorError> {
        let target = type_of(self.symbol(decl.id)?);
        let initializer = &decl.initializer;

        let Some(annotation) = &decl.ty else {
            self.visit_expr(initializer)?;
            self.reactor
                .copy("type inferred variable", type_of(initializer.id), target);
            return Ok(());
        };

        self.visit_type(annotation)?;
        self.reactor
            .copy("type annotated variable", type_of(annotation.id), target);

        self.visit_against(initializer, type_of(annotation.id), 0)
    }

    fn visit_block(&mut self, block: &'a Block) -> Result<(), ReactorError> {
        for stmt in &block.statements {
            self.visit_stmt(stmt)?;
        }
        let flows = contributing_statements(&block.statements)
            .into_iter()
            .map(|id| AttrName::ReturnType.of(id))
            .collect();
        self.reactor.flat_map(
            "block return type",
            flows,
            AttrName::ReturnType.of(block.id),
            |flows: Vec<ReturnFlow>, _| Ok::<_, SemanticError>(sequence(flows)),
        );
        Ok(())
    }

    fn visit_if(&mut self, stmt: &'a IfStmt) -> Result<(), ReactorError> {
        visitor::walk_if(self, stmt)?;
        let flow_of =
            |branch: &Stmt| contributes(branch).then(|| AttrName::ReturnType.of(branch.id()));
        let then_flow = flow_of(&*stmt.then_branch);
        let else_flow = stmt.else_branch.as_deref().and_then(flow_of);
        let has_else = stmt.else_branch.is_some();
        let target = AttrName::ReturnType.of(stmt.id);

        self.reactor
            .rule("if return type")
            .using(then_flow.into_iter().chain(else_flow))
            .exports([target])
            .by(move |scope| {
                let branch = |attr: Option<Attribute>| match attr {
                    Some(attr) => scope.get::<ReturnFlow>(&attr),
                    None => Ok(ReturnFlow::falls_through()),
                };
                let then_flow = branch(then_flow)?;
                let else_flow = branch(else_flow)?;
                let flow = ReturnFlow {
                    terminates: has_else && then_flow.terminates && else_flow.terminates,
                    ty: merge(then_flow.ty, else_flow.ty),
                };
                scope.set(target, flow)
            });
        Ok(())
    }

    fn visit_return(&mut self, stmt: &'a ReturnStmt) -> Result<(), ReactorError> {
        let target = AttrName::ReturnType.of(stmt.id);
        match &stmt.value {
            Some(value) => {
                self.visit_expr(value)?;
                self.reactor.map(
                    "return type",
                    type_of(value.id),
                    target,
                    |ty: Type, _| Ok::<_, SemanticError>(ReturnFlow::returning(ty)),
                );
                Ok(())
            }
            None => self.reactor.set(target, ReturnFlow::returning(Type::Unit)),
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) -> Result<(), ReactorError> {
        visitor::walk_expr(self, expr)?;
        let target = type_of(expr.id);
        let span = expr.span;

        match &expr.kind {
            ExprKind::Int(_) => self.reactor.set(target, Type::Int)?,
            ExprKind::Float(_) => self.reactor.set(target, Type::Float)?,
            ExprKind::String(_) => self.reactor.set(target, Type::String)?,
            ExprKind::Bool(_) => self.reactor.set(target, Type::Boolean)?,
            ExprKind::Unit => self.reactor.set(target, Type::Unit)?,

            ExprKind::Array(elements) if elements.is_empty() => self.reactor.error(
                SemanticError::new(span, "unable to determine type for array literal"),
                &[target],
            ),
            ExprKind::Array(elements) => self.type_array_literal(elements, target),

            ExprKind::Reference(_) => {
                let symbol = self.symbol(expr.id)?;
                self.reactor.copy("type reference", type_of(symbol), target);
            }
            ExprKind::SelfRef => {
                let attr = AttrName::ContainingClass.of(expr.id);
                let class = self
                    .reactor
                    .get_as::<SymbolId>(&attr)
                    .ok_or(ReactorError::UnexpectedValue {
                        attribute: attr,
                        expected: "symbol",
                    })?;
                self.reactor.copy("type self", type_of(class), target);
            }

            ExprKind::Unary { op, operand } => {
                let op = *op;
                self.reactor.map(
                    "type unary expression",
                    type_of(operand.id),
                    target,
                    move |ty: Type, _| {
                        unary_result(op, &ty).map_err(|message| SemanticError::new(span, message))
                    },
                );
            }
            ExprKind::Binary { op, left, right } => {
                let op = *op;
                let (left, right) = (type_of(left.id), type_of(right.id));
                self.reactor
                    .rule("type binary expression")
                    .using([left, right])
                    .exports([target])
                    .by(move |scope| {
                        let left = scope.get::<Type>(&left)?;
                        let right = scope.get::<Type>(&right)?;
                        match binary_result(op, &left, &right) {
                            Ok(ty) => scope.set(target, ty),
                            Err(message) => scope.fail(target, SemanticError::new(span, message)),
                        }
                    });
            }
            ExprKind::Assign { value, .. } => {
                self.reactor.copy("type assignment", type_of(value.id), target);
            }

            ExprKind::Call { callee, .. } => self.reactor.map(
                "type call",
                type_of(callee.id),
                target,
                move |ty: Type, _| match ty {
                    Type::Function(function) => Ok(*function.ret),
                    Type::Struct(_) | Type::Class(_) => Ok(ty),
                    _ => Err(SemanticError::new(span, "expression is not callable")),
                },
            ),
            ExprKind::MethodCall {
                receiver, method, ..
            } => {
                let receiver = type_of(receiver.id);
                let resolved = AttrName::Symbol.of(expr.id);
                let method: &'a str = method;
                self.reactor.map(
                    "resolve method",
                    receiver,
                    resolved,
                    move |ty: Type, symbols: &SymbolTable| match ty {
                        Type::Class(class) => {
                            symbols.resolve_method(class.symbol, method).ok_or_else(|| {
                                SemanticError::new(
                                    span,
                                    format!("unknown method {} in {}", method, class.name),
                                )
                            })
                        }
                        other => Err(SemanticError::new(
                            span,
                            format!("expression must be Class, not {}", other),
                        )),
                    },
                );
                self.reactor
                    .rule("type method call")
                    .using([receiver, resolved])
                    .exports([target])
                    .by(move |scope| {
                        let method_type = match scope.get::<Type>(&receiver)? {
                            Type::Class(class) => class.method(method).cloned(),
                            _ => None,
                        };
                        match method_type {
                            Some(Type::Function(function)) => scope.set(target, *function.ret),
                            _ => scope.fail(
                                target,
                                SemanticError::new(span, format!("{} is not a callable method", method)),
                            ),
                        }
                    });
            }
            ExprKind::FieldSelect { object, field } => {
                let field: &'a str = field;
                self.reactor.map(
                    "type field select",
                    type_of(object.id),
                    target,
                    move |ty: Type, _| {
                        let (found, owner) = match &ty {
                            Type::Struct(s) => (s.field(field), &s.name),
                            Type::Class(c) => (c.field(field), &c.name),
                            other => {
                                return Err(SemanticError::new(
                                    span,
                                    format!("expression must be Struct, not {}", other),
                                ))
                            }
                        };
                        found.cloned().ok_or_else(|| {
                            SemanticError::new(span, format!("unknown field {} in {}", field, owner))
                        })
                    },
                );
            }
            ExprKind::Index { object, .. } => self.reactor.map(
                "type index",
                type_of(object.id),
                target,
                move |ty: Type, _| match ty {
                    Type::Array(element) => Ok(*element),
                    other => Err(SemanticError::new(
                        span,
                        format!("expression must be Array, not {}", other),
                    )),
                },
            ),
        }
        Ok(())
    }

    fn visit_type(&mut self, ty: &'a TypeExpr) -> Result<(), ReactorError> {
        let target = type_of(ty.id);
        match &ty.kind {
            TypeExprKind::Named(name) => {
                let symbol = self.symbol(ty.id)?;
                if self.symbols.symbol(symbol).is_type() {
                    self.reactor.copy("type named type", type_of(symbol), target);
                } else {
                    self.reactor.error(
                        SemanticError::new(ty.span, format!("{} is not a type", name)),
                        &[target],
                    );
                }
            }
            TypeExprKind::Array(element) => {
                self.visit_type(element)?;
                self.reactor.map(
                    "type array type",
                    type_of(element.id),
                    target,
                    |ty: Type, _| Ok::<_, SemanticError>(Type::array(ty)),
                );
            }
        }
        Ok(())
    }
}

/// Whether an array literal has an empty literal somewhere in its nesting.
fn contains_empty_array(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Array(elements) => {
            elements.is_empty() || elements.iter().any(contains_empty_array)
        }
        _ => false,
    }
}

fn peel_arrays(mut ty: Type, depth: usize) -> Option<Type> {
    for _ in 0..depth {
        match ty {
            Type::Array(element) => ty = *element,
            _ => return None,
        }
    }
    Some(ty)
}

#[cfg(test)]
mod tests {
    use blc_common::Phase;

    use crate::parse;
    use crate::semantic::{analyze_until, Analysis, AnalysisError};

    use super::*;

    fn errors(source: &str) -> Vec<String> {
        let (unit, diagnostics) = parse(source);
        assert!(!diagnostics.has_errors(), "parse failed: {:?}", diagnostics);
        let result = match analyze_until(&unit, Phase::ResolveTypes) {
            Ok(_) => vec![],
            Err(AnalysisError::Rejected { errors, .. }) => {
                errors.into_iter().map(|e| e.message).collect()
            }
            Err(err) => panic!("{}", err),
        };
        result
    }

    /// Type of the last symbol declared as `name`, rendered.
    fn symbol_type(analysis: &Analysis<'_>, name: &str) -> Option<String> {
        let (id, _) = analysis
            .symbols()
            .symbols()
            .filter(|(_, symbol)| symbol.name == name)
            .last()?;
        analysis.symbol_type(id).map(|ty| ty.to_string())
    }

    fn types_of(source: &str, names: &[&str]) -> Vec<String> {
        let (unit, diagnostics) = parse(source);
        assert!(!diagnostics.has_errors(), "parse failed: {:?}", diagnostics);
        let analysis = analyze_until(&unit, Phase::ResolveTypes).unwrap();
        names
            .iter()
            .map(|name| symbol_type(&analysis, name).unwrap_or_else(|| "?".into()))
            .collect()
    }

    #[test]
    fn annotated_and_inferred_variables_agree() {
        assert_eq!(types_of("var a: Int = 1; var b = 1;", &["a", "b"]), ["Int", "Int"]);
        assert_eq!(
            types_of("var c = 1 + 2.0; var d = 1 < 2; var e = -3; var f = !true;", &["c", "d", "e", "f"]),
            ["Float", "Boolean", "Int", "Boolean"]
        );
    }

    #[test]
    fn array_literals() {
        assert_eq!(
            types_of(
                "var xs = [1, 2, 3]; var ys: [Int] = []; var zs = [[1], [2]]; var w = xs[0];",
                &["xs", "ys", "zs", "w"]
            ),
            ["[Int]", "[Int]", "[[Int]]", "Int"]
        );
        assert_eq!(
            types_of("class A {} class B : A {} var mixed = [B(), A()];", &["mixed"]),
            ["[A]"]
        );
        assert_eq!(types_of("var anything = [1, \"s\"];", &["anything"]), ["[Any]"]);
    }

    #[test]
    fn empty_array_needs_an_array_annotation() {
        assert_eq!(
            errors("var e = [];"),
            vec!["unable to determine type for array literal"]
        );
        assert_eq!(
            errors("var e: Int = [];"),
            vec!["unable to determine type for array literal"]
        );
        assert_eq!(
            errors("fun f(xs: [Int]) {} fun g() { f([]); }"),
            vec!["unable to determine type for array literal"]
        );
    }

    #[test]
    fn nested_empty_arrays_follow_the_annotation() {
        assert!(errors(
            "var a: [[Int]] = [[]]; var b: [[Int]] = [[], [1]]; var c: [[[String]]] = [[[]]];"
        )
        .is_empty());

        let source = "var grid: [[Int]] = [[1], []];";
        let (unit, _) = parse(source);
        let analysis = analyze_until(&unit, Phase::ResolveTypes).unwrap();
        let Stmt::Variable(decl) = &unit.statements[0] else {
            panic!("expected a variable");
        };
        let ExprKind::Array(rows) = &decl.initializer.kind else {
            panic!("expected an array literal");
        };
        assert_eq!(analysis.type_of(rows[1].id), Some(Type::array(Type::Int)));
        assert_eq!(
            analysis.type_of(decl.initializer.id),
            Some(Type::array(Type::array(Type::Int)))
        );

        assert_eq!(
            errors("var flat: [Int] = [[]];"),
            vec!["unable to determine type for array literal"]
        );
    }

    #[test]
    fn function_return_types_are_inferred() {
        let source = "
            fun double(x: Int) { return x * 2; }
            fun nothing() {}
            fun pick(b: Boolean) { if (b) { return 1; } else { return 2; } }
            fun early() { return 1; return \"unreachable\"; }
            fun widen(b: Boolean) { if (b) { return 1; } return 2.5; }
            fun annotated(x: Int) -> Float { return x; }
        ";
        assert_eq!(
            types_of(source, &["double", "nothing", "pick", "early", "widen", "annotated"]),
            [
                "(x: Int) -> Int",
                "() -> Unit",
                "(b: Boolean) -> Int",
                "() -> Int",
                "(b: Boolean) -> Any",
                "(x: Int) -> Float"
            ]
        );
    }

    #[test]
    fn members_and_calls() {
        let source = "
            struct Point { x: Int, y: Float }
            class Base { name: String; fun id() -> Int { return 1; } }
            class Derived : Base { extra: Boolean; }
            var p = Point(1, 2.0);
            var py = p.y;
            var d = Derived(\"n\", true);
            var n = d.name;
            var i = d.id();
            var s = str(1);
        ";
        assert_eq!(
            types_of(source, &["p", "py", "d", "n", "i", "s"]),
            ["Point", "Float", "Derived", "String", "Int", "String"]
        );
    }

    #[test]
    fn method_call_binds_the_method_symbol() {
        let source = "class C { fun m() -> Int { return 1; } } var v = C().m();";
        let (unit, _) = parse(source);
        let analysis = analyze_until(&unit, Phase::ResolveTypes).unwrap();
        let Stmt::Variable(v) = &unit.statements[1] else {
            panic!("expected variable")
        };
        let method = analysis.symbol_of(v.initializer.id).unwrap();
        assert_eq!(analysis.symbols().qualified_name(method, "_"), "C_m");
    }

    #[test]
    fn nested_type_names_are_qualified() {
        assert_eq!(
            types_of("fun outer() { struct Inner { x: Int } var i = Inner(1); }", &["i"]),
            ["outer_Inner"]
        );
    }

    #[test]
    fn member_and_operator_errors() {
        assert_eq!(
            errors("var s = \"a\" - 1;"),
            vec!["binary expression is not supported for given types"]
        );
        assert_eq!(errors("var t = 1(2);"), vec!["expression is not callable"]);
        assert_eq!(
            errors("struct P { x: Int } var q = P(1).y;"),
            vec!["unknown field y in P"]
        );
        assert_eq!(
            errors("class C {} var r = C().m();"),
            vec!["unknown method m in C"]
        );
        assert_eq!(
            errors("var u = 1[0];"),
            vec!["expression must be Array, not Int"]
        );
        assert_eq!(errors("fun f(x: print) {}"), vec!["print is not a type"]);
        assert_eq!(errors("var z = -\"s\";"), vec!["unary expression is not supported"]);
    }

    #[test]
    fn one_bad_operand_is_one_error() {
        let source = "fun f() { var a = 1 + \"x\"; var b = a * 2; var c = [b, b]; return c; }";
        assert_eq!(
            errors(source),
            vec!["binary expression is not supported for given types"]
        );
    }
}
