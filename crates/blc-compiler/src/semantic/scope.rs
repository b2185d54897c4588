use std::fmt;

use blc_common::Span;
use indexmap::IndexMap;

use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol#{}", self.0)
    }
}

/// The kind of scope. Declarations that own members (functions, methods,
/// structs, classes) are scopes too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Builtin,
    Global,
    Local,
    Symbol(SymbolId),
}

/// A lexical scope: an ordered name→symbol map plus its containing scope.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    declarations: IndexMap<String, SymbolId>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.declarations.get(name).copied()
    }

    /// Declarations in the order their names were first declared.
    pub fn declarations(&self) -> impl Iterator<Item = (&str, SymbolId)> + '_ {
        self.declarations.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// The kind of a declared symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    PrimitiveType,
    Variable,
    Field,
    Function { members: ScopeId },
    Method { members: ScopeId },
    Struct { members: ScopeId },
    Class {
        members: ScopeId,
        superclass: Option<String>,
    },
}

/// A declared name. `scope` is the scope that contains the declaration.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub scope: ScopeId,
    pub kind: SymbolKind,
    pub span: Option<Span>,
}

impl Symbol {
    /// The scope this symbol owns, for declarations that have members.
    pub fn members(&self) -> Option<ScopeId> {
        match &self.kind {
            SymbolKind::Function { members }
            | SymbolKind::Method { members }
            | SymbolKind::Struct { members }
            | SymbolKind::Class { members, .. } => Some(*members),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Function { .. } | SymbolKind::Method { .. }
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::PrimitiveType | SymbolKind::Struct { .. } | SymbolKind::Class { .. }
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SymbolKind::PrimitiveType => "primitive type",
            SymbolKind::Variable => "variable",
            SymbolKind::Field => "field",
            SymbolKind::Function { .. } => "function",
            SymbolKind::Method { .. } => "method",
            SymbolKind::Struct { .. } => "struct",
            SymbolKind::Class { .. } => "class",
        }
    }
}

/// Builtin functions as `(name, parameters, return type)`.
fn builtin_functions() -> Vec<(&'static str, Vec<(&'static str, Type)>, Type)> {
    vec![
        ("print", vec![("any", Type::Any)], Type::Unit),
        ("str", vec![("any", Type::Any)], Type::String),
        (
            "concat",
            vec![("s1", Type::String), ("s2", Type::String)],
            Type::String,
        ),
        ("len", vec![("array", Type::array(Type::Any))], Type::Int),
    ]
}

const PRIMITIVES: [&str; 6] = ["Any", "Boolean", "Int", "Float", "String", "Unit"];

/// Arena of every scope and symbol of one compilation.
///
/// Scopes are stored in a flat `Vec` and linked by parent indices; symbols
/// point back at their containing scope. Index 0 is the builtin scope.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    builtin_types: Vec<(SymbolId, Type)>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table holding only the populated builtin scope.
    pub fn new() -> Self {
        let mut table = Self {
            scopes: Vec::new(),
            symbols: Vec::new(),
            builtin_types: Vec::new(),
        };
        let builtin = table.push_scope(None, ScopeKind::Builtin);

        for name in PRIMITIVES {
            let id = table.declare(builtin, name, SymbolKind::PrimitiveType, None);
            if let Some(ty) = Type::primitive(name) {
                table.builtin_types.push((id, ty));
            }
        }

        for (name, params, ret) in builtin_functions() {
            let function = table.declare_function(builtin, name, None);
            let members = table.members(function).unwrap_or(builtin);
            let mut param_types = Vec::new();
            for (param, ty) in params {
                let id = table.declare_variable(members, param, None);
                table.builtin_types.push((id, ty.clone()));
                param_types.push((param.to_string(), ty));
            }
            table
                .builtin_types
                .push((function, Type::function(param_types, ret)));
        }

        table
    }

    pub fn builtin_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Types of builtin symbols, known before any analysis runs.
    pub fn builtin_types(&self) -> &[(SymbolId, Type)] {
        &self.builtin_types
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (SymbolId(i as u32), symbol))
    }

    pub fn members(&self, id: SymbolId) -> Option<ScopeId> {
        self.symbol(id).members()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Create a child scope of `parent`.
    pub fn push_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent,
            declarations: IndexMap::new(),
        });
        id
    }

    /// Declare a symbol in `scope`. A later declaration of the same name
    /// replaces the earlier one.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        span: Option<Span>,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.to_string(),
            scope,
            kind,
            span,
        });
        self.scopes[scope.0 as usize]
            .declarations
            .insert(name.to_string(), id);
        id
    }

    pub fn declare_variable(&mut self, scope: ScopeId, name: &str, span: Option<Span>) -> SymbolId {
        self.declare(scope, name, SymbolKind::Variable, span)
    }

    pub fn declare_field(&mut self, scope: ScopeId, name: &str, span: Option<Span>) -> SymbolId {
        self.declare(scope, name, SymbolKind::Field, span)
    }

    /// Declare a function, or a method when `scope` is a class body.
    pub fn declare_function(&mut self, scope: ScopeId, name: &str, span: Option<Span>) -> SymbolId {
        let in_class = self.class_of_scope(scope).is_some();
        self.declare_scoped(scope, name, span, |members| {
            if in_class {
                SymbolKind::Method { members }
            } else {
                SymbolKind::Function { members }
            }
        })
    }

    pub fn declare_struct(&mut self, scope: ScopeId, name: &str, span: Option<Span>) -> SymbolId {
        self.declare_scoped(scope, name, span, |members| SymbolKind::Struct { members })
    }

    pub fn declare_class(
        &mut self,
        scope: ScopeId,
        name: &str,
        superclass: Option<String>,
        span: Option<Span>,
    ) -> SymbolId {
        self.declare_scoped(scope, name, span, |members| SymbolKind::Class {
            members,
            superclass,
        })
    }

    fn declare_scoped(
        &mut self,
        scope: ScopeId,
        name: &str,
        span: Option<Span>,
        kind: impl FnOnce(ScopeId) -> SymbolKind,
    ) -> SymbolId {
        let next = SymbolId(self.symbols.len() as u32);
        let members = self.push_scope(Some(scope), ScopeKind::Symbol(next));
        let id = self.declare(scope, name, kind(members), span);
        debug_assert_eq!(id, next);
        id
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Look up `name` in `scope`, then in each containing scope.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(symbol) = scope.get(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }
        None
    }

    fn enclosing(&self, start: ScopeId) -> impl Iterator<Item = &Scope> + '_ {
        std::iter::successors(Some(self.scope(start)), |s| s.parent.map(|p| self.scope(p)))
    }

    /// Nearest enclosing function or method.
    pub fn containing_function(&self, scope: ScopeId) -> Option<SymbolId> {
        self.enclosing(scope).find_map(|s| match s.kind {
            ScopeKind::Symbol(id) if self.symbol(id).is_callable() => Some(id),
            _ => None,
        })
    }

    /// Nearest enclosing class.
    pub fn containing_class(&self, scope: ScopeId) -> Option<SymbolId> {
        self.enclosing(scope).find_map(|s| self.class_of_scope_kind(s.kind))
    }

    fn class_of_scope(&self, scope: ScopeId) -> Option<SymbolId> {
        self.class_of_scope_kind(self.scope(scope).kind)
    }

    fn class_of_scope_kind(&self, kind: ScopeKind) -> Option<SymbolId> {
        match kind {
            ScopeKind::Symbol(id) if matches!(self.symbol(id).kind, SymbolKind::Class { .. }) => {
                Some(id)
            }
            _ => None,
        }
    }

    /// A variable is a parameter when it is declared directly in a callable.
    pub fn is_parameter(&self, id: SymbolId) -> bool {
        let symbol = self.symbol(id);
        symbol.kind == SymbolKind::Variable
            && matches!(
                self.scope(symbol.scope).kind,
                ScopeKind::Symbol(owner) if self.symbol(owner).is_callable()
            )
    }

    fn members_of_kind(&self, id: SymbolId, wanted: fn(&SymbolKind) -> bool) -> Vec<SymbolId> {
        match self.members(id) {
            Some(scope) => self
                .scope(scope)
                .declarations()
                .map(|(_, member)| member)
                .filter(|member| wanted(&self.symbol(*member).kind))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Parameters of a function or method, in declaration order.
    pub fn parameters(&self, callable: SymbolId) -> Vec<SymbolId> {
        self.members_of_kind(callable, |k| *k == SymbolKind::Variable)
    }

    /// Fields declared directly by a struct or class.
    pub fn fields(&self, id: SymbolId) -> Vec<SymbolId> {
        self.members_of_kind(id, |k| *k == SymbolKind::Field)
    }

    /// Methods declared directly by a class.
    pub fn methods(&self, class: SymbolId) -> Vec<SymbolId> {
        self.members_of_kind(class, |k| matches!(k, SymbolKind::Method { .. }))
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Superclass name as written, if any.
    pub fn superclass_name(&self, class: SymbolId) -> Option<&str> {
        match &self.symbol(class).kind {
            SymbolKind::Class { superclass, .. } => superclass.as_deref(),
            _ => None,
        }
    }

    /// Resolve the superclass by name through the class's containing scope.
    /// `None` if there is no superclass or the name is not a class.
    pub fn superclass(&self, class: SymbolId) -> Option<SymbolId> {
        let name = self.superclass_name(class)?;
        let found = self.lookup(self.symbol(class).scope, name)?;
        match self.symbol(found).kind {
            SymbolKind::Class { .. } => Some(found),
            _ => None,
        }
    }

    /// The class and its superclasses, nearest first. Stops before
    /// revisiting a class, so cyclic chains terminate.
    pub fn ancestors(&self, class: SymbolId) -> Vec<SymbolId> {
        let mut chain = vec![class];
        let mut current = class;
        while let Some(parent) = self.superclass(current) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Whether following superclass links from `class` leads back to it.
    pub fn is_cyclic(&self, class: SymbolId) -> bool {
        let chain = self.ancestors(class);
        chain
            .last()
            .and_then(|last| self.superclass(*last))
            .is_some_and(|next| next == class)
    }

    fn find_member(
        &self,
        owners: &[SymbolId],
        name: &str,
        wanted: fn(&SymbolKind) -> bool,
    ) -> Option<SymbolId> {
        owners.iter().find_map(|owner| {
            let members = self.members(*owner)?;
            self.scope(members)
                .get(name)
                .filter(|id| wanted(&self.symbol(*id).kind))
        })
    }

    /// Find a method on a class or its ancestors.
    pub fn resolve_method(&self, class: SymbolId, name: &str) -> Option<SymbolId> {
        self.find_member(&self.ancestors(class), name, |k| {
            matches!(k, SymbolKind::Method { .. })
        })
    }

    /// Find a field on a struct, or on a class or its ancestors.
    pub fn resolve_field(&self, owner: SymbolId, name: &str) -> Option<SymbolId> {
        let owners = match self.symbol(owner).kind {
            SymbolKind::Class { .. } => self.ancestors(owner),
            _ => vec![owner],
        };
        self.find_member(&owners, name, |k| *k == SymbolKind::Field)
    }

    /// The same-named method this method overrides, if any.
    pub fn overridden(&self, method: SymbolId) -> Option<SymbolId> {
        let symbol = self.symbol(method);
        if !matches!(symbol.kind, SymbolKind::Method { .. }) {
            return None;
        }
        let class = self.class_of_scope(symbol.scope)?;
        let ancestors = self.ancestors(class);
        self.find_member(&ancestors[1..], &symbol.name, |k| {
            matches!(k, SymbolKind::Method { .. })
        })
    }

    /// Name joined with the names of enclosing functions, structs and
    /// classes, outermost first.
    pub fn qualified_name(&self, id: SymbolId, separator: &str) -> String {
        let symbol = self.symbol(id);
        let mut parts = vec![symbol.name.as_str()];
        for scope in self.enclosing(symbol.scope) {
            if let ScopeKind::Symbol(owner) = scope.kind {
                parts.push(self.symbol(owner).name.as_str());
            }
        }
        parts.reverse();
        parts.join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(table: &mut SymbolTable) -> ScopeId {
        let builtin = table.builtin_scope();
        table.push_scope(Some(builtin), ScopeKind::Global)
    }

    #[test]
    fn builtins_are_visible_from_nested_scopes() {
        let mut table = SymbolTable::new();
        let global = global(&mut table);
        let local = table.push_scope(Some(global), ScopeKind::Local);
        for name in ["Int", "Any", "print", "str", "concat", "len"] {
            assert!(table.lookup(local, name).is_some(), "{} missing", name);
        }
        let len = table.lookup(local, "len").unwrap();
        let ty = table
            .builtin_types()
            .iter()
            .find(|(id, _)| *id == len)
            .map(|(_, ty)| ty.to_string());
        assert_eq!(ty.as_deref(), Some("(array: [Any]) -> Int"));
    }

    #[test]
    fn lookup_prefers_innermost_and_last_declaration() {
        let mut table = SymbolTable::new();
        let global = global(&mut table);
        let outer = table.declare_variable(global, "x", None);
        let local = table.push_scope(Some(global), ScopeKind::Local);
        assert_eq!(table.lookup(local, "x"), Some(outer));
        let inner = table.declare_variable(local, "x", None);
        assert_eq!(table.lookup(local, "x"), Some(inner));
        let again = table.declare_variable(local, "x", None);
        assert_eq!(table.lookup(local, "x"), Some(again));
        assert_eq!(table.lookup(global, "x"), Some(outer));
    }

    #[test]
    fn parameters_are_variables_of_a_callable() {
        let mut table = SymbolTable::new();
        let global = global(&mut table);
        let f = table.declare_function(global, "f", None);
        let members = table.members(f).unwrap();
        let a = table.declare_variable(members, "a", None);
        let b = table.declare_variable(members, "b", None);
        let body = table.push_scope(Some(members), ScopeKind::Local);
        let local = table.declare_variable(body, "c", None);
        assert_eq!(table.parameters(f), vec![a, b]);
        assert!(table.is_parameter(a));
        assert!(!table.is_parameter(local));
        assert_eq!(table.containing_function(body), Some(f));
        assert_eq!(table.containing_function(global), None);
    }

    #[test]
    fn methods_and_qualified_names() {
        let mut table = SymbolTable::new();
        let global = global(&mut table);
        let dog = table.declare_class(global, "Dog", None, None);
        let members = table.members(dog).unwrap();
        let speak = table.declare_function(members, "speak", None);
        assert!(matches!(table.symbol(speak).kind, SymbolKind::Method { .. }));
        assert_eq!(table.methods(dog), vec![speak]);
        assert_eq!(table.qualified_name(speak, "_"), "Dog_speak");
        assert_eq!(table.qualified_name(dog, "_"), "Dog");
        let body = table.push_scope(table.members(speak), ScopeKind::Local);
        assert_eq!(table.containing_class(body), Some(dog));
    }

    #[test]
    fn superclass_resolution_is_lazy() {
        let mut table = SymbolTable::new();
        let global = global(&mut table);
        let b = table.declare_class(global, "B", Some("A".into()), None);
        assert_eq!(table.superclass(b), None);
        let a = table.declare_class(global, "A", None, None);
        assert_eq!(table.superclass(b), Some(a));

        let a_members = table.members(a).unwrap();
        let x = table.declare_field(a_members, "x", None);
        let m = table.declare_function(a_members, "m", None);
        let b_members = table.members(b).unwrap();
        let m2 = table.declare_function(b_members, "m", None);

        assert_eq!(table.ancestors(b), vec![b, a]);
        assert_eq!(table.resolve_field(b, "x"), Some(x));
        assert_eq!(table.resolve_method(b, "m"), Some(m2));
        assert_eq!(table.overridden(m2), Some(m));
        assert_eq!(table.overridden(m), None);
    }

    #[test]
    fn cycles_terminate() {
        let mut table = SymbolTable::new();
        let global = global(&mut table);
        let a = table.declare_class(global, "A", Some("B".into()), None);
        let b = table.declare_class(global, "B", Some("A".into()), None);
        let c = table.declare_class(global, "C", Some("A".into()), None);
        assert_eq!(table.ancestors(a), vec![a, b]);
        assert!(table.is_cyclic(a));
        assert!(table.is_cyclic(b));
        assert!(!table.is_cyclic(c));
    }
}
