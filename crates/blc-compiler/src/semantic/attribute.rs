use std::fmt;

use crate::ast::NodeId;

use super::scope::{ScopeId, SymbolId};
use super::types::Type;

/// The entity an attribute is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    Node(NodeId),
    Symbol(SymbolId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Node(id) => write!(f, "{}", id),
            Owner::Symbol(id) => write!(f, "{}", id),
        }
    }
}

impl From<NodeId> for Owner {
    fn from(id: NodeId) -> Self {
        Owner::Node(id)
    }
}

impl From<SymbolId> for Owner {
    fn from(id: SymbolId) -> Self {
        Owner::Symbol(id)
    }
}

/// Attribute names known to the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrName {
    Scope,
    Symbol,
    Type,
    ReturnType,
    Returns,
    ContainingFunction,
    ContainingClass,
    Superclass,
}

impl AttrName {
    pub const ALL: [AttrName; 8] = [
        AttrName::Scope,
        AttrName::Symbol,
        AttrName::Type,
        AttrName::ReturnType,
        AttrName::Returns,
        AttrName::ContainingFunction,
        AttrName::ContainingClass,
        AttrName::Superclass,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttrName::Scope => "scope",
            AttrName::Symbol => "symbol",
            AttrName::Type => "type",
            AttrName::ReturnType => "returnType",
            AttrName::Returns => "returns",
            AttrName::ContainingFunction => "containingFunction",
            AttrName::ContainingClass => "containingClass",
            AttrName::Superclass => "superclass",
        }
    }

    pub fn from_name(name: &str) -> Option<AttrName> {
        AttrName::ALL.into_iter().find(|attr| attr.as_str() == name)
    }

    /// This attribute on `owner`.
    pub fn of(self, owner: impl Into<Owner>) -> Attribute {
        Attribute::new(owner, self)
    }
}

impl fmt::Display for AttrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identity-keyed slot: `(owner, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attribute {
    pub owner: Owner,
    pub name: AttrName,
}

impl Attribute {
    pub fn new(owner: impl Into<Owner>, name: AttrName) -> Self {
        Self {
            owner: owner.into(),
            name,
        }
    }

    pub fn node(id: NodeId, name: AttrName) -> Self {
        Self::new(id, name)
    }

    pub fn symbol(id: SymbolId, name: AttrName) -> Self {
        Self::new(id, name)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} :: {})", self.owner, self.name)
    }
}

/// What a return-contributing statement tells its enclosing callable.
///
/// `ty` is the merged type of every reachable `return`, if any; `terminates`
/// means control never falls off the end of the statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnFlow {
    pub ty: Option<Type>,
    pub terminates: bool,
}

impl ReturnFlow {
    pub fn falls_through() -> Self {
        Self {
            ty: None,
            terminates: false,
        }
    }

    pub fn returning(ty: Type) -> Self {
        Self {
            ty: Some(ty),
            terminates: true,
        }
    }
}

/// A resolved attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scope(ScopeId),
    Symbol(SymbolId),
    Type(Type),
    Flag(bool),
    Flow(ReturnFlow),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scope(_) => "scope",
            Value::Symbol(_) => "symbol",
            Value::Type(_) => "type",
            Value::Flag(_) => "flag",
            Value::Flow(_) => "return flow",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scope(id) => write!(f, "{}", id),
            Value::Symbol(id) => write!(f, "{}", id),
            Value::Type(ty) => write!(f, "{}", ty),
            Value::Flag(flag) => write!(f, "{}", flag),
            Value::Flow(flow) => match &flow.ty {
                Some(ty) if flow.terminates => write!(f, "returns {}", ty),
                Some(ty) => write!(f, "may return {}", ty),
                None => f.write_str("falls through"),
            },
        }
    }
}

impl From<ScopeId> for Value {
    fn from(id: ScopeId) -> Self {
        Value::Scope(id)
    }
}

impl From<SymbolId> for Value {
    fn from(id: SymbolId) -> Self {
        Value::Symbol(id)
    }
}

impl From<Type> for Value {
    fn from(ty: Type) -> Self {
        Value::Type(ty)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Flag(flag)
    }
}

impl From<ReturnFlow> for Value {
    fn from(flow: ReturnFlow) -> Self {
        Value::Flow(flow)
    }
}

/// Typed extraction of attribute values, used by the rule builders.
pub trait FromValue: Sized {
    const KIND: &'static str;

    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for Value {
    const KIND: &'static str = "value";

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for ScopeId {
    const KIND: &'static str = "scope";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Scope(id) => Some(id),
            _ => None,
        }
    }
}

impl FromValue for SymbolId {
    const KIND: &'static str = "symbol";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Symbol(id) => Some(id),
            _ => None,
        }
    }
}

impl FromValue for Type {
    const KIND: &'static str = "type";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const KIND: &'static str = "flag";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Flag(flag) => Some(flag),
            _ => None,
        }
    }
}

impl FromValue for ReturnFlow {
    const KIND: &'static str = "return flow";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Flow(flow) => Some(flow),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_identity_is_owner_and_name() {
        let a = Attribute::node(NodeId(1), AttrName::Type);
        let b = Attribute::node(NodeId(1), AttrName::Type);
        let c = Attribute::node(NodeId(1), AttrName::Symbol);
        let d = Attribute::symbol(SymbolId(1), AttrName::Type);
        assert_eq!(a, b);
        assert_eq!(AttrName::Type.of(NodeId(1)), a);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn attribute_names_round_trip() {
        for name in AttrName::ALL {
            assert_eq!(AttrName::from_name(name.as_str()), Some(name));
        }
        assert_eq!(AttrName::ReturnType.as_str(), "returnType");
        assert_eq!(AttrName::from_name("bogus"), None);
    }

    #[test]
    fn typed_extraction() {
        assert_eq!(Type::from_value(Value::Type(Type::Int)), Some(Type::Int));
        assert_eq!(bool::from_value(Value::Type(Type::Int)), None);
        assert_eq!(bool::from_value(true.into()), Some(true));
    }
}
