use std::fmt;

use super::scope::SymbolId;

/// Internal type representation for semantic analysis.
///
/// Separate from the AST `TypeExpr` so the semantic layer can reason about
/// types without caring about spans or syntax. User-defined types are
/// identified by their declaring symbol.
#[derive(Debug, Clone)]
pub enum Type {
    // -- Primitives --
    Any,
    Boolean,
    Int,
    Float,
    String,
    Unit,

    // -- Compound --
    Array(Box<Type>),
    Function(FunctionType),

    // -- User-defined --
    Struct(StructType),
    Class(ClassType),
}

/// Ordered, named parameters and a return type.
#[derive(Debug, Clone)]
pub struct FunctionType {
    pub params: Vec<(String, Type)>,
    pub ret: Box<Type>,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub symbol: SymbolId,
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

/// A class type. `fields` and `methods` are the ones the class declares
/// itself; inherited members live on `superclass`.
#[derive(Debug, Clone)]
pub struct ClassType {
    pub symbol: SymbolId,
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub methods: Vec<(String, Type)>,
    pub superclass: Option<Box<ClassType>>,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Any, Type::Any)
            | (Type::Boolean, Type::Boolean)
            | (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::String, Type::String)
            | (Type::Unit, Type::Unit) => true,
            (Type::Array(a), Type::Array(b)) => a == b,
            (Type::Function(a), Type::Function(b)) => {
                a.ret == b.ret
                    && a.params.len() == b.params.len()
                    && a.params.iter().zip(&b.params).all(|((_, x), (_, y))| x == y)
            }
            (Type::Struct(a), Type::Struct(b)) => a.symbol == b.symbol,
            (Type::Class(a), Type::Class(b)) => a.symbol == b.symbol,
            _ => false,
        }
    }
}

impl Type {
    /// Map a primitive type name to its `Type`.
    pub fn primitive(name: &str) -> Option<Type> {
        match name {
            "Any" => Some(Type::Any),
            "Boolean" => Some(Type::Boolean),
            "Int" => Some(Type::Int),
            "Float" => Some(Type::Float),
            "String" => Some(Type::String),
            "Unit" => Some(Type::Unit),
            _ => None,
        }
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn function(params: Vec<(String, Type)>, ret: Type) -> Type {
        Type::Function(FunctionType {
            params,
            ret: Box::new(ret),
        })
    }

    /// Whether this type is numeric (`Int` or `Float`).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Whether values of this type can be ordered with `<` and friends.
    pub fn is_orderable(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::String | Type::Boolean)
    }

    /// Returns true if `other` is the same as or a supertype of `self`.
    pub fn is_assignable_to(&self, other: &Type) -> bool {
        if self == other || matches!(other, Type::Any) {
            return true;
        }
        match (self, other) {
            (Type::Array(a), Type::Array(b)) => a.is_assignable_to(b),
            (Type::Class(a), Type::Class(b)) => a.ancestors().any(|c| c.symbol == b.symbol),
            _ => false,
        }
    }

    /// Whichever operand the other is assignable to, else `Any`.
    pub fn common_supertype(&self, other: &Type) -> Type {
        if self.is_assignable_to(other) {
            other.clone()
        } else if other.is_assignable_to(self) {
            self.clone()
        } else {
            Type::Any
        }
    }

    /// Related types can be compared for equality.
    pub fn is_related_to(&self, other: &Type) -> bool {
        self.is_assignable_to(other) || other.is_assignable_to(self)
    }
}

impl ClassType {
    /// This class followed by its superclasses, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &ClassType> {
        std::iter::successors(Some(self), |c| c.superclass.as_deref())
    }

    /// Look up a field, walking the superclass chain.
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.ancestors()
            .find_map(|c| c.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t))
    }

    /// Look up a method, walking the superclass chain.
    pub fn method(&self, name: &str) -> Option<&Type> {
        self.ancestors()
            .find_map(|c| c.methods.iter().find(|(n, _)| n == name).map(|(_, t)| t))
    }

    /// Every field in constructor order: ancestors first.
    pub fn all_fields(&self) -> Vec<(String, Type)> {
        let mut chain: Vec<&ClassType> = self.ancestors().collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|c| c.fields.iter().cloned())
            .collect()
    }
}

impl StructType {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => f.write_str("Any"),
            Type::Boolean => f.write_str("Boolean"),
            Type::Int => f.write_str("Int"),
            Type::Float => f.write_str("Float"),
            Type::String => f.write_str("String"),
            Type::Unit => f.write_str("Unit"),
            Type::Array(element) => write!(f, "[{}]", element),
            Type::Function(func) => {
                let params: Vec<_> = func
                    .params
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty))
                    .collect();
                write!(f, "({}) -> {}", params.join(", "), func.ret)
            }
            Type::Struct(s) => f.write_str(&s.name),
            Type::Class(c) => f.write_str(&c.name),
        }
    }
}
