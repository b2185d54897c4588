use blc_common::Span;

use super::nodes::NodeId;

/// A type as written in source: `Int`, `Point`, `[String]`, `[[Int]]`.
///
/// Named types are references and resolve through the scope chain like
/// any other name.
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub id: NodeId,
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Named(String),
    Array(Box<TypeExpr>),
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TypeExprKind::Named(name) => f.write_str(name),
            TypeExprKind::Array(element) => write!(f, "[{}]", element),
        }
    }
}
