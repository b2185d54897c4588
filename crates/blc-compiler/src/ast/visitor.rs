use super::nodes::*;
use super::types::{TypeExpr, TypeExprKind};

/// Visitor trait for walking the AST.
///
/// Default implementations walk children in source order via the
/// `walk_*` functions; override specific methods to add behavior at
/// particular node types, calling the matching `walk_*` to continue
/// into children. Nodes are borrowed for `'ast` so visitors may keep
/// references to them beyond the call.
pub trait Visitor<'ast> {
    type Error;

    fn visit_unit(&mut self, unit: &'ast CompilationUnit) -> Result<(), Self::Error> {
        walk_unit(self, unit)
    }

    fn visit_stmt(&mut self, stmt: &'ast Stmt) -> Result<(), Self::Error> {
        walk_stmt(self, stmt)
    }

    fn visit_function(&mut self, func: &'ast FunctionDecl) -> Result<(), Self::Error> {
        walk_function(self, func)
    }

    fn visit_param(&mut self, param: &'ast Param) -> Result<(), Self::Error> {
        self.visit_type(&param.ty)
    }

    fn visit_struct(&mut self, decl: &'ast StructDecl) -> Result<(), Self::Error> {
        for field in &decl.fields {
            self.visit_field(field)?;
        }
        Ok(())
    }

    fn visit_class(&mut self, decl: &'ast ClassDecl) -> Result<(), Self::Error> {
        walk_class(self, decl)
    }

    fn visit_field(&mut self, field: &'ast FieldDecl) -> Result<(), Self::Error> {
        self.visit_type(&field.ty)
    }

    fn visit_variable(&mut self, decl: &'ast VariableDecl) -> Result<(), Self::Error> {
        walk_variable(self, decl)
    }

    fn visit_block(&mut self, block: &'ast Block) -> Result<(), Self::Error> {
        for stmt in &block.statements {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_if(&mut self, stmt: &'ast IfStmt) -> Result<(), Self::Error> {
        walk_if(self, stmt)
    }

    fn visit_while(&mut self, stmt: &'ast WhileStmt) -> Result<(), Self::Error> {
        self.visit_expr(&stmt.condition)?;
        self.visit_stmt(&stmt.body)
    }

    fn visit_return(&mut self, stmt: &'ast ReturnStmt) -> Result<(), Self::Error> {
        match &stmt.value {
            Some(value) => self.visit_expr(value),
            None => Ok(()),
        }
    }

    fn visit_expr_stmt(&mut self, stmt: &'ast ExprStmt) -> Result<(), Self::Error> {
        self.visit_expr(&stmt.expr)
    }

    fn visit_expr(&mut self, expr: &'ast Expr) -> Result<(), Self::Error> {
        walk_expr(self, expr)
    }

    fn visit_type(&mut self, ty: &'ast TypeExpr) -> Result<(), Self::Error> {
        walk_type(self, ty)
    }
}

pub fn walk_unit<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    unit: &'ast CompilationUnit,
) -> Result<(), V::Error> {
    for stmt in &unit.statements {
        visitor.visit_stmt(stmt)?;
    }
    Ok(())
}

pub fn walk_stmt<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    stmt: &'ast Stmt,
) -> Result<(), V::Error> {
    match stmt {
        Stmt::Function(f) => visitor.visit_function(f),
        Stmt::Struct(s) => visitor.visit_struct(s),
        Stmt::Class(c) => visitor.visit_class(c),
        Stmt::Variable(v) => visitor.visit_variable(v),
        Stmt::Block(b) => visitor.visit_block(b),
        Stmt::If(i) => visitor.visit_if(i),
        Stmt::While(w) => visitor.visit_while(w),
        Stmt::Return(r) => visitor.visit_return(r),
        Stmt::Expr(e) => visitor.visit_expr_stmt(e),
    }
}

pub fn walk_function<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    func: &'ast FunctionDecl,
) -> Result<(), V::Error> {
    for param in &func.params {
        visitor.visit_param(param)?;
    }
    if let Some(return_type) = &func.return_type {
        visitor.visit_type(return_type)?;
    }
    visitor.visit_block(&func.body)
}

pub fn walk_class<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    decl: &'ast ClassDecl,
) -> Result<(), V::Error> {
    for field in &decl.fields {
        visitor.visit_field(field)?;
    }
    for method in &decl.methods {
        visitor.visit_function(method)?;
    }
    Ok(())
}

pub fn walk_variable<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    decl: &'ast VariableDecl,
) -> Result<(), V::Error> {
    if let Some(ty) = &decl.ty {
        visitor.visit_type(ty)?;
    }
    visitor.visit_expr(&decl.initializer)
}

pub fn walk_if<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    stmt: &'ast IfStmt,
) -> Result<(), V::Error> {
    visitor.visit_expr(&stmt.condition)?;
    visitor.visit_stmt(&stmt.then_branch)?;
    if let Some(else_branch) = &stmt.else_branch {
        visitor.visit_stmt(else_branch)?;
    }
    Ok(())
}

pub fn walk_expr<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    expr: &'ast Expr,
) -> Result<(), V::Error> {
    match &expr.kind {
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::String(_)
        | ExprKind::Bool(_)
        | ExprKind::Unit
        | ExprKind::Reference(_)
        | ExprKind::SelfRef => Ok(()),
        ExprKind::Array(elements) => {
            for element in elements {
                visitor.visit_expr(element)?;
            }
            Ok(())
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::Binary { left, right, .. } => {
            visitor.visit_expr(left)?;
            visitor.visit_expr(right)
        }
        ExprKind::Assign { target, value } => {
            visitor.visit_expr(target)?;
            visitor.visit_expr(value)
        }
        ExprKind::Call { callee, args } => {
            visitor.visit_expr(callee)?;
            for arg in args {
                visitor.visit_expr(arg)?;
            }
            Ok(())
        }
        ExprKind::MethodCall { receiver, args, .. } => {
            visitor.visit_expr(receiver)?;
            for arg in args {
                visitor.visit_expr(arg)?;
            }
            Ok(())
        }
        ExprKind::FieldSelect { object, .. } => visitor.visit_expr(object),
        ExprKind::Index { object, index } => {
            visitor.visit_expr(object)?;
            visitor.visit_expr(index)
        }
    }
}

pub fn walk_type<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    ty: &'ast TypeExpr,
) -> Result<(), V::Error> {
    match &ty.kind {
        TypeExprKind::Named(_) => Ok(()),
        TypeExprKind::Array(element) => visitor.visit_type(element),
    }
}
