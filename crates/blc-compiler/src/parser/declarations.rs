use crate::ast::*;
use crate::lexer::token::TokenKind;

use super::Parser;

impl Parser {
    /// Parse `fun name(p: T, ...) [-> R] { ... }`
    pub(super) fn parse_function(&mut self) -> Option<FunctionDecl> {
        let start = self.current_span();
        self.advance(); // consume 'fun'

        let (name, _) = self.expect_identifier()?;
        self.expect(TokenKind::LeftParen)?;

        let mut params = Vec::new();
        if self.peek() != TokenKind::RightParen {
            loop {
                params.push(self.parse_param()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;

        let return_type = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        let span = start.merge(&body.span);

        Some(FunctionDecl {
            id: self.next_id(),
            name,
            params,
            return_type,
            body,
            span,
        })
    }

    fn parse_param(&mut self) -> Option<Param> {
        let (name, start) = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let span = start.merge(&ty.span);
        Some(Param {
            id: self.next_id(),
            name,
            ty,
            span,
        })
    }

    /// Parse `struct Name { a: T, b: U }` (trailing comma allowed).
    pub(super) fn parse_struct(&mut self) -> Option<StructDecl> {
        let start = self.current_span();
        self.advance(); // consume 'struct'

        let (name, _) = self.expect_identifier()?;
        self.expect(TokenKind::LeftBrace)?;

        let mut fields = Vec::new();
        while self.peek() != TokenKind::RightBrace {
            fields.push(self.parse_field()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace)?;
        let span = start.merge(&self.previous_span());

        Some(StructDecl {
            id: self.next_id(),
            name,
            fields,
            span,
        })
    }

    /// Parse `class Name [: Super] { field: T; fun method() { ... } }`
    pub(super) fn parse_class(&mut self) -> Option<ClassDecl> {
        let start = self.current_span();
        self.advance(); // consume 'class'

        let (name, _) = self.expect_identifier()?;
        let superclass = if self.eat(TokenKind::Colon) {
            let (name, span) = self.expect_identifier()?;
            Some(Ident { name, span })
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            match self.peek() {
                TokenKind::RightBrace | TokenKind::Eof => break,
                TokenKind::Fun => methods.push(self.parse_function()?),
                _ => {
                    fields.push(self.parse_field()?);
                    self.expect(TokenKind::Semicolon)?;
                }
            }
        }
        self.expect(TokenKind::RightBrace)?;
        let span = start.merge(&self.previous_span());

        Some(ClassDecl {
            id: self.next_id(),
            name,
            superclass,
            fields,
            methods,
            span,
        })
    }

    fn parse_field(&mut self) -> Option<FieldDecl> {
        let (name, start) = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let span = start.merge(&ty.span);
        Some(FieldDecl {
            id: self.next_id(),
            name,
            ty,
            span,
        })
    }

    /// Parse `var name [: T] = expr;`
    pub(super) fn parse_variable(&mut self) -> Option<VariableDecl> {
        let start = self.current_span();
        self.advance(); // consume 'var'

        let (name, _) = self.expect_identifier()?;
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Equal)?;
        let initializer = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let span = start.merge(&self.previous_span());

        Some(VariableDecl {
            id: self.next_id(),
            name,
            ty,
            initializer,
            span,
        })
    }

    /// Parse a type: `Name` or `[Type]`.
    pub(super) fn parse_type(&mut self) -> Option<TypeExpr> {
        let start = self.current_span();
        match self.peek() {
            TokenKind::Identifier => {
                let name = self.advance().lexeme.clone();
                Some(TypeExpr {
                    id: self.next_id(),
                    kind: TypeExprKind::Named(name),
                    span: start,
                })
            }
            TokenKind::LeftBracket => {
                self.advance(); // consume '['
                let element = self.parse_type()?;
                self.expect(TokenKind::RightBracket)?;
                let span = start.merge(&self.previous_span());
                Some(TypeExpr {
                    id: self.next_id(),
                    kind: TypeExprKind::Array(Box::new(element)),
                    span,
                })
            }
            _ => {
                self.error_at_current("type");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::tests::parse_ok;

    fn first(unit: &CompilationUnit) -> &Stmt {
        &unit.statements[0]
    }

    #[test]
    fn function_with_params_and_return_type() {
        let unit = parse_ok("fun add(a: Int, b: Int) -> Int { return a + b; }");
        let Stmt::Function(f) = first(&unit) else {
            panic!("expected function");
        };
        assert_eq!(f.name, "add");
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[1].name, "b");
        assert_eq!(f.return_type.as_ref().map(|t| t.to_string()).as_deref(), Some("Int"));
        assert_eq!(f.body.statements.len(), 1);
    }

    #[test]
    fn function_without_return_type() {
        let unit = parse_ok("fun main() { print(1); }");
        let Stmt::Function(f) = first(&unit) else {
            panic!("expected function");
        };
        assert!(f.return_type.is_none());
        assert!(f.params.is_empty());
    }

    #[test]
    fn struct_fields_in_order() {
        let unit = parse_ok("struct Point { x: Int, y: Int, tags: [String], }");
        let Stmt::Struct(s) = first(&unit) else {
            panic!("expected struct");
        };
        let names: Vec<_> = s.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "tags"]);
        assert_eq!(s.fields[2].ty.to_string(), "[String]");
    }

    #[test]
    fn class_with_superclass_fields_and_methods() {
        let unit = parse_ok(
            "class Dog : Animal { name: String; age: Int; fun speak() -> String { return self.name; } }",
        );
        let Stmt::Class(c) = first(&unit) else {
            panic!("expected class");
        };
        assert_eq!(c.name, "Dog");
        assert_eq!(c.superclass.as_ref().map(|s| s.name.as_str()), Some("Animal"));
        assert_eq!(c.fields.len(), 2);
        assert_eq!(c.methods.len(), 1);
        assert_eq!(c.methods[0].name, "speak");
    }

    #[test]
    fn variable_with_and_without_annotation() {
        let unit = parse_ok("var a: [[Int]] = [[1]]; var b = 2;");
        let Stmt::Variable(a) = &unit.statements[0] else {
            panic!("expected variable");
        };
        assert_eq!(a.ty.as_ref().map(|t| t.to_string()).as_deref(), Some("[[Int]]"));
        let Stmt::Variable(b) = &unit.statements[1] else {
            panic!("expected variable");
        };
        assert!(b.ty.is_none());
    }
}
