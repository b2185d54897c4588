use crate::ast::{BinaryOp, UnaryOp};

use super::types::Type;

/// Result type of a binary expression, or an error message if the
/// operator does not apply to the operand types.
pub fn binary_result(op: BinaryOp, left: &Type, right: &Type) -> Result<Type, String> {
    if !op.is_arithmetic() {
        return Ok(Type::Boolean);
    }
    match (left, right) {
        (Type::Int, Type::Int) => Ok(Type::Int),
        (Type::Float, Type::Float) | (Type::Int, Type::Float) | (Type::Float, Type::Int) => {
            Ok(Type::Float)
        }
        _ => Err("binary expression is not supported for given types".to_string()),
    }
}

/// Result type of a unary expression.
pub fn unary_result(op: UnaryOp, operand: &Type) -> Result<Type, String> {
    match (op, operand) {
        (UnaryOp::Not, _) => Ok(Type::Boolean),
        (UnaryOp::Neg, Type::Int | Type::Float) => Ok(operand.clone()),
        (UnaryOp::Neg, _) => Err("unary expression is not supported".to_string()),
    }
}

/// Operand types accepted by a binary operator.
pub fn binary_operand_types(op: BinaryOp) -> Vec<Type> {
    if op.is_arithmetic() {
        vec![Type::Int, Type::Float]
    } else if op.is_comparison() {
        vec![Type::Boolean, Type::Int, Type::Float, Type::String]
    } else if op.is_logical() {
        vec![Type::Boolean]
    } else {
        vec![]
    }
}

pub fn unary_operand_types(op: UnaryOp) -> Vec<Type> {
    match op {
        UnaryOp::Not => vec![Type::Boolean],
        UnaryOp::Neg => vec![Type::Int, Type::Float],
    }
}

/// Check `actual` against a set of accepted types.
pub fn expect_one_of(actual: &Type, accepted: &[Type]) -> Result<(), String> {
    if accepted.contains(actual) {
        return Ok(());
    }
    let names: Vec<String> = accepted.iter().map(|t| t.to_string()).collect();
    Err(format!(
        "invalid type {}, expecting one of {}",
        actual,
        names.join(", ")
    ))
}

pub fn expect_assignable(actual: &Type, expected: &Type) -> Result<(), String> {
    if actual.is_assignable_to(expected) {
        Ok(())
    } else {
        Err(format!("invalid type {}, expected {}", actual, expected))
    }
}

/// Both operands of `<`, `>`, `<=`, `>=` must be the same type; those of
/// `==` and `!=` must be related.
pub fn check_comparable(op: BinaryOp, left: &Type, right: &Type) -> Result<(), String> {
    let ok = if op.is_equality() {
        left.is_related_to(right)
    } else {
        left == right
    };
    if ok {
        Ok(())
    } else {
        Err(format!("can not compare {} to {}", left, right))
    }
}

/// The parameter list a call expression is checked against: function
/// parameters, struct fields, or class fields ancestors first.
pub fn call_parameters(callee: &Type) -> Option<Vec<(String, Type)>> {
    match callee {
        Type::Function(f) => Some(f.params.clone()),
        Type::Struct(s) => Some(s.fields.clone()),
        Type::Class(c) => Some(c.all_fields()),
        _ => None,
    }
}

/// A problem with the arguments of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentError {
    Arity { expected: usize, got: usize },
    /// `position` is the zero-based argument index.
    Incompatible {
        position: usize,
        expected: Type,
        got: Type,
    },
}

impl ArgumentError {
    pub fn message(&self) -> String {
        match self {
            ArgumentError::Arity { expected, got } => format!(
                "expected {} {} but got {}",
                expected,
                if *expected == 1 { "argument" } else { "arguments" },
                got
            ),
            ArgumentError::Incompatible {
                position,
                expected,
                got,
            } => format!(
                "incompatible argument at position {}: expected {} but got {}",
                position + 1,
                expected,
                got
            ),
        }
    }
}

/// Arity first, then each position both sides have.
pub fn check_arguments(params: &[(String, Type)], args: &[Type]) -> Vec<ArgumentError> {
    let mut errors = Vec::new();
    if params.len() != args.len() {
        errors.push(ArgumentError::Arity {
            expected: params.len(),
            got: args.len(),
        });
    }
    for (position, ((_, expected), got)) in params.iter().zip(args).enumerate() {
        if !got.is_assignable_to(expected) {
            errors.push(ArgumentError::Incompatible {
                position,
                expected: expected.clone(),
                got: got.clone(),
            });
        }
    }
    errors
}
