//! Compile-time types and values
//!
//! [`Type`] is the static type of an expression, [`Value`] the folded
//! constant of an expression whose value is known during analysis. Folding
//! uses the same arithmetic as the generated code: 32-bit two's-complement
//! integers that wrap, and 32-bit IEEE floats.

use serde::Serialize;
use std::fmt;

/// Static types of the language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Boolean,
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Boolean => "boolean",
            Type::Void => "void",
        };
        f.write_str(name)
    }
}

/// A folded constant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Bool(_) => Type::Boolean,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(n) => *n == 0,
            Value::Float(x) => *x == 0.0,
            Value::Bool(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Binary operators, grouped by precedence level from loosest to tightest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Result type of `left OP right`, or `None` if the operand types are
    /// incompatible with the operator.
    pub fn result_type(self, left: Type, right: Type) -> Option<Type> {
        match self {
            BinaryOp::Or | BinaryOp::And => {
                (left == Type::Boolean && right == Type::Boolean).then_some(Type::Boolean)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                (left == right && left != Type::Void).then_some(Type::Boolean)
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                (left == right && left.is_numeric()).then_some(Type::Boolean)
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                (left == right && left.is_numeric()).then_some(left)
            }
        }
    }

    /// Fold two constants. Returns `None` when the operands do not fit the
    /// operator, on division by zero, or when a float result is not finite.
    pub fn apply(self, left: Value, right: Value) -> Option<Value> {
        use Value::*;

        let value = match (self, left, right) {
            (BinaryOp::Or, Bool(a), Bool(b)) => Bool(a || b),
            (BinaryOp::And, Bool(a), Bool(b)) => Bool(a && b),

            (BinaryOp::Eq, a, b) if a.ty() == b.ty() => Bool(a == b),
            (BinaryOp::Ne, a, b) if a.ty() == b.ty() => Bool(a != b),

            (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
            (BinaryOp::Gt, Int(a), Int(b)) => Bool(a > b),
            (BinaryOp::Le, Int(a), Int(b)) => Bool(a <= b),
            (BinaryOp::Ge, Int(a), Int(b)) => Bool(a >= b),
            (BinaryOp::Lt, Float(a), Float(b)) => Bool(a < b),
            (BinaryOp::Gt, Float(a), Float(b)) => Bool(a > b),
            (BinaryOp::Le, Float(a), Float(b)) => Bool(a <= b),
            (BinaryOp::Ge, Float(a), Float(b)) => Bool(a >= b),

            (BinaryOp::Add, Int(a), Int(b)) => Int(a.wrapping_add(b)),
            (BinaryOp::Sub, Int(a), Int(b)) => Int(a.wrapping_sub(b)),
            (BinaryOp::Mul, Int(a), Int(b)) => Int(a.wrapping_mul(b)),
            (BinaryOp::Div, Int(_), Int(0)) => return None,
            (BinaryOp::Div, Int(a), Int(b)) => Int(a.wrapping_div(b)),

            (BinaryOp::Add, Float(a), Float(b)) => Float(a + b),
            (BinaryOp::Sub, Float(a), Float(b)) => Float(a - b),
            (BinaryOp::Mul, Float(a), Float(b)) => Float(a * b),
            (BinaryOp::Div, Float(_), Float(b)) if b == 0.0 => return None,
            (BinaryOp::Div, Float(a), Float(b)) => Float(a / b),

            _ => return None,
        };

        match value {
            Float(x) if !x.is_finite() => None,
            v => Some(v),
        }
    }
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "-" => Some(UnaryOp::Neg),
            "!" => Some(UnaryOp::Not),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }

    pub fn result_type(self, operand: Type) -> Option<Type> {
        match self {
            UnaryOp::Neg => operand.is_numeric().then_some(operand),
            UnaryOp::Not => (operand == Type::Boolean).then_some(Type::Boolean),
        }
    }

    pub fn apply(self, operand: Value) -> Option<Value> {
        match (self, operand) {
            (UnaryOp::Neg, Value::Int(n)) => Some(Value::Int(n.wrapping_neg())),
            (UnaryOp::Neg, Value::Float(x)) => Some(Value::Float(-x)),
            (UnaryOp::Not, Value::Bool(b)) => Some(Value::Bool(!b)),
            _ => None,
        }
    }
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}
