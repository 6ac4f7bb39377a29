//! Python operator semantics over [`PyValue`].
//!
//! - Arithmetic: +, -, *, /, //, %, **
//! - Bitwise: |, ^, &, <<, >>
//! - Comparison: ==, !=, <, <=, >, >=, in, not in, is, is not
//! - Unary: not, -, +, ~
//!
//! Operators are keyed by the parser's AST enums so the evaluator can
//! dispatch without an intermediate opcode set.

use rustpython_parser::ast::{CmpOp, Operator, UnaryOp};

use crate::error::{Error, Result};
use crate::value::PyValue;

/// Apply a binary operator to two values.
///
/// Handles numeric promotion, string concatenation and repetition, and
/// list concatenation and repetition.
pub fn apply_binop(op: &Operator, left: &PyValue, right: &PyValue) -> Result<PyValue> {
    match op {
        Operator::Add => match (left, right) {
            (PyValue::Int(a), PyValue::Int(b)) => {
                a.checked_add(*b).map(PyValue::Int).ok_or_else(overflow)
            }
            (PyValue::Float(a), PyValue::Float(b)) => Ok(PyValue::Float(a + b)),
            (PyValue::Int(a), PyValue::Float(b)) => Ok(PyValue::Float(*a as f64 + b)),
            (PyValue::Float(a), PyValue::Int(b)) => Ok(PyValue::Float(a + *b as f64)),
            (PyValue::Str(a), PyValue::Str(b)) => Ok(PyValue::Str(format!("{}{}", a, b))),
            (PyValue::List(a), PyValue::List(b)) => {
                let mut result = a.clone();
                result.extend(b.clone());
                Ok(PyValue::List(result))
            }
            _ => Err(Error::Type {
                expected: "compatible types for +".to_string(),
                got: format!("{} and {}", left.type_name(), right.type_name()),
            }),
        },
        Operator::Sub => numeric_binop(left, right, |a, b| a.checked_sub(b), |a, b| a - b),
        Operator::Mult => match (left, right) {
            (PyValue::Int(a), PyValue::Int(b)) => {
                a.checked_mul(*b).map(PyValue::Int).ok_or_else(overflow)
            }
            (PyValue::Float(a), PyValue::Float(b)) => Ok(PyValue::Float(a * b)),
            (PyValue::Int(a), PyValue::Float(b)) => Ok(PyValue::Float(*a as f64 * b)),
            (PyValue::Float(a), PyValue::Int(b)) => Ok(PyValue::Float(a * *b as f64)),
            (PyValue::Str(s), PyValue::Int(n)) | (PyValue::Int(n), PyValue::Str(s)) => {
                if *n <= 0 {
                    Ok(PyValue::Str(String::new()))
                } else {
                    Ok(PyValue::Str(s.repeat(*n as usize)))
                }
            }
            (PyValue::List(l), PyValue::Int(n)) | (PyValue::Int(n), PyValue::List(l)) => {
                if *n <= 0 {
                    Ok(PyValue::List(vec![]))
                } else {
                    let mut result = Vec::new();
                    for _ in 0..*n {
                        result.extend(l.clone());
                    }
                    Ok(PyValue::List(result))
                }
            }
            _ => Err(Error::Type {
                expected: "compatible types for *".to_string(),
                got: format!("{} and {}", left.type_name(), right.type_name()),
            }),
        },
        Operator::Div => {
            let a = number(left)?;
            let b = number(right)?;
            if b == 0.0 {
                Err(Error::DivisionByZero)
            } else {
                Ok(PyValue::Float(a / b))
            }
        }
        Operator::FloorDiv => {
            let a = number(left)?;
            let b = number(right)?;
            if b == 0.0 {
                Err(Error::DivisionByZero)
            } else {
                let result = (a / b).floor();
                if matches!(left, PyValue::Int(_)) && matches!(right, PyValue::Int(_)) {
                    Ok(PyValue::Int(result as i64))
                } else {
                    Ok(PyValue::Float(result))
                }
            }
        }
        // Result takes the divisor's sign, as in Python.
        Operator::Mod => match (left, right) {
            (PyValue::Int(a), PyValue::Int(b)) => {
                if *b == 0 {
                    Err(Error::DivisionByZero)
                } else {
                    // checked_rem is None only for i64::MIN % -1, which is 0.
                    let r = a.checked_rem(*b).unwrap_or(0);
                    let r = if r != 0 && (r < 0) != (*b < 0) { r + b } else { r };
                    Ok(PyValue::Int(r))
                }
            }
            _ => {
                let a = number(left)?;
                let b = number(right)?;
                if b == 0.0 {
                    Err(Error::DivisionByZero)
                } else {
                    let r = a % b;
                    let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
                    Ok(PyValue::Float(r))
                }
            }
        },
        Operator::Pow => {
            let a = number(left)?;
            let b = number(right)?;
            let result = a.powf(b);
            if matches!(left, PyValue::Int(_))
                && matches!(right, PyValue::Int(_))
                && result.fract() == 0.0
                && result >= i64::MIN as f64
                && result <= i64::MAX as f64
            {
                Ok(PyValue::Int(result as i64))
            } else {
                Ok(PyValue::Float(result))
            }
        }
        Operator::BitOr => int_binop(left, right, |a, b| Some(a | b)),
        Operator::BitXor => int_binop(left, right, |a, b| Some(a ^ b)),
        Operator::BitAnd => int_binop(left, right, |a, b| Some(a & b)),
        Operator::LShift => int_binop(left, right, |a, b| {
            u32::try_from(b).ok().and_then(|b| a.checked_shl(b))
        }),
        Operator::RShift => int_binop(left, right, |a, b| {
            u32::try_from(b).ok().and_then(|b| a.checked_shr(b))
        }),
        Operator::MatMult => Err(Error::Unsupported(
            "matrix multiplication (@)".to_string(),
        )),
    }
}

/// Apply a comparison operator to two values.
///
/// For `In`/`NotIn`, checks membership in lists, strings, and dicts.
/// For `Is`/`IsNot`, only `None` and the booleans have identity.
pub fn apply_cmpop(op: &CmpOp, left: &PyValue, right: &PyValue) -> Result<bool> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::NotEq => Ok(!values_equal(left, right)),
        CmpOp::Lt => compare_values(left, right, |a, b| a < b, |a, b| a < b),
        CmpOp::LtE => compare_values(left, right, |a, b| a <= b, |a, b| a <= b),
        CmpOp::Gt => compare_values(left, right, |a, b| a > b, |a, b| a > b),
        CmpOp::GtE => compare_values(left, right, |a, b| a >= b, |a, b| a >= b),
        CmpOp::In => match right {
            PyValue::List(items) => Ok(items.iter().any(|item| values_equal(item, left))),
            PyValue::Str(s) => {
                if let PyValue::Str(needle) = left {
                    Ok(s.contains(needle.as_str()))
                } else {
                    Err(Error::Type {
                        expected: "str".to_string(),
                        got: left.type_name().to_string(),
                    })
                }
            }
            PyValue::Dict(pairs) => {
                if let PyValue::Str(key) = left {
                    Ok(pairs.iter().any(|(k, _)| k == key))
                } else {
                    Err(Error::Type {
                        expected: "str".to_string(),
                        got: left.type_name().to_string(),
                    })
                }
            }
            _ => Err(Error::Type {
                expected: "container".to_string(),
                got: right.type_name().to_string(),
            }),
        },
        CmpOp::NotIn => {
            let in_result = apply_cmpop(&CmpOp::In, left, right)?;
            Ok(!in_result)
        }
        CmpOp::Is => match (left, right) {
            (PyValue::None, PyValue::None) => Ok(true),
            (PyValue::Bool(a), PyValue::Bool(b)) => Ok(a == b),
            _ => Ok(false),
        },
        CmpOp::IsNot => {
            let is_result = apply_cmpop(&CmpOp::Is, left, right)?;
            Ok(!is_result)
        }
    }
}

/// Apply a unary operator.
pub fn apply_unaryop(op: &UnaryOp, operand: &PyValue) -> Result<PyValue> {
    match op {
        UnaryOp::Not => Ok(PyValue::Bool(!operand.is_truthy())),
        UnaryOp::USub => match operand {
            PyValue::Int(i) => i.checked_neg().map(PyValue::Int).ok_or_else(overflow),
            PyValue::Float(f) => Ok(PyValue::Float(-f)),
            PyValue::Bool(b) => Ok(PyValue::Int(if *b { -1 } else { 0 })),
            _ => Err(Error::Type {
                expected: "number".to_string(),
                got: operand.type_name().to_string(),
            }),
        },
        UnaryOp::UAdd => match operand {
            PyValue::Int(_) | PyValue::Float(_) => Ok(operand.clone()),
            PyValue::Bool(b) => Ok(PyValue::Int(if *b { 1 } else { 0 })),
            _ => Err(Error::Type {
                expected: "number".to_string(),
                got: operand.type_name().to_string(),
            }),
        },
        UnaryOp::Invert => match operand.as_int() {
            Some(i) => Ok(PyValue::Int(!i)),
            None => Err(Error::Type {
                expected: "int".to_string(),
                got: operand.type_name().to_string(),
            }),
        },
    }
}

/// Python equality: numeric types compare by value across int/float/bool,
/// containers element-wise, everything else by structural equality.
pub fn values_equal(left: &PyValue, right: &PyValue) -> bool {
    let numeric = |v: &PyValue| {
        matches!(
            v,
            PyValue::Int(_) | PyValue::Float(_) | PyValue::Bool(_)
        )
    };
    if numeric(left) && numeric(right) {
        return match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }
    match (left, right) {
        (PyValue::List(a), PyValue::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (PyValue::Dict(a), PyValue::Dict(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, va)| {
                    b.iter()
                        .find(|(kb, _)| kb == k)
                        .is_some_and(|(_, vb)| values_equal(va, vb))
                })
        }
        _ => left == right,
    }
}

/// Fixed-width ints overflow where Python's would promote; the fault goes
/// through the exception channel like any other.
pub(crate) fn overflow() -> Error {
    Error::Runtime("OverflowError: int result out of range".to_string())
}

fn number(val: &PyValue) -> Result<f64> {
    val.as_float().ok_or_else(|| Error::Type {
        expected: "number".to_string(),
        got: val.type_name().to_string(),
    })
}

/// Apply a numeric binary operation. `None` from the int op means the
/// result does not fit.
fn numeric_binop<F, G>(left: &PyValue, right: &PyValue, int_op: F, float_op: G) -> Result<PyValue>
where
    F: Fn(i64, i64) -> Option<i64>,
    G: Fn(f64, f64) -> f64,
{
    match (left, right) {
        (PyValue::Int(a), PyValue::Int(b)) => {
            int_op(*a, *b).map(PyValue::Int).ok_or_else(overflow)
        }
        (PyValue::Float(a), PyValue::Float(b)) => Ok(PyValue::Float(float_op(*a, *b))),
        (PyValue::Int(a), PyValue::Float(b)) => Ok(PyValue::Float(float_op(*a as f64, *b))),
        (PyValue::Float(a), PyValue::Int(b)) => Ok(PyValue::Float(float_op(*a, *b as f64))),
        _ => Err(Error::Type {
            expected: "numbers".to_string(),
            got: format!("{} and {}", left.type_name(), right.type_name()),
        }),
    }
}

/// Apply an integer binary operation. `None` from the op means the
/// operands were out of range (oversized shift counts).
fn int_binop<F>(left: &PyValue, right: &PyValue, op: F) -> Result<PyValue>
where
    F: Fn(i64, i64) -> Option<i64>,
{
    let a = left.as_int().ok_or_else(|| Error::Type {
        expected: "int".to_string(),
        got: left.type_name().to_string(),
    })?;
    let b = right.as_int().ok_or_else(|| Error::Type {
        expected: "int".to_string(),
        got: right.type_name().to_string(),
    })?;
    match op(a, b) {
        Some(result) => Ok(PyValue::Int(result)),
        None => Err(Error::Runtime("integer operation out of range".to_string())),
    }
}

/// Compare two values with given comparison functions.
pub fn compare_values<F, G>(
    left: &PyValue,
    right: &PyValue,
    int_cmp: F,
    float_cmp: G,
) -> Result<bool>
where
    F: Fn(i64, i64) -> bool,
    G: Fn(f64, f64) -> bool,
{
    match (left, right) {
        (PyValue::Int(a), PyValue::Int(b)) => Ok(int_cmp(*a, *b)),
        (PyValue::Float(a), PyValue::Float(b)) => Ok(float_cmp(*a, *b)),
        (PyValue::Int(a), PyValue::Float(b)) => Ok(float_cmp(*a as f64, *b)),
        (PyValue::Float(a), PyValue::Int(b)) => Ok(float_cmp(*a, *b as f64)),
        (PyValue::Str(a), PyValue::Str(b)) => {
            let ord = a.cmp(b);
            Ok(ord == std::cmp::Ordering::Less && int_cmp(0, 1)
                || ord == std::cmp::Ordering::Equal && int_cmp(0, 0)
                || ord == std::cmp::Ordering::Greater && int_cmp(1, 0))
        }
        _ => Err(Error::Type {
            expected: "comparable types".to_string(),
            got: format!("{} and {}", left.type_name(), right.type_name()),
        }),
    }
}
