//! Built-in functions available to executed fragments.
//!
//! - Type conversions: str, repr, int, float, bool, list
//! - Sequences: len, range, sum, min, max
//! - I/O: print (writes through the shared output stream)
//! - Math: abs

use crate::capture::OutputStream;
use crate::error::{Error, Result};
use crate::methods::{arg_int, check_args};
use crate::operators::{compare_values, overflow};
use crate::value::PyValue;

/// Extract items from any iterable PyValue (list, dict keys, str chars).
fn to_iterable_items(val: &PyValue) -> Result<Vec<PyValue>> {
    match val {
        PyValue::List(items) => Ok(items.clone()),
        PyValue::Dict(pairs) => Ok(pairs.iter().map(|(k, _)| PyValue::Str(k.clone())).collect()),
        PyValue::Str(s) => Ok(s.chars().map(|c| PyValue::Str(c.to_string())).collect()),
        other => Err(Error::Type {
            expected: "iterable".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

/// Result of attempting to handle a builtin function call.
pub enum BuiltinResult {
    /// The function was handled and returned this value.
    Handled(Result<PyValue>),
    /// Not a builtin function, try other handlers.
    NotBuiltin,
}

/// Try to handle a builtin function call with pre-evaluated arguments.
pub fn try_builtin(func_name: &str, args: Vec<PyValue>, stdout: &OutputStream) -> BuiltinResult {
    match func_name {
        "print" => BuiltinResult::Handled(builtin_print(args, stdout)),
        "len" => BuiltinResult::Handled(builtin_len(args)),
        "str" => BuiltinResult::Handled(builtin_str(args)),
        "repr" => BuiltinResult::Handled(builtin_repr(args)),
        "int" => BuiltinResult::Handled(builtin_int(args)),
        "float" => BuiltinResult::Handled(builtin_float(args)),
        "bool" => BuiltinResult::Handled(builtin_bool(args)),
        "list" => BuiltinResult::Handled(builtin_list(args)),
        "range" => BuiltinResult::Handled(builtin_range(args)),
        "abs" => BuiltinResult::Handled(builtin_abs(args)),
        "min" => BuiltinResult::Handled(builtin_min(args)),
        "max" => BuiltinResult::Handled(builtin_max(args)),
        "sum" => BuiltinResult::Handled(builtin_sum(args)),
        _ => BuiltinResult::NotBuiltin,
    }
}

fn builtin_print(args: Vec<PyValue>, stdout: &OutputStream) -> Result<PyValue> {
    let output: Vec<String> = args.iter().map(|v| v.to_print_string()).collect();
    stdout.write_line(&output.join(" "));
    Ok(PyValue::None)
}

fn builtin_len(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("len", &args, 1)?;
    let arg = &args[0];
    let len = match arg {
        PyValue::Str(s) => s.chars().count(),
        PyValue::List(l) => l.len(),
        PyValue::Dict(d) => d.len(),
        _ => {
            return Err(Error::Type {
                expected: "sized".to_string(),
                got: arg.type_name().to_string(),
            });
        }
    };
    Ok(PyValue::Int(len as i64))
}

fn builtin_str(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("str", &args, 1)?;
    Ok(PyValue::Str(args[0].to_print_string()))
}

fn builtin_repr(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("repr", &args, 1)?;
    Ok(PyValue::Str(args[0].repr()))
}

fn builtin_int(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("int", &args, 1)?;
    let arg = &args[0];
    let val = match arg {
        PyValue::Int(i) => *i,
        PyValue::Float(f) => *f as i64,
        PyValue::Bool(b) => {
            if *b {
                1
            } else {
                0
            }
        }
        PyValue::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::Runtime(format!("invalid literal for int(): '{}'", s)))?,
        _ => {
            return Err(Error::Type {
                expected: "number or string".to_string(),
                got: arg.type_name().to_string(),
            });
        }
    };
    Ok(PyValue::Int(val))
}

fn builtin_float(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("float", &args, 1)?;
    let arg = &args[0];
    let val = match arg {
        PyValue::Float(f) => *f,
        PyValue::Int(i) => *i as f64,
        PyValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        PyValue::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::Runtime(format!("invalid literal for float(): '{}'", s)))?,
        _ => {
            return Err(Error::Type {
                expected: "number or string".to_string(),
                got: arg.type_name().to_string(),
            });
        }
    };
    Ok(PyValue::Float(val))
}

fn builtin_bool(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("bool", &args, 1)?;
    Ok(PyValue::Bool(args[0].is_truthy()))
}

fn builtin_list(args: Vec<PyValue>) -> Result<PyValue> {
    if args.is_empty() {
        return Ok(PyValue::List(vec![]));
    }
    check_args("list", &args, 1)?;
    let items = to_iterable_items(&args[0])?;
    Ok(PyValue::List(items))
}

fn builtin_range(args: Vec<PyValue>) -> Result<PyValue> {
    let (start, stop, step) = match args.len() {
        1 => (0, arg_int(&args[0])?, 1),
        2 => (arg_int(&args[0])?, arg_int(&args[1])?, 1),
        3 => (arg_int(&args[0])?, arg_int(&args[1])?, arg_int(&args[2])?),
        _ => return Err(Error::Runtime("range() takes 1 to 3 arguments".to_string())),
    };

    if step == 0 {
        return Err(Error::Runtime("range() step cannot be zero".to_string()));
    }

    let mut items = Vec::new();
    let mut i = start;
    while if step > 0 { i < stop } else { i > stop } {
        items.push(PyValue::Int(i));
        // A step past the representable range is necessarily past stop.
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(PyValue::List(items))
}

fn builtin_abs(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("abs", &args, 1)?;
    match &args[0] {
        PyValue::Int(i) => i.checked_abs().map(PyValue::Int).ok_or_else(overflow),
        PyValue::Float(f) => Ok(PyValue::Float(f.abs())),
        _ => Err(Error::Type {
            expected: "number".to_string(),
            got: args[0].type_name().to_string(),
        }),
    }
}

fn builtin_min(args: Vec<PyValue>) -> Result<PyValue> {
    if args.is_empty() {
        return Err(Error::Runtime(
            "min() requires at least 1 argument".to_string(),
        ));
    }
    if args.len() == 1 {
        let items = to_iterable_items(&args[0])?;
        if items.is_empty() {
            return Err(Error::Runtime("min() arg is an empty sequence".to_string()));
        }
        return find_min(&items);
    }
    find_min(&args)
}

fn builtin_max(args: Vec<PyValue>) -> Result<PyValue> {
    if args.is_empty() {
        return Err(Error::Runtime(
            "max() requires at least 1 argument".to_string(),
        ));
    }
    if args.len() == 1 {
        let items = to_iterable_items(&args[0])?;
        if items.is_empty() {
            return Err(Error::Runtime("max() arg is an empty sequence".to_string()));
        }
        return find_max(&items);
    }
    find_max(&args)
}

fn builtin_sum(args: Vec<PyValue>) -> Result<PyValue> {
    check_args("sum", &args, 1)?;
    let items = to_iterable_items(&args[0])?;

    let mut total = 0i64;
    let mut total_float = 0.0f64;
    let mut is_float = false;

    for item in &items {
        match item {
            // Booleans sum as 1 and 0, as in Python.
            PyValue::Int(_) | PyValue::Bool(_) => {
                let i = item.as_int().unwrap_or(0);
                if is_float {
                    total_float += i as f64;
                } else {
                    total = total.checked_add(i).ok_or_else(overflow)?;
                }
            }
            PyValue::Float(f) => {
                if !is_float {
                    is_float = true;
                    total_float = total as f64;
                }
                total_float += *f;
            }
            _ => {
                return Err(Error::Type {
                    expected: "number".to_string(),
                    got: item.type_name().to_string(),
                });
            }
        }
    }

    if is_float {
        Ok(PyValue::Float(total_float))
    } else {
        Ok(PyValue::Int(total))
    }
}

fn find_min(items: &[PyValue]) -> Result<PyValue> {
    let mut min = items[0].clone();
    for item in &items[1..] {
        if compare_values(item, &min, |a, b| a < b, |a, b| a < b)? {
            min = item.clone();
        }
    }
    Ok(min)
}

fn find_max(items: &[PyValue]) -> Result<PyValue> {
    let mut max = items[0].clone();
    for item in &items[1..] {
        if compare_values(item, &max, |a, b| a > b, |a, b| a > b)? {
            max = item.clone();
        }
    }
    Ok(max)
}
