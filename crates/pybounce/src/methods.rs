//! Method implementations for Python types.
//!
//! Non-mutating methods take the receiver by reference; the mutating list
//! methods get a `&mut Vec` because the evaluator writes the receiver back
//! through its name binding.

use crate::error::{Error, Result};
use crate::operators::values_equal;
use crate::value::PyValue;

/// Call a method on a string value.
pub fn call_str_method(s: &str, method: &str, args: Vec<PyValue>) -> Result<PyValue> {
    match method {
        "lower" => {
            check_args("lower", &args, 0)?;
            Ok(PyValue::Str(s.to_lowercase()))
        }
        "upper" => {
            check_args("upper", &args, 0)?;
            Ok(PyValue::Str(s.to_uppercase()))
        }
        "strip" => {
            check_args("strip", &args, 0)?;
            Ok(PyValue::Str(s.trim().to_string()))
        }
        "lstrip" => {
            check_args("lstrip", &args, 0)?;
            Ok(PyValue::Str(s.trim_start().to_string()))
        }
        "rstrip" => {
            check_args("rstrip", &args, 0)?;
            Ok(PyValue::Str(s.trim_end().to_string()))
        }
        "split" => {
            check_args_range("split", &args, 0, 1)?;
            let sep = args.first().and_then(|v| v.as_str());
            let parts: Vec<PyValue> = if let Some(sep) = sep {
                s.split(sep).map(|p| PyValue::Str(p.to_string())).collect()
            } else {
                s.split_whitespace()
                    .map(|p| PyValue::Str(p.to_string()))
                    .collect()
            };
            Ok(PyValue::List(parts))
        }
        "join" => {
            check_args("join", &args, 1)?;
            let items = match &args[0] {
                PyValue::List(items) => items,
                _ => {
                    return Err(Error::Type {
                        expected: "list".to_string(),
                        got: args[0].type_name().to_string(),
                    });
                }
            };
            let strings: Result<Vec<String>> = items
                .iter()
                .map(|v| match v {
                    PyValue::Str(s) => Ok(s.clone()),
                    _ => Err(Error::Type {
                        expected: "str".to_string(),
                        got: v.type_name().to_string(),
                    }),
                })
                .collect();
            Ok(PyValue::Str(strings?.join(s)))
        }
        "replace" => {
            check_args("replace", &args, 2)?;
            let old = arg_str(&args[0])?;
            let new = arg_str(&args[1])?;
            Ok(PyValue::Str(s.replace(old, new)))
        }
        "startswith" => {
            check_args("startswith", &args, 1)?;
            Ok(PyValue::Bool(s.starts_with(arg_str(&args[0])?)))
        }
        "endswith" => {
            check_args("endswith", &args, 1)?;
            Ok(PyValue::Bool(s.ends_with(arg_str(&args[0])?)))
        }
        "find" => {
            check_args("find", &args, 1)?;
            let needle = arg_str(&args[0])?;
            Ok(PyValue::Int(s.find(needle).map(|i| i as i64).unwrap_or(-1)))
        }
        _ => Err(Error::Unsupported(format!(
            "String method '{}' not implemented",
            method
        ))),
    }
}

/// Call a method on a list value (non-mutating).
pub fn call_list_method(items: &[PyValue], method: &str, args: Vec<PyValue>) -> Result<PyValue> {
    match method {
        "index" => {
            check_args("index", &args, 1)?;
            for (i, item) in items.iter().enumerate() {
                if values_equal(item, &args[0]) {
                    return Ok(PyValue::Int(i as i64));
                }
            }
            Err(Error::Runtime("value not in list".to_string()))
        }
        "count" => {
            check_args("count", &args, 1)?;
            let count = items.iter().filter(|item| values_equal(item, &args[0])).count();
            Ok(PyValue::Int(count as i64))
        }
        "copy" => {
            check_args("copy", &args, 0)?;
            Ok(PyValue::List(items.to_vec()))
        }
        _ => Err(Error::Unsupported(format!(
            "List method '{}' not implemented",
            method
        ))),
    }
}

/// Call a method on a dict value (non-mutating).
pub fn call_dict_method(
    pairs: &[(String, PyValue)],
    method: &str,
    args: Vec<PyValue>,
) -> Result<PyValue> {
    match method {
        "get" => {
            check_args_range("get", &args, 1, 2)?;
            let key = arg_str(&args[0])?;
            let default = args.get(1).cloned().unwrap_or(PyValue::None);
            Ok(pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or(default))
        }
        "keys" => {
            check_args("keys", &args, 0)?;
            Ok(PyValue::List(
                pairs.iter().map(|(k, _)| PyValue::Str(k.clone())).collect(),
            ))
        }
        "values" => {
            check_args("values", &args, 0)?;
            Ok(PyValue::List(pairs.iter().map(|(_, v)| v.clone()).collect()))
        }
        "items" => {
            check_args("items", &args, 0)?;
            Ok(PyValue::List(
                pairs
                    .iter()
                    .map(|(k, v)| PyValue::List(vec![PyValue::Str(k.clone()), v.clone()]))
                    .collect(),
            ))
        }
        "copy" => {
            check_args("copy", &args, 0)?;
            Ok(PyValue::Dict(pairs.to_vec()))
        }
        _ => Err(Error::Unsupported(format!(
            "Dict method '{}' not implemented",
            method
        ))),
    }
}

/// Whether `method` mutates a list receiver in place.
pub fn is_list_mutator(method: &str) -> bool {
    matches!(method, "append" | "extend" | "pop" | "clear")
}

/// Mutating list methods. The evaluator routes these here when the
/// receiver is a plain name so the updated list lands back in its binding.
pub fn mutate_list(items: &mut Vec<PyValue>, method: &str, args: Vec<PyValue>) -> Result<PyValue> {
    match method {
        "append" => {
            check_args("append", &args, 1)?;
            if let Some(value) = args.into_iter().next() {
                items.push(value);
            }
            Ok(PyValue::None)
        }
        "extend" => {
            check_args("extend", &args, 1)?;
            match &args[0] {
                PyValue::List(new_items) => {
                    items.extend(new_items.clone());
                }
                _ => {
                    return Err(Error::Type {
                        expected: "list".to_string(),
                        got: args[0].type_name().to_string(),
                    });
                }
            }
            Ok(PyValue::None)
        }
        "pop" => {
            check_args_range("pop", &args, 0, 1)?;
            if items.is_empty() {
                return Err(Error::Runtime("pop from empty list".to_string()));
            }
            let idx = match args.first() {
                None => items.len() - 1,
                Some(v) => {
                    let i = arg_int(v)?;
                    let len = items.len() as i64;
                    let idx = if i < 0 { len + i } else { i };
                    if idx < 0 || idx >= len {
                        return Err(Error::Runtime("pop index out of range".to_string()));
                    }
                    idx as usize
                }
            };
            Ok(items.remove(idx))
        }
        "clear" => {
            check_args("clear", &args, 0)?;
            items.clear();
            Ok(PyValue::None)
        }
        _ => Err(Error::Unsupported(format!(
            "List method '{}' not implemented",
            method
        ))),
    }
}

pub fn check_args(name: &str, args: &[PyValue], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::Runtime(format!(
            "{}() takes exactly {} argument{}",
            name,
            expected,
            if expected == 1 { "" } else { "s" }
        )));
    }
    Ok(())
}

pub fn check_args_range(name: &str, args: &[PyValue], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(Error::Runtime(format!(
            "{}() takes {} to {} arguments",
            name, min, max
        )));
    }
    Ok(())
}

pub fn arg_int(val: &PyValue) -> Result<i64> {
    val.as_int().ok_or_else(|| Error::Type {
        expected: "int".to_string(),
        got: val.type_name().to_string(),
    })
}

fn arg_str(val: &PyValue) -> Result<&str> {
    val.as_str().ok_or_else(|| Error::Type {
        expected: "str".to_string(),
        got: val.type_name().to_string(),
    })
}
