use std::{cell::RefCell, rc::Rc};

use tracing::trace;

use crate::{
    error::{Error, InitError, RuntimeErrorKind},
    position::Position,
    types::{self, BuiltinType, TypeValue},
};

use super::{
    environment::Mutability, operators::values_equal, Interpreter, NativeFunction, Object, Value,
};

/// A native method; the receiver is passed separately from the arguments.
type Method = fn(&mut Interpreter, &Value, &[Value], &Position) -> Result<Value, Error>;

/// Binds the built-in functions and types in the global scope.
pub(super) fn install(interpreter: &mut Interpreter) -> Result<(), InitError> {
    let functions = [
        NativeFunction::new("print", None, print),
        NativeFunction::new("input", None, input),
        NativeFunction::new("typeof", Some(1), |_, args, _| {
            Ok(Value::Type(types::type_of(&args[0])))
        }),
        NativeFunction::new("str", Some(1), |interpreter, args, position| {
            Ok(Value::String(interpreter.stringify_at(&args[0], position)?))
        }),
        NativeFunction::new("len", Some(1), |_, args, position| len("len", &args[0], position)),
        NativeFunction::new("range", None, range),
    ];

    let global = interpreter.environment.global();
    for function in functions {
        let name = function.name.clone();
        interpreter
            .environment
            .declare(global, name.clone(), function.into(), Mutability::Constant)
            .map_err(|_| InitError::DuplicateBinding(name))?;
    }

    // `nil` is a keyword, so its type is reachable through annotations only.
    for ty in BuiltinType::ALL.into_iter().filter(|ty| *ty != BuiltinType::Nil) {
        let name = ty.annotation_name().to_string();
        interpreter
            .environment
            .declare(
                global,
                name.clone(),
                Value::Type(TypeValue::Builtin(ty)),
                Mutability::Constant,
            )
            .map_err(|_| InitError::DuplicateBinding(name))?;
    }
    Ok(())
}

fn print(interpreter: &mut Interpreter, args: &[Value], position: &Position) -> Result<Value, Error> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(interpreter.stringify_at(arg, position)?);
    }
    let line = parts.join(" ");
    (interpreter.host.log)(&line);
    Ok(Value::Nil)
}

fn input(interpreter: &mut Interpreter, args: &[Value], position: &Position) -> Result<Value, Error> {
    let prompt = match args {
        [] => String::new(),
        [prompt] => interpreter.stringify_at(prompt, position)?,
        _ => {
            return Err(RuntimeErrorKind::ArityMismatch {
                name: "input".to_string(),
                expected: 1,
                found: args.len(),
            }
            .at(position))
        }
    };
    Ok((interpreter.host.prompt)(&prompt).map_or(Value::Nil, Value::String))
}

fn len(name: &str, value: &Value, position: &Position) -> Result<Value, Error> {
    let len = match value {
        Value::Array(items) => items.borrow().len(),
        Value::String(s) => s.chars().count(),
        Value::Object(object) => object.borrow().fields.len(),
        Value::Namespace(namespace) => namespace.symbols.len(),
        other => {
            return Err(RuntimeErrorKind::InvalidArgument {
                name: name.to_string(),
                reason: format!("'{}' has no length", types::display_name(other)),
            }
            .at(position))
        }
    };
    Ok(Value::Number(len as f64))
}

/// Longest array `range` builds.
const MAX_RANGE_LENGTH: usize = 1 << 22;

/// `range(end)`, `range(start, end)` or `range(start, end, step)`. A negative
/// step counts down towards `end`.
fn range(_: &mut Interpreter, args: &[Value], position: &Position) -> Result<Value, Error> {
    let invalid = |reason: &str| {
        RuntimeErrorKind::InvalidArgument {
            name: "range".to_string(),
            reason: reason.to_string(),
        }
        .at(position)
    };
    let (start, end, step) = match args {
        [Value::Number(end)] => (0.0, *end, 1.0),
        [Value::Number(start), Value::Number(end)] => (*start, *end, 1.0),
        [Value::Number(start), Value::Number(end), Value::Number(step)] => (*start, *end, *step),
        [_] | [_, _] | [_, _, _] => return Err(invalid("bounds and step must be numbers")),
        _ => {
            return Err(RuntimeErrorKind::ArityMismatch {
                name: "range".to_string(),
                expected: 3,
                found: args.len(),
            }
            .at(position))
        }
    };
    if !start.is_finite() || !end.is_finite() || !step.is_finite() {
        return Err(invalid("bounds and step must be finite"));
    }
    if step == 0.0 {
        return Err(invalid("step must not be 0"));
    }

    let count = ((end - start) / step).ceil();
    if count > MAX_RANGE_LENGTH as f64 {
        return Err(invalid(&format!(
            "a range of {} numbers is longer than {MAX_RANGE_LENGTH}",
            super::format_number(count)
        )));
    }
    let count = if count > 0.0 { count as usize } else { 0 };
    trace!(target: "es::interpreter", start, end, step, count, "range");
    let items = (0..count)
        .map(|i| Value::Number(start + i as f64 * step))
        .collect();
    Ok(Value::array(items))
}

/// Calling a built-in type converts its argument.
pub(super) fn cast(
    interpreter: &mut Interpreter,
    ty: BuiltinType,
    args: Vec<Value>,
    position: &Position,
) -> Result<Value, Error> {
    let [value] = args.as_slice() else {
        return Err(RuntimeErrorKind::ArityMismatch {
            name: ty.annotation_name().to_string(),
            expected: 1,
            found: args.len(),
        }
        .at(position));
    };
    trace!(target: "es::interpreter", ty = ty.annotation_name(), "cast");

    match ty {
        BuiltinType::Number => Ok(Value::Number(match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Nil => 0.0,
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            other => {
                return Err(RuntimeErrorKind::InvalidArgument {
                    name: "number".to_string(),
                    reason: format!("cannot convert '{}'", types::display_name(other)),
                }
                .at(position))
            }
        })),
        BuiltinType::String => Ok(Value::String(interpreter.stringify_at(value, position)?)),
        BuiltinType::Boolean => Ok(Value::Boolean(value.is_truthy())),
        BuiltinType::Any => Ok(value.clone()),
        _ => Err(RuntimeErrorKind::NotCallable(format!("<Type: {}>", ty.annotation_name())).at(position)),
    }
}

/// Looks up a native method of `receiver` and binds it.
pub(super) fn method(receiver: &Value, name: &str) -> Option<Value> {
    let (arity, method): (usize, Method) = match (receiver, name) {
        (_, "str") => (0, str_method),
        (Value::Array(_) | Value::Object(_), "clone") => (0, clone),
        (Value::Array(_) | Value::String(_), "len") => (0, len_method),
        (Value::Array(_), "add") => (1, array_add),
        (Value::Array(_), "pop") => (0, array_pop),
        (Value::Array(_), "join") => (1, array_join),
        (Value::Array(_) | Value::String(_), "contains") => (1, contains),
        (Value::String(_), "upper") => (0, string_upper),
        (Value::String(_), "lower") => (0, string_lower),
        (Value::String(_), "split") => (1, string_split),
        _ => return None,
    };

    let receiver = receiver.clone();
    let native = NativeFunction::new(name, Some(arity), move |interpreter, args, position| {
        method(interpreter, &receiver, args, position)
    });
    Some(native.into())
}

fn str_method(
    interpreter: &mut Interpreter,
    receiver: &Value,
    _: &[Value],
    position: &Position,
) -> Result<Value, Error> {
    Ok(Value::String(interpreter.stringify_at(receiver, position)?))
}

/// Shallow copy: the new container shares its elements with the old one.
fn clone(_: &mut Interpreter, receiver: &Value, _: &[Value], _: &Position) -> Result<Value, Error> {
    Ok(match receiver {
        Value::Array(items) => Value::array(items.borrow().clone()),
        Value::Object(object) => {
            let object = object.borrow();
            let mut copy = Object::new(object.class.clone());
            copy.fields = object.fields.clone();
            Value::Object(Rc::new(RefCell::new(copy)))
        }
        other => other.clone(),
    })
}

fn len_method(
    _: &mut Interpreter,
    receiver: &Value,
    _: &[Value],
    position: &Position,
) -> Result<Value, Error> {
    len("len", receiver, position)
}

fn array_add(_: &mut Interpreter, receiver: &Value, args: &[Value], _: &Position) -> Result<Value, Error> {
    if let Value::Array(items) = receiver {
        items.borrow_mut().push(args[0].clone());
    }
    Ok(receiver.clone())
}

fn array_pop(_: &mut Interpreter, receiver: &Value, _: &[Value], _: &Position) -> Result<Value, Error> {
    Ok(match receiver {
        Value::Array(items) => items.borrow_mut().pop().unwrap_or(Value::Nil),
        _ => Value::Nil,
    })
}

fn array_join(
    interpreter: &mut Interpreter,
    receiver: &Value,
    args: &[Value],
    position: &Position,
) -> Result<Value, Error> {
    let (Value::Array(items), Value::String(separator)) = (receiver, &args[0]) else {
        return Err(RuntimeErrorKind::InvalidArgument {
            name: "join".to_string(),
            reason: "separator must be a string".to_string(),
        }
        .at(position));
    };
    let items = items.borrow().clone();
    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(interpreter.stringify_at(item, position)?);
    }
    Ok(Value::String(parts.join(separator)))
}

fn contains(
    _: &mut Interpreter,
    receiver: &Value,
    args: &[Value],
    position: &Position,
) -> Result<Value, Error> {
    match (receiver, &args[0]) {
        (Value::Array(items), needle) => Ok(Value::Boolean(
            items.borrow().iter().any(|item| values_equal(item, needle)),
        )),
        (Value::String(s), Value::String(needle)) => Ok(Value::Boolean(s.contains(needle.as_str()))),
        (_, other) => Err(RuntimeErrorKind::InvalidArgument {
            name: "contains".to_string(),
            reason: format!("cannot search a string for '{}'", types::display_name(other)),
        }
        .at(position)),
    }
}

fn string_upper(_: &mut Interpreter, receiver: &Value, _: &[Value], _: &Position) -> Result<Value, Error> {
    Ok(match receiver {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => other.clone(),
    })
}

fn string_lower(_: &mut Interpreter, receiver: &Value, _: &[Value], _: &Position) -> Result<Value, Error> {
    Ok(match receiver {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other.clone(),
    })
}

fn string_split(
    _: &mut Interpreter,
    receiver: &Value,
    args: &[Value],
    position: &Position,
) -> Result<Value, Error> {
    let (Value::String(s), Value::String(separator)) = (receiver, &args[0]) else {
        return Err(RuntimeErrorKind::InvalidArgument {
            name: "split".to_string(),
            reason: "separator must be a string".to_string(),
        }
        .at(position));
    };
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(separator.as_str()).map(Value::from).collect()
    };
    Ok(Value::array(parts))
}
