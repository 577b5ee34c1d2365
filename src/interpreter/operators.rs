use std::rc::Rc;

use crate::{
    ast::{InfixOperator, UnaryOperator},
    error::{Error, RuntimeErrorKind},
    position::Position,
    stack, types,
};

use super::{ClassKind, Interpreter, Value};

/// The method a class defines to overload `operator`.
fn convention_method(operator: InfixOperator) -> Option<&'static str> {
    match operator {
        InfixOperator::Plus => Some("add"),
        InfixOperator::Minus => Some("subtract"),
        InfixOperator::Multiply => Some("multiply"),
        InfixOperator::Divide => Some("divide"),
        InfixOperator::Modulo => Some("modulo"),
        InfixOperator::Pow => Some("pow"),
        InfixOperator::Equal | InfixOperator::NotEqual => Some("eq"),
        InfixOperator::LessThan => Some("lt"),
        InfixOperator::LessThanOrEqual => Some("lte"),
        InfixOperator::GreaterThan => Some("gt"),
        InfixOperator::GreaterThanOrEqual => Some("gte"),
        InfixOperator::And | InfixOperator::Or | InfixOperator::Coalesce => None,
    }
}

impl Interpreter {
    /// Calls `name` on `receiver` when it is an object whose class defines
    /// that method. Returns `None` otherwise.
    fn call_convention(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        position: &Position,
    ) -> Option<Result<Value, Error>> {
        let Value::Object(object) = receiver else {
            return None;
        };
        let method = object.borrow().class.find_method(name).cloned()?;
        Some(method.bind(receiver.clone()).call(self, args, position))
    }

    pub(crate) fn binary(
        &mut self,
        operator: InfixOperator,
        left: Value,
        right: Value,
        position: &Position,
    ) -> Result<Value, Error> {
        if let Some(name) = convention_method(operator) {
            if let Some(result) = self.call_convention(&left, name, vec![right.clone()], position) {
                let result = result?;
                return match operator {
                    InfixOperator::NotEqual => Ok(Value::Boolean(!result.is_truthy())),
                    _ => Ok(result),
                };
            }
        }

        let unsupported = |left: &Value, right: &Value| {
            RuntimeErrorKind::UnsupportedOperands {
                operator: operator.to_string(),
                left: types::display_name(left),
                right: types::display_name(right),
            }
            .at(position)
        };

        match operator {
            InfixOperator::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(_), _) | (_, Value::String(_)) => {
                    let a = self.stringify_at(&left, position)?;
                    let b = self.stringify_at(&right, position)?;
                    Ok(Value::String(a + &b))
                }
                (Value::Array(a), Value::Array(b)) => {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Ok(Value::array(items))
                }
                _ => Err(unsupported(&left, &right)),
            },
            InfixOperator::Minus
            | InfixOperator::Multiply
            | InfixOperator::Divide
            | InfixOperator::Modulo
            | InfixOperator::Pow => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match operator {
                    InfixOperator::Minus => a - b,
                    InfixOperator::Multiply => a * b,
                    InfixOperator::Divide => a / b,
                    InfixOperator::Modulo => a % b,
                    _ => a.powf(*b),
                })),
                _ => Err(unsupported(&left, &right)),
            },
            InfixOperator::LessThan
            | InfixOperator::LessThanOrEqual
            | InfixOperator::GreaterThan
            | InfixOperator::GreaterThanOrEqual => {
                let ordering = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => return Err(unsupported(&left, &right)),
                };
                let result = ordering.is_some_and(|ordering| match operator {
                    InfixOperator::LessThan => ordering.is_lt(),
                    InfixOperator::LessThanOrEqual => ordering.is_le(),
                    InfixOperator::GreaterThan => ordering.is_gt(),
                    _ => ordering.is_ge(),
                });
                Ok(Value::Boolean(result))
            }
            InfixOperator::Equal => Ok(Value::Boolean(values_equal(&left, &right))),
            InfixOperator::NotEqual => Ok(Value::Boolean(!values_equal(&left, &right))),
            InfixOperator::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
            InfixOperator::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
            InfixOperator::Coalesce => Ok(if left.is_nil() { right } else { left }),
        }
    }

    pub(crate) fn unary(
        &mut self,
        operator: UnaryOperator,
        operand: Value,
        position: &Position,
    ) -> Result<Value, Error> {
        match (operator, &operand) {
            (UnaryOperator::Not, _) => Ok(Value::Boolean(!operand.is_truthy())),
            (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOperator::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
            (UnaryOperator::Negate, Value::Object(_)) => self
                .call_convention(&operand, "negate", Vec::new(), position)
                .unwrap_or_else(|| Err(unsupported_operand(operator, &operand, position))),
            _ => Err(unsupported_operand(operator, &operand, position)),
        }
    }

    /// Renders a value for `print`, `str` and string concatenation.
    pub(crate) fn stringify_at(&mut self, value: &Value, position: &Position) -> Result<String, Error> {
        let mut seen = Vec::new();
        self.render(value, false, &mut seen, position)
    }

    fn render(
        &mut self,
        value: &Value,
        nested: bool,
        seen: &mut Vec<*const ()>,
        position: &Position,
    ) -> Result<String, Error> {
        let rendered = match value {
            Value::Number(n) => format_number(*n),
            Value::String(s) if nested => format!("'{}'", s),
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Nil => "nil".to_string(),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    return Ok("[...]".to_string());
                }
                seen.push(ptr);
                let items = items.borrow().clone();
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(stack::guard(|| self.render(item, true, seen, position))?);
                }
                seen.pop();
                format!("[{}]", parts.join(", "))
            }
            Value::Object(object) => {
                if let Some(result) = self.call_convention(value, "str", Vec::new(), position) {
                    return match result? {
                        Value::String(s) => Ok(s),
                        _ => Err(RuntimeErrorKind::StrMustReturnString(
                            object.borrow().class.name.clone(),
                        )
                        .at(position)),
                    };
                }
                let class = object.borrow().class.clone();
                if class.kind == ClassKind::User {
                    return Ok(format!("<instance of {}>", class.name));
                }

                let ptr = Rc::as_ptr(object) as *const ();
                if seen.contains(&ptr) {
                    return Ok("{...}".to_string());
                }
                seen.push(ptr);
                let fields: Vec<(String, Value)> = {
                    let object = object.borrow();
                    object
                        .sorted_keys()
                        .into_iter()
                        .filter_map(|key| {
                            let value = object.fields.get(&key)?.clone();
                            Some((key, value))
                        })
                        .collect()
                };
                let mut parts = Vec::with_capacity(fields.len());
                for (key, field) in &fields {
                    parts.push(format!("{}: {}", key, stack::guard(|| self.render(field, true, seen, position))?));
                }
                seen.pop();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Function(callable) => format!("<Func: {}>", callable.name()),
            Value::Type(ty) => format!("<Type: {}>", ty.name()),
            Value::Symbol(symbol) => format!("<Symbol: {}>", symbol.identifier),
            Value::Namespace(namespace) => format!(
                "<Namespace {}: {}>",
                namespace.name,
                namespace.identifiers().collect::<Vec<_>>().join(", ")
            ),
        };
        Ok(rendered)
    }
}

fn unsupported_operand(operator: UnaryOperator, operand: &Value, position: &Position) -> Error {
    RuntimeErrorKind::UnsupportedOperand {
        operator: operator.to_string(),
        operand: types::display_name(operand),
    }
    .at(position)
}

/// Value equality for built-ins; containers, objects and functions compare
/// by identity.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Nil, Value::Nil) => true,
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Type(a), Value::Type(b)) => a.same(b),
        (Value::Symbol(a), Value::Symbol(b)) => Rc::ptr_eq(a, b),
        (Value::Namespace(a), Value::Namespace(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Integral numbers print without a fraction, everything else in the
/// shortest form that reads back to the same value. Magnitudes from `1e21`
/// and below `1e-6` use exponent form, as in `1e+300`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        n.to_string()
    }
}
