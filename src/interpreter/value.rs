use std::{cell::RefCell, rc::Rc};

use crate::types::TypeValue;

use super::{callable::Callable, class::Object};

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Nil,
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Callable>),
    Type(TypeValue),
    Symbol(Rc<Symbol>),
    Namespace(Rc<Namespace>),
}

impl Value {
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// A named export of a module.
#[derive(Debug)]
pub struct Symbol {
    pub identifier: String,
    pub value: Value,
    pub constant: bool,
}

/// The exports of an evaluated module, in declaration order.
#[derive(Debug)]
pub struct Namespace {
    pub name: String,
    pub symbols: Vec<Rc<Symbol>>,
}

impl Namespace {
    pub fn get(&self, identifier: &str) -> Option<&Rc<Symbol>> {
        self.symbols
            .iter()
            .find(|symbol| symbol.identifier == identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|symbol| symbol.identifier.as_str())
    }
}
