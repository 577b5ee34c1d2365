use std::rc::Rc;

use crate::{
    ast::TypeAnnotation,
    error::RuntimeErrorKind,
    interpreter::{Class, ClassKind, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    Number,
    String,
    Boolean,
    Array,
    Object,
    Function,
    Type,
    Symbol,
    Nil,
    Any,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 10] = [
        BuiltinType::Number,
        BuiltinType::String,
        BuiltinType::Boolean,
        BuiltinType::Array,
        BuiltinType::Object,
        BuiltinType::Function,
        BuiltinType::Type,
        BuiltinType::Symbol,
        BuiltinType::Nil,
        BuiltinType::Any,
    ];

    pub fn from_annotation(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.annotation_name() == name)
    }

    /// The lowercase name used in annotations and bound in the global scope.
    pub fn annotation_name(&self) -> &'static str {
        match self {
            BuiltinType::Number => "number",
            BuiltinType::String => "string",
            BuiltinType::Boolean => "boolean",
            BuiltinType::Array => "array",
            BuiltinType::Object => "object",
            BuiltinType::Function => "function",
            BuiltinType::Type => "type",
            BuiltinType::Symbol => "symbol",
            BuiltinType::Nil => "nil",
            BuiltinType::Any => "any",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BuiltinType::Number => "Number",
            BuiltinType::String => "String",
            BuiltinType::Boolean => "Boolean",
            BuiltinType::Array => "Array",
            BuiltinType::Object => "Object",
            BuiltinType::Function => "Function",
            BuiltinType::Type => "Type",
            BuiltinType::Symbol => "Symbol",
            BuiltinType::Nil => "Nil",
            BuiltinType::Any => "Any",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (BuiltinType::Any, _)
                | (BuiltinType::Number, Value::Number(_))
                | (BuiltinType::String, Value::String(_))
                | (BuiltinType::Boolean, Value::Boolean(_))
                | (BuiltinType::Nil, Value::Nil)
                | (BuiltinType::Array, Value::Array(_))
                | (BuiltinType::Object, Value::Object(_) | Value::Namespace(_))
                | (BuiltinType::Function, Value::Function(_))
                | (BuiltinType::Type, Value::Type(_))
                | (BuiltinType::Symbol, Value::Symbol(_))
        )
    }
}

/// A first-class type: one of the built-ins or a user class.
#[derive(Debug, Clone)]
pub enum TypeValue {
    Builtin(BuiltinType),
    Class(Rc<Class>),
}

impl TypeValue {
    pub fn name(&self) -> &str {
        match self {
            TypeValue::Builtin(ty) => ty.annotation_name(),
            TypeValue::Class(class) => &class.name,
        }
    }

    /// Classes compare by identity; two classes with the same name are
    /// different types.
    pub fn same(&self, other: &TypeValue) -> bool {
        match (self, other) {
            (TypeValue::Builtin(a), TypeValue::Builtin(b)) => a == b,
            (TypeValue::Class(a), TypeValue::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TypeValue::Builtin(ty) => ty.accepts(value),
            TypeValue::Class(class) => match value {
                Value::Object(object) => Rc::ptr_eq(&object.borrow().class, class),
                _ => false,
            },
        }
    }
}

pub fn type_of(value: &Value) -> TypeValue {
    let builtin = match value {
        Value::Number(_) => BuiltinType::Number,
        Value::String(_) => BuiltinType::String,
        Value::Boolean(_) => BuiltinType::Boolean,
        Value::Nil => BuiltinType::Nil,
        Value::Array(_) => BuiltinType::Array,
        Value::Object(object) => {
            let object = object.borrow();
            match object.class.kind {
                ClassKind::User => return TypeValue::Class(object.class.clone()),
                ClassKind::Builtin => BuiltinType::Object,
            }
        }
        Value::Namespace(_) => BuiltinType::Object,
        Value::Function(_) => BuiltinType::Function,
        Value::Type(_) => BuiltinType::Type,
        Value::Symbol(_) => BuiltinType::Symbol,
    };
    TypeValue::Builtin(builtin)
}

/// The name reported for a value's type in error messages.
pub fn display_name(value: &Value) -> String {
    match type_of(value) {
        TypeValue::Builtin(ty) => ty.display_name().to_string(),
        TypeValue::Class(class) => class.name.clone(),
    }
}

/// Resolves every name of an annotation. Built-in names need no lookup; any
/// other name must be bound to a type.
pub fn resolve(
    annotation: &TypeAnnotation,
    lookup: impl Fn(&str) -> Option<Value>,
) -> Result<Vec<TypeValue>, RuntimeErrorKind> {
    annotation
        .names
        .iter()
        .map(|name| {
            if let Some(builtin) = BuiltinType::from_annotation(name) {
                return Ok(TypeValue::Builtin(builtin));
            }
            match lookup(name) {
                Some(Value::Type(ty)) => Ok(ty),
                Some(_) => Err(RuntimeErrorKind::NotAType(name.clone())),
                None => Err(RuntimeErrorKind::UndefinedName(name.clone())),
            }
        })
        .collect()
}

pub fn is_assignable(value: &Value, types: &[TypeValue]) -> bool {
    types.iter().any(|ty| ty.accepts(value))
}
