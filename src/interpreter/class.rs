use std::{cell::RefCell, rc::Rc};

use rustc_hash::FxHashMap;

use crate::{
    ast::Parameter,
    error::{Error, RuntimeErrorKind},
    position::Position,
};

use super::{callable::UserFunction, environment::EnvHandle, Interpreter, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Builtin,
    User,
}

pub struct Class {
    pub name: String,
    pub methods: FxHashMap<String, UserFunction>,
    /// Declared fields, with the annotation their assignments are checked
    /// against.
    pub properties: Vec<Parameter>,
    /// Where property annotations resolve.
    pub scope: Option<EnvHandle>,
    pub kind: ClassKind,
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field(
                "properties",
                &self.properties.iter().map(|p| &p.name).collect::<Vec<_>>(),
            )
            .field("kind", &self.kind)
            .finish()
    }
}

impl Class {
    /// The class of object literals and host library objects.
    pub fn object() -> Rc<Self> {
        Rc::new(Self {
            name: "Object".to_string(),
            methods: FxHashMap::default(),
            properties: Vec::new(),
            scope: None,
            kind: ClassKind::Builtin,
        })
    }

    pub fn find_method(&self, name: &str) -> Option<&UserFunction> {
        self.methods.get(name)
    }

    pub fn property(&self, name: &str) -> Option<&Parameter> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Allocates an object of this class with its declared properties set to
    /// `nil`, and runs `init` on it when the class defines one.
    pub fn instantiate(
        self: &Rc<Self>,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        position: &Position,
    ) -> Result<Value, Error> {
        let mut object = Object::new(self.clone());
        for property in &self.properties {
            object.fields.insert(property.name.clone(), Value::Nil);
        }
        let object = Value::Object(Rc::new(RefCell::new(object)));
        match self.find_method("init") {
            Some(init) => {
                init.bind(object.clone()).call(interpreter, args, position)?;
            }
            None if !args.is_empty() => {
                return Err(RuntimeErrorKind::ArityMismatch {
                    name: self.name.clone(),
                    expected: 0,
                    found: args.len(),
                }
                .at(position))
            }
            None => {}
        }
        Ok(object)
    }
}

pub struct Object {
    pub class: Rc<Class>,
    pub fields: FxHashMap<String, Value>,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl Object {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: FxHashMap::default(),
        }
    }

    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.fields.keys().cloned().collect();
        keys.sort();
        keys
    }
}
