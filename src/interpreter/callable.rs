use std::rc::Rc;

use tracing::trace;

use crate::{
    ast::FunctionDecl,
    error::{At, Error, RuntimeErrorKind},
    position::Position,
    stack,
};

use super::{
    environment::{EnvHandle, Mutability, ScopeKind},
    Flow, Interpreter, Value,
};

/// A function written in the script, closed over the scope it was defined in.
#[derive(Clone)]
pub struct UserFunction {
    pub decl: Rc<FunctionDecl>,
    pub closure: EnvHandle,
    pub this: Option<Value>,
}

impl std::fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserFunction")
            .field("name", &self.decl.display_name())
            .field("closure", &self.closure)
            .field("bound", &self.this.is_some())
            .finish()
    }
}

impl UserFunction {
    pub fn bind(&self, this: Value) -> Self {
        Self {
            decl: self.decl.clone(),
            closure: self.closure.clone(),
            this: Some(this),
        }
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        position: &Position,
    ) -> Result<Value, Error> {
        stack::guard(|| self.call_in_frame(interpreter, args, position))
    }

    fn call_in_frame(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        position: &Position,
    ) -> Result<Value, Error> {
        let decl = &self.decl;
        if args.len() != decl.params.len() {
            return Err(RuntimeErrorKind::ArityMismatch {
                name: decl.display_name().to_string(),
                expected: decl.params.len(),
                found: args.len(),
            }
            .at(position));
        }
        if interpreter.depth >= interpreter.config.max_call_depth {
            return Err(RuntimeErrorKind::CallDepthExceeded.at(position));
        }
        trace!(target: "es::interpreter", function = decl.display_name(), depth = interpreter.depth, "call");

        for (param, arg) in decl.params.iter().zip(&args) {
            if let Some(annotation) = &param.annotation {
                interpreter.check_annotation(self.closure.id(), arg, annotation, position)?;
            }
        }

        let frame = interpreter.environment.push(self.closure.id(), ScopeKind::Function);
        interpreter.depth += 1;
        let result = interpreter.execute_in_scope(frame, |interpreter| {
            if let Some(this) = &self.this {
                interpreter
                    .environment
                    .declare(frame, "this".to_string(), this.clone(), Mutability::Constant)
                    .at(position)?;
            }
            for (param, arg) in decl.params.iter().zip(args) {
                interpreter
                    .environment
                    .declare(frame, param.name.clone(), arg, Mutability::Mutable)
                    .at(&param.position)?;
            }
            match interpreter.execute_statements(&decl.body)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Nil),
            }
        });
        interpreter.depth -= 1;
        let value = result?;

        if let Some(return_type) = &decl.return_type {
            interpreter.check_annotation(self.closure.id(), &value, return_type, position)?;
        }
        Ok(value)
    }
}

pub type NativeFn = dyn Fn(&mut Interpreter, &[Value], &Position) -> Result<Value, Error>;

/// A function implemented in Rust. `arity` of `None` accepts any number of
/// arguments.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: Option<usize>,
    pub func: Rc<NativeFn>,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        arity: Option<usize>,
        func: impl Fn(&mut Interpreter, &[Value], &Position) -> Result<Value, Error> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Rc::new(func),
        }
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        position: &Position,
    ) -> Result<Value, Error> {
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(RuntimeErrorKind::ArityMismatch {
                    name: self.name.clone(),
                    expected: arity,
                    found: args.len(),
                }
                .at(position));
            }
        }
        (self.func)(interpreter, &args, position)
    }
}

#[derive(Debug, Clone)]
pub enum Callable {
    Function(UserFunction),
    Native(NativeFunction),
}

impl Callable {
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        position: &Position,
    ) -> Result<Value, Error> {
        match self {
            Callable::Function(function) => function.call(interpreter, args, position),
            Callable::Native(native) => native.call(interpreter, args, position),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::Function(function) => function.decl.display_name(),
            Callable::Native(native) => &native.name,
        }
    }
}

impl From<NativeFunction> for Value {
    fn from(native: NativeFunction) -> Self {
        Value::Function(Rc::new(Callable::Native(native)))
    }
}
