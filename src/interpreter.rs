mod builtins;
mod callable;
mod class;
mod environment;
mod operators;
mod value;

use std::{fmt::Debug, path::Path, rc::Rc};

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::{
    ast::{
        ClassDecl, Expression, ExpressionKind, FunctionDecl, InfixOperator, Literal,
        NamespaceDecl, Parameter, Program, Qualifier, Statement, StatementKind, TypeAnnotation,
    },
    config::Config,
    error::{At, Error, InitError, RuntimeErrorKind},
    host::{Host, RunContext},
    module::ModuleLoader,
    parser,
    position::Position,
    stack,
    tokenizer::{tokenize, AssignOperator, TokenKind},
    types::{self, TypeValue},
};

pub use self::{
    callable::{Callable, NativeFunction, UserFunction},
    class::{Class, ClassKind, Object},
    environment::{EnvHandle, EnvId, Environment, Mutability, ScopeKind},
    operators::format_number,
    value::{Namespace, Symbol, Value},
};

/// How a statement finished.
pub(crate) enum Flow {
    Normal(Value),
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    pub(crate) environment: Environment,
    scope: EnvId,
    session: Option<EnvHandle>,
    host: Host,
    config: Config,
    pub(crate) modules: ModuleLoader,
    object_class: Rc<Class>,
    depth: usize,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("scope", &self.scope)
            .field("scopes", &self.environment.len())
            .field("config", &self.config)
            .field("depth", &self.depth)
            .finish()
    }
}

impl Interpreter {
    /// Creates an interpreter with the built-ins and the host's libraries
    /// bound in its global scope.
    pub fn init(mut host: Host, config: Config) -> Result<Self, InitError> {
        let libraries = std::mem::take(&mut host.libraries);
        let environment = Environment::new();
        let mut interpreter = Self {
            scope: environment.global(),
            environment,
            session: None,
            host,
            config,
            modules: ModuleLoader::default(),
            object_class: Class::object(),
            depth: 0,
        };

        builtins::install(&mut interpreter)?;

        for library in libraries {
            if !is_identifier(&library.name) {
                return Err(InitError::InvalidName(library.name));
            }
            let global = interpreter.environment.global();
            if interpreter.environment.binding(global, &library.name).is_some() {
                return Err(InitError::DuplicateBinding(library.name));
            }
            let mut object = Object::new(interpreter.object_class.clone());
            object.fields.extend(library.members);
            interpreter
                .environment
                .declare(
                    global,
                    library.name.clone(),
                    Value::Object(Rc::new(std::cell::RefCell::new(object))),
                    Mutability::Constant,
                )
                .map_err(|_| InitError::DuplicateBinding(library.name.clone()))?;
            debug!(target: "es::interpreter", library = %library.name, "installed host library");
        }

        Ok(interpreter)
    }

    /// Runs a whole script in a fresh module scope and returns the value of
    /// its last top-level statement. Scopes the script left unreachable are
    /// freed before it returns.
    pub fn run(&mut self, source: &str, context: &RunContext) -> Result<Value, Error> {
        info!(target: "es::interpreter", file = %context.file_name, "run");
        let tokens = tokenize(source, &context.file_name)?;
        let program = parser::program(&tokens)?;

        let entry = Path::new(&context.file_name).canonicalize().ok();
        if let Some(entry) = &entry {
            self.modules.begin(entry.clone());
        }
        let scope = self
            .environment
            .push(self.environment.global(), ScopeKind::Module);
        let result = self.execute_in_scope(scope, |interpreter| interpreter.execute_program(&program));
        if entry.is_some() {
            self.modules.finish();
        }
        self.environment.collect();
        result
    }

    /// Runs `source` in a scope that persists across calls, for interactive
    /// sessions.
    pub fn run_session(&mut self, source: &str, context: &RunContext) -> Result<Value, Error> {
        let tokens = tokenize(source, &context.file_name)?;
        let program = parser::program(&tokens)?;

        let session = match &self.session {
            Some(session) => session.id(),
            None => {
                let session = self
                    .environment
                    .push(self.environment.global(), ScopeKind::Module);
                self.session = Some(self.environment.capture(session));
                session
            }
        };
        let prev = std::mem::replace(&mut self.scope, session);
        let result = self.execute_program(&program);
        self.scope = prev;
        result
    }

    /// Renders a value the way `str` does.
    pub fn stringify(&mut self, value: &Value) -> Result<String, Error> {
        self.stringify_at(value, &Position::start("<host>"))
    }

    pub(crate) fn execute_program(&mut self, program: &Program) -> Result<Value, Error> {
        let mut last = Value::Nil;
        for stmt in &program.0 {
            if let Flow::Normal(value) = self.execute(stmt)? {
                last = value;
            }
        }
        Ok(last)
    }

    pub(crate) fn execute_in_scope<T>(
        &mut self,
        scope: EnvId,
        f: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let prev = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = prev;
        self.environment.release(scope);
        result
    }

    pub(crate) fn execute_statements(&mut self, statements: &[Statement]) -> Result<Flow, Error> {
        let mut last = Value::Nil;
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal(value) => last = value,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn execute_block(&mut self, statements: &[Statement]) -> Result<Flow, Error> {
        let scope = self.environment.push(self.scope, ScopeKind::Block);
        self.execute_in_scope(scope, |interpreter| interpreter.execute_statements(statements))
    }

    fn execute(&mut self, stmt: &Statement) -> Result<Flow, Error> {
        stack::guard(|| self.execute_statement(stmt))
    }

    fn execute_statement(&mut self, stmt: &Statement) -> Result<Flow, Error> {
        let flow = match &stmt.kind {
            StatementKind::Expression(expr) => Flow::Normal(self.evaluate(expr)?),
            StatementKind::Declaration(decl) => {
                let value = match &decl.initializer {
                    Some(initializer) => {
                        let value = self.evaluate(initializer)?;
                        if let Some(annotation) = &decl.annotation {
                            self.check_annotation(self.scope, &value, annotation, &stmt.position)?;
                        }
                        value
                    }
                    None => Value::Nil,
                };
                self.bind(decl.qualifier, decl.name.clone(), value.clone())
                    .at(&stmt.position)?;
                Flow::Normal(value)
            }
            StatementKind::Destructure(decl) => {
                let value = self.evaluate(&decl.value)?;
                let items = self.destructure(&value, &decl.targets, &decl.value.position)?;
                for (target, item) in decl.targets.iter().zip(items) {
                    if let Some(annotation) = &target.annotation {
                        self.check_annotation(self.scope, &item, annotation, &target.position)?;
                    }
                    self.bind(decl.qualifier, target.name.clone(), item)
                        .at(&target.position)?;
                }
                Flow::Normal(value)
            }
            StatementKind::Function(decl, _) => {
                let value = self.function_value(decl);
                self.environment
                    .declare(
                        self.scope,
                        decl.display_name().to_string(),
                        value.clone(),
                        Mutability::Mutable,
                    )
                    .at(&stmt.position)?;
                Flow::Normal(value)
            }
            StatementKind::Class(decl, _) => {
                let value = self.class_value(decl);
                self.environment
                    .declare(
                        self.scope,
                        decl.display_name().to_string(),
                        value.clone(),
                        Mutability::Mutable,
                    )
                    .at(&stmt.position)?;
                Flow::Normal(value)
            }
            StatementKind::Namespace(decl, _) => {
                let value = self.namespace_value(decl)?;
                self.environment
                    .declare(
                        self.scope,
                        decl.display_name().to_string(),
                        value.clone(),
                        Mutability::Mutable,
                    )
                    .at(&stmt.position)?;
                Flow::Normal(value)
            }
            StatementKind::If(condition, then_branch, else_branch) => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(then_branch)?
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?
                } else {
                    Flow::Normal(Value::Nil)
                }
            }
            StatementKind::While(condition, body) => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal(_) | Flow::Continue => {}
                    }
                }
                Flow::Normal(Value::Nil)
            }
            StatementKind::For {
                variable,
                iterable,
                body,
            } => {
                let iterable_value = self.evaluate(iterable)?;
                let items = self.iterate(&iterable_value, &iterable.position)?;
                for item in items {
                    let scope = self.environment.push(self.scope, ScopeKind::Block);
                    let flow = self.execute_in_scope(scope, |interpreter| {
                        interpreter
                            .environment
                            .declare(scope, variable.clone(), item, Mutability::Mutable)
                            .at(&stmt.position)?;
                        interpreter.execute_statements(body)
                    })?;
                    match flow {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal(_) | Flow::Continue => {}
                    }
                }
                Flow::Normal(Value::Nil)
            }
            StatementKind::Block(statements) => self.execute_block(statements)?,
            StatementKind::Return(expr) => match expr {
                Some(expr) => Flow::Return(self.evaluate(expr)?),
                None => Flow::Return(Value::Nil),
            },
            StatementKind::Break => Flow::Break,
            StatementKind::Continue => Flow::Continue,
        };
        Ok(flow)
    }

    /// Binds a declared name the way its qualifier asks for.
    fn bind(&mut self, qualifier: Qualifier, name: String, value: Value) -> Result<(), RuntimeErrorKind> {
        match qualifier {
            Qualifier::Var => self.environment.declare_var(self.scope, name, value),
            Qualifier::Let => self
                .environment
                .declare(self.scope, name, value, Mutability::Mutable),
            Qualifier::Const => self
                .environment
                .declare(self.scope, name, value, Mutability::Constant),
        }
    }

    /// The values bound by `let [a, b] = value`. Arrays, strings and other
    /// iterables bind their leading elements. Objects and namespaces bind the
    /// members named like the targets.
    fn destructure(
        &mut self,
        value: &Value,
        targets: &[Parameter],
        position: &Position,
    ) -> Result<Vec<Value>, Error> {
        match value {
            Value::Object(object) => {
                let object = object.borrow();
                Ok(targets
                    .iter()
                    .map(|target| object.fields.get(&target.name).cloned().unwrap_or(Value::Nil))
                    .collect())
            }
            Value::Namespace(_) => targets
                .iter()
                .map(|target| self.get_member(value, &target.name, &target.position))
                .collect(),
            _ => {
                let mut items = self.iterate(value, position)?;
                if items.len() < targets.len() {
                    return Err(RuntimeErrorKind::NotEnoughElements {
                        expected: targets.len(),
                        found: items.len(),
                    }
                    .at(position));
                }
                items.truncate(targets.len());
                Ok(items)
            }
        }
    }

    fn function_value(&mut self, decl: &Rc<FunctionDecl>) -> Value {
        Value::Function(Rc::new(Callable::Function(UserFunction {
            decl: decl.clone(),
            closure: self.environment.capture(self.scope),
            this: None,
        })))
    }

    fn class_value(&mut self, decl: &Rc<ClassDecl>) -> Value {
        let closure = self.environment.capture(self.scope);
        let methods: FxHashMap<String, UserFunction> = decl
            .methods
            .iter()
            .map(|method| {
                let function = UserFunction {
                    decl: method.clone(),
                    closure: closure.clone(),
                    this: None,
                };
                (method.display_name().to_string(), function)
            })
            .collect();
        Value::Type(TypeValue::Class(Rc::new(Class {
            name: decl.display_name().to_string(),
            methods,
            properties: decl.properties.clone(),
            scope: Some(closure),
            kind: ClassKind::User,
        })))
    }

    /// Runs a namespace body in its own scope and exports everything it
    /// declares.
    fn namespace_value(&mut self, decl: &Rc<NamespaceDecl>) -> Result<Value, Error> {
        let scope = self.environment.push(self.scope, ScopeKind::Module);
        let namespace = self.execute_in_scope(scope, |interpreter| {
            interpreter.execute_statements(&decl.body)?;
            let name = decl.display_name().to_string();
            Ok(interpreter.collect_symbols(name, &decl.body, scope))
        })?;
        debug!(
            target: "es::interpreter",
            namespace = decl.display_name(),
            symbols = namespace.symbols.len(),
            "namespace"
        );
        Ok(Value::Namespace(Rc::new(namespace)))
    }

    fn evaluate(&mut self, expr: &Expression) -> Result<Value, Error> {
        stack::guard(|| self.evaluate_expression(expr))
    }

    fn evaluate_expression(&mut self, expr: &Expression) -> Result<Value, Error> {
        let position = &expr.position;
        match &expr.kind {
            ExpressionKind::Identifier(name) => self
                .environment
                .get(self.scope, name)
                .cloned()
                .ok_or_else(|| RuntimeErrorKind::UndefinedName(name.clone()).at(position)),
            ExpressionKind::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Nil => Value::Nil,
            }),
            ExpressionKind::Grouping(expr) => self.evaluate(expr),
            ExpressionKind::Array(elements) => {
                let values = elements
                    .iter()
                    .map(|element| self.evaluate(element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(values))
            }
            ExpressionKind::Object(fields) => {
                let mut object = Object::new(self.object_class.clone());
                for (key, value) in fields {
                    let value = self.evaluate(value)?;
                    object.fields.insert(key.clone(), value);
                }
                Ok(Value::Object(Rc::new(std::cell::RefCell::new(object))))
            }
            ExpressionKind::Binary(left, operator, right) => {
                let left = self.evaluate(left)?;
                match operator {
                    InfixOperator::And => {
                        if !left.is_truthy() {
                            return Ok(Value::Boolean(false));
                        }
                        Ok(Value::Boolean(self.evaluate(right)?.is_truthy()))
                    }
                    InfixOperator::Or => {
                        if left.is_truthy() {
                            return Ok(Value::Boolean(true));
                        }
                        Ok(Value::Boolean(self.evaluate(right)?.is_truthy()))
                    }
                    InfixOperator::Coalesce => {
                        if left.is_nil() {
                            self.evaluate(right)
                        } else {
                            Ok(left)
                        }
                    }
                    operator => {
                        let right = self.evaluate(right)?;
                        self.binary(*operator, left, right, position)
                    }
                }
            }
            ExpressionKind::Unary(operator, operand) => {
                let operand = self.evaluate(operand)?;
                self.unary(*operator, operand, position)
            }
            ExpressionKind::Assign {
                target,
                operator,
                value,
            } => self.assign(target, *operator, value, position),
            ExpressionKind::Call(callee, args) => {
                let callee = self.evaluate(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(&callee, args, position)
            }
            ExpressionKind::Member(object, name) => {
                let object = self.evaluate(object)?;
                self.get_member(&object, name, position)
            }
            ExpressionKind::Index(object, index) => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                self.get_index(&object, &index, position)
            }
            ExpressionKind::Function(decl) => Ok(self.function_value(decl)),
            ExpressionKind::Class(decl) => Ok(self.class_value(decl)),
            ExpressionKind::Namespace(decl) => self.namespace_value(decl),
            ExpressionKind::Import(path) => {
                let path = match self.evaluate(path)? {
                    Value::String(path) => path,
                    other => {
                        return Err(RuntimeErrorKind::TypeMismatch {
                            expected: "string".to_string(),
                            found: types::display_name(&other),
                        }
                        .at(position))
                    }
                };
                Ok(Value::Namespace(self.import(&path, position)?))
            }
        }
    }

    pub(crate) fn call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        position: &Position,
    ) -> Result<Value, Error> {
        match callee {
            Value::Function(callable) => callable.call(self, args, position),
            Value::Type(TypeValue::Class(class)) => class.instantiate(self, args, position),
            Value::Type(TypeValue::Builtin(ty)) => builtins::cast(self, *ty, args, position),
            other => Err(RuntimeErrorKind::NotCallable(types::display_name(other)).at(position)),
        }
    }

    fn assign(
        &mut self,
        target: &Expression,
        operator: AssignOperator,
        value: &Expression,
        position: &Position,
    ) -> Result<Value, Error> {
        match &target.kind {
            ExpressionKind::Identifier(name) => {
                let value = self.assigned_value(operator, value, position, |interpreter| {
                    interpreter
                        .environment
                        .get(interpreter.scope, name)
                        .cloned()
                        .ok_or_else(|| RuntimeErrorKind::UndefinedName(name.clone()).at(position))
                })?;
                self.environment
                    .assign(self.scope, name, value.clone())
                    .at(position)?;
                Ok(value)
            }
            ExpressionKind::Member(object, name) => {
                let object = self.evaluate(object)?;
                let value = self.assigned_value(operator, value, position, |interpreter| {
                    interpreter.get_member(&object, name, position)
                })?;
                self.set_member(&object, name, value.clone(), position)?;
                Ok(value)
            }
            ExpressionKind::Index(object, index) => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let value = self.assigned_value(operator, value, position, |interpreter| {
                    interpreter.get_index(&object, &index, position)
                })?;
                self.set_index(&object, &index, value.clone(), position)?;
                Ok(value)
            }
            _ => Err(RuntimeErrorKind::ReadOnlyProperty {
                target: target.to_string(),
                name: String::new(),
            }
            .at(position)),
        }
    }

    /// The value stored by an assignment; compound forms read the current
    /// value first.
    fn assigned_value(
        &mut self,
        operator: AssignOperator,
        value: &Expression,
        position: &Position,
        current: impl FnOnce(&mut Self) -> Result<Value, Error>,
    ) -> Result<Value, Error> {
        match InfixOperator::from_assign(operator) {
            None => self.evaluate(value),
            Some(operator) => {
                let current = current(self)?;
                let value = self.evaluate(value)?;
                self.binary(operator, current, value, position)
            }
        }
    }

    fn get_member(&mut self, value: &Value, name: &str, position: &Position) -> Result<Value, Error> {
        match value {
            Value::Object(object) => {
                let object = object.borrow();
                if let Some(field) = object.fields.get(name) {
                    return Ok(field.clone());
                }
                if let Some(method) = object.class.find_method(name) {
                    let bound = method.bind(value.clone());
                    return Ok(Value::Function(Rc::new(Callable::Function(bound))));
                }
            }
            Value::Namespace(namespace) => {
                return match namespace.get(name) {
                    Some(symbol) => Ok(symbol.value.clone()),
                    None => Err(RuntimeErrorKind::NotExported {
                        namespace: namespace.name.clone(),
                        name: name.to_string(),
                    }
                    .at(position)),
                };
            }
            Value::Type(ty) if name == "name" => return Ok(Value::String(ty.name().to_string())),
            Value::Symbol(symbol) if name == "name" => {
                return Ok(Value::String(symbol.identifier.clone()))
            }
            Value::Symbol(symbol) if name == "value" => return Ok(symbol.value.clone()),
            _ => {}
        }

        builtins::method(value, name).ok_or_else(|| {
            RuntimeErrorKind::UndefinedProperty {
                target: types::display_name(value),
                name: name.to_string(),
            }
            .at(position)
        })
    }

    fn set_member(
        &mut self,
        target: &Value,
        name: &str,
        value: Value,
        position: &Position,
    ) -> Result<(), Error> {
        match target {
            Value::Object(object) => {
                let class = object.borrow().class.clone();
                if let (Some(property), Some(scope)) = (class.property(name), &class.scope) {
                    if let Some(annotation) = &property.annotation {
                        self.check_annotation(scope.id(), &value, annotation, position)?;
                    }
                }
                object.borrow_mut().fields.insert(name.to_string(), value);
                Ok(())
            }
            other => Err(RuntimeErrorKind::ReadOnlyProperty {
                target: types::display_name(other),
                name: name.to_string(),
            }
            .at(position)),
        }
    }

    fn get_index(&mut self, target: &Value, index: &Value, position: &Position) -> Result<Value, Error> {
        match (target, index) {
            (Value::Array(items), Value::Number(i)) => {
                let items = items.borrow();
                let i = array_index(*i, items.len()).ok_or_else(|| invalid_index(target, index, position))?;
                Ok(items.get(i).cloned().unwrap_or(Value::Nil))
            }
            (Value::String(s), Value::Number(i)) => {
                let len = s.chars().count();
                let i = array_index(*i, len).ok_or_else(|| invalid_index(target, index, position))?;
                Ok(s.chars()
                    .nth(i)
                    .map_or(Value::Nil, |c| Value::String(c.to_string())))
            }
            (Value::Object(object), Value::String(key)) => Ok(object
                .borrow()
                .fields
                .get(key)
                .cloned()
                .unwrap_or(Value::Nil)),
            (Value::Namespace(_), Value::String(key)) => self.get_member(target, key, position),
            _ => Err(invalid_index(target, index, position)),
        }
    }

    fn set_index(
        &mut self,
        target: &Value,
        index: &Value,
        value: Value,
        position: &Position,
    ) -> Result<(), Error> {
        match (target, index) {
            (Value::Array(items), Value::Number(i)) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                match array_index(*i, len) {
                    Some(i) if i < len => items[i] = value,
                    Some(i) if i == len => items.push(value),
                    _ => return Err(invalid_index(target, index, position)),
                }
                Ok(())
            }
            (Value::Object(_), Value::String(key)) => self.set_member(target, key, value, position),
            _ => Err(invalid_index(target, index, position)),
        }
    }

    fn iterate(&mut self, value: &Value, position: &Position) -> Result<Vec<Value>, Error> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            Value::Object(object) => Ok(object
                .borrow()
                .sorted_keys()
                .into_iter()
                .map(Value::String)
                .collect()),
            Value::Namespace(namespace) => Ok(namespace
                .symbols
                .iter()
                .map(|symbol| Value::Symbol(symbol.clone()))
                .collect()),
            other => Err(RuntimeErrorKind::NotIterable(types::display_name(other)).at(position)),
        }
    }

    /// Checks `value` against an annotation whose names resolve in `scope`.
    pub(crate) fn check_annotation(
        &mut self,
        scope: EnvId,
        value: &Value,
        annotation: &TypeAnnotation,
        position: &Position,
    ) -> Result<(), Error> {
        let environment = &self.environment;
        let types = types::resolve(annotation, |name| environment.get(scope, name).cloned())
            .at(&annotation.position)?;
        if types::is_assignable(value, &types) {
            return Ok(());
        }
        Err(RuntimeErrorKind::TypeMismatch {
            expected: annotation.to_string(),
            found: types::display_name(value),
        }
        .at(position))
    }

    pub(crate) fn global_scope(&self) -> EnvId {
        self.environment.global()
    }
}

/// Resolves a script index, counting negative values from the end. Returns
/// `None` for fractional or too negative indices.
fn array_index(index: f64, len: usize) -> Option<usize> {
    if index.fract() != 0.0 || !index.is_finite() {
        return None;
    }
    let index = if index < 0.0 { len as f64 + index } else { index };
    (index >= 0.0).then_some(index as usize)
}

fn invalid_index(target: &Value, index: &Value, position: &Position) -> Error {
    RuntimeErrorKind::InvalidIndex {
        target: types::display_name(target),
        index: types::display_name(index),
    }
    .at(position)
}

fn is_identifier(name: &str) -> bool {
    matches!(
        tokenize(name, "<init>").as_deref(),
        Ok([token, eof]) if matches!(token.kind, TokenKind::Identifier(_)) && eof.kind == TokenKind::Eof
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn interpreter() -> Interpreter {
        let host = Host::default().with_log(|_| {}).with_prompt(|_| None);
        Interpreter::init(host, Config::default()).unwrap()
    }

    #[test]
    fn test_scopes_are_reclaimed() {
        let mut interpreter = interpreter();
        let context = RunContext::new("test.es");
        let baseline = interpreter.environment.len();

        interpreter
            .run("for n in range(10000) { let f = func () n; }", &context)
            .unwrap();
        assert_eq!(interpreter.environment.len(), baseline);

        for _ in 0..10 {
            interpreter.run("func g() {} g();", &context).unwrap();
        }
        assert_eq!(interpreter.environment.len(), baseline);
    }

    #[test]
    fn test_scopes_stay_bounded_within_a_run() {
        let mut interpreter = interpreter();
        let context = RunContext::new("test.es");
        let source = "
            let counters = [];
            func counter() {
                let count = 0;
                return func () { count += 1; return count; };
            }
            for n in range(5000) {
                let c = counter();
                c();
                if n % 1000 == 0 { counters.add(c) }
            }
            counters[4]() + counters[0]();
        ";
        let value = interpreter.run(source, &context).unwrap();
        assert_eq!(interpreter.stringify(&value).unwrap(), "4");
        assert_eq!(interpreter.environment.len(), 1);
    }

    #[test]
    fn test_returned_closures_keep_their_scope() {
        let mut interpreter = interpreter();
        let context = RunContext::new("test.es");
        let source = "
            class Box {
                init(value) { this.value = value }
                str() { return 'Box(' + str(this.value) + ')' }
            }
            Box(7);
        ";
        let value = interpreter.run(source, &context).unwrap();
        assert!(interpreter.environment.len() > 1);
        assert_eq!(interpreter.stringify(&value).unwrap(), "Box(7)");

        drop(value);
        interpreter.run("nil;", &context).unwrap();
        assert_eq!(interpreter.environment.len(), 1);
    }

    #[test]
    fn test_session_scope_survives_runs() {
        let mut interpreter = interpreter();
        let context = RunContext::new("<repl>");
        interpreter
            .run_session("let twice = func (x) x * 2;", &context)
            .unwrap();
        interpreter.run("func g() {} g();", &context).unwrap();
        let value = interpreter.run_session("twice(21);", &context).unwrap();
        assert_eq!(interpreter.stringify(&value).unwrap(), "42");
        assert_eq!(interpreter.environment.len(), 2);
    }
}
