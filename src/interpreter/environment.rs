use std::{
    cell::RefCell,
    collections::hash_map::Entry,
    rc::{Rc, Weak},
};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::RuntimeErrorKind;

use super::{
    callable::{Callable, UserFunction},
    class::{Class, Object},
    value::{Namespace, Symbol},
    Value,
};

/// Retained scopes that trigger the first collection.
const COLLECT_THRESHOLD: usize = 64;

/// Handle to a scope in an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(usize);

/// Keeps a scope and its ancestors alive while a closure, class or session
/// holds it.
#[derive(Clone)]
pub struct EnvHandle(Rc<Lease>);

struct Lease {
    id: EnvId,
    parent: Option<EnvHandle>,
}

impl EnvHandle {
    pub fn id(&self) -> EnvId {
        self.0.id
    }
}

impl std::fmt::Debug for EnvHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EnvHandle").field(&self.0.id).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Constant,
    Mutable,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutability: Mutability,
}

#[derive(Debug)]
struct Scope {
    bindings: FxHashMap<String, Binding>,
    parent: Option<EnvId>,
    kind: ScopeKind,
    lease: Weak<Lease>,
    released: bool,
}

impl Scope {
    fn new(parent: Option<EnvId>, kind: ScopeKind) -> Self {
        Self {
            bindings: FxHashMap::default(),
            parent,
            kind,
            lease: Weak::new(),
            released: false,
        }
    }
}

/// Every scope of an interpreter, addressed by [`EnvId`].
///
/// A released scope is freed at once unless a closure captured it. Captured
/// scopes are retained until [`Environment::collect`] finds that nothing
/// outside the retained scopes can still reach them. Freed slots are reused.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    free: Vec<EnvId>,
    retained: Vec<EnvId>,
    collect_at: usize,
    global: EnvHandle,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        let global = EnvHandle(Rc::new(Lease {
            id: EnvId(0),
            parent: None,
        }));
        let mut scope = Scope::new(None, ScopeKind::Global);
        scope.lease = Rc::downgrade(&global.0);
        Self {
            scopes: vec![scope],
            free: Vec::new(),
            retained: Vec::new(),
            collect_at: COLLECT_THRESHOLD,
            global,
        }
    }

    pub fn global(&self) -> EnvId {
        self.global.id()
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.scopes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, parent: EnvId, kind: ScopeKind) -> EnvId {
        let scope = Scope::new(Some(parent), kind);
        match self.free.pop() {
            Some(id) => {
                self.scopes[id.0] = scope;
                id
            }
            None => {
                self.scopes.push(scope);
                EnvId(self.scopes.len() - 1)
            }
        }
    }

    /// Marks `id` as finished. It is freed now when nothing captured it and
    /// retained for the next collection otherwise.
    pub fn release(&mut self, id: EnvId) {
        let scope = &mut self.scopes[id.0];
        if scope.released {
            return;
        }
        scope.released = true;
        if scope.lease.strong_count() == 0 {
            self.free_scope(id);
            return;
        }
        self.retained.push(id);
        if self.retained.len() >= self.collect_at {
            self.collect();
        }
    }

    /// Returns a handle that keeps `id` and all of its ancestors alive.
    pub fn capture(&mut self, id: EnvId) -> EnvHandle {
        if let Some(lease) = self.scopes[id.0].lease.upgrade() {
            return EnvHandle(lease);
        }
        let parent = self.scopes[id.0].parent.map(|parent| self.capture(parent));
        let lease = Rc::new(Lease { id, parent });
        self.scopes[id.0].lease = Rc::downgrade(&lease);
        EnvHandle(lease)
    }

    fn free_scope(&mut self, id: EnvId) -> FxHashMap<String, Binding> {
        let scope = &mut self.scopes[id.0];
        scope.released = true;
        scope.lease = Weak::new();
        scope.parent = None;
        self.free.push(id);
        std::mem::take(&mut scope.bindings)
    }

    /// Frees every retained scope that is only reachable from other retained
    /// scopes, breaking the reference cycles between scopes and the closures
    /// stored in them.
    pub fn collect(&mut self) {
        let retained = std::mem::take(&mut self.retained);
        let before = retained.len();
        // Dropped after the pass so that freeing runs no destructors midway.
        let mut garbage = Vec::new();

        let mut graph = Graph::default();
        let mut candidates = Vec::new();
        for id in retained {
            match self.scopes[id.0].lease.upgrade() {
                Some(lease) => {
                    let strong = Rc::strong_count(&lease) - 1;
                    let node = graph.insert(Node::Lease(EnvHandle(lease)), strong);
                    candidates.push((id, node));
                }
                None => garbage.push(self.free_scope(id)),
            }
        }
        for (id, node) in &candidates {
            for binding in self.scopes[id.0].bindings.values() {
                graph.value(*node, &binding.value);
            }
        }
        graph.expand();

        // Scopes still running keep their ancestors alive whether or not a
        // handle to them is held.
        let mut roots: Vec<usize> = graph.external().collect();
        let nodes: FxHashMap<EnvId, usize> = candidates.iter().copied().collect();
        for scope in self.scopes.iter().filter(|scope| !scope.released) {
            let mut parent = scope.parent;
            while let Some(id) = parent {
                if let Some(node) = nodes.get(&id) {
                    roots.push(*node);
                }
                parent = self.scopes[id.0].parent;
            }
        }
        let reachable = graph.mark(roots);

        for (id, node) in candidates {
            if reachable[node] {
                self.retained.push(id);
            } else {
                garbage.push(self.free_scope(id));
            }
        }
        graph.clear_unreachable(&reachable);

        self.collect_at = (self.retained.len() * 2).max(COLLECT_THRESHOLD);
        debug!(
            target: "es::interpreter",
            retained = before,
            freed = before - self.retained.len(),
            scopes = self.len(),
            "collected scopes"
        );
        drop(graph);
        drop(garbage);
    }

    fn chain(&self, id: EnvId) -> impl Iterator<Item = &Scope> {
        let mut current = Some(id);
        std::iter::from_fn(move || {
            let scope = &self.scopes[current?.0];
            current = scope.parent;
            Some(scope)
        })
    }

    pub fn get(&self, id: EnvId, name: &str) -> Option<&Value> {
        self.chain(id)
            .find_map(|scope| scope.bindings.get(name))
            .map(|binding| &binding.value)
    }

    pub fn binding(&self, id: EnvId, name: &str) -> Option<&Binding> {
        self.chain(id).find_map(|scope| scope.bindings.get(name))
    }

    /// Binds `name` in the scope `id` itself. Shadowing an outer binding is
    /// allowed; replacing a constant of the same scope is not.
    pub fn declare(
        &mut self,
        id: EnvId,
        name: String,
        value: Value,
        mutability: Mutability,
    ) -> Result<(), RuntimeErrorKind> {
        match self.scopes[id.0].bindings.entry(name) {
            Entry::Occupied(o) if o.get().mutability == Mutability::Constant => {
                Err(RuntimeErrorKind::RedeclareConstant(o.key().clone()))
            }
            Entry::Occupied(mut o) => {
                o.insert(Binding { value, mutability });
                Ok(())
            }
            Entry::Vacant(v) => {
                v.insert(Binding { value, mutability });
                Ok(())
            }
        }
    }

    /// `var` binds in the nearest function, module or global scope.
    pub fn declare_var(
        &mut self,
        id: EnvId,
        name: String,
        value: Value,
    ) -> Result<(), RuntimeErrorKind> {
        let mut target = id;
        while self.scopes[target.0].kind == ScopeKind::Block {
            match self.scopes[target.0].parent {
                Some(parent) => target = parent,
                None => break,
            }
        }
        self.declare(target, name, value, Mutability::Mutable)
    }

    pub fn assign(&mut self, id: EnvId, name: &str, value: Value) -> Result<(), RuntimeErrorKind> {
        let mut current = Some(id);
        while let Some(id) = current {
            let scope = &mut self.scopes[id.0];
            if let Some(binding) = scope.bindings.get_mut(name) {
                if binding.mutability == Mutability::Constant {
                    return Err(RuntimeErrorKind::AssignToConstant(name.to_string()));
                }
                binding.value = value;
                return Ok(());
            }
            current = scope.parent;
        }
        Err(RuntimeErrorKind::UndefinedName(name.to_string()))
    }
}

/// A value that can hold references, identified by its allocation.
#[derive(Clone)]
enum Node {
    Lease(EnvHandle),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Callable(Rc<Callable>),
    Class(Rc<Class>),
    Namespace(Rc<Namespace>),
    Symbol(Rc<Symbol>),
}

impl Node {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Node::Array(items.clone())),
            Value::Object(object) => Some(Node::Object(object.clone())),
            Value::Function(callable) => Some(Node::Callable(callable.clone())),
            Value::Type(crate::types::TypeValue::Class(class)) => Some(Node::Class(class.clone())),
            Value::Namespace(namespace) => Some(Node::Namespace(namespace.clone())),
            Value::Symbol(symbol) => Some(Node::Symbol(symbol.clone())),
            _ => None,
        }
    }

    fn key(&self) -> *const () {
        match self {
            Node::Lease(handle) => Rc::as_ptr(&handle.0) as *const (),
            Node::Array(rc) => Rc::as_ptr(rc) as *const (),
            Node::Object(rc) => Rc::as_ptr(rc) as *const (),
            Node::Callable(rc) => Rc::as_ptr(rc) as *const (),
            Node::Class(rc) => Rc::as_ptr(rc) as *const (),
            Node::Namespace(rc) => Rc::as_ptr(rc) as *const (),
            Node::Symbol(rc) => Rc::as_ptr(rc) as *const (),
        }
    }

    fn strong_count(&self) -> usize {
        match self {
            Node::Lease(handle) => Rc::strong_count(&handle.0),
            Node::Array(rc) => Rc::strong_count(rc),
            Node::Object(rc) => Rc::strong_count(rc),
            Node::Callable(rc) => Rc::strong_count(rc),
            Node::Class(rc) => Rc::strong_count(rc),
            Node::Namespace(rc) => Rc::strong_count(rc),
            Node::Symbol(rc) => Rc::strong_count(rc),
        }
    }
}

/// The references between the retained scopes and everything reachable
/// from their bindings.
///
/// A node whose strong count is higher than the number of references found
/// inside the graph is also held from outside it: by a running scope, the
/// module cache, a native closure or a value on the Rust stack. Those nodes
/// are the roots; anything they cannot reach is garbage.
#[derive(Default)]
struct Graph {
    index: FxHashMap<*const (), usize>,
    nodes: Vec<Node>,
    strong: Vec<usize>,
    internal: Vec<usize>,
    edges: Vec<Vec<usize>>,
    pending: Vec<usize>,
}

impl Graph {
    /// Adds `node`, whose count excluding the graph's own clone is `strong`.
    fn insert(&mut self, node: Node, strong: usize) -> usize {
        let key = node.key();
        if let Some(&index) = self.index.get(&key) {
            return index;
        }
        let index = self.nodes.len();
        self.index.insert(key, index);
        self.nodes.push(node);
        self.strong.push(strong);
        self.internal.push(0);
        self.edges.push(Vec::new());
        self.pending.push(index);
        index
    }

    /// Records a reference from `from` to `node`, a fresh clone.
    fn link(&mut self, from: usize, node: Node) {
        let strong = node.strong_count() - 1;
        let to = self.insert(node, strong);
        self.internal[to] += 1;
        self.edges[from].push(to);
    }

    fn value(&mut self, from: usize, value: &Value) {
        if let Some(node) = Node::of(value) {
            self.link(from, node);
        }
    }

    fn function(&mut self, from: usize, function: &UserFunction) {
        self.link(from, Node::Lease(function.closure.clone()));
        if let Some(this) = &function.this {
            self.value(from, this);
        }
    }

    /// Follows the references of every node added so far. Containers that are
    /// borrowed right now and native closures are not looked into, so what
    /// they hold counts as held from outside.
    fn expand(&mut self) {
        while let Some(index) = self.pending.pop() {
            match self.nodes[index].clone() {
                Node::Lease(handle) => {
                    if let Some(parent) = &handle.0.parent {
                        self.link(index, Node::Lease(parent.clone()));
                    }
                }
                Node::Array(items) => {
                    if let Ok(items) = items.try_borrow() {
                        for item in items.iter() {
                            self.value(index, item);
                        }
                    }
                }
                Node::Object(object) => {
                    if let Ok(object) = object.try_borrow() {
                        self.link(index, Node::Class(object.class.clone()));
                        for field in object.fields.values() {
                            self.value(index, field);
                        }
                    }
                }
                Node::Callable(callable) => {
                    if let Callable::Function(function) = callable.as_ref() {
                        self.function(index, function);
                    }
                }
                Node::Class(class) => {
                    for method in class.methods.values() {
                        self.function(index, method);
                    }
                    if let Some(scope) = &class.scope {
                        self.link(index, Node::Lease(scope.clone()));
                    }
                }
                Node::Namespace(namespace) => {
                    for symbol in &namespace.symbols {
                        self.link(index, Node::Symbol(symbol.clone()));
                    }
                }
                Node::Symbol(symbol) => self.value(index, &symbol.value),
            }
        }
    }

    fn external(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&index| self.strong[index] > self.internal[index])
    }

    fn mark(&self, roots: Vec<usize>) -> Vec<bool> {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = roots;
        while let Some(index) = stack.pop() {
            if reachable[index] {
                continue;
            }
            reachable[index] = true;
            stack.extend(&self.edges[index]);
        }
        reachable
    }

    /// Empties unreachable containers so that cycles through them are freed.
    fn clear_unreachable(&self, reachable: &[bool]) {
        for (node, reachable) in self.nodes.iter().zip(reachable) {
            if *reachable {
                continue;
            }
            let cleared = match node {
                Node::Array(items) => items.try_borrow_mut().map(|mut items| std::mem::take(&mut *items)),
                Node::Object(object) => object
                    .try_borrow_mut()
                    .map(|mut object| object.fields.drain().map(|(_, value)| value).collect::<Vec<_>>()),
                _ => continue,
            };
            drop(cleared);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ast::FunctionDecl, position::Position};

    fn number(environment: &Environment, id: EnvId, name: &str) -> Option<f64> {
        match environment.get(id, name) {
            Some(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut environment = Environment::new();
        let global = environment.global();
        environment
            .declare(global, "a".to_string(), Value::Number(1.0), Mutability::Mutable)
            .unwrap();
        let block = environment.push(global, ScopeKind::Block);
        environment
            .declare(block, "b".to_string(), Value::Number(2.0), Mutability::Mutable)
            .unwrap();

        assert_eq!(number(&environment, block, "a"), Some(1.0));
        assert_eq!(number(&environment, block, "b"), Some(2.0));
        assert_eq!(number(&environment, global, "b"), None);
    }

    #[test]
    fn test_shadowing_and_assignment() {
        let mut environment = Environment::new();
        let global = environment.global();
        environment
            .declare(global, "a".to_string(), Value::Number(1.0), Mutability::Mutable)
            .unwrap();
        let block = environment.push(global, ScopeKind::Block);
        environment
            .declare(block, "a".to_string(), Value::Number(2.0), Mutability::Mutable)
            .unwrap();
        environment.assign(block, "a", Value::Number(3.0)).unwrap();

        assert_eq!(number(&environment, block, "a"), Some(3.0));
        assert_eq!(number(&environment, global, "a"), Some(1.0));
        assert_eq!(
            environment.assign(block, "missing", Value::Nil),
            Err(RuntimeErrorKind::UndefinedName("missing".to_string()))
        );
    }

    #[test]
    fn test_constants() {
        let mut environment = Environment::new();
        let global = environment.global();
        environment
            .declare(global, "c".to_string(), Value::Number(1.0), Mutability::Constant)
            .unwrap();
        assert_eq!(
            environment.assign(global, "c", Value::Number(2.0)),
            Err(RuntimeErrorKind::AssignToConstant("c".to_string()))
        );
        assert_eq!(
            environment.declare(global, "c".to_string(), Value::Nil, Mutability::Mutable),
            Err(RuntimeErrorKind::RedeclareConstant("c".to_string()))
        );

        let block = environment.push(global, ScopeKind::Block);
        assert!(environment
            .declare(block, "c".to_string(), Value::Nil, Mutability::Constant)
            .is_ok());
    }

    #[test]
    fn test_var_hoists_out_of_blocks() {
        let mut environment = Environment::new();
        let global = environment.global();
        let function = environment.push(global, ScopeKind::Function);
        let block = environment.push(function, ScopeKind::Block);
        environment
            .declare_var(block, "v".to_string(), Value::Number(1.0))
            .unwrap();

        assert_eq!(number(&environment, function, "v"), Some(1.0));
        assert_eq!(number(&environment, global, "v"), None);
    }

    fn closure(environment: &mut Environment, scope: EnvId) -> Value {
        let decl = FunctionDecl {
            name: Some("f".to_string()),
            params: Vec::new(),
            return_type: None,
            body: Vec::new(),
            position: Position::start("test.es"),
        };
        Value::Function(Rc::new(Callable::Function(UserFunction {
            decl: Rc::new(decl),
            closure: environment.capture(scope),
            this: None,
        })))
    }

    #[test]
    fn test_release_frees_uncaptured_scopes() {
        let mut environment = Environment::new();
        let global = environment.global();

        let outer = environment.push(global, ScopeKind::Block);
        let inner = environment.push(outer, ScopeKind::Block);
        environment.release(inner);
        environment.release(outer);
        assert_eq!(environment.len(), 1);

        let reused = environment.push(global, ScopeKind::Block);
        assert!(reused == inner || reused == outer);
        assert_eq!(environment.len(), 2);
    }

    #[test]
    fn test_handle_keeps_scope_chain() {
        let mut environment = Environment::new();
        let global = environment.global();

        let function = environment.push(global, ScopeKind::Function);
        let inner = environment.push(function, ScopeKind::Block);
        let handle = environment.capture(inner);
        environment.release(inner);
        environment.release(function);
        environment.collect();
        assert_eq!(environment.len(), 3);
        assert_eq!(handle.id(), inner);

        drop(handle);
        environment.collect();
        assert_eq!(environment.len(), 1);
    }

    #[test]
    fn test_collect_frees_closure_cycles() {
        let mut environment = Environment::new();
        let global = environment.global();

        for _ in 0..1000 {
            let block = environment.push(global, ScopeKind::Block);
            let f = closure(&mut environment, block);
            environment
                .declare(block, "f".to_string(), f, Mutability::Mutable)
                .unwrap();
            environment.release(block);
        }
        assert!(environment.len() <= COLLECT_THRESHOLD + 1);

        environment.collect();
        assert_eq!(environment.len(), 1);
    }

    #[test]
    fn test_collect_keeps_values_held_outside() {
        let mut environment = Environment::new();
        let global = environment.global();

        let block = environment.push(global, ScopeKind::Block);
        let f = closure(&mut environment, block);
        let items = Value::array(vec![f]);
        environment
            .declare(block, "items".to_string(), items, Mutability::Mutable)
            .unwrap();
        let kept = environment.get(block, "items").cloned();
        environment.release(block);

        environment.collect();
        assert_eq!(environment.len(), 2);
        assert!(environment.get(block, "items").is_some());

        drop(kept);
        environment.collect();
        assert_eq!(environment.len(), 1);
    }

    #[test]
    fn test_collect_keeps_parents_of_running_scopes() {
        let mut environment = Environment::new();
        let global = environment.global();

        let closure_scope = environment.push(global, ScopeKind::Block);
        let f = closure(&mut environment, closure_scope);
        environment
            .declare(closure_scope, "f".to_string(), f, Mutability::Mutable)
            .unwrap();
        environment.release(closure_scope);

        let frame = environment.push(closure_scope, ScopeKind::Function);
        environment.collect();
        assert!(environment.get(frame, "f").is_some());

        environment.release(frame);
        environment.collect();
        assert_eq!(environment.len(), 1);
    }
}
