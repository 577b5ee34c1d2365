use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::{
    ast::{Export, Statement, StatementKind},
    error::{At, Error, RuntimeErrorKind},
    interpreter::{EnvId, Interpreter, Mutability, Namespace, ScopeKind, Symbol},
    parser,
    position::Position,
    tokenizer::tokenize,
};

/// Evaluated modules by canonical path, plus the chain of modules currently
/// being evaluated.
#[derive(Debug, Default)]
pub struct ModuleLoader {
    cache: FxHashMap<PathBuf, Rc<Namespace>>,
    loading: Vec<PathBuf>,
}

impl ModuleLoader {
    /// Resolves `path` against the directory of `importing_file`.
    pub fn resolve(path: &str, importing_file: &str) -> Result<PathBuf, RuntimeErrorKind> {
        let base = Path::new(importing_file)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        let joined = base.join(path);
        joined
            .canonicalize()
            .map_err(|err| RuntimeErrorKind::Import {
                path: joined.display().to_string(),
                reason: err.to_string(),
            })
    }

    pub fn get(&self, path: &Path) -> Option<Rc<Namespace>> {
        self.cache.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub(crate) fn begin(&mut self, path: PathBuf) {
        self.loading.push(path);
    }

    pub(crate) fn finish(&mut self) {
        self.loading.pop();
    }

    /// The chain `a -> b -> a` when `path` is already being loaded.
    fn cycle(&self, path: &Path) -> Option<String> {
        let start = self.loading.iter().position(|loading| loading == path)?;
        let chain = self.loading[start..]
            .iter()
            .map(|loading| loading.display().to_string())
            .chain(std::iter::once(path.display().to_string()))
            .collect::<Vec<_>>();
        Some(chain.join(" -> "))
    }
}

impl Interpreter {
    pub(crate) fn import(&mut self, path: &str, position: &Position) -> Result<Rc<Namespace>, Error> {
        let resolved = ModuleLoader::resolve(path, &position.file_name).at(position)?;
        if let Some(namespace) = self.modules.get(&resolved) {
            debug!(target: "es::module", path = %resolved.display(), "cache hit");
            return Ok(namespace);
        }
        if let Some(chain) = self.modules.cycle(&resolved) {
            return Err(RuntimeErrorKind::CircularImport(chain).at(position));
        }

        info!(target: "es::module", path = %resolved.display(), "loading module");
        let source = std::fs::read_to_string(&resolved).map_err(|err| {
            RuntimeErrorKind::Import {
                path: resolved.display().to_string(),
                reason: err.to_string(),
            }
            .at(position)
        })?;
        let file_name = resolved.display().to_string();
        let tokens = tokenize(&source, &file_name)?;
        let program = parser::program(&tokens)?;

        let name = resolved
            .file_stem()
            .map_or_else(|| file_name.clone(), |stem| stem.to_string_lossy().into_owned());
        self.modules.begin(resolved.clone());
        let global = self.global_scope();
        let scope = self.environment.push(global, ScopeKind::Module);
        let result = self.execute_in_scope(scope, |interpreter| {
            interpreter.execute_program(&program)?;
            Ok(interpreter.collect_symbols(name, &program.0, scope))
        });
        self.modules.finish();

        let namespace = Rc::new(result?);
        debug!(
            target: "es::module",
            path = %resolved.display(),
            exports = namespace.symbols.len(),
            "module loaded"
        );
        self.modules.cache.insert(resolved, namespace.clone());
        Ok(namespace)
    }

    /// Explicitly exported declarations when there are any, otherwise every
    /// declaration among `statements`.
    pub(crate) fn collect_symbols(
        &self,
        name: String,
        statements: &[Statement],
        scope: EnvId,
    ) -> Namespace {
        let mut declared: Vec<(&str, Export)> = Vec::new();
        for stmt in statements {
            match &stmt.kind {
                StatementKind::Declaration(decl) => declared.push((decl.name.as_str(), decl.export)),
                StatementKind::Destructure(decl) => declared.extend(
                    decl.targets
                        .iter()
                        .map(|target| (target.name.as_str(), decl.export)),
                ),
                StatementKind::Function(decl, export) => {
                    declared.push((decl.display_name(), *export))
                }
                StatementKind::Class(decl, export) => declared.push((decl.display_name(), *export)),
                StatementKind::Namespace(decl, export) => {
                    declared.push((decl.display_name(), *export))
                }
                _ => {}
            }
        }
        let explicit = declared
            .iter()
            .any(|(_, export)| *export == Export::Exported);

        let mut seen = FxHashSet::default();
        let symbols = declared
            .into_iter()
            .filter(|(_, export)| !explicit || *export == Export::Exported)
            .filter(|(identifier, _)| seen.insert(*identifier))
            .filter_map(|(identifier, _)| {
                let binding = self.environment.binding(scope, identifier)?;
                Some(Rc::new(Symbol {
                    identifier: identifier.to_string(),
                    value: binding.value.clone(),
                    constant: binding.mutability == Mutability::Constant,
                }))
            })
            .collect();

        Namespace { name, symbols }
    }
}
