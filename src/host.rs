use std::io::{BufRead, Write};

use crate::{
    error::{Error, RuntimeErrorKind},
    interpreter::{NativeFunction, Value},
};

pub type LogSink = Box<dyn FnMut(&str)>;
pub type Prompter = Box<dyn FnMut(&str) -> Option<String>>;

/// Everything a script can reach outside of the interpreter: where `print`
/// writes, where `input` reads from, and the libraries bound as globals.
pub struct Host {
    pub log: LogSink,
    pub prompt: Prompter,
    pub libraries: Vec<HostLibrary>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("libraries", &self.libraries)
            .finish_non_exhaustive()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::stdio()
    }
}

impl Host {
    /// Prints to stdout and prompts on stdin.
    pub fn stdio() -> Self {
        Self {
            log: Box::new(|line| println!("{line}")),
            prompt: Box::new(|prompt| {
                print!("{prompt}");
                std::io::stdout().flush().ok()?;
                let mut line = String::new();
                match std::io::stdin().lock().read_line(&mut line) {
                    Ok(0) | Err(_) => None,
                    Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
                }
            }),
            libraries: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: impl FnMut(&str) + 'static) -> Self {
        self.log = Box::new(log);
        self
    }

    pub fn with_prompt(mut self, prompt: impl FnMut(&str) -> Option<String> + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn with_library(mut self, library: HostLibrary) -> Self {
        self.libraries.push(library);
        self
    }
}

/// A named group of host functions and constants, exposed to scripts as a
/// global object.
pub struct HostLibrary {
    pub name: String,
    pub(crate) members: Vec<(String, Value)>,
}

impl std::fmt::Debug for HostLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLibrary")
            .field("name", &self.name)
            .field(
                "members",
                &self.members.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl HostLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Adds a function. An error string becomes a `TypeError` at the call site.
    pub fn function(
        mut self,
        name: impl Into<String>,
        arity: Option<usize>,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Self {
        let name = name.into();
        let native = NativeFunction::new(name.clone(), arity, move |_, args, position| {
            func(args).map_err(|message| -> Error { RuntimeErrorKind::Host(message).at(position) })
        });
        self.members.push((name, native.into()));
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.push((name.into(), value.into()));
        self
    }
}

/// Per-run settings supplied by the host.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Shown in positions and used to resolve relative imports.
    pub file_name: String,
}

impl RunContext {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}
