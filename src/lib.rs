pub mod ast;
pub mod config;
pub mod error;
pub mod host;
pub mod interpreter;
pub mod module;
pub mod parser;
pub mod position;
mod stack;
pub mod tokenizer;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorKind, InitError};
pub use host::{Host, HostLibrary, RunContext};
pub use interpreter::{Interpreter, Value};

/// Runs `source` with the standard host and default limits.
pub fn run(source: &str, file_name: &str) -> Result<Value, Error> {
    let mut interpreter = Interpreter::init(Host::stdio(), Config::default()).map_err(|err| {
        error::RuntimeErrorKind::Host(err.to_string()).at(&position::Position::start(file_name))
    })?;
    interpreter.run(source, &RunContext::new(file_name))
}
