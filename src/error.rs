use std::fmt::Display;

use crate::{parser::ParseError, position::Position, tokenizer::LexError};

/// The closed set of error kinds a script can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IllegalCharacter,
    Syntax,
    Name,
    Type,
    Import,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::IllegalCharacter => write!(f, "IllegalCharacterError"),
            ErrorKind::Syntax => write!(f, "SyntaxError"),
            ErrorKind::Name => write!(f, "NameError"),
            ErrorKind::Type => write!(f, "TypeError"),
            ErrorKind::Import => write!(f, "ImportError"),
        }
    }
}

/// Any failure from one stage of the pipeline. The first one aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lex(_) => ErrorKind::IllegalCharacter,
            Error::Parse(_) => ErrorKind::Syntax,
            Error::Runtime(err) => err.kind.kind(),
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            Error::Lex(err) => err.position(),
            Error::Parse(err) => &err.position,
            Error::Runtime(err) => &err.position,
        }
    }

    /// The error text without the kind prefix or location.
    pub fn message(&self) -> String {
        match self {
            Error::Lex(LexError::IllegalCharacter { character, .. }) => format!("'{}'", character),
            Error::Parse(err) => err.message(),
            Error::Runtime(err) => err.kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}: {kind}\n    at {position}", .kind.kind())]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub position: Position,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeErrorKind {
    #[error("'{0}' is not defined")]
    UndefinedName(String),
    #[error("'{name}' is not exported by '{namespace}'")]
    NotExported { namespace: String, name: String },
    #[error("Expected type '{expected}' but got '{found}'")]
    TypeMismatch { expected: String, found: String },
    #[error("Cannot assign to constant '{0}'")]
    AssignToConstant(String),
    #[error("Cannot redeclare constant '{0}'")]
    RedeclareConstant(String),
    #[error("'{0}' is not callable")]
    NotCallable(String),
    #[error("{name} expects {expected} arguments but got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{name}: {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("Unsupported operand types for {operator}: '{left}' and '{right}'")]
    UnsupportedOperands {
        operator: String,
        left: String,
        right: String,
    },
    #[error("Unsupported operand type for {operator}: '{operand}'")]
    UnsupportedOperand { operator: String, operand: String },
    #[error("'{target}' has no property '{name}'")]
    UndefinedProperty { target: String, name: String },
    #[error("Cannot set property '{name}' on '{target}'")]
    ReadOnlyProperty { target: String, name: String },
    #[error("Cannot index '{target}' with '{index}'")]
    InvalidIndex { target: String, index: String },
    #[error("'{0}' is not iterable")]
    NotIterable(String),
    #[error("Not enough elements to destructure: expected {expected}, found {found}")]
    NotEnoughElements { expected: usize, found: usize },
    #[error("'{0}' is not a type")]
    NotAType(String),
    #[error("Method 'str' of '{0}' must return a string")]
    StrMustReturnString(String),
    #[error("Maximum call depth exceeded")]
    CallDepthExceeded,
    #[error("Cannot import '{path}': {reason}")]
    Import { path: String, reason: String },
    #[error("Circular import: {0}")]
    CircularImport(String),
    #[error("{0}")]
    Host(String),
}

impl RuntimeErrorKind {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeErrorKind::UndefinedName(_) | RuntimeErrorKind::NotExported { .. } => {
                ErrorKind::Name
            }
            RuntimeErrorKind::Import { .. } | RuntimeErrorKind::CircularImport(_) => {
                ErrorKind::Import
            }
            _ => ErrorKind::Type,
        }
    }

    pub fn at(self, position: &Position) -> Error {
        Error::Runtime(RuntimeError::new(self, position.clone()))
    }
}

/// Attaches a source position to a bare [`RuntimeErrorKind`].
pub trait At<T> {
    fn at(self, position: &Position) -> Result<T, Error>;
}

impl<T> At<T> for Result<T, RuntimeErrorKind> {
    fn at(self, position: &Position) -> Result<T, Error> {
        self.map_err(|kind| kind.at(position))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("Invalid library name '{0}'")]
    InvalidName(String),
    #[error("'{0}' is already defined in the global scope")]
    DuplicateBinding(String),
}
