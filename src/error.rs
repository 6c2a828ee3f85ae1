//! Error types for toolhost
//!
//! Every stage (configuration, discovery, loading, execution, dispatch) has
//! its own error enum. Faults local to one tool are converted into these
//! values at that tool's boundary and never escape as panics.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised while scanning the tools directory
///
/// Only `RootUnreadable` aborts a sweep; the other variants describe a single
/// skipped package.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Tools directory {path:?} is not readable: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor not found: {0:?}")]
    MissingDescriptor(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid descriptor {path:?}: {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },
}

/// Errors turning a package directory into a live tool instance
///
/// Cloneable so every caller waiting on one load attempt receives its outcome.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("No .{extension} unit found in {dir:?}")]
    UnitNotFound { dir: PathBuf, extension: String },

    #[error("Unit '{0}' is not registered with this host")]
    UnregisteredUnit(String),

    #[error("Failed to open library {path:?}: {message}")]
    Library { path: PathBuf, message: String },

    #[error("Symbol not found in {path:?}: {symbol}")]
    SymbolNotFound { path: PathBuf, symbol: String },

    #[error("Module built against {found}, host expects {expected}")]
    AbiMismatch { expected: String, found: String },

    #[error("No tool implementation exported by {0:?}")]
    NoImplementation(PathBuf),

    #[error("Failed to instantiate tool: {0}")]
    Instantiation(String),

    #[error("Loading timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(Arc::new(err))
    }
}

/// Failures signalled by a tool's own `execute`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown value '{value}' for parameter '{name}' (expected one of: {})", .expected.join(", "))]
    InvalidParameterValue {
        name: String,
        value: String,
        expected: Vec<String>,
    },

    #[error("Parameter '{name}' must be {expected}, got {found}")]
    InvalidParameterType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Failed(String),
}

/// Failures while invoking a bound tool
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Tool panicked during execution")]
    Panicked,

    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Execution was cancelled")]
    Cancelled,
}

/// Errors surfaced to callers of the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Tool with ID '{0}' not found")]
    NotFound(String),

    #[error("Failed to load tool '{id}': {source}")]
    Load {
        id: String,
        #[source]
        source: LoadError,
    },

    #[error("Error executing tool '{id}': {source}")]
    Execution {
        id: String,
        #[source]
        source: ExecutionError,
    },
}

/// Coarse failure category exposed to transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    LoadError,
    ExecutionError,
}

impl ErrorKind {
    /// HTTP-style status a transport should answer with
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::LoadError | ErrorKind::ExecutionError => 500,
        }
    }
}

/// Well-formed error object handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound(_) => ErrorKind::NotFound,
            DispatchError::Load { .. } => ErrorKind::LoadError,
            DispatchError::Execution { .. } => ErrorKind::ExecutionError,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}
