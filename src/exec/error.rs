use thiserror::Error;

use crate::tree::NodeId;

/// Errors produced while executing a tree in the reference executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("Call target at {node} is not a declared function")]
    NotCallable { node: NodeId },
    #[error("Only variables can be incremented, found {node}")]
    InvalidIncrementTarget { node: NodeId },
    #[error("Expected an integer at {node}")]
    ExpectedInteger { node: NodeId },
    #[error("Expected a format string at {node}")]
    ExpectedFormatString { node: NodeId },
    #[error("{node} is a statement and has no value")]
    NotAnExpression { node: NodeId },
    #[error("Division by zero at {node}")]
    DivisionByZero { node: NodeId },
    #[error("Format '{format}' expects more arguments than the {provided} provided")]
    MissingFormatArgument { format: String, provided: usize },
    #[error("Unsupported conversion '%{conversion}' in format '{format}'")]
    UnsupportedConversion { conversion: char, format: String },
    #[error("'{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Program aborted: {message}")]
    Aborted { message: String },
}

pub type ExecResult<T> = Result<T, ExecError>;
