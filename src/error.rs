use thiserror::Error;

use crate::tree::NodeId;

/// Errors that stop the rewrite of a translation unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("Unable to resolve diagnostic printer '{name}'")]
    UnresolvedSymbol { name: String },
    #[error("Symbol '{name}' does not name a function declaration")]
    NotAFunction { name: String },
    #[error("{node} is not a function definition")]
    NotAFunctionDefinition { node: NodeId },
    #[error("Rewrite invariant violated at {node}: {message}")]
    InvariantViolation { message: &'static str, node: NodeId },
}

pub type RewriteResult<T> = Result<T, RewriteError>;
