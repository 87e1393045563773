//! Operator kinds and the classifier that decides which ones get traced.

use serde::{Deserialize, Serialize};

use crate::tree::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Short-circuiting `&&`.
    AndIf,
    /// Logical and that evaluates both operands.
    And,
    /// Short-circuiting `||`.
    OrIf,
    /// Logical or that evaluates both operands.
    Or,
    Plus,
    Minus,
    Mult,
    TruncDiv,
    TruncMod,
    BitAnd,
    BitOr,
    BitXor,
    Lshift,
    Rshift,
}

/// Logical connective an operator belongs to, regardless of surface spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl BinaryOperator {
    /// Symbol printed in diagnostics, or `None` for operators the trace treats
    /// as opaque values.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("=="),
            Self::Ne => Some("!="),
            Self::AndIf | Self::And => Some("&&"),
            Self::OrIf | Self::Or => Some("||"),
            Self::Plus => Some("+"),
            Self::Minus => Some("-"),
            Self::Mult => Some("*"),
            Self::TruncDiv => Some("/"),
            _ => None,
        }
    }

    pub fn connective(self) -> Option<Connective> {
        match self {
            Self::AndIf | Self::And => Some(Connective::And),
            Self::OrIf | Self::Or => Some(Connective::Or),
            _ => None,
        }
    }

    /// C spelling used when rendering source text.
    pub fn spelling(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::AndIf | Self::And => "&&",
            Self::OrIf | Self::Or => "||",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Mult => "*",
            Self::TruncDiv => "/",
            Self::TruncMod => "%",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Lshift => "<<",
            Self::Rshift => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
    Negate,
}

impl UnaryOperator {
    pub fn spelling(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Negate => "-",
        }
    }
}

/// Maps a node to its printable operator symbol. Leaves, unary nodes and
/// unrecognised binary operators all classify as `None`.
pub fn classify(node: &Node) -> Option<&'static str> {
    match node {
        Node::Binary { op, .. } => op.symbol(),
        _ => None,
    }
}
