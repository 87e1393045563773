//! Arena-backed syntax tree for one translation unit.
//!
//! Nodes are stored in a flat vector and refer to their children through
//! [`NodeId`] handles. The rewrite only ever appends nodes and swaps a handle in
//! a conditional's else slot, so existing subtrees can be shared freely between
//! the original condition and the generated diagnostics.

use std::fmt;

use crate::error::{RewriteError, RewriteResult};
use crate::ops::{BinaryOperator, UnaryOperator};

/// Handle to a node stored in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Source position attached to calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    #[default]
    Unknown,
    Source {
        line: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Function {
        name: String,
        body: NodeId,
    },
    FunctionDecl {
        name: String,
    },
    Scope {
        body: NodeId,
    },
    Sequence(Vec<NodeId>),
    Conditional {
        test: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
    },
    Nop,
    Empty,
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
        location: Location,
    },
    AddressOf(NodeId),
    Binary {
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    Unary {
        op: UnaryOperator,
        operand: NodeId,
    },
    PostIncrement(NodeId),
    Integer(i64),
    Str(String),
    Variable(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    functions: Vec<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Handles are only minted by [`Tree::push`], so every `NodeId` obtained
    /// from this tree indexes a live node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index as u32), node))
    }

    pub fn functions(&self) -> &[NodeId] {
        &self.functions
    }

    pub fn define_function(&mut self, name: impl Into<String>, body: NodeId) -> NodeId {
        let id = self.push(Node::Function {
            name: name.into(),
            body,
        });
        self.functions.push(id);
        id
    }

    pub fn function(&self, name: &str) -> Option<NodeId> {
        self.functions.iter().copied().find(|&id| {
            matches!(self.node(id), Node::Function { name: candidate, .. } if candidate == name)
        })
    }

    /// Name of the function a call designates, if its callee is the address of
    /// a declaration.
    pub fn callee_name(&self, callee: NodeId) -> Option<&str> {
        match self.node(callee) {
            Node::AddressOf(target) => match self.node(*target) {
                Node::FunctionDecl { name } => Some(name.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Swaps the else slot of a conditional and returns the previous handle.
    pub fn replace_else_branch(
        &mut self,
        conditional: NodeId,
        replacement: NodeId,
    ) -> RewriteResult<NodeId> {
        match &mut self.nodes[conditional.index()] {
            Node::Conditional { else_branch, .. } => {
                Ok(std::mem::replace(else_branch, replacement))
            }
            _ => Err(RewriteError::InvariantViolation {
                message: "else-branch replacement target is not a conditional",
                node: conditional,
            }),
        }
    }

    pub fn declare(&mut self, name: impl Into<String>) -> NodeId {
        self.push(Node::FunctionDecl { name: name.into() })
    }

    pub fn integer(&mut self, value: i64) -> NodeId {
        self.push(Node::Integer(value))
    }

    pub fn string(&mut self, value: impl Into<String>) -> NodeId {
        self.push(Node::Str(value.into()))
    }

    pub fn variable(&mut self, name: impl Into<String>) -> NodeId {
        self.push(Node::Variable(name.into()))
    }

    pub fn binary(&mut self, op: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
        self.push(Node::Binary { op, left, right })
    }

    pub fn unary(&mut self, op: UnaryOperator, operand: NodeId) -> NodeId {
        self.push(Node::Unary { op, operand })
    }

    pub fn post_increment(&mut self, operand: NodeId) -> NodeId {
        self.push(Node::PostIncrement(operand))
    }

    pub fn nop(&mut self) -> NodeId {
        self.push(Node::Nop)
    }

    pub fn empty(&mut self) -> NodeId {
        self.push(Node::Empty)
    }

    pub fn sequence(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.push(Node::Sequence(statements))
    }

    pub fn scope(&mut self, body: NodeId) -> NodeId {
        self.push(Node::Scope { body })
    }

    pub fn conditional(&mut self, test: NodeId, then_branch: NodeId, else_branch: NodeId) -> NodeId {
        self.push(Node::Conditional {
            test,
            then_branch,
            else_branch,
        })
    }

    /// Builds `decl(args...)`, taking the address of the declaration the way a
    /// C front end does for direct calls.
    pub fn call(&mut self, decl: NodeId, args: Vec<NodeId>, location: Location) -> NodeId {
        let callee = self.push(Node::AddressOf(decl));
        self.push(Node::Call {
            callee,
            args,
            location,
        })
    }
}
