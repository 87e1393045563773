//! Locates lowered assertions in a function body.
//!
//! A C `assert(test)` reaches this phase as a scope whose body is exactly
//! `if (test) (void) 0; else __assert_fail(...);`. Only the body of a function
//! and the scopes nested directly in statement sequences are searched; the
//! lowering never places an assertion inside an arbitrary sub-expression.

use tracing::trace;

use crate::error::{RewriteError, RewriteResult};
use crate::tree::{Node, NodeId, Tree};

/// Shape test for one lowered assertion conditional.
#[derive(Debug, Clone, Copy)]
pub struct AssertionPattern<'a> {
    failure_function: &'a str,
}

impl<'a> AssertionPattern<'a> {
    pub fn new(failure_function: &'a str) -> Self {
        Self { failure_function }
    }

    pub fn matches(&self, tree: &Tree, id: NodeId) -> bool {
        let Node::Conditional {
            then_branch,
            else_branch,
            ..
        } = tree.node(id)
        else {
            return false;
        };

        if !matches!(tree.node(*then_branch), Node::Nop) {
            return false;
        }

        match tree.node(*else_branch) {
            Node::Call { callee, .. } => tree.callee_name(*callee) == Some(self.failure_function),
            _ => false,
        }
    }
}

/// Collects every assertion conditional reachable from `body` in source order.
pub fn find_assertions(
    tree: &Tree,
    body: NodeId,
    pattern: &AssertionPattern<'_>,
) -> RewriteResult<Vec<NodeId>> {
    let mut found = Vec::new();
    visit(tree, body, pattern, &mut found)?;
    Ok(found)
}

fn visit(
    tree: &Tree,
    id: NodeId,
    pattern: &AssertionPattern<'_>,
    found: &mut Vec<NodeId>,
) -> RewriteResult<()> {
    let body = match tree.node(id) {
        Node::Scope { body } => *body,
        Node::Sequence(_) => id,
        _ => {
            return Err(RewriteError::InvariantViolation {
                message: "expected a scope or a statement sequence",
                node: id,
            });
        }
    };

    match tree.node(body) {
        Node::Sequence(statements) => {
            for &statement in statements {
                if matches!(tree.node(statement), Node::Scope { .. }) {
                    visit(tree, statement, pattern, found)?;
                }
            }
        }
        _ => {
            if pattern.matches(tree, body) {
                trace!(conditional = %body, "matched lowered assertion");
                found.push(body);
            } else {
                trace!(node = %body, "scope body is not an assertion");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::BinaryOperator;
    use crate::tree::Location;

    const FAILURE: &str = "__assert_fail";

    fn lowered_assert(tree: &mut Tree, fail: NodeId) -> (NodeId, NodeId) {
        let a = tree.variable("a");
        let b = tree.variable("b");
        let test = tree.binary(BinaryOperator::Eq, a, b);
        let then_branch = tree.nop();
        let message = tree.string("a == b");
        let else_branch = tree.call(fail, vec![message], Location::Source { line: 3 });
        let cond = tree.conditional(test, then_branch, else_branch);
        (tree.scope(cond), cond)
    }

    #[test]
    fn finds_assertions_in_nested_scopes() {
        let mut tree = Tree::new();
        let fail = tree.declare(FAILURE);
        let (first_scope, first) = lowered_assert(&mut tree, fail);
        let (second_scope, second) = lowered_assert(&mut tree, fail);
        let inner = tree.sequence(vec![second_scope]);
        let inner_scope = tree.scope(inner);
        let body = tree.sequence(vec![first_scope, inner_scope]);
        let root = tree.scope(body);

        let found =
            find_assertions(&tree, root, &AssertionPattern::new(FAILURE)).expect("find");
        assert_eq!(found, vec![first, second]);
    }

    #[test]
    fn ignores_conditionals_directly_in_a_sequence() {
        let mut tree = Tree::new();
        let fail = tree.declare(FAILURE);
        let (_, cond) = lowered_assert(&mut tree, fail);
        let body = tree.sequence(vec![cond]);

        let found =
            find_assertions(&tree, body, &AssertionPattern::new(FAILURE)).expect("find");
        assert!(found.is_empty());
    }

    #[test]
    fn rejects_other_callees_and_non_nop_then_branches() {
        let mut tree = Tree::new();
        let abort = tree.declare("abort");
        let (_, cond) = lowered_assert(&mut tree, abort);
        assert!(!AssertionPattern::new(FAILURE).matches(&tree, cond));
        assert!(AssertionPattern::new("abort").matches(&tree, cond));

        let fail = tree.declare(FAILURE);
        let test = tree.variable("ok");
        let then_branch = tree.empty();
        let else_branch = tree.call(fail, Vec::new(), Location::Unknown);
        let cond = tree.conditional(test, then_branch, else_branch);
        assert!(!AssertionPattern::new(FAILURE).matches(&tree, cond));
    }

    #[test]
    fn rejects_calls_through_non_declarations() {
        let mut tree = Tree::new();
        let pointer = tree.variable(FAILURE);
        let callee = tree.push(Node::AddressOf(pointer));
        let else_branch = tree.push(Node::Call {
            callee,
            args: Vec::new(),
            location: Location::Unknown,
        });
        let test = tree.variable("ok");
        let then_branch = tree.nop();
        let cond = tree.conditional(test, then_branch, else_branch);

        assert!(!AssertionPattern::new(FAILURE).matches(&tree, cond));
    }

    #[test]
    fn function_body_must_be_scope_or_sequence() {
        let mut tree = Tree::new();
        let fail = tree.declare(FAILURE);
        let (_, cond) = lowered_assert(&mut tree, fail);

        let err = find_assertions(&tree, cond, &AssertionPattern::new(FAILURE)).unwrap_err();
        assert!(matches!(err, RewriteError::InvariantViolation { node, .. } if node == cond));
    }
}
