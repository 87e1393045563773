use std::cell::OnceCell;

use tracing::debug;

use crate::builder::DiagnosticBuilder;
use crate::config::RewriteConfig;
use crate::error::{RewriteError, RewriteResult};
use crate::matcher::{AssertionPattern, find_assertions};
use crate::tree::{Node, NodeId, Tree};

/// Name lookup the host provides for the unit being compiled.
pub trait SymbolTable {
    fn lookup_function(&self, name: &str) -> Option<NodeId>;
}

/// Per-unit state shared by every function the rewrite visits.
///
/// The printer declaration is looked up on the first assertion that needs it
/// and reused afterwards.
pub struct CompilationContext<'s> {
    symbols: &'s dyn SymbolTable,
    config: RewriteConfig,
    printer: OnceCell<NodeId>,
}

impl<'s> CompilationContext<'s> {
    pub fn new(symbols: &'s dyn SymbolTable, config: RewriteConfig) -> Self {
        Self {
            symbols,
            config,
            printer: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    pub fn printer(&self, tree: &Tree) -> RewriteResult<NodeId> {
        if let Some(printer) = self.printer.get() {
            return Ok(*printer);
        }

        let name = &self.config.printer;
        let printer = self
            .symbols
            .lookup_function(name)
            .ok_or_else(|| RewriteError::UnresolvedSymbol { name: name.clone() })?;
        if !matches!(tree.node(printer), Node::FunctionDecl { .. }) {
            return Err(RewriteError::NotAFunction { name: name.clone() });
        }

        debug!(printer = %name, node = %printer, "resolved diagnostic printer");
        Ok(*self.printer.get_or_init(|| printer))
    }

    pub fn is_printer_resolved(&self) -> bool {
        self.printer.get().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    pub function: String,
    pub rewritten: usize,
}

/// Rewrites every lowered assertion in one function definition.
pub fn process_function(
    tree: &mut Tree,
    function: NodeId,
    ctx: &CompilationContext<'_>,
) -> RewriteResult<RewriteReport> {
    let (name, body) = match tree.node(function) {
        Node::Function { name, body } => (name.clone(), *body),
        _ => return Err(RewriteError::NotAFunctionDefinition { node: function }),
    };

    let pattern = AssertionPattern::new(&ctx.config().failure_function);
    let assertions = find_assertions(tree, body, &pattern)?;
    for &conditional in &assertions {
        rewrite(tree, conditional, ctx)?;
    }

    debug!(function = %name, rewritten = assertions.len(), "processed function");
    Ok(RewriteReport {
        function: name,
        rewritten: assertions.len(),
    })
}

/// Runs [`process_function`] over every function of the unit, in definition
/// order.
pub fn process_unit(
    tree: &mut Tree,
    ctx: &CompilationContext<'_>,
) -> RewriteResult<Vec<RewriteReport>> {
    let functions = tree.functions().to_vec();
    functions
        .into_iter()
        .map(|function| process_function(tree, function, ctx))
        .collect()
}

/// Replaces the failure call of a matched conditional with the diagnostics
/// for its condition.
pub fn rewrite(
    tree: &mut Tree,
    conditional: NodeId,
    ctx: &CompilationContext<'_>,
) -> RewriteResult<()> {
    let (test, failure_call) = match tree.node(conditional) {
        Node::Conditional {
            test, else_branch, ..
        } => (*test, *else_branch),
        _ => {
            return Err(RewriteError::InvariantViolation {
                message: "matched assertion is not a conditional",
                node: conditional,
            });
        }
    };
    if !matches!(tree.node(failure_call), Node::Call { .. }) {
        return Err(RewriteError::InvariantViolation {
            message: "matched else-branch is not a call",
            node: failure_call,
        });
    }

    let printer = ctx.printer(tree)?;
    let config = ctx.config();
    let mut builder = DiagnosticBuilder::new(tree, printer, &config.leaf_format);
    let trace = builder.build(config.strategy, test);

    let replacement = if config.trailing_newline || config.preserve_abort {
        let mut statements = match tree.node(trace) {
            Node::Sequence(statements) => statements.clone(),
            _ => vec![trace],
        };
        if config.trailing_newline {
            let newline = DiagnosticBuilder::new(tree, printer, &config.leaf_format)
                .emit("\n", Vec::new());
            statements.push(newline);
        }
        if config.preserve_abort {
            statements.push(failure_call);
        }
        tree.sequence(statements)
    } else {
        trace
    };

    tree.replace_else_branch(conditional, replacement)?;
    debug!(%conditional, %replacement, strategy = ?config.strategy, "rewrote assertion");
    Ok(())
}
