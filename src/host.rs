//! Thin adapter between a compiler pipeline and the rewrite.
//!
//! The pipeline owns one [`TranslationUnit`] per compiled file and hands it to
//! [`Host::compile`] after assertions have been lowered. Passes run once per
//! function definition and share one [`CompilationContext`] for the unit, so
//! anything they resolve through [`Declarations`] is looked up at most once.

use std::collections::HashMap;

use anyhow::Result;
use tracing::info;

use crate::config::RewriteConfig;
use crate::error::RewriteResult;
use crate::rewrite::{CompilationContext, RewriteReport, SymbolTable, process_function};
use crate::tree::{NodeId, Tree};

/// File-scope function declarations, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    by_name: HashMap<String, NodeId>,
}

impl Declarations {
    /// Returns the existing declaration for `name` or adds one to `tree`.
    pub fn declare(&mut self, tree: &mut Tree, name: &str) -> NodeId {
        if let Some(&existing) = self.by_name.get(name) {
            return existing;
        }
        let decl = tree.declare(name);
        self.by_name.insert(name.to_string(), decl);
        decl
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }
}

impl SymbolTable for Declarations {
    fn lookup_function(&self, name: &str) -> Option<NodeId> {
        self.get(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationUnit {
    pub tree: Tree,
    pub declarations: Declarations,
}

/// Transformation invoked once for every function definition of a unit.
pub trait FunctionPass {
    fn name(&self) -> &'static str;
    fn run(
        &self,
        tree: &mut Tree,
        function: NodeId,
        ctx: &CompilationContext<'_>,
    ) -> RewriteResult<RewriteReport>;
}

/// Replaces the failure call of every lowered assertion with a trace of the
/// failed condition.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertIntrospection;

impl FunctionPass for AssertIntrospection {
    fn name(&self) -> &'static str {
        "assert-introspection"
    }

    fn run(
        &self,
        tree: &mut Tree,
        function: NodeId,
        ctx: &CompilationContext<'_>,
    ) -> RewriteResult<RewriteReport> {
        process_function(tree, function, ctx)
    }
}

pub struct Host {
    config: RewriteConfig,
    passes: Vec<Box<dyn FunctionPass>>,
}

impl Host {
    pub fn new(config: RewriteConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            passes: Vec::new(),
        })
    }

    /// Host with the assertion introspection pass already registered.
    pub fn with_introspection(config: RewriteConfig) -> Result<Self> {
        let mut host = Self::new(config)?;
        host.register(Box::new(AssertIntrospection));
        Ok(host)
    }

    pub fn register(&mut self, pass: Box<dyn FunctionPass>) {
        info!(
            pass = pass.name(),
            failure_function = %self.config.failure_function,
            printer = %self.config.printer,
            strategy = ?self.config.strategy,
            "{} loaded",
            pass.name()
        );
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs every registered pass over each function, in definition order.
    pub fn compile(&self, unit: &mut TranslationUnit) -> RewriteResult<Vec<RewriteReport>> {
        let TranslationUnit { tree, declarations } = unit;
        let ctx = CompilationContext::new(&*declarations, self.config.clone());

        let functions = tree.functions().to_vec();
        let mut reports = Vec::with_capacity(functions.len() * self.passes.len());
        for function in functions {
            for pass in &self.passes {
                reports.push(pass.run(tree, function, &ctx)?);
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::error::RewriteError;
    use crate::tree::Location;

    fn add_assertion(unit: &mut TranslationUnit, function: &str) {
        let fail = unit.declarations.declare(&mut unit.tree, "__assert_fail");
        let test = unit.tree.variable("ok");
        let then_branch = unit.tree.nop();
        let else_branch = unit.tree.call(fail, Vec::new(), Location::Unknown);
        let cond = unit.tree.conditional(test, then_branch, else_branch);
        let scope = unit.tree.scope(cond);
        unit.tree.define_function(function, scope);
    }

    struct CountingPass {
        calls: Rc<Cell<usize>>,
    }

    impl FunctionPass for CountingPass {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn run(
            &self,
            tree: &mut Tree,
            function: NodeId,
            _ctx: &CompilationContext<'_>,
        ) -> RewriteResult<RewriteReport> {
            self.calls.set(self.calls.get() + 1);
            let Some(name) = tree.functions().iter().position(|&id| id == function) else {
                return Err(RewriteError::NotAFunctionDefinition { node: function });
            };
            Ok(RewriteReport {
                function: format!("#{name}"),
                rewritten: 0,
            })
        }
    }

    #[test]
    fn declare_reuses_existing_declarations() {
        let mut tree = Tree::new();
        let mut declarations = Declarations::default();

        let first = declarations.declare(&mut tree, "printf");
        let second = declarations.declare(&mut tree, "printf");

        assert_eq!(first, second);
        assert_eq!(tree.len(), 1);
        assert_eq!(declarations.lookup_function("printf"), Some(first));
        assert_eq!(declarations.lookup_function("puts"), None);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = RewriteConfig {
            printer: String::new(),
            ..RewriteConfig::default()
        };
        assert!(Host::new(config).is_err());
    }

    #[test]
    fn runs_each_pass_once_per_function() {
        let calls = Rc::new(Cell::new(0));
        let mut host = Host::with_introspection(RewriteConfig::default()).expect("host");
        host.register(Box::new(CountingPass {
            calls: Rc::clone(&calls),
        }));
        assert_eq!(host.pass_names(), vec!["assert-introspection", "counting"]);

        let mut unit = TranslationUnit::default();
        unit.declarations.declare(&mut unit.tree, "printf");
        add_assertion(&mut unit, "first");
        add_assertion(&mut unit, "second");

        let reports = host.compile(&mut unit).expect("compile");
        assert_eq!(calls.get(), 2);
        assert_eq!(
            reports,
            vec![
                RewriteReport {
                    function: "first".to_string(),
                    rewritten: 1
                },
                RewriteReport {
                    function: "#0".to_string(),
                    rewritten: 0
                },
                RewriteReport {
                    function: "second".to_string(),
                    rewritten: 1
                },
                RewriteReport {
                    function: "#1".to_string(),
                    rewritten: 0
                },
            ]
        );
    }

    #[test]
    fn compile_reports_unresolved_printer_only_when_needed() {
        let host = Host::with_introspection(RewriteConfig::default()).expect("host");

        let mut unit = TranslationUnit::default();
        let body = unit.tree.sequence(Vec::new());
        unit.tree.define_function("empty", body);
        let reports = host.compile(&mut unit).expect("compile");
        assert_eq!(reports[0].rewritten, 0);

        add_assertion(&mut unit, "checked");
        let err = host.compile(&mut unit).unwrap_err();
        assert_eq!(
            err,
            RewriteError::UnresolvedSymbol {
                name: "printf".to_string()
            }
        );
    }
}
