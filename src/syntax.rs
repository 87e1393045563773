//! Nested, serde-friendly form of a translation unit.
//!
//! This is the interchange format for fixtures and the command line. Lowering
//! it produces the arena [`Tree`] the rewrite operates on. The `assert` form is
//! lowered the way glibc's `assert` macro expands:
//!
//! ```text
//! ({ if (test) (void) 0; else __assert_fail("test", "file.c", line, "function"); })
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::TranslationUnit;
use crate::ops::{BinaryOperator, UnaryOperator};
use crate::render::render_expression;
use crate::tree::{Location, NodeId};

pub const ASSERT_FAIL: &str = "__assert_fail";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("Function '{name}' is defined more than once")]
    DuplicateFunction { name: String },
    #[error("Identifier must not be empty")]
    EmptyIdentifier,
    #[error("Body of function '{name}' must be a scope or a statement sequence")]
    InvalidFunctionBody { name: String },
}

pub type SyntaxResult<T> = Result<T, SyntaxError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Syntax {
    Scope {
        body: Box<Syntax>,
    },
    Sequence {
        #[serde(default)]
        statements: Vec<Syntax>,
    },
    Conditional {
        test: Box<Syntax>,
        then_branch: Box<Syntax>,
        else_branch: Box<Syntax>,
    },
    Nop,
    Empty,
    Call {
        function: String,
        #[serde(default)]
        args: Vec<Syntax>,
        #[serde(default)]
        line: Option<u32>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Syntax>,
    },
    PostIncrement {
        name: String,
    },
    Integer {
        value: i64,
    },
    Str {
        value: String,
    },
    Variable {
        name: String,
    },
    Assert {
        test: Box<Syntax>,
        #[serde(default)]
        line: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSyntax {
    pub name: String,
    pub body: Syntax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSyntax {
    #[serde(default = "default_file")]
    pub file: String,
    /// Functions declared up front, e.g. what `#include <stdio.h>` provides.
    #[serde(default)]
    pub declarations: Vec<String>,
    pub functions: Vec<FunctionSyntax>,
}

fn default_file() -> String {
    "unit.c".to_string()
}

impl UnitSyntax {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).context("Parsing translation unit")
    }

    pub fn lower(&self) -> SyntaxResult<TranslationUnit> {
        let mut unit = TranslationUnit::default();
        for name in &self.declarations {
            check_identifier(name)?;
            unit.declarations.declare(&mut unit.tree, name);
        }

        for function in &self.functions {
            check_identifier(&function.name)?;
            if unit.tree.function(&function.name).is_some() {
                return Err(SyntaxError::DuplicateFunction {
                    name: function.name.clone(),
                });
            }
            if !matches!(function.body, Syntax::Scope { .. } | Syntax::Sequence { .. }) {
                return Err(SyntaxError::InvalidFunctionBody {
                    name: function.name.clone(),
                });
            }
            let mut lowering = Lowering {
                unit: &mut unit,
                file: &self.file,
                function: &function.name,
            };
            let body = lowering.lower(&function.body)?;
            unit.tree.define_function(function.name.as_str(), body);
        }

        Ok(unit)
    }
}

fn check_identifier(name: &str) -> SyntaxResult<()> {
    if name.is_empty() {
        return Err(SyntaxError::EmptyIdentifier);
    }
    Ok(())
}

struct Lowering<'u> {
    unit: &'u mut TranslationUnit,
    file: &'u str,
    function: &'u str,
}

impl Lowering<'_> {
    fn lower(&mut self, syntax: &Syntax) -> SyntaxResult<NodeId> {
        let id = match syntax {
            Syntax::Scope { body } => {
                let body = self.lower(body)?;
                self.unit.tree.scope(body)
            }
            Syntax::Sequence { statements } => {
                let statements = statements
                    .iter()
                    .map(|statement| self.lower(statement))
                    .collect::<SyntaxResult<Vec<_>>>()?;
                self.unit.tree.sequence(statements)
            }
            Syntax::Conditional {
                test,
                then_branch,
                else_branch,
            } => {
                let test = self.lower(test)?;
                let then_branch = self.lower(then_branch)?;
                let else_branch = self.lower(else_branch)?;
                self.unit.tree.conditional(test, then_branch, else_branch)
            }
            Syntax::Nop => self.unit.tree.nop(),
            Syntax::Empty => self.unit.tree.empty(),
            Syntax::Call {
                function,
                args,
                line,
            } => {
                check_identifier(function)?;
                let args = args
                    .iter()
                    .map(|arg| self.lower(arg))
                    .collect::<SyntaxResult<Vec<_>>>()?;
                let decl = self.unit.declarations.declare(&mut self.unit.tree, function);
                let location = line.map_or(Location::Unknown, |line| Location::Source { line });
                self.unit.tree.call(decl, args, location)
            }
            Syntax::Binary { op, left, right } => {
                let left = self.lower(left)?;
                let right = self.lower(right)?;
                self.unit.tree.binary(*op, left, right)
            }
            Syntax::Unary { op, operand } => {
                let operand = self.lower(operand)?;
                self.unit.tree.unary(*op, operand)
            }
            Syntax::PostIncrement { name } => {
                check_identifier(name)?;
                let target = self.unit.tree.variable(name.as_str());
                self.unit.tree.post_increment(target)
            }
            Syntax::Integer { value } => self.unit.tree.integer(*value),
            Syntax::Str { value } => self.unit.tree.string(value.as_str()),
            Syntax::Variable { name } => {
                check_identifier(name)?;
                self.unit.tree.variable(name.as_str())
            }
            Syntax::Assert { test, line } => self.lower_assert(test, *line)?,
        };
        Ok(id)
    }

    fn lower_assert(&mut self, test: &Syntax, line: u32) -> SyntaxResult<NodeId> {
        let test = self.lower(test)?;
        let text = render_expression(&self.unit.tree, test);

        let tree = &mut self.unit.tree;
        let args = vec![
            tree.string(text),
            tree.string(self.file),
            tree.integer(i64::from(line)),
            tree.string(self.function),
        ];
        let fail = self.unit.declarations.declare(&mut self.unit.tree, ASSERT_FAIL);
        let tree = &mut self.unit.tree;
        let failure = tree.call(fail, args, Location::Source { line });
        let then_branch = tree.nop();
        let conditional = tree.conditional(test, then_branch, failure);
        Ok(tree.scope(conditional))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_unit;
    use crate::tree::Node;

    const UNIT: &str = r#"
file: demo.c
declarations: [printf]
functions:
  - name: check
    body:
      kind: scope
      body:
        kind: sequence
        statements:
          - kind: assert
            line: 4
            test:
              kind: binary
              op: eq
              left: { kind: variable, name: a }
              right: { kind: integer, value: 2 }
"#;

    #[test]
    fn lowers_assert_like_the_c_macro() {
        let unit = UnitSyntax::from_yaml_str(UNIT)
            .expect("parse")
            .lower()
            .expect("lower");

        let expected = "\
void check(void)
{
    {
        if (a == 2) {
            (void) 0;
        } else {
            __assert_fail(\"a == 2\", \"demo.c\", 4, \"check\");
        }
    }
}
";
        assert_eq!(render_unit(&unit.tree), expected);
        assert!(unit.declarations.get("printf").is_some());
        assert!(unit.declarations.get(ASSERT_FAIL).is_some());
    }

    #[test]
    fn assert_call_carries_source_line() {
        let unit = UnitSyntax::from_yaml_str(UNIT)
            .expect("parse")
            .lower()
            .expect("lower");

        let located = unit
            .tree
            .iter()
            .filter_map(|(_, node)| match node {
                Node::Call {
                    callee, location, ..
                } if unit.tree.callee_name(*callee) == Some(ASSERT_FAIL) => Some(*location),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(located, vec![Location::Source { line: 4 }]);
    }

    #[test]
    fn rejects_duplicate_functions() {
        let source = r#"
functions:
  - name: twice
    body: { kind: sequence }
  - name: twice
    body: { kind: sequence }
"#;
        let err = UnitSyntax::from_yaml_str(source)
            .expect("parse")
            .lower()
            .unwrap_err();
        assert_eq!(
            err,
            SyntaxError::DuplicateFunction {
                name: "twice".to_string()
            }
        );
    }

    #[test]
    fn rejects_bodies_that_are_not_blocks() {
        let source = r#"
declarations: [printf]
functions:
  - name: shout
    body:
      kind: call
      function: printf
      args: [{ kind: str, value: "hi" }]
"#;
        let err = UnitSyntax::from_yaml_str(source)
            .expect("parse")
            .lower()
            .unwrap_err();
        assert_eq!(
            err,
            SyntaxError::InvalidFunctionBody {
                name: "shout".to_string()
            }
        );

        let empty = r#"
functions:
  - name: idle
    body: { kind: empty }
"#;
        assert!(matches!(
            UnitSyntax::from_yaml_str(empty).expect("parse").lower(),
            Err(SyntaxError::InvalidFunctionBody { .. })
        ));
    }

    #[test]
    fn calls_declare_their_targets_once() {
        let source = r#"
functions:
  - name: main
    body:
      kind: sequence
      statements:
        - { kind: call, function: helper }
        - { kind: call, function: helper, args: [{ kind: integer, value: 1 }] }
"#;
        let unit = UnitSyntax::from_yaml_str(source)
            .expect("parse")
            .lower()
            .expect("lower");

        let decls = unit
            .tree
            .iter()
            .filter(|(_, node)| matches!(node, Node::FunctionDecl { name } if name == "helper"))
            .count();
        assert_eq!(decls, 1);
    }
}
