//! Reference executor for lowered trees.
//!
//! Runs a function of a unit over an integer environment with C semantics,
//! capturing what `printf` writes and whether the program aborted. The rewrite
//! itself never evaluates anything; this exists so the generated diagnostics
//! can be observed.

use std::collections::BTreeMap;

use crate::ops::{BinaryOperator, UnaryOperator};
use crate::tree::{Node, NodeId, Tree};

pub use self::error::{ExecError, ExecResult};

mod error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Printf,
    AssertFail,
    Abort,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "printf" => Some(Self::Printf),
            "__assert_fail" => Some(Self::AssertFail),
            "abort" => Some(Self::Abort),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Integer(i64),
    Str(String),
    Void,
}

/// Observable result of running one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub stdout: String,
    /// Abort message when the program terminated through a failure call.
    pub aborted: Option<String>,
    pub env: BTreeMap<String, i64>,
}

pub fn run_function(tree: &Tree, name: &str, env: BTreeMap<String, i64>) -> ExecResult<Execution> {
    let function = tree
        .function(name)
        .ok_or_else(|| ExecError::UndefinedFunction {
            name: name.to_string(),
        })?;

    let mut executor = Executor::new(tree, env);
    let aborted = match executor.call_function(function) {
        Ok(()) => None,
        Err(ExecError::Aborted { message }) => Some(message),
        Err(err) => return Err(err),
    };

    Ok(Execution {
        stdout: executor.stdout,
        aborted,
        env: executor.env,
    })
}

struct Executor<'t> {
    tree: &'t Tree,
    env: BTreeMap<String, i64>,
    stdout: String,
}

impl<'t> Executor<'t> {
    fn new(tree: &'t Tree, env: BTreeMap<String, i64>) -> Self {
        Self {
            tree,
            env,
            stdout: String::new(),
        }
    }

    fn call_function(&mut self, function: NodeId) -> ExecResult<()> {
        match self.tree.node(function) {
            Node::Function { body, .. } => self.exec_statement(*body),
            _ => Err(ExecError::NotCallable { node: function }),
        }
    }

    fn exec_statement(&mut self, id: NodeId) -> ExecResult<()> {
        let tree = self.tree;
        match tree.node(id) {
            Node::Scope { body } => self.exec_statement(*body),
            Node::Sequence(statements) => {
                for &statement in statements {
                    self.exec_statement(statement)?;
                }
                Ok(())
            }
            Node::Conditional {
                test,
                then_branch,
                else_branch,
            } => {
                if self.eval_int(*test)? != 0 {
                    self.exec_statement(*then_branch)
                } else {
                    self.exec_statement(*else_branch)
                }
            }
            Node::Nop | Node::Empty => Ok(()),
            _ => {
                self.eval(id)?;
                Ok(())
            }
        }
    }

    fn eval_int(&mut self, id: NodeId) -> ExecResult<i64> {
        match self.eval(id)? {
            Value::Integer(value) => Ok(value),
            Value::Str(_) | Value::Void => Err(ExecError::ExpectedInteger { node: id }),
        }
    }

    fn eval(&mut self, id: NodeId) -> ExecResult<Value> {
        let tree = self.tree;
        match tree.node(id) {
            Node::Integer(value) => Ok(Value::Integer(*value)),
            Node::Str(value) => Ok(Value::Str(value.clone())),
            Node::Variable(name) => self
                .env
                .get(name)
                .copied()
                .map(Value::Integer)
                .ok_or_else(|| ExecError::UndefinedVariable { name: name.clone() }),
            Node::PostIncrement(target) => {
                let Node::Variable(name) = tree.node(*target) else {
                    return Err(ExecError::InvalidIncrementTarget { node: *target });
                };
                let slot = self
                    .env
                    .get_mut(name)
                    .ok_or_else(|| ExecError::UndefinedVariable { name: name.clone() })?;
                let previous = *slot;
                *slot = previous.wrapping_add(1);
                Ok(Value::Integer(previous))
            }
            Node::Unary { op, operand } => {
                let value = self.eval_int(*operand)?;
                Ok(Value::Integer(match op {
                    UnaryOperator::Not => (value == 0) as i64,
                    UnaryOperator::Negate => value.wrapping_neg(),
                }))
            }
            Node::Binary { op, left, right } => self
                .eval_binary(id, *op, *left, *right)
                .map(Value::Integer),
            Node::Call { callee, args, .. } => self.eval_call(*callee, args),
            Node::Conditional {
                test,
                then_branch,
                else_branch,
            } => {
                if self.eval_int(*test)? != 0 {
                    self.eval(*then_branch)
                } else {
                    self.eval(*else_branch)
                }
            }
            Node::Sequence(items) => {
                let mut last = Value::Void;
                for &item in items {
                    last = self.eval(item)?;
                }
                Ok(last)
            }
            Node::Scope { body } => self.eval(*body),
            Node::Nop | Node::Empty => Ok(Value::Void),
            Node::Function { .. } | Node::FunctionDecl { .. } | Node::AddressOf(_) => {
                Err(ExecError::NotAnExpression { node: id })
            }
        }
    }

    fn eval_binary(
        &mut self,
        id: NodeId,
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> ExecResult<i64> {
        match op {
            BinaryOperator::AndIf => {
                if self.eval_int(left)? == 0 {
                    return Ok(0);
                }
                Ok((self.eval_int(right)? != 0) as i64)
            }
            BinaryOperator::OrIf => {
                if self.eval_int(left)? != 0 {
                    return Ok(1);
                }
                Ok((self.eval_int(right)? != 0) as i64)
            }
            _ => {
                let left = self.eval_int(left)?;
                let right = self.eval_int(right)?;
                let value = match op {
                    BinaryOperator::Eq => (left == right) as i64,
                    BinaryOperator::Ne => (left != right) as i64,
                    BinaryOperator::Lt => (left < right) as i64,
                    BinaryOperator::Le => (left <= right) as i64,
                    BinaryOperator::Gt => (left > right) as i64,
                    BinaryOperator::Ge => (left >= right) as i64,
                    BinaryOperator::And | BinaryOperator::AndIf => {
                        (left != 0 && right != 0) as i64
                    }
                    BinaryOperator::Or | BinaryOperator::OrIf => (left != 0 || right != 0) as i64,
                    BinaryOperator::Plus => left.wrapping_add(right),
                    BinaryOperator::Minus => left.wrapping_sub(right),
                    BinaryOperator::Mult => left.wrapping_mul(right),
                    BinaryOperator::TruncDiv | BinaryOperator::TruncMod if right == 0 => {
                        return Err(ExecError::DivisionByZero { node: id });
                    }
                    BinaryOperator::TruncDiv => left.wrapping_div(right),
                    BinaryOperator::TruncMod => left.wrapping_rem(right),
                    BinaryOperator::BitAnd => left & right,
                    BinaryOperator::BitOr => left | right,
                    BinaryOperator::BitXor => left ^ right,
                    BinaryOperator::Lshift => left.wrapping_shl(right as u32),
                    BinaryOperator::Rshift => left.wrapping_shr(right as u32),
                };
                Ok(value)
            }
        }
    }

    fn eval_call(&mut self, callee: NodeId, args: &[NodeId]) -> ExecResult<Value> {
        let tree = self.tree;
        let name = tree
            .callee_name(callee)
            .ok_or(ExecError::NotCallable { node: callee })?;

        let Some(builtin) = Builtin::from_name(name) else {
            let function = tree
                .function(name)
                .ok_or_else(|| ExecError::UndefinedFunction {
                    name: name.to_string(),
                })?;
            for &arg in args {
                self.eval(arg)?;
            }
            self.call_function(function)?;
            return Ok(Value::Integer(0));
        };

        let mut values = Vec::with_capacity(args.len());
        for &arg in args {
            values.push((arg, self.eval(arg)?));
        }

        match builtin {
            Builtin::Printf => match values.split_first() {
                Some(((_, Value::Str(format)), rest)) => {
                    let written = format_printf(format, rest)?;
                    self.stdout.push_str(&written);
                    Ok(Value::Integer(written.len() as i64))
                }
                Some(((node, _), _)) => Err(ExecError::ExpectedFormatString { node: *node }),
                None => Err(ExecError::ArityMismatch {
                    name: "printf",
                    expected: 1,
                    found: 0,
                }),
            },
            Builtin::AssertFail => {
                let [(_, assertion), (_, file), (_, line), (_, function)] = values.as_slice() else {
                    return Err(ExecError::ArityMismatch {
                        name: "__assert_fail",
                        expected: 4,
                        found: values.len(),
                    });
                };
                Err(ExecError::Aborted {
                    message: format!(
                        "{}:{}: {}: Assertion `{}' failed.",
                        display(file),
                        display(line),
                        display(function),
                        display(assertion)
                    ),
                })
            }
            Builtin::Abort => Err(ExecError::Aborted {
                message: "abort".to_string(),
            }),
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Integer(value) => value.to_string(),
        Value::Str(value) => value.clone(),
        Value::Void => String::new(),
    }
}

fn format_printf(format: &str, args: &[(NodeId, Value)]) -> ExecResult<String> {
    let mut output = String::new();
    let provided = args.len();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    let mut next_arg = || {
        args.next().ok_or_else(|| ExecError::MissingFormatArgument {
            format: format.to_string(),
            provided,
        })
    };

    while let Some(ch) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }
        while matches!(chars.peek(), Some('l' | 'h')) {
            chars.next();
        }
        match chars.next() {
            Some('%') => output.push('%'),
            Some('d' | 'i') => match next_arg()? {
                (_, Value::Integer(value)) => output.push_str(&value.to_string()),
                (node, _) => return Err(ExecError::ExpectedInteger { node: *node }),
            },
            Some('s') => {
                let (_, value) = next_arg()?;
                output.push_str(&display(value));
            }
            Some(conversion) => {
                return Err(ExecError::UnsupportedConversion {
                    conversion,
                    format: format.to_string(),
                });
            }
            None => output.push('%'),
        }
    }

    Ok(output)
}
