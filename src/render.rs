//! C source rendering of a [`Tree`].

use crate::tree::{Node, NodeId, Tree};

const INDENT: &str = "    ";

pub fn render_unit(tree: &Tree) -> String {
    let mut renderer = Renderer::new(tree);
    for (index, &function) in tree.functions().iter().enumerate() {
        if index > 0 {
            renderer.output.push('\n');
        }
        renderer.function(function);
    }
    renderer.output
}

pub fn render_statement(tree: &Tree, statement: NodeId) -> String {
    let mut renderer = Renderer::new(tree);
    renderer.statement(statement, 0);
    renderer.output
}

pub fn render_expression(tree: &Tree, expr: NodeId) -> String {
    Renderer::new(tree).expression(expr)
}

pub fn escape_c_string(value: &str) -> String {
    let mut escaped = String::new();
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

struct Renderer<'t> {
    tree: &'t Tree,
    output: String,
}

impl<'t> Renderer<'t> {
    fn new(tree: &'t Tree) -> Self {
        Self {
            tree,
            output: String::new(),
        }
    }

    fn function(&mut self, function: NodeId) {
        let Node::Function { name, body } = self.tree.node(function) else {
            let rendered = self.expression(function);
            self.push_line(0, &format!("/* not a function: {rendered} */"));
            return;
        };

        self.push_line(0, &format!("void {name}(void)"));
        if matches!(self.tree.node(*body), Node::Scope { .. }) {
            self.statement(*body, 0);
        } else {
            self.push_line(0, "{");
            self.statement(*body, 1);
            self.push_line(0, "}");
        }
    }

    fn statement(&mut self, id: NodeId, indent: usize) {
        match self.tree.node(id) {
            Node::Scope { body } => {
                self.push_line(indent, "{");
                self.statement(*body, indent + 1);
                self.push_line(indent, "}");
            }
            Node::Sequence(statements) => {
                for &statement in statements {
                    self.statement(statement, indent);
                }
            }
            Node::Conditional {
                test,
                then_branch,
                else_branch,
            } => {
                let test = self.expression(*test);
                self.push_line(indent, &format!("if ({test}) {{"));
                self.statement(*then_branch, indent + 1);
                self.push_line(indent, "} else {");
                self.statement(*else_branch, indent + 1);
                self.push_line(indent, "}");
            }
            Node::Empty => self.push_line(indent, ";"),
            _ => {
                let expr = self.expression(id);
                self.push_line(indent, &format!("{expr};"));
            }
        }
    }

    fn expression(&self, id: NodeId) -> String {
        match self.tree.node(id) {
            Node::Integer(value) => value.to_string(),
            Node::Str(value) => format!("\"{}\"", escape_c_string(value)),
            Node::Variable(name) => name.clone(),
            Node::FunctionDecl { name } | Node::Function { name, .. } => name.clone(),
            Node::AddressOf(target) => self.expression(*target),
            Node::Binary { op, left, right } => format!(
                "{} {} {}",
                self.operand(*left),
                op.spelling(),
                self.operand(*right)
            ),
            Node::Unary { op, operand } => format!("{}{}", op.spelling(), self.operand(*operand)),
            Node::PostIncrement(operand) => format!("{}++", self.operand(*operand)),
            Node::Call { callee, args, .. } => {
                let args = args
                    .iter()
                    .map(|&arg| self.expression(arg))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({args})", self.expression(*callee))
            }
            Node::Nop => "(void) 0".to_string(),
            Node::Empty => String::new(),
            Node::Conditional {
                test,
                then_branch,
                else_branch,
            } => format!(
                "{} ? {} : {}",
                self.operand(*test),
                self.operand(*then_branch),
                self.operand(*else_branch)
            ),
            Node::Sequence(statements) => {
                let statements = statements
                    .iter()
                    .map(|&statement| self.expression(statement))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({statements})")
            }
            Node::Scope { body } => format!("({{ {}; }})", self.expression(*body)),
        }
    }

    fn operand(&self, id: NodeId) -> String {
        let rendered = self.expression(id);
        match self.tree.node(id) {
            Node::Binary { .. } | Node::Conditional { .. } => format!("({rendered})"),
            _ => rendered,
        }
    }

    fn push_line(&mut self, indent: usize, line: &str) {
        for _ in 0..indent {
            self.output.push_str(INDENT);
        }
        self.output.push_str(line);
        self.output.push('\n');
    }
}
