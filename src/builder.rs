//! Generates the statements that print a failed assertion's trace.
//!
//! The builder runs on the condition of an assertion that is known to have
//! failed. For `left && right` either `left` was false, in which case `right`
//! never ran, or `left` held and `right` was false, so the generated code
//! re-tests `left` at runtime and traces only the operand that decided the
//! outcome. A failed `left || right` means both sides were false, so both are
//! traced unconditionally. Any other recognised operator prints its operands
//! around the operator symbol, and everything else prints as a single value.
//!
//! Operands are referenced, not copied, so every traced leaf is evaluated again
//! when the diagnostics run.

use crate::config::Strategy;
use crate::ops::{Connective, classify};
use crate::tree::{Location, Node, NodeId, Tree};

pub struct DiagnosticBuilder<'a> {
    tree: &'a mut Tree,
    printer: NodeId,
    leaf_format: &'a str,
}

impl<'a> DiagnosticBuilder<'a> {
    /// `printer` must be the declaration of the printf-like function the
    /// generated calls target.
    pub fn new(tree: &'a mut Tree, printer: NodeId, leaf_format: &'a str) -> Self {
        Self {
            tree,
            printer,
            leaf_format,
        }
    }

    pub fn build(&mut self, strategy: Strategy, expr: NodeId) -> NodeId {
        match strategy {
            Strategy::ShortCircuit => self.short_circuit(expr),
            Strategy::Flat => self.flat(expr),
        }
    }

    pub fn short_circuit(&mut self, expr: NodeId) -> NodeId {
        let (op, left, right) = match self.tree.node(expr) {
            Node::Binary { op, left, right } => (*op, *left, *right),
            _ => return self.leaf(expr),
        };

        match op.connective() {
            Some(Connective::And) => {
                let left_trace = self.short_circuit(left);

                let mut right_statements = vec![self.emit("(...) && (", Vec::new())];
                let right_trace = self.short_circuit(right);
                self.append(&mut right_statements, right_trace);
                let close = self.emit(")", Vec::new());
                right_statements.push(close);
                let right_trace = self.tree.sequence(right_statements);

                self.tree.conditional(left, right_trace, left_trace)
            }
            Some(Connective::Or) => {
                let mut statements = vec![self.emit("(", Vec::new())];
                let left_trace = self.short_circuit(left);
                self.append(&mut statements, left_trace);
                let separator = self.emit(") || (", Vec::new());
                statements.push(separator);
                let right_trace = self.short_circuit(right);
                self.append(&mut statements, right_trace);
                let close = self.emit(")", Vec::new());
                statements.push(close);
                self.tree.sequence(statements)
            }
            None => match classify(self.tree.node(expr)) {
                Some(symbol) => {
                    let mut statements = Vec::new();
                    let left_trace = self.short_circuit(left);
                    self.append(&mut statements, left_trace);
                    let operator = self.emit(&format!(" {symbol} "), Vec::new());
                    statements.push(operator);
                    let right_trace = self.short_circuit(right);
                    self.append(&mut statements, right_trace);
                    self.tree.sequence(statements)
                }
                None => self.leaf(expr),
            },
        }
    }

    /// Single printer call whose format spells out the whole expression.
    pub fn flat(&mut self, expr: NodeId) -> NodeId {
        let mut args = Vec::new();
        let format = self.flat_format(expr, &mut args);
        let call = self.emit(&format, args);
        self.tree.sequence(vec![call])
    }

    fn flat_format(&self, expr: NodeId, args: &mut Vec<NodeId>) -> String {
        if let Node::Binary { op, left, right } = self.tree.node(expr)
            && let Some(symbol) = op.symbol()
        {
            let left = self.flat_format(*left, args);
            let right = self.flat_format(*right, args);
            return format!("({left}) {symbol} ({right})");
        }

        args.push(expr);
        self.leaf_format.to_string()
    }

    fn leaf(&mut self, expr: NodeId) -> NodeId {
        let call = self.emit(self.leaf_format, vec![expr]);
        self.tree.sequence(vec![call])
    }

    /// Builds `printer("<format>", args...)` with no source location.
    pub fn emit(&mut self, format: &str, mut args: Vec<NodeId>) -> NodeId {
        let format = self.tree.string(format);
        args.insert(0, format);
        self.tree.call(self.printer, args, Location::Unknown)
    }

    fn append(&self, statements: &mut Vec<NodeId>, id: NodeId) {
        match self.tree.node(id) {
            Node::Sequence(nested) => statements.extend_from_slice(nested),
            _ => statements.push(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{BinaryOperator, UnaryOperator};
    use crate::render::render_statement;

    struct Fixture {
        tree: Tree,
        printer: NodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut tree = Tree::new();
            let printer = tree.declare("printf");
            Self { tree, printer }
        }

        fn var(&mut self, name: &str) -> NodeId {
            self.tree.variable(name)
        }

        fn bin(&mut self, op: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
            self.tree.binary(op, left, right)
        }

        fn build(&mut self, strategy: Strategy, expr: NodeId) -> String {
            let trace = DiagnosticBuilder::new(&mut self.tree, self.printer, "%d").build(strategy, expr);
            render_statement(&self.tree, trace)
        }
    }

    #[test]
    fn leaf_prints_single_value() {
        let mut fx = Fixture::new();
        let ok = fx.var("ok");
        assert_eq!(fx.build(Strategy::ShortCircuit, ok), "printf(\"%d\", ok);\n");
    }

    #[test]
    fn comparison_prints_both_operands_around_symbol() {
        let mut fx = Fixture::new();
        let a = fx.var("a");
        let b = fx.var("b");
        let eq = fx.bin(BinaryOperator::Eq, a, b);

        assert_eq!(
            fx.build(Strategy::ShortCircuit, eq),
            "printf(\"%d\", a);\nprintf(\" == \");\nprintf(\"%d\", b);\n"
        );
    }

    #[test]
    fn logical_and_retests_left_operand() {
        let mut fx = Fixture::new();
        let a = fx.var("a");
        let b = fx.var("b");
        let and = fx.bin(BinaryOperator::AndIf, a, b);

        let expected = "\
if (a) {
    printf(\"(...) && (\");
    printf(\"%d\", b);
    printf(\")\");
} else {
    printf(\"%d\", a);
}
";
        assert_eq!(fx.build(Strategy::ShortCircuit, and), expected);
    }

    #[test]
    fn eager_and_is_traced_like_short_circuit_and() {
        let mut fx = Fixture::new();
        let a = fx.var("a");
        let b = fx.var("b");
        let short_circuit = fx.bin(BinaryOperator::AndIf, a, b);
        let eager = fx.bin(BinaryOperator::And, a, b);

        let expected = fx.build(Strategy::ShortCircuit, short_circuit);
        assert!(expected.starts_with("if (a) {\n"));
        assert_eq!(fx.build(Strategy::ShortCircuit, eager), expected);
    }

    #[test]
    fn logical_or_traces_both_sides_without_condition() {
        let mut fx = Fixture::new();
        let a = fx.var("a");
        let b = fx.var("b");
        let or = fx.bin(BinaryOperator::Or, a, b);

        let expected = "\
printf(\"(\");
printf(\"%d\", a);
printf(\") || (\");
printf(\"%d\", b);
printf(\")\");
";
        assert_eq!(fx.build(Strategy::ShortCircuit, or), expected);
    }

    #[test]
    fn unrecognised_operators_print_as_values() {
        let mut fx = Fixture::new();
        let a = fx.var("a");
        let b = fx.var("b");
        let lt = fx.bin(BinaryOperator::Lt, a, b);
        let not = fx.tree.unary(UnaryOperator::Not, lt);

        assert_eq!(
            fx.build(Strategy::ShortCircuit, not),
            "printf(\"%d\", !(a < b));\n"
        );
    }

    #[test]
    fn arithmetic_operands_are_flattened_in_source_order() {
        let mut fx = Fixture::new();
        let x = fx.var("x");
        let one = fx.tree.integer(1);
        let sum = fx.bin(BinaryOperator::Plus, x, one);
        let y = fx.var("y");
        let eq = fx.bin(BinaryOperator::Eq, sum, y);

        let trace = DiagnosticBuilder::new(&mut fx.tree, fx.printer, "%d")
            .build(Strategy::ShortCircuit, eq);
        let Node::Sequence(statements) = fx.tree.node(trace) else {
            panic!("expected a sequence");
        };
        assert_eq!(statements.len(), 5);
    }

    #[test]
    fn generated_calls_share_operands_and_have_no_location() {
        let mut fx = Fixture::new();
        let a = fx.var("a");

        let call = DiagnosticBuilder::new(&mut fx.tree, fx.printer, "%d").emit("%d", vec![a]);
        let Node::Call { args, location, .. } = fx.tree.node(call) else {
            panic!("expected a call");
        };
        assert_eq!(args[1], a);
        assert_eq!(*location, Location::Unknown);
    }

    #[test]
    fn flat_strategy_emits_one_parenthesised_call() {
        let mut fx = Fixture::new();
        let a = fx.var("a");
        let b = fx.var("b");
        let c = fx.var("c");
        let and = fx.bin(BinaryOperator::AndIf, a, b);
        let or = fx.bin(BinaryOperator::OrIf, and, c);

        assert_eq!(
            fx.build(Strategy::Flat, or),
            "printf(\"((%d) && (%d)) || (%d)\", a, b, c);\n"
        );
    }

    #[test]
    fn custom_leaf_format_is_used_for_every_value() {
        let mut fx = Fixture::new();
        let a = fx.var("a");
        let b = fx.var("b");
        let ne = fx.bin(BinaryOperator::Ne, a, b);

        let trace = DiagnosticBuilder::new(&mut fx.tree, fx.printer, "<%d>")
            .build(Strategy::Flat, ne);
        assert_eq!(
            render_statement(&fx.tree, trace),
            "printf(\"(<%d>) != (<%d>)\", a, b);\n"
        );
    }
}
