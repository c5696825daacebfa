//! Compiles row-expressions into closures over a row.
//!
//! The compiler knows a fixed vocabulary: literals, input references and the
//! calls listed in [`RexOp`]. Anything else in a [`RexNode`] is a plan defect
//! and compiling it panics.

use common::rex::{RexNode, RexOp};
use common::{Row, TableSchema, Value};
use std::fmt;
use std::sync::Arc;

type Eval = Box<dyn Fn(&Row) -> Value + Send + Sync>;

/// Compiled expression. Holds no mutable state; cloning shares the code.
#[derive(Clone)]
pub struct Scalar {
    /// Source expression, for diagnostics.
    digest: Arc<str>,
    eval: Arc<Eval>,
}

impl Scalar {
    /// Evaluates the expression against `row`.
    ///
    /// # Panics
    ///
    /// Panics if the expression references a field `row` does not have.
    pub fn execute(&self, row: &Row) -> Value {
        (self.eval)(row)
    }

    /// True if the expression evaluates to `TRUE` for `row`. `NULL` is not true.
    pub fn matches(&self, row: &Row) -> bool {
        self.execute(row) == Value::Bool(true)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", self.digest)
    }
}

/// Turns [`RexNode`] trees into [`Scalar`]s.
#[derive(Debug, Default)]
pub struct ScalarCompiler<'s> {
    /// Schema of the rows the compiled code will see, when known.
    input: Option<&'s TableSchema>,
}

impl<'s> ScalarCompiler<'s> {
    /// Compiler with no knowledge of the input; references are checked per row.
    pub fn new() -> Self {
        Self { input: None }
    }

    /// Compiler that also checks input references against `input` up front.
    pub fn with_input(input: &'s TableSchema) -> Self {
        Self { input: Some(input) }
    }

    /// Compiles `expr`.
    ///
    /// # Panics
    ///
    /// Panics on expression kinds outside the compiler's vocabulary, on calls
    /// with the wrong number of operands, and on input references past the end
    /// of the known input schema.
    pub fn compile(&self, expr: &RexNode) -> Scalar {
        Scalar {
            digest: Arc::from(expr.to_string()),
            eval: Arc::new(self.compile_node(expr)),
        }
    }

    fn compile_node(&self, expr: &RexNode) -> Eval {
        match expr {
            RexNode::Literal(value) => {
                let value = value.clone();
                Box::new(move |_: &Row| value.clone())
            }
            RexNode::InputRef(index) => self.compile_input_ref(*index),
            RexNode::Call { op, operands } => self.compile_call(expr, *op, operands),
            _ => panic!("cannot compile expression {}: unsupported expression kind", expr),
        }
    }

    fn compile_input_ref(&self, index: usize) -> Eval {
        if let Some(schema) = self.input {
            assert!(
                index < schema.size(),
                "input reference ${} is out of range for input {}",
                index,
                schema.digest()
            );
        }
        Box::new(move |row: &Row| match row.get_field(index) {
            Some(value) => value.clone(),
            None => panic!(
                "input reference ${} is out of range for a row of {} fields",
                index,
                row.size()
            ),
        })
    }

    fn compile_call(&self, expr: &RexNode, op: RexOp, operands: &[RexNode]) -> Eval {
        let mut args: Vec<Eval> = operands.iter().map(|o| self.compile_node(o)).collect();
        match op {
            _ if op.is_comparison() => {
                assert_eq!(args.len(), 2, "{} expects 2 operands in {}", op, expr);
                let right = args.remove(1);
                let left = args.remove(0);
                Box::new(move |row: &Row| {
                    let (l, r) = (left(row), right(row));
                    if l.is_null() || r.is_null() {
                        Value::Null
                    } else {
                        Value::Bool(op.compare(&l, &r))
                    }
                })
            }
            RexOp::And | RexOp::Or => {
                assert!(!args.is_empty(), "{} expects operands in {}", op, expr);
                // The value that decides the result on its own.
                let decisive = op == RexOp::Or;
                let digest = expr.to_string();
                Box::new(move |row: &Row| {
                    let mut saw_null = false;
                    for arg in &args {
                        match arg(row) {
                            Value::Bool(b) if b == decisive => return Value::Bool(decisive),
                            Value::Bool(_) => {}
                            Value::Null => saw_null = true,
                            other => panic!("operand {} of {} is not a boolean", other, digest),
                        }
                    }
                    if saw_null {
                        Value::Null
                    } else {
                        Value::Bool(!decisive)
                    }
                })
            }
            RexOp::Not => {
                let arg = Self::single(args, op, expr);
                let digest = expr.to_string();
                Box::new(move |row: &Row| match arg(row) {
                    Value::Bool(b) => Value::Bool(!b),
                    Value::Null => Value::Null,
                    other => panic!("operand {} of {} is not a boolean", other, digest),
                })
            }
            RexOp::IsNull => {
                let arg = Self::single(args, op, expr);
                Box::new(move |row: &Row| Value::Bool(arg(row).is_null()))
            }
            RexOp::IsNotNull => {
                let arg = Self::single(args, op, expr);
                Box::new(move |row: &Row| Value::Bool(!arg(row).is_null()))
            }
            _ => unreachable!("comparisons are handled above"),
        }
    }

    fn single(mut args: Vec<Eval>, op: RexOp, expr: &RexNode) -> Eval {
        assert_eq!(args.len(), 1, "{} expects 1 operand in {}", op, expr);
        args.remove(0)
    }
}
