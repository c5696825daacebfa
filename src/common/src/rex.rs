use crate::{DataType, TableSchema, Value};
use std::fmt;

/// Operators that may appear in a [`RexNode::Call`].
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RexOp {
    Equals,
    NotEq,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    And,
    Or,
    Not,
    IsNull,
    IsNotNull,
}

impl RexOp {
    /// Do a comparison. Non-comparison operators return false.
    ///
    /// # Arguments
    ///
    /// * `left` - Left operand.
    /// * `right` - Right operand.
    pub fn compare<T: Ord>(&self, left: &T, right: &T) -> bool {
        match self {
            RexOp::Equals => left == right,
            RexOp::NotEq => left != right,
            RexOp::LessThan => left < right,
            RexOp::LessThanOrEq => left <= right,
            RexOp::GreaterThan => left > right,
            RexOp::GreaterThanOrEq => left >= right,
            _ => false,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            RexOp::Equals
                | RexOp::NotEq
                | RexOp::LessThan
                | RexOp::LessThanOrEq
                | RexOp::GreaterThan
                | RexOp::GreaterThanOrEq
        )
    }
}

impl fmt::Display for RexOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            RexOp::Equals => "=",
            RexOp::NotEq => "<>",
            RexOp::LessThan => "<",
            RexOp::LessThanOrEq => "<=",
            RexOp::GreaterThan => ">",
            RexOp::GreaterThanOrEq => ">=",
            RexOp::And => "AND",
            RexOp::Or => "OR",
            RexOp::Not => "NOT",
            RexOp::IsNull => "IS NULL",
            RexOp::IsNotNull => "IS NOT NULL",
        };
        write!(f, "{}", op_str)
    }
}

/// A row-expression, already validated by the layer that produced it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum RexNode {
    /// A constant.
    Literal(Value),
    /// Field of the input row at the given index.
    InputRef(usize),
    /// Operator applied to operands.
    Call { op: RexOp, operands: Vec<RexNode> },
    /// Positional query parameter, bound outside of execution.
    DynamicParam(usize),
    /// Reference to a row of an enclosing query.
    CorrelVariable(String),
    /// Field of a nested row value.
    FieldAccess { expr: Box<RexNode>, field: String },
}

impl RexNode {
    pub fn literal(value: Value) -> Self {
        RexNode::Literal(value)
    }

    pub fn input_ref(index: usize) -> Self {
        RexNode::InputRef(index)
    }

    pub fn call(op: RexOp, operands: Vec<RexNode>) -> Self {
        RexNode::Call { op, operands }
    }

    /// Type of the expression against the given input schema.
    ///
    /// Returns None for out-of-range references and for kinds whose type
    /// cannot be derived here.
    pub fn data_type(&self, input: &TableSchema) -> Option<DataType> {
        match self {
            RexNode::Literal(v) => Some(v.data_type()),
            RexNode::InputRef(i) => input.get_attribute(*i).map(|a| a.dtype().clone()),
            RexNode::Call { .. } => Some(DataType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for RexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RexNode::Literal(Value::String(s)) => write!(f, "'{}'", s),
            RexNode::Literal(v) => write!(f, "{}", v),
            RexNode::InputRef(i) => write!(f, "${}", i),
            RexNode::Call { op, operands } => {
                let args: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
                write!(f, "{}({})", op, args.join(", "))
            }
            RexNode::DynamicParam(i) => write!(f, "?{}", i),
            RexNode::CorrelVariable(name) => write!(f, "$cor({})", name),
            RexNode::FieldAccess { expr, field } => write!(f, "{}.{}", expr, field),
        }
    }
}
