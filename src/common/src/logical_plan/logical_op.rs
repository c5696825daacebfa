use crate::rex::RexNode;
use crate::{Row, TableSchema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A LogicalOp represents a relational operation present in a logical query plan.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum LogicalOp {
    Scan(ScanNode),
    Values(ValuesNode),
    Filter(FilterNode),
    Project(ProjectNode),
    Join(JoinNode),
    Union(UnionNode),
}

impl LogicalOp {
    /// Number of inputs the operator consumes.
    pub fn input_count(&self) -> usize {
        match self {
            LogicalOp::Scan(_) | LogicalOp::Values(_) => 0,
            LogicalOp::Filter(_) | LogicalOp::Project(_) => 1,
            LogicalOp::Join(_) | LogicalOp::Union(_) => 2,
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::Scan(s) => write!(f, "Scan({})", s.alias),
            LogicalOp::Values(v) => write!(f, "Values({} rows)", v.rows.len()),
            LogicalOp::Filter(n) => write!(f, "Filter({})", n.condition),
            LogicalOp::Project(p) => {
                let exprs: Vec<String> = p.exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "Project({})", exprs.join(", "))
            }
            LogicalOp::Join(j) => write!(f, "Join({})", j.condition),
            LogicalOp::Union(_) => write!(f, "Union"),
        }
    }
}

/// Scan node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScanNode {
    /// Name of the catalog table to read.
    pub alias: String,
}

/// Inline rows.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValuesNode {
    /// Schema of the rows.
    pub schema: TableSchema,
    /// Rows to emit, in order.
    pub rows: Vec<Row>,
}

/// Filter node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterNode {
    /// Rows pass only when this evaluates to true.
    pub condition: RexNode,
}

/// Projection node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectNode {
    /// One expression per output field.
    pub exprs: Vec<RexNode>,
    /// Output field names. Missing names default to `EXPR$i`.
    #[serde(default)]
    pub names: Vec<String>,
}

impl ProjectNode {
    /// Name of the i-th output field.
    pub fn name(&self, i: usize) -> String {
        self.names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("EXPR${}", i))
    }
}

/// Inner join over the concatenation of the left and right rows.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JoinNode {
    /// Join condition; input references index the concatenated row.
    pub condition: RexNode,
}

/// UNION ALL of two inputs.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UnionNode {}
