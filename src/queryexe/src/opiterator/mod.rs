//! Reference operators.
//!
//! Each operator reads its inputs through [`Source`]s, writes its output into
//! one [`Sink`], and ends that sink exactly once when it finishes normally.
//! On error the sink is dropped unended, which its consumer sees as a failure.

use crate::channel::{Sink, Source};
use common::FlowError;

mod filter;
mod join;
mod project;
mod union;
mod values;

pub use filter::FilterOp;
pub use join::NestedLoopJoinOp;
pub use project::ProjectOp;
pub use union::UnionOp;
pub use values::ValuesOp;

/// A relational operator that pushes its output row by row.
pub trait Operator: Send {
    /// Short name for logs and thread names.
    fn name(&self) -> &'static str;

    /// Number of inputs the operator expects.
    fn input_count(&self) -> usize;

    /// Runs the operator to completion.
    ///
    /// # Arguments
    ///
    /// * `inputs` - One Source per input, in ordinal order.
    /// * `sink` - Output of the operator.
    fn run(self: Box<Self>, inputs: Vec<Source>, sink: Sink) -> Result<(), FlowError>;
}

/// Checks the input count handed to an operator.
///
/// # Panics
///
/// Panics if the count differs from what the operator expects.
fn expect_inputs(name: &str, inputs: Vec<Source>, count: usize) -> Vec<Source> {
    assert_eq!(
        inputs.len(),
        count,
        "{} expects {} inputs, got {}",
        name,
        count,
        inputs.len()
    );
    inputs
}
