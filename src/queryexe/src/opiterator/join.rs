use super::{expect_inputs, Operator};
use crate::channel::{Sink, Source};
use crate::scalar::Scalar;
use common::{FlowError, Row};

/// Inner join that buffers the right input and streams the left.
///
/// Output rows are the left row followed by the right row, in left order and
/// then right order.
pub struct NestedLoopJoinOp {
    /// Predicate over the concatenated row.
    condition: Scalar,
}

impl NestedLoopJoinOp {
    /// # Arguments
    ///
    /// * `condition` - Compiled predicate over left row ++ right row.
    pub fn new(condition: Scalar) -> Self {
        Self { condition }
    }
}

impl Operator for NestedLoopJoinOp {
    fn name(&self) -> &'static str {
        "join"
    }

    fn input_count(&self) -> usize {
        2
    }

    fn run(self: Box<Self>, inputs: Vec<Source>, sink: Sink) -> Result<(), FlowError> {
        let mut inputs = expect_inputs(self.name(), inputs, 2);
        let mut right = inputs.remove(1);
        let mut left = inputs.remove(0);

        let right_rows: Vec<Row> = right.rows().collect::<Result<_, _>>()?;
        debug!("join buffered {} right rows", right_rows.len());

        let mut count = 0;
        for left_row in left.rows() {
            let left_row = left_row?;
            for right_row in &right_rows {
                let joined = left_row.merge(right_row);
                if self.condition.matches(&joined) {
                    sink.send(joined)?;
                    count += 1;
                }
            }
        }
        debug!("join emitted {} rows", count);
        sink.end()
    }
}
