use super::{expect_inputs, Operator};
use crate::channel::{Sink, Source};
use crate::scalar::Scalar;
use common::FlowError;

/// Passes the rows for which the condition is true.
pub struct FilterOp {
    condition: Scalar,
}

impl FilterOp {
    /// # Arguments
    ///
    /// * `condition` - Compiled predicate over the input row.
    pub fn new(condition: Scalar) -> Self {
        Self { condition }
    }
}

impl Operator for FilterOp {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn input_count(&self) -> usize {
        1
    }

    fn run(self: Box<Self>, inputs: Vec<Source>, sink: Sink) -> Result<(), FlowError> {
        let mut input = expect_inputs(self.name(), inputs, 1).remove(0);
        let (mut seen, mut passed) = (0, 0);
        for row in input.rows() {
            let row = row?;
            seen += 1;
            if self.condition.matches(&row) {
                passed += 1;
                sink.send(row)?;
            }
        }
        debug!("filter {:?} passed {} of {} rows", self.condition, passed, seen);
        sink.end()
    }
}
