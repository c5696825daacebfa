use super::{expect_inputs, Operator};
use crate::channel::{Sink, Source};
use common::{FlowError, Row};

/// Emits a fixed list of rows. Serves both table scans and inline values.
pub struct ValuesOp {
    rows: Vec<Row>,
}

impl ValuesOp {
    /// # Arguments
    ///
    /// * `rows` - Rows to emit, in order.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

impl Operator for ValuesOp {
    fn name(&self) -> &'static str {
        "values"
    }

    fn input_count(&self) -> usize {
        0
    }

    fn run(self: Box<Self>, inputs: Vec<Source>, sink: Sink) -> Result<(), FlowError> {
        expect_inputs(self.name(), inputs, 0);
        let count = self.rows.len();
        for row in self.rows {
            sink.send(row)?;
        }
        debug!("values emitted {} rows", count);
        sink.end()
    }
}
