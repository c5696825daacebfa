use super::{expect_inputs, Operator};
use crate::channel::{Sink, Source};
use crate::scalar::Scalar;
use common::{FlowError, Row};

/// Computes one output field per expression.
pub struct ProjectOp {
    exprs: Vec<Scalar>,
}

impl ProjectOp {
    /// # Arguments
    ///
    /// * `exprs` - Compiled expressions, one per output field.
    pub fn new(exprs: Vec<Scalar>) -> Self {
        Self { exprs }
    }
}

impl Operator for ProjectOp {
    fn name(&self) -> &'static str {
        "project"
    }

    fn input_count(&self) -> usize {
        1
    }

    fn run(self: Box<Self>, inputs: Vec<Source>, sink: Sink) -> Result<(), FlowError> {
        let mut input = expect_inputs(self.name(), inputs, 1).remove(0);
        let mut count = 0;
        for row in input.rows() {
            let row = row?;
            let projected = self.exprs.iter().map(|e| e.execute(&row)).collect();
            sink.send(Row::new(projected))?;
            count += 1;
        }
        debug!("project emitted {} rows", count);
        sink.end()
    }
}

#[cfg(test)]
mod test {
    use super::super::testutil::*;
    use super::*;
    use crate::channel::CancelHandle;
    use crate::scalar::ScalarCompiler;
    use common::rex::RexNode;
    use common::testutil::*;
    use common::Value;

    #[test]
    fn test_project_reorders_and_computes() {
        let cancel = CancelHandle::new();
        let (input, producer) = feed(&cancel, vec![int_str_row(1, "a"), int_str_row(2, "b")]);
        let (sink, out) = collect(&cancel);
        let schema = int_str_schema();
        let compiler = ScalarCompiler::with_input(&schema);
        let exprs = vec![
            compiler.compile(&RexNode::input_ref(1)),
            compiler.compile(&RexNode::literal(Value::Int(0))),
            compiler.compile(&RexNode::input_ref(0)),
        ];
        Box::new(ProjectOp::new(exprs)).run(vec![input], sink).unwrap();
        producer.join().unwrap().unwrap();
        let rows = out.join().unwrap().unwrap();
        assert_eq!(
            rows,
            vec![
                Row::new(vec![Value::String("a".into()), Value::Int(0), Value::Int(1)]),
                Row::new(vec![Value::String("b".into()), Value::Int(0), Value::Int(2)]),
            ]
        );
    }

    #[test]
    fn test_project_stops_on_cancel() {
        let cancel = CancelHandle::new();
        let (_blocked_producer, input) = crate::channel::channel(&cancel);
        let (sink, _out) = collect(&cancel);
        let op = Box::new(ProjectOp::new(vec![]));
        let worker = std::thread::spawn(move || op.run(vec![input], sink));
        cancel.cancel();
        assert_eq!(worker.join().unwrap(), Err(FlowError::Cancelled));
    }
}
