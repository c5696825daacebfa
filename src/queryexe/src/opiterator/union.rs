use super::{expect_inputs, Operator};
use crate::channel::{Sink, Source};
use common::FlowError;

/// UNION ALL: every row of input 0, then every row of input 1.
pub struct UnionOp;

impl Operator for UnionOp {
    fn name(&self) -> &'static str {
        "union"
    }

    fn input_count(&self) -> usize {
        2
    }

    fn run(self: Box<Self>, inputs: Vec<Source>, sink: Sink) -> Result<(), FlowError> {
        let mut count = 0;
        for mut input in expect_inputs(self.name(), inputs, 2) {
            for row in input.rows() {
                sink.send(row?)?;
                count += 1;
            }
        }
        debug!("union emitted {} rows", count);
        sink.end()
    }
}

#[cfg(test)]
mod test {
    use super::super::testutil::*;
    use super::*;
    use crate::channel::CancelHandle;
    use common::testutil::*;

    #[test]
    fn test_union_keeps_input_order() {
        let cancel = CancelHandle::new();
        let (first, p1) = feed(&cancel, create_row_list(vec![vec![1], vec![2]]));
        let (second, p2) = feed(&cancel, create_row_list(vec![vec![3], vec![1]]));
        let (sink, out) = collect(&cancel);
        Box::new(UnionOp).run(vec![first, second], sink).unwrap();
        p1.join().unwrap().unwrap();
        p2.join().unwrap().unwrap();
        assert_eq!(
            out.join().unwrap().unwrap(),
            create_row_list(vec![vec![1], vec![2], vec![3], vec![1]])
        );
    }
}
