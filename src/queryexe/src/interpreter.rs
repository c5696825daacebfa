use crate::channel::{channel, CancelHandle, Sink, Source};
use common::logical_plan::{LogicalPlan, OpIndex};
use std::collections::HashMap;

/// Output channel of one registered operator.
#[derive(Debug)]
struct NodeInfo {
    node: OpIndex,
    /// Consumer half of the node's output, until someone takes it.
    output: Option<Source>,
}

/// Wires the operators of one plan together through channels.
///
/// Every operator registers its output with [`Interpreter::sink`] before any
/// consumer resolves it with [`Interpreter::source`], so registration runs
/// bottom-up. The interpreter only connects channels; running the operators
/// is up to the caller. Construction is single-threaded; the Sinks and Sources
/// it hands out may then move to other threads.
pub struct Interpreter<'a> {
    /// Plan whose node inputs are resolved.
    plan: &'a LogicalPlan,
    /// Registry from operator to its output channel.
    nodes: HashMap<OpIndex, NodeInfo>,
    /// Shared by every channel of this plan.
    cancel: CancelHandle,
}

impl<'a> Interpreter<'a> {
    /// Creates an empty registry for `plan`.
    pub fn new(plan: &'a LogicalPlan) -> Self {
        Self {
            plan,
            nodes: HashMap::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Allocates the output channel of `node` and returns its producer half.
    ///
    /// Call at most once per node; a second call replaces the first channel.
    pub fn sink(&mut self, node: OpIndex) -> Sink {
        let (sink, source) = channel(&self.cancel);
        debug!("registered output channel of node {}", node);
        let info = NodeInfo {
            node,
            output: Some(source),
        };
        if self.nodes.insert(node, info).is_some() {
            warn!("node {} registered twice, keeping the last channel", node);
        }
        sink
    }

    /// Returns a Source reading the output of the `ordinal`-th input of `node`.
    ///
    /// # Panics
    ///
    /// Panics if `node` has no such input, if that input was never registered
    /// with [`Interpreter::sink`], or if its output was already taken. Each of
    /// these means the graph is being built out of order.
    pub fn source(&mut self, node: OpIndex, ordinal: usize) -> Source {
        let input = self
            .plan
            .input(node, ordinal)
            .unwrap_or_else(|| panic!("node {} has no input {}", node, ordinal));
        debug!("node {} reads input {} from node {}", node, ordinal, input);
        self.take_output(input)
    }

    /// Returns a Source reading the output of `node` itself.
    ///
    /// Used for the plan root, whose output is read by the driver rather than
    /// by another operator.
    ///
    /// # Panics
    ///
    /// Panics if `node` was never registered or its output was already taken.
    pub fn output(&mut self, node: OpIndex) -> Source {
        self.take_output(node)
    }

    fn take_output(&mut self, node: OpIndex) -> Source {
        let info = self
            .nodes
            .get_mut(&node)
            .unwrap_or_else(|| panic!("node {} was read before sink() registered it", node));
        info.output
            .take()
            .unwrap_or_else(|| panic!("output of node {} already has a consumer", info.node))
    }

    /// Number of registered nodes.
    pub fn registered(&self) -> usize {
        self.nodes.len()
    }

    /// Handle that aborts every channel of this plan.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}
