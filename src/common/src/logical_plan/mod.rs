use crate::plan_graph::{NodeIndex, PlanGraph};
use crate::FlowError;
pub use logical_op::*;
use serde_json::{json, Value};
use std::collections::HashMap;
mod logical_op;
use std::default::Default;
use std::fmt;

/// OpIndex is used to identify nodes in the LogicalPlan.
pub type OpIndex = NodeIndex;

/// Graph where nodes represent logical operations and edges represent the flow of data.
///
/// An edge goes from a consumer to one of its producers. The edges out of a
/// node are that node's inputs, in ordinal order.
#[derive(Debug, Clone)]
pub struct LogicalPlan {
    /// Graph of the logical plan.
    dataflow: PlanGraph<LogicalOp>,
    /// The root represents final output operation. Root does not work if the graph contains any unconnected components.
    root: Option<OpIndex>,
}

impl Default for LogicalPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalPlan {
    /// Creates an empty logical plan.
    pub fn new() -> Self {
        Self {
            dataflow: PlanGraph::new(),
            root: None,
        }
    }

    /// Adds a node with an associated LogicalOp to the logical plan and returns the index of the added node.
    ///
    /// # Arguments
    ///
    /// * `operator` - Operator to add to the logical plan.
    pub fn add_node(&mut self, operator: LogicalOp) -> OpIndex {
        let index = self.dataflow.add_node(operator);
        if self.root.is_none() {
            self.root = Some(index)
        }
        index
    }

    /// Adds an edge from source to target, making target the next input of source.
    ///
    /// In the logical plan representation data flows from target to source.
    ///
    /// # Arguments
    ///
    /// * `source` - Data consumer.
    /// * `target` - Data producer.
    pub fn add_edge(&mut self, source: OpIndex, target: OpIndex) {
        if let Some(index) = self.root {
            if index == target {
                self.root = Some(source);
            }
        }
        self.dataflow.add_edge(source, target);
    }

    /// Returns an iterator over the inputs of `from`, in ordinal order.
    ///
    /// # Arguments
    ///
    /// * `from` - Node to get the inputs of.
    pub fn edges<'a>(&'a self, from: OpIndex) -> impl Iterator<Item = OpIndex> + 'a {
        self.dataflow.edges(from)
    }

    /// Returns the `ordinal`-th input of `node`, if it has one.
    pub fn input(&self, node: OpIndex, ordinal: usize) -> Option<OpIndex> {
        self.dataflow.edges(node).nth(ordinal)
    }

    /// Gets the index of the root node, if such a node is present.
    ///
    /// The root node represents the final output operation in the logical plan.
    pub fn root(&self) -> Option<OpIndex> {
        self.root
    }

    /// Returns the LogicalOperation associated with a node.
    ///
    /// # Arguments
    ///
    /// * `index` - Index of the node to get the logical operation of.
    pub fn get_operator(&self, index: OpIndex) -> Option<&LogicalOp> {
        self.dataflow.node_data(index)
    }

    /// Returns the total number of nodes present in the graph.
    pub fn node_count(&self) -> usize {
        self.dataflow.node_count()
    }

    /// Returns the total number of edges present in the graph.
    pub fn edge_count(&self) -> usize {
        self.dataflow.edge_count()
    }

    /// Serializes the Logical Plan as json.
    pub fn to_json(&self) -> serde_json::Value {
        let mut node_map = HashMap::new();
        let mut edge_map = HashMap::new();
        for (i, node) in self.dataflow.node_references() {
            node_map.insert(i.to_string(), node.data());
        }
        for edge in self.dataflow.edge_references() {
            let targets = edge_map
                .entry(edge.source().to_string())
                .or_insert_with(Vec::new);
            targets.push(edge.target().to_string());
        }
        json!({"nodes":node_map,
               "edges":edge_map,
               "root":self.root.map(|i| i.to_string())})
    }

    fn map_flow_err<T>(result: serde_json::Result<T>, err: FlowError) -> Result<T, FlowError> {
        match result {
            Ok(res) => Ok(res),
            Err(e) => {
                debug!("logical plan json rejected: {}", e);
                Err(err)
            }
        }
    }

    /// De-Serializes a json representation of the Logical Plan created in to_json
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        let malformed_err =
            FlowError::ValidationError(String::from("Malformatted logical plan json"));
        let v: Value = LogicalPlan::map_flow_err(serde_json::from_str(json), malformed_err.clone())?;
        let nodes: HashMap<String, LogicalOp> = LogicalPlan::map_flow_err(
            serde_json::from_value(v["nodes"].clone()),
            malformed_err.clone(),
        )?;
        let edges: HashMap<String, Vec<String>> = LogicalPlan::map_flow_err(
            serde_json::from_value(v["edges"].clone()),
            malformed_err.clone(),
        )?;
        let root: Option<String> = LogicalPlan::map_flow_err(
            serde_json::from_value(v["root"].clone()),
            malformed_err.clone(),
        )?;

        // Insert in key order so that indices stay as written.
        let mut keys: Vec<&String> = nodes.keys().collect();
        keys.sort_by_key(|k| k.parse::<usize>().unwrap_or(usize::MAX));
        let mut graph_map = HashMap::new();
        let mut plan = LogicalPlan::new();
        for key in keys {
            let node = plan.dataflow.add_node(nodes[key].clone());
            graph_map.insert(key.clone(), node);
        }

        if let Some(i) = root {
            let root_node = graph_map.get(&i).ok_or_else(|| malformed_err.clone())?;
            plan.root = Some(*root_node);
        }

        for (source, targets) in edges.iter() {
            let source_node = graph_map.get(source).ok_or_else(|| malformed_err.clone())?;
            for target in targets {
                let target_node = graph_map.get(target).ok_or_else(|| malformed_err.clone())?;
                plan.dataflow.add_edge(*source_node, *target_node);
            }
        }
        Ok(plan)
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rex::{RexNode, RexOp};
    use crate::Value;

    fn scan(alias: &str) -> LogicalOp {
        LogicalOp::Scan(ScanNode {
            alias: alias.to_string(),
        })
    }

    #[test]
    fn test_new() {
        let lp = LogicalPlan::new();
        assert_eq!(lp.node_count(), 0);
        assert_eq!(lp.edge_count(), 0);
        assert_eq!(lp.root, None);
    }

    #[test]
    fn test_add_node() {
        let count = 10;
        let mut lp = LogicalPlan::new();
        for i in 0..count {
            lp.add_node(scan(&i.to_string()));
        }
        assert_eq!(lp.node_count(), count);
    }

    #[test]
    fn test_add_edge() {
        let count = 10;
        let mut lp = LogicalPlan::new();
        let mut prev = lp.add_node(scan("0"));
        for i in 0..count {
            let curr = lp.add_node(scan(&i.to_string()));
            lp.add_edge(curr, prev);
            prev = curr;
        }
        assert_eq!(lp.root, Some(prev));
        assert_eq!(lp.edge_count(), count);
    }

    #[test]
    fn test_inputs_are_ordinal() {
        let mut lp = LogicalPlan::new();
        let parent = lp.add_node(LogicalOp::Union(UnionNode {}));
        let child1 = lp.add_node(scan("child1"));
        let child2 = lp.add_node(scan("child2"));
        lp.add_edge(parent, child1);
        lp.add_edge(parent, child2);
        assert_eq!(lp.input(parent, 0), Some(child1));
        assert_eq!(lp.input(parent, 1), Some(child2));
        assert_eq!(lp.input(parent, 2), None);
        assert_eq!(lp.input(child1, 0), None);
    }

    #[test]
    fn test_get_operator() {
        let count = 5;
        let mut nodes = Vec::new();
        let mut lp = LogicalPlan::new();
        for i in 0..count {
            nodes.push(lp.add_node(scan(&i.to_string())));
        }

        for i in 0..count {
            let expected = i.to_string();
            match lp.get_operator(nodes[i]) {
                Some(LogicalOp::Scan(s)) => {
                    assert_eq!(expected, s.alias);
                }
                _ => panic!("Incorrect operator"),
            }
        }
    }

    #[test]
    fn test_json() {
        let mut lp = LogicalPlan::new();
        let left = lp.add_node(scan("left"));
        let right = lp.add_node(scan("right"));
        let join = lp.add_node(LogicalOp::Join(JoinNode {
            condition: RexNode::call(
                RexOp::Equals,
                vec![RexNode::input_ref(0), RexNode::input_ref(1)],
            ),
        }));
        lp.add_edge(join, left);
        lp.add_edge(join, right);
        let project = lp.add_node(LogicalOp::Project(ProjectNode {
            exprs: vec![RexNode::literal(Value::Int(1))],
            names: vec![],
        }));
        lp.add_edge(project, join);
        let json = lp.to_json();
        let new_lp = LogicalPlan::from_json(&json.to_string()).unwrap();
        assert_eq!(lp.node_count(), new_lp.node_count());
        assert_eq!(lp.edge_count(), new_lp.edge_count());

        let new_root = new_lp.root().unwrap();
        match new_lp.get_operator(new_root) {
            Some(LogicalOp::Project(_)) => (),
            _ => panic!("Incorrect root"),
        }
        let new_join = new_lp.input(new_root, 0).unwrap();
        match new_lp.get_operator(new_lp.input(new_join, 1).unwrap()) {
            Some(LogicalOp::Scan(s)) => assert_eq!(s.alias, "right"),
            _ => panic!("Incorrect join input order"),
        }
    }

    #[test]
    fn test_malformed_json() {
        let res = LogicalPlan::from_json("{\"nodes\": 3}");
        assert!(matches!(res, Err(FlowError::ValidationError(_))));
    }
}
