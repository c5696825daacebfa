//! Arena-backed directed graph used by the logical plan.
//!
//! Nodes are addressed by [`NodeIndex`], a plain arena position. Edges are kept
//! per node in insertion order, so the n-th edge out of a node is stable and
//! can be used as an input ordinal.

use std::fmt;

/// Index of a node in a [`PlanGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for NodeIndex {
    fn from(i: usize) -> Self {
        NodeIndex(i)
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node and its outgoing edges.
#[derive(Debug, Clone)]
pub struct Node<T> {
    data: T,
    edges: Vec<NodeIndex>,
}

impl<T> Node<T> {
    pub fn data(&self) -> &T {
        &self.data
    }
}

/// A single edge, as returned by [`PlanGraph::edge_references`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    source: NodeIndex,
    target: NodeIndex,
}

impl EdgeRef {
    pub fn source(&self) -> NodeIndex {
        self.source
    }

    pub fn target(&self) -> NodeIndex {
        self.target
    }
}

#[derive(Debug, Clone)]
pub struct PlanGraph<T> {
    nodes: Vec<Node<T>>,
    edge_count: usize,
}

impl<T> Default for PlanGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PlanGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edge_count: 0,
        }
    }

    pub fn add_node(&mut self, data: T) -> NodeIndex {
        self.nodes.push(Node {
            data,
            edges: Vec::new(),
        });
        NodeIndex(self.nodes.len() - 1)
    }

    /// Appends an edge from `source` to `target`.
    ///
    /// # Panics
    ///
    /// Panics if either index is not a node of this graph.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex) {
        assert!(
            target.0 < self.nodes.len(),
            "edge target {} is not a node",
            target
        );
        self.nodes[source.0].edges.push(target);
        self.edge_count += 1;
    }

    /// Targets of the edges out of `from`, in insertion order.
    pub fn edges<'a>(&'a self, from: NodeIndex) -> impl Iterator<Item = NodeIndex> + 'a {
        self.nodes
            .get(from.0)
            .map(|n| n.edges.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    pub fn node_data(&self, index: NodeIndex) -> Option<&T> {
        self.nodes.get(index.0).map(|n| &n.data)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn node_references(&self) -> impl Iterator<Item = (NodeIndex, &Node<T>)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIndex(i), n))
    }

    pub fn edge_references(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.node_references().flat_map(|(source, node)| {
            node.edges
                .iter()
                .map(move |&target| EdgeRef { source, target })
        })
    }
}
