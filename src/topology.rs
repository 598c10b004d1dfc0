//! Physical topology graph
//!
//! Directed graph over physical nodes; edges are created in pairs when
//! two devices connect and weighted by the link bandwidth (the min of the
//! two port bandwidths). Packet routing uses hop-count shortest paths.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::entity::NodeId;

#[derive(Debug, Default)]
pub struct Topology {
    graph: DiGraph<NodeId, u64>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeId) {
        self.indices
            .entry(node)
            .or_insert_with(|| self.graph.add_node(node));
    }

    /// Add the edge pair for one link.
    pub fn connect(&mut self, a: NodeId, b: NodeId, bandwidth: u64) {
        self.add_node(a);
        self.add_node(b);
        let ia = self.indices[&a];
        let ib = self.indices[&b];
        self.graph.add_edge(ia, ib, bandwidth);
        self.graph.add_edge(ib, ia, bandwidth);
    }

    /// Hop-count shortest path from `source` to `destination`, inclusive
    /// of both endpoints. A loopback resolves to the single node.
    pub fn shortest_path(&self, source: NodeId, destination: NodeId) -> Option<Vec<NodeId>> {
        if source == destination {
            return Some(vec![source]);
        }
        let start = *self.indices.get(&source)?;
        let goal = *self.indices.get(&destination)?;
        let (_, path) = petgraph::algo::astar(
            &self.graph,
            start,
            |finish| finish == goal,
            |_| 1u32,
            |_| 0,
        )?;
        Some(path.into_iter().map(|ix| self.graph[ix]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_path_prefers_fewest_hops() {
        let mut topo = Topology::new();
        // 0 - 1 - 2 and a direct 0 - 2 shortcut.
        topo.connect(NodeId(0), NodeId(1), 1000);
        topo.connect(NodeId(1), NodeId(2), 1000);
        topo.connect(NodeId(0), NodeId(2), 10);

        let path = topo.shortest_path(NodeId(0), NodeId(2)).unwrap();
        assert_eq!(path, vec![NodeId(0), NodeId(2)]);
    }

    #[test]
    fn loopback_path_is_the_single_node() {
        let mut topo = Topology::new();
        topo.add_node(NodeId(3));
        assert_eq!(
            topo.shortest_path(NodeId(3), NodeId(3)),
            Some(vec![NodeId(3)])
        );
    }

    #[test]
    fn disconnected_nodes_have_no_path() {
        let mut topo = Topology::new();
        topo.add_node(NodeId(0));
        topo.add_node(NodeId(1));
        assert_eq!(topo.shortest_path(NodeId(0), NodeId(1)), None);
    }
}
