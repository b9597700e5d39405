//! Plain-mapping serialization for [`Stn`], matching the wire form the spec
//! assigns to `stn` / `dispatchable_graph` payload fields: a `nodes` list and
//! an `edges` list, transport-agnostic JSON.

use serde::{Deserialize, Serialize};

use super::graph::{NodeIndex, NodeKind, Stn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDict {
    pub id: u32,
    pub kind: NodeKind,
    pub executed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDict {
    pub from: u32,
    pub to: u32,
    pub weight: f64,
    #[serde(default)]
    pub executed: bool,
}

/// Self-describing mapping form of an [`Stn`], suitable for embedding in a
/// `BID` / `TASK-CONTRACT` / `D-GRAPH-UPDATE` message payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StnDict {
    pub nodes: Vec<NodeDict>,
    pub edges: Vec<EdgeDict>,
}

impl StnDict {
    pub fn from_stn(stn: &Stn) -> Self {
        let nodes = stn
            .node_indices()
            .map(|n| NodeDict {
                id: n.index() as u32,
                kind: stn.node_kind(n).expect("node exists"),
                executed: stn.is_executed(n),
            })
            .collect();

        let graph = stn.graph();
        let edges = graph
            .edge_indices()
            .map(|e| {
                let (from, to) = graph.edge_endpoints(e).expect("edge index is valid");
                let w = graph[e];
                EdgeDict {
                    from: from.index() as u32,
                    to: to.index() as u32,
                    weight: w.weight,
                    executed: w.executed,
                }
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn to_stn(&self) -> Stn {
        let mut stn = Stn::new();
        // Node 0 (ztp) already exists; add the rest in id order so the
        // resulting NodeIndex values line up with the recorded ids. A
        // subgraph (see `Stn::subgraph`) can have gaps in its ids, so pad
        // with placeholder timepoints rather than assuming density — those
        // placeholders carry no constraints and nothing in the dict ever
        // references them.
        let mut sorted_nodes = self.nodes.clone();
        sorted_nodes.sort_by_key(|n| n.id);
        for node in &sorted_nodes {
            if node.id == 0 {
                continue;
            }
            let idx = NodeIndex::new(node.id as usize);
            while !stn.contains_node(idx) {
                stn.add_timepoint(node.kind);
            }
        }
        for edge in &self.edges {
            let from = NodeIndex::new(edge.from as usize);
            let to = NodeIndex::new(edge.to as usize);
            stn.graph_mut()
                .add_edge(from, to, super::graph::EdgeWeight {
                    weight: edge.weight,
                    executed: edge.executed,
                });
        }
        for node in &sorted_nodes {
            if node.executed {
                if let Some(weight) = stn.graph_mut().node_weight_mut(NodeIndex::new(node.id as usize)) {
                    weight.executed = true;
                }
            }
        }
        stn
    }

    /// Applies this dict's edges onto an existing [`Stn`] in place: adds any
    /// timepoints it doesn't yet have and overwrites matching edge weights,
    /// but never removes an edge absent from the dict. This is the "merge"
    /// counterpart to [`Self::to_stn`]'s "replace" semantics, used when a
    /// `D-GRAPH-UPDATE` should layer onto a shadow graph rather than
    /// discard what the fleet monitor already knew about it.
    pub fn merge_into(&self, target: &mut Stn) {
        let mut sorted_nodes = self.nodes.clone();
        sorted_nodes.sort_by_key(|n| n.id);
        for node in &sorted_nodes {
            let idx = NodeIndex::new(node.id as usize);
            while !target.contains_node(idx) {
                target.add_timepoint(node.kind);
            }
        }
        for edge in &self.edges {
            let from = NodeIndex::new(edge.from as usize);
            let to = NodeIndex::new(edge.to as usize);
            if target.contains_node(from) && target.contains_node(to) {
                target.graph_mut().update_edge(
                    from,
                    to,
                    super::graph::EdgeWeight { weight: edge.weight, executed: edge.executed },
                );
            }
        }
    }
}
