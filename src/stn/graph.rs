use petgraph::stable_graph::StableGraph;
use petgraph::Directed;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::error::StnError;

pub use petgraph::stable_graph::NodeIndex;

/// The zero timepoint always lives at this node index.
pub const ZTP: NodeIndex = NodeIndex::new(0);

/// Kind of timepoint a node in the STN represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Ztp,
    Start,
    Pickup,
    Delivery,
}

/// A single timepoint in the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimepointNode {
    pub kind: NodeKind,
    /// Set once the timepoint has been forced to an absolute time (see
    /// [`Stn::assign_timepoint`]). Latched `true` forever after
    /// [`Stn::execute_edge`] marks the incoming edge executed.
    pub executed: bool,
}

impl TimepointNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            executed: false,
        }
    }
}

/// A directed distance-graph edge: `to - from <= weight`.
///
/// A temporal constraint `lb <= to - from <= ub` is represented as the pair
/// of edges `(from, to, ub)` and `(to, from, -lb)`; this is the classic
/// Dechter/Meiri/Pearl distance-graph encoding that makes consistency
/// checking and minimal-network computation a shortest-paths problem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgeWeight {
    pub weight: f64,
    pub executed: bool,
}

/// Simple Temporal Network: a directed graph of timepoints with `[lb, ub]`
/// distance constraints between them.
///
/// Node 0 is always the zero timepoint (ztp); all other times are expressed
/// as seconds-offsets relative to it. The graph is value-like and cheaply
/// deep-copyable (`Clone`), matching the STN engine's external contract.
#[derive(Debug, Clone)]
pub struct Stn {
    graph: StableGraph<TimepointNode, EdgeWeight, Directed>,
}

impl Default for Stn {
    fn default() -> Self {
        Self::new()
    }
}

impl Stn {
    /// Creates an empty STN containing only the zero timepoint.
    pub fn new() -> Self {
        let mut graph = StableGraph::default();
        let ztp = graph.add_node(TimepointNode::new(NodeKind::Ztp));
        debug_assert_eq!(ztp, ZTP);
        Self { graph }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains_node(&self, n: NodeIndex) -> bool {
        self.graph.contains_node(n)
    }

    pub fn node_kind(&self, n: NodeIndex) -> Option<NodeKind> {
        self.graph.node_weight(n).map(|t| t.kind)
    }

    pub fn is_executed(&self, n: NodeIndex) -> bool {
        self.graph
            .node_weight(n)
            .map(|t| t.executed)
            .unwrap_or(false)
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Adds a new timepoint with no constraints yet.
    pub fn add_timepoint(&mut self, kind: NodeKind) -> NodeIndex {
        self.graph.add_node(TimepointNode::new(kind))
    }

    /// Removes a timepoint and every edge touching it.
    pub fn remove_timepoint(&mut self, n: NodeIndex) {
        self.graph.remove_node(n);
    }

    /// Sets (or tightens, if already present) the constraint `lb <= to - from <= ub`.
    ///
    /// Repeated calls on the same pair intersect with any prior bound rather
    /// than overwriting it, matching the "tighten to the controllable
    /// window" semantics used when deriving a dispatchable graph.
    pub fn set_constraint(&mut self, from: NodeIndex, to: NodeIndex, lb: f64, ub: f64) {
        upsert_edge(&mut self.graph, from, to, ub);
        upsert_edge(&mut self.graph, to, from, -lb);
    }

    /// Reads back the current `[lb, ub]` bound between `from` and `to`, if any
    /// constraint has been recorded in either direction.
    pub fn constraint(&self, from: NodeIndex, to: NodeIndex) -> Option<(f64, f64)> {
        let ub = find_edge_weight(&self.graph, from, to);
        let lb = find_edge_weight(&self.graph, to, from).map(|w| -w);
        match (lb, ub) {
            (Some(lb), Some(ub)) => Some((lb, ub)),
            (Some(lb), None) => Some((lb, f64::INFINITY)),
            (None, Some(ub)) => Some((f64::NEG_INFINITY, ub)),
            (None, None) => None,
        }
    }

    /// Computes all-pairs shortest distances via a Floyd-Warshall-class
    /// closure. Returns `Err(StnError::NoSolution)` if a negative cycle
    /// (an inconsistency) is found.
    pub fn floyd_warshall(&self) -> Result<DistanceMatrix, StnError> {
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        let n = indices.len();
        let pos: HashMap<NodeIndex, usize> = indices.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut dist = vec![vec![f64::INFINITY; n]; n];
        for i in 0..n {
            dist[i][i] = 0.0;
        }
        for edge in self.graph.edge_indices() {
            let (a, b) = self.graph.edge_endpoints(edge).expect("edge index is valid");
            let w = self.graph[edge].weight;
            let i = pos[&a];
            let j = pos[&b];
            if w < dist[i][j] {
                dist[i][j] = w;
            }
        }

        for k in 0..n {
            for i in 0..n {
                if dist[i][k].is_infinite() {
                    continue;
                }
                for j in 0..n {
                    let via = dist[i][k] + dist[k][j];
                    if via < dist[i][j] {
                        dist[i][j] = via;
                    }
                }
            }
        }

        for i in 0..n {
            if dist[i][i] < 0.0 {
                return Err(StnError::NoSolution);
            }
        }

        Ok(DistanceMatrix { indices, pos, dist })
    }

    pub fn is_consistent(&self) -> bool {
        self.floyd_warshall().is_ok()
    }

    /// Computes the dispatchable graph: a new STN with the same node set,
    /// each recorded constraint tightened to its minimal (controllable)
    /// window, plus an explicit bound from the zero timepoint to every node
    /// so `get_time` never needs more than one lookup.
    pub fn minimal_network(&self) -> Result<Stn, StnError> {
        let dm = self.floyd_warshall()?;
        let mut out = self.clone();

        // Tighten every originally-constrained pair.
        for edge in self.graph.edge_indices() {
            let (a, b) = self.graph.edge_endpoints(edge).expect("edge index is valid");
            let (lb, ub) = (dm.distance(b, a).map(|d| -d), dm.distance(a, b));
            if let (Some(lb), Some(ub)) = (lb, ub) {
                out.set_constraint_exact(a, b, lb, ub);
            }
        }
        // Make sure every node has a direct, tight bound to the ztp.
        for &n in &dm.indices {
            if n == ZTP {
                continue;
            }
            if let (Some(earliest), Some(latest)) = (
                dm.distance(n, ZTP).map(|d| -d),
                dm.distance(ZTP, n),
            ) {
                out.set_constraint_exact(ZTP, n, earliest, latest);
            }
        }
        Ok(out)
    }

    /// Like [`set_constraint`](Self::set_constraint) but replaces the bound
    /// outright instead of intersecting with any prior one. Used internally
    /// when writing a freshly solved minimal network.
    fn set_constraint_exact(&mut self, from: NodeIndex, to: NodeIndex, lb: f64, ub: f64) {
        replace_edge(&mut self.graph, from, to, ub);
        replace_edge(&mut self.graph, to, from, -lb);
    }

    /// Earliest (or, if `lower_bound` is false, latest) time of `n` relative
    /// to the zero timepoint, computed from this graph (intended to be
    /// called on a dispatchable graph).
    pub fn get_time(&self, n: NodeIndex, lower_bound: bool) -> Result<f64, StnError> {
        if n == ZTP {
            return Ok(0.0);
        }
        let ub = find_edge_weight(&self.graph, ZTP, n);
        let lb = find_edge_weight(&self.graph, n, ZTP).map(|w| -w);
        match (lower_bound, lb, ub) {
            (true, Some(lb), _) => Ok(lb),
            (false, _, Some(ub)) => Ok(ub),
            _ => Err(StnError::InvalidNode(n)),
        }
    }

    /// Forces timepoint `n` to absolute time `t` (relative to the ztp).
    ///
    /// This mutates a clone's constraint and is meant to be probed via
    /// [`is_consistent`](Self::is_consistent) before being committed to the
    /// real STN (`force = true` means "override the existing window", not
    /// "skip the consistency check" — the caller is responsible for that,
    /// matching the STN engine's external contract in the spec).
    pub fn assign_timepoint(&mut self, n: NodeIndex, t: f64) {
        self.set_constraint_exact(ZTP, n, t, t);
    }

    /// Marks the edge `from -> to` (and its paired reverse edge) executed,
    /// latching both endpoints' visited state. Does not remove anything —
    /// garbage collection of history is a timetable-level operation.
    pub fn execute_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        set_executed(&mut self.graph, from, to, true);
        set_executed(&mut self.graph, to, from, true);
        if let Some(node) = self.graph.node_weight_mut(from) {
            node.executed = true;
        }
        if let Some(node) = self.graph.node_weight_mut(to) {
            node.executed = true;
        }
    }

    /// Builds a copy containing only `keep` (which must include the zero
    /// timepoint for callers that care about ztp-relative bounds) and the
    /// edges directly recorded between pairs of kept nodes. Node indices are
    /// preserved, so a receiver re-parsing the resulting wire form doesn't
    /// need to know which nodes were dropped.
    pub fn subgraph(&self, keep: &[NodeIndex]) -> Stn {
        let keep: HashSet<NodeIndex> = keep.iter().copied().collect();
        let mut out = self.clone();
        let drop: Vec<NodeIndex> = out.graph.node_indices().filter(|n| !keep.contains(n)).collect();
        for n in drop {
            out.graph.remove_node(n);
        }
        out
    }

    pub fn to_wire(&self) -> super::wire::StnDict {
        super::wire::StnDict::from_stn(self)
    }

    pub fn from_wire(dict: &super::wire::StnDict) -> Self {
        dict.to_stn()
    }

    pub(crate) fn graph(&self) -> &StableGraph<TimepointNode, EdgeWeight, Directed> {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut StableGraph<TimepointNode, EdgeWeight, Directed> {
        &mut self.graph
    }
}

/// All-pairs shortest distance closure of an [`Stn`], as computed by
/// [`Stn::floyd_warshall`].
pub struct DistanceMatrix {
    indices: Vec<NodeIndex>,
    pos: HashMap<NodeIndex, usize>,
    dist: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    pub fn distance(&self, from: NodeIndex, to: NodeIndex) -> Option<f64> {
        let i = *self.pos.get(&from)?;
        let j = *self.pos.get(&to)?;
        let d = self.dist[i][j];
        if d.is_finite() {
            Some(d)
        } else {
            None
        }
    }
}

fn upsert_edge(
    graph: &mut StableGraph<TimepointNode, EdgeWeight, Directed>,
    from: NodeIndex,
    to: NodeIndex,
    weight: f64,
) {
    if let Some(edge) = graph.find_edge(from, to) {
        let current = graph[edge].weight;
        if weight < current {
            graph[edge].weight = weight;
        }
    } else {
        graph.add_edge(from, to, EdgeWeight { weight, executed: false });
    }
}

fn replace_edge(
    graph: &mut StableGraph<TimepointNode, EdgeWeight, Directed>,
    from: NodeIndex,
    to: NodeIndex,
    weight: f64,
) {
    if let Some(edge) = graph.find_edge(from, to) {
        graph[edge].weight = weight;
    } else {
        graph.add_edge(from, to, EdgeWeight { weight, executed: false });
    }
}

fn set_executed(
    graph: &mut StableGraph<TimepointNode, EdgeWeight, Directed>,
    from: NodeIndex,
    to: NodeIndex,
    executed: bool,
) {
    if let Some(edge) = graph.find_edge(from, to) {
        graph[edge].executed = executed;
    }
}

fn find_edge_weight(
    graph: &StableGraph<TimepointNode, EdgeWeight, Directed>,
    from: NodeIndex,
    to: NodeIndex,
) -> Option<f64> {
    graph.find_edge(from, to).map(|e| graph[e].weight)
}
