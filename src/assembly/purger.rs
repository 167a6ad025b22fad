//! Graph error purger abstraction shared by tip and bubble removal

use crate::assembly::graph::DeBruijnGraph;
use crate::core::data_structures::NodeId;
use std::collections::BTreeSet;
use tracing::debug;

/// Ordered run of node handles found by a purger
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeBruijnPath {
    pub nodes: Vec<NodeId>,
}

impl DeBruijnPath {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Mean k-mer coverage over the path
    pub fn average_coverage(&self, graph: &DeBruijnGraph) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let total: u64 = self
            .nodes
            .iter()
            .map(|&id| u64::from(graph.node(id).count()))
            .sum();
        total as f64 / self.nodes.len() as f64
    }
}

/// Detect-and-remove strategy over the graph.
///
/// Implementations only read the graph while detecting, so detection may run
/// in parallel; removal happens afterwards on the single mutable owner.
pub trait GraphErrorPurger: Send + Sync {
    fn name(&self) -> &'static str;

    fn length_threshold(&self) -> usize;

    fn set_length_threshold(&mut self, threshold: usize);

    fn detect_erroneous_nodes(&self, graph: &DeBruijnGraph) -> Vec<DeBruijnPath>;

    /// Remove the detected paths, returning the number of nodes deleted
    fn remove_erroneous_nodes(&self, graph: &mut DeBruijnGraph, paths: &[DeBruijnPath]) -> usize;

    /// Purgers that can also erode low-coverage graph ends expose it here
    fn as_eroder(&self) -> Option<&dyn GraphEndsEroder> {
        None
    }

    /// Run detect/remove rounds at `threshold` until a round finds nothing.
    ///
    /// Returns the total number of nodes removed.
    fn clean(&mut self, graph: &mut DeBruijnGraph, threshold: usize) -> usize {
        self.set_length_threshold(threshold);
        let mut removed = 0;
        loop {
            let paths = self.detect_erroneous_nodes(graph);
            if paths.is_empty() {
                break;
            }
            let round = self.remove_erroneous_nodes(graph, &paths);
            debug!(
                "{}: removed {} nodes from {} paths",
                self.name(),
                round,
                paths.len()
            );
            removed += round;
            if round == 0 {
                break;
            }
        }
        removed
    }
}

/// Deletes graph end points whose coverage is below a threshold
pub trait GraphEndsEroder: Send + Sync {
    /// Erode until no end point is below `erosion_threshold`, returning the
    /// distinct tip lengths observed from the surviving end points
    fn erode_graph_ends(&self, graph: &mut DeBruijnGraph, erosion_threshold: usize) -> BTreeSet<usize>;
}
