//! Tip (dangling link) detection and removal, plus low-coverage end erosion

use crate::assembly::graph::{DeBruijnGraph, Side};
use crate::assembly::purger::{DeBruijnPath, GraphEndsEroder, GraphErrorPurger};
use crate::core::data_structures::NodeId;
use ahash::AHashSet;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

enum LinkStep {
    Added,
    /// Node already on the link: a loop closes the walk
    Loop,
    /// Link reached the length threshold: not a tip
    TooLong,
}

/// Removes dead-end paths no longer than `length_threshold` nodes
#[derive(Debug, Clone)]
pub struct DanglingLinksPurger {
    length_threshold: usize,
}

impl DanglingLinksPurger {
    pub fn new(length_threshold: usize) -> Self {
        Self { length_threshold }
    }

    fn check_and_add(&self, link: &mut Vec<NodeId>, node: NodeId) -> LinkStep {
        if link.contains(&node) {
            return LinkStep::Loop;
        }
        if link.len() >= self.length_threshold {
            return LinkStep::TooLong;
        }
        link.push(node);
        LinkStep::Added
    }

    /// Walk from an end point towards the body of the graph.
    ///
    /// Returns the nodes of the tip ordered from the free end inwards, or
    /// `None` when the walk runs past the length threshold.
    fn trace_dangling_link(
        &self,
        graph: &DeBruijnGraph,
        forward: bool,
        start: NodeId,
    ) -> Option<Vec<NodeId>> {
        let mut link = Vec::new();
        let mut node = start;
        let mut same_orientation = true;

        loop {
            let current = graph.node(node);
            let walk_side = if forward ^ same_orientation {
                Side::Left
            } else {
                Side::Right
            };
            let same_count = current.extension_count(walk_side);
            let opposite_count = current.extension_count(walk_side.opposite());

            if same_count == 0 {
                // other end of a free-standing path
                return match self.check_and_add(&mut link, node) {
                    LinkStep::TooLong => None,
                    _ => Some(link),
                };
            }

            if opposite_count > 1 {
                // junction reached from a branch: keep it
                return Some(link);
            }

            if same_count > 1 {
                return match self.check_and_add(&mut link, node) {
                    LinkStep::TooLong => None,
                    _ => Some(link),
                };
            }

            match self.check_and_add(&mut link, node) {
                LinkStep::Added => {}
                LinkStep::Loop => return Some(link),
                LinkStep::TooLong => return None,
            }

            let next = current.extensions(walk_side)[0];
            node = next.target;
            same_orientation = !(same_orientation ^ next.same_orientation);
        }
    }

    fn tip_from(&self, graph: &DeBruijnGraph, id: NodeId) -> Option<DeBruijnPath> {
        let node = graph.node(id);
        let link = if node.total_extension_count() == 0 {
            let mut link = Vec::new();
            match self.check_and_add(&mut link, id) {
                LinkStep::TooLong => None,
                _ => Some(link),
            }
        } else if node.right_extension_count() == 0 {
            self.trace_dangling_link(graph, false, id)
        } else if node.left_extension_count() == 0 {
            self.trace_dangling_link(graph, true, id)
        } else {
            None
        };

        link.filter(|nodes| !nodes.is_empty())
            .map(DeBruijnPath::new)
    }
}

impl GraphErrorPurger for DanglingLinksPurger {
    fn name(&self) -> &'static str {
        "dangling links purger"
    }

    fn length_threshold(&self) -> usize {
        self.length_threshold
    }

    fn set_length_threshold(&mut self, threshold: usize) {
        self.length_threshold = threshold;
    }

    fn detect_erroneous_nodes(&self, graph: &DeBruijnGraph) -> Vec<DeBruijnPath> {
        graph
            .live_node_ids()
            .into_par_iter()
            .filter_map(|id| self.tip_from(graph, id))
            .collect()
    }

    fn remove_erroneous_nodes(&self, graph: &mut DeBruijnGraph, paths: &[DeBruijnPath]) -> usize {
        // Only the inner end of a tip can touch the rest of the graph
        let last_nodes: AHashSet<NodeId> = paths.iter().filter_map(DeBruijnPath::last).collect();
        for path in paths {
            if let Some(last) = path.last() {
                graph.detach(last, &last_nodes);
            }
        }
        graph.remove_nodes(paths.iter().flat_map(|path| path.nodes.iter().copied()))
    }

    fn as_eroder(&self) -> Option<&dyn GraphEndsEroder> {
        Some(self)
    }
}

impl GraphEndsEroder for DanglingLinksPurger {
    /// Delete low-coverage end points until none remain.
    ///
    /// An end point is a node with no extensions on at least one side. Every
    /// scan also records the lengths of tips seen from surviving end points;
    /// those lengths are returned in ascending order.
    fn erode_graph_ends(&self, graph: &mut DeBruijnGraph, erosion_threshold: usize) -> BTreeSet<usize> {
        let mut lengths = BTreeSet::new();
        let mut total_eroded = 0;

        loop {
            let ids = graph.live_node_ids();
            let scan: Vec<(NodeId, Option<usize>)> = {
                let graph = &*graph;
                ids.into_par_iter()
                    .filter_map(|id| {
                        let node = graph.node(id);
                        let is_end = node.left_extension_count() == 0
                            || node.right_extension_count() == 0;
                        if !is_end {
                            return None;
                        }
                        if usize::from(node.count()) < erosion_threshold {
                            return Some((id, None));
                        }
                        self.tip_from(graph, id).map(|path| (id, Some(path.len())))
                    })
                    .collect()
            };

            let mut eroded: Vec<NodeId> = Vec::new();
            for (id, length) in scan {
                match length {
                    Some(length) => {
                        lengths.insert(length);
                    }
                    None => eroded.push(id),
                }
            }

            if eroded.is_empty() {
                break;
            }

            let eroded_set: AHashSet<NodeId> = eroded.iter().copied().collect();
            for &id in &eroded {
                graph.detach(id, &eroded_set);
            }
            total_eroded += graph.remove_nodes(eroded);
        }

        debug!(
            "Eroded {} low-coverage end nodes below coverage {}",
            total_eroded, erosion_threshold
        );
        lengths
    }
}
