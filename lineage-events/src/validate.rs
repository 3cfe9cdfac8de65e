//! Window validation around a transition
//!
//! Two independent walks start from a transition candidate: the backward walk
//! climbs predecessors from the transition node, the forward walk descends
//! successors from the first node after the label change. Both walks count
//! levels from 1 and stop as soon as their range policy is satisfied. Every
//! intermediate node has to respect the degree and label constraints of the
//! configuration, otherwise the candidate is rejected.
//!
//! A division inside the forward window forks the walk: each daughter is
//! walked separately and recorded as a [`Branch`] of a [`PathEntry::Split`].
//! All daughters are recorded; the policy only decides the verdict.

use crate::config::{SelectionConfig, UNBOUNDED};
use crate::graph::TrackingGraph;
use crate::types::{Label, NodeId};
use std::collections::BTreeSet;

/// One element of a forward path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEntry {
    Node(NodeId),
    /// Daughter branches after a division, in edge order
    Split(Vec<Branch>),
}

/// Forward path of one daughter after a division
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub entries: Vec<PathEntry>,
    /// The walk along this daughter satisfied the range policy
    pub complete: bool,
}

impl Branch {
    /// Node ids of the branch in order
    pub fn nodes(&self) -> Vec<NodeId> {
        flatten(&self.entries)
    }
}

/// Node ids of a path, ignoring split markers
pub fn flatten(entries: &[PathEntry]) -> Vec<NodeId> {
    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            PathEntry::Node(id) => nodes.push(*id),
            PathEntry::Split(branches) => {
                // Only the first daughter continues a flat reading
                if let Some(first) = branches.first() {
                    nodes.extend(first.nodes());
                }
            }
        }
    }
    nodes
}

/// Applies the configured window constraints to a candidate
pub struct WindowValidator<'a, G: TrackingGraph + ?Sized> {
    graph: &'a G,
    config: &'a SelectionConfig,
}

impl<'a, G: TrackingGraph + ?Sized> WindowValidator<'a, G> {
    pub fn new(graph: &'a G, config: &'a SelectionConfig) -> Self {
        Self { graph, config }
    }

    /// Walk backward from the transition node
    ///
    /// Returns the nodes in walking order (transition node first), or `None`
    /// if a constraint fails before the range policy is satisfied.
    pub fn backward(&self, start: NodeId) -> Option<Vec<NodeId>> {
        let config = self.config;
        let mut acc = Vec::new();
        let mut node = start;
        let mut level: usize = 1;

        loop {
            acc.push(node);
            let in_degree = self.graph.in_degree(node);
            let out_degree = self.graph.out_degree(node);

            if range_satisfied(config.backward_range, config.backward_range_min, level, in_degree) {
                return Some(acc);
            }

            if out_degree != 1 || in_degree != 1 {
                log::trace!(
                    "Backward walk from {} stopped at {} (out {}, in {})",
                    start,
                    node,
                    out_degree,
                    in_degree
                );
                return None;
            }

            if level > 1
                && level - 1 <= config.backward_check
                && !label_allowed(&config.backward_labels, self.graph.label(node))
            {
                log::trace!("Backward walk from {} rejected label at {}", start, node);
                return None;
            }

            node = self.graph.head(self.graph.in_edges(node)[0]);
            level += 1;
        }
    }

    /// Walk forward from the first node after the transition
    ///
    /// Returns the recorded path and the verdict. The path is returned even
    /// on failure since a failing daughter is still recorded by its parent.
    pub fn forward(&self, start: NodeId) -> (Vec<PathEntry>, bool) {
        self.forward_from(start, 1, None)
    }

    fn forward_from(
        &self,
        start: NodeId,
        first_level: usize,
        found_split: Option<NodeId>,
    ) -> (Vec<PathEntry>, bool) {
        let config = self.config;
        let mut acc = Vec::new();
        let mut node = start;
        let mut level = first_level;

        loop {
            acc.push(PathEntry::Node(node));
            let in_degree = self.graph.in_degree(node);
            let out_degree = self.graph.out_degree(node);

            if range_satisfied(config.forward_range, config.forward_range_min, level, out_degree) {
                return (acc, true);
            }

            if in_degree > config.max_in_degree
                || out_degree > config.max_out_degree
                || out_degree == 0
            {
                log::trace!(
                    "Forward walk from {} stopped at {} (out {}, in {})",
                    start,
                    node,
                    out_degree,
                    in_degree
                );
                return (acc, false);
            }

            if level <= config.forward_check
                && !label_allowed(&config.forward_labels, self.graph.label(node))
            {
                log::trace!("Forward walk from {} rejected label at {}", start, node);
                return (acc, false);
            }

            let successors = self.graph.successors(node);
            if found_split.is_none() && successors.len() > 1 {
                log::trace!("Division at {} into {} daughters", node, successors.len());
                let branches: Vec<Branch> = successors
                    .into_iter()
                    .map(|daughter| {
                        let (entries, complete) =
                            self.forward_from(daughter, level + 1, Some(node));
                        Branch { entries, complete }
                    })
                    .collect();

                let verdict = if config.allow_one_daughter_cell {
                    branches.iter().any(|b| b.complete)
                } else {
                    branches.iter().all(|b| b.complete)
                };
                acc.push(PathEntry::Split(branches));
                return (acc, verdict);
            }

            // Past the first division only the first daughter is followed
            node = successors[0];
            level += 1;
        }
    }
}

/// Range termination policy shared by both walks
///
/// `boundary_degree` is the in-degree for the backward walk and the out-degree
/// for the forward walk; zero means the graph boundary is reached.
fn range_satisfied(range: i64, range_min: bool, level: usize, boundary_degree: usize) -> bool {
    if range == UNBOUNDED {
        return boundary_degree == 0;
    }
    let reached = level as i64 >= range;
    if range_min {
        reached && boundary_degree == 0
    } else {
        reached
    }
}

fn label_allowed(allowed: &BTreeSet<Label>, label: Option<Label>) -> bool {
    label.map_or(false, |l| allowed.contains(&l))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LineageGraph;
    use crate::types::ObjectData;

    fn n(frame: u32, object_id: u32) -> NodeId {
        NodeId::new(frame, object_id)
    }

    /// Linear chain 0_1 .. (len-1)_1 with the given labels
    fn chain(labels: &[Label]) -> (LineageGraph, Vec<NodeId>) {
        let mut graph = LineageGraph::new();
        let ids: Vec<NodeId> = (0..labels.len() as u32).map(|f| n(f, 1)).collect();
        for (id, label) in ids.iter().zip(labels) {
            graph.add_node(*id, ObjectData::labeled(*label));
        }
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        (graph, ids)
    }

    fn nodes(entries: &[PathEntry]) -> Vec<NodeId> {
        flatten(entries)
    }

    #[test]
    fn test_backward_fixed_range() {
        let (graph, ids) = chain(&[0, 0, 0, 1, 1]);
        let config = SelectionConfig::new().add_transition(0, 1).with_ranges(2, 2);
        let validator = WindowValidator::new(&graph, &config);

        assert_eq!(validator.backward(ids[2]), Some(vec![ids[2], ids[1]]));
    }

    #[test]
    fn test_backward_hits_root_too_early() {
        let (graph, ids) = chain(&[0, 0, 1, 1]);
        let config = SelectionConfig::new().add_transition(0, 1).with_ranges(4, 1);
        let validator = WindowValidator::new(&graph, &config);

        assert_eq!(validator.backward(ids[1]), None);
    }

    #[test]
    fn test_backward_unbounded_stops_at_root() {
        let (graph, ids) = chain(&[0, 0, 0, 0, 1]);
        let config = SelectionConfig::new().add_transition(0, 1).with_ranges(-1, 1);
        let validator = WindowValidator::new(&graph, &config);

        let acc = validator.backward(ids[3]).unwrap();
        assert_eq!(acc, vec![ids[3], ids[2], ids[1], ids[0]]);
        assert_eq!(graph.in_degree(*acc.last().unwrap()), 0);
    }

    #[test]
    fn test_backward_min_range_continues_to_root() {
        let (graph, ids) = chain(&[0, 0, 0, 0, 0, 1]);
        let config = SelectionConfig::new()
            .add_transition(0, 1)
            .with_ranges(2, 1)
            .with_range_min(true, false);
        let validator = WindowValidator::new(&graph, &config);

        assert_eq!(validator.backward(ids[4]).map(|acc| acc.len()), Some(5));
    }

    #[test]
    fn test_backward_label_check_skips_transition_node() {
        // Labels: 2 (outside window), 0, 0 (transition node), then 1
        let (graph, ids) = chain(&[2, 0, 0, 1]);
        let base = SelectionConfig::new().add_transition(0, 1).with_ranges(3, 1);

        // Levels 2 and 3 checked: 0_1 (label 0) passes, level 3 is terminal and never checked
        let config = base.clone().with_backward_labels([0], 2);
        assert!(WindowValidator::new(&graph, &config).backward(ids[2]).is_some());

        // Only label 5 allowed: level 2 fails
        let config = base.with_backward_labels([5], 1);
        assert!(WindowValidator::new(&graph, &config).backward(ids[2]).is_none());
    }

    #[test]
    fn test_forward_fixed_range() {
        let (graph, ids) = chain(&[0, 1, 1, 1, 1]);
        let config = SelectionConfig::new().add_transition(0, 1).with_ranges(1, 3);
        let validator = WindowValidator::new(&graph, &config);

        let (acc, ok) = validator.forward(ids[1]);
        assert!(ok);
        assert_eq!(nodes(&acc), vec![ids[1], ids[2], ids[3]]);
    }

    #[test]
    fn test_forward_lineage_ends_early() {
        let (graph, ids) = chain(&[0, 1, 1]);
        let config = SelectionConfig::new().add_transition(0, 1).with_ranges(1, 5);
        let validator = WindowValidator::new(&graph, &config);

        let (acc, ok) = validator.forward(ids[1]);
        assert!(!ok);
        assert_eq!(nodes(&acc), vec![ids[1], ids[2]]);
    }

    #[test]
    fn test_forward_unbounded_stops_at_lineage_end() {
        let (graph, ids) = chain(&[0, 1, 1, 1, 1, 1, 1]);
        let config = SelectionConfig::new().add_transition(0, 1).with_ranges(2, -1);
        let validator = WindowValidator::new(&graph, &config);

        let (acc, ok) = validator.forward(ids[1]);
        assert!(ok);
        assert_eq!(nodes(&acc), ids[1..].to_vec());
        assert_eq!(graph.out_degree(ids[6]), 0);
    }

    #[test]
    fn test_forward_min_range_continues_to_lineage_end() {
        let (graph, ids) = chain(&[0, 1, 1, 1, 1, 1, 1]);
        let base = SelectionConfig::new().add_transition(0, 1).with_ranges(2, 2);

        let (acc, ok) = WindowValidator::new(&graph, &base).forward(ids[1]);
        assert!(ok);
        assert_eq!(nodes(&acc), vec![ids[1], ids[2]]);

        let config = base.with_range_min(false, true);
        let (acc, ok) = WindowValidator::new(&graph, &config).forward(ids[1]);
        assert!(ok);
        assert_eq!(nodes(&acc), ids[1..].to_vec());
    }

    #[test]
    fn test_forward_merge_rejected_by_in_degree() {
        // 0_1 -> 1_1 -> 2_1 -> 3_1 -> 4_1, with 2_2 merging into 3_1
        let (mut graph, ids) = chain(&[0, 1, 1, 1, 1]);
        graph.add_node(n(2, 2), ObjectData::labeled(1));
        graph.add_edge(n(2, 2), ids[3]).unwrap();
        let base = SelectionConfig::new().add_transition(0, 1).with_ranges(1, 4);

        let (acc, ok) = WindowValidator::new(&graph, &base).forward(ids[1]);
        assert!(!ok);
        assert_eq!(nodes(&acc), vec![ids[1], ids[2], ids[3]]);

        let config = base.with_max_degrees(2, 1);
        let (acc, ok) = WindowValidator::new(&graph, &config).forward(ids[1]);
        assert!(ok);
        assert_eq!(nodes(&acc), ids[1..].to_vec());
    }

    #[test]
    fn test_forward_label_window() {
        let (graph, ids) = chain(&[0, 1, 2, 1, 1]);
        let base = SelectionConfig::new().add_transition(0, 1).with_ranges(1, 4);

        let config = base.clone().with_forward_labels([1], 1);
        assert!(WindowValidator::new(&graph, &config).forward(ids[1]).1);

        let config = base.with_forward_labels([1], 2);
        assert!(!WindowValidator::new(&graph, &config).forward(ids[1]).1);
    }

    /// 0_1 -> 1_1 -> 2_1 -> {3_1, 3_2}, 3_1 -> 4_1, 3_2 -> 4_2 -> 5_2
    fn dividing() -> LineageGraph {
        let mut graph = LineageGraph::new();
        graph.add_node(n(0, 1), ObjectData::labeled(0));
        for id in [n(1, 1), n(2, 1), n(3, 1), n(3, 2), n(4, 1), n(4, 2), n(5, 2)] {
            graph.add_node(id, ObjectData::labeled(1));
        }
        for (h, t) in [
            (n(0, 1), n(1, 1)),
            (n(1, 1), n(2, 1)),
            (n(2, 1), n(3, 1)),
            (n(2, 1), n(3, 2)),
            (n(3, 1), n(4, 1)),
            (n(3, 2), n(4, 2)),
            (n(4, 2), n(5, 2)),
        ] {
            graph.add_edge(h, t).unwrap();
        }
        graph
    }

    #[test]
    fn test_forward_division_rejected_by_degree() {
        let graph = dividing();
        let config = SelectionConfig::new().add_transition(0, 1).with_ranges(1, 4);
        let validator = WindowValidator::new(&graph, &config);

        let (acc, ok) = validator.forward(n(1, 1));
        assert!(!ok);
        assert!(acc.iter().all(|e| matches!(e, PathEntry::Node(_))));
    }

    #[test]
    fn test_forward_division_records_both_daughters() {
        let graph = dividing();
        let config = SelectionConfig::new()
            .add_transition(0, 1)
            .with_ranges(1, 4)
            .with_max_degrees(1, 2);

        let (acc, ok) = WindowValidator::new(&graph, &config).forward(n(1, 1));
        assert!(ok);
        assert_eq!(acc.len(), 3);
        match &acc[2] {
            PathEntry::Split(branches) => {
                assert_eq!(branches.len(), 2);
                // 3_1 ends at 4_1 (level 4): complete
                assert_eq!(branches[0].nodes(), vec![n(3, 1), n(4, 1)]);
                assert!(branches[0].complete);
                assert_eq!(branches[1].nodes(), vec![n(3, 2), n(4, 2)]);
                assert!(branches[1].complete);
            }
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_division_daughter_policy() {
        let graph = dividing();
        // Range 5 is only reachable through 3_2 -> 4_2 -> 5_2
        let lenient = SelectionConfig::new()
            .add_transition(0, 1)
            .with_ranges(1, 5)
            .with_max_degrees(1, 2);
        let strict = lenient.clone().with_one_daughter_cell(false);

        let (acc, ok) = WindowValidator::new(&graph, &lenient).forward(n(1, 1));
        assert!(ok);
        let (strict_acc, strict_ok) = WindowValidator::new(&graph, &strict).forward(n(1, 1));
        assert!(!strict_ok);

        // Both daughters recorded regardless of the policy
        assert_eq!(acc, strict_acc);
        match &acc[2] {
            PathEntry::Split(branches) => {
                assert!(!branches[0].complete);
                assert!(branches[1].complete);
            }
            other => panic!("expected split, got {:?}", other),
        }
    }
}
