//! Transition scanning
//!
//! Walks a linearized track looking for nodes whose successor carries a label
//! that, together with the node's own label, forms a registered transition.

use crate::graph::TrackingGraph;
use crate::types::{Label, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered `(from, to)` label pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub from: Label,
    pub to: Label,
}

impl Transition {
    pub fn new(from: Label, to: Label) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Ordered set of transitions, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionSet {
    pairs: Vec<Transition>,
}

impl TransitionSet {
    pub fn new(pairs: Vec<Transition>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[Transition] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// First configured pair matching the two labels
    pub fn matching(&self, from: Option<Label>, to: Option<Label>) -> Option<Transition> {
        let (from, to) = (from?, to?);
        self.pairs
            .iter()
            .copied()
            .find(|t| t.from == from && t.to == to)
    }
}

impl FromIterator<Transition> for TransitionSet {
    fn from_iter<I: IntoIterator<Item = Transition>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A node at which a registered transition occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Last node before the label change
    pub node: NodeId,
    /// Its single successor, first node after the label change
    pub successor: NodeId,
    pub transition: Transition,
}

/// Finds transition candidates along linear tracks
pub struct TransitionScanner<'a> {
    transitions: &'a TransitionSet,
}

impl<'a> TransitionScanner<'a> {
    pub fn new(transitions: &'a TransitionSet) -> Self {
        Self { transitions }
    }

    /// Check whether `node` is a transition candidate
    ///
    /// Only pass-through nodes `(out 1, in 1)` and starts feeding one
    /// successor `(out 1, in 0)` qualify; everything else is skipped silently.
    pub fn candidate_at<G: TrackingGraph + ?Sized>(
        &self,
        graph: &G,
        node: NodeId,
    ) -> Option<Candidate> {
        match (graph.out_degree(node), graph.in_degree(node)) {
            (1, 1) | (1, 0) => {}
            _ => return None,
        }

        let successor = graph.tail(graph.out_edges(node)[0]);
        self.transitions
            .matching(graph.label(node), graph.label(successor))
            .map(|transition| Candidate {
                node,
                successor,
                transition,
            })
    }

    /// Scan one track, handing every candidate to `on_candidate`
    ///
    /// The callback returns the length of the emitted window on success. The
    /// index then jumps by `length - 1` so overlapping detections of the same
    /// event along this branch are skipped; otherwise it advances by one.
    pub fn scan<G, F>(&self, graph: &G, track: &[NodeId], mut on_candidate: F) -> usize
    where
        G: TrackingGraph + ?Sized,
        F: FnMut(Candidate) -> Option<usize>,
    {
        let mut found = 0;
        let mut idx = 0;
        while idx < track.len() {
            let step = match self.candidate_at(graph, track[idx]) {
                Some(candidate) => {
                    found += 1;
                    log::trace!("Candidate {} at {}", candidate.transition, candidate.node);
                    match on_candidate(candidate) {
                        Some(window_len) => window_len.saturating_sub(1).max(1),
                        None => 1,
                    }
                }
                None => 1,
            };
            idx += step;
        }
        found
    }
}
