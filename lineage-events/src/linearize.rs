//! Graph linearization
//!
//! Converts the lineage DAG into full tracks: maximal linear node sequences
//! rooted at nodes without predecessor. A division copies the common prefix
//! (up to and including the dividing node) into a new track for every
//! daughter after the first; the first daughter continues the current track.
//!
//! Nodes are claimed globally: the first start node (in frame order) that
//! reaches a node owns it, later traversals skip it. The walk uses an explicit
//! stack so track length is bounded only by `max_track_length`.

use crate::graph::{self, TrackingGraph};
use crate::types::{EventError, NodeId, Result};
use std::collections::{BTreeMap, HashSet};

/// Full tracks collected from one start node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootTracks {
    /// Linear node sequences, each starting at the root
    pub full_tracks: Vec<Vec<NodeId>>,
    /// Index of the last branch opened during the walk
    pub current_branch: usize,
}

/// One pending node of the depth-first walk
struct Frame {
    node: NodeId,
    branch: usize,
    /// Length of `branch` right after `node` was appended
    prefix_len: usize,
    next_edge: usize,
    /// Out-edges of `node` already taken (tail was unclaimed)
    taken: usize,
}

/// Linearize a whole graph
///
/// Start nodes are processed by ascending `(frame, object_id)`.
pub fn linearize<G: TrackingGraph + ?Sized>(
    graph: &G,
    max_track_length: usize,
) -> Result<BTreeMap<NodeId, RootTracks>> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut roots = BTreeMap::new();

    for start in graph::start_nodes(graph) {
        if !visited.insert(start) {
            continue;
        }
        let tracks = linearize_from(graph, start, &mut visited, max_track_length)?;
        log::trace!("Root {}: {} full tracks", start, tracks.full_tracks.len());
        roots.insert(start, tracks);
    }

    Ok(roots)
}

/// Walk from one start node, claiming nodes in the shared visited set
pub fn linearize_from<G: TrackingGraph + ?Sized>(
    graph: &G,
    start: NodeId,
    visited: &mut HashSet<NodeId>,
    max_track_length: usize,
) -> Result<RootTracks> {
    let mut tracks: Vec<Vec<NodeId>> = vec![vec![start]];
    let mut base = 0;
    let mut stack = vec![Frame {
        node: start,
        branch: 0,
        prefix_len: 1,
        next_edge: 0,
        taken: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let edges = graph.out_edges(frame.node);
        if frame.next_edge >= edges.len() {
            stack.pop();
            continue;
        }

        let tail = graph.tail(edges[frame.next_edge]);
        frame.next_edge += 1;
        if !visited.insert(tail) {
            // Lineages should not merge; the first walk to arrive keeps the node
            log::warn!("Merge at {}: already claimed, skipped from {}", tail, frame.node);
            continue;
        }

        let branch = if frame.taken == 0 {
            frame.branch
        } else {
            let prefix = tracks[frame.branch][..frame.prefix_len].to_vec();
            tracks.push(prefix);
            base += 1;
            tracks.len() - 1
        };
        frame.taken += 1;

        let track = &mut tracks[branch];
        track.push(tail);
        if track.len() > max_track_length {
            return Err(EventError::TrackTooLong {
                start,
                limit: max_track_length,
            });
        }

        let prefix_len = track.len();
        stack.push(Frame {
            node: tail,
            branch,
            prefix_len,
            next_edge: 0,
            taken: 0,
        });
    }

    Ok(RootTracks {
        full_tracks: tracks,
        current_branch: base,
    })
}
