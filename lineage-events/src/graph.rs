//! Tracking graph boundary
//!
//! The tracker hands the engine a directed acyclic graph whose nodes are
//! classified objects and whose edges link an object to its successor(s) in
//! the next frame(s). The engine only ever reads adjacency and labels, through
//! the [`TrackingGraph`] trait. [`LineageGraph`] is the in-memory
//! implementation used by the application layer and by tests.

use crate::types::{EdgeId, EventError, Label, NodeId, ObjectData, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Read-only adjacency oracle over a lineage graph
///
/// Edge lists are returned in a stable order; every traversal in the engine
/// uses that order as its tie-break. Unknown nodes behave as isolated nodes.
pub trait TrackingGraph {
    /// All nodes of the graph
    fn node_list(&self) -> Vec<NodeId>;

    /// Incoming edges of a node
    fn in_edges(&self, node: NodeId) -> &[EdgeId];

    /// Outgoing edges of a node
    fn out_edges(&self, node: NodeId) -> &[EdgeId];

    /// Earlier-frame endpoint of an edge
    fn head(&self, edge: EdgeId) -> NodeId;

    /// Later-frame endpoint of an edge
    fn tail(&self, edge: EdgeId) -> NodeId;

    /// Payload attached to a node
    fn node_data(&self, node: NodeId) -> Option<&ObjectData>;

    fn in_degree(&self, node: NodeId) -> usize {
        self.in_edges(node).len()
    }

    fn out_degree(&self, node: NodeId) -> usize {
        self.out_edges(node).len()
    }

    /// Classification label of a node (`None` if unlabeled or unknown)
    fn label(&self, node: NodeId) -> Option<Label> {
        self.node_data(node).and_then(|data| data.label)
    }

    /// Successor nodes in edge order
    fn successors(&self, node: NodeId) -> Vec<NodeId> {
        self.out_edges(node).iter().map(|&e| self.tail(e)).collect()
    }

    /// Predecessor nodes in edge order
    fn predecessors(&self, node: NodeId) -> Vec<NodeId> {
        self.in_edges(node).iter().map(|&e| self.head(e)).collect()
    }
}

#[derive(Debug, Clone, Default)]
struct NodeEntry {
    data: ObjectData,
    in_edges: Vec<EdgeId>,
    out_edges: Vec<EdgeId>,
}

/// In-memory lineage graph
///
/// Nodes keep insertion order, edges keep insertion order per node. Edges must
/// go strictly forward in time, so the graph is acyclic by construction.
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    /// Node ids in insertion order
    order: Vec<NodeId>,
    /// Node payload and adjacency by id
    nodes: HashMap<NodeId, NodeEntry>,
    /// (head, tail) per edge id
    edges: Vec<(NodeId, NodeId)>,
}

impl LineageGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its payload
    ///
    /// Re-adding an existing node replaces its payload and keeps its edges.
    pub fn add_node(&mut self, id: NodeId, data: ObjectData) {
        match self.nodes.get_mut(&id) {
            Some(entry) => entry.data = data,
            None => {
                self.order.push(id);
                self.nodes.insert(
                    id,
                    NodeEntry {
                        data,
                        ..NodeEntry::default()
                    },
                );
            }
        }
    }

    /// Add a directed edge `head -> tail`
    pub fn add_edge(&mut self, head: NodeId, tail: NodeId) -> Result<EdgeId> {
        if !self.nodes.contains_key(&head) {
            return Err(EventError::UnknownNode(head));
        }
        if !self.nodes.contains_key(&tail) {
            return Err(EventError::UnknownNode(tail));
        }
        if tail.frame <= head.frame {
            return Err(EventError::InvalidGraph(format!(
                "edge {} -> {} does not go forward in time",
                head, tail
            )));
        }
        if self.successors(head).contains(&tail) {
            return Err(EventError::InvalidGraph(format!(
                "duplicate edge {} -> {}",
                head, tail
            )));
        }

        let edge = EdgeId(self.edges.len());
        self.edges.push((head, tail));
        if let Some(entry) = self.nodes.get_mut(&head) {
            entry.out_edges.push(edge);
        }
        if let Some(entry) = self.nodes.get_mut(&tail) {
            entry.in_edges.push(edge);
        }
        Ok(edge)
    }

    /// Nodes without predecessor, sorted by frame then object id
    pub fn start_nodes(&self) -> Vec<NodeId> {
        start_nodes(self)
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Build a graph from a JSON graph document
    ///
    /// # Example
    /// ```
    /// use lineage_events::{LineageGraph, TrackingGraph};
    ///
    /// let graph = LineageGraph::from_json_str(r#"{
    ///     "nodes": [{"id": "0_1", "label": 0}, {"id": "1_1", "label": 1}],
    ///     "edges": [["0_1", "1_1"]]
    /// }"#).unwrap();
    /// assert_eq!(graph.node_count(), 2);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: GraphDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Load a graph from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        log::debug!("Loading tracking graph: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let graph = Self::from_json_str(&content)?;
        log::debug!(
            "Loaded {} nodes and {} edges from {:?}",
            graph.node_count(),
            graph.edge_count(),
            path
        );
        Ok(graph)
    }

    /// Build a graph from a deserialized graph document
    pub fn from_document(document: GraphDocument) -> Result<Self> {
        let mut graph = Self::new();
        for node in document.nodes {
            if graph.contains(node.id) {
                return Err(EventError::InvalidGraph(format!("duplicate node {}", node.id)));
            }
            graph.add_node(node.id, node.data);
        }
        for (head, tail) in document.edges {
            graph.add_edge(head, tail)?;
        }
        Ok(graph)
    }

    /// Convert the graph back into a serializable document
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self
                .order
                .iter()
                .map(|id| NodeRecord {
                    id: *id,
                    data: self.nodes[id].data.clone(),
                })
                .collect(),
            edges: self.edges.clone(),
        }
    }
}

impl TrackingGraph for LineageGraph {
    fn node_list(&self) -> Vec<NodeId> {
        self.order.clone()
    }

    fn in_edges(&self, node: NodeId) -> &[EdgeId] {
        self.nodes.get(&node).map(|e| e.in_edges.as_slice()).unwrap_or(&[])
    }

    fn out_edges(&self, node: NodeId) -> &[EdgeId] {
        self.nodes.get(&node).map(|e| e.out_edges.as_slice()).unwrap_or(&[])
    }

    fn head(&self, edge: EdgeId) -> NodeId {
        self.edges[edge.0].0
    }

    fn tail(&self, edge: EdgeId) -> NodeId {
        self.edges[edge.0].1
    }

    fn node_data(&self, node: NodeId) -> Option<&ObjectData> {
        self.nodes.get(&node).map(|e| &e.data)
    }
}

/// Nodes of any tracking graph with in-degree 0, sorted by frame then object id
pub fn start_nodes<G: TrackingGraph + ?Sized>(graph: &G) -> Vec<NodeId> {
    let mut starts: Vec<NodeId> = graph
        .node_list()
        .into_iter()
        .filter(|&n| graph.in_degree(n) == 0)
        .collect();
    starts.sort_unstable();
    starts
}

/// Serializable form of a lineage graph (the tracker's export format)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeRecord>,
    /// `[head, tail]` pairs
    #[serde(default)]
    pub edges: Vec<(NodeId, NodeId)>,
}

/// One node in a graph document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(flatten)]
    pub data: ObjectData,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(frame: u32, object_id: u32) -> NodeId {
        NodeId::new(frame, object_id)
    }

    #[test]
    fn test_degrees_and_edge_order() {
        let mut graph = LineageGraph::new();
        for id in [n(0, 1), n(1, 1), n(1, 2)] {
            graph.add_node(id, ObjectData::labeled(0));
        }
        graph.add_edge(n(0, 1), n(1, 2)).unwrap();
        graph.add_edge(n(0, 1), n(1, 1)).unwrap();

        assert_eq!(graph.out_degree(n(0, 1)), 2);
        assert_eq!(graph.in_degree(n(0, 1)), 0);
        assert_eq!(graph.in_degree(n(1, 1)), 1);
        // Insertion order, not id order
        assert_eq!(graph.successors(n(0, 1)), vec![n(1, 2), n(1, 1)]);
        assert_eq!(graph.predecessors(n(1, 2)), vec![n(0, 1)]);
    }

    #[test]
    fn test_rejects_invalid_edges() {
        let mut graph = LineageGraph::new();
        graph.add_node(n(0, 1), ObjectData::default());
        graph.add_node(n(1, 1), ObjectData::default());
        graph.add_node(n(1, 2), ObjectData::default());

        assert!(matches!(
            graph.add_edge(n(0, 1), n(5, 5)),
            Err(EventError::UnknownNode(_))
        ));
        assert!(matches!(
            graph.add_edge(n(1, 1), n(1, 2)),
            Err(EventError::InvalidGraph(_))
        ));
        assert!(matches!(
            graph.add_edge(n(1, 1), n(0, 1)),
            Err(EventError::InvalidGraph(_))
        ));
        graph.add_edge(n(0, 1), n(1, 1)).unwrap();
        assert!(graph.add_edge(n(0, 1), n(1, 1)).is_err());
    }

    #[test]
    fn test_start_nodes_sorted() {
        let mut graph = LineageGraph::new();
        for id in [n(3, 1), n(0, 9), n(0, 2), n(4, 1)] {
            graph.add_node(id, ObjectData::default());
        }
        graph.add_edge(n(3, 1), n(4, 1)).unwrap();
        assert_eq!(graph.start_nodes(), vec![n(0, 2), n(0, 9), n(3, 1)]);
    }

    #[test]
    fn test_unknown_node_is_isolated() {
        let graph = LineageGraph::new();
        assert_eq!(graph.out_degree(n(1, 1)), 0);
        assert_eq!(graph.in_degree(n(1, 1)), 0);
        assert_eq!(graph.label(n(1, 1)), None);
    }

    #[test]
    fn test_json_document() {
        let graph = LineageGraph::from_json_str(
            r#"{
                "nodes": [
                    {"id": "0_1", "label": 0, "features": [1.5, 2.0], "center": [10, 20]},
                    {"id": "1_1", "label": null},
                    {"id": "2_1"}
                ],
                "edges": [["0_1", "1_1"], ["1_1", "2_1"]]
            }"#,
        )
        .unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.label(n(0, 1)), Some(0));
        assert_eq!(graph.label(n(1, 1)), None);
        assert_eq!(graph.node_data(n(0, 1)).unwrap().center, (10, 20));

        let document = graph.to_document();
        let json = serde_json::to_string(&document).unwrap();
        let again = LineageGraph::from_json_str(&json).unwrap();
        assert_eq!(again.node_list(), graph.node_list());
        assert_eq!(again.successors(n(1, 1)), vec![n(2, 1)]);
    }

    #[test]
    fn test_json_rejects_bad_documents() {
        assert!(LineageGraph::from_json_str(r#"{"nodes": [{"id": "x"}]}"#).is_err());
        assert!(LineageGraph::from_json_str(
            r#"{"nodes": [{"id": "0_1"}, {"id": "0_1"}], "edges": []}"#
        )
        .is_err());
        assert!(LineageGraph::from_json_str(
            r#"{"nodes": [{"id": "0_1"}], "edges": [["0_1", "1_1"]]}"#
        )
        .is_err());
    }
}
