//! Core types for the lineage event engine
//!
//! This module defines the fundamental types shared by every stage of the
//! engine: node identifiers, object payloads, edge handles and the error type.
//! Nodes are produced upstream by segmentation, classification and tracking;
//! the engine never mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Classification label of an object (class index from the classifier)
pub type Label = u32;

/// Identifies one classified object in one frame
///
/// Ordering is by frame first, then by object id. This is the order in which
/// start nodes are processed and the tie-break for every sorted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    /// Time index of the frame
    pub frame: u32,
    /// Object label, unique within a frame
    pub object_id: u32,
}

impl NodeId {
    /// Create a node id from its components
    pub fn new(frame: u32, object_id: u32) -> Self {
        Self { frame, object_id }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.frame, self.object_id)
    }
}

impl FromStr for NodeId {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match split_node_id(s)? {
            (frame, object_id, None) => Ok(NodeId::new(frame, object_id)),
            (_, _, Some(_)) => Err(EventError::InvalidNodeId(s.to_string())),
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = EventError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

/// Decode a textual node id into `(frame, object_id, branch)`
///
/// Accepts `"frame_object"` and the daughter form `"frame_object_branch"`
/// used by event keys.
///
/// # Example
/// ```
/// use lineage_events::split_node_id;
///
/// assert_eq!(split_node_id("12_3").unwrap(), (12, 3, None));
/// assert_eq!(split_node_id("12_3_2").unwrap(), (12, 3, Some(2)));
/// ```
pub fn split_node_id(s: &str) -> Result<(u32, u32, Option<usize>)> {
    let invalid = || EventError::InvalidNodeId(s.to_string());
    let parts: Vec<&str> = s.trim().split('_').collect();

    let frame = parts.first().ok_or_else(invalid)?.parse::<u32>().map_err(|_| invalid())?;
    let object_id = parts.get(1).ok_or_else(invalid)?.parse::<u32>().map_err(|_| invalid())?;
    let branch = match parts.len() {
        2 => None,
        3 => Some(parts[2].parse::<usize>().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };

    Ok((frame, object_id, branch))
}

/// Opaque handle of a directed edge in a tracking graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub usize);

/// Per-node payload produced by segmentation and classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    /// Classification label (`None` = unlabeled)
    #[serde(default)]
    pub label: Option<Label>,
    /// Feature vector, carried for downstream consumers only
    #[serde(default)]
    pub features: Vec<f64>,
    /// Absolute center of the object in the image
    #[serde(default)]
    pub center: (i32, i32),
}

impl ObjectData {
    /// Create a payload carrying only a label
    pub fn labeled(label: Label) -> Self {
        Self {
            label: Some(label),
            ..Self::default()
        }
    }
}

/// Errors raised by the engine
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid transition specification: {0}")]
    InvalidTransitions(String),

    #[error("Invalid node id: {0:?}")]
    InvalidNodeId(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Track starting at {start} exceeds the configured maximum length of {limit} nodes")]
    TrackTooLong { start: NodeId, limit: usize },

    #[error("Event {key} has {count} daughter tracks; at most two are supported")]
    TooManyDaughters { key: String, count: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
