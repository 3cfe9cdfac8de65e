//! Lineage Event Selection Library
//!
//! Mines lineage graphs from time-lapse microscopy tracking for registered
//! label transitions (e.g. interphase -> mitosis) and emits fixed-length event
//! windows around them, including windows that fork at a cell division.
//!
//! # Architecture
//!
//! The library works on one tracking graph per call:
//! - Linearizes the graph into full tracks rooted at nodes without predecessor
//! - Scans every full track for registered transitions
//! - Validates each candidate backward and forward against range, degree and
//!   label constraints, following both daughters at a division
//! - Assembles validated windows into events keyed by their start node
//!
//! The library does NOT:
//! - Segment images or extract features
//! - Classify objects or build the tracking graph
//! - Write HDF5 files or render galleries
//!
//! Loading configuration files, processing several fields of view and writing
//! reports is done by the application layer (lineage-events-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use lineage_events::{EventSelector, LineageGraph, SelectionConfig};
//! use std::path::Path;
//!
//! let graph = LineageGraph::from_json_file(Path::new("position_0001.json")).unwrap();
//!
//! let config = SelectionConfig::new()
//!     .add_transition(0, 1)
//!     .with_ranges(5, 10)
//!     .with_max_degrees(1, 2);
//!
//! let selection = EventSelector::new(config).unwrap().select(&graph).unwrap();
//! for (key, track) in selection.registry.tracks() {
//!     println!("{}: {:?}", key, track);
//! }
//! ```

// Public modules
pub mod assemble;
pub mod config;
pub mod graph;
pub mod linearize;
pub mod scan;
pub mod selector;
pub mod types;
pub mod validate;

// Re-export main types for convenience
pub use assemble::{Event, EventAssembler, EventKey, EventRegistry, ExportRecord, RootEntry};
pub use config::{parse_transitions, SelectionConfig, TransitionSpec, UNBOUNDED};
pub use graph::{GraphDocument, LineageGraph, NodeRecord, TrackingGraph};
pub use linearize::{linearize, RootTracks};
pub use scan::{Candidate, Transition, TransitionScanner, TransitionSet};
pub use selector::{EventSelector, Selection, SelectionStats};
pub use types::{split_node_id, EdgeId, EventError, Label, NodeId, ObjectData, Result};
pub use validate::{Branch, PathEntry, WindowValidator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
