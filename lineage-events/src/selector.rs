//! Main engine API
//!
//! [`EventSelector`] is the entry point of the library. It runs the four
//! stages on one lineage graph (one field of view):
//! 1. linearize the graph into full tracks per root
//! 2. scan every full track for registered transitions
//! 3. validate the window backward and forward of each candidate
//! 4. assemble validated windows into events in the registry

use crate::assemble::{EventAssembler, EventRegistry};
use crate::config::SelectionConfig;
use crate::graph::TrackingGraph;
use crate::linearize::linearize;
use crate::scan::{TransitionScanner, TransitionSet};
use crate::types::{NodeId, Result};
use crate::validate::WindowValidator;
use serde::Serialize;
use std::collections::BTreeMap;

/// The event selection engine
pub struct EventSelector {
    config: SelectionConfig,
    transitions: TransitionSet,
}

impl EventSelector {
    /// Create an engine from a configuration
    ///
    /// # Example
    /// ```
    /// use lineage_events::{EventSelector, SelectionConfig};
    ///
    /// let config = SelectionConfig::new().add_transition(0, 1).with_ranges(2, 3);
    /// let selector = EventSelector::new(config).unwrap();
    /// assert_eq!(selector.transitions().len(), 1);
    /// ```
    pub fn new(config: SelectionConfig) -> Result<Self> {
        config.validate()?;
        let transitions = config.transitions.resolve()?;
        Ok(Self { config, transitions })
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn transitions(&self) -> &TransitionSet {
        &self.transitions
    }

    /// Select all events of one lineage graph
    ///
    /// Fails only when linearization exceeds the configured track budget;
    /// rejected candidates are counted in the statistics.
    ///
    /// # Example
    /// ```
    /// use lineage_events::{EventSelector, LineageGraph, NodeId, ObjectData, SelectionConfig};
    ///
    /// let mut graph = LineageGraph::new();
    /// for (frame, label) in [0, 0, 1, 1, 1].into_iter().enumerate() {
    ///     graph.add_node(NodeId::new(frame as u32, 1), ObjectData::labeled(label));
    /// }
    /// for frame in 0..4 {
    ///     graph.add_edge(NodeId::new(frame, 1), NodeId::new(frame + 1, 1)).unwrap();
    /// }
    ///
    /// let config = SelectionConfig::new().add_transition(0, 1).with_ranges(2, 3);
    /// let selection = EventSelector::new(config).unwrap().select(&graph).unwrap();
    /// assert_eq!(selection.registry.len(), 1);
    /// ```
    pub fn select<G: TrackingGraph + ?Sized>(&self, graph: &G) -> Result<Selection> {
        let linearized = linearize(graph, self.config.max_track_length)?;

        let work: Vec<(NodeId, Vec<NodeId>)> = linearized
            .iter()
            .flat_map(|(root, tracks)| {
                tracks
                    .full_tracks
                    .iter()
                    .map(move |track| (*root, track.clone()))
            })
            .collect();

        let mut stats = SelectionStats {
            roots: linearized.len(),
            full_tracks: work.len(),
            ..SelectionStats::default()
        };
        log::debug!(
            "Linearized {} roots into {} full tracks",
            stats.roots,
            stats.full_tracks
        );

        let mut registry = EventRegistry::new(linearized);
        let scanner = TransitionScanner::new(&self.transitions);
        let validator = WindowValidator::new(graph, &self.config);
        let assembler = EventAssembler::new(self.config.max_length());

        for (root, track) in &work {
            let found = scanner.scan(graph, track, |candidate| {
                let (node, transition) = (candidate.node, candidate.transition);

                let Some(backward) = validator.backward(node) else {
                    log::debug!("Candidate {} at {}: backward check failed", transition, node);
                    stats.backward_rejected += 1;
                    return None;
                };

                let (forward, valid) = validator.forward(candidate.successor);
                if !valid {
                    log::debug!("Candidate {} at {}: forward check failed", transition, node);
                    stats.forward_rejected += 1;
                    return None;
                }

                let events = assembler.assemble(node, transition, backward, &forward);
                let Some(first) = events.first() else {
                    log::debug!(
                        "Candidate {} at {}: all daughter tracks discarded",
                        transition,
                        node
                    );
                    stats.discarded_windows += 1;
                    return None;
                };

                let window_len = self
                    .config
                    .max_length()
                    .unwrap_or_else(|| first.window_len());
                for event in events {
                    log::debug!("Event {} ({}) at {}", event.key, transition, node);
                    registry.insert(*root, event);
                }
                Some(window_len)
            });
            stats.candidates += found;
        }

        stats.events = registry.len();
        for (_, event) in registry.events() {
            *stats.per_transition.entry(event.transition.to_string()).or_insert(0) += 1;
        }

        log::info!(
            "Selected {} events from {} candidates on {} full tracks",
            stats.events,
            stats.candidates,
            stats.full_tracks
        );
        Ok(Selection { registry, stats })
    }
}

/// Result of one engine invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub registry: EventRegistry,
    pub stats: SelectionStats,
}

/// Counters collected during one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub roots: usize,
    pub full_tracks: usize,
    /// Candidates seen by the scanner (a shared prefix is scanned once per track)
    pub candidates: usize,
    pub backward_rejected: usize,
    pub forward_rejected: usize,
    /// Validated windows whose daughter tracks were all discarded
    pub discarded_windows: usize,
    pub events: usize,
    /// Events per transition, keyed `"from->to"`
    pub per_transition: BTreeMap<String, usize>,
}
