//! Event assembly and the event registry
//!
//! Turns validated backward/forward walks into fixed-length event windows and
//! stores them under the root whose track produced them. The registry is
//! read-only once the engine returns it.

use crate::linearize::RootTracks;
use crate::scan::Transition;
use crate::types::{EventError, NodeId, Result};
use crate::validate::{flatten, PathEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key of an event: the earliest backward node, plus the daughter index
/// (1-based) when the window forks at a division
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub start: NodeId,
    pub daughter: Option<usize>,
}

impl EventKey {
    pub fn new(start: NodeId) -> Self {
        Self { start, daughter: None }
    }

    pub fn daughter(start: NodeId, index: usize) -> Self {
        Self {
            start,
            daughter: Some(index),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.daughter {
            Some(index) => write!(f, "{}_{}", self.start, index),
            None => write!(f, "{}", self.start),
        }
    }
}

impl Serialize for EventKey {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A validated transition window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(skip)]
    pub key: EventKey,
    /// Node at which the registered transition occurs
    pub event_id: NodeId,
    #[serde(skip)]
    pub transition: Transition,
    /// Node right before the division, if the window forks
    pub split_id: Option<NodeId>,
    /// Expected window length (`None` when a range is unbounded)
    pub max_length: Option<usize>,
    pub tracks: Vec<Vec<NodeId>>,
    /// Index in the track of the first daughter node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_idx: Option<usize>,
}

impl Event {
    /// Length of the (first) track of the event
    pub fn window_len(&self) -> usize {
        self.tracks.first().map(Vec::len).unwrap_or(0)
    }
}

/// Builds events from validated walks
pub struct EventAssembler {
    max_length: Option<usize>,
}

impl EventAssembler {
    pub fn new(max_length: Option<usize>) -> Self {
        Self { max_length }
    }

    /// Assemble the events of one validated candidate
    ///
    /// `backward` is in walking order (transition node first). Only the first
    /// division of the forward path is resolved. Daughter tracks of the wrong
    /// length or from a daughter that did not complete are discarded; the
    /// result is empty when no daughter survives.
    pub fn assemble(
        &self,
        event_id: NodeId,
        transition: Transition,
        mut backward: Vec<NodeId>,
        forward: &[PathEntry],
    ) -> Vec<Event> {
        backward.reverse();
        let start = backward[0];

        let split = forward.iter().enumerate().find_map(|(pos, entry)| match entry {
            PathEntry::Split(branches) => Some((pos, branches)),
            PathEntry::Node(_) => None,
        });
        let Some((split_pos, branches)) = split else {
            let mut track = backward;
            track.extend(flatten(forward));
            return vec![Event {
                key: EventKey::new(start),
                event_id,
                transition,
                split_id: None,
                max_length: self.max_length,
                tracks: vec![track],
                split_idx: None,
            }];
        };

        let prefix = flatten(&forward[..split_pos]);
        let split_id = prefix.last().copied();
        let split_idx = split_pos + backward.len();

        let mut events = Vec::new();
        for (i, branch) in branches.iter().enumerate() {
            if !branch.complete {
                continue;
            }
            let mut track = backward.clone();
            track.extend_from_slice(&prefix);
            track.extend(branch.nodes());
            if self.max_length.is_some_and(|len| track.len() != len) {
                log::trace!("Discarding daughter {} of {}: length {}", i + 1, start, track.len());
                continue;
            }
            events.push(Event {
                key: EventKey::daughter(start, i + 1),
                event_id,
                transition,
                split_id,
                max_length: self.max_length,
                tracks: vec![track],
                split_idx: Some(split_idx),
            });
        }
        events
    }
}

/// Bookkeeping and events of one root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootEntry {
    pub full_tracks: Vec<Vec<NodeId>>,
    pub current_branch: usize,
    pub events: BTreeMap<EventKey, Event>,
}

/// All events of one engine invocation, grouped by root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRegistry {
    roots: BTreeMap<NodeId, RootEntry>,
}

impl EventRegistry {
    /// Create a registry holding the linearization of every root
    pub fn new(linearized: BTreeMap<NodeId, RootTracks>) -> Self {
        let roots = linearized
            .into_iter()
            .map(|(root, tracks)| {
                (
                    root,
                    RootEntry {
                        full_tracks: tracks.full_tracks,
                        current_branch: tracks.current_branch,
                        events: BTreeMap::new(),
                    },
                )
            })
            .collect();
        Self { roots }
    }

    /// Store an event under its root, replacing any event with the same key
    pub fn insert(&mut self, root: NodeId, event: Event) {
        self.roots.entry(root).or_default().events.insert(event.key, event);
    }

    pub fn root(&self, root: NodeId) -> Option<&RootEntry> {
        self.roots.get(&root)
    }

    /// Roots in frame order
    pub fn roots(&self) -> impl Iterator<Item = (NodeId, &RootEntry)> {
        self.roots.iter().map(|(id, entry)| (*id, entry))
    }

    /// All events as `(root, event)`, by root then key
    pub fn events(&self) -> impl Iterator<Item = (NodeId, &Event)> {
        self.roots
            .iter()
            .flat_map(|(root, entry)| entry.events.values().map(move |event| (*root, event)))
    }

    /// Flattened `(key, track)` enumeration for exporters
    pub fn tracks(&self) -> impl Iterator<Item = (EventKey, &[NodeId])> {
        self.events().flat_map(|(_, event)| {
            event
                .tracks
                .iter()
                .map(move |track| (event.key, track.as_slice()))
        })
    }

    /// Look up an event by key
    pub fn get(&self, key: EventKey) -> Option<&Event> {
        self.roots.values().find_map(|entry| entry.events.get(&key))
    }

    pub fn len(&self) -> usize {
        self.roots.values().map(|entry| entry.events.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Group events per start node into export records
    ///
    /// Daughter events of one division share a record. More than two daughter
    /// tracks in one record is not supported and fails the export.
    pub fn export(&self) -> Result<Vec<ExportRecord>> {
        let mut records: Vec<ExportRecord> = Vec::new();
        for (root, event) in self.events() {
            let continues_split = matches!(
                records.last(),
                Some(last) if last.root == root
                    && last.start == event.key.start
                    && last.split_idx.is_some()
                    && event.key.daughter.is_some()
            );
            if continues_split {
                if let Some(last) = records.last_mut() {
                    last.tracks.extend(event.tracks.iter().cloned());
                }
            } else {
                records.push(ExportRecord {
                    root,
                    start: event.key.start,
                    event_id: event.event_id,
                    split_id: event.split_id,
                    split_idx: event.split_idx,
                    max_length: event.max_length,
                    tracks: event.tracks.clone(),
                });
            }
        }

        for record in &records {
            if record.tracks.len() > 2 {
                return Err(EventError::TooManyDaughters {
                    key: record.start.to_string(),
                    count: record.tracks.len(),
                });
            }
        }
        Ok(records)
    }
}

/// One exported event group (a plain event, or both daughters of a division)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub root: NodeId,
    pub start: NodeId,
    pub event_id: NodeId,
    pub split_id: Option<NodeId>,
    pub split_idx: Option<usize>,
    pub max_length: Option<usize>,
    pub tracks: Vec<Vec<NodeId>>,
}
