//! Event selection configuration
//!
//! This module defines the policy that decides which label transitions are
//! events and how the window around each transition is validated. Loading the
//! configuration from disk is the application's job; the engine only receives
//! a validated [`SelectionConfig`].

use crate::scan::{Transition, TransitionSet};
use crate::types::{EventError, Label, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Range value meaning "walk until the graph boundary"
pub const UNBOUNDED: i64 = -1;

/// Default budget for a single linearized branch
pub const DEFAULT_MAX_TRACK_LENGTH: usize = 100_000;

/// Configuration of the event selection engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Label pairs that mark an event (first match wins)
    pub transitions: TransitionSpec,

    /// Nodes to include before the transition, the transition node included (-1 = until a root)
    pub backward_range: i64,

    /// Nodes to include after the transition (-1 = until a lineage end)
    pub forward_range: i64,

    /// Treat `backward_range` as a minimum and continue until a root
    pub backward_range_min: bool,

    /// Treat `forward_range` as a minimum and continue until a lineage end
    pub forward_range_min: bool,

    /// Labels allowed within the checked part of the backward window
    pub backward_labels: BTreeSet<Label>,

    /// Labels allowed within the checked part of the forward window
    pub forward_labels: BTreeSet<Label>,

    /// Number of backward levels (after the transition node) where labels are enforced
    pub backward_check: usize,

    /// Number of forward levels where labels are enforced
    pub forward_check: usize,

    /// Largest in-degree tolerated in the forward window
    pub max_in_degree: usize,

    /// Largest out-degree tolerated in the forward window (2 admits a division)
    pub max_out_degree: usize,

    /// Accept a division when only one daughter completes the window
    pub allow_one_daughter_cell: bool,

    /// Longest branch the linearizer accepts before failing
    pub max_track_length: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            transitions: TransitionSpec::default(),
            backward_range: UNBOUNDED,
            forward_range: UNBOUNDED,
            backward_range_min: false,
            forward_range_min: false,
            backward_labels: BTreeSet::new(),
            forward_labels: BTreeSet::new(),
            backward_check: 0,
            forward_check: 0,
            max_in_degree: 1,
            max_out_degree: 1,
            allow_one_daughter_cell: true,
            max_track_length: DEFAULT_MAX_TRACK_LENGTH,
        }
    }
}

/// Transition pairs as written in a configuration file
///
/// Either a list of `[from, to]` pairs or a text form such as
/// `"(0,1), (1,2)"` or `"0,1; 1,2"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransitionSpec {
    Pairs(Vec<(Label, Label)>),
    Text(String),
}

impl Default for TransitionSpec {
    fn default() -> Self {
        TransitionSpec::Pairs(Vec::new())
    }
}

impl TransitionSpec {
    /// Reduce the specification to a transition set
    pub fn resolve(&self) -> Result<TransitionSet> {
        match self {
            TransitionSpec::Pairs(pairs) => Ok(pairs
                .iter()
                .map(|&(from, to)| Transition::new(from, to))
                .collect()),
            TransitionSpec::Text(text) => parse_transitions(text),
        }
    }
}

/// Parse the text form of a transition specification
///
/// Pairs are grouped by parentheses or brackets, or separated by `;`; values
/// within a pair are separated by `,`. A bare list of values is read pairwise.
///
/// # Example
/// ```
/// use lineage_events::parse_transitions;
///
/// let set = parse_transitions("(0,1), (1,2)").unwrap();
/// assert_eq!(set.len(), 2);
/// assert!(parse_transitions("(0,1,2)").is_err());
/// ```
pub fn parse_transitions(text: &str) -> Result<TransitionSet> {
    let invalid = || EventError::InvalidTransitions(text.to_string());
    let normalized = text.replace('[', "(").replace(']', ")");

    let groups: Vec<Vec<&str>> = if normalized.contains('(') {
        let mut groups = Vec::new();
        let mut start = None;
        for (idx, c) in normalized.char_indices() {
            match c {
                '(' => start = Some(idx + 1),
                ')' => {
                    if let Some(begin) = start.take() {
                        groups.push(split_values(&normalized[begin..idx]));
                    }
                }
                ',' | ';' => {}
                c if c.is_whitespace() => {}
                _ if start.is_none() => return Err(invalid()),
                _ => {}
            }
        }
        if start.is_some() {
            return Err(invalid());
        }
        groups
    } else if normalized.contains(';') {
        normalized
            .split(';')
            .map(split_values)
            .filter(|group| !group.is_empty())
            .collect()
    } else {
        let values = split_values(&normalized);
        if values.len() % 2 != 0 {
            return Err(invalid());
        }
        values.chunks(2).map(|pair| pair.to_vec()).collect()
    };

    if groups.is_empty() {
        return Err(invalid());
    }

    groups
        .iter()
        .map(|group| match group.as_slice() {
            [from, to] => {
                let from = from.parse::<Label>().map_err(|_| invalid())?;
                let to = to.parse::<Label>().map_err(|_| invalid())?;
                Ok(Transition::new(from, to))
            }
            _ => Err(invalid()),
        })
        .collect()
}

fn split_values(group: &str) -> Vec<&str> {
    group
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

impl SelectionConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a transition pair
    pub fn add_transition(mut self, from: Label, to: Label) -> Self {
        match &mut self.transitions {
            TransitionSpec::Pairs(pairs) => pairs.push((from, to)),
            TransitionSpec::Text(_) => self.transitions = TransitionSpec::Pairs(vec![(from, to)]),
        }
        self
    }

    /// Builder method: set transitions from their text form
    pub fn with_transition_text(mut self, text: impl Into<String>) -> Self {
        self.transitions = TransitionSpec::Text(text.into());
        self
    }

    /// Builder method: set backward and forward ranges
    pub fn with_ranges(mut self, backward: i64, forward: i64) -> Self {
        self.backward_range = backward;
        self.forward_range = forward;
        self
    }

    /// Builder method: set the minimum-range flags
    pub fn with_range_min(mut self, backward: bool, forward: bool) -> Self {
        self.backward_range_min = backward;
        self.forward_range_min = forward;
        self
    }

    /// Builder method: enforce backward labels over the first `levels` levels
    pub fn with_backward_labels(
        mut self,
        labels: impl IntoIterator<Item = Label>,
        levels: usize,
    ) -> Self {
        self.backward_labels = labels.into_iter().collect();
        self.backward_check = levels;
        self
    }

    /// Builder method: enforce forward labels over the first `levels` levels
    pub fn with_forward_labels(
        mut self,
        labels: impl IntoIterator<Item = Label>,
        levels: usize,
    ) -> Self {
        self.forward_labels = labels.into_iter().collect();
        self.forward_check = levels;
        self
    }

    /// Builder method: set the tolerated degrees in the forward window
    pub fn with_max_degrees(mut self, max_in: usize, max_out: usize) -> Self {
        self.max_in_degree = max_in;
        self.max_out_degree = max_out;
        self
    }

    /// Builder method: accept divisions with a single complete daughter
    pub fn with_one_daughter_cell(mut self, allowed: bool) -> Self {
        self.allow_one_daughter_cell = allowed;
        self
    }

    /// Builder method: set the linearization budget
    pub fn with_max_track_length(mut self, limit: usize) -> Self {
        self.max_track_length = limit;
        self
    }

    /// Exact event length when both ranges are finite and neither walk is
    /// extended to the graph boundary by a minimum-range flag
    pub fn max_length(&self) -> Option<usize> {
        let unbounded = self.backward_range == UNBOUNDED || self.forward_range == UNBOUNDED;
        if unbounded || self.backward_range_min || self.forward_range_min {
            None
        } else {
            Some((self.backward_range + self.forward_range) as usize)
        }
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let transitions = self.transitions.resolve()?;
        if transitions.is_empty() {
            return Err(EventError::InvalidConfig("no transitions configured".to_string()));
        }

        let ranges = [
            ("backward_range", self.backward_range),
            ("forward_range", self.forward_range),
        ];
        for (name, range) in ranges {
            if range == 0 || range < UNBOUNDED {
                return Err(EventError::InvalidConfig(format!(
                    "{} must be positive or -1, got {}",
                    name, range
                )));
            }
        }

        if self.max_in_degree == 0 || self.max_out_degree == 0 {
            return Err(EventError::InvalidConfig(
                "max_in_degree and max_out_degree must be at least 1".to_string(),
            ));
        }

        if self.max_track_length == 0 {
            return Err(EventError::InvalidConfig(
                "max_track_length must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
