//! Event logging for orchestration auditing.
//!
//! Events capture coarse, slice-level state changes of a run:
//! - **GridShift**: a region moved its window and re-populated exposed voxels
//! - **ResectionSwitch**: regional weighting changed to post-resection values
//! - **ExchangeApplied**: ABM counts were pushed into the continuous model
//! - **IntegratorFailed**: the continuous model could not advance
//!
//! Per-agent activity is summarised in [`crate::models::stats::Stats`]
//! instead; logging every agent event would dominate memory on long runs.
//!
//! # Example
//!
//! ```rust
//! use spqsp_abm_core::models::{Event, EventLog};
//! use spqsp_abm_core::Coord3D;
//!
//! let mut log = EventLog::new();
//! log.log(Event::GridShift {
//!     slice: 12,
//!     region: 0,
//!     offset: Coord3D::z_only(1),
//!     dropped_out: 40,
//!     repopulated: 25,
//! });
//!
//! assert_eq!(log.events_at_slice(12).len(), 1);
//! ```

use crate::core::Coord3D;

/// Orchestration event. All events carry the slice they happened in.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A region's window moved by `offset`
    GridShift {
        slice: u64,
        region: usize,
        offset: Coord3D,
        dropped_out: usize,
        /// Cancer cells created in exposed voxels
        repopulated: usize,
    },

    /// First slice weighted with post-resection fractions
    ResectionSwitch {
        slice: u64,
        fraction_margin: f64,
    },

    /// Deltas applied to the continuous model before integration
    ExchangeApplied {
        slice: u64,
        damage: f64,
        checkpoint_ligand: f64,
        cytokine_maturation: f64,
        central_teff: f64,
        central_treg: f64,
    },

    /// The continuous model reported a fatal step failure
    IntegratorFailed {
        slice: u64,
        message: String,
    },
}

impl Event {
    /// Slice in which the event occurred
    pub fn slice(&self) -> u64 {
        match self {
            Event::GridShift { slice, .. } => *slice,
            Event::ResectionSwitch { slice, .. } => *slice,
            Event::ExchangeApplied { slice, .. } => *slice,
            Event::IntegratorFailed { slice, .. } => *slice,
        }
    }

    /// Event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::GridShift { .. } => "GridShift",
            Event::ResectionSwitch { .. } => "ResectionSwitch",
            Event::ExchangeApplied { .. } => "ExchangeApplied",
            Event::IntegratorFailed { .. } => "IntegratorFailed",
        }
    }

    /// Region index, for region-scoped events
    pub fn region(&self) -> Option<usize> {
        match self {
            Event::GridShift { region, .. } => Some(*region),
            _ => None,
        }
    }
}

/// Append-only log of orchestration events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events for a specific slice
    pub fn events_at_slice(&self, slice: u64) -> Vec<&Event> {
        self.events.iter().filter(|e| e.slice() == slice).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events scoped to one region
    pub fn events_for_region(&self, region: usize) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.region() == Some(region))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
