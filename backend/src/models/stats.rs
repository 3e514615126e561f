//! Per-slice compartment statistics
//!
//! Counts are kept per (type, state) category. The accumulator is reset at
//! the start of every slice, so a snapshot describes exactly one slice.

use crate::models::agent::{AgentState, AgentType};
use serde::{Deserialize, Serialize};

/// Shared per-category events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatEvent {
    Recruit,
    Prolif,
    Death,
    Move,
    DropIn,
    DropOut,
}

impl StatEvent {
    pub const ALL: [StatEvent; 6] = [
        StatEvent::Recruit,
        StatEvent::Prolif,
        StatEvent::Death,
        StatEvent::Move,
        StatEvent::DropIn,
        StatEvent::DropOut,
    ];

    fn label(&self) -> &'static str {
        match self {
            StatEvent::Recruit => "recruit",
            StatEvent::Prolif => "prolif",
            StatEvent::Death => "death",
            StatEvent::Move => "move",
            StatEvent::DropIn => "drop_in",
            StatEvent::DropOut => "drop_out",
        }
    }
}

const CATEGORY_LABELS: [&str; 9] = [
    "cancer_stem",
    "cancer_progenitor",
    "cancer_senescent",
    "cd8_effector",
    "cd8_cytotoxic",
    "cd8_suppressed",
    "treg",
    "mac",
    "fib",
];

fn category(agent_type: AgentType, state: AgentState) -> usize {
    match (agent_type, state) {
        (AgentType::Cancer, AgentState::CancerProgenitor) => 1,
        (AgentType::Cancer, AgentState::CancerSenescent) => 2,
        (AgentType::Cancer, _) => 0,
        (AgentType::TCell, AgentState::TCytotoxic) => 4,
        (AgentType::TCell, AgentState::TSuppressed) => 5,
        (AgentType::TCell, _) => 3,
        (AgentType::Treg, _) => 6,
        (AgentType::Macrophage, _) => 7,
        (AgentType::Fibroblast, _) => 8,
    }
}

/// Counters of one (type, state) category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub live: u64,
    pub recruit: u64,
    pub prolif: u64,
    pub death: u64,
    #[serde(rename = "move")]
    pub moved: u64,
    pub drop_in: u64,
    pub drop_out: u64,
}

impl CategoryCounts {
    fn event(&self, event: StatEvent) -> u64 {
        match event {
            StatEvent::Recruit => self.recruit,
            StatEvent::Prolif => self.prolif,
            StatEvent::Death => self.death,
            StatEvent::Move => self.moved,
            StatEvent::DropIn => self.drop_in,
            StatEvent::DropOut => self.drop_out,
        }
    }

    fn event_mut(&mut self, event: StatEvent) -> &mut u64 {
        match event {
            StatEvent::Recruit => &mut self.recruit,
            StatEvent::Prolif => &mut self.prolif,
            StatEvent::Death => &mut self.death,
            StatEvent::Move => &mut self.moved,
            StatEvent::DropIn => &mut self.drop_in,
            StatEvent::DropOut => &mut self.drop_out,
        }
    }
}

/// Statistics accumulated over one slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    categories: Vec<CategoryCounts>,
    /// Cancer cells killed by cytotoxic T cells
    pub killed_by_t: u64,
    /// Live PD-L1 positive cancer cells at the final scan
    pub pdl1_positive: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            categories: vec![CategoryCounts::default(); CATEGORY_LABELS.len()],
            killed_by_t: 0,
            pdl1_positive: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn inc_live(&mut self, agent_type: AgentType, state: AgentState) {
        self.categories[category(agent_type, state)].live += 1;
    }

    pub fn inc(&mut self, event: StatEvent, agent_type: AgentType, state: AgentState) {
        *self.categories[category(agent_type, state)].event_mut(event) += 1;
    }

    pub fn live(&self, agent_type: AgentType, state: AgentState) -> u64 {
        self.categories[category(agent_type, state)].live
    }

    /// Live count summed over every state of a type
    pub fn live_of_type(&self, agent_type: AgentType) -> u64 {
        self.categories
            .iter()
            .enumerate()
            .filter(|(i, _)| type_of_category(*i) == agent_type)
            .map(|(_, c)| c.live)
            .sum()
    }

    pub fn event_count(&self, event: StatEvent, agent_type: AgentType, state: AgentState) -> u64 {
        self.categories[category(agent_type, state)].event(event)
    }

    /// Event count summed over every state of a type
    pub fn event_of_type(&self, event: StatEvent, agent_type: AgentType) -> u64 {
        self.categories
            .iter()
            .enumerate()
            .filter(|(i, _)| type_of_category(*i) == agent_type)
            .map(|(_, c)| c.event(event))
            .sum()
    }

    /// CSV header matching [`Stats::row`]
    pub fn header() -> String {
        let mut out = String::from("time");
        for label in CATEGORY_LABELS {
            out.push_str(&format!(",{}", label));
        }
        for event in StatEvent::ALL {
            for label in CATEGORY_LABELS {
                out.push_str(&format!(",{}_{}", event.label(), label));
            }
        }
        out.push_str(",killed_by_t,pdl1_pos");
        out
    }

    /// One CSV row for the given slice
    pub fn row(&self, slice: u64) -> String {
        let mut out = slice.to_string();
        for c in &self.categories {
            out.push_str(&format!(",{}", c.live));
        }
        for event in StatEvent::ALL {
            for c in &self.categories {
                out.push_str(&format!(",{}", c.event(event)));
            }
        }
        out.push_str(&format!(",{},{}", self.killed_by_t, self.pdl1_positive));
        out
    }
}

fn type_of_category(i: usize) -> AgentType {
    match i {
        0..=2 => AgentType::Cancer,
        3..=5 => AgentType::TCell,
        6 => AgentType::Treg,
        7 => AgentType::Macrophage,
        _ => AgentType::Fibroblast,
    }
}
