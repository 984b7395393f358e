use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Per-site lifecycle within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ClaimState {
    Unclaimed = 0,
    Claimed = 1,
    Downloaded = 2,
    Failed = 3,
}

impl ClaimState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ClaimState::Claimed,
            2 => ClaimState::Downloaded,
            3 => ClaimState::Failed,
            _ => ClaimState::Unclaimed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimState::Downloaded | ClaimState::Failed)
    }
}

/// How sites are handed out to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStrategy {
    /// Every worker walks the full list and claims with compare-and-swap.
    #[default]
    Shared,
    /// The list is split into disjoint round-robin shards before work starts.
    Sharded,
}

impl fmt::Display for ClaimStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimStrategy::Shared => write!(f, "shared"),
            ClaimStrategy::Sharded => write!(f, "sharded"),
        }
    }
}

/// Claim flags for one run's site list, indexed by list position.
///
/// A site moves `Unclaimed -> Claimed` exactly once, through a single atomic
/// compare-and-swap, then to one terminal state.
pub struct ClaimCoordinator {
    states: Vec<AtomicU8>,
}

impl ClaimCoordinator {
    pub fn new(site_count: usize) -> Self {
        Self {
            states: (0..site_count)
                .map(|_| AtomicU8::new(ClaimState::Unclaimed as u8))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Take ownership of a site; false if another worker already has it.
    pub fn try_claim(&self, index: usize) -> bool {
        self.states.get(index).is_some_and(|state| {
            state
                .compare_exchange(
                    ClaimState::Unclaimed as u8,
                    ClaimState::Claimed as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        })
    }

    pub fn mark_downloaded(&self, index: usize) -> bool {
        self.finish(index, ClaimState::Downloaded)
    }

    pub fn mark_failed(&self, index: usize) -> bool {
        self.finish(index, ClaimState::Failed)
    }

    fn finish(&self, index: usize, terminal: ClaimState) -> bool {
        self.states.get(index).is_some_and(|state| {
            state
                .compare_exchange(
                    ClaimState::Claimed as u8,
                    terminal as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        })
    }

    pub fn state(&self, index: usize) -> ClaimState {
        self.states
            .get(index)
            .map(|state| ClaimState::from_u8(state.load(Ordering::Acquire)))
            .unwrap_or(ClaimState::Unclaimed)
    }

    pub fn count_in(&self, wanted: ClaimState) -> usize {
        (0..self.states.len()).filter(|&i| self.state(i) == wanted).count()
    }
}

/// Round-robin assignment of `site_count` list positions to `workers` shards.
pub fn partition(site_count: usize, workers: usize) -> Vec<Vec<usize>> {
    let workers = workers.max(1);
    let mut shards = vec![Vec::new(); workers];
    for index in 0..site_count {
        shards[index % workers].push(index);
    }
    shards
}
