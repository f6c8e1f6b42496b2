//! Per-frame invocation phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three passes the host triggers each frame.
///
/// The derived ordering is the order a frame runs them in: zero or more
/// fixed-step passes, then one update pass, then one late pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fixed-timestep pass (physics rate), may run several times per frame
    FixedUpdate,
    /// Variable-rate pass, once per frame
    Update,
    /// Post-update pass, once per frame after `Update`
    LateUpdate,
}

impl Phase {
    /// All phases in frame order
    pub const ALL: [Phase; 3] = [Phase::FixedUpdate, Phase::Update, Phase::LateUpdate];

    pub fn name(self) -> &'static str {
        match self {
            Phase::FixedUpdate => "fixed_update",
            Phase::Update => "update",
            Phase::LateUpdate => "late_update",
        }
    }

    /// Position in frame order, usable as an array index
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
