//! Cadence Runtime - Batched per-frame dispatch
//!
//! Replaces per-object tick callbacks with one dense collection walked once
//! per phase:
//! - `Participant` — the three phase callbacks a registered object receives
//! - `Registry` / `Registration` — O(1) join and swap-remove leave
//! - `Dispatcher` — runs every participant for a phase, in collection order
//! - `DispatcherCell` / `global` — lazy creation, never resurrected after shutdown
//! - `FrameClock` / `FrameLoop` — fixed-timestep accumulator and frame driver
//! - `RuntimeConfig` — TOML and environment configuration

mod clock;
mod config;
mod context;
mod dispatcher;
mod frame_loop;
pub mod global;
mod lifecycle;
mod participant;
mod registry;

#[cfg(test)]
mod testing;

pub use clock::FrameClock;
pub use config::{RuntimeConfig, MAX_INITIAL_CAPACITY};
pub use context::FrameContext;
pub use dispatcher::{live_instances, Dispatcher, IterationPolicy, PassStats};
pub use frame_loop::{FrameLoop, FrameReport};
pub use lifecycle::{DispatcherCell, LifecycleState, Lifetime};
pub use participant::{shared, Participant, SharedParticipant};
pub use registry::{Registration, Registry, SlotKey};
