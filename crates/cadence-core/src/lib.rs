//! Cadence Core - Foundational types for the Cadence dispatcher
//!
//! This crate provides the types shared by every Cadence crate:
//! - `Phase` - The three per-frame invocation passes and their order
//! - `ParticipantId`, `DispatcherId` - Process-unique identifiers for diagnostics
//! - Error types and Result alias

mod error;
mod id;
mod phase;

pub use error::{CadenceError, Result};
pub use id::{DispatcherId, ParticipantId};
pub use phase::Phase;
