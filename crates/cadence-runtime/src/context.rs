//! Per-callback frame context

use crate::participant::SharedParticipant;
use crate::registry::{Registration, Registry, SlotKey};
use cadence_core::Phase;

/// What a participant sees while one of its callbacks runs.
///
/// Carries the frame timing and lends the dispatcher's registry, so a
/// participant can join new participants or leave (itself or others)
/// without reaching the dispatcher directly.
pub struct FrameContext<'a> {
    registry: &'a mut Registry,
    phase: Phase,
    dt: f64,
    frame: u64,
    current: SlotKey,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(
        registry: &'a mut Registry,
        phase: Phase,
        dt: f64,
        frame: u64,
        current: SlotKey,
    ) -> Self {
        Self {
            registry,
            phase,
            dt,
            frame,
            current,
        }
    }

    /// The phase being dispatched
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Seconds covered by this pass: the fixed timestep for `FixedUpdate`,
    /// the frame delta otherwise
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Frame counter, advanced after each late-update pass
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Key of the participant whose callback is running
    pub fn current(&self) -> SlotKey {
        self.current
    }

    /// Register a participant from inside a callback
    pub fn join(&mut self, participant: SharedParticipant) -> Registration {
        self.registry.join(participant)
    }

    /// Remove a participant from inside a callback
    pub fn leave(&mut self, registration: Registration) -> Option<SharedParticipant> {
        self.registry.leave(registration)
    }

    /// Remove the running participant.
    ///
    /// Returns `false` if it already left during this callback. Any
    /// `Registration` its owner still holds goes stale.
    pub fn leave_self(&mut self) -> bool {
        self.registry.remove(self.current).is_some()
    }

    /// Whether the running participant is still registered
    pub fn is_registered(&self) -> bool {
        self.registry.position(self.current).is_some()
    }

    /// Number of registered participants right now
    pub fn registered(&self) -> usize {
        self.registry.len()
    }
}
