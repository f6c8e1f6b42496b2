//! Participant trait

use crate::context::FrameContext;
use cadence_core::{Phase, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// Anything that wants per-frame callbacks from a [`Dispatcher`](crate::Dispatcher).
///
/// Every callback defaults to a no-op, so participants only implement the
/// phases they care about. A callback may join or leave participants,
/// including itself, through the [`FrameContext`] it receives.
pub trait Participant {
    /// Called once per fixed timestep, zero or more times per frame
    fn on_fixed_update(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once per frame
    fn on_update(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once per frame, after every participant's `on_update`
    fn on_late_update(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Human-readable name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Route a phase to the matching callback
    fn run_phase(&mut self, phase: Phase, ctx: &mut FrameContext<'_>) -> Result<()> {
        match phase {
            Phase::FixedUpdate => self.on_fixed_update(ctx),
            Phase::Update => self.on_update(ctx),
            Phase::LateUpdate => self.on_late_update(ctx),
        }
    }
}

/// A participant shared between its owner and the dispatcher
pub type SharedParticipant = Rc<RefCell<dyn Participant>>;

/// Wrap a participant for registration while keeping a typed handle to it.
///
/// The returned `Rc` coerces to [`SharedParticipant`] when passed to `join`.
pub fn shared<P: Participant + 'static>(participant: P) -> Rc<RefCell<P>> {
    Rc::new(RefCell::new(participant))
}
