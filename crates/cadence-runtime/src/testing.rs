//! Test participants shared by the runtime's unit tests

use crate::context::FrameContext;
use crate::participant::{shared, Participant};
use cadence_core::Result;
use std::cell::RefCell;
use std::rc::Rc;

/// Ordered record of callbacks, shared between participants
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.borrow_mut().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Return the calls so far and start a fresh record
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Logs `"<name>.<phase>"` for every callback
pub struct Recorder {
    name: &'static str,
    log: CallLog,
}

impl Recorder {
    pub fn shared(name: &'static str, log: &CallLog) -> Rc<RefCell<Recorder>> {
        shared(Recorder {
            name,
            log: log.clone(),
        })
    }

    fn record(&self, ctx: &FrameContext<'_>) {
        self.log.push(format!("{}.{}", self.name, ctx.phase()));
    }
}

impl Participant for Recorder {
    fn on_fixed_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        self.record(ctx);
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        self.record(ctx);
        Ok(())
    }

    fn on_late_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        self.record(ctx);
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}
