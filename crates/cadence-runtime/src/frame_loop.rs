//! Host-side frame driver
//!
//! Runs one frame's passes in order: fixed update as many times as the
//! accumulator owes (capped), then update, then late update. An aborted pass
//! only cuts that pass short; the frame's later passes still run and the
//! first abort is returned once late update is done.

use crate::clock::FrameClock;
use crate::config::RuntimeConfig;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::DispatcherCell;
use cadence_core::{CadenceError, Phase, Result};
use serde::Serialize;
use tracing::debug;

/// What one frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    /// Fixed-update passes run this frame
    pub fixed_steps: u32,
    /// Fixed steps discarded because the per-frame cap was hit
    pub dropped_steps: u32,
    /// Callbacks invoked per phase, indexed by [`Phase::index`]
    pub invoked: [usize; 3],
}

impl FrameReport {
    pub fn invoked(&self, phase: Phase) -> usize {
        self.invoked[phase.index()]
    }
}

/// Drives a dispatcher through frames
pub struct FrameLoop {
    clock: FrameClock,
    max_fixed_steps: u32,
    frames: u64,
}

impl FrameLoop {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            clock: FrameClock::from_config(config),
            max_fixed_steps: config.max_fixed_steps,
            frames: 0,
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Frames driven so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run a frame timed by the wall clock
    pub fn tick(&mut self, dispatcher: &mut Dispatcher) -> Result<FrameReport> {
        self.clock.tick();
        self.run(dispatcher)
    }

    /// Run a frame covering `elapsed` seconds
    pub fn advance(&mut self, dispatcher: &mut Dispatcher, elapsed: f64) -> Result<FrameReport> {
        self.clock.advance(elapsed);
        self.run(dispatcher)
    }

    /// Run a frame against the cell's dispatcher.
    ///
    /// `Ok(None)` once the cell is retired: the host should stop driving.
    pub fn advance_cell(
        &mut self,
        cell: &mut DispatcherCell,
        elapsed: f64,
    ) -> Result<Option<FrameReport>> {
        let Some(dispatcher) = cell.get_instance() else {
            return Ok(None);
        };
        self.advance(dispatcher, elapsed).map(Some)
    }

    fn run(&mut self, dispatcher: &mut Dispatcher) -> Result<FrameReport> {
        let mut report = FrameReport::default();
        let mut first_abort: Option<CadenceError> = None;

        while self.clock.should_fixed_update() {
            if report.fixed_steps == self.max_fixed_steps {
                report.dropped_steps = self.clock.drop_backlog();
                debug!(
                    dropped = report.dropped_steps,
                    "fixed-step backlog over {} per frame, dropping",
                    self.max_fixed_steps
                );
                break;
            }
            let dt = self.clock.fixed_timestep;
            pass(dispatcher, Phase::FixedUpdate, dt, &mut report, &mut first_abort);
            report.fixed_steps += 1;
            self.clock.consume_fixed_step();
        }

        let dt = self.clock.delta_time;
        for phase in [Phase::Update, Phase::LateUpdate] {
            pass(dispatcher, phase, dt, &mut report, &mut first_abort);
        }

        self.frames += 1;
        match first_abort {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

/// One pass; an abort is kept if it is the frame's first
fn pass(
    dispatcher: &mut Dispatcher,
    phase: Phase,
    dt: f64,
    report: &mut FrameReport,
    first_abort: &mut Option<CadenceError>,
) {
    match dispatcher.run_phase(phase, dt) {
        Ok(stats) => report.invoked[phase.index()] += stats.invoked,
        Err(err) => {
            first_abort.get_or_insert(err);
        }
    }
}
