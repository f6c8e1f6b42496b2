//! Thread-wide dispatcher for hosts that want ambient access.
//!
//! Wraps a [`DispatcherCell`] in a thread-local, so the first access on the
//! frame thread creates the dispatcher and [`shutdown`] retires it for the
//! rest of the thread's life. Participants already inside a pass should use
//! their `FrameContext` instead: the cell is borrowed for the whole pass, so
//! [`join`] and [`leave`] fail with [`CadenceError::DispatcherBusy`] there,
//! and [`shutdown`] takes effect when the outer access returns.

use crate::config::RuntimeConfig;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::DispatcherCell;
use crate::participant::SharedParticipant;
use crate::registry::Registration;
use cadence_core::{CadenceError, Result};
use std::cell::{Cell, RefCell};
use tracing::{debug, error};

thread_local! {
    static CELL: RefCell<DispatcherCell> = RefCell::new(DispatcherCell::default());
    /// Shutdown requested while the cell was borrowed
    static PENDING_SHUTDOWN: Cell<bool> = const { Cell::new(false) };
}

/// Run `f` with the thread's cell.
///
/// A reentrant call (from inside another `with_cell`) gets a fresh retired
/// view instead of panicking, so it observes "no dispatcher". A shutdown
/// requested during `f` is applied before returning.
pub fn with_cell<R>(f: impl FnOnce(&mut DispatcherCell) -> R) -> R {
    CELL.with(|cell| match cell.try_borrow_mut() {
        Ok(mut cell) => {
            let result = f(&mut cell);
            if PENDING_SHUTDOWN.with(|pending| pending.replace(false)) {
                debug!("applying shutdown requested during a pass");
                cell.shutdown();
            }
            result
        }
        Err(_) => {
            error!("dispatcher cell accessed reentrantly; use the FrameContext from inside a pass");
            let mut retired = DispatcherCell::default();
            retired.shutdown();
            f(&mut retired)
        }
    })
}

/// Whether the cell is borrowed by an access further up the stack
fn is_busy() -> bool {
    CELL.with(|cell| cell.try_borrow_mut().is_err())
}

/// Run `f` with the dispatcher, creating it on first use. `None` after shutdown.
pub fn with_instance<R>(f: impl FnOnce(Option<&mut Dispatcher>) -> R) -> R {
    with_cell(|cell| f(cell.get_instance()))
}

/// Set the config for the not-yet-created dispatcher
pub fn configure(config: RuntimeConfig) -> bool {
    with_cell(|cell| cell.configure(config))
}

/// Register with the thread's dispatcher
pub fn join(participant: SharedParticipant) -> Result<Registration> {
    if is_busy() {
        return Err(CadenceError::DispatcherBusy);
    }
    with_instance(|instance| {
        instance
            .map(|d| d.join(participant))
            .ok_or(CadenceError::DispatcherRetired)
    })
}

/// Leave the thread's dispatcher. `Ok(None)` if the registration was stale.
pub fn leave(registration: Registration) -> Result<Option<SharedParticipant>> {
    if is_busy() {
        return Err(CadenceError::DispatcherBusy);
    }
    with_cell(|cell| {
        if cell.is_retired() {
            return Err(CadenceError::DispatcherRetired);
        }
        Ok(cell.get_instance().and_then(|d| d.leave(registration)))
    })
}

/// Retire the thread's dispatcher permanently.
///
/// Called from inside a pass, the request is recorded and applied as soon
/// as the access that started the pass returns.
pub fn shutdown() {
    if is_busy() {
        debug!("shutdown requested during a pass; deferring until it returns");
        PENDING_SHUTDOWN.with(|pending| pending.set(true));
        return;
    }
    with_cell(|cell| cell.shutdown());
}

pub fn is_retired() -> bool {
    with_cell(|cell| cell.is_retired())
}
