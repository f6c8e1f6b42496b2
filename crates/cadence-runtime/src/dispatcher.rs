//! Batched phase dispatcher
//!
//! One `Dispatcher` replaces per-object tick callbacks: participants join a
//! dense [`Registry`] and every phase is a single linear pass over it.

use crate::config::RuntimeConfig;
use crate::context::FrameContext;
use crate::participant::SharedParticipant;
use crate::registry::{Registration, Registry, SlotKey};
use cadence_core::{CadenceError, DispatcherId, Phase, Result};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use tracing::{error, trace, trace_span};

thread_local! {
    /// Dispatchers constructed on this thread and not yet dropped
    static LIVE_INSTANCES: Cell<usize> = const { Cell::new(0) };
}

/// Number of dispatchers alive on the current thread.
///
/// `Dispatcher` is `!Send`, so this is exact for the frame thread.
pub fn live_instances() -> usize {
    LIVE_INSTANCES.with(|n| n.get())
}

/// How a pass treats joins and leaves that happen while it is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationPolicy {
    /// Registration keys are snapshotted when the pass starts. Participants
    /// that leave before their turn are skipped, participants that join
    /// mid-pass wait for the next pass, and everyone else runs exactly once.
    #[default]
    Snapshot,
    /// Walk the live collection by index, re-reading its length each step.
    /// A swap-remove behind or at the cursor can skip the participant moved
    /// into the vacated slot; a join mid-pass runs in the same pass.
    Immediate,
}

impl std::str::FromStr for IterationPolicy {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "snapshot" => Ok(IterationPolicy::Snapshot),
            "immediate" => Ok(IterationPolicy::Immediate),
            other => Err(CadenceError::Config(format!(
                "unknown iteration policy '{}'; expected 'snapshot' or 'immediate'",
                other
            ))),
        }
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub phase: Phase,
    /// Callbacks invoked
    pub invoked: usize,
    /// Snapshot entries that had left before their turn
    pub skipped: usize,
}

impl PassStats {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            invoked: 0,
            skipped: 0,
        }
    }
}

/// Owns the registered participants and runs them phase by phase
pub struct Dispatcher {
    id: DispatcherId,
    registry: Registry,
    policy: IterationPolicy,
    /// Reused across passes so a warm dispatcher does not allocate per frame
    snapshot: Vec<SlotKey>,
    frame: u64,
    /// Another dispatcher was alive on this thread when this one was built
    duplicate: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_policy(config.iteration, config.initial_capacity)
    }

    /// Every construction is counted; building one while another is alive
    /// on the thread is reported as an error but still succeeds.
    pub fn with_policy(policy: IterationPolicy, capacity: usize) -> Self {
        let live = LIVE_INSTANCES.with(|n| {
            n.set(n.get() + 1);
            n.get()
        });
        let id = DispatcherId::next();
        if live > 1 {
            error!(
                "there should never be more than one dispatcher: {} is number {} alive",
                id, live
            );
        }
        Self {
            id,
            registry: Registry::with_capacity(id, capacity),
            policy,
            snapshot: Vec::with_capacity(capacity),
            frame: 0,
            duplicate: live > 1,
        }
    }

    pub fn id(&self) -> DispatcherId {
        self.id
    }

    /// Whether another dispatcher was alive when this one was constructed
    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    pub fn policy(&self) -> IterationPolicy {
        self.policy
    }

    /// Frames completed so far (late-update passes run)
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a participant at the end of the collection. O(1).
    pub fn join(&mut self, participant: SharedParticipant) -> Registration {
        self.registry.join(participant)
    }

    /// Swap-remove a participant. O(1). `None` if the registration is stale.
    pub fn leave(&mut self, registration: Registration) -> Option<SharedParticipant> {
        self.registry.leave(registration)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Invoke every registered participant for `phase`, in collection order.
    ///
    /// The first participant error aborts the rest of the pass and is
    /// returned as [`CadenceError::PhaseAborted`].
    pub fn run_phase(&mut self, phase: Phase, dt: f64) -> Result<PassStats> {
        let _span = trace_span!("pass", %phase, dispatcher = %self.id).entered();

        let result = match self.policy {
            IterationPolicy::Snapshot => self.run_snapshot(phase, dt),
            IterationPolicy::Immediate => self.run_immediate(phase, dt),
        };

        if phase == Phase::LateUpdate {
            self.frame += 1;
        }

        if let Ok(stats) = &result {
            trace!(invoked = stats.invoked, skipped = stats.skipped, "pass complete");
        }
        result
    }

    fn run_snapshot(&mut self, phase: Phase, dt: f64) -> Result<PassStats> {
        let Dispatcher {
            registry,
            snapshot,
            frame,
            ..
        } = self;

        snapshot.clear();
        snapshot.extend(registry.keys());

        let mut stats = PassStats::new(phase);
        for &key in snapshot.iter() {
            let Some(participant) = registry.get(key).cloned() else {
                stats.skipped += 1;
                continue;
            };
            invoke(&participant, registry, phase, dt, *frame, key)?;
            stats.invoked += 1;
        }
        Ok(stats)
    }

    fn run_immediate(&mut self, phase: Phase, dt: f64) -> Result<PassStats> {
        let mut stats = PassStats::new(phase);
        let mut cursor = 0;
        while let Some((key, participant)) = self.registry.entry_at(cursor) {
            let participant = participant.clone();
            invoke(&participant, &mut self.registry, phase, dt, self.frame, key)?;
            stats.invoked += 1;
            cursor += 1;
        }
        Ok(stats)
    }
}

fn invoke(
    participant: &SharedParticipant,
    registry: &mut Registry,
    phase: Phase,
    dt: f64,
    frame: u64,
    key: SlotKey,
) -> Result<()> {
    let mut ctx = FrameContext::new(registry, phase, dt, frame, key);
    let mut p = participant.borrow_mut();
    p.run_phase(phase, &mut ctx).map_err(|source| {
        let name = p.name().to_string();
        error!(participant = %name, %phase, "pass aborted: {}", source);
        CadenceError::PhaseAborted {
            phase,
            participant: name,
            source: Box::new(source),
        }
    })
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        LIVE_INSTANCES.with(|n| n.set(n.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{shared, Participant};
    use crate::testing::{CallLog, Recorder};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn dispatcher(policy: IterationPolicy) -> Dispatcher {
        Dispatcher::with_policy(policy, 8)
    }

    #[test]
    fn test_steady_state_runs_each_once_in_order() {
        for policy in [IterationPolicy::Snapshot, IterationPolicy::Immediate] {
            let log = CallLog::default();
            let mut d = dispatcher(policy);
            let _a = d.join(Recorder::shared("a", &log));
            let _b = d.join(Recorder::shared("b", &log));
            let _c = d.join(Recorder::shared("c", &log));

            let stats = d.run_phase(Phase::Update, 0.016).unwrap();
            assert_eq!(stats.invoked, 3);
            assert_eq!(stats.skipped, 0);
            assert_eq!(log.calls(), vec!["a.update", "b.update", "c.update"]);
        }
    }

    #[test]
    fn test_each_phase_routes_to_its_callback() {
        let log = CallLog::default();
        let mut d = dispatcher(IterationPolicy::Snapshot);
        let _a = d.join(Recorder::shared("a", &log));

        for phase in Phase::ALL {
            d.run_phase(phase, 0.02).unwrap();
        }
        assert_eq!(
            log.calls(),
            vec!["a.fixed_update", "a.update", "a.late_update"]
        );
        assert_eq!(d.frame(), 1);
    }

    #[test]
    fn test_leave_reorders_by_swap() {
        let log = CallLog::default();
        let mut d = dispatcher(IterationPolicy::Snapshot);
        let a = d.join(Recorder::shared("a", &log));
        let _b = d.join(Recorder::shared("b", &log));
        let _c = d.join(Recorder::shared("c", &log));

        d.run_phase(Phase::Update, 0.0).unwrap();
        assert_eq!(log.take(), vec!["a.update", "b.update", "c.update"]);

        assert!(d.leave(a).is_some());
        d.run_phase(Phase::Update, 0.0).unwrap();
        assert_eq!(log.take(), vec!["c.update", "b.update"]);
    }

    #[test]
    fn test_empty_pass() {
        let mut d = dispatcher(IterationPolicy::Snapshot);
        let stats = d.run_phase(Phase::FixedUpdate, 0.0).unwrap();
        assert_eq!(stats.invoked, 0);
        assert!(d.is_empty());
    }

    /// Leaves itself on the first update it sees
    struct SelfLeaver {
        log: CallLog,
    }

    impl Participant for SelfLeaver {
        fn on_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
            self.log.push("leaver.update");
            assert!(ctx.leave_self());
            assert!(!ctx.is_registered());
            assert!(!ctx.leave_self());
            Ok(())
        }
    }

    #[test]
    fn test_self_leave_snapshot_runs_everyone_else() {
        let log = CallLog::default();
        let mut d = dispatcher(IterationPolicy::Snapshot);
        let _a = d.join(Recorder::shared("a", &log));
        let leaver = d.join(shared(SelfLeaver { log: log.clone() }));
        let _c = d.join(Recorder::shared("c", &log));
        let _e = d.join(Recorder::shared("e", &log));

        let stats = d.run_phase(Phase::Update, 0.0).unwrap();
        assert_eq!(stats.invoked, 4);
        assert_eq!(
            log.take(),
            vec!["a.update", "leaver.update", "c.update", "e.update"]
        );

        assert!(!d.registry().contains(&leaver));
        assert_eq!(d.len(), 3);

        d.run_phase(Phase::Update, 0.0).unwrap();
        assert_eq!(log.take(), vec!["a.update", "e.update", "c.update"]);
    }

    #[test]
    fn test_self_leave_immediate_skips_swapped_in_participant() {
        let log = CallLog::default();
        let mut d = dispatcher(IterationPolicy::Immediate);
        let _a = d.join(Recorder::shared("a", &log));
        let _leaver = d.join(shared(SelfLeaver { log: log.clone() }));
        let _c = d.join(Recorder::shared("c", &log));
        let _e = d.join(Recorder::shared("e", &log));

        // "e" is swapped into the leaver's slot behind the cursor
        let stats = d.run_phase(Phase::Update, 0.0).unwrap();
        assert_eq!(stats.invoked, 3);
        assert_eq!(log.take(), vec!["a.update", "leaver.update", "c.update"]);

        d.run_phase(Phase::Update, 0.0).unwrap();
        assert_eq!(log.take(), vec!["a.update", "e.update", "c.update"]);
    }

    #[test]
    fn test_self_leave_as_last_participant() {
        for policy in [IterationPolicy::Snapshot, IterationPolicy::Immediate] {
            let log = CallLog::default();
            let mut d = dispatcher(policy);
            let _a = d.join(Recorder::shared("a", &log));
            let _leaver = d.join(shared(SelfLeaver { log: log.clone() }));

            d.run_phase(Phase::Update, 0.0).unwrap();
            assert_eq!(log.take(), vec!["a.update", "leaver.update"]);
            assert_eq!(d.len(), 1);
        }
    }

    /// Removes another participant when its update runs
    struct Remover {
        target: Rc<RefCell<Option<Registration>>>,
        log: CallLog,
    }

    impl Participant for Remover {
        fn on_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
            self.log.push("remover.update");
            if let Some(reg) = self.target.borrow_mut().take() {
                assert!(ctx.leave(reg).is_some());
            }
            Ok(())
        }
    }

    fn remover_setup(policy: IterationPolicy) -> (Dispatcher, CallLog) {
        // [remover, b, victim, d] -> removing victim swaps d into index 2
        let log = CallLog::default();
        let target = Rc::new(RefCell::new(None));
        let mut d = dispatcher(policy);
        let _r = d.join(shared(Remover {
            target: target.clone(),
            log: log.clone(),
        }));
        let _b = d.join(Recorder::shared("b", &log));
        let victim = d.join(Recorder::shared("victim", &log));
        let _d = d.join(Recorder::shared("d", &log));
        *target.borrow_mut() = Some(victim);
        (d, log)
    }

    #[test]
    fn test_leave_ahead_of_cursor_snapshot() {
        let (mut d, log) = remover_setup(IterationPolicy::Snapshot);
        let stats = d.run_phase(Phase::Update, 0.0).unwrap();
        assert_eq!(log.take(), vec!["remover.update", "b.update", "d.update"]);
        assert_eq!(stats.invoked, 3);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_leave_ahead_of_cursor_immediate() {
        let (mut d, log) = remover_setup(IterationPolicy::Immediate);
        let stats = d.run_phase(Phase::Update, 0.0).unwrap();
        // d lands in an unvisited slot, so it still runs this pass
        assert_eq!(log.take(), vec!["remover.update", "b.update", "d.update"]);
        assert_eq!(stats.invoked, 3);
    }

    /// Removes a participant that already ran this pass
    struct LateRemover {
        target: Rc<RefCell<Option<Registration>>>,
        log: CallLog,
    }

    impl Participant for LateRemover {
        fn on_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
            self.log.push("late_remover.update");
            if let Some(reg) = self.target.borrow_mut().take() {
                ctx.leave(reg);
            }
            Ok(())
        }
    }

    #[test]
    fn test_leave_behind_cursor_policies_differ() {
        // [a, late_remover, c, d]: removing a swaps d into index 0
        for (policy, expected) in [
            (
                IterationPolicy::Snapshot,
                vec!["a.update", "late_remover.update", "c.update", "d.update"],
            ),
            (
                IterationPolicy::Immediate,
                vec!["a.update", "late_remover.update", "c.update"],
            ),
        ] {
            let log = CallLog::default();
            let target = Rc::new(RefCell::new(None));
            let mut d = dispatcher(policy);
            let a = d.join(Recorder::shared("a", &log));
            let _r = d.join(shared(LateRemover {
                target: target.clone(),
                log: log.clone(),
            }));
            let _c = d.join(Recorder::shared("c", &log));
            let _d = d.join(Recorder::shared("d", &log));
            *target.borrow_mut() = Some(a);

            d.run_phase(Phase::Update, 0.0).unwrap();
            assert_eq!(log.take(), expected, "policy {:?}", policy);
            assert_eq!(d.len(), 3);
        }
    }

    /// Joins a fresh recorder during its update
    struct Spawner {
        log: CallLog,
        spawned: Vec<Registration>,
    }

    impl Participant for Spawner {
        fn on_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
            self.log.push("spawner.update");
            if self.spawned.is_empty() {
                let reg = ctx.join(Recorder::shared("child", &self.log));
                self.spawned.push(reg);
            }
            Ok(())
        }
    }

    #[test]
    fn test_join_during_pass() {
        for (policy, expected) in [
            (IterationPolicy::Snapshot, vec!["spawner.update", "b.update"]),
            (
                IterationPolicy::Immediate,
                vec!["spawner.update", "b.update", "child.update"],
            ),
        ] {
            let log = CallLog::default();
            let mut d = dispatcher(policy);
            let _s = d.join(shared(Spawner {
                log: log.clone(),
                spawned: Vec::new(),
            }));
            let _b = d.join(Recorder::shared("b", &log));

            d.run_phase(Phase::Update, 0.0).unwrap();
            assert_eq!(log.take(), expected, "policy {:?}", policy);

            d.run_phase(Phase::Update, 0.0).unwrap();
            assert_eq!(
                log.take(),
                vec!["spawner.update", "b.update", "child.update"]
            );
        }
    }

    struct Failing;

    impl Participant for Failing {
        fn on_update(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
            Err(CadenceError::participant("boom"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_failure_aborts_rest_of_pass() {
        for policy in [IterationPolicy::Snapshot, IterationPolicy::Immediate] {
            let log = CallLog::default();
            let mut d = dispatcher(policy);
            let _a = d.join(Recorder::shared("a", &log));
            let _f = d.join(shared(Failing));
            let _c = d.join(Recorder::shared("c", &log));

            let err = d.run_phase(Phase::Update, 0.0).unwrap_err();
            match err {
                CadenceError::PhaseAborted {
                    phase, participant, ..
                } => {
                    assert_eq!(phase, Phase::Update);
                    assert_eq!(participant, "failing");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(log.take(), vec!["a.update"]);

            // Other phases are unaffected
            d.run_phase(Phase::LateUpdate, 0.0).unwrap();
            assert_eq!(log.take(), vec!["a.late_update", "c.late_update"]);
        }
    }

    #[test]
    fn test_context_reports_timing() {
        struct Probe(Rc<RefCell<Vec<(Phase, f64, u64)>>>);

        impl Participant for Probe {
            fn on_fixed_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
                self.0.borrow_mut().push((ctx.phase(), ctx.dt(), ctx.frame()));
                Ok(())
            }

            fn on_late_update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
                self.0.borrow_mut().push((ctx.phase(), ctx.dt(), ctx.frame()));
                Ok(())
            }
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut d = dispatcher(IterationPolicy::Snapshot);
        let _p = d.join(shared(Probe(seen.clone())));

        d.run_phase(Phase::FixedUpdate, 0.5).unwrap();
        d.run_phase(Phase::LateUpdate, 0.25).unwrap();
        d.run_phase(Phase::FixedUpdate, 0.5).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (Phase::FixedUpdate, 0.5, 0),
                (Phase::LateUpdate, 0.25, 0),
                (Phase::FixedUpdate, 0.5, 1),
            ]
        );
    }

    #[test]
    fn test_live_instances_tracks_drop() {
        let before = live_instances();
        let d = Dispatcher::new();
        assert_eq!(live_instances(), before + 1);
        drop(d);
        assert_eq!(live_instances(), before);
    }

    #[test]
    fn test_construction_while_another_is_alive_is_flagged() {
        let first = Dispatcher::new();
        assert!(!first.is_duplicate());

        let second = Dispatcher::new();
        assert!(second.is_duplicate());

        drop(first);
        drop(second);
        assert!(!Dispatcher::new().is_duplicate());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "immediate".parse::<IterationPolicy>().unwrap(),
            IterationPolicy::Immediate
        );
        assert!("sideways".parse::<IterationPolicy>().is_err());
        assert_eq!(IterationPolicy::default(), IterationPolicy::Snapshot);
    }
}
