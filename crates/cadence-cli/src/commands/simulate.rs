//! Simulate command — headless run of the frame loop

use anyhow::{bail, Context, Result};
use cadence_core::{ParticipantId, Phase};
use cadence_runtime::{
    shared, DispatcherCell, FrameContext, FrameLoop, FrameReport, Participant, RuntimeConfig,
    SharedParticipant, MAX_INITIAL_CAPACITY,
};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;
use tracing::info;

pub struct SimulateArgs {
    pub participants: usize,
    pub frames: u64,
    pub dt: f64,
    pub policy: Option<String>,
    pub churn: Option<u64>,
    pub config: Option<String>,
    pub format: String,
}

/// Participants that left and are waiting to be rejoined
#[derive(Default)]
struct Churn {
    parked: Vec<ParticipantId>,
    left: u64,
    rejoined: u64,
}

/// A falling body: integrates on fixed steps, optionally leaves on update
struct Ticker {
    id: ParticipantId,
    name: String,
    height: f64,
    velocity: f64,
    churn_every: Option<u64>,
    churn: Rc<RefCell<Churn>>,
}

impl Participant for Ticker {
    fn on_fixed_update(&mut self, ctx: &mut FrameContext<'_>) -> cadence_core::Result<()> {
        self.velocity -= 9.81 * ctx.dt();
        self.height = (self.height + self.velocity * ctx.dt()).max(0.0);
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut FrameContext<'_>) -> cadence_core::Result<()> {
        if let Some(every) = self.churn_every {
            if (self.id.raw() + ctx.frame()) % every == 0 && ctx.leave_self() {
                let mut churn = self.churn.borrow_mut();
                churn.parked.push(self.id);
                churn.left += 1;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Rejoins parked tickers at the end of each frame
struct Respawner {
    roster: HashMap<ParticipantId, SharedParticipant>,
    churn: Rc<RefCell<Churn>>,
}

impl Participant for Respawner {
    fn on_late_update(&mut self, ctx: &mut FrameContext<'_>) -> cadence_core::Result<()> {
        let mut churn = self.churn.borrow_mut();
        let parked = std::mem::take(&mut churn.parked);
        for id in parked {
            if let Some(participant) = self.roster.get(&id) {
                let _ = ctx.join(participant.clone());
                churn.rejoined += 1;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "respawner"
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    participants: usize,
    frames: u64,
    policy: String,
    fixed_steps: u64,
    dropped_steps: u64,
    fixed_update_calls: u64,
    update_calls: u64,
    late_update_calls: u64,
    left: u64,
    rejoined: u64,
    registered_at_end: usize,
    elapsed_ms: f64,
    ns_per_call: f64,
}

#[derive(Default)]
struct Totals {
    fixed_steps: u64,
    dropped_steps: u64,
    calls: [u64; 3],
}

impl Totals {
    fn add(&mut self, report: &FrameReport) {
        self.fixed_steps += u64::from(report.fixed_steps);
        self.dropped_steps += u64::from(report.dropped_steps);
        for phase in Phase::ALL {
            self.calls[phase.index()] += report.invoked(phase) as u64;
        }
    }
}

pub fn run(args: SimulateArgs) -> Result<()> {
    if args.format != "text" && args.format != "json" {
        bail!("Unknown format: {}", args.format);
    }
    if !(args.dt >= 0.0) {
        bail!("--dt must be non-negative, got {}", args.dt);
    }
    if args.churn == Some(0) {
        bail!("--churn must be at least 1");
    }

    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load_from_file(Path::new(path))
            .with_context(|| format!("Failed to load config {}", path))?,
        None => RuntimeConfig::from_env()?,
    };
    if let Some(policy) = &args.policy {
        config.iteration = policy.parse()?;
    }
    config.initial_capacity = config
        .initial_capacity
        .max(args.participants + 1)
        .min(MAX_INITIAL_CAPACITY);

    let mut cell = DispatcherCell::new(config.clone());
    let churn = Rc::new(RefCell::new(Churn::default()));
    let dispatcher = cell
        .get_instance()
        .context("Dispatcher unavailable")?;

    let mut roster = HashMap::with_capacity(args.participants);
    for _ in 0..args.participants {
        let id = ParticipantId::new();
        let ticker: SharedParticipant = shared(Ticker {
            id,
            name: format!("ticker-{}", id),
            height: 10.0,
            velocity: 0.0,
            churn_every: args.churn,
            churn: churn.clone(),
        });
        roster.insert(id, ticker.clone());
        let _ = dispatcher.join(ticker);
    }
    if args.churn.is_some() {
        let _ = dispatcher.join(shared(Respawner {
            roster,
            churn: churn.clone(),
        }));
    }

    info!(
        participants = args.participants,
        frames = args.frames,
        policy = ?config.iteration,
        "starting simulation"
    );

    let mut frame_loop = FrameLoop::new(&config);
    let mut totals = Totals::default();
    let started = Instant::now();
    for _ in 0..args.frames {
        let Some(report) = frame_loop.advance_cell(&mut cell, args.dt)? else {
            break;
        };
        totals.add(&report);
    }
    let elapsed = started.elapsed();

    let registered_at_end = cell.peek().map(|d| d.len()).unwrap_or(0);
    cell.shutdown();

    let total_calls: u64 = totals.calls.iter().sum();
    let churn = churn.borrow();
    let summary = Summary {
        participants: args.participants,
        frames: frame_loop.frames(),
        policy: format!("{:?}", config.iteration).to_lowercase(),
        fixed_steps: totals.fixed_steps,
        dropped_steps: totals.dropped_steps,
        fixed_update_calls: totals.calls[Phase::FixedUpdate.index()],
        update_calls: totals.calls[Phase::Update.index()],
        late_update_calls: totals.calls[Phase::LateUpdate.index()],
        left: churn.left,
        rejoined: churn.rejoined,
        registered_at_end,
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        ns_per_call: if total_calls == 0 {
            0.0
        } else {
            elapsed.as_nanos() as f64 / total_calls as f64
        },
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_text(&summary);
    }

    Ok(())
}

fn print_text(summary: &Summary) {
    println!(
        "Simulated {} frames with {} participants ({} iteration)",
        summary.frames, summary.participants, summary.policy
    );
    println!(
        "  fixed steps:   {} ({} dropped)",
        summary.fixed_steps, summary.dropped_steps
    );
    println!("  fixed_update:  {}", summary.fixed_update_calls);
    println!("  update:        {}", summary.update_calls);
    println!("  late_update:   {}", summary.late_update_calls);
    if summary.left > 0 || summary.rejoined > 0 {
        println!(
            "  churn:         {} left, {} rejoined",
            summary.left, summary.rejoined
        );
    }
    println!("  registered:    {}", summary.registered_at_end);
    println!(
        "  elapsed:       {:.3} ms ({:.1} ns/call)",
        summary.elapsed_ms, summary.ns_per_call
    );
}
