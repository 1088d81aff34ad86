//! Scenario runner - executes DST scenarios and checks invariants every tick.

use crate::context::SimContext;
use crate::scenarios::ScenarioId;
use crate::session::CountingSession;

use glowup_core::{
    BlockState, InterruptSource, LifecycleCoordinator, PacingConfig, SaverConfig,
    SimulationEngine, TerminationRequest, TickOutcome,
};
use glowup_env::GlowContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Blocks in the full-size engine scenarios.
const STANDARD_UNITS: usize = 120;

/// Restart cycles the coordinator must complete in DST-006.
const RESTART_CYCLES: u64 = 3;

/// Threads racing to terminate in DST-007.
const STORM_THREADS: usize = 32;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Engine ticks (scheduler polls for DST-006) executed
    pub total_ticks: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Grid size
    pub total_units: usize,

    /// Workers of the first engine
    pub worker_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Grid snapshots that passed the invariant checks
    pub snapshots_checked: u64,

    /// Most blocks observed `Active` at once
    pub peak_active_blocks: usize,

    /// Completion signals observed
    pub completion_events: u64,

    /// Engines replaced by the coordinator
    pub restarts: u64,

    /// Times the session payload ran
    pub termination_payloads: usize,
}

/// Checks grid snapshots against the partition they were produced from.
///
/// Every worker range must always read as completed blocks, then at most
/// one active block, then idle blocks, and no block may ever move back to
/// an earlier state.
///
/// Ownership is not tracked per cell. `check_initial` proves the ranges tile
/// the grid, so every cell has exactly one owning worker; a cell that some
/// other worker touched would have to leave its owner's range out of order
/// (a non-idle cell past the owner's active one), which `check` rejects.
pub struct InvariantChecker {
    ranges: Vec<Range<usize>>,
    previous: Vec<BlockState>,
}

impl InvariantChecker {
    pub fn new(ranges: Vec<Range<usize>>, initial: Vec<BlockState>) -> Self {
        Self {
            ranges,
            previous: initial,
        }
    }

    /// Verifies the ranges tile the grid and each non-empty range starts
    /// with exactly its first block active.
    pub fn check_initial(&self) -> Result<(), String> {
        let mut next = 0;
        for (id, range) in self.ranges.iter().enumerate() {
            if range.start != next {
                return Err(format!("worker {id} range {range:?} does not start at {next}"));
            }
            next = range.end;
        }
        if next != self.previous.len() {
            return Err(format!(
                "ranges cover {next} blocks, grid has {}",
                self.previous.len()
            ));
        }

        for (id, range) in self.ranges.iter().enumerate() {
            for index in range.clone() {
                let expected = if index == range.start {
                    BlockState::Active
                } else {
                    BlockState::Idle
                };
                if self.previous[index] != expected {
                    return Err(format!(
                        "worker {id}: block {index} starts {:?}, expected {expected:?}",
                        self.previous[index]
                    ));
                }
            }
        }
        Ok(())
    }

    /// Checks one snapshot and returns the number of active blocks.
    pub fn check(&mut self, snapshot: &[BlockState]) -> Result<usize, String> {
        if snapshot.len() != self.previous.len() {
            return Err(format!(
                "grid changed size from {} to {}",
                self.previous.len(),
                snapshot.len()
            ));
        }

        for (index, (before, after)) in self.previous.iter().zip(snapshot).enumerate() {
            if !before.can_become(*after) {
                return Err(format!("block {index} moved from {before:?} to {after:?}"));
            }
        }

        let mut active = 0;
        for (id, range) in self.ranges.iter().enumerate() {
            let blocks = &snapshot[range.clone()];
            if blocks.windows(2).any(|pair| pair[1].rank() > pair[0].rank()) {
                return Err(format!("worker {id} range {range:?} is out of order"));
            }
            let in_range = blocks.iter().filter(|b| **b == BlockState::Active).count();
            if in_range > 1 {
                return Err(format!("worker {id} has {in_range} active blocks"));
            }
            active += in_range;
        }

        self.previous = snapshot.to_vec();
        Ok(active)
    }

    /// Returns true if the last accepted snapshot was fully completed.
    pub fn all_completed(&self) -> bool {
        self.previous.iter().all(|b| *b == BlockState::Completed)
    }
}

/// Runs DST scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tick budget for the engine scenarios
    max_ticks: u64,

    /// Saver configuration the scenarios start from
    config: SaverConfig,
}

impl ScenarioRunner {
    /// Creates a new runner with the default configuration.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_ticks: 20_000,
            config: SaverConfig::default(),
        }
    }

    /// Sets the tick budget.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Sets the base configuration.
    pub fn with_config(mut self, config: SaverConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let result = match scenario {
            ScenarioId::Standard => {
                let workers = self.drawn_worker_count();
                self.run_engine(scenario, STANDARD_UNITS, workers, self.config.pacing.clone())
            }
            ScenarioId::EmptyGrid => {
                let workers = self.drawn_worker_count();
                self.run_engine(scenario, 0, workers, self.config.pacing.clone())
            }
            ScenarioId::Oversubscribed => {
                self.run_engine(scenario, 5, 13, self.config.pacing.clone())
            }
            ScenarioId::SingleWorker => {
                self.run_engine(scenario, 30, 1, self.config.pacing.clone())
            }
            ScenarioId::StallStorm => {
                let pacing = PacingConfig {
                    stall_probability: 0.2,
                    ..self.config.pacing.clone()
                };
                let workers = self.drawn_worker_count();
                self.run_engine(scenario, STANDARD_UNITS, workers, pacing)
            }
            ScenarioId::RestartCycle => self.run_restart_cycle(),
            ScenarioId::TerminationStorm => self.run_termination_storm(),
        };

        if result.passed {
            info!(
                scenario = scenario.name(),
                ticks = result.total_ticks,
                virtual_secs = result.final_time_secs,
                "Scenario passed"
            );
        } else {
            warn!(
                scenario = scenario.name(),
                reason = result.failure_reason.as_deref().unwrap_or("unknown"),
                "Scenario failed"
            );
        }
        result
    }

    fn drawn_worker_count(&self) -> usize {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.config.draw_worker_count(&mut rng)
    }

    /// DST-001..005: drives one engine tick by tick on the virtual clock.
    ///
    /// **Assertions**: grid invariants hold after every tick; completion is
    /// reported once, on the first tick that starts with every block
    /// completed; the engine reports `Stopped` afterwards.
    fn run_engine(
        &self,
        scenario: ScenarioId,
        total_units: usize,
        worker_count: usize,
        pacing: PacingConfig,
    ) -> ScenarioResult {
        let ctx = SimContext::shared(self.seed);
        let engine = SimulationEngine::new(ctx.clone(), total_units, worker_count, pacing, 0);
        let mut metrics = ScenarioMetrics::default();

        let outcome = self.drive_engine(&ctx, &engine, &mut metrics);
        let (total_ticks, failure_reason) = match outcome {
            Ok(ticks) => (ticks, None),
            Err((ticks, reason)) => (ticks, Some(reason)),
        };

        ScenarioResult {
            scenario,
            seed: ctx.seed(),
            passed: failure_reason.is_none(),
            total_ticks,
            final_time_secs: ctx.now().as_secs_f64(),
            total_units,
            worker_count: engine.worker_count(),
            failure_reason,
            metrics,
        }
    }

    fn drive_engine(
        &self,
        ctx: &SimContext,
        engine: &SimulationEngine<SimContext>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<u64, (u64, String)> {
        let mut checker = InvariantChecker::new(engine.ranges(), engine.snapshot());
        checker.check_initial().map_err(|e| (0, e))?;
        engine.begin();

        let tick_interval = self.config.tick_interval();
        for tick in 1..=self.max_ticks {
            let due = checker.all_completed();
            ctx.advance_time(tick_interval);
            let outcome = engine.tick();

            let active = checker
                .check(&engine.snapshot())
                .map_err(|e| (tick, format!("tick {tick}: {e}")))?;
            metrics.snapshots_checked += 1;
            metrics.peak_active_blocks = metrics.peak_active_blocks.max(active);

            match outcome {
                TickOutcome::Completed => {
                    metrics.completion_events += 1;
                    if !due {
                        let reason = format!("tick {tick}: completed with blocks outstanding");
                        return Err((tick, reason));
                    }
                    if engine.tick() != TickOutcome::Stopped || !engine.is_completed() {
                        let reason = format!("tick {tick}: engine kept running after completion");
                        return Err((tick, reason));
                    }
                    debug!(tick, "Completion observed");
                    return Ok(tick);
                }
                TickOutcome::Advanced if due => {
                    let reason = format!("tick {tick}: grid complete but completion not raised");
                    return Err((tick, reason));
                }
                TickOutcome::Advanced => {}
                TickOutcome::Stopped => {
                    return Err((tick, format!("tick {tick}: engine stopped before completing")));
                }
            }
        }

        Err((
            self.max_ticks,
            format!("did not complete within {} ticks", self.max_ticks),
        ))
    }

    /// DST-006: RestartCycle - the coordinator drives engines on its own.
    ///
    /// **Assertions**: an input event during the grace period is ignored;
    /// every engine draws its worker count from the options; at most one
    /// engine runs at a time; after several cycles a single input event
    /// terminates and the payload runs once.
    fn run_restart_cycle(&self) -> ScenarioResult {
        let ctx = SimContext::shared(self.seed);
        let session = Arc::new(CountingSession::new());
        let total_units = 60;
        let coordinator = LifecycleCoordinator::shared(
            ctx.clone(),
            self.config.clone(),
            total_units,
            session.clone(),
        );
        let worker_count = coordinator.worker_count();
        let mut polls = 0u64;

        let outcome = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt.block_on(self.drive_restart_cycle(&coordinator, &mut polls)),
            Err(e) => Err(format!("failed to build runtime: {e}")),
        };

        let failure_reason = outcome
            .and_then(|()| match session.calls() {
                1 => Ok(()),
                n => Err(format!("session payload ran {n} times")),
            })
            .err();

        ScenarioResult {
            scenario: ScenarioId::RestartCycle,
            seed: ctx.seed(),
            passed: failure_reason.is_none(),
            total_ticks: polls,
            final_time_secs: ctx.now().as_secs_f64(),
            total_units,
            worker_count,
            failure_reason,
            metrics: ScenarioMetrics {
                restarts: coordinator.generation(),
                termination_payloads: session.calls(),
                ..ScenarioMetrics::default()
            },
        }
    }

    async fn drive_restart_cycle(
        &self,
        coordinator: &Arc<LifecycleCoordinator<SimContext>>,
        polls: &mut u64,
    ) -> Result<(), String> {
        let early = coordinator.request_termination(InterruptSource::Input);
        if early != TerminationRequest::IgnoredDuringGrace {
            return Err(format!("input at startup returned {early:?}"));
        }

        let task = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.run().await }
        });

        let mut engines = vec![coordinator.current_engine()];
        while coordinator.generation() < RESTART_CYCLES {
            tokio::task::yield_now().await;
            *polls += 1;
            if *polls > self.max_ticks * 100 {
                return Err(format!(
                    "only {} restarts after {} polls",
                    coordinator.generation(),
                    polls
                ));
            }

            let current = coordinator.current_engine();
            if engines.last().map_or(true, |last| !Arc::ptr_eq(last, &current)) {
                if !self.config.worker_options.contains(&current.worker_count()) {
                    return Err(format!("engine drew {} workers", current.worker_count()));
                }
                engines.push(current);
            }
            let running = engines.iter().filter(|e| e.is_running()).count();
            if running > 1 {
                return Err(format!("{running} engines running at once"));
            }
        }

        let late = coordinator.request_termination(InterruptSource::Input);
        if late != TerminationRequest::Executed {
            return Err(format!("input after the grace period returned {late:?}"));
        }
        let again = coordinator.request_termination(InterruptSource::Signal);
        if again != TerminationRequest::AlreadyTerminated {
            return Err(format!("second termination returned {again:?}"));
        }

        task.await
            .map_err(|e| format!("coordinator task failed: {e}"))?;
        if let Some(engine) = engines.iter().find(|e| e.is_running()) {
            return Err(format!(
                "engine {} still running after termination",
                engine.generation()
            ));
        }
        Ok(())
    }

    /// DST-007: TerminationStorm - many threads request termination at once.
    ///
    /// **Assertion**: exactly one request executes and the payload runs
    /// once; grace-gated sources are ignored at startup.
    fn run_termination_storm(&self) -> ScenarioResult {
        let ctx = SimContext::shared(self.seed);
        let session = Arc::new(CountingSession::new());
        let total_units = STANDARD_UNITS;
        let coordinator = LifecycleCoordinator::shared(
            ctx.clone(),
            self.config.clone(),
            total_units,
            session.clone(),
        );

        let sources = [
            InterruptSource::Signal,
            InterruptSource::Input,
            InterruptSource::FocusLost,
            InterruptSource::WindowClosed,
        ];
        let results: Vec<Option<TerminationRequest>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..STORM_THREADS)
                .map(|i| {
                    let coordinator = &coordinator;
                    let source = sources[i % sources.len()];
                    scope.spawn(move || coordinator.request_termination(source))
                })
                .collect();
            handles.into_iter().map(|h| h.join().ok()).collect()
        });

        let count = |wanted: TerminationRequest| {
            results.iter().filter(|r| **r == Some(wanted)).count()
        };
        let executed = count(TerminationRequest::Executed);
        let ignored = count(TerminationRequest::IgnoredDuringGrace);
        let gated = (0..STORM_THREADS)
            .filter(|i| !sources[i % sources.len()].bypasses_grace())
            .count();

        let failure_reason = if results.iter().any(Option::is_none) {
            Some("a requesting thread panicked".to_string())
        } else if executed != 1 {
            Some(format!("{executed} requests executed"))
        } else if session.calls() != 1 {
            Some(format!("session payload ran {} times", session.calls()))
        } else if ignored != gated {
            Some(format!("{ignored} requests ignored, expected {gated}"))
        } else if coordinator.current_engine().is_running() || !coordinator.is_terminated() {
            Some("coordinator not terminated after the storm".to_string())
        } else {
            None
        };

        ScenarioResult {
            scenario: ScenarioId::TerminationStorm,
            seed: ctx.seed(),
            passed: failure_reason.is_none(),
            total_ticks: 0,
            final_time_secs: ctx.now().as_secs_f64(),
            total_units,
            worker_count: coordinator.worker_count(),
            failure_reason,
            metrics: ScenarioMetrics {
                termination_payloads: session.calls(),
                ..ScenarioMetrics::default()
            },
        }
    }
}
