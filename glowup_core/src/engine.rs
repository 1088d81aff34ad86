//! Simulation Engine - drives one simulated multi-worker download.
//!
//! The engine owns a [`BlockGrid`] and a fixed set of [`Worker`]s. A single
//! tick loop advances every worker under the engine's write lock; render
//! drivers read full copies of the grid through [`SimulationEngine::snapshot`].
//!
//! ```text
//!   start() ──► [sleep(tick)] ──► tick() ──► Advanced ─┐
//!                   ▲                                  │
//!                   └──────────────────────────────────┘
//!                              tick() ──► Completed  (completion signal raised once)
//!                              tick() ──► Stopped    (stop() observed, loop exits)
//! ```
//!
//! `stop()` is advisory: the loop notices it on its next tick boundary,
//! before touching the grid, and exits on its own.

use crate::config::PacingConfig;
use crate::grid::{BlockGrid, BlockState};
use crate::signal::OneShotSignal;
use crate::worker::{partition, Worker};

use glowup_env::GlowContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Workers were advanced; more ticks are needed
    Advanced,
    /// Every block was completed; the completion signal was raised
    Completed,
    /// The engine is not running; nothing was mutated
    Stopped,
}

/// Mutable simulation state, guarded by the engine's lock.
struct EngineState {
    grid: BlockGrid,
    workers: Vec<Worker>,
    rng: StdRng,
    running: bool,
    started: bool,
}

/// A simulated multi-worker download.
pub struct SimulationEngine<Ctx: GlowContext> {
    ctx: Arc<Ctx>,

    /// Restart generation this engine belongs to
    generation: u64,

    worker_count: usize,

    pacing: PacingConfig,

    state: RwLock<EngineState>,

    /// Raised exactly once, when every block is completed
    done: OneShotSignal,
}

impl<Ctx: GlowContext> SimulationEngine<Ctx> {
    /// Builds an engine over `total_units` blocks split across `worker_count`
    /// workers (at least one).
    ///
    /// Every worker with a non-empty range starts with its first block
    /// `Active`; workers with empty ranges stay inactive for the engine's
    /// whole life. `generation` selects the engine's random stream.
    pub fn new(
        ctx: Arc<Ctx>,
        total_units: usize,
        worker_count: usize,
        pacing: PacingConfig,
        generation: u64,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let mut rng = StdRng::seed_from_u64(ctx.derive_seed(generation));
        let mut grid = BlockGrid::new(total_units);
        let now = ctx.now();

        let workers = partition(total_units, worker_count)
            .into_iter()
            .enumerate()
            .map(|(id, range)| {
                let mut worker = Worker::new(id, range.clone());
                if !range.is_empty() {
                    let target = pacing.initial_block.sample(&mut rng);
                    worker.begin_block(range.start, now, target);
                    grid.set(range.start, BlockState::Active);
                }
                worker
            })
            .collect();

        Self {
            ctx,
            generation,
            worker_count,
            pacing,
            state: RwLock::new(EngineState {
                grid,
                workers,
                rng,
                running: false,
                started: false,
            }),
            done: OneShotSignal::new(),
        }
    }

    /// Starts the engine and spawns its tick loop on the context.
    pub fn start(self: &Arc<Self>, tick_interval: Duration) {
        if !self.begin() {
            return;
        }
        info!(
            generation = self.generation,
            workers = self.worker_count,
            blocks = self.total_units(),
            "Starting simulation"
        );

        let engine = Arc::clone(self);
        self.ctx.spawn(&format!("engine-{}", self.generation), async move {
            engine.run_ticks(tick_interval).await;
        });
    }

    /// Marks the engine running without spawning a tick loop.
    ///
    /// Active workers have their block start time stamped to "now", so setup
    /// time never counts toward the first block. Callers that use this
    /// directly drive [`tick`](Self::tick) themselves. Returns false if the
    /// engine was already started.
    pub fn begin(&self) -> bool {
        let now = self.ctx.now();
        let mut state = self.write_state();
        if state.started {
            warn!(generation = self.generation, "Simulation already started");
            return false;
        }
        state.started = true;
        state.running = true;
        for worker in state.workers.iter_mut().filter(|w| w.active) {
            worker.started_at = now;
        }
        true
    }

    async fn run_ticks(&self, tick_interval: Duration) {
        loop {
            self.ctx.sleep(tick_interval).await;
            match self.tick() {
                TickOutcome::Advanced => continue,
                TickOutcome::Completed => break,
                TickOutcome::Stopped => {
                    debug!(generation = self.generation, "Simulation loop stopped");
                    break;
                }
            }
        }
    }

    /// Advances the simulation by one tick.
    ///
    /// The stop flag is checked before any mutation. Completion is detected
    /// at the start of a tick, so the signal is raised (under the write lock)
    /// on the first tick that sees every block completed.
    pub fn tick(&self) -> TickOutcome {
        let now = self.ctx.now();
        let mut state = self.write_state();

        if !state.running {
            return TickOutcome::Stopped;
        }

        if state.grid.all_completed() {
            state.running = false;
            if self.done.raise() {
                info!(generation = self.generation, "Simulation completed");
            }
            return TickOutcome::Completed;
        }

        let EngineState {
            grid, workers, rng, ..
        } = &mut *state;
        for worker in workers.iter_mut() {
            advance_worker(worker, grid, rng, &self.pacing, now);
        }

        TickOutcome::Advanced
    }

    /// Halts ticking without completing. Idempotent.
    pub fn stop(&self) {
        let mut state = self.write_state();
        if state.running {
            debug!(generation = self.generation, "Stopping simulation");
        }
        state.running = false;
    }

    /// Returns an independent copy of the grid, in block order.
    pub fn snapshot(&self) -> Vec<BlockState> {
        self.read_state().grid.to_vec()
    }

    /// Waits for the completion signal.
    pub async fn completed(&self) {
        self.done.wait().await;
    }

    /// Returns true once the completion signal has been raised.
    pub fn is_completed(&self) -> bool {
        self.done.is_raised()
    }

    pub fn is_running(&self) -> bool {
        self.read_state().running
    }

    pub fn total_units(&self) -> usize {
        self.read_state().grid.len()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The block range assigned to each worker, in worker order.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        self.read_state()
            .workers
            .iter()
            .map(|w| w.range.clone())
            .collect()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Advances one worker. A stall is rolled before the deadline check and only
/// ever pushes the deadline forward, so it can delay a block that would
/// otherwise have completed this tick.
fn advance_worker(
    worker: &mut Worker,
    grid: &mut BlockGrid,
    rng: &mut StdRng,
    pacing: &PacingConfig,
    now: Duration,
) {
    if !worker.active {
        return;
    }

    let elapsed = worker.elapsed(now);

    let stall = pacing.stall_probability;
    if stall > 0.0 && rng.gen_bool(stall.min(1.0)) {
        worker.target += pacing.stall_extension.sample(rng);
    }

    if elapsed <= worker.target {
        return;
    }

    if let Some(block) = worker.current {
        grid.set(block, BlockState::Completed);
    }

    // Workers only ever pull from their own range.
    match grid.first_idle_in(worker.range.clone()) {
        Some(next) => {
            let target = pacing.steady_block.sample(rng);
            worker.begin_block(next, now, target);
            grid.set(next, BlockState::Active);
        }
        None => worker.retire(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BlockState::{Active as A, Completed as C, Idle as I};
    use glowup_env::TokioContext;

    fn engine(
        units: usize,
        workers: usize,
        pacing: PacingConfig,
    ) -> Arc<SimulationEngine<TokioContext>> {
        Arc::new(SimulationEngine::new(
            TokioContext::shared(),
            units,
            workers,
            pacing,
            0,
        ))
    }

    fn one_second() -> PacingConfig {
        PacingConfig::fixed(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_block_of_each_worker_is_active() {
        let engine = engine(10, 3, PacingConfig::default());
        assert_eq!(engine.ranges(), vec![0..4, 4..7, 7..10]);

        engine.begin();
        assert_eq!(engine.snapshot(), vec![A, I, I, I, A, I, I, A, I, I]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_walk_each_range_in_order() {
        let engine = engine(10, 3, one_second());
        engine.begin();

        // Not due yet
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(engine.tick(), TickOutcome::Advanced);
        assert_eq!(engine.snapshot(), vec![A, I, I, I, A, I, I, A, I, I]);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(engine.tick(), TickOutcome::Advanced);
        assert_eq!(engine.snapshot(), vec![C, A, I, I, C, A, I, C, A, I]);

        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(1100)).await;
            assert_eq!(engine.tick(), TickOutcome::Advanced);
        }
        assert!(engine.snapshot().iter().all(|b| *b == C));
        assert!(!engine.is_completed());

        assert_eq!(engine.tick(), TickOutcome::Completed);
        assert!(engine.is_completed());
        assert!(!engine.is_running());

        // Never raised twice
        assert_eq!(engine.tick(), TickOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_units_complete_on_first_tick() {
        for workers in [1, 3, 13] {
            let engine = engine(0, workers, PacingConfig::default());
            engine.begin();
            assert_eq!(engine.tick(), TickOutcome::Completed);
            assert!(engine.is_completed());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_more_workers_than_units() {
        let engine = engine(2, 5, one_second());
        engine.begin();
        assert_eq!(engine.snapshot(), vec![A, A]);

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert_eq!(engine.tick(), TickOutcome::Advanced);
        assert_eq!(engine.tick(), TickOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_without_mutation() {
        let engine = engine(10, 3, one_second());
        engine.begin();
        engine.stop();
        engine.stop();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(engine.tick(), TickOutcome::Stopped);
        assert_eq!(engine.snapshot(), vec![A, I, I, I, A, I, I, A, I, I]);
        assert!(!engine.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_before_start_is_a_noop() {
        let engine = engine(4, 2, one_second());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(engine.tick(), TickOutcome::Stopped);
        assert!(engine.begin());
        assert!(!engine.begin());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalls_only_delay_blocks() {
        let mut pacing = one_second();
        pacing.stall_probability = 1.0;
        pacing.stall_extension = crate::config::DurationRange::from_millis(1000, 1000);
        let engine = engine(2, 1, pacing);
        engine.begin();

        // Every tick adds a second, so the first block keeps slipping.
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(engine.tick(), TickOutcome::Advanced);
        assert_eq!(engine.snapshot(), vec![A, I]);

        tokio::time::advance(Duration::from_millis(2000)).await;
        assert_eq!(engine.tick(), TickOutcome::Advanced);
        assert_eq!(engine.snapshot(), vec![C, A]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_never_leave_their_range() {
        let engine = engine(53, 7, PacingConfig::default());
        let ranges = engine.ranges();
        engine.begin();

        for _ in 0..2000 {
            tokio::time::advance(Duration::from_millis(250)).await;
            if engine.tick() != TickOutcome::Advanced {
                break;
            }
            let snapshot = engine.snapshot();
            for range in &ranges {
                let active = snapshot[range.clone()].iter().filter(|b| **b == A).count();
                assert!(active <= 1, "range {:?} has {} active blocks", range, active);
            }
        }
        assert!(engine.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_runs_to_completion() {
        let engine = engine(12, 3, PacingConfig::fixed(Duration::from_millis(100)));
        engine.start(Duration::from_millis(250));

        tokio::time::timeout(Duration::from_secs(60), engine.completed())
            .await
            .expect("simulation should complete");

        assert!(engine.snapshot().iter().all(|b| *b == C));
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_never_move_backward() {
        let engine = engine(40, 7, PacingConfig::fixed(Duration::from_millis(300)));
        engine.start(Duration::from_millis(250));

        let reader = {
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut previous = engine.snapshot();
                while !engine.is_completed() {
                    tokio::time::sleep(Duration::from_millis(90)).await;
                    let current = engine.snapshot();
                    assert_eq!(current.len(), previous.len());
                    for (before, after) in previous.iter().zip(&current) {
                        assert!(before.can_become(*after));
                    }
                    assert!(current.iter().filter(|b| **b == A).count() <= 7);
                    previous = current;
                }
            })
        };

        tokio::time::timeout(Duration::from_secs(120), reader)
            .await
            .expect("reader should finish")
            .unwrap();
    }
}
