//! Lifecycle Coordinator - runs simulations back to back and owns shutdown.
//!
//! The coordinator holds exactly one [`SimulationEngine`] at a time. When
//! the engine signals completion it counts down, then replaces the engine
//! wholesale with a fresh one using a newly drawn worker count.
//!
//! ```text
//!            completion signal               countdown expired
//! Downloading ─────────────────► Countdown ─────────────────────► Downloading
//!                                                      (restart: new engine)
//! ```
//!
//! Every interrupt source (OS signal, user input, focus loss, window close)
//! funnels into [`LifecycleCoordinator::terminate`], a one-shot gate whose
//! payload (stop the engine, end the session) runs exactly once.

use crate::config::SaverConfig;
use crate::engine::SimulationEngine;
use crate::grid::BlockState;
use crate::signal::OneShotSignal;

use glowup_env::{GlowContext, SessionAction};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info};

/// Random stream used for drawing worker counts (engines use their generation).
const WORKER_COUNT_STREAM: u64 = u64::MAX;

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// An engine is ticking toward completion
    Downloading,
    /// The engine finished; counting down before the next one starts
    Countdown,
}

/// Where a termination request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptSource {
    /// SIGINT / SIGTERM
    Signal,
    /// Key press or pointer activity
    Input,
    /// The host window lost focus
    FocusLost,
    /// The host window/terminal went away
    WindowClosed,
}

impl InterruptSource {
    /// Signals and window teardown are honoured even during the startup
    /// grace period; input and focus events are not, since the host emits
    /// them while the window is being created.
    pub fn bypasses_grace(self) -> bool {
        matches!(self, InterruptSource::Signal | InterruptSource::WindowClosed)
    }
}

impl std::fmt::Display for InterruptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InterruptSource::Signal => "signal",
            InterruptSource::Input => "input",
            InterruptSource::FocusLost => "focus_lost",
            InterruptSource::WindowClosed => "window_closed",
        };
        f.write_str(name)
    }
}

/// What happened to a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationRequest {
    /// This request tripped the gate and ran the termination payload
    Executed,
    /// Termination had already happened; nothing was done
    AlreadyTerminated,
    /// Dropped because the startup grace period is still running
    IgnoredDuringGrace,
}

/// What a render driver should draw right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameView {
    Downloading(Vec<BlockState>),
    Countdown(u32),
    Terminated,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    phase: LifecyclePhase,
    countdown: u32,
}

/// Owns the current simulation and the process-wide termination gate.
pub struct LifecycleCoordinator<Ctx: GlowContext> {
    ctx: Arc<Ctx>,

    config: SaverConfig,

    total_units: usize,

    /// End-of-session action, run once on termination
    session: Arc<dyn SessionAction>,

    /// The single live engine; replaced wholesale on restart
    engine: RwLock<Arc<SimulationEngine<Ctx>>>,

    status: Mutex<Status>,

    /// Number of restarts performed
    generation: AtomicU64,

    /// Context time at construction, for the grace period
    started_at: Duration,

    rng: Mutex<StdRng>,

    /// Tripped by the first terminate() call
    gate: OneShotSignal,

    /// Raised once the termination payload has finished
    finished: OneShotSignal,
}

impl<Ctx: GlowContext> LifecycleCoordinator<Ctx> {
    /// Creates a coordinator in the `Downloading` phase with a fresh,
    /// not yet started engine.
    pub fn new(
        ctx: Arc<Ctx>,
        config: SaverConfig,
        total_units: usize,
        session: Arc<dyn SessionAction>,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(ctx.derive_seed(WORKER_COUNT_STREAM));
        let worker_count = config.draw_worker_count(&mut rng);
        let engine = SimulationEngine::new(
            ctx.clone(),
            total_units,
            worker_count,
            config.pacing.clone(),
            0,
        );
        let started_at = ctx.now();
        debug!(
            seed = ctx.seed(),
            workers = worker_count,
            units = total_units,
            "Coordinator created"
        );

        Self {
            ctx,
            config,
            total_units,
            session,
            engine: RwLock::new(Arc::new(engine)),
            status: Mutex::new(Status {
                phase: LifecyclePhase::Downloading,
                countdown: 0,
            }),
            generation: AtomicU64::new(0),
            started_at,
            rng: Mutex::new(rng),
            gate: OneShotSignal::new(),
            finished: OneShotSignal::new(),
        }
    }

    /// Creates an Arc-wrapped coordinator for sharing across tasks.
    pub fn shared(
        ctx: Arc<Ctx>,
        config: SaverConfig,
        total_units: usize,
        session: Arc<dyn SessionAction>,
    ) -> Arc<Self> {
        Arc::new(Self::new(ctx, config, total_units, session))
    }

    /// Runs the completion watcher until termination.
    ///
    /// Starts the current engine, then for each engine: waits for its
    /// completion signal, counts down, and restarts.
    pub async fn run(&self) {
        if self.is_terminated() {
            return;
        }
        self.current_engine().start(self.config.tick_interval());

        loop {
            let engine = self.current_engine();
            tokio::select! {
                _ = self.gate.wait() => break,
                _ = engine.completed() => {}
            }
            drop(engine);

            if !self.run_countdown().await {
                break;
            }
            self.restart();
        }
        debug!("Lifecycle loop exited");
    }

    /// Counts down `countdown_secs`, one second at a time.
    ///
    /// Returns false if termination was requested before the countdown
    /// expired, in which case the caller must not restart.
    pub async fn run_countdown(&self) -> bool {
        let mut remaining = self.config.countdown_secs;
        self.set_status(LifecyclePhase::Countdown, remaining);
        info!(seconds = remaining, "Simulation finished, counting down to restart");

        while remaining > 0 {
            tokio::select! {
                _ = self.gate.wait() => return false,
                _ = self.ctx.sleep(Duration::from_secs(1)) => {}
            }
            if self.is_terminated() {
                return false;
            }
            remaining -= 1;
            self.set_status(LifecyclePhase::Countdown, remaining);
        }
        !self.is_terminated()
    }

    /// Replaces the current engine with a fresh one and returns to
    /// `Downloading`.
    ///
    /// The old engine is only told to stop; its loop exits by itself on its
    /// next tick boundary. Does nothing once termination has begun.
    pub fn restart(&self) {
        let worker_count = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.config.draw_worker_count(&mut *rng)
        };

        {
            let mut current = self.engine.write().unwrap_or_else(PoisonError::into_inner);
            // Checked under the engine lock: terminate() trips the gate before
            // it takes this lock, so it either sees the new engine or we bail.
            if self.is_terminated() {
                debug!("Restart skipped, termination in progress");
                return;
            }
            current.stop();

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let engine = Arc::new(SimulationEngine::new(
                self.ctx.clone(),
                self.total_units,
                worker_count,
                self.config.pacing.clone(),
                generation,
            ));
            info!(generation, workers = worker_count, "Restarting simulation");
            engine.start(self.config.tick_interval());
            *current = engine;
        }

        self.set_status(LifecyclePhase::Downloading, 0);
    }

    /// Handles a termination request from an interrupt source.
    pub fn request_termination(&self, source: InterruptSource) -> TerminationRequest {
        if !source.bypasses_grace() && self.in_grace_period() {
            debug!(%source, "Ignoring termination request during startup grace period");
            return TerminationRequest::IgnoredDuringGrace;
        }

        if self.terminate() {
            info!(%source, "Terminated");
            TerminationRequest::Executed
        } else {
            debug!(%source, "Termination already done");
            TerminationRequest::AlreadyTerminated
        }
    }

    /// Single-shot termination: stops the current engine and ends the
    /// session. Returns true only for the call that ran the payload; every
    /// other call, concurrent or later, returns false immediately.
    pub fn terminate(&self) -> bool {
        if !self.gate.raise() {
            return false;
        }

        self.current_engine().stop();

        match self.session.end_session() {
            Ok(()) => info!(action = self.session.name(), "Session ended"),
            Err(e) => error!(action = self.session.name(), error = %e, "Failed to end session"),
        }

        self.finished.raise();
        true
    }

    /// Returns true once termination has begun.
    pub fn is_terminated(&self) -> bool {
        self.gate.is_raised()
    }

    /// Waits until the termination payload has completed.
    pub async fn wait_terminated(&self) {
        self.finished.wait().await;
    }

    /// Returns true while input and focus events are still being ignored.
    pub fn in_grace_period(&self) -> bool {
        self.ctx.now().saturating_sub(self.started_at) < self.config.grace_period()
    }

    /// Returns the current engine.
    pub fn current_engine(&self) -> Arc<SimulationEngine<Ctx>> {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the current engine's grid.
    pub fn snapshot(&self) -> Vec<BlockState> {
        self.current_engine().snapshot()
    }

    /// Remaining countdown seconds; `None` outside the countdown.
    pub fn countdown_value(&self) -> Option<u32> {
        let status = *self.status();
        match status.phase {
            LifecyclePhase::Countdown => Some(status.countdown),
            LifecyclePhase::Downloading => None,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.status().phase
    }

    /// What a render driver should draw.
    pub fn view(&self) -> FrameView {
        if self.is_terminated() {
            return FrameView::Terminated;
        }
        let status = *self.status();
        match status.phase {
            LifecyclePhase::Countdown => FrameView::Countdown(status.countdown),
            LifecyclePhase::Downloading => FrameView::Downloading(self.snapshot()),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.current_engine().worker_count()
    }

    /// Number of restarts performed so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn total_units(&self) -> usize {
        self.total_units
    }

    pub fn config(&self) -> &SaverConfig {
        &self.config
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, phase: LifecyclePhase, countdown: u32) {
        *self.status() = Status { phase, countdown };
    }
}
