//! Glow Up Core - simulated multi-worker download and its lifecycle.
//!
//! This library provides the two engines behind the saver:
//! 1. **SimulationEngine**: partitions a fixed grid of blocks across a set
//!    of simulated workers and advances them on a fixed tick
//! 2. **LifecycleCoordinator**: reacts to completion with a countdown and a
//!    fresh engine, and owns the single-shot termination gate every
//!    interrupt source funnels into
//!
//! Both are generic over [`glowup_env::GlowContext`], so the same code runs
//! under tokio in production and under the virtual clock of `glowup_sim`.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod grid;
pub mod layout;
pub mod signal;
pub mod worker;

#[cfg(feature = "dashboard")]
pub mod dashboard;

// Re-export key types for convenience
pub use config::{ConfigError, DurationRange, LayoutConfig, PacingConfig, SaverConfig};
pub use coordinator::{
    FrameView, InterruptSource, LifecycleCoordinator, LifecyclePhase, TerminationRequest,
};
pub use engine::{SimulationEngine, TickOutcome};
pub use grid::{BlockGrid, BlockState};
pub use layout::GridLayout;
pub use signal::OneShotSignal;
pub use worker::{partition, Worker};
