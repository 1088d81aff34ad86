//! Glow Up Deterministic Simulation Testing (DST) Harness
//!
//! Runs the saver's engine and lifecycle coordinator against a virtual
//! clock, so every run is reproducible from a single 64-bit seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: the virtual clock moves only when the harness (or a task
//!   sleeping on [`SimContext`]) advances it
//! - **Randomness**: every engine stream is derived from the seed
//! - **Side effects**: the session payload is replaced by a counter
//!
//! # Usage
//!
//! ```ignore
//! use glowup_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Standard);
//! assert!(result.passed);
//! ```

mod context;
mod runner;
pub mod scenarios;
mod session;

pub use context::SimContext;
pub use runner::{InvariantChecker, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use session::CountingSession;
