//! Glow Up Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the saver's simulation
//! core run both in **Production** (tokio) and under the deterministic
//! **Simulation** harness.
//!
//! # Core Concept
//!
//! Everything the core would otherwise take from the outside world goes
//! through a trait:
//! - Time (`now()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - Randomness (`derive_seed()`)
//! - The end-of-session action (`SessionAction`)
//! - Screen dimensions (`ScreenSource`)
//!
//! By deriving all entropy from a single 64-bit seed, any simulation run
//! becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use glowup_env::{GlowContext, TokioContext};
//!
//! async fn tick_loop<Ctx: GlowContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(250)).await;
//!         tick();
//!     }
//! }
//! ```

mod context;
mod error;
mod session;
mod tokio_impl;
mod types;

pub use context::GlowContext;
pub use error::EnvError;
pub use session::{NoopSession, ScreenSource, SessionAction};
pub use tokio_impl::TokioContext;
pub use types::ScreenSize;
