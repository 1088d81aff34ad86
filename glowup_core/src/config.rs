//! Saver configuration.
//!
//! One immutable [`SaverConfig`] is resolved at startup (defaults, then an
//! optional JSON file, then CLI/environment overrides) and handed to the
//! constructors that need it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors, reported once at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("worker_options must contain at least one worker count")]
    NoWorkerOptions,

    #[error("worker_options must not contain zero")]
    ZeroWorkerOption,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("{name}: min {min_ms}ms is greater than max {max_ms}ms")]
    InvertedRange {
        name: &'static str,
        min_ms: u64,
        max_ms: u64,
    },

    #[error("stall_probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("stalls add {stall_ms_per_tick:.1}ms per {tick_ms}ms tick; blocks never finish")]
    StallsOutpaceTicks { stall_ms_per_tick: f64, tick_ms: u64 },

    #[error("layout ball_size + ball_padding must be greater than zero")]
    EmptyCell,

    #[error("layout ball_size + ball_padding does not fit in 32 bits")]
    CellOverflow,

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Inclusive range of durations, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DurationRange {
    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draws a duration uniformly from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min_ms >= self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }

    /// Midpoint of the range, in milliseconds.
    pub fn mean_ms(&self) -> f64 {
        (self.min_ms as f64 + self.max_ms as f64) / 2.0
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min_ms > self.max_ms {
            return Err(ConfigError::InvertedRange {
                name,
                min_ms: self.min_ms,
                max_ms: self.max_ms,
            });
        }
        Ok(())
    }
}

/// Per-block timing of the simulated workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Duration of each worker's first block (fast initial burst)
    pub initial_block: DurationRange,

    /// Duration of every following block
    pub steady_block: DurationRange,

    /// Chance, per worker per tick, that the current block stalls
    pub stall_probability: f64,

    /// Extra time added to a block when it stalls
    pub stall_extension: DurationRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            initial_block: DurationRange::from_millis(800, 3300),
            steady_block: DurationRange::from_millis(800, 3800),
            stall_probability: 0.05,
            stall_extension: DurationRange::from_millis(300, 1300),
        }
    }
}

impl PacingConfig {
    /// Pacing without stalls and with fixed block durations.
    pub fn fixed(block: Duration) -> Self {
        let ms = block.as_millis() as u64;
        Self {
            initial_block: DurationRange::from_millis(ms, ms),
            steady_block: DurationRange::from_millis(ms, ms),
            stall_probability: 0.0,
            stall_extension: DurationRange::from_millis(0, 0),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.initial_block.validate("initial_block")?;
        self.steady_block.validate("steady_block")?;
        self.stall_extension.validate("stall_extension")?;
        if !(0.0..=1.0).contains(&self.stall_probability) {
            return Err(ConfigError::InvalidProbability(self.stall_probability));
        }
        Ok(())
    }
}

/// Grid cell geometry, in the screen source's unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub ball_size: u32,
    pub ball_padding: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            ball_size: 1,
            ball_padding: 1,
        }
    }
}

/// Top-level saver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaverConfig {
    /// Title shown by the host window/terminal
    pub title: String,

    /// Candidate worker counts, one drawn per simulation
    pub worker_options: Vec<usize>,

    /// Simulation tick interval
    pub tick_interval_ms: u64,

    /// How often the render driver redraws
    pub render_interval_ms: u64,

    /// Countdown length between simulations, in seconds
    pub countdown_secs: u32,

    /// Input and focus events are ignored this long after startup
    pub grace_period_ms: u64,

    pub pacing: PacingConfig,

    pub layout: LayoutConfig,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            title: "Glow up".to_string(),
            // Primes give visually distinct partitions
            worker_options: vec![7, 11, 13],
            tick_interval_ms: 250,
            render_interval_ms: 500,
            countdown_secs: 3,
            grace_period_ms: 5000,
            pacing: PacingConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl SaverConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Checks every invariant the simulation core relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_options.is_empty() {
            return Err(ConfigError::NoWorkerOptions);
        }
        if self.worker_options.contains(&0) {
            return Err(ConfigError::ZeroWorkerOption);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("tick_interval_ms"));
        }
        if self.render_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("render_interval_ms"));
        }
        match self.layout.ball_size.checked_add(self.layout.ball_padding) {
            Some(0) => return Err(ConfigError::EmptyCell),
            None => return Err(ConfigError::CellOverflow),
            Some(_) => {}
        }
        self.pacing.validate()?;

        // Stalls only push deadlines forward; if they do so faster than time
        // passes, a block is never due.
        let stall_ms_per_tick =
            self.pacing.stall_probability * self.pacing.stall_extension.mean_ms();
        if stall_ms_per_tick >= self.tick_interval_ms as f64 {
            return Err(ConfigError::StallsOutpaceTicks {
                stall_ms_per_tick,
                tick_ms: self.tick_interval_ms,
            });
        }
        Ok(())
    }

    /// Draws a worker count from `worker_options`.
    pub fn draw_worker_count<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.worker_options.is_empty() {
            return 1;
        }
        self.worker_options[rng.gen_range(0..self.worker_options.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_config_is_valid() {
        let config = SaverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_options, vec![7, 11, 13]);
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.countdown_secs, 3);
    }

    #[test]
    fn test_rejects_bad_worker_options() {
        let mut config = SaverConfig::default();
        config.worker_options.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoWorkerOptions)));

        config.worker_options = vec![3, 0];
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWorkerOption)));
    }

    #[test]
    fn test_rejects_inverted_range_and_probability() {
        let mut config = SaverConfig::default();
        config.pacing.steady_block = DurationRange::from_millis(500, 100);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange { name: "steady_block", .. })
        ));

        let mut config = SaverConfig::default();
        config.pacing.stall_probability = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidProbability(_))));
    }

    #[test]
    fn test_rejects_stalls_that_outpace_ticks() {
        let mut config = SaverConfig::default();
        config.pacing.stall_probability = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::StallsOutpaceTicks { .. })));

        config.pacing.stall_probability = 0.2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_cell_size_overflow() {
        let json = r#"{ "layout": { "ball_size": 4294967295, "ball_padding": 1 } }"#;
        let config = SaverConfig::from_json_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::CellOverflow)));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "countdown_secs": 5, "pacing": { "stall_probability": 0.0 } }"#;
        let config = SaverConfig::from_json_str(json).unwrap();
        assert_eq!(config.countdown_secs, 5);
        assert_eq!(config.pacing.stall_probability, 0.0);
        assert_eq!(config.pacing.initial_block, DurationRange::from_millis(800, 3300));
        assert_eq!(config.worker_options, vec![7, 11, 13]);
    }

    #[test]
    fn test_draw_worker_count_from_options() {
        let config = SaverConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert!(config.worker_options.contains(&config.draw_worker_count(&mut rng)));
        }
    }

    #[test]
    fn test_duration_range_sample_bounds() {
        let range = DurationRange::from_millis(800, 3300);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let d = range.sample(&mut rng);
            assert!(d >= Duration::from_millis(800) && d <= Duration::from_millis(3300));
        }
        assert_eq!(DurationRange::from_millis(5, 5).sample(&mut rng), Duration::from_millis(5));
    }
}
