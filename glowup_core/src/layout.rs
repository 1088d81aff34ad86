//! Grid layout over the available screen area.

use crate::config::LayoutConfig;
use glowup_env::ScreenSize;

/// Number of ball rows and columns that fit the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
}

impl GridLayout {
    /// Fits as many `ball_size + ball_padding` cells as the screen allows.
    pub fn calculate(screen: ScreenSize, layout: &LayoutConfig) -> Self {
        let cell = layout.ball_size.saturating_add(layout.ball_padding).max(1);
        Self {
            rows: (screen.height / cell) as usize,
            cols: (screen.width / cell) as usize,
        }
    }

    /// Total number of blocks, used as the simulation's unit count.
    pub fn block_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Grid position of a block index, row-major.
    pub fn position(&self, index: usize) -> Option<(usize, usize)> {
        if self.cols == 0 || index >= self.block_count() {
            return None;
        }
        Some((index / self.cols, index % self.cols))
    }
}
