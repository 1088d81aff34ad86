//! Block grid: the per-unit progress states of one simulated download.

use serde::{Deserialize, Serialize};

/// State of a single download block.
///
/// Blocks only ever move forward: `Idle -> Active -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockState {
    #[default]
    Idle,
    Active,
    Completed,
}

impl BlockState {
    /// Returns the rank of this state in the forward-only ordering.
    pub fn rank(self) -> u8 {
        match self {
            BlockState::Idle => 0,
            BlockState::Active => 1,
            BlockState::Completed => 2,
        }
    }

    /// Returns true if moving from `self` to `next` never goes backward.
    pub fn can_become(self, next: BlockState) -> bool {
        next.rank() >= self.rank()
    }
}

/// Fixed-size ordered collection of block states.
///
/// Owned exclusively by a `SimulationEngine`; consumers only ever see
/// copies produced by [`BlockGrid::to_vec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockGrid {
    blocks: Vec<BlockState>,
}

impl BlockGrid {
    /// Creates an all-idle grid of `len` blocks.
    pub fn new(len: usize) -> Self {
        Self {
            blocks: vec![BlockState::Idle; len],
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the state at `index`, or `None` when out of bounds.
    pub fn get(&self, index: usize) -> Option<BlockState> {
        self.blocks.get(index).copied()
    }

    /// Sets the state at `index`. Out-of-bounds writes are ignored and
    /// reported as `false`.
    pub(crate) fn set(&mut self, index: usize, state: BlockState) -> bool {
        match self.blocks.get_mut(index) {
            Some(slot) => {
                debug_assert!(slot.can_become(state), "block {index} moved backward");
                *slot = state;
                true
            }
            None => false,
        }
    }

    /// Returns true when every block is `Completed` (vacuously true when empty).
    pub fn all_completed(&self) -> bool {
        self.blocks.iter().all(|b| *b == BlockState::Completed)
    }

    /// Counts blocks in the given state.
    pub fn count(&self, state: BlockState) -> usize {
        self.blocks.iter().filter(|b| **b == state).count()
    }

    /// Returns the first idle block in `range`, clipped to the grid.
    pub(crate) fn first_idle_in(&self, range: std::ops::Range<usize>) -> Option<usize> {
        let end = range.end.min(self.blocks.len());
        (range.start..end).find(|&i| self.blocks[i] == BlockState::Idle)
    }

    /// Returns an independent copy of every block, in index order.
    pub fn to_vec(&self) -> Vec<BlockState> {
        self.blocks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_idle() {
        let grid = BlockGrid::new(5);
        assert_eq!(grid.len(), 5);
        assert_eq!(grid.count(BlockState::Idle), 5);
        assert!(!grid.all_completed());
    }

    #[test]
    fn test_empty_grid_is_complete() {
        let grid = BlockGrid::new(0);
        assert!(grid.is_empty());
        assert!(grid.all_completed());
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut grid = BlockGrid::new(2);
        assert_eq!(grid.get(2), None);
        assert!(!grid.set(2, BlockState::Active));
        assert!(grid.set(1, BlockState::Active));
        assert_eq!(grid.get(1), Some(BlockState::Active));
    }

    #[test]
    fn test_first_idle_in_range() {
        let mut grid = BlockGrid::new(6);
        grid.set(2, BlockState::Active);
        grid.set(3, BlockState::Completed);

        assert_eq!(grid.first_idle_in(2..5), Some(4));
        assert_eq!(grid.first_idle_in(2..4), None);
        // Clipped to the grid length
        assert_eq!(grid.first_idle_in(5..40), Some(5));
    }

    #[test]
    fn test_state_ordering() {
        assert!(BlockState::Idle.can_become(BlockState::Active));
        assert!(BlockState::Active.can_become(BlockState::Completed));
        assert!(!BlockState::Completed.can_become(BlockState::Active));
        assert!(!BlockState::Active.can_become(BlockState::Idle));
    }

    #[test]
    fn test_to_vec_is_a_copy() {
        let mut grid = BlockGrid::new(3);
        let before = grid.to_vec();
        grid.set(0, BlockState::Active);

        assert_eq!(before[0], BlockState::Idle);
        assert_eq!(grid.get(0), Some(BlockState::Active));
    }
}
