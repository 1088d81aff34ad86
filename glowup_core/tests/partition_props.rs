//! Property tests for worker range partitioning and engine start-up state.

use glowup_core::{partition, BlockState, PacingConfig, SimulationEngine};
use glowup_env::TokioContext;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn ranges_cover_grid_without_gaps(total in 0usize..2000, workers in 1usize..64) {
        let ranges = partition(total, workers);
        prop_assert_eq!(ranges.len(), workers);

        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            prop_assert!(range.end >= range.start);
            next = range.end;
        }
        prop_assert_eq!(next, total);
    }

    #[test]
    fn remainder_goes_to_lowest_workers(total in 0usize..2000, workers in 1usize..64) {
        let ranges = partition(total, workers);
        let base = total / workers;
        let remainder = total % workers;
        for (i, range) in ranges.iter().enumerate() {
            let expected = if i < remainder { base + 1 } else { base };
            prop_assert_eq!(range.len(), expected);
        }
    }

    #[test]
    fn fresh_engine_activates_first_block_of_each_range(
        total in 0usize..300,
        workers in 1usize..20,
    ) {
        let engine = SimulationEngine::new(
            Arc::new(TokioContext::new()),
            total,
            workers,
            PacingConfig::default(),
            0,
        );
        let snapshot = engine.snapshot();
        prop_assert_eq!(snapshot.len(), total);

        let mut expected = vec![BlockState::Idle; total];
        for range in engine.ranges().into_iter().filter(|r| !r.is_empty()) {
            expected[range.start] = BlockState::Active;
        }
        prop_assert_eq!(snapshot, expected);
    }
}
