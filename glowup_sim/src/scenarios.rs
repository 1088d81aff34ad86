//! Chaos scenarios for DST.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// DST-001: Full-size grid, worker count drawn from the options
    Standard,

    /// DST-002: Zero blocks, complete on the first tick
    EmptyGrid,

    /// DST-003: More workers than blocks
    Oversubscribed,

    /// DST-004: One worker walks the whole grid
    SingleWorker,

    /// DST-005: One in five ticks stalls the current block
    StallStorm,

    /// DST-006: Coordinator completes several restart cycles
    RestartCycle,

    /// DST-007: Many concurrent termination requests
    TerminationStorm,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Standard,
            ScenarioId::EmptyGrid,
            ScenarioId::Oversubscribed,
            ScenarioId::SingleWorker,
            ScenarioId::StallStorm,
            ScenarioId::RestartCycle,
            ScenarioId::TerminationStorm,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Standard => "standard",
            ScenarioId::EmptyGrid => "empty_grid",
            ScenarioId::Oversubscribed => "oversubscribed",
            ScenarioId::SingleWorker => "single_worker",
            ScenarioId::StallStorm => "stall_storm",
            ScenarioId::RestartCycle => "restart_cycle",
            ScenarioId::TerminationStorm => "termination_storm",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Standard => "120 blocks, workers drawn from the options, run to completion",
            ScenarioId::EmptyGrid => "0 blocks, completion on the first tick",
            ScenarioId::Oversubscribed => "5 blocks across 13 workers, empty ranges stay idle",
            ScenarioId::SingleWorker => "30 blocks, one worker walks the grid in order",
            ScenarioId::StallStorm => "20% stall probability, completion still guaranteed",
            ScenarioId::RestartCycle => "3 countdown/restart cycles under the coordinator",
            ScenarioId::TerminationStorm => "32 concurrent termination requests, one payload run",
        }
    }

    /// Returns true if the scenario drives a single engine tick by tick.
    pub fn is_engine_scenario(&self) -> bool {
        !matches!(self, ScenarioId::RestartCycle | ScenarioId::TerminationStorm)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "dst-001" => Ok(ScenarioId::Standard),
            "empty_grid" | "emptygrid" | "dst-002" => Ok(ScenarioId::EmptyGrid),
            "oversubscribed" | "dst-003" => Ok(ScenarioId::Oversubscribed),
            "single_worker" | "singleworker" | "dst-004" => Ok(ScenarioId::SingleWorker),
            "stall_storm" | "stallstorm" | "dst-005" => Ok(ScenarioId::StallStorm),
            "restart_cycle" | "restartcycle" | "dst-006" => Ok(ScenarioId::RestartCycle),
            "termination_storm" | "terminationstorm" | "dst-007" => {
                Ok(ScenarioId::TerminationStorm)
            }
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!("DST-005".parse::<ScenarioId>(), Ok(ScenarioId::StallStorm));
        assert_eq!("StallStorm".parse::<ScenarioId>(), Ok(ScenarioId::StallStorm));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
