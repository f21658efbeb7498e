//! Scenario → aggregated output, in one call.

use crate::aggregate::{Aggregated, OutputMode, aggregate};
use crate::distribution::DiameterWeights;
use crate::engine::ComputeEngine;
use crate::error::Result;
use crate::grid::SampleGrid;
use crate::scenario::ScenarioRequest;

/// Aggregated output together with the grid it was sampled on.
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub grid: SampleGrid,
    pub output: Aggregated,
}

/// Validate, expand, evaluate and aggregate `scenario` on `engine`.
///
/// Every configuration check (including weight normalization) happens before
/// the batch is dispatched, so a rejected scenario costs no kernel calls.
pub fn compute(engine: &ComputeEngine, scenario: &ScenarioRequest) -> Result<Computed> {
    let grid = SampleGrid::from_scenario(scenario)?;
    let mode = OutputMode::from_effective_flag(scenario.effective_model);
    let weights = match mode {
        OutputMode::Effective => Some(DiameterWeights::from_distribution(
            &scenario.distribution,
            &grid.diameters,
        )?),
        OutputMode::Raw => None,
    };

    let records = engine.run(grid.work_items(scenario))?;
    let output = aggregate(records, mode, weights.as_ref())?;
    Ok(Computed { grid, output })
}
