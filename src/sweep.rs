//! Batch runs over many variants of one scenario.
//!
//! A sweep solves the baseline model for every combination of production capacity and storage
//! cost multipliers. A scan solves the refining model for a range of copper limits. Every variant
//! is built and solved independently, and a variant which can't be solved is recorded (or, for
//! solver errors, skipped) without stopping the batch.
use crate::normalise::{ModelVariant, NormalisedData};
use crate::optimisation::{SolveOutcome, build_and_solve};
use crate::results::PlanResults;
use crate::scenario::Scenario;
use crate::units::{Dimensionless, Mass, Money};
use anyhow::{Result, ensure};
use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// Outcome of solving one variant in a batch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
pub enum SolveStatus {
    /// A plan was found
    #[string = "optimal"]
    Optimal,
    /// No plan satisfies the constraints
    #[string = "infeasible"]
    Infeasible,
    /// The objective has no lower bound
    #[string = "unbounded"]
    Unbounded,
}

/// Solve a variant, logging and discarding solver errors
fn solve_variant(
    data: &NormalisedData,
    description: &str,
) -> Option<(SolveStatus, Option<PlanResults>)> {
    match build_and_solve(data) {
        SolveOutcome::Optimal(solution) => Some((
            SolveStatus::Optimal,
            Some(PlanResults::new(data, &solution)),
        )),
        SolveOutcome::Infeasible => Some((SolveStatus::Infeasible, None)),
        SolveOutcome::Unbounded => Some((SolveStatus::Unbounded, None)),
        SolveOutcome::Error(reason) => {
            warn!("Skipping {description}: {reason}");
            None
        }
    }
}

/// The `[sweep]` section of a scenario file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SweepParameters {
    /// Production capacities to try
    pub max_production: Vec<f64>,
    /// Storage cost multipliers to try for each product, in product order.
    ///
    /// If empty, storage costs are left unchanged.
    #[serde(default)]
    pub storage_cost_multipliers: Vec<Vec<f64>>,
}

impl SweepParameters {
    /// Check the parameters against a scenario with `num_products` products
    pub fn validate(&self, num_products: usize) -> Result<()> {
        ensure!(
            !self.max_production.is_empty(),
            "Sweep must include at least one max_production value"
        );
        ensure!(
            self.max_production
                .iter()
                .all(|value| value.is_finite() && *value >= 0.0),
            "Sweep max_production values must be non-negative"
        );

        if !self.storage_cost_multipliers.is_empty() {
            ensure!(
                self.storage_cost_multipliers.len() == num_products,
                "Sweep gives storage cost multipliers for {} products, but scenario has {}",
                self.storage_cost_multipliers.len(),
                num_products
            );
            ensure!(
                self.storage_cost_multipliers
                    .iter()
                    .all(|values| !values.is_empty()),
                "Each product needs at least one storage cost multiplier"
            );
            ensure!(
                self.storage_cost_multipliers
                    .iter()
                    .flatten()
                    .all(|value| value.is_finite() && *value >= 0.0),
                "Storage cost multipliers must be non-negative"
            );
        }

        Ok(())
    }

    /// Every combination of capacity and per-product multipliers
    fn combinations(&self, num_products: usize) -> Vec<(f64, Vec<f64>)> {
        let multipliers = if self.storage_cost_multipliers.is_empty() {
            vec![vec![1.0; num_products]]
        } else {
            self.storage_cost_multipliers
                .iter()
                .map(|values| values.iter().copied())
                .multi_cartesian_product()
                .collect()
        };

        self.max_production
            .iter()
            .copied()
            .cartesian_product(multipliers)
            .collect()
    }
}

/// A row of the sweep results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    /// Production capacity used
    pub max_production: f64,
    /// Storage cost multipliers used, separated by semicolons
    pub storage_cost_multipliers: String,
    /// Whether a plan was found
    pub status: SolveStatus,
    /// Total cost, if a plan was found
    pub total_cost: Option<Money>,
    /// Procurement cost, if a plan was found
    pub procurement_cost: Option<Money>,
    /// Storage cost, if a plan was found
    pub storage_cost: Option<Money>,
    /// Total production, if a plan was found
    pub total_production: Option<Mass>,
    /// Inventory summed over all periods, if a plan was found
    pub total_inventory: Option<Mass>,
    /// Total scrap bought, if a plan was found
    pub total_procurement: Option<Mass>,
}

/// Solve the baseline model for every combination in the sweep.
///
/// # Returns
///
/// One row per combination which the solver could handle, or an error if the parameters don't fit
/// the scenario.
pub fn run_sweep(scenario: &Scenario, params: &SweepParameters) -> Result<Vec<SweepRow>> {
    let num_products = scenario.products().len();
    params.validate(num_products)?;

    let combinations = params.combinations(num_products);
    info!("Running sweep of {} scenarios", combinations.len());

    let mut rows = Vec::with_capacity(combinations.len());
    for (max_production, multipliers) in combinations {
        let variant = scenario
            .with_max_production(Mass(max_production))
            .with_storage_cost_multipliers(&multipliers);
        let data = NormalisedData::new(&variant, ModelVariant::Baseline)?;
        let multipliers = multipliers.iter().join(";");

        let description =
            format!("max_production = {max_production}, storage multipliers = {multipliers}");
        let Some((status, results)) = solve_variant(&data, &description) else {
            continue;
        };
        let costs = results.as_ref().map(PlanResults::total_costs);

        rows.push(SweepRow {
            max_production,
            storage_cost_multipliers: multipliers,
            status,
            total_cost: costs.map(|costs| costs.total()),
            procurement_cost: costs.map(|costs| costs.procurement),
            storage_cost: costs.map(|costs| costs.storage),
            total_production: results.as_ref().map(PlanResults::total_production),
            total_inventory: results.as_ref().map(PlanResults::total_inventory),
            total_procurement: results.as_ref().map(PlanResults::total_procurement),
        });
    }

    let feasible = rows
        .iter()
        .filter(|row| row.status == SolveStatus::Optimal)
        .count();
    info!("Sweep complete: {feasible} of {} scenarios feasible", rows.len());

    Ok(rows)
}

/// The most copper limits a single scan may solve for
pub const MAX_SCAN_LIMITS: usize = 1_000_000;

/// The `[scan]` section of a scenario file
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanParameters {
    /// First copper limit
    pub start: f64,
    /// Last copper limit
    pub end: f64,
    /// Increment between limits
    pub step: f64,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 0.03,
            step: 0.001,
        }
    }
}

impl ScanParameters {
    /// Check that the parameters describe a non-empty range of fractions
    pub fn validate(&self) -> Result<()> {
        ensure!(
            Dimensionless(self.start).is_fraction() && Dimensionless(self.end).is_fraction(),
            "Scan limits must be between 0 and 1"
        );
        ensure!(self.start <= self.end, "Scan start must not exceed end");
        ensure!(
            self.step.is_finite() && self.step > 0.0,
            "Scan step must be positive"
        );
        ensure!(
            (self.end - self.start) / self.step < MAX_SCAN_LIMITS as f64,
            "Scan step {:e} is too small: at most {MAX_SCAN_LIMITS} copper limits can be scanned",
            self.step
        );

        Ok(())
    }

    /// The copper limits to solve for, from `start` to `end` inclusive
    pub fn limits(&self) -> Vec<f64> {
        // Allow for rounding so that `end` itself is included
        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize;
        (0..=count)
            .map(|i| self.start + self.step * i as f64)
            .collect()
    }
}

/// A row of the copper limit scan results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRow {
    /// The copper limit applied to every product
    pub copper_limit: f64,
    /// Whether a plan was found
    pub status: SolveStatus,
    /// Total cost, if a plan was found
    pub total_cost: Option<Money>,
    /// Procurement cost, if a plan was found
    pub procurement_cost: Option<Money>,
    /// Storage cost, if a plan was found
    pub storage_cost: Option<Money>,
    /// Fixed refining cost, if a plan was found
    pub refining_fixed_cost: Option<Money>,
    /// Variable refining cost, if a plan was found
    pub refining_variable_cost: Option<Money>,
    /// Number of periods in which refining ran, if a plan was found
    pub refining_periods: Option<usize>,
}

/// Solve the refining model at every copper limit in the scan
pub fn run_scan(scenario: &Scenario, params: &ScanParameters) -> Result<Vec<ScanRow>> {
    params.validate()?;

    let data = NormalisedData::new(
        &scenario.with_copper_limit(Dimensionless(params.start))?,
        ModelVariant::Refining,
    )?;

    let limits = params.limits();
    info!("Scanning {} copper limits", limits.len());

    let mut rows = Vec::with_capacity(limits.len());
    for copper_limit in limits {
        let description = format!("copper limit {copper_limit}");
        let Some((status, results)) =
            solve_variant(&data.with_copper_limit(copper_limit), &description)
        else {
            continue;
        };
        let costs = results.as_ref().map(PlanResults::total_costs);

        rows.push(ScanRow {
            copper_limit,
            status,
            total_cost: costs.map(|costs| costs.total()),
            procurement_cost: costs.map(|costs| costs.procurement),
            storage_cost: costs.map(|costs| costs.storage),
            refining_fixed_cost: costs.map(|costs| costs.refining_fixed),
            refining_variable_cost: costs.map(|costs| costs.refining_variable),
            refining_periods: results
                .as_ref()
                .map(|results| results.refining_periods().len()),
        });
    }

    Ok(rows)
}
