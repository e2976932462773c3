//! Bisection search for the lowest copper limit which does not increase total cost.
//!
//! The search treats the model as a black box: a [`CostOracle`] gives the optimal cost at a given
//! copper limit (or nothing if there is no plan). The cost is assumed not to increase as the limit
//! is relaxed. This isn't guaranteed by the model, so [`check_monotonicity`] can be used to look
//! for counterexamples on a grid of limits.
use crate::input::deserialise_proportion;
use crate::normalise::{ModelVariant, NormalisedData};
use crate::optimisation::{SolveOutcome, build_and_solve};
use crate::scenario::{MalformedScenario, Scenario};
use crate::units::Dimensionless;
use anyhow::{Result, bail, ensure};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Parameters for [`find_minimum_limit`]
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    /// Lower end of the search bracket
    #[serde(deserialize_with = "deserialise_proportion")]
    pub low: f64,
    /// Upper end of the search bracket
    #[serde(deserialize_with = "deserialise_proportion")]
    pub high: f64,
    /// The search stops once the bracket is no wider than this
    pub tolerance: f64,
    /// Absolute difference within which a cost counts as equal to the baseline
    pub cost_tolerance: f64,
    /// The (known feasible) limit at which the baseline cost is calculated. Defaults to `high`.
    pub baseline_limit: Option<f64>,
    /// Whether to check that cost doesn't increase as the limit is relaxed
    pub verify_monotonicity: bool,
    /// Number of evenly spaced limits to evaluate when checking monotonicity
    pub monotonicity_samples: usize,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            low: 0.01,
            high: 0.5,
            tolerance: 1e-7,
            cost_tolerance: 1e-8,
            baseline_limit: None,
            verify_monotonicity: false,
            monotonicity_samples: 11,
        }
    }
}

impl SearchParameters {
    /// Check that the parameters make sense
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.low < self.high,
            "Search bracket is empty (low = {}, high = {})",
            self.low,
            self.high
        );
        ensure!(
            self.tolerance.is_finite() && self.tolerance > 0.0,
            "Search tolerance must be a positive number"
        );
        ensure!(
            self.cost_tolerance.is_finite() && self.cost_tolerance >= 0.0,
            "Cost tolerance must be a non-negative number"
        );
        if let Some(limit) = self.baseline_limit {
            ensure!(
                (0.0..=1.0).contains(&limit),
                "Baseline limit must be between 0 and 1"
            );
        }
        ensure!(
            self.monotonicity_samples >= 2,
            "At least two samples are needed to check monotonicity"
        );

        Ok(())
    }

    /// The most bisection steps needed to shrink the bracket to within the tolerance
    pub fn max_iterations(&self) -> usize {
        ((self.high - self.low) / self.tolerance).log2().ceil().max(0.0) as usize
    }

    /// The limit at which the baseline cost is calculated
    pub fn baseline_limit(&self) -> f64 {
        self.baseline_limit.unwrap_or(self.high)
    }
}

/// Gives the optimal cost of a plan at a given copper limit
pub trait CostOracle {
    /// The optimal cost, or `None` if there is no plan at this limit
    fn cost_at(&mut self, limit: f64) -> Option<f64>;
}

impl<F: FnMut(f64) -> Option<f64>> CostOracle for F {
    fn cost_at(&mut self, limit: f64) -> Option<f64> {
        self(limit)
    }
}

/// Solves the refining model for each limit it is asked about
pub struct RefiningOracle {
    data: NormalisedData,
    solves: usize,
}

impl RefiningOracle {
    /// Create an oracle for the given scenario.
    ///
    /// Any copper limits in the scenario are ignored, as each solve sets its own.
    pub fn new(scenario: &Scenario) -> Result<Self, MalformedScenario> {
        let scenario = scenario.with_copper_limit(Dimensionless(0.0))?;
        let data = NormalisedData::new(&scenario, ModelVariant::Refining)?;
        Ok(Self { data, solves: 0 })
    }

    /// The number of models solved so far
    pub fn solves(&self) -> usize {
        self.solves
    }
}

impl CostOracle for RefiningOracle {
    fn cost_at(&mut self, limit: f64) -> Option<f64> {
        self.solves += 1;
        match build_and_solve(&self.data.with_copper_limit(limit)) {
            SolveOutcome::Optimal(solution) => Some(solution.objective_value()),
            SolveOutcome::Error(reason) => {
                warn!("Solver failed at copper limit {limit}: {reason}");
                None
            }
            outcome => {
                debug!("No plan at copper limit {limit}: {}", outcome.status());
                None
            }
        }
    }
}

/// One step of the bisection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStep {
    /// Step number, starting from one
    pub iteration: usize,
    /// The copper limit tried
    pub limit: f64,
    /// The optimal cost at this limit, if there was a plan
    pub cost: Option<f64>,
    /// Whether the cost matched the baseline
    pub accepted: bool,
}

/// A pair of limits for which relaxing the limit increased the cost
#[derive(Debug, Clone, PartialEq)]
pub struct MonotonicityViolation {
    /// The tighter of the two limits
    pub tighter_limit: f64,
    /// Cost at the tighter limit (`None` if infeasible)
    pub tighter_cost: Option<f64>,
    /// The looser of the two limits
    pub looser_limit: f64,
    /// Cost at the looser limit (`None` if infeasible)
    pub looser_cost: Option<f64>,
}

/// The result of [`find_minimum_limit`]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// The lowest limit found which keeps the baseline cost, or the top of the bracket if none was
    pub limit: f64,
    /// Whether any limit within the bracket kept the baseline cost
    pub found: bool,
    /// The cost at the baseline limit
    pub baseline_cost: f64,
    /// Each bisection step, in order
    pub steps: Vec<SearchStep>,
    /// Monotonicity violations, if checking was requested
    pub violations: Vec<MonotonicityViolation>,
}

/// Find the smallest copper limit at which the optimal cost equals the baseline cost.
///
/// The baseline cost is found first, by asking the oracle about a limit known to be feasible. Each
/// step then tries the middle of the bracket: if the cost there matches the baseline, the top of
/// the bracket moves down to it, otherwise the bottom moves up. An infeasible midpoint is treated
/// the same as a more expensive one, as both mean the limit is too tight.
///
/// # Returns
///
/// The search outcome, or an error if there is no plan at the baseline limit.
pub fn find_minimum_limit<O: CostOracle>(
    oracle: &mut O,
    params: &SearchParameters,
) -> Result<SearchOutcome> {
    params.validate()?;

    let baseline_limit = params.baseline_limit();
    let Some(baseline_cost) = oracle.cost_at(baseline_limit) else {
        bail!("No feasible plan at the baseline copper limit of {baseline_limit}");
    };
    info!("Baseline cost: {baseline_cost:.2} (copper limit {baseline_limit})");

    let max_iterations = params.max_iterations();
    let (mut low, mut high) = (params.low, params.high);
    let mut best = None;
    let mut steps = Vec::with_capacity(max_iterations);

    // The iteration cap only matters if rounding stops the bracket from shrinking
    while high - low > params.tolerance && steps.len() <= max_iterations {
        let mid = (low + high) / 2.0;
        let cost = oracle.cost_at(mid);
        let accepted =
            cost.is_some_and(|cost| (cost - baseline_cost).abs() < params.cost_tolerance);

        if accepted {
            best = Some(mid);
            high = mid;
        } else {
            low = mid;
        }

        match cost {
            Some(cost) => debug!("Copper limit {mid:.8}: cost {cost:.2}, accepted: {accepted}"),
            None => debug!("Copper limit {mid:.8}: no plan"),
        }
        steps.push(SearchStep {
            iteration: steps.len() + 1,
            limit: mid,
            cost,
            accepted,
        });
    }

    let violations = if params.verify_monotonicity {
        let violations = check_monotonicity(
            oracle,
            params.low,
            params.high,
            params.monotonicity_samples,
            params.cost_tolerance,
        )?;
        for violation in &violations {
            warn!(
                "Cost increased when relaxing copper limit from {} to {} ({:?} -> {:?}); \
                the minimum limit found may not be the lowest",
                violation.tighter_limit,
                violation.looser_limit,
                violation.tighter_cost,
                violation.looser_cost
            );
        }
        violations
    } else {
        Vec::new()
    };

    if best.is_none() {
        warn!(
            "No copper limit below {} keeps the baseline cost",
            params.high
        );
    }

    Ok(SearchOutcome {
        limit: best.unwrap_or(params.high),
        found: best.is_some(),
        baseline_cost,
        steps,
        violations,
    })
}

/// Check whether relaxing the copper limit ever increases cost.
///
/// The oracle is evaluated at `samples` evenly spaced limits from `low` to `high`. Having no plan
/// counts as infinite cost.
///
/// # Returns
///
/// Every pair of neighbouring limits for which the looser limit costs more, or an error if fewer
/// than two samples are requested or `high` is below `low`.
pub fn check_monotonicity<O: CostOracle>(
    oracle: &mut O,
    low: f64,
    high: f64,
    samples: usize,
    cost_tolerance: f64,
) -> Result<Vec<MonotonicityViolation>> {
    ensure!(
        samples >= 2,
        "At least two samples are needed to check monotonicity"
    );
    ensure!(low <= high, "Cannot check monotonicity from {low} down to {high}");

    let step = (high - low) / (samples - 1) as f64;
    let points: Vec<_> = (0..samples)
        .map(|i| {
            let limit = low + step * i as f64;
            (limit, oracle.cost_at(limit))
        })
        .collect();

    let violations = points
        .windows(2)
        .filter_map(|pair| {
            let (tighter_limit, tighter_cost) = pair[0];
            let (looser_limit, looser_cost) = pair[1];
            let tighter = tighter_cost.unwrap_or(f64::INFINITY);
            let looser = looser_cost.unwrap_or(f64::INFINITY);
            (looser > tighter + cost_tolerance).then_some(MonotonicityViolation {
                tighter_limit,
                tighter_cost,
                looser_limit,
                looser_cost,
            })
        })
        .collect();

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, copper_blend_scenario};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Cost is flat above `threshold` and rises linearly below it
    fn kinked_oracle(threshold: f64) -> impl FnMut(f64) -> Option<f64> {
        move |limit| Some(100.0 + 1000.0 * (threshold - limit).max(0.0))
    }

    #[rstest]
    #[case(0.123)]
    #[case(0.0183)]
    #[case(0.49)]
    fn test_find_minimum_limit_converges(#[case] threshold: f64) {
        let params = SearchParameters::default();
        let outcome = find_minimum_limit(&mut kinked_oracle(threshold), &params).unwrap();
        assert!(outcome.found);
        assert_approx_eq!(f64, outcome.baseline_cost, 100.0);
        assert!(outcome.limit >= threshold);
        assert!(outcome.limit - threshold <= params.tolerance);
        assert!(outcome.steps.len() <= params.max_iterations());
    }

    #[test]
    fn test_find_minimum_limit_infeasible_below_threshold() {
        let mut oracle = |limit: f64| (limit >= 0.2).then_some(50.0);
        let outcome = find_minimum_limit(&mut oracle, &SearchParameters::default()).unwrap();
        assert!(outcome.found);
        assert!((outcome.limit - 0.2).abs() <= 1e-7);
        assert!(outcome.steps.iter().any(|step| step.cost.is_none()));
    }

    #[test]
    fn test_find_minimum_limit_no_improvement() {
        // Any limit below the top of the bracket costs more
        let mut oracle = |limit: f64| Some(if limit >= 0.5 { 10.0 } else { 20.0 });
        let params = SearchParameters::default();
        let outcome = find_minimum_limit(&mut oracle, &params).unwrap();
        assert!(!outcome.found);
        assert_eq!(outcome.limit, params.high);
        assert!(outcome.steps.iter().all(|step| !step.accepted));
    }

    #[test]
    fn test_find_minimum_limit_baseline_infeasible() {
        let mut oracle = |_: f64| -> Option<f64> { None };
        assert_error!(
            find_minimum_limit(&mut oracle, &SearchParameters::default()),
            "No feasible plan at the baseline copper limit of 0.5"
        );
    }

    #[test]
    fn test_find_minimum_limit_bad_parameters() {
        let params = SearchParameters {
            low: 0.3,
            high: 0.2,
            ..Default::default()
        };
        assert!(find_minimum_limit(&mut kinked_oracle(0.1), &params).is_err());
    }

    #[rstest]
    #[case(0.01, 0.5, 1e-7, 23)]
    #[case(0.0, 1.0, 0.25, 2)]
    #[case(0.0, 1.0, 0.3, 2)]
    fn test_max_iterations(
        #[case] low: f64,
        #[case] high: f64,
        #[case] tolerance: f64,
        #[case] expected: usize,
    ) {
        let params = SearchParameters {
            low,
            high,
            tolerance,
            ..Default::default()
        };
        assert_eq!(params.max_iterations(), expected);
    }

    #[test]
    fn test_check_monotonicity() {
        assert!(
            check_monotonicity(&mut kinked_oracle(0.2), 0.0, 0.5, 11, 1e-8)
                .unwrap()
                .is_empty()
        );

        // Cost jumps up between 0.3 and 0.35
        let mut oracle = |limit: f64| Some(if limit > 0.32 { 2.0 } else { 1.0 });
        let violations = check_monotonicity(&mut oracle, 0.0, 0.5, 11, 1e-8).unwrap();
        assert_eq!(violations.len(), 1);
        assert_approx_eq!(f64, violations[0].tighter_limit, 0.3);
        assert_approx_eq!(f64, violations[0].looser_limit, 0.35);

        // Becoming infeasible as the limit relaxes is also a violation
        let mut oracle = |limit: f64| (limit < 0.25).then_some(1.0);
        assert_eq!(
            check_monotonicity(&mut oracle, 0.0, 0.5, 11, 1e-8)
                .unwrap()
                .len(),
            1
        );
    }

    #[rstest]
    #[case(0, 0.0, 0.5, "At least two samples are needed to check monotonicity")]
    #[case(1, 0.0, 0.5, "At least two samples are needed to check monotonicity")]
    #[case(11, 0.5, 0.0, "Cannot check monotonicity from 0.5 down to 0")]
    fn test_check_monotonicity_bad_grid(
        #[case] samples: usize,
        #[case] low: f64,
        #[case] high: f64,
        #[case] msg: &str,
    ) {
        let mut calls = 0;
        let mut oracle = |_: f64| {
            calls += 1;
            Some(1.0)
        };
        assert_error!(
            check_monotonicity(&mut oracle, low, high, samples, 1e-8),
            msg
        );
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_find_minimum_limit_reports_violations() {
        let mut oracle = |limit: f64| Some(if limit > 0.32 { 2.0 } else { 1.0 });
        let params = SearchParameters {
            verify_monotonicity: true,
            ..Default::default()
        };
        let outcome = find_minimum_limit(&mut oracle, &params).unwrap();
        assert_eq!(outcome.violations.len(), 1);
    }

    #[rstest]
    fn test_refining_oracle_finds_blend_limit(copper_blend_scenario: Scenario) {
        // The cheap supplier's scrap is 4% copper and refining is prohibitively expensive, so the
        // cheapest plan is only possible with a limit of at least 0.04
        let mut oracle = RefiningOracle::new(&copper_blend_scenario).unwrap();
        let params = SearchParameters {
            cost_tolerance: 1e-6,
            ..Default::default()
        };
        let outcome = find_minimum_limit(&mut oracle, &params).unwrap();
        assert!(outcome.found);
        assert_approx_eq!(f64, outcome.baseline_cost, 50.0, epsilon = 1e-6);
        assert!((outcome.limit - 0.04).abs() < 1e-5);
        assert_eq!(oracle.solves(), outcome.steps.len() + 1);
    }

    #[rstest]
    fn test_refining_oracle_is_monotonic(copper_blend_scenario: Scenario) {
        let mut oracle = RefiningOracle::new(&copper_blend_scenario).unwrap();
        assert!(
            check_monotonicity(&mut oracle, 0.0, 0.1, 6, 1e-6)
                .unwrap()
                .is_empty()
        );
    }
}
