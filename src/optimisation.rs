//! Code for building and solving the production planning optimisation.
//!
//! The model is built on a HiGHS [`Problem`]. Decision variables are added in a fixed order
//! (product-major, then supplier, then period) and tracked in a [`VariableMap`], so that the
//! values returned by the solver can be read back by key.
use crate::id::{Period, ProductIndex, SupplierIndex};
use crate::normalise::{ModelVariant, NormalisedData};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::{debug, log_enabled};
use std::ops::RangeBounds;

mod constraints;
use constraints::add_constraints;

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
pub type Variable = highs::Col;

/// Identifies a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKey {
    /// Quantity of a product made in a period
    Production(ProductIndex, Period),
    /// Quantity of a product carried forward at the end of a period
    Inventory(ProductIndex, Period),
    /// Quantity of a supplier's scrap allocated to a product in a period
    Procurement(ProductIndex, SupplierIndex, Period),
    /// Whether refining runs in a period (binary)
    RefiningUsed(Period),
    /// Copper mass removed from a product in a period
    RefiningAmount(ProductIndex, Period),
}

/// A map for easy lookup of variables in the problem.
///
/// The entries are ordered (see [`IndexMap`]) and each entry's position is its column in the
/// problem. The objective coefficient of each column is kept too, so that the objective value of a
/// solution can be recalculated from the column values.
#[derive(Default)]
pub struct VariableMap {
    variables: IndexMap<VariableKey, Variable>,
    costs: Vec<f64>,
}

impl VariableMap {
    /// Add a continuous variable to the problem
    fn add_column<B: RangeBounds<f64>>(
        &mut self,
        problem: &mut Problem,
        key: VariableKey,
        cost: f64,
        bounds: B,
    ) {
        let var = problem.add_column(cost, bounds);
        self.insert(key, var, cost);
    }

    /// Add an integer variable to the problem
    fn add_integer_column<B: RangeBounds<f64>>(
        &mut self,
        problem: &mut Problem,
        key: VariableKey,
        cost: f64,
        bounds: B,
    ) {
        let var = problem.add_integer_column(cost, bounds);
        self.insert(key, var, cost);
    }

    fn insert(&mut self, key: VariableKey, var: Variable, cost: f64) {
        let existing = self.variables.insert(key, var).is_some();
        assert!(!existing, "Duplicate entry for var");
        self.costs.push(cost);
    }

    /// Get the [`Variable`] for the given key
    pub fn get(&self, key: VariableKey) -> Variable {
        *self
            .variables
            .get(&key)
            .expect("No variable found for given key")
    }

    /// Get the refining amount variable, if this is a refining model
    pub fn refining_amount(&self, product: ProductIndex, period: Period) -> Option<Variable> {
        self.variables
            .get(&VariableKey::RefiningAmount(product, period))
            .copied()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether there are no variables
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// The column position of the given key
    fn position(&self, key: VariableKey) -> usize {
        self.variables
            .get_index_of(&key)
            .expect("No variable found for given key")
    }
}

/// A fully specified optimisation problem, ready to be solved
pub struct PlanningProblem {
    problem: Problem,
    variables: VariableMap,
    variant: ModelVariant,
}

impl PlanningProblem {
    /// The model variant which was built
    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Number of decision variables
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints
    pub fn num_constraints(&self) -> usize {
        self.problem.num_rows()
    }
}

/// The result of attempting to solve a [`PlanningProblem`]
pub enum SolveOutcome {
    /// An optimal plan was found
    Optimal(Solution),
    /// No plan satisfies the constraints
    Infeasible,
    /// The objective can decrease without limit
    Unbounded,
    /// The solver failed, e.g. due to numerical problems
    Error(String),
}

impl SolveOutcome {
    /// A short description of the outcome, for logs and output files
    pub fn status(&self) -> &'static str {
        match self {
            Self::Optimal(_) => "optimal",
            Self::Infeasible => "infeasible",
            Self::Unbounded => "unbounded",
            Self::Error(_) => "error",
        }
    }

    /// The solution, if one was found
    pub fn into_solution(self) -> Option<Solution> {
        match self {
            Self::Optimal(solution) => Some(solution),
            _ => None,
        }
    }
}

/// The solution to the planning optimisation
pub struct Solution {
    values: Vec<f64>,
    variables: VariableMap,
    variant: ModelVariant,
}

impl Solution {
    /// The value of the given variable
    pub fn value(&self, key: VariableKey) -> f64 {
        self.values[self.variables.position(key)]
    }

    /// The value of the objective function
    pub fn objective_value(&self) -> f64 {
        self.variables
            .costs
            .iter()
            .zip(self.values.iter())
            .map(|(cost, value)| cost * value)
            .sum()
    }

    /// The model variant which was solved
    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Iterate over all variables and their values
    pub fn iter_values(&self) -> impl Iterator<Item = (VariableKey, f64)> {
        self.variables
            .variables
            .keys()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// Build the optimisation problem for the given data.
///
/// Builds the refining variant if `data` contains refining data and the baseline variant
/// otherwise. This cannot fail: whether the problem has a solution is only discovered by
/// [`solve`].
pub fn build_model(data: &NormalisedData) -> PlanningProblem {
    let mut problem = Problem::default();
    let variables = add_variables(&mut problem, data);
    add_constraints(&mut problem, &variables, data);

    let variant = data.variant();
    debug!(
        "Built {variant:?} model with {} variables and {} constraints",
        variables.len(),
        problem.num_rows()
    );

    PlanningProblem {
        problem,
        variables,
        variant,
    }
}

/// Solve the problem with HiGHS.
///
/// Only an optimal status gives access to variable values.
pub fn solve(problem: PlanningProblem) -> SolveOutcome {
    let PlanningProblem {
        problem,
        variables,
        variant,
    } = problem;

    let mut model = problem.optimise(Sense::Minimise);
    configure_highs(&mut model);

    let solved = match model.try_solve() {
        Ok(solved) => solved,
        Err(status) => return SolveOutcome::Error(format!("HiGHS error: {status:?}")),
    };

    match solved.status() {
        HighsModelStatus::Optimal => SolveOutcome::Optimal(Solution {
            values: solved.get_solution().columns().to_vec(),
            variables,
            variant,
        }),
        // Costs are non-negative, so the objective is bounded below and this means infeasible
        HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
            SolveOutcome::Infeasible
        }
        HighsModelStatus::Unbounded => SolveOutcome::Unbounded,
        status => SolveOutcome::Error(format!("Could not solve: {status:?}")),
    }
}

/// Build and solve the model for the given data in one step
pub fn build_and_solve(data: &NormalisedData) -> SolveOutcome {
    solve(build_model(data))
}

/// Set options for the HiGHS solver
fn configure_highs(model: &mut highs::Model) {
    // HiGHS writes straight to stdout rather than via our logger, so only show its output when the
    // user has asked for everything
    model.set_option("output_flag", log_enabled!(log::Level::Trace));

    // Solve MIPs to optimality, so that costs from different solves can be compared
    model.set_option("mip_rel_gap", 0.0);
    model.set_option("mip_abs_gap", 0.0);
}

/// Add variables to the optimisation problem.
///
/// # Arguments
///
/// * `problem` - The optimisation problem
/// * `data` - The normalised scenario data
///
/// # Returns
///
/// A [`VariableMap`] with the problem's variables as values.
fn add_variables(problem: &mut Problem, data: &NormalisedData) -> VariableMap {
    let mut variables = VariableMap::default();

    for product in data.products() {
        for period in data.periods() {
            variables.add_column(
                problem,
                VariableKey::Production(product, period),
                0.0,
                0.0..,
            );
        }
    }

    for product in data.products() {
        for period in data.periods() {
            variables.add_column(
                problem,
                VariableKey::Inventory(product, period),
                data.storage_cost[product],
                0.0..,
            );
        }
    }

    for product in data.products() {
        for supplier in data.suppliers() {
            for period in data.periods() {
                variables.add_column(
                    problem,
                    VariableKey::Procurement(product, supplier, period),
                    data.procurement_cost[supplier],
                    0.0..,
                );
            }
        }
    }

    if let Some(refining) = &data.refining {
        for period in data.periods() {
            variables.add_integer_column(
                problem,
                VariableKey::RefiningUsed(period),
                refining.fixed_cost,
                0.0..=1.0,
            );
        }

        for product in data.products() {
            for period in data.periods() {
                variables.add_column(
                    problem,
                    VariableKey::RefiningAmount(product, period),
                    refining.unit_cost,
                    0.0..,
                );
            }
        }
    }

    variables
}
