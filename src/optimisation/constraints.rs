//! Code for adding constraints to the planning optimisation problem.
use super::{Variable, VariableKey, VariableMap};
use crate::id::{Period, ProductIndex};
use crate::normalise::{NormalisedData, RefiningData};
use highs::RowProblem as Problem;

/// Add all constraints for the model.
///
/// The refining constraints are only added if `data` contains refining data.
pub fn add_constraints(problem: &mut Problem, variables: &VariableMap, data: &NormalisedData) {
    add_demand_constraints(problem, variables, data);
    add_mass_balance_constraints(problem, variables, data);
    add_content_balance_constraints(problem, variables, data);
    add_capacity_constraints(problem, variables, data);
    add_supply_constraints(problem, variables, data);

    if let Some(refining) = &data.refining {
        add_copper_limit_constraints(problem, variables, data, refining);
        add_refining_link_constraints(problem, variables, data, refining);
    }
}

/// The production term, net of any copper removed by refining.
///
/// Refining removes mass before demand and content targets are checked, so wherever the product
/// itself is meant, `Production - RefiningAmount` is used instead of `Production`.
fn net_production_terms(
    variables: &VariableMap,
    product: ProductIndex,
    period: Period,
    coeff: f64,
) -> Vec<(Variable, f64)> {
    let mut terms = vec![(
        variables.get(VariableKey::Production(product, period)),
        coeff,
    )];
    if let Some(refined) = variables.refining_amount(product, period) {
        terms.push((refined, -coeff));
    }

    terms
}

/// Add demand satisfaction constraints.
///
/// For every product and period:
///
/// `Production[t] - RefiningAmount[t] + Inventory[t-1] - Inventory[t] = Demand[t]`
///
/// There is no opening inventory, so the first period has its own constraint without the
/// `Inventory[t-1]` term.
fn add_demand_constraints(problem: &mut Problem, variables: &VariableMap, data: &NormalisedData) {
    for product in data.products() {
        for period in data.periods() {
            let demand = data.demand[product][period];
            let mut terms = net_production_terms(variables, product, period, 1.0);
            terms.push((variables.get(VariableKey::Inventory(product, period)), -1.0));

            match period.previous() {
                None => {
                    problem.add_row(demand..=demand, terms);
                }
                Some(previous) => {
                    terms.push((variables.get(VariableKey::Inventory(product, previous)), 1.0));
                    problem.add_row(demand..=demand, terms);
                }
            }
        }
    }
}

/// Add mass balance constraints: what is made of a product must all have been bought.
///
/// For every product and period: `Production = Σ_s Procurement[s]`
fn add_mass_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    data: &NormalisedData,
) {
    for product in data.products() {
        for period in data.periods() {
            let mut terms = vec![(variables.get(VariableKey::Production(product, period)), 1.0)];
            terms.extend(data.suppliers().map(|supplier| {
                (
                    variables.get(VariableKey::Procurement(product, supplier, period)),
                    -1.0,
                )
            }));

            problem.add_row(0.0..=0.0, terms);
        }
    }
}

/// Add chromium and nickel content balance constraints.
///
/// Grades are exact alloy specifications, so these are equalities. For every product and period:
///
/// `Ratio * (Production - RefiningAmount) = Σ_s Assay[s] * Procurement[s]`
fn add_content_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    data: &NormalisedData,
) {
    let elements = [
        (&data.chromium_ratio, &data.chromium_content),
        (&data.nickel_ratio, &data.nickel_content),
    ];

    for (ratio, content) in elements {
        for product in data.products() {
            for period in data.periods() {
                let mut terms = net_production_terms(variables, product, period, ratio[product]);
                terms.extend(data.suppliers().map(|supplier| {
                    (
                        variables.get(VariableKey::Procurement(product, supplier, period)),
                        -content[supplier],
                    )
                }));

                problem.add_row(0.0..=0.0, terms);
            }
        }
    }
}

/// Add production capacity constraints.
///
/// For every period: `Σ_p Production[p] <= MaxProduction`
fn add_capacity_constraints(problem: &mut Problem, variables: &VariableMap, data: &NormalisedData) {
    for period in data.periods() {
        let terms = data
            .products()
            .map(|product| (variables.get(VariableKey::Production(product, period)), 1.0));

        problem.add_row(..=data.max_production, terms);
    }
}

/// Add supplier capacity constraints.
///
/// For every period and supplier: `Σ_p Procurement[p] <= MaxSupply`
fn add_supply_constraints(problem: &mut Problem, variables: &VariableMap, data: &NormalisedData) {
    for period in data.periods() {
        for supplier in data.suppliers() {
            let terms = data.products().map(|product| {
                (
                    variables.get(VariableKey::Procurement(product, supplier, period)),
                    1.0,
                )
            });

            problem.add_row(..=data.max_supply[supplier], terms);
        }
    }
}

/// Add copper limit constraints.
///
/// For every product and period, the copper left after refining must not exceed the limit:
///
/// `Σ_s Copper[s] * Procurement[s] - RefiningAmount <= Limit * (Production - RefiningAmount)`
///
/// which is added in the form
///
/// `Σ_s Copper[s] * Procurement[s] + (Limit - 1) * RefiningAmount - Limit * Production <= 0`
fn add_copper_limit_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    data: &NormalisedData,
    refining: &RefiningData,
) {
    for product in data.products() {
        let limit = refining.copper_limit[product];
        for period in data.periods() {
            let mut terms = copper_terms(variables, data, product, period);
            terms.push((
                variables.get(VariableKey::RefiningAmount(product, period)),
                limit - 1.0,
            ));
            terms.push((
                variables.get(VariableKey::Production(product, period)),
                -limit,
            ));

            problem.add_row(..=0.0, terms);
        }
    }
}

/// Add constraints linking the amount refined to whether refining runs.
///
/// For every product and period:
///
/// * `RefiningAmount <= Σ_s Copper[s] * Procurement[s]` (can't remove copper which isn't there)
/// * `RefiningAmount <= M * RefiningUsed` (nothing is removed unless refining runs)
fn add_refining_link_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    data: &NormalisedData,
    refining: &RefiningData,
) {
    for product in data.products() {
        for period in data.periods() {
            let refined = variables.get(VariableKey::RefiningAmount(product, period));

            let mut terms: Vec<_> = copper_terms(variables, data, product, period)
                .into_iter()
                .map(|(var, coeff)| (var, -coeff))
                .collect();
            terms.push((refined, 1.0));
            problem.add_row(..=0.0, terms);

            let used = variables.get(VariableKey::RefiningUsed(period));
            problem.add_row(..=0.0, [(refined, 1.0), (used, -refining.big_m)]);
        }
    }
}

/// Terms for the copper mass in a product's scrap
fn copper_terms(
    variables: &VariableMap,
    data: &NormalisedData,
    product: ProductIndex,
    period: Period,
) -> Vec<(Variable, f64)> {
    data.suppliers()
        .map(|supplier| {
            (
                variables.get(VariableKey::Procurement(product, supplier, period)),
                data.copper_content[supplier],
            )
        })
        .collect()
}
