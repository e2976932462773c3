//! Cost breakdowns and flat plan tables derived from a solved model.
//!
//! Nothing here re-solves anything: results are read once from a [`Solution`] and the solution can
//! be dropped afterwards.
use crate::id::{IndexedVec, Period, ProductID, SupplierID};
use crate::normalise::NormalisedData;
use crate::optimisation::{Solution, VariableKey};
use crate::units::{Mass, Money, MoneyPerMass};
use serde::{Deserialize, Serialize};

/// The costs of a plan, split by category
#[derive(Debug, Clone, Copy, Default, PartialEq, derive_more::Add, Serialize, Deserialize)]
pub struct Costs {
    /// Cost of buying scrap
    pub procurement: Money,
    /// Cost of carrying inventory between periods
    pub storage: Money,
    /// Fixed cost of running refining
    pub refining_fixed: Money,
    /// Per-unit cost of copper removed by refining
    pub refining_variable: Money,
}

impl Costs {
    /// Combined fixed and variable refining cost
    pub fn refining(&self) -> Money {
        self.refining_fixed + self.refining_variable
    }

    /// Total over all categories
    pub fn total(&self) -> Money {
        self.procurement + self.storage + self.refining()
    }
}

impl std::iter::Sum for Costs {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Costs::default(), |acc, costs| acc + costs)
    }
}

/// A row of the production plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRow {
    /// Period number, starting from one
    pub period: u32,
    /// The product made
    pub product_id: ProductID,
    /// Demand in the period
    pub demand: f64,
    /// Quantity made in the period
    pub production: f64,
    /// Inventory at the end of the period
    pub inventory: f64,
}

/// A row of the procurement plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementRow {
    /// Period number, starting from one
    pub period: u32,
    /// The product the scrap is used for
    pub product_id: ProductID,
    /// The supplier of the scrap
    pub supplier_id: SupplierID,
    /// Quantity bought
    pub quantity: f64,
    /// Cost of the quantity bought
    pub cost: f64,
}

/// A row of the refining plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefiningRow {
    /// Period number, starting from one
    pub period: u32,
    /// The product refined
    pub product_id: ProductID,
    /// Whether refining ran in this period
    pub running: bool,
    /// Copper mass removed from the product
    pub copper_removed: f64,
}

/// A row of the cost breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    /// Period number, or "total" for the whole horizon
    pub period: String,
    /// Cost of buying scrap
    pub procurement: Money,
    /// Cost of carrying inventory
    pub storage: Money,
    /// Fixed refining cost
    pub refining_fixed: Money,
    /// Variable refining cost
    pub refining_variable: Money,
    /// Sum of all the above
    pub total: Money,
}

impl CostRow {
    fn new(period: String, costs: &Costs) -> Self {
        Self {
            period,
            procurement: costs.procurement,
            storage: costs.storage,
            refining_fixed: costs.refining_fixed,
            refining_variable: costs.refining_variable,
            total: costs.total(),
        }
    }
}

/// The plan and costs read from a solution
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResults {
    /// Production and inventory for every product and period
    pub production: Vec<ProductionRow>,
    /// Procurement for every product, supplier and period
    pub procurement: Vec<ProcurementRow>,
    /// Refining activity for every product and period (empty for the baseline model)
    pub refining: Vec<RefiningRow>,
    /// Costs in each period
    pub costs: IndexedVec<Period, Costs>,
}

impl PlanResults {
    /// Read the plan from the solution of the model built for `data`
    pub fn new(data: &NormalisedData, solution: &Solution) -> Self {
        let value = |key| solution.value(key);

        let mut production = Vec::new();
        let mut procurement = Vec::new();
        let mut refining = Vec::new();
        for period in data.periods() {
            let running = data
                .refining
                .as_ref()
                .map(|_| value(VariableKey::RefiningUsed(period)) > 0.5);

            for product in data.products() {
                let product_id = &data.product_ids[product];
                production.push(ProductionRow {
                    period: period.number(),
                    product_id: product_id.clone(),
                    demand: data.demand[product][period],
                    production: value(VariableKey::Production(product, period)),
                    inventory: value(VariableKey::Inventory(product, period)),
                });

                for supplier in data.suppliers() {
                    let quantity = value(VariableKey::Procurement(product, supplier, period));
                    procurement.push(ProcurementRow {
                        period: period.number(),
                        product_id: product_id.clone(),
                        supplier_id: data.supplier_ids[supplier].clone(),
                        quantity,
                        cost: quantity * data.procurement_cost[supplier],
                    });
                }

                if let Some(running) = running {
                    refining.push(RefiningRow {
                        period: period.number(),
                        product_id: product_id.clone(),
                        running,
                        copper_removed: value(VariableKey::RefiningAmount(product, period)),
                    });
                }
            }
        }

        let costs = data
            .periods()
            .map(|period| period_costs(data, solution, period))
            .collect();

        Self {
            production,
            procurement,
            refining,
            costs,
        }
    }

    /// Costs summed over the whole horizon
    pub fn total_costs(&self) -> Costs {
        self.costs.iter().copied().sum()
    }

    /// One cost row per period, followed by a row for the whole horizon
    pub fn cost_rows(&self) -> Vec<CostRow> {
        self.costs
            .iter_indexed()
            .map(|(period, costs)| CostRow::new(period.to_string(), costs))
            .chain(std::iter::once(CostRow::new(
                "total".into(),
                &self.total_costs(),
            )))
            .collect()
    }

    /// Total production over all products and periods
    pub fn total_production(&self) -> Mass {
        self.production.iter().map(|row| Mass(row.production)).sum()
    }

    /// Inventory summed over all products and periods
    pub fn total_inventory(&self) -> Mass {
        self.production.iter().map(|row| Mass(row.inventory)).sum()
    }

    /// Total scrap bought over all suppliers and periods
    pub fn total_procurement(&self) -> Mass {
        self.procurement.iter().map(|row| Mass(row.quantity)).sum()
    }

    /// The periods in which refining ran
    pub fn refining_periods(&self) -> Vec<u32> {
        let mut periods: Vec<_> = self
            .refining
            .iter()
            .filter(|row| row.running)
            .map(|row| row.period)
            .collect();
        periods.dedup();
        periods
    }
}

fn period_costs(data: &NormalisedData, solution: &Solution, period: Period) -> Costs {
    let value = |key| solution.value(key);
    let cost = |unit_cost: f64, quantity: f64| MoneyPerMass(unit_cost) * Mass(quantity);

    let mut costs = Costs::default();
    for product in data.products() {
        costs.storage = costs.storage
            + cost(
                data.storage_cost[product],
                value(VariableKey::Inventory(product, period)),
            );

        for supplier in data.suppliers() {
            costs.procurement = costs.procurement
                + cost(
                    data.procurement_cost[supplier],
                    value(VariableKey::Procurement(product, supplier, period)),
                );
        }
    }

    if let Some(refining) = &data.refining {
        costs.refining_fixed =
            Money(refining.fixed_cost * value(VariableKey::RefiningUsed(period)));
        costs.refining_variable = data
            .products()
            .map(|product| {
                cost(
                    refining.unit_cost,
                    value(VariableKey::RefiningAmount(product, period)),
                )
            })
            .sum();
    }

    costs
}
