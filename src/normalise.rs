//! Flattens a [`Scenario`] into the numeric vectors used to build the optimisation model.
//!
//! Products and suppliers keep the order in which they were given, so `ProductIndex(0)` is always
//! the first product in the input.
use crate::id::{IndexedVec, Period, ProductID, ProductIndex, SupplierID, SupplierIndex};
use crate::scenario::{MalformedScenario, Scenario};

/// Which form of the model to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    /// Procurement and storage only
    Baseline,
    /// Adds the optional refining process, which removes copper at a cost
    Refining,
}

/// Refining-specific data, only present for [`ModelVariant::Refining`]
#[derive(Debug, Clone, PartialEq)]
pub struct RefiningData {
    /// Maximum copper fraction of each product after refining
    pub copper_limit: IndexedVec<ProductIndex, f64>,
    /// Cost of running refining in a period
    pub fixed_cost: f64,
    /// Cost per unit of copper removed
    pub unit_cost: f64,
    /// Upper bound on copper removed per product and period
    pub big_m: f64,
}

/// Scenario data as parallel vectors in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct NormalisedData {
    /// Number of periods
    pub horizon: usize,
    /// Product IDs, for labelling results
    pub product_ids: IndexedVec<ProductIndex, ProductID>,
    /// Supplier IDs, for labelling results
    pub supplier_ids: IndexedVec<SupplierIndex, SupplierID>,
    /// Chromium content of each supplier's scrap
    pub chromium_content: IndexedVec<SupplierIndex, f64>,
    /// Nickel content of each supplier's scrap
    pub nickel_content: IndexedVec<SupplierIndex, f64>,
    /// Copper content of each supplier's scrap
    pub copper_content: IndexedVec<SupplierIndex, f64>,
    /// Maximum quantity available from each supplier per period
    pub max_supply: IndexedVec<SupplierIndex, f64>,
    /// Cost per unit mass from each supplier
    pub procurement_cost: IndexedVec<SupplierIndex, f64>,
    /// Target chromium fraction of each product
    pub chromium_ratio: IndexedVec<ProductIndex, f64>,
    /// Target nickel fraction of each product
    pub nickel_ratio: IndexedVec<ProductIndex, f64>,
    /// Storage cost per unit mass of each product
    pub storage_cost: IndexedVec<ProductIndex, f64>,
    /// Demand for each product in each period
    pub demand: IndexedVec<ProductIndex, IndexedVec<Period, f64>>,
    /// Maximum total production per period
    pub max_production: f64,
    /// Refining data, if building the refining variant
    pub refining: Option<RefiningData>,
}

impl NormalisedData {
    /// Flatten the scenario for the given model variant.
    ///
    /// The scenario itself has already been validated, so this can only fail if the refining
    /// variant is requested without refining costs or without a copper limit for every product.
    pub fn new(scenario: &Scenario, variant: ModelVariant) -> Result<Self, MalformedScenario> {
        let products = scenario.products();
        let suppliers = scenario.suppliers();
        let max_production = scenario.max_production().value();

        let refining = match variant {
            ModelVariant::Baseline => None,
            ModelVariant::Refining => {
                let params = scenario
                    .refining()
                    .ok_or(MalformedScenario::MissingRefiningParameters)?;
                let copper_limit = products
                    .values()
                    .map(|product| {
                        scenario
                            .copper_limit_for(product)
                            .map(f64::from)
                            .ok_or_else(|| {
                                MalformedScenario::MissingCopperLimit(product.id.to_string())
                            })
                    })
                    .collect::<Result<_, _>>()?;

                // No product can hold more copper in a period than the dirtiest scrap would give
                // it at full production
                let max_copper = suppliers
                    .values()
                    .map(|supplier| supplier.copper.0)
                    .fold(0.0, f64::max);
                let big_m = params
                    .big_m
                    .map_or(max_copper * max_production, |m| m.value());

                Some(RefiningData {
                    copper_limit,
                    fixed_cost: params.fixed_cost.value(),
                    unit_cost: params.unit_cost.value(),
                    big_m,
                })
            }
        };

        Ok(Self {
            horizon: scenario.horizon(),
            product_ids: products.keys().cloned().collect(),
            supplier_ids: suppliers.keys().cloned().collect(),
            chromium_content: suppliers.values().map(|s| s.chromium.0).collect(),
            nickel_content: suppliers.values().map(|s| s.nickel.0).collect(),
            copper_content: suppliers.values().map(|s| s.copper.0).collect(),
            max_supply: suppliers.values().map(|s| s.max_supply.value()).collect(),
            procurement_cost: suppliers.values().map(|s| s.cost.value()).collect(),
            chromium_ratio: products.values().map(|p| p.chromium_ratio.0).collect(),
            nickel_ratio: products.values().map(|p| p.nickel_ratio.0).collect(),
            storage_cost: products.values().map(|p| p.storage_cost.value()).collect(),
            demand: products
                .values()
                .map(|p| p.demand.iter().map(|d| d.value()).collect())
                .collect(),
            max_production,
            refining,
        })
    }

    /// The variant of model this data will build
    pub fn variant(&self) -> ModelVariant {
        if self.refining.is_some() {
            ModelVariant::Refining
        } else {
            ModelVariant::Baseline
        }
    }

    /// A copy of this data with the same copper limit applied to every product.
    ///
    /// Has no effect on baseline data, which has no copper limit.
    pub fn with_copper_limit(&self, copper_limit: f64) -> Self {
        let mut data = self.clone();
        if let Some(refining) = data.refining.as_mut() {
            refining.copper_limit = self.product_ids.map(|_| copper_limit);
        }

        data
    }

    /// Iterate over products in canonical order
    pub fn products(&self) -> impl Iterator<Item = ProductIndex> + Clone + use<> {
        self.product_ids.indices()
    }

    /// Iterate over suppliers in canonical order
    pub fn suppliers(&self) -> impl Iterator<Item = SupplierIndex> + Clone + use<> {
        self.supplier_ids.indices()
    }

    /// Iterate over periods in order
    pub fn periods(&self) -> impl Iterator<Item = Period> + Clone + use<> {
        (0..self.horizon).map(Period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{stainless_builder, stainless_scenario};
    use crate::units::Dimensionless;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_normalise_baseline(stainless_scenario: Scenario) {
        let data = NormalisedData::new(&stainless_scenario, ModelVariant::Baseline).unwrap();
        assert_eq!(data.variant(), ModelVariant::Baseline);
        assert_eq!(data.horizon, 12);
        assert_eq!(data.product_ids.len(), 3);
        assert_eq!(data.supplier_ids.len(), 5);
        assert_eq!(data.supplier_ids[SupplierIndex(1)], "B".into());
        assert_eq!(data.chromium_content[SupplierIndex(1)], 0.25);
        assert_eq!(data.copper_content[SupplierIndex(3)], 0.05);
        assert_eq!(data.procurement_cost[SupplierIndex(4)], 8.5);
        assert_eq!(data.nickel_ratio[ProductIndex(1)], 0.08);
        assert_eq!(data.storage_cost[ProductIndex(2)], 5.0);
        assert_eq!(data.demand[ProductIndex(2)][Period(6)], 150.0);
        assert_eq!(data.max_production, 100.0);
        assert!(data.refining.is_none());
    }

    #[rstest]
    fn test_normalise_is_deterministic(stainless_scenario: Scenario) {
        let a = NormalisedData::new(&stainless_scenario, ModelVariant::Refining).unwrap();
        let b = NormalisedData::new(&stainless_scenario, ModelVariant::Refining).unwrap();
        assert_eq!(a, b);
    }

    #[rstest]
    fn test_normalise_refining(stainless_scenario: Scenario) {
        let data = NormalisedData::new(&stainless_scenario, ModelVariant::Refining).unwrap();
        assert_eq!(data.variant(), ModelVariant::Refining);
        let refining = data.refining.as_ref().unwrap();
        assert_eq!(refining.fixed_cost, 100.0);
        assert_eq!(refining.unit_cost, 5.0);

        // Derived from the dirtiest supplier (D, 5% copper) at full production
        assert_approx_eq!(f64, refining.big_m, 5.0);

        let data = data.with_copper_limit(0.02);
        let refining = data.refining.unwrap();
        assert!(refining.copper_limit.iter().all(|&limit| limit == 0.02));
    }

    #[test]
    fn test_normalise_refining_missing_parameters() {
        let scenario = stainless_builder().copper_limit(0.1).build().unwrap();
        assert_eq!(
            NormalisedData::new(&scenario, ModelVariant::Refining),
            Err(MalformedScenario::MissingRefiningParameters)
        );

        // The baseline doesn't need them
        assert!(NormalisedData::new(&scenario, ModelVariant::Baseline).is_ok());
    }

    #[test]
    fn test_normalise_refining_missing_copper_limit() {
        let scenario = stainless_builder()
            .refining(100.0, 5.0, None)
            .build()
            .unwrap();
        assert_eq!(
            NormalisedData::new(&scenario, ModelVariant::Refining),
            Err(MalformedScenario::MissingCopperLimit("18/10".into()))
        );

        // Supplying a limit for every product fixes it
        let scenario = scenario.with_copper_limit(Dimensionless(0.03)).unwrap();
        assert!(NormalisedData::new(&scenario, ModelVariant::Refining).is_ok());
    }
}
