//! The business data describing one production planning scenario.
//!
//! A [`Scenario`] can only be created through a [`ScenarioBuilder`], which checks the raw records
//! for missing fields and out-of-range values. Once built, a scenario is never modified: the
//! `with_*` methods return modified copies, which is how sweeps and searches derive their
//! variants.
use crate::id::{ProductID, SupplierID};
use crate::units::{Dimensionless, Mass, Money, MoneyPerMass};
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

/// The ways in which scenario data can be malformed.
///
/// These are always reported before any attempt is made to solve a model.
#[derive(Debug, Error, PartialEq)]
pub enum MalformedScenario {
    /// A record is missing a required field
    #[error("{record} is missing required field `{field}`")]
    MissingField {
        /// Description of the offending record
        record: String,
        /// The name of the missing field
        field: &'static str,
    },
    /// A product's demand series does not cover the planning horizon
    #[error("Demand for product {product} has {found} periods, but the horizon is {expected}")]
    DemandLength {
        /// The product ID
        product: String,
        /// The planning horizon
        expected: usize,
        /// The number of periods supplied
        found: usize,
    },
    /// A quantity which must be non-negative is negative (or not finite)
    #[error("{record} has invalid value {value} for `{field}` (must be non-negative)")]
    NegativeValue {
        /// Description of the offending record
        record: String,
        /// The field name
        field: &'static str,
        /// The offending value
        value: f64,
    },
    /// A content fraction lies outside `[0, 1]`
    #[error("{record} has invalid value {value} for `{field}` (must be between 0 and 1)")]
    FractionOutOfRange {
        /// Description of the offending record
        record: String,
        /// The field name
        field: &'static str,
        /// The offending value
        value: f64,
    },
    /// An ID was used for more than one record
    #[error("Duplicate ID {0}")]
    DuplicateId(String),
    /// A record refers to an ID which doesn't exist
    #[error("Unknown product ID {0}")]
    UnknownId(String),
    /// There are no records of a required kind
    #[error("Scenario must contain at least one {0}")]
    Empty(&'static str),
    /// The planning horizon is zero
    #[error("The planning horizon must be at least one period")]
    InvalidHorizon,
    /// The refining variant was requested, but no refining costs were given
    #[error("Refining parameters are required for the refining model")]
    MissingRefiningParameters,
    /// The refining variant was requested, but a product has no copper limit
    #[error("No copper limit given for product {0}")]
    MissingCopperLimit(String),
}

/// A product record as read from input, before validation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductRecord {
    /// Unique identifier for the product (e.g. "18/10")
    pub id: String,
    /// Cost of carrying one unit of mass over to the next period
    #[serde(default)]
    pub storage_cost: Option<f64>,
    /// Target fraction of chromium
    #[serde(default)]
    pub chromium_ratio: Option<f64>,
    /// Target fraction of nickel
    #[serde(default)]
    pub nickel_ratio: Option<f64>,
    /// Maximum fraction of copper (overrides the scenario-wide limit)
    #[serde(default)]
    pub copper_limit: Option<f64>,
}

/// A supplier record as read from input, before validation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SupplierRecord {
    /// Unique identifier for the supplier
    pub id: String,
    /// Fraction of chromium in the supplier's scrap
    #[serde(default)]
    pub chromium: Option<f64>,
    /// Fraction of nickel in the supplier's scrap
    #[serde(default)]
    pub nickel: Option<f64>,
    /// Fraction of copper in the supplier's scrap
    #[serde(default)]
    pub copper: Option<f64>,
    /// Maximum quantity which can be bought per period
    #[serde(default)]
    pub max_supply: Option<f64>,
    /// Cost per unit mass
    #[serde(default)]
    pub cost: Option<f64>,
}

/// A product grade which must be made to meet demand
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Unique identifier
    pub id: ProductID,
    /// Cost of carrying one unit of mass over to the next period
    pub storage_cost: MoneyPerMass,
    /// Target fraction of chromium
    pub chromium_ratio: Dimensionless,
    /// Target fraction of nickel
    pub nickel_ratio: Dimensionless,
    /// Product-specific copper limit, if any
    pub copper_limit: Option<Dimensionless>,
    /// Demand in each period of the horizon
    pub demand: Vec<Mass>,
}

/// A supplier of scrap
#[derive(Debug, Clone, PartialEq)]
pub struct Supplier {
    /// Unique identifier
    pub id: SupplierID,
    /// Fraction of chromium
    pub chromium: Dimensionless,
    /// Fraction of nickel
    pub nickel: Dimensionless,
    /// Fraction of copper
    pub copper: Dimensionless,
    /// Maximum quantity which can be bought per period
    pub max_supply: Mass,
    /// Cost per unit mass
    pub cost: MoneyPerMass,
}

/// Costs of the refining (electrolysis) process which removes copper
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefiningParameters {
    /// Cost incurred in every period in which refining runs
    pub fixed_cost: Money,
    /// Cost per unit of copper removed
    pub unit_cost: MoneyPerMass,
    /// Upper bound on copper removed per product and period.
    ///
    /// If not given, a bound is derived from the scenario.
    pub big_m: Option<Mass>,
}

/// One complete, immutable description of a planning problem
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    name: String,
    horizon: usize,
    max_production: Mass,
    copper_limit: Option<Dimensionless>,
    refining: Option<RefiningParameters>,
    products: IndexMap<ProductID, Product>,
    suppliers: IndexMap<SupplierID, Supplier>,
}

impl Scenario {
    /// Name of the scenario, used for output folders and logging
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of periods in the planning horizon
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Maximum total production in any one period
    pub fn max_production(&self) -> Mass {
        self.max_production
    }

    /// The scenario-wide copper limit, if given
    pub fn copper_limit(&self) -> Option<Dimensionless> {
        self.copper_limit
    }

    /// Refining costs, if given
    pub fn refining(&self) -> Option<&RefiningParameters> {
        self.refining.as_ref()
    }

    /// Products, in input order
    pub fn products(&self) -> &IndexMap<ProductID, Product> {
        &self.products
    }

    /// Suppliers, in input order
    pub fn suppliers(&self) -> &IndexMap<SupplierID, Supplier> {
        &self.suppliers
    }

    /// The copper limit which applies to the given product
    pub fn copper_limit_for(&self, product: &Product) -> Option<Dimensionless> {
        product.copper_limit.or(self.copper_limit)
    }

    /// Total demand over all products and periods
    pub fn total_demand(&self) -> Mass {
        self.products
            .values()
            .flat_map(|product| product.demand.iter().copied())
            .sum()
    }

    /// A copy of this scenario with a different name
    pub fn with_name(&self, name: &str) -> Scenario {
        Scenario {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// A copy of this scenario with a different production capacity
    pub fn with_max_production(&self, max_production: Mass) -> Scenario {
        Scenario {
            max_production,
            ..self.clone()
        }
    }

    /// A copy of this scenario with each product's storage cost scaled by a multiplier.
    ///
    /// There must be one multiplier per product, in product order.
    pub fn with_storage_cost_multipliers(&self, multipliers: &[f64]) -> Scenario {
        assert_eq!(
            multipliers.len(),
            self.products.len(),
            "One storage cost multiplier is needed per product"
        );

        let mut scenario = self.clone();
        for (product, multiplier) in scenario.products.values_mut().zip(multipliers) {
            product.storage_cost = product.storage_cost * Dimensionless(*multiplier);
        }

        scenario
    }

    /// A copy of this scenario where the given copper limit applies to every product.
    ///
    /// The limit is checked the same way as one read from a scenario file.
    pub fn with_copper_limit(
        &self,
        copper_limit: Dimensionless,
    ) -> Result<Scenario, MalformedScenario> {
        let copper_limit = fraction("Scenario", "copper_limit", copper_limit.0)?;

        let mut scenario = self.clone();
        scenario.copper_limit = Some(Dimensionless(copper_limit));
        for product in scenario.products.values_mut() {
            product.copper_limit = None;
        }

        Ok(scenario)
    }
}

/// Builds a [`Scenario`] from raw records, checking them as it goes
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    name: String,
    horizon: usize,
    max_production: Option<f64>,
    copper_limit: Option<f64>,
    refining: Option<(f64, f64, Option<f64>)>,
    products: Vec<ProductRecord>,
    suppliers: Vec<SupplierRecord>,
    demand: Vec<(String, Vec<f64>)>,
}

impl ScenarioBuilder {
    /// Start building a scenario with the given name and number of periods
    pub fn new(name: &str, horizon: usize) -> Self {
        Self {
            name: name.to_string(),
            horizon,
            ..Default::default()
        }
    }

    /// Set the maximum total production per period
    pub fn max_production(mut self, max_production: f64) -> Self {
        self.max_production = Some(max_production);
        self
    }

    /// Set the scenario-wide copper limit
    pub fn copper_limit(mut self, copper_limit: f64) -> Self {
        self.copper_limit = Some(copper_limit);
        self
    }

    /// Set the refining costs and, optionally, an explicit big-M bound
    pub fn refining(mut self, fixed_cost: f64, unit_cost: f64, big_m: Option<f64>) -> Self {
        self.refining = Some((fixed_cost, unit_cost, big_m));
        self
    }

    /// Add a product
    pub fn product(mut self, record: ProductRecord) -> Self {
        self.products.push(record);
        self
    }

    /// Add a supplier
    pub fn supplier(mut self, record: SupplierRecord) -> Self {
        self.suppliers.push(record);
        self
    }

    /// Set the demand series for a product
    pub fn demand(mut self, product_id: &str, series: Vec<f64>) -> Self {
        self.demand.push((product_id.to_string(), series));
        self
    }

    /// Validate the records and create the [`Scenario`]
    pub fn build(self) -> Result<Scenario, MalformedScenario> {
        if self.horizon == 0 {
            return Err(MalformedScenario::InvalidHorizon);
        }
        if self.products.is_empty() {
            return Err(MalformedScenario::Empty("product"));
        }
        if self.suppliers.is_empty() {
            return Err(MalformedScenario::Empty("supplier"));
        }

        let record = "Scenario".to_string();
        let max_production = Mass(non_negative(
            &record,
            "max_production",
            required(&record, "max_production", self.max_production)?,
        )?);
        let copper_limit = self
            .copper_limit
            .map(|limit| fraction(&record, "copper_limit", limit))
            .transpose()?;
        let refining = self
            .refining
            .map(|(fixed_cost, unit_cost, big_m)| {
                Ok(RefiningParameters {
                    fixed_cost: Money(non_negative(&record, "refining.fixed_cost", fixed_cost)?),
                    unit_cost: MoneyPerMass(non_negative(
                        &record,
                        "refining.unit_cost",
                        unit_cost,
                    )?),
                    big_m: big_m
                        .map(|m| non_negative(&record, "refining.big_m", m).map(Mass))
                        .transpose()?,
                })
            })
            .transpose()?;

        let mut demand: IndexMap<String, Vec<f64>> = IndexMap::new();
        for (product_id, series) in self.demand {
            if demand.insert(product_id.clone(), series).is_some() {
                return Err(MalformedScenario::DuplicateId(product_id));
            }
        }

        let mut products = IndexMap::new();
        for record in self.products {
            let series = demand.shift_remove(&record.id).unwrap_or_default();
            let product = build_product(record, series, self.horizon)?;
            if products.contains_key(&product.id) {
                return Err(MalformedScenario::DuplicateId(product.id.to_string()));
            }
            products.insert(product.id.clone(), product);
        }

        // Anything left over refers to a product which doesn't exist
        if let Some(product_id) = demand.into_keys().next() {
            return Err(MalformedScenario::UnknownId(product_id));
        }

        let mut suppliers = IndexMap::new();
        for record in self.suppliers {
            let supplier = build_supplier(record)?;
            if suppliers.contains_key(&supplier.id) {
                return Err(MalformedScenario::DuplicateId(supplier.id.to_string()));
            }
            suppliers.insert(supplier.id.clone(), supplier);
        }

        Ok(Scenario {
            name: self.name,
            horizon: self.horizon,
            max_production,
            copper_limit: copper_limit.map(Dimensionless),
            refining,
            products,
            suppliers,
        })
    }
}

fn build_product(
    record: ProductRecord,
    series: Vec<f64>,
    horizon: usize,
) -> Result<Product, MalformedScenario> {
    let desc = format!("Product {}", record.id);
    if series.len() != horizon {
        return Err(MalformedScenario::DemandLength {
            product: record.id,
            expected: horizon,
            found: series.len(),
        });
    }

    let demand = series
        .into_iter()
        .map(|value| non_negative(&desc, "demand", value).map(Mass))
        .collect::<Result<_, _>>()?;

    Ok(Product {
        storage_cost: MoneyPerMass(non_negative(
            &desc,
            "storage_cost",
            required(&desc, "storage_cost", record.storage_cost)?,
        )?),
        chromium_ratio: Dimensionless(fraction(
            &desc,
            "chromium_ratio",
            required(&desc, "chromium_ratio", record.chromium_ratio)?,
        )?),
        nickel_ratio: Dimensionless(fraction(
            &desc,
            "nickel_ratio",
            required(&desc, "nickel_ratio", record.nickel_ratio)?,
        )?),
        copper_limit: record
            .copper_limit
            .map(|limit| fraction(&desc, "copper_limit", limit).map(Dimensionless))
            .transpose()?,
        demand,
        id: record.id.into(),
    })
}

fn build_supplier(record: SupplierRecord) -> Result<Supplier, MalformedScenario> {
    let desc = format!("Supplier {}", record.id);
    let content = |field, value| fraction(&desc, field, required(&desc, field, value)?);
    let quantity = |field, value| non_negative(&desc, field, required(&desc, field, value)?);

    Ok(Supplier {
        chromium: Dimensionless(content("chromium", record.chromium)?),
        nickel: Dimensionless(content("nickel", record.nickel)?),
        copper: Dimensionless(content("copper", record.copper)?),
        max_supply: Mass(quantity("max_supply", record.max_supply)?),
        cost: MoneyPerMass(quantity("cost", record.cost)?),
        id: record.id.into(),
    })
}

fn required(record: &str, field: &'static str, value: Option<f64>) -> Result<f64, MalformedScenario> {
    value.ok_or_else(|| MalformedScenario::MissingField {
        record: record.to_string(),
        field,
    })
}

fn non_negative(record: &str, field: &'static str, value: f64) -> Result<f64, MalformedScenario> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(MalformedScenario::NegativeValue {
            record: record.to_string(),
            field,
            value,
        })
    }
}

fn fraction(record: &str, field: &'static str, value: f64) -> Result<f64, MalformedScenario> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(MalformedScenario::FractionOutOfRange {
            record: record.to_string(),
            field,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{product_record, stainless_scenario, supplier_record};
    use rstest::rstest;

    fn builder() -> ScenarioBuilder {
        ScenarioBuilder::new("test", 2)
            .max_production(100.0)
            .product(product_record("18/8", 10.0, 0.18, 0.08))
            .supplier(supplier_record("A", 0.18, 0.08, 0.0, 90.0, 5.0))
            .demand("18/8", vec![10.0, 20.0])
    }

    #[test]
    fn test_build_valid() {
        let scenario = builder().build().unwrap();
        assert_eq!(scenario.horizon(), 2);
        assert_eq!(scenario.products().len(), 1);
        assert_eq!(scenario.suppliers().len(), 1);
        assert_eq!(scenario.total_demand(), Mass(30.0));
        assert_eq!(scenario.copper_limit(), None);
    }

    #[test]
    fn test_build_missing_supplier_field() {
        let mut record = supplier_record("B", 0.25, 0.15, 0.04, 30.0, 10.0);
        record.cost = None;
        assert_eq!(
            builder().supplier(record).build(),
            Err(MalformedScenario::MissingField {
                record: "Supplier B".into(),
                field: "cost"
            })
        );
    }

    #[test]
    fn test_build_missing_product_field() {
        let mut record = product_record("18/0", 5.0, 0.18, 0.0);
        record.chromium_ratio = None;
        let result = builder()
            .product(record)
            .demand("18/0", vec![0.0, 0.0])
            .build();
        assert_eq!(
            result,
            Err(MalformedScenario::MissingField {
                record: "Product 18/0".into(),
                field: "chromium_ratio"
            })
        );
    }

    #[rstest]
    #[case(vec![1.0], 1)]
    #[case(vec![1.0, 2.0, 3.0], 3)]
    fn test_build_bad_demand_length(#[case] series: Vec<f64>, #[case] found: usize) {
        let result = ScenarioBuilder::new("test", 2)
            .max_production(100.0)
            .product(product_record("18/8", 10.0, 0.18, 0.08))
            .supplier(supplier_record("A", 0.18, 0.08, 0.0, 90.0, 5.0))
            .demand("18/8", series)
            .build();
        assert_eq!(
            result,
            Err(MalformedScenario::DemandLength {
                product: "18/8".into(),
                expected: 2,
                found
            })
        );
    }

    #[test]
    fn test_build_no_demand() {
        let result = builder()
            .product(product_record("18/0", 5.0, 0.18, 0.0))
            .build();
        assert_eq!(
            result,
            Err(MalformedScenario::DemandLength {
                product: "18/0".into(),
                expected: 2,
                found: 0
            })
        );
    }

    #[test]
    fn test_build_unknown_demand_product() {
        let result = builder().demand("18/0", vec![1.0, 1.0]).build();
        assert_eq!(result, Err(MalformedScenario::UnknownId("18/0".into())));
    }

    #[test]
    fn test_build_duplicate_supplier() {
        let result = builder()
            .supplier(supplier_record("A", 0.18, 0.08, 0.0, 90.0, 5.0))
            .build();
        assert_eq!(result, Err(MalformedScenario::DuplicateId("A".into())));
    }

    #[rstest]
    #[case(1.5)]
    #[case(-0.1)]
    fn test_build_bad_fraction(#[case] chromium: f64) {
        let result = builder()
            .supplier(supplier_record("B", chromium, 0.0, 0.0, 1.0, 1.0))
            .build();
        assert!(matches!(
            result,
            Err(MalformedScenario::FractionOutOfRange {
                field: "chromium",
                ..
            })
        ));
    }

    #[test]
    fn test_build_negative_values() {
        let result = ScenarioBuilder::new("test", 1)
            .max_production(-1.0)
            .product(product_record("18/8", 10.0, 0.18, 0.08))
            .supplier(supplier_record("A", 0.18, 0.08, 0.0, 90.0, 5.0))
            .demand("18/8", vec![1.0])
            .build();
        assert!(matches!(
            result,
            Err(MalformedScenario::NegativeValue {
                field: "max_production",
                ..
            })
        ));

        let result = builder().refining(-100.0, 5.0, None).build();
        assert!(matches!(
            result,
            Err(MalformedScenario::NegativeValue {
                field: "refining.fixed_cost",
                ..
            })
        ));
    }

    #[test]
    fn test_build_empty() {
        assert_eq!(
            ScenarioBuilder::new("test", 0).build(),
            Err(MalformedScenario::InvalidHorizon)
        );
        assert_eq!(
            ScenarioBuilder::new("test", 1).build(),
            Err(MalformedScenario::Empty("product"))
        );
    }

    #[rstest]
    fn test_with_storage_cost_multipliers(stainless_scenario: Scenario) {
        let scaled = stainless_scenario.with_storage_cost_multipliers(&[0.1, 1.0, 2.0]);
        let costs: Vec<_> = scaled.products().values().map(|p| p.storage_cost).collect();
        assert_eq!(
            costs,
            [MoneyPerMass(2.0), MoneyPerMass(10.0), MoneyPerMass(10.0)]
        );

        // The original is untouched
        let product = stainless_scenario.products().values().next().unwrap();
        assert_eq!(product.storage_cost, MoneyPerMass(20.0));
    }

    #[rstest]
    fn test_with_copper_limit(stainless_scenario: Scenario) {
        let scenario = stainless_scenario
            .with_copper_limit(Dimensionless(0.02))
            .unwrap();
        for product in scenario.products().values() {
            assert_eq!(scenario.copper_limit_for(product), Some(Dimensionless(0.02)));
        }
    }

    #[rstest]
    #[case(-0.5)]
    #[case(2.0)]
    #[case(f64::NAN)]
    fn test_with_copper_limit_out_of_range(stainless_scenario: Scenario, #[case] limit: f64) {
        assert!(matches!(
            stainless_scenario.with_copper_limit(Dimensionless(limit)),
            Err(MalformedScenario::FractionOutOfRange {
                field: "copper_limit",
                ..
            })
        ));
    }
}
