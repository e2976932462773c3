//! Fixtures for tests

use crate::scenario::{ProductRecord, Scenario, ScenarioBuilder, SupplierRecord};
use rstest::fixture;
use std::fs;
use std::path::Path;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A product record with every required field present
pub fn product_record(id: &str, storage_cost: f64, chromium: f64, nickel: f64) -> ProductRecord {
    ProductRecord {
        id: id.into(),
        storage_cost: Some(storage_cost),
        chromium_ratio: Some(chromium),
        nickel_ratio: Some(nickel),
        copper_limit: None,
    }
}

/// A supplier record with every field present
pub fn supplier_record(
    id: &str,
    chromium: f64,
    nickel: f64,
    copper: f64,
    max_supply: f64,
    cost: f64,
) -> SupplierRecord {
    SupplierRecord {
        id: id.into(),
        chromium: Some(chromium),
        nickel: Some(nickel),
        copper: Some(copper),
        max_supply: Some(max_supply),
        cost: Some(cost),
    }
}

/// A year of demand for three stainless grades from five suppliers, without refining
pub fn stainless_builder() -> ScenarioBuilder {
    ScenarioBuilder::new("stainless", 12)
        .max_production(100.0)
        .product(product_record("18/10", 20.0, 0.18, 0.10))
        .product(product_record("18/8", 10.0, 0.18, 0.08))
        .product(product_record("18/0", 5.0, 0.18, 0.0))
        .supplier(supplier_record("A", 0.18, 0.0, 0.0, 90.0, 5.0))
        .supplier(supplier_record("B", 0.25, 0.15, 0.04, 30.0, 10.0))
        .supplier(supplier_record("C", 0.15, 0.10, 0.02, 50.0, 9.0))
        .supplier(supplier_record("D", 0.14, 0.16, 0.05, 70.0, 7.0))
        .supplier(supplier_record("E", 0.0, 0.10, 0.03, 20.0, 8.5))
        .demand(
            "18/10",
            vec![
                25.0, 25.0, 0.0, 0.0, 0.0, 50.0, 12.0, 0.0, 10.0, 10.0, 45.0, 99.0,
            ],
        )
        .demand("18/8", vec![10.0; 12])
        .demand(
            "18/0",
            vec![
                5.0, 20.0, 80.0, 25.0, 50.0, 125.0, 150.0, 80.0, 40.0, 35.0, 3.0, 100.0,
            ],
        )
}

#[fixture]
pub fn stainless_scenario() -> Scenario {
    stainless_builder()
        .copper_limit(0.02)
        .refining(100.0, 5.0, None)
        .build()
        .unwrap()
}

#[fixture]
pub fn trivial_scenario() -> Scenario {
    let mut demand = vec![0.0; 12];
    demand[0] = 10.0;

    ScenarioBuilder::new("trivial", 12)
        .max_production(100.0)
        .product(product_record("18/0", 0.0, 0.18, 0.0))
        .supplier(supplier_record("A", 0.18, 0.0, 0.0, 1000.0, 0.0))
        .demand("18/0", demand)
        .build()
        .unwrap()
}

/// One product which can be made from clean, expensive scrap or from cheap scrap containing 4%
/// copper. Refining is too expensive to be worth running.
#[fixture]
pub fn copper_blend_scenario() -> Scenario {
    ScenarioBuilder::new("copper_blend", 1)
        .max_production(100.0)
        .copper_limit(0.5)
        .refining(1e6, 5.0, None)
        .product(product_record("18/0", 1.0, 0.18, 0.0))
        .supplier(supplier_record("A", 0.18, 0.0, 0.0, 100.0, 10.0))
        .supplier(supplier_record("B", 0.18, 0.0, 0.04, 100.0, 5.0))
        .demand("18/0", vec![10.0])
        .build()
        .unwrap()
}

/// Cheap refining over two periods. Supplier R's scrap is 3% short of chromium and carries 4%
/// copper, so it can only be used if refining removes 3% of its mass. What copper is left is still
/// over the 1% limit, so R has to be blended with clean scrap from A.
///
/// The optimal plan makes everything in the first period from 15 of R and 0.45 of A, refines away
/// 0.45 and stores 5 for the second period. The total cost is 21.
#[fixture]
pub fn active_refining_scenario() -> Scenario {
    ScenarioBuilder::new("active_refining", 2)
        .max_production(100.0)
        .copper_limit(0.01)
        .refining(1.0, 1.0, None)
        .product(product_record("18/0", 0.01, 0.18, 0.0))
        .supplier(supplier_record("A", 0.18, 0.0, 0.0, 100.0, 10.0))
        .supplier(supplier_record("R", 0.1746, 0.0, 0.04, 100.0, 1.0))
        .demand("18/0", vec![10.0, 5.0])
        .build()
        .unwrap()
}

/// Write a small, valid scenario directory
pub fn write_scenario_dir(dir_path: &Path) {
    let write = |file_name: &str, contents: &str| {
        fs::write(dir_path.join(file_name), contents).unwrap();
    };

    write(
        "scenario.toml",
        r#"name = "simple"
horizon = 3
max_production = 100
copper_limit = 0.02

[refining]
fixed_cost = 100
unit_cost = 5
"#,
    );
    write(
        "products.csv",
        "id,storage_cost,chromium_ratio,nickel_ratio,copper_limit
18/8,10,0.18,0.08,
18/0,5,0.18,0.0,
",
    );
    write(
        "suppliers.csv",
        "id,chromium,nickel,copper,max_supply,cost
A,0.18,0.0,0.0,90,5
N,0.18,0.08,0.01,60,8
",
    );
    write(
        "demand.csv",
        "product_id,period,demand
18/8,1,10
18/8,2,20
18/8,3,30
18/0,1,5
18/0,2,5
18/0,3,5
",
    );
}
