//! Code for reading a scenario directory.
//!
//! A scenario directory contains `scenario.toml` along with CSV files for products, suppliers and
//! demand.
use super::{input_err_msg, read_csv, read_toml};
use crate::scenario::{ProductRecord, Scenario, ScenarioBuilder, SupplierRecord};
use crate::search::SearchParameters;
use crate::sweep::{ScanParameters, SweepParameters};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const SCENARIO_FILE_NAME: &str = "scenario.toml";
const PRODUCTS_FILE_NAME: &str = "products.csv";
const SUPPLIERS_FILE_NAME: &str = "suppliers.csv";
const DEMAND_FILE_NAME: &str = "demand.csv";

/// The `[refining]` section of the scenario file
#[derive(Debug, Deserialize, PartialEq)]
struct RefiningSection {
    fixed_cost: f64,
    unit_cost: f64,
    big_m: Option<f64>,
}

/// Represents the contents of the entire scenario file.
#[derive(Debug, Deserialize, PartialEq)]
struct ScenarioFile {
    name: Option<String>,
    horizon: usize,
    max_production: Option<f64>,
    copper_limit: Option<f64>,
    refining: Option<RefiningSection>,
    #[serde(default)]
    search: SearchParameters,
    sweep: Option<SweepParameters>,
    #[serde(default)]
    scan: ScanParameters,
}

/// A row of the demand CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct DemandRecord {
    product_id: String,
    period: u32,
    demand: f64,
}

/// A scenario together with the run parameters given alongside it
#[derive(Debug)]
pub struct LoadedScenario {
    /// The scenario data
    pub scenario: Scenario,
    /// Parameters for the minimum copper limit search
    pub search: SearchParameters,
    /// Parameters for a sweep, if the scenario defines one
    pub sweep: Option<SweepParameters>,
    /// Parameters for a copper limit scan
    pub scan: ScanParameters,
}

/// Read a scenario from the specified directory.
///
/// # Arguments
///
/// * `scenario_dir` - Folder containing scenario files
///
/// # Returns
///
/// The validated scenario and run parameters, or an error.
pub fn load_scenario(scenario_dir: &Path) -> Result<LoadedScenario> {
    let file_path = scenario_dir.join(SCENARIO_FILE_NAME);
    let file: ScenarioFile = read_toml(&file_path)?;
    file.search
        .validate()
        .with_context(|| input_err_msg(&file_path))?;

    let name = match file.name {
        Some(name) => name,
        None => scenario_dir
            .canonicalize()
            .ok()
            .and_then(|dir| dir.file_name()?.to_str().map(String::from))
            .unwrap_or_else(|| "scenario".to_string()),
    };

    let mut builder = ScenarioBuilder::new(&name, file.horizon);
    if let Some(max_production) = file.max_production {
        builder = builder.max_production(max_production);
    }
    if let Some(copper_limit) = file.copper_limit {
        builder = builder.copper_limit(copper_limit);
    }
    if let Some(refining) = file.refining {
        builder = builder.refining(refining.fixed_cost, refining.unit_cost, refining.big_m);
    }

    for record in read_csv::<ProductRecord>(&scenario_dir.join(PRODUCTS_FILE_NAME))? {
        builder = builder.product(record);
    }
    for record in read_csv::<SupplierRecord>(&scenario_dir.join(SUPPLIERS_FILE_NAME))? {
        builder = builder.supplier(record);
    }

    let demand_path = scenario_dir.join(DEMAND_FILE_NAME);
    let demand = read_csv::<DemandRecord>(&demand_path)?;
    for (product_id, series) in
        group_demand(demand).with_context(|| input_err_msg(&demand_path))?
    {
        builder = builder.demand(&product_id, series);
    }

    let scenario = builder
        .build()
        .with_context(|| format!("Invalid scenario in {}", scenario_dir.display()))?;

    Ok(LoadedScenario {
        scenario,
        search: file.search,
        sweep: file.sweep,
        scan: file.scan,
    })
}

/// Convert demand rows into one series per product.
///
/// Each product must have exactly one row for each period, numbered from one. Whether the series
/// cover the whole horizon is checked when the scenario is built.
fn group_demand<I>(iter: I) -> Result<IndexMap<String, Vec<f64>>>
where
    I: IntoIterator<Item = DemandRecord>,
{
    let mut by_product: IndexMap<String, Vec<(u32, f64)>> = IndexMap::new();
    for record in iter {
        by_product
            .entry(record.product_id)
            .or_default()
            .push((record.period, record.demand));
    }

    by_product
        .into_iter()
        .map(|(product_id, mut entries)| {
            entries.sort_by_key(|(period, _)| *period);
            ensure!(
                entries
                    .iter()
                    .enumerate()
                    .all(|(i, (period, _))| *period as usize == i + 1),
                "Demand for product {product_id} must have exactly one entry per period, \
                numbered from 1"
            );
            let series = entries.into_iter().map(|(_, demand)| demand).collect();
            Ok((product_id, series))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::write_scenario_dir;
    use crate::scenario::MalformedScenario;
    use crate::units::{Dimensionless, Mass};
    use std::fs;
    use tempfile::tempdir;

    fn demand(product_id: &str, period: u32, demand: f64) -> DemandRecord {
        DemandRecord {
            product_id: product_id.into(),
            period,
            demand,
        }
    }

    #[test]
    fn test_group_demand() {
        let records = [
            demand("18/8", 2, 20.0),
            demand("18/0", 1, 5.0),
            demand("18/8", 1, 10.0),
        ];
        let grouped = group_demand(records).unwrap();
        assert_eq!(grouped["18/8"], [10.0, 20.0]);
        assert_eq!(grouped["18/0"], [5.0]);
    }

    #[test]
    fn test_group_demand_bad_periods() {
        // Gap
        assert!(group_demand([demand("18/8", 1, 1.0), demand("18/8", 3, 1.0)]).is_err());

        // Duplicate
        assert!(group_demand([demand("18/8", 1, 1.0), demand("18/8", 1, 1.0)]).is_err());

        // Zero-based
        assert!(group_demand([demand("18/8", 0, 1.0)]).is_err());
    }

    #[test]
    fn test_load_scenario() {
        let dir = tempdir().unwrap();
        write_scenario_dir(dir.path());

        let loaded = load_scenario(dir.path()).unwrap();
        let scenario = &loaded.scenario;
        assert_eq!(scenario.name(), "simple");
        assert_eq!(scenario.horizon(), 3);
        assert_eq!(scenario.max_production(), Mass(100.0));
        assert_eq!(scenario.copper_limit(), Some(Dimensionless(0.02)));
        assert!(scenario.refining().is_some());
        assert_eq!(scenario.products().len(), 2);
        assert_eq!(scenario.suppliers().len(), 2);
        assert_eq!(loaded.search, SearchParameters::default());
        assert!(loaded.sweep.is_none());
    }

    #[test]
    fn test_load_scenario_missing_field() {
        let dir = tempdir().unwrap();
        write_scenario_dir(dir.path());
        fs::write(
            dir.path().join(SUPPLIERS_FILE_NAME),
            "id,chromium,nickel,copper,max_supply,cost\nA,0.18,0.0,0.0,90,\n",
        )
        .unwrap();

        let err = load_scenario(dir.path()).unwrap_err();
        let malformed = err.downcast_ref::<MalformedScenario>().unwrap();
        assert_eq!(
            malformed,
            &MalformedScenario::MissingField {
                record: "Supplier A".into(),
                field: "cost"
            }
        );
    }

    #[test]
    fn test_load_scenario_bad_search() {
        let dir = tempdir().unwrap();
        write_scenario_dir(dir.path());
        fs::write(
            dir.path().join(SCENARIO_FILE_NAME),
            "horizon = 3\nmax_production = 100\n[search]\nlow = 0.5\nhigh = 0.1\n",
        )
        .unwrap();

        assert!(load_scenario(dir.path()).is_err());
    }
}
