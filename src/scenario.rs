//! Scenario runner: dispatch over the three engines and parallel what-if
//! sweeps built from typed parameter patches.
//!
//! A scenario never mutates the base parameter set. Each run clones the base,
//! applies its patch, re-validates, and simulates independently, so one
//! failing scenario leaves every other result intact.

use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::Summary;
use crate::brand::{BrandCompetitionModel, BrandCompetitionParams, BrandRow};
use crate::engine::{Forecast, run};
use crate::error::{ForecastError, Result};
use crate::generic_entry::{GenericEntryModel, GenericEntryParams, GenericEntryRow};
use crate::rx_otc::{RxOtcModel, RxOtcParams, RxOtcRow};
use crate::types::{EngineId, Month};

/// A complete, engine-tagged parameter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineParams {
    GenericEntry(GenericEntryParams),
    BrandCompetition(BrandCompetitionParams),
    RxOtc(RxOtcParams),
}

impl EngineParams {
    pub fn engine(&self) -> EngineId {
        match self {
            EngineParams::GenericEntry(_) => EngineId::GenericEntry,
            EngineParams::BrandCompetition(_) => EngineId::BrandCompetition,
            EngineParams::RxOtc(_) => EngineId::RxOtc,
        }
    }
}

/// An engine-tagged simulation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ForecastOutput {
    GenericEntry(Forecast<GenericEntryRow>),
    BrandCompetition(Forecast<BrandRow>),
    RxOtc(Forecast<RxOtcRow>),
}

impl ForecastOutput {
    pub fn engine(&self) -> EngineId {
        match self {
            ForecastOutput::GenericEntry(_) => EngineId::GenericEntry,
            ForecastOutput::BrandCompetition(_) => EngineId::BrandCompetition,
            ForecastOutput::RxOtc(_) => EngineId::RxOtc,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            ForecastOutput::GenericEntry(fc) => fc.len() as u32,
            ForecastOutput::BrandCompetition(fc) => fc.len() as u32,
            ForecastOutput::RxOtc(fc) => fc.len() as u32,
        }
    }

    pub fn summary(&self) -> Summary {
        match self {
            ForecastOutput::GenericEntry(fc) => Summary::of(fc),
            ForecastOutput::BrandCompetition(fc) => Summary::of(fc),
            ForecastOutput::RxOtc(fc) => Summary::of(fc),
        }
    }
}

/// Run one engine over one parameter set.
pub fn run_forecast(params: &EngineParams) -> Result<ForecastOutput> {
    match params {
        EngineParams::GenericEntry(p) => {
            Ok(ForecastOutput::GenericEntry(run(&GenericEntryModel::new(p)?)?))
        }
        EngineParams::BrandCompetition(p) => {
            Ok(ForecastOutput::BrandCompetition(run(&BrandCompetitionModel::new(p)?)?))
        }
        EngineParams::RxOtc(p) => Ok(ForecastOutput::RxOtc(run(&RxOtcModel::new(p)?)?)),
    }
}

// ── patches ──────────────────────────────────────────────────────────────────

/// Overrides for a loss-of-exclusivity run. `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenericEntryPatch {
    pub horizon_months: Option<u32>,
    pub market_growth_annual: Option<f64>,
    pub price_erosion_rate: Option<f64>,
    pub price_floor: Option<f64>,
    pub organic_peak_share: Option<f64>,
    pub organic_midpoint: Option<f64>,
    pub organic_steepness: Option<f64>,
    pub generic_discount: Option<f64>,
    pub tender_seed: Option<u64>,
}

impl GenericEntryPatch {
    fn apply(&self, base: &GenericEntryParams) -> GenericEntryParams {
        let mut p = base.clone();
        if let Some(v) = self.horizon_months {
            p.horizon_months = v;
        }
        if let Some(v) = self.market_growth_annual {
            p.market_growth_annual = v;
        }
        if let Some(v) = self.price_erosion_rate {
            p.price_erosion_rate = v;
        }
        if let Some(v) = self.price_floor {
            p.price_floor = v;
        }
        if let Some(v) = self.organic_peak_share {
            p.organic_peak_share = v;
        }
        if let Some(v) = self.organic_midpoint {
            p.organic_midpoint = v;
        }
        if let Some(v) = self.organic_steepness {
            p.organic_steepness = v;
        }
        if let Some(v) = self.generic_discount {
            p.generic_discount = v;
        }
        if let Some(v) = self.tender_seed {
            p.tender_seed = v;
        }
        p
    }
}

/// Overrides for a two-brand competition run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BrandPatch {
    pub horizon_months: Option<u32>,
    pub market_growth_annual: Option<f64>,
    pub max_growth_factor: Option<f64>,
    pub a_base_gain_rate: Option<f64>,
    pub a_target_peak_share: Option<f64>,
    pub b_supply_constrained: Option<bool>,
    pub b_normalization_month: Option<Month>,
}

impl BrandPatch {
    fn apply(&self, base: &BrandCompetitionParams) -> BrandCompetitionParams {
        let mut p = base.clone();
        if let Some(v) = self.horizon_months {
            p.horizon_months = v;
        }
        if let Some(v) = self.market_growth_annual {
            p.market.growth_annual = v;
        }
        if let Some(v) = self.max_growth_factor {
            p.market.max_growth_factor = v;
        }
        if let Some(v) = self.a_base_gain_rate {
            p.brand_a.base_gain_rate = v;
        }
        if let Some(v) = self.a_target_peak_share {
            p.brand_a.target_peak_share = v;
        }
        if let Some(v) = self.b_supply_constrained {
            p.brand_b.supply.constrained = v;
        }
        if let Some(v) = self.b_normalization_month {
            p.brand_b.supply.normalization_month = v;
        }
        p
    }
}

/// Overrides for an Rx-to-OTC switch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RxOtcPatch {
    pub horizon_months: Option<u32>,
    pub switch_month: Option<Month>,
    pub rx_migration_rate: Option<f64>,
    pub expansion_factor: Option<f64>,
    pub otc_ramp_months: Option<u32>,
    pub otc_launch_price: Option<f64>,
    pub otc_price_erosion_rate: Option<f64>,
}

impl RxOtcPatch {
    fn apply(&self, base: &RxOtcParams) -> RxOtcParams {
        let mut p = base.clone();
        if let Some(v) = self.horizon_months {
            p.horizon_months = v;
        }
        if let Some(v) = self.switch_month {
            p.switch_month = v;
        }
        if let Some(v) = self.rx_migration_rate {
            p.rx_migration_rate = v;
        }
        if let Some(v) = self.expansion_factor {
            p.expansion_factor = v;
        }
        if let Some(v) = self.otc_ramp_months {
            p.otc_ramp_months = v;
        }
        if let Some(v) = self.otc_launch_price {
            p.otc_launch_price = v;
        }
        if let Some(v) = self.otc_price_erosion_rate {
            p.otc_price_erosion_rate = v;
        }
        p
    }
}

/// An engine-tagged patch. Applying it to a base of a different engine is a
/// validation error, caught per-scenario rather than aborting the sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EnginePatch {
    GenericEntry(GenericEntryPatch),
    BrandCompetition(BrandPatch),
    RxOtc(RxOtcPatch),
}

impl EnginePatch {
    pub fn engine(&self) -> EngineId {
        match self {
            EnginePatch::GenericEntry(_) => EngineId::GenericEntry,
            EnginePatch::BrandCompetition(_) => EngineId::BrandCompetition,
            EnginePatch::RxOtc(_) => EngineId::RxOtc,
        }
    }

    pub fn apply(&self, base: &EngineParams) -> Result<EngineParams> {
        match (self, base) {
            (EnginePatch::GenericEntry(patch), EngineParams::GenericEntry(p)) => {
                Ok(EngineParams::GenericEntry(patch.apply(p)))
            }
            (EnginePatch::BrandCompetition(patch), EngineParams::BrandCompetition(p)) => {
                Ok(EngineParams::BrandCompetition(patch.apply(p)))
            }
            (EnginePatch::RxOtc(patch), EngineParams::RxOtc(p)) => {
                Ok(EngineParams::RxOtc(patch.apply(p)))
            }
            _ => Err(ForecastError::validation(
                "patch",
                format!(
                    "patch targets {} but base parameters are for {}",
                    self.engine().as_str(),
                    base.engine().as_str()
                ),
            )),
        }
    }
}

/// A named variation on a base parameter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub patch: EnginePatch,
}

impl Scenario {
    pub fn new(name: impl Into<String>, patch: EnginePatch) -> Scenario {
        Scenario { name: name.into(), patch }
    }
}

#[derive(Debug)]
pub struct ScenarioRun {
    pub name: String,
    pub outcome: Result<ForecastOutput>,
}

/// A base run plus the outcome of every scenario against it.
#[derive(Debug)]
pub struct ScenarioComparison {
    pub base: ForecastOutput,
    pub scenarios: Vec<ScenarioRun>,
}

impl ScenarioComparison {
    pub fn scenario(&self, name: &str) -> Option<&ScenarioRun> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

/// Run the base parameter set and every scenario against it, in parallel.
///
/// The base run must succeed; scenario failures are recorded per-name and do
/// not abort the sweep. Results come back in declaration order regardless of
/// worker scheduling.
pub fn run_scenarios(base: &EngineParams, scenarios: &[Scenario]) -> Result<ScenarioComparison> {
    let base_output = run_forecast(base)?;
    let runs: Vec<ScenarioRun> = scenarios
        .par_iter()
        .map(|scenario| {
            tracing::debug!(scenario = %scenario.name, engine = base.engine().as_str(), "running scenario");
            ScenarioRun {
                name: scenario.name.clone(),
                outcome: scenario.patch.apply(base).and_then(|params| run_forecast(&params)),
            }
        })
        .collect();
    Ok(ScenarioComparison { base: base_output, scenarios: runs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::Seasonality;

    fn base() -> EngineParams {
        EngineParams::GenericEntry(GenericEntryParams {
            horizon_months: 24,
            pre_entry_volume: 1_000_000.0,
            entry_month: Month(3),
            market_growth_annual: 0.01,
            list_price: 90.0,
            price_erosion_rate: 0.10,
            price_floor: 40.0,
            organic_peak_share: 0.55,
            organic_midpoint: 6.0,
            organic_steepness: 0.45,
            aut_idem: None,
            payers: Vec::new(),
            tender_seed: 42,
            generic_discount: 0.40,
            generic_price_erosion_rate: 0.08,
            generic_price_floor: 15.0,
            authorized_generic: None,
        })
    }

    fn rx_base() -> EngineParams {
        EngineParams::RxOtc(RxOtcParams {
            horizon_months: 24,
            switch_month: Month(3),
            rx_baseline_volume: 100_000.0,
            rx_price: 15.0,
            rx_migration_rate: 0.2,
            rx_decline_months: 12,
            expansion_factor: 0.5,
            new_patient_share: 0.6,
            otc_ramp_months: 12,
            otc_launch_price: 8.0,
            otc_price_erosion_rate: 0.0,
            otc_price_floor: 8.0,
            pharmacy_margin_pct: 0.4,
            distribution_cost_pct: 0.1,
            seasonality: Seasonality::flat(),
            cannibalized: Vec::new(),
            omnichannel: None,
        })
    }

    #[test]
    fn empty_patch_reproduces_the_base_run() {
        let base = base();
        let cmp = run_scenarios(
            &base,
            &[Scenario::new("Unchanged", EnginePatch::GenericEntry(GenericEntryPatch::default()))],
        )
        .unwrap();
        let run = cmp.scenario("Unchanged").unwrap();
        match (&cmp.base, run.outcome.as_ref().unwrap()) {
            (ForecastOutput::GenericEntry(a), ForecastOutput::GenericEntry(b)) => {
                assert_eq!(a, b, "an empty patch must not change a single row");
            }
            _ => panic!("engine tag changed under an empty patch"),
        }
    }

    #[test]
    fn a_failing_scenario_does_not_poison_the_others() {
        let cmp = run_scenarios(
            &base(),
            &[
                Scenario::new(
                    "Broken",
                    EnginePatch::GenericEntry(GenericEntryPatch {
                        organic_peak_share: Some(1.5),
                        ..Default::default()
                    }),
                ),
                Scenario::new(
                    "Mild",
                    EnginePatch::GenericEntry(GenericEntryPatch {
                        generic_discount: Some(0.30),
                        ..Default::default()
                    }),
                ),
            ],
        )
        .unwrap();
        assert!(cmp.scenario("Broken").unwrap().outcome.is_err());
        assert!(cmp.scenario("Mild").unwrap().outcome.is_ok());
    }

    #[test]
    fn mismatched_patch_is_a_per_scenario_validation_error() {
        let cmp = run_scenarios(
            &rx_base(),
            &[Scenario::new(
                "WrongEngine",
                EnginePatch::GenericEntry(GenericEntryPatch::default()),
            )],
        )
        .unwrap();
        let err = cmp.scenario("WrongEngine").unwrap().outcome.as_ref().unwrap_err();
        assert!(
            matches!(err, ForecastError::Validation { field: "patch", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn patched_values_flow_through_to_the_rows() {
        let base = rx_base();
        let cmp = run_scenarios(
            &base,
            &[Scenario::new(
                "BiggerMarket",
                EnginePatch::RxOtc(RxOtcPatch {
                    expansion_factor: Some(1.0),
                    ..Default::default()
                }),
            )],
        )
        .unwrap();
        let (ForecastOutput::RxOtc(base_fc), Ok(ForecastOutput::RxOtc(alt_fc))) =
            (&cmp.base, cmp.scenario("BiggerMarket").unwrap().outcome.as_ref())
        else {
            panic!("expected Rx-to-OTC outputs");
        };
        assert!(alt_fc.last().otc_volume > base_fc.last().otc_volume);
    }

    #[test]
    fn results_preserve_declaration_order() {
        let scenarios: Vec<Scenario> = (0..8)
            .map(|i| {
                Scenario::new(
                    format!("s{i}"),
                    EnginePatch::GenericEntry(GenericEntryPatch {
                        tender_seed: Some(i),
                        ..Default::default()
                    }),
                )
            })
            .collect();
        let cmp = run_scenarios(&base(), &scenarios).unwrap();
        let names: Vec<&str> = cmp.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7"]);
    }
}
