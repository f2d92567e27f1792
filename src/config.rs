//! Canonical parameter sets: one worked case study per engine, plus the
//! standard erosion presets. All prices in euros, volumes in monthly TRx or
//! packs, German market order-of-magnitude.

use crate::brand::{
    BrandCompetitionParams, BrandSide, Indication, MarketExpansion, PriceSchedule, SupplyRamp,
    UnmetDemandPolicy,
};
use crate::curves::{Seasonality, rate_for_95pct_by};
use crate::generic_entry::{AutIdem, AuthorizedGeneric, GenericEntryParams, PayerTender};
use crate::rx_otc::{
    AdjacentCategory, Channel, Disruption, Omnichannel, RxOtcParams,
};
use crate::scenario::{EngineParams, EnginePatch, GenericEntryPatch, BrandPatch, RxOtcPatch, Scenario};
use crate::types::Month;

/// Apixaban list price per monthly TRx.
const ELIQUIS_LIST_PRICE: f64 = 91.50;

/// Apixaban loss of exclusivity: ~147k monthly TRx, staggered Kassen tenders,
/// aut-idem substitution once the reference-price group is in force, and an
/// authorized generic launched alongside the independents.
pub fn eliquis_loss_of_exclusivity() -> GenericEntryParams {
    GenericEntryParams {
        horizon_months: 36,
        pre_entry_volume: 147_000.0,
        entry_month: Month(6),
        market_growth_annual: 0.02,
        list_price: ELIQUIS_LIST_PRICE,
        // Base-case price defense: ~95% of the way to the floor in 18 months.
        price_erosion_rate: rate_for_95pct_by(18, 1.0),
        price_floor: ELIQUIS_LIST_PRICE * 0.30,
        organic_peak_share: 0.42,
        organic_midpoint: 6.0,
        organic_steepness: 0.45,
        aut_idem: Some(AutIdem {
            trigger_offset: 3,
            full_offset: 9,
            peak_quota: 0.75,
            cap_share: 0.20,
        }),
        // ── Kassen tenders, covered-lives shares from public membership data ──
        payers: vec![
            PayerTender { name: "TK".into(),          covered_lives_share: 0.158, win_probability: 0.50, start_month: Month(6) },
            PayerTender { name: "Barmer".into(),      covered_lives_share: 0.119, win_probability: 0.40, start_month: Month(6) },
            PayerTender { name: "DAK".into(),         covered_lives_share: 0.075, win_probability: 0.45, start_month: Month(8) },
            PayerTender { name: "AOK Bayern".into(),  covered_lives_share: 0.055, win_probability: 0.55, start_month: Month(9) },
            PayerTender { name: "AOK BaWü".into(),    covered_lives_share: 0.048, win_probability: 0.50, start_month: Month(9) },
            PayerTender { name: "KKH".into(),         covered_lives_share: 0.019, win_probability: 0.45, start_month: Month(10) },
        ],
        tender_seed: 42,
        generic_discount: 0.15,
        generic_price_erosion_rate: rate_for_95pct_by(18, 1.0),
        generic_price_floor: ELIQUIS_LIST_PRICE * 0.12,
        authorized_generic: Some(AuthorizedGeneric {
            share_of_generics: 0.30,
            share_decay_rate: 0.10,
            share_floor: 0.10,
            price_discount: 0.10,
            discount_growth_rate: 0.12,
            discount_cap: 0.35,
        }),
    }
}

/// GLP-1 incretin market: Mounjaro challenging Ozempic in a rapidly expanding
/// market, with the incumbent supply-constrained for its first year and the
/// challenger picking up an obesity label mid-horizon.
pub fn glp1_brand_competition() -> BrandCompetitionParams {
    BrandCompetitionParams {
        horizon_months: 48,
        market: MarketExpansion {
            start_volume: 950_000.0,
            growth_annual: 0.25,
            maturity_months: 36,
            max_growth_factor: 3.0,
        },
        brand_a: BrandSide {
            name: "Mounjaro".into(),
            starting_share: 0.08,
            target_peak_share: 0.25,
            base_gain_rate: 0.035,
            indications: vec![Indication {
                name: "Obesity".into(),
                multiplier: 1.5,
                activation_month: Month(9),
            }],
            supply: SupplyRamp {
                constrained: false,
                initial_capacity: 0.0,
                capacity_growth_monthly: 0.0,
                normalization_month: Month(0),
            },
            price: PriceSchedule {
                launch_price: 350.0,
                annual_trend: -0.02,
                step_down_month: None,
                step_down_pct: 0.0,
                floor: 200.0,
            },
        },
        brand_b: BrandSide {
            name: "Ozempic".into(),
            starting_share: 0.36,
            target_peak_share: 0.40,
            base_gain_rate: 0.015,
            indications: Vec::new(),
            supply: SupplyRamp {
                constrained: true,
                initial_capacity: 320_000.0,
                capacity_growth_monthly: 12_000.0,
                normalization_month: Month(12),
            },
            price: PriceSchedule {
                launch_price: 300.0,
                annual_trend: -0.03,
                step_down_month: Some(Month(24)),
                step_down_pct: 0.10,
                floor: 150.0,
            },
        },
        unmet_demand: UnmetDemandPolicy::Untreated,
    }
}

/// Esomeprazole Rx-to-OTC switch: heartburn seasonality, antacid and H2RA
/// cannibalization, classic dual-channel pharmacy economics.
pub fn ppi_rx_to_otc() -> RxOtcParams {
    RxOtcParams {
        horizon_months: 48,
        switch_month: Month(6),
        rx_baseline_volume: 350_000.0,
        rx_price: 16.99,
        rx_migration_rate: 0.15,
        rx_decline_months: 24,
        // OTC ceiling 280k above the migrated base comes out of the expansion.
        expansion_factor: 0.60,
        new_patient_share: 0.70,
        otc_ramp_months: 18,
        otc_launch_price: 7.99,
        otc_price_erosion_rate: 0.015,
        otc_price_floor: 5.49,
        pharmacy_margin_pct: 0.40,
        distribution_cost_pct: 0.08,
        // January trough, autumn peak.
        seasonality: Seasonality::new(&[
            0.90, 0.85, 0.95, 1.05, 1.05, 1.00, 0.95, 0.90, 1.00, 1.10, 1.15, 1.10,
        ])
        .unwrap_or_else(|_| Seasonality::flat()),
        cannibalized: vec![
            AdjacentCategory {
                name: "Antacids".into(),
                baseline_monthly_revenue: 7_750_000.0,
                peak_loss_share: 0.15,
                ramp_months: 18,
            },
            AdjacentCategory {
                name: "H2 blockers".into(),
                baseline_monthly_revenue: 2_100_000.0,
                peak_loss_share: 0.30,
                ramp_months: 12,
            },
        ],
        omnichannel: None,
    }
}

/// Sildenafil OTC switch, omnichannel variant: stigma-driven channel mix with
/// a discretion premium for anonymous purchase paths, and a telemedicine
/// prescription business collapsing toward its pivot floor.
pub fn sildenafil_omnichannel() -> RxOtcParams {
    RxOtcParams {
        horizon_months: 48,
        switch_month: Month(3),
        rx_baseline_volume: 217_000.0,
        rx_price: 21.50,
        rx_migration_rate: 0.55,
        rx_decline_months: 18,
        expansion_factor: 0.90,
        new_patient_share: 0.55,
        otc_ramp_months: 15,
        otc_launch_price: 12.99,
        otc_price_erosion_rate: 0.01,
        otc_price_floor: 9.99,
        // Unused once the omnichannel split is active.
        pharmacy_margin_pct: 0.40,
        distribution_cost_pct: 0.08,
        seasonality: Seasonality::flat(),
        cannibalized: Vec::new(),
        omnichannel: Some(Omnichannel {
            channels: vec![
                Channel {
                    name: "Pharmacy".into(),
                    launch_share: 0.50,
                    share_trend_annual: -0.03,
                    margin_pct: 0.42,
                    distribution_cost_pct: 0.06,
                    discretion_factor: 0.70,
                },
                Channel {
                    name: "Online pharmacy".into(),
                    launch_share: 0.40,
                    share_trend_annual: 0.04,
                    margin_pct: 0.30,
                    distribution_cost_pct: 0.10,
                    discretion_factor: 1.0,
                },
                Channel {
                    name: "Drugstore".into(),
                    launch_share: 0.10,
                    share_trend_annual: -0.01,
                    margin_pct: 0.35,
                    distribution_cost_pct: 0.08,
                    discretion_factor: 0.50,
                },
            ],
            disruption: Some(Disruption {
                name: "Telemedicine".into(),
                baseline_monthly_revenue: 4_500_000.0,
                decline_rate: 0.60,
                decline_months: 24,
                pivot_retention: 0.15,
            }),
        }),
    }
}

// ── presets ──────────────────────────────────────────────────────────────────

/// The standard erosion preset: generic discount at entry, erosion speed
/// factor, the originator's floor share of the market, and months until the
/// erosion has run its course. Named from the generics entrant's perspective,
/// so the bull case is the one that erodes the originator hardest.
fn erosion_patch(
    discount: f64,
    speed: f64,
    originator_floor_share: f64,
    months_to_floor: u32,
) -> EnginePatch {
    EnginePatch::GenericEntry(GenericEntryPatch {
        generic_discount: Some(discount),
        organic_peak_share: Some(1.0 - originator_floor_share),
        organic_midpoint: Some(months_to_floor as f64 / 2.0),
        price_erosion_rate: Some(rate_for_95pct_by(months_to_floor, speed)),
        ..Default::default()
    })
}

/// Base / Bull / Bear erosion scenarios for the loss-of-exclusivity engine.
pub fn erosion_presets() -> Vec<Scenario> {
    vec![
        Scenario::new("Base Case", erosion_patch(0.15, 1.0, 0.12, 18)),
        Scenario::new("Bull Case", erosion_patch(0.10, 1.3, 0.08, 12)),
        Scenario::new("Bear Case", erosion_patch(0.20, 0.7, 0.18, 24)),
    ]
}

/// Supply-side scenarios for the brand-competition engine.
pub fn brand_presets() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "Supply Normalizes Early",
            EnginePatch::BrandCompetition(BrandPatch {
                b_normalization_month: Some(Month(6)),
                ..Default::default()
            }),
        ),
        Scenario::new(
            "Constrained Throughout",
            EnginePatch::BrandCompetition(BrandPatch {
                b_normalization_month: Some(Month(48)),
                ..Default::default()
            }),
        ),
        Scenario::new(
            "Slower Market",
            EnginePatch::BrandCompetition(BrandPatch {
                market_growth_annual: Some(0.12),
                ..Default::default()
            }),
        ),
    ]
}

/// Uptake scenarios for the Rx-to-OTC engine.
pub fn otc_presets() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "Aggressive Uptake",
            EnginePatch::RxOtc(RxOtcPatch {
                expansion_factor: Some(0.90),
                otc_ramp_months: Some(12),
                ..Default::default()
            }),
        ),
        Scenario::new(
            "Conservative Uptake",
            EnginePatch::RxOtc(RxOtcPatch {
                expansion_factor: Some(0.35),
                otc_ramp_months: Some(24),
                ..Default::default()
            }),
        ),
    ]
}

/// The preset sweep matching a base parameter set's engine.
pub fn presets_for(base: &EngineParams) -> Vec<Scenario> {
    match base {
        EngineParams::GenericEntry(_) => erosion_presets(),
        EngineParams::BrandCompetition(_) => brand_presets(),
        EngineParams::RxOtc(_) => otc_presets(),
    }
}
