//! Rx-to-OTC switch engine: dual-channel migration of a prescription product
//! to over-the-counter status.
//!
//! From the switch month onward the prescription channel decays exponentially
//! toward a residual floor (severe cases that cannot shift channel) while the
//! OTC channel ramps along a logistic toward a ceiling above the original Rx
//! base — the excess is market expansion from new patients. Adjacent OTC
//! categories are cannibalized along their own decay curves, and all
//! post-switch volume streams are seasonal.
//!
//! The omnichannel variant splits OTC volume across N named distribution
//! paths whose shares evolve over time but must sum to 1.0 every month, and
//! adds a disrupted revenue stream (telemedicine) that collapses toward a
//! pivot-retention floor as the OTC channel removes its reason to exist.

use serde::Serialize;

use crate::curves::{Seasonality, decay_to_floor, logistic, rate_for_95pct_by, rate_for_loss_by};
use crate::engine::{MonthlyModel, MonthlyRow};
use crate::error::{ForecastError, Result, ensure_non_negative, ensure_positive_or_zero, ensure_share};
use crate::types::Month;

/// An adjacent OTC category that loses volume to the switched product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjacentCategory {
    pub name: String,
    pub baseline_monthly_revenue: f64,
    /// Fraction of the baseline ultimately lost.
    pub peak_loss_share: f64,
    /// Months until the loss has effectively (95%) reached its peak.
    pub ramp_months: u32,
}

/// One omnichannel distribution path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub name: String,
    pub launch_share: f64,
    /// Annual drift of the raw share before re-normalization.
    pub share_trend_annual: f64,
    pub margin_pct: f64,
    pub distribution_cost_pct: f64,
    /// Privacy weight; anonymous channels capture extra stigma-driven demand.
    pub discretion_factor: f64,
}

/// A revenue stream disrupted by the switch (telemedicine consultations whose
/// only purpose was the prescription). Parameterized independently from the
/// cannibalization categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disruption {
    pub name: String,
    pub baseline_monthly_revenue: f64,
    /// Fraction of the baseline lost over `decline_months`.
    pub decline_rate: f64,
    pub decline_months: u32,
    /// Fraction retained indefinitely via pivoted value-add services.
    pub pivot_retention: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Omnichannel {
    pub channels: Vec<Channel>,
    pub disruption: Option<Disruption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RxOtcParams {
    pub horizon_months: u32,
    pub switch_month: Month,

    /// Monthly prescription volume before the switch.
    pub rx_baseline_volume: f64,
    pub rx_price: f64,
    /// Fraction of Rx volume that ultimately migrates away (floor = 1 − this).
    pub rx_migration_rate: f64,
    pub rx_decline_months: u32,

    /// OTC ceiling = rx volume at switch × (1 + expansion_factor).
    pub expansion_factor: f64,
    /// Fraction of OTC volume attributed to genuinely new patients.
    pub new_patient_share: f64,
    pub otc_ramp_months: u32,
    pub otc_launch_price: f64,
    /// Free OTC pricing erodes under competitive entry; the decay primitive is
    /// applied to the price stream, not volume.
    pub otc_price_erosion_rate: f64,
    pub otc_price_floor: f64,
    /// Plain dual-channel economics (ignored when `omnichannel` is set).
    pub pharmacy_margin_pct: f64,
    pub distribution_cost_pct: f64,

    pub seasonality: Seasonality,
    pub cannibalized: Vec<AdjacentCategory>,
    pub omnichannel: Option<Omnichannel>,
}

impl RxOtcParams {
    pub fn validate(&self) -> Result<()> {
        if self.horizon_months == 0 {
            return Err(ForecastError::validation("horizon_months", "must be >= 1"));
        }
        ensure_positive_or_zero(self.rx_baseline_volume, "rx_baseline_volume")?;
        ensure_positive_or_zero(self.rx_price, "rx_price")?;
        ensure_share(self.rx_migration_rate, "rx_migration_rate")?;
        if self.rx_migration_rate >= 1.0 {
            return Err(ForecastError::validation("rx_migration_rate", "must be < 1"));
        }
        ensure_positive_or_zero(self.expansion_factor, "expansion_factor")?;
        ensure_share(self.new_patient_share, "new_patient_share")?;
        ensure_positive_or_zero(self.otc_launch_price, "otc_launch_price")?;
        ensure_positive_or_zero(self.otc_price_erosion_rate, "otc_price_erosion_rate")?;
        ensure_positive_or_zero(self.otc_price_floor, "otc_price_floor")?;
        if self.otc_price_floor > self.otc_launch_price {
            return Err(ForecastError::validation("otc_price_floor", "floor exceeds launch price"));
        }
        ensure_share(self.pharmacy_margin_pct, "pharmacy_margin_pct")?;
        ensure_share(self.distribution_cost_pct, "distribution_cost_pct")?;
        if self.pharmacy_margin_pct + self.distribution_cost_pct >= 1.0 {
            return Err(ForecastError::validation(
                "pharmacy_margin_pct",
                "margin plus distribution cost must leave a positive manufacturer share",
            ));
        }
        for (i, cat) in self.cannibalized.iter().enumerate() {
            ensure_positive_or_zero(cat.baseline_monthly_revenue, "cannibalized.baseline")?;
            ensure_share(cat.peak_loss_share, "cannibalized.peak_loss_share")?;
            if self.cannibalized[..i].iter().any(|c| c.name == cat.name) {
                return Err(ForecastError::validation(
                    "cannibalized",
                    format!("duplicate category `{}`", cat.name),
                ));
            }
        }
        if let Some(omni) = &self.omnichannel {
            if omni.channels.is_empty() {
                return Err(ForecastError::validation("omnichannel.channels", "must not be empty"));
            }
            let mut share_sum = 0.0;
            for (i, ch) in omni.channels.iter().enumerate() {
                ensure_share(ch.launch_share, "omnichannel.launch_share")?;
                ensure_share(ch.margin_pct, "omnichannel.margin_pct")?;
                ensure_share(ch.distribution_cost_pct, "omnichannel.distribution_cost_pct")?;
                if ch.margin_pct + ch.distribution_cost_pct >= 1.0 {
                    return Err(ForecastError::validation(
                        "omnichannel.margin_pct",
                        format!("channel `{}` margins leave no manufacturer share", ch.name),
                    ));
                }
                if !ch.discretion_factor.is_finite() || ch.discretion_factor <= 0.0 {
                    return Err(ForecastError::validation(
                        "omnichannel.discretion_factor",
                        "must be > 0",
                    ));
                }
                share_sum += ch.launch_share;
                if omni.channels[..i].iter().any(|c| c.name == ch.name) {
                    return Err(ForecastError::validation(
                        "omnichannel.channels",
                        format!("duplicate channel `{}`", ch.name),
                    ));
                }
            }
            if (share_sum - 1.0).abs() > 1e-6 {
                return Err(ForecastError::validation(
                    "omnichannel.channels",
                    format!("launch shares sum to {share_sum}, must be 1.0"),
                ));
            }
            if let Some(d) = &omni.disruption {
                ensure_positive_or_zero(d.baseline_monthly_revenue, "disruption.baseline")?;
                ensure_share(d.decline_rate, "disruption.decline_rate")?;
                ensure_share(d.pivot_retention, "disruption.pivot_retention")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMonth {
    pub name: String,
    pub share: f64,
    pub volume: f64,
    pub retail_revenue: f64,
    pub manufacturer_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RxOtcRow {
    pub month: Month,
    pub season_factor: f64,
    pub rx_volume: f64,
    pub rx_price: f64,
    pub rx_revenue: f64,
    pub otc_volume: f64,
    pub otc_price: f64,
    pub otc_retail_revenue: f64,
    /// Manufacturer take of OTC retail revenue.
    pub otc_revenue: f64,
    pub otc_new_patients: f64,
    pub otc_migrated: f64,
    /// Per-channel slices (empty unless the omnichannel variant is active).
    pub channels: Vec<ChannelMonth>,
    /// Revenue lost per cannibalized category, aligned with the parameter order.
    pub adjacent_lost: Vec<f64>,
    pub adjacent_lost_total: f64,
    pub disruption_revenue: f64,
    pub disruption_lost: f64,
}

impl MonthlyRow for RxOtcRow {
    fn month(&self) -> Month {
        self.month
    }
    fn market_volume(&self) -> f64 {
        self.rx_volume + self.otc_volume
    }
    fn source_volumes(&self) -> Vec<(&'static str, f64)> {
        vec![("rx", self.rx_volume), ("otc", self.otc_volume)]
    }
    fn total_revenue(&self) -> f64 {
        self.rx_revenue + self.otc_revenue
    }
}

#[derive(Debug)]
pub struct RxOtcModel {
    params: RxOtcParams,
    rx_decay_rate: f64,
    rx_floor: f64,
    otc_ceiling: f64,
}

impl RxOtcModel {
    pub fn new(params: &RxOtcParams) -> Result<Self> {
        params.validate()?;
        let rx_floor = params.rx_baseline_volume * (1.0 - params.rx_migration_rate);
        Ok(RxOtcModel {
            rx_decay_rate: rate_for_loss_by(params.rx_migration_rate, params.rx_decline_months),
            rx_floor,
            // Pre-switch volume is flat, so the Rx volume at the switch month
            // is the baseline itself.
            otc_ceiling: params.rx_baseline_volume * (1.0 + params.expansion_factor),
            params: params.clone(),
        })
    }

    pub fn otc_ceiling(&self) -> f64 {
        self.otc_ceiling
    }

    /// Normalized channel shares for a post-switch month. Raw shares drift by
    /// their annual trend and are weighted by discretion, then re-normalized
    /// so the partition of OTC volume is exact.
    fn channel_shares(&self, channels: &[Channel], t: u32, month: Month) -> Result<Vec<f64>> {
        let weights: Vec<f64> = channels
            .iter()
            .map(|ch| {
                let drifted =
                    (ch.launch_share + ch.share_trend_annual * t as f64 / 12.0).clamp(0.0, 1.0);
                let discretion = 1.0 + (ch.discretion_factor - 0.7) * 0.15;
                drifted * discretion
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(ForecastError::Computation {
                month,
                quantity: "channel_share_sum",
                value: total,
            });
        }
        let shares: Vec<f64> = weights.iter().map(|w| w / total).collect();
        let sum: f64 = shares.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ForecastError::Computation {
                month,
                quantity: "channel_share_sum",
                value: sum,
            });
        }
        Ok(shares)
    }
}

impl MonthlyModel for RxOtcModel {
    type Row = RxOtcRow;

    fn horizon(&self) -> u32 {
        self.params.horizon_months
    }

    fn step(&self, month: Month, _prev: Option<&RxOtcRow>) -> Result<RxOtcRow> {
        let p = &self.params;

        let Some(t) = month.since(p.switch_month) else {
            // Pre-switch: prescription channel only, no seasonality applied.
            return Ok(RxOtcRow {
                month,
                season_factor: 1.0,
                rx_volume: p.rx_baseline_volume,
                rx_price: p.rx_price,
                rx_revenue: p.rx_baseline_volume * p.rx_price,
                otc_volume: 0.0,
                otc_price: 0.0,
                otc_retail_revenue: 0.0,
                otc_revenue: 0.0,
                otc_new_patients: 0.0,
                otc_migrated: 0.0,
                channels: Vec::new(),
                adjacent_lost: vec![0.0; p.cannibalized.len()],
                adjacent_lost_total: 0.0,
                disruption_revenue: p
                    .omnichannel
                    .as_ref()
                    .and_then(|o| o.disruption.as_ref())
                    .map_or(0.0, |d| d.baseline_monthly_revenue),
                disruption_lost: 0.0,
            });
        };

        let season = p.seasonality.factor(month);

        // Rx channel: decay toward the residual severe-case floor.
        let rx_base = decay_to_floor(p.rx_baseline_volume, self.rx_decay_rate, self.rx_floor, t as f64)?;
        let rx_volume = rx_base * season;
        let rx_revenue = rx_volume * p.rx_price;

        // OTC channel: logistic ramp toward the expanded ceiling. Midpoint and
        // steepness calibrated so the ramp is ~done by `otc_ramp_months`.
        let ramp = p.otc_ramp_months.max(1) as f64;
        let otc_base = logistic(self.otc_ceiling, ramp * 0.45, 6.0 / ramp, t as f64);
        let otc_volume = otc_base * season;

        let otc_price =
            decay_to_floor(p.otc_launch_price, p.otc_price_erosion_rate, p.otc_price_floor, t as f64)?;

        let otc_new_patients = otc_volume * p.new_patient_share;
        let otc_migrated =
            ensure_non_negative(otc_volume - otc_new_patients, "otc_migrated", month)?;

        let (channels, otc_retail_revenue, otc_revenue) = match &p.omnichannel {
            Some(omni) => {
                let shares = self.channel_shares(&omni.channels, t, month)?;
                let mut slices = Vec::with_capacity(omni.channels.len());
                let mut retail_total = 0.0;
                let mut mfr_total = 0.0;
                for (ch, share) in omni.channels.iter().zip(shares) {
                    let volume = otc_volume * share;
                    let retail = volume * otc_price;
                    let mfr = retail * (1.0 - ch.margin_pct - ch.distribution_cost_pct);
                    retail_total += retail;
                    mfr_total += mfr;
                    slices.push(ChannelMonth {
                        name: ch.name.clone(),
                        share,
                        volume,
                        retail_revenue: retail,
                        manufacturer_revenue: mfr,
                    });
                }
                (slices, retail_total, mfr_total)
            }
            None => {
                let retail = otc_volume * otc_price;
                let mfr = retail * (1.0 - p.pharmacy_margin_pct - p.distribution_cost_pct);
                (Vec::new(), retail, mfr)
            }
        };

        let mut adjacent_lost = Vec::with_capacity(p.cannibalized.len());
        let mut adjacent_lost_total = 0.0;
        for cat in &p.cannibalized {
            let floor = cat.baseline_monthly_revenue * (1.0 - cat.peak_loss_share);
            let remaining = decay_to_floor(
                cat.baseline_monthly_revenue,
                rate_for_95pct_by(cat.ramp_months, 1.0),
                floor,
                t as f64,
            )?;
            let lost = (cat.baseline_monthly_revenue - remaining) * season;
            adjacent_lost.push(lost);
            adjacent_lost_total += lost;
        }

        let (disruption_revenue, disruption_lost) = match
            p.omnichannel.as_ref().and_then(|o| o.disruption.as_ref())
        {
            Some(d) => {
                let floor = d.baseline_monthly_revenue * d.pivot_retention;
                let remaining = decay_to_floor(
                    d.baseline_monthly_revenue,
                    rate_for_loss_by(d.decline_rate, d.decline_months),
                    floor,
                    t as f64,
                )?;
                (remaining, d.baseline_monthly_revenue - remaining)
            }
            None => (0.0, 0.0),
        };

        Ok(RxOtcRow {
            month,
            season_factor: season,
            rx_volume,
            rx_price: p.rx_price,
            rx_revenue,
            otc_volume,
            otc_price,
            otc_retail_revenue,
            otc_revenue,
            otc_new_patients,
            otc_migrated,
            channels,
            adjacent_lost,
            adjacent_lost_total,
            disruption_revenue,
            disruption_lost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run;

    fn base_params() -> RxOtcParams {
        RxOtcParams {
            horizon_months: 60,
            switch_month: Month(6),
            rx_baseline_volume: 350_000.0,
            rx_price: 16.99,
            rx_migration_rate: 0.15,
            rx_decline_months: 24,
            expansion_factor: 0.70,
            new_patient_share: 0.70,
            otc_ramp_months: 18,
            otc_launch_price: 7.99,
            otc_price_erosion_rate: 0.02,
            otc_price_floor: 5.0,
            pharmacy_margin_pct: 0.40,
            distribution_cost_pct: 0.08,
            seasonality: Seasonality::flat(),
            cannibalized: vec![AdjacentCategory {
                name: "Antacids".into(),
                baseline_monthly_revenue: 7_750_000.0,
                peak_loss_share: 0.15,
                ramp_months: 18,
            }],
            omnichannel: None,
        }
    }

    fn seasonal_table() -> Seasonality {
        Seasonality::new(&[
            0.90, 0.85, 0.95, 1.05, 1.05, 1.00, 0.95, 0.90, 1.00, 1.10, 1.15, 1.10,
        ])
        .unwrap()
    }

    fn omni() -> Omnichannel {
        Omnichannel {
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
                    name: "Online".into(),
                    launch_share: 0.40,
                    share_trend_annual: 0.04,
                    margin_pct: 0.30,
                    distribution_cost_pct: 0.10,
                    discretion_factor: 1.0,
                },
                Channel {
                    name: "Drugstore".into(),
                    launch_share: 0.10,
                    share_trend_annual: 0.01,
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
        }
    }

    #[test]
    fn before_the_switch_only_rx_exists() {
        let fc = run(&RxOtcModel::new(&base_params()).unwrap()).unwrap();
        for row in &fc.rows[..6] {
            assert_eq!(row.rx_volume, 350_000.0);
            assert_eq!(row.otc_volume, 0.0);
            assert_eq!(row.adjacent_lost_total, 0.0);
        }
        assert!(fc.row(Month(6)).unwrap().otc_volume > 0.0);
    }

    #[test]
    fn rx_never_falls_below_its_floor() {
        let fc = run(&RxOtcModel::new(&base_params()).unwrap()).unwrap();
        let floor = 350_000.0 * (1.0 - 0.15);
        for row in &fc.rows[6..] {
            assert!(
                row.rx_volume >= floor - 1e-6,
                "month {}: rx {} below floor {floor}",
                row.month.0,
                row.rx_volume
            );
        }
    }

    #[test]
    fn seasonal_rx_stays_above_the_seasonally_scaled_floor() {
        let mut params = base_params();
        params.seasonality = seasonal_table();
        let model = RxOtcModel::new(&params).unwrap();
        let fc = run(&model).unwrap();
        let floor = 350_000.0 * (1.0 - 0.15);
        let trough = params.seasonality.min_factor();
        for row in &fc.rows[6..] {
            assert!(row.rx_volume >= floor * row.season_factor - 1e-6);
            assert!(row.rx_volume >= floor * trough - 1e-6, "never below the seasonal trough floor");
        }
    }

    #[test]
    fn otc_approaches_the_expanded_ceiling() {
        let mut params = base_params();
        params.horizon_months = 140;
        let model = RxOtcModel::new(&params).unwrap();
        let expected = 350_000.0 * 1.70;
        assert_eq!(model.otc_ceiling(), expected);
        let fc = run(&model).unwrap();
        let last = fc.last();
        assert!(
            (last.otc_volume - expected).abs() < 1.0,
            "otc {} should be within tolerance of ceiling {expected}",
            last.otc_volume
        );
    }

    #[test]
    fn new_plus_migrated_partitions_otc_volume() {
        let fc = run(&RxOtcModel::new(&base_params()).unwrap()).unwrap();
        for row in &fc.rows {
            let sum = row.otc_new_patients + row.otc_migrated;
            assert!((sum - row.otc_volume).abs() <= 1e-9);
            assert!((row.otc_new_patients - 0.70 * row.otc_volume).abs() <= 1e-9);
        }
    }

    #[test]
    fn otc_price_erodes_to_its_floor_not_volume() {
        let mut params = base_params();
        params.horizon_months = 400;
        let fc = run(&RxOtcModel::new(&params).unwrap()).unwrap();
        let last = fc.last();
        assert!((last.otc_price - 5.0).abs() < 1e-2, "price should reach the floor");
        assert!(last.otc_volume > 350_000.0, "volume is not eroded by the price decay");
    }

    #[test]
    fn cannibalization_reaches_its_configured_peak() {
        let mut params = base_params();
        params.horizon_months = 200;
        let fc = run(&RxOtcModel::new(&params).unwrap()).unwrap();
        let last = fc.last();
        let expected = 7_750_000.0 * 0.15;
        assert!((last.adjacent_lost[0] - expected).abs() / expected < 0.01);
    }

    #[test]
    fn channel_shares_sum_to_one_every_month() {
        let mut params = base_params();
        params.omnichannel = Some(omni());
        let fc = run(&RxOtcModel::new(&params).unwrap()).unwrap();
        for row in &fc.rows[6..] {
            let sum: f64 = row.channels.iter().map(|c| c.share).sum();
            assert!(
                (sum - 1.0).abs() <= 1e-9,
                "month {}: channel shares sum to {sum}",
                row.month.0
            );
            let vol: f64 = row.channels.iter().map(|c| c.volume).sum();
            assert!((vol - row.otc_volume).abs() <= 1e-6);
        }
    }

    #[test]
    fn online_channel_gains_share_over_time() {
        let mut params = base_params();
        params.omnichannel = Some(omni());
        let fc = run(&RxOtcModel::new(&params).unwrap()).unwrap();
        let early = &fc.row(Month(6)).unwrap().channels[1];
        let late = &fc.row(Month(54)).unwrap().channels[1];
        assert_eq!(early.name, "Online");
        assert!(late.share > early.share, "positive trend must gain share");
    }

    #[test]
    fn disruption_decays_toward_its_retention_floor() {
        let mut params = base_params();
        params.horizon_months = 200;
        params.omnichannel = Some(omni());
        let fc = run(&RxOtcModel::new(&params).unwrap()).unwrap();
        assert_eq!(fc.rows[0].disruption_revenue, 4_500_000.0, "pre-switch baseline intact");
        let last = fc.last();
        let floor = 4_500_000.0 * 0.15;
        assert!((last.disruption_revenue - floor) / floor < 0.05);
        assert!(last.disruption_lost > 0.0);
    }

    #[test]
    fn channel_launch_shares_must_sum_to_one() {
        let mut params = base_params();
        let mut o = omni();
        o.channels[0].launch_share = 0.30; // 0.30 + 0.40 + 0.10
        params.omnichannel = Some(o);
        let err = RxOtcModel::new(&params).unwrap_err();
        assert!(
            matches!(err, ForecastError::Validation { field: "omnichannel.channels", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn margins_that_consume_retail_are_rejected() {
        let mut params = base_params();
        params.pharmacy_margin_pct = 0.70;
        params.distribution_cost_pct = 0.30;
        assert!(RxOtcModel::new(&params).is_err());
    }
}
