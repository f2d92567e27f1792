//! Brand-Competition engine: two branded originators in an expanding market.
//!
//! Unlike the generic-entry archetype the pie grows: total treated volume
//! expands along a dampened growth curve, and the two brands compete for
//! share of it, each pulled by its base share-gain rate times the product of
//! its active indication multipliers. Whatever neither brand serves remains
//! untreated, so the row identity `volume_a + volume_b + untreated == market`
//! holds every month.

use serde::Serialize;

use crate::engine::{MonthlyModel, MonthlyRow};
use crate::error::{ForecastError, Result, ensure_non_negative, ensure_positive_or_zero, ensure_share};
use crate::types::Month;

/// A label expansion for one brand. The multiplier scales the brand's share
/// pull (multiplicatively) from its activation month onward; the base
/// indication activates at month 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indication {
    pub name: String,
    pub multiplier: f64,
    pub activation_month: Month,
}

/// Supply-capacity ramp. While constrained, monthly capacity grows linearly
/// from `initial_capacity`; from `normalization_month` the constraint lifts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyRamp {
    pub constrained: bool,
    pub initial_capacity: f64,
    pub capacity_growth_monthly: f64,
    pub normalization_month: Month,
}

impl SupplyRamp {
    fn capacity_at(&self, month: Month) -> f64 {
        if !self.constrained || month >= self.normalization_month {
            f64::INFINITY
        } else {
            self.initial_capacity + self.capacity_growth_monthly * month.0 as f64
        }
    }
}

/// Pricing lifecycle: a negotiated launch price with an annual trend, an
/// optional one-off step-down (price renegotiation) and a hard floor. The
/// price is never derived from the competitive state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSchedule {
    pub launch_price: f64,
    pub annual_trend: f64,
    pub step_down_month: Option<Month>,
    pub step_down_pct: f64,
    pub floor: f64,
}

impl PriceSchedule {
    fn at(&self, month: Month) -> f64 {
        let mut price = self.launch_price * (1.0 + self.annual_trend).powf(month.0 as f64 / 12.0);
        if let Some(cut) = self.step_down_month
            && month >= cut
        {
            price *= 1.0 - self.step_down_pct;
        }
        price.max(self.floor)
    }

    fn validate(&self, field: &'static str) -> Result<()> {
        ensure_positive_or_zero(self.launch_price, field)?;
        ensure_positive_or_zero(self.floor, field)?;
        if !self.annual_trend.is_finite() || self.annual_trend <= -1.0 {
            return Err(ForecastError::validation(field, "annual trend must be > -1"));
        }
        ensure_share(self.step_down_pct, field)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandSide {
    pub name: String,
    pub starting_share: f64,
    pub target_peak_share: f64,
    /// Share points gained per month per unit of untreated share, before
    /// indication multipliers.
    pub base_gain_rate: f64,
    pub indications: Vec<Indication>,
    pub supply: SupplyRamp,
    pub price: PriceSchedule,
}

impl BrandSide {
    /// Momentary pull: base gain rate times the product of all active
    /// indication multipliers. Additional indications multiply, not add.
    fn pull_at(&self, month: Month) -> f64 {
        self.indications
            .iter()
            .filter(|i| month >= i.activation_month)
            .fold(self.base_gain_rate, |pull, i| pull * i.multiplier)
    }

    fn validate(&self, field: &'static str) -> Result<()> {
        ensure_share(self.starting_share, field)?;
        ensure_share(self.target_peak_share, field)?;
        ensure_positive_or_zero(self.base_gain_rate, field)?;
        for (i, ind) in self.indications.iter().enumerate() {
            if !ind.multiplier.is_finite() || ind.multiplier <= 0.0 {
                return Err(ForecastError::validation(
                    field,
                    format!("indication `{}` multiplier must be > 0", ind.name),
                ));
            }
            if self.indications[..i].iter().any(|other| other.name == ind.name) {
                return Err(ForecastError::validation(
                    field,
                    format!("duplicate indication `{}`", ind.name),
                ));
            }
        }
        ensure_positive_or_zero(self.supply.initial_capacity, field)?;
        ensure_positive_or_zero(self.supply.capacity_growth_monthly, field)?;
        self.price.validate(field)
    }
}

/// Dampened market expansion: monthly growth decelerates linearly to half its
/// initial rate as the market matures, and total expansion is capped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketExpansion {
    pub start_volume: f64,
    pub growth_annual: f64,
    pub maturity_months: u32,
    pub max_growth_factor: f64,
}

impl MarketExpansion {
    fn volume_at(&self, month: Month) -> f64 {
        let monthly_rate = (1.0 + self.growth_annual).powf(1.0 / 12.0) - 1.0;
        let progress = if self.maturity_months == 0 {
            1.0
        } else {
            (month.0 as f64 / self.maturity_months as f64).min(1.0)
        };
        let dampened = monthly_rate * (1.0 - 0.5 * progress);
        let raw = self.start_volume * (1.0 + dampened).powi(month.0 as i32);
        raw.min(self.start_volume * self.max_growth_factor)
    }
}

/// What happens to demand a brand cannot serve. The source material never
/// settles whether any preset redistributes; the default keeps the shortfall
/// untreated and `Redistribute` is opt-in (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnmetDemandPolicy {
    Untreated,
    Redistribute,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandCompetitionParams {
    pub horizon_months: u32,
    pub market: MarketExpansion,
    pub brand_a: BrandSide,
    pub brand_b: BrandSide,
    pub unmet_demand: UnmetDemandPolicy,
}

impl BrandCompetitionParams {
    pub fn validate(&self) -> Result<()> {
        if self.horizon_months == 0 {
            return Err(ForecastError::validation("horizon_months", "must be >= 1"));
        }
        ensure_positive_or_zero(self.market.start_volume, "market.start_volume")?;
        if !self.market.growth_annual.is_finite() || self.market.growth_annual <= -1.0 {
            return Err(ForecastError::validation("market.growth_annual", "must be > -1"));
        }
        if !self.market.max_growth_factor.is_finite() || self.market.max_growth_factor < 1.0 {
            return Err(ForecastError::validation("market.max_growth_factor", "must be >= 1"));
        }
        self.brand_a.validate("brand_a")?;
        self.brand_b.validate("brand_b")?;
        if self.brand_a.starting_share + self.brand_b.starting_share > 1.0 + 1e-9 {
            return Err(ForecastError::validation(
                "starting_share",
                "combined starting shares exceed 1.0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandRow {
    pub month: Month,
    pub market_trx: f64,
    /// Demand shares (before any capacity truncation).
    pub share_a: f64,
    pub share_b: f64,
    pub demand_a: f64,
    pub demand_b: f64,
    /// Served volumes (after capacity, and redistribution if configured).
    pub volume_a: f64,
    pub volume_b: f64,
    pub unmet_a: f64,
    pub unmet_b: f64,
    pub untreated: f64,
    pub price_a: f64,
    pub price_b: f64,
    pub revenue_a: f64,
    pub revenue_b: f64,
}

impl MonthlyRow for BrandRow {
    fn month(&self) -> Month {
        self.month
    }
    fn market_volume(&self) -> f64 {
        self.market_trx
    }
    fn source_volumes(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("brand_a", self.volume_a),
            ("brand_b", self.volume_b),
            ("untreated", self.untreated),
        ]
    }
    fn total_revenue(&self) -> f64 {
        self.revenue_a + self.revenue_b
    }
}

#[derive(Debug)]
pub struct BrandCompetitionModel {
    params: BrandCompetitionParams,
}

impl BrandCompetitionModel {
    pub fn new(params: &BrandCompetitionParams) -> Result<Self> {
        params.validate()?;
        Ok(BrandCompetitionModel { params: params.clone() })
    }
}

impl MonthlyModel for BrandCompetitionModel {
    type Row = BrandRow;

    fn horizon(&self) -> u32 {
        self.params.horizon_months
    }

    fn step(&self, month: Month, prev: Option<&BrandRow>) -> Result<BrandRow> {
        let p = &self.params;
        let market = p.market.volume_at(month);

        let (share_a, share_b) = match prev {
            None => (p.brand_a.starting_share, p.brand_b.starting_share),
            Some(prev) => {
                let untreated_share = (1.0 - prev.share_a - prev.share_b).max(0.0);
                // Desired gain, capped by the brand's own target. A target
                // below the current share freezes it, never claws back.
                let gain = |side: &BrandSide, current: f64| {
                    (side.pull_at(month) * untreated_share)
                        .min((side.target_peak_share - current).max(0.0))
                };
                let gain_a = gain(&p.brand_a, prev.share_a);
                let gain_b = gain(&p.brand_b, prev.share_b);
                // Both brands draw on the same untreated pool; when their
                // combined pull exceeds it, each takes its proportional slice
                // so `share_a + share_b` never overshoots 1.0.
                let total = gain_a + gain_b;
                let scale = if total > untreated_share { untreated_share / total } else { 1.0 };
                (prev.share_a + gain_a * scale, prev.share_b + gain_b * scale)
            }
        };

        let demand_a = market * share_a;
        let demand_b = market * share_b;

        let cap_a = p.brand_a.supply.capacity_at(month);
        let cap_b = p.brand_b.supply.capacity_at(month);
        let mut volume_a = demand_a.min(cap_a);
        let mut volume_b = demand_b.min(cap_b);

        if p.unmet_demand == UnmetDemandPolicy::Redistribute {
            let spare_a = cap_a - volume_a;
            let spare_b = cap_b - volume_b;
            let overflow_a = (demand_a - volume_a).min(spare_b).max(0.0);
            let overflow_b = (demand_b - volume_b).min(spare_a).max(0.0);
            volume_b += overflow_a;
            volume_a += overflow_b;
        }

        let unmet_a = (demand_a - volume_a).max(0.0);
        let unmet_b = (demand_b - volume_b).max(0.0);
        // When the shares exactly fill the market the subtraction can land a
        // few ulps below zero; that rounding residue is not a defect.
        let mut untreated = market - volume_a - volume_b;
        if untreated < 0.0 && untreated >= -1e-9 * market {
            untreated = 0.0;
        }
        let untreated = ensure_non_negative(untreated, "untreated", month)?;

        let price_a = p.brand_a.price.at(month);
        let price_b = p.brand_b.price.at(month);

        Ok(BrandRow {
            month,
            market_trx: market,
            share_a,
            share_b,
            demand_a,
            demand_b,
            volume_a,
            volume_b,
            unmet_a,
            unmet_b,
            untreated,
            price_a,
            price_b,
            revenue_a: volume_a * price_a,
            revenue_b: volume_b * price_b,
        })
    }
}
