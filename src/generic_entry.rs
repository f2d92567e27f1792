//! Generic-Entry engine: originator vs. generic challenger after loss of
//! exclusivity.
//!
//! From the entry month onward, the molecule market is partitioned monthly
//! into three non-overlapping generic sources — organic uptake (logistic),
//! aut-idem pharmacy substitution (ramp gated on the reference-price trigger)
//! and payer tenders (discrete win/no-win contracts) — with the originator
//! keeping the remainder. Tender outcomes are resolved once per payer from a
//! seed stored in the parameter set, never resampled per month: a tender is a
//! multi-month exclusive award, not a monthly lottery.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

use crate::curves::{decay_to_floor, linear_ramp, logistic};
use crate::engine::{MonthlyModel, MonthlyRow};
use crate::error::{ForecastError, Result, ensure_non_negative, ensure_positive_or_zero, ensure_share};
use crate::types::Month;

/// One payer (sickness-fund) tender record. A won tender shifts the payer's
/// entire covered-lives share of the market to the generic from its start
/// month through the end of the horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayerTender {
    pub name: String,
    /// Share of total market volume covered by this payer's insured lives.
    pub covered_lives_share: f64,
    pub win_probability: f64,
    /// Requested contract start; starts before the entry month clamp to it.
    pub start_month: Month,
}

/// Aut-idem (pharmacy substitution) parameters. Offsets are months after the
/// entry month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutIdem {
    /// Months until the reference-price group is in force; no substitution before.
    pub trigger_offset: u32,
    /// Months until the substitution quota plateaus.
    pub full_offset: u32,
    /// Plateau substitution quota.
    pub peak_quota: f64,
    /// Hard cap as a share of remaining non-tender volume.
    pub cap_share: f64,
}

/// Authorized-generic strategy: the originator sells a discounted AG unit
/// alongside the branded one, taking a slice of the generic segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizedGeneric {
    /// Initial AG share of the generic segment.
    pub share_of_generics: f64,
    /// Per-month decay of the AG share toward `share_floor` as independent
    /// generics gain ground (0 = static).
    pub share_decay_rate: f64,
    pub share_floor: f64,
    /// Initial AG price discount vs. the originator list price.
    pub price_discount: f64,
    /// Per-month approach of the discount toward `discount_cap` (0 = static).
    pub discount_growth_rate: f64,
    pub discount_cap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericEntryParams {
    pub horizon_months: u32,
    /// Originator monthly volume at month 0 (the pre-entry baseline).
    pub pre_entry_volume: f64,
    /// Month generics enter; may lie beyond the horizon (pure baseline run).
    pub entry_month: Month,
    pub market_growth_annual: f64,
    /// Originator list price per unit pre-entry.
    pub list_price: f64,

    /// Originator price defense: exponential decay toward a floor.
    pub price_erosion_rate: f64,
    pub price_floor: f64,

    /// Organic generic uptake as a logistic share of non-tender volume.
    pub organic_peak_share: f64,
    /// Months after entry at which organic uptake inflects.
    pub organic_midpoint: f64,
    pub organic_steepness: f64,

    pub aut_idem: Option<AutIdem>,

    pub payers: Vec<PayerTender>,
    /// Seed for the one-shot tender win/loss resolution (reproducibility).
    pub tender_seed: u64,

    /// Generic price: discount vs. list, then slow further erosion to a floor.
    pub generic_discount: f64,
    pub generic_price_erosion_rate: f64,
    pub generic_price_floor: f64,

    pub authorized_generic: Option<AuthorizedGeneric>,
}

impl GenericEntryParams {
    pub fn validate(&self) -> Result<()> {
        if self.horizon_months == 0 {
            return Err(ForecastError::validation("horizon_months", "must be >= 1"));
        }
        ensure_positive_or_zero(self.pre_entry_volume, "pre_entry_volume")?;
        ensure_positive_or_zero(self.market_growth_annual, "market_growth_annual")?;
        ensure_positive_or_zero(self.list_price, "list_price")?;
        ensure_positive_or_zero(self.price_erosion_rate, "price_erosion_rate")?;
        ensure_positive_or_zero(self.price_floor, "price_floor")?;
        if self.price_floor > self.list_price {
            return Err(ForecastError::validation(
                "price_floor",
                format!("floor {} exceeds list price {}", self.price_floor, self.list_price),
            ));
        }
        ensure_share(self.organic_peak_share, "organic_peak_share")?;
        if !self.organic_steepness.is_finite() || self.organic_steepness <= 0.0 {
            return Err(ForecastError::validation("organic_steepness", "must be > 0"));
        }
        if !self.organic_midpoint.is_finite() || self.organic_midpoint < 0.0 {
            return Err(ForecastError::validation("organic_midpoint", "must be >= 0"));
        }
        if let Some(ai) = &self.aut_idem {
            ensure_share(ai.peak_quota, "aut_idem.peak_quota")?;
            ensure_share(ai.cap_share, "aut_idem.cap_share")?;
        }
        let mut covered_total = 0.0;
        for (i, payer) in self.payers.iter().enumerate() {
            ensure_share(payer.covered_lives_share, "payers.covered_lives_share")?;
            ensure_share(payer.win_probability, "payers.win_probability")?;
            covered_total += payer.covered_lives_share;
            if self.payers[..i].iter().any(|p| p.name == payer.name) {
                return Err(ForecastError::validation(
                    "payers",
                    format!("duplicate payer entity `{}`", payer.name),
                ));
            }
        }
        if covered_total > 1.0 + 1e-9 {
            return Err(ForecastError::validation(
                "payers",
                format!("covered-lives shares sum to {covered_total}, must be <= 1"),
            ));
        }
        ensure_share(self.generic_discount, "generic_discount")?;
        ensure_positive_or_zero(self.generic_price_erosion_rate, "generic_price_erosion_rate")?;
        ensure_positive_or_zero(self.generic_price_floor, "generic_price_floor")?;
        if let Some(ag) = &self.authorized_generic {
            ensure_share(ag.share_of_generics, "authorized_generic.share_of_generics")?;
            ensure_share(ag.share_floor, "authorized_generic.share_floor")?;
            ensure_positive_or_zero(ag.share_decay_rate, "authorized_generic.share_decay_rate")?;
            ensure_share(ag.price_discount, "authorized_generic.price_discount")?;
            ensure_share(ag.discount_cap, "authorized_generic.discount_cap")?;
            ensure_positive_or_zero(ag.discount_growth_rate, "authorized_generic.discount_growth_rate")?;
        }
        Ok(())
    }
}

/// One resolved payer tender: outcome fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
struct TenderOutcome {
    covered_lives_share: f64,
    won: bool,
    /// `max(start_month, entry_month)`.
    effective_start: Month,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericEntryRow {
    pub month: Month,
    pub market_trx: f64,
    pub originator_trx: f64,
    pub organic_trx: f64,
    pub aut_idem_trx: f64,
    pub tender_trx: f64,
    pub originator_price: f64,
    pub generic_price: f64,
    /// Authorized-generic slice (zero when the strategy is off).
    pub ag_trx: f64,
    pub ag_price: f64,
    pub originator_revenue: f64,
    pub generic_revenue: f64,
    pub ag_revenue: f64,
    /// Revenue the originator would have booked with no generic entry.
    pub counterfactual_revenue: f64,
    pub revenue_at_risk: f64,
}

impl MonthlyRow for GenericEntryRow {
    fn month(&self) -> Month {
        self.month
    }
    fn market_volume(&self) -> f64 {
        self.market_trx
    }
    fn source_volumes(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("originator", self.originator_trx),
            ("organic", self.organic_trx),
            ("aut_idem", self.aut_idem_trx),
            ("tender", self.tender_trx),
        ]
    }
    fn total_revenue(&self) -> f64 {
        self.originator_revenue + self.generic_revenue + self.ag_revenue
    }
}

#[derive(Debug)]
pub struct GenericEntryModel {
    params: GenericEntryParams,
    tenders: Vec<TenderOutcome>,
    monthly_growth: f64,
}

impl GenericEntryModel {
    pub fn new(params: &GenericEntryParams) -> Result<Self> {
        params.validate()?;

        // One draw per payer, in declaration order, from the stored seed.
        // Identical parameter sets therefore resolve identical outcomes.
        let mut rng = ChaCha20Rng::seed_from_u64(params.tender_seed);
        let tenders = params
            .payers
            .iter()
            .map(|p| TenderOutcome {
                covered_lives_share: p.covered_lives_share,
                won: rng.random::<f64>() < p.win_probability,
                effective_start: Month(p.start_month.0.max(params.entry_month.0)),
            })
            .collect();

        let model = GenericEntryModel {
            params: params.clone(),
            tenders,
            monthly_growth: 1.0 + params.market_growth_annual / 12.0,
        };
        tracing::debug!(seed = params.tender_seed, won = ?model.won_payers(), "resolved payer tenders");
        Ok(model)
    }

    /// Names of payers whose tender resolved as won.
    pub fn won_payers(&self) -> Vec<&str> {
        self.params
            .payers
            .iter()
            .zip(&self.tenders)
            .filter(|(_, o)| o.won)
            .map(|(p, _)| p.name.as_str())
            .collect()
    }

    fn tender_share_at(&self, month: Month) -> f64 {
        self.tenders
            .iter()
            .filter(|t| t.won && month >= t.effective_start)
            .map(|t| t.covered_lives_share)
            .sum()
    }
}

impl MonthlyModel for GenericEntryModel {
    type Row = GenericEntryRow;

    fn horizon(&self) -> u32 {
        self.params.horizon_months
    }

    fn step(&self, month: Month, _prev: Option<&GenericEntryRow>) -> Result<GenericEntryRow> {
        let p = &self.params;
        let market = p.pre_entry_volume * self.monthly_growth.powi(month.0 as i32);
        let counterfactual_revenue = market * p.list_price;

        let Some(t) = month.since(p.entry_month) else {
            // Pre-entry: the originator holds the whole molecule market.
            return Ok(GenericEntryRow {
                month,
                market_trx: market,
                originator_trx: market,
                organic_trx: 0.0,
                aut_idem_trx: 0.0,
                tender_trx: 0.0,
                originator_price: p.list_price,
                generic_price: 0.0,
                ag_trx: 0.0,
                ag_price: 0.0,
                originator_revenue: market * p.list_price,
                generic_revenue: 0.0,
                ag_revenue: 0.0,
                counterfactual_revenue,
                revenue_at_risk: 0.0,
            });
        };

        // Tender volume first: a won contract overrides organic/aut-idem
        // allocation for that payer's population.
        let tender_share = self.tender_share_at(month);
        let tender_trx = market * tender_share;
        let non_tender = market - tender_trx;

        let organic_share =
            logistic(p.organic_peak_share, p.organic_midpoint, p.organic_steepness, t as f64);
        let organic_trx = non_tender * organic_share;

        let remaining = non_tender - organic_trx;
        let aut_idem_trx = match &p.aut_idem {
            Some(ai) => {
                let quota = linear_ramp(t, ai.trigger_offset, ai.full_offset, ai.peak_quota);
                remaining * quota.min(ai.cap_share)
            }
            None => 0.0,
        };

        let originator_trx = ensure_non_negative(
            market - tender_trx - organic_trx - aut_idem_trx,
            "originator_trx",
            month,
        )?;

        let originator_price =
            decay_to_floor(p.list_price, p.price_erosion_rate, p.price_floor, t as f64)?;
        let generic_price = decay_to_floor(
            p.list_price * (1.0 - p.generic_discount),
            p.generic_price_erosion_rate,
            p.generic_price_floor
                .min(p.list_price * (1.0 - p.generic_discount)),
            t as f64,
        )?;

        let generic_segment = organic_trx + aut_idem_trx + tender_trx;
        let (ag_trx, ag_price) = match &p.authorized_generic {
            Some(ag) => {
                let share =
                    decay_to_floor(ag.share_of_generics, ag.share_decay_rate, ag.share_floor.min(ag.share_of_generics), t as f64)?;
                let discount = ag.price_discount
                    + (ag.discount_cap.max(ag.price_discount) - ag.price_discount)
                        * (1.0 - (-ag.discount_growth_rate * t as f64).exp());
                (generic_segment * share, p.list_price * (1.0 - discount))
            }
            None => (0.0, 0.0),
        };

        let originator_revenue = originator_trx * originator_price;
        let ag_revenue = ag_trx * ag_price;
        // Independent challengers book the generic segment net of the AG slice.
        let generic_revenue =
            ensure_non_negative(generic_segment - ag_trx, "independent_generic_trx", month)?
                * generic_price;

        let revenue_at_risk =
            (counterfactual_revenue - originator_revenue - ag_revenue).max(0.0);

        Ok(GenericEntryRow {
            month,
            market_trx: market,
            originator_trx,
            organic_trx,
            aut_idem_trx,
            tender_trx,
            originator_price,
            generic_price,
            ag_trx,
            ag_price,
            originator_revenue,
            generic_revenue,
            ag_revenue,
            counterfactual_revenue,
            revenue_at_risk,
        })
    }
}
