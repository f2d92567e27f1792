//! Aggregation over completed forecasts: cross-engine summary statistics and
//! the per-engine headline KPIs.

use serde::Serialize;

use crate::brand::BrandRow;
use crate::engine::{Forecast, MonthlyRow};
use crate::generic_entry::GenericEntryRow;
use crate::rx_otc::RxOtcRow;
use crate::types::Month;

/// Cumulative volume and share for one named source across the horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTotal {
    pub name: &'static str,
    pub volume: f64,
    /// Fraction of cumulative served volume (0 when nothing was served).
    pub share: f64,
}

/// Horizon-level rollup available for any engine's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub months: u32,
    pub cumulative_revenue: f64,
    pub cumulative_volume: f64,
    pub peak_revenue_month: Month,
    pub peak_revenue: f64,
    pub sources: Vec<SourceTotal>,
}

impl Summary {
    pub fn of<R: MonthlyRow>(forecast: &Forecast<R>) -> Summary {
        // `run` never returns an empty forecast, but `rows` is public and a
        // hand-built empty one must not panic here.
        let Some(first) = forecast.rows.first() else {
            return Summary {
                months: 0,
                cumulative_revenue: 0.0,
                cumulative_volume: 0.0,
                peak_revenue_month: Month(0),
                peak_revenue: 0.0,
                sources: Vec::new(),
            };
        };

        let mut cumulative_revenue = 0.0;
        let mut cumulative_volume = 0.0;
        let mut peak_revenue = f64::NEG_INFINITY;
        let mut peak_revenue_month = Month(0);
        let mut totals: Vec<(&'static str, f64)> =
            first.source_volumes().iter().map(|(name, _)| (*name, 0.0)).collect();

        for row in &forecast.rows {
            let revenue = row.total_revenue();
            cumulative_revenue += revenue;
            cumulative_volume += row.total_volume();
            if revenue > peak_revenue {
                peak_revenue = revenue;
                peak_revenue_month = row.month();
            }
            for (total, (_, volume)) in totals.iter_mut().zip(row.source_volumes()) {
                total.1 += volume;
            }
        }

        let sources = totals
            .into_iter()
            .map(|(name, volume)| SourceTotal {
                name,
                volume,
                share: if cumulative_volume > 0.0 { volume / cumulative_volume } else { 0.0 },
            })
            .collect();

        Summary {
            months: forecast.len() as u32,
            cumulative_revenue,
            cumulative_volume,
            peak_revenue_month,
            peak_revenue,
            sources,
        }
    }

    pub fn source_share(&self, name: &str) -> Option<f64> {
        self.sources.iter().find(|s| s.name == name).map(|s| s.share)
    }
}

/// Share of a month's served volume held by one named source.
pub fn source_share_at<R: MonthlyRow>(
    forecast: &Forecast<R>,
    month: Month,
    name: &str,
) -> Option<f64> {
    let row = forecast.row(month)?;
    let total = row.total_volume();
    if total <= 0.0 {
        return None;
    }
    row.source_volumes().iter().find(|(n, _)| *n == name).map(|(_, v)| v / total)
}

// ── engine KPIs ──────────────────────────────────────────────────────────────

/// Headline numbers for a loss-of-exclusivity forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericEntryKpis {
    pub cumulative_revenue_at_risk: f64,
    /// Originator volume share 12 months after entry, if within the horizon.
    pub originator_share_12m: Option<f64>,
    pub originator_share_24m: Option<f64>,
}

impl GenericEntryKpis {
    pub fn of(forecast: &Forecast<GenericEntryRow>, entry_month: Month) -> GenericEntryKpis {
        let share_at = |months_after: u32| {
            forecast
                .row(entry_month.offset(months_after))
                .map(|row| row.originator_trx / row.market_trx)
        };
        GenericEntryKpis {
            cumulative_revenue_at_risk: forecast.rows.iter().map(|r| r.revenue_at_risk).sum(),
            originator_share_12m: share_at(12),
            originator_share_24m: share_at(24),
        }
    }
}

/// Headline numbers for a two-brand competition forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandKpis {
    /// First month the challenger's served volume exceeds the incumbent's.
    pub overtake_month: Option<Month>,
    pub peak_share_a: f64,
    pub peak_share_b: f64,
}

impl BrandKpis {
    pub fn of(forecast: &Forecast<BrandRow>) -> BrandKpis {
        BrandKpis {
            overtake_month: forecast
                .rows
                .iter()
                .find(|r| r.volume_a > r.volume_b)
                .map(|r| r.month),
            peak_share_a: forecast.rows.iter().map(|r| r.share_a).fold(0.0, f64::max),
            peak_share_b: forecast.rows.iter().map(|r| r.share_b).fold(0.0, f64::max),
        }
    }
}

/// Headline numbers for an Rx-to-OTC switch forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RxOtcKpis {
    /// First month OTC volume exceeds the remaining Rx volume.
    pub crossover_month: Option<Month>,
    /// OTC volume share 12 months after the switch, if within the horizon.
    pub otc_share_12m: Option<f64>,
    pub cumulative_cannibalized: f64,
}

impl RxOtcKpis {
    pub fn of(forecast: &Forecast<RxOtcRow>, switch_month: Month) -> RxOtcKpis {
        RxOtcKpis {
            crossover_month: forecast
                .rows
                .iter()
                .find(|r| r.otc_volume > r.rx_volume)
                .map(|r| r.month),
            otc_share_12m: source_share_at(forecast, switch_month.offset(12), "otc"),
            cumulative_cannibalized: forecast.rows.iter().map(|r| r.adjacent_lost_total).sum(),
        }
    }
}
