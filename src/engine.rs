//! The shared monthly simulation loop.
//!
//! All three engines have the same control flow: validate a parameter set,
//! then produce one row per month over the horizon. Only the step function
//! differs, so the loop lives here once and each engine implements
//! [`MonthlyModel`] with a pure `step`.

use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::types::Month;

/// Row-level view every engine's output provides, so aggregation and the
/// serialization consumers can stay engine-agnostic.
pub trait MonthlyRow: Serialize {
    fn month(&self) -> Month;
    /// Total addressable market volume this month.
    fn market_volume(&self) -> f64;
    /// Named per-source volume decomposition. Source names are fixed per
    /// engine and identical on every row.
    fn source_volumes(&self) -> Vec<(&'static str, f64)>;
    /// Revenue across all sources this month.
    fn total_revenue(&self) -> f64;

    /// Volume served across all sources this month.
    fn total_volume(&self) -> f64 {
        self.source_volumes().iter().map(|(_, v)| v).sum()
    }
}

/// An engine: an immutable, validated model that maps a month index (plus the
/// previous row, for recursive dynamics like share evolution) to the next row.
///
/// Implementations are constructed from a parameter set via a fallible
/// constructor that performs all validation; by the time `step` runs, inputs
/// are known-good and any failure is a [`ForecastError::Computation`].
pub trait MonthlyModel {
    type Row: MonthlyRow;

    fn horizon(&self) -> u32;

    /// Produce the row for `month`. Pure: same inputs, same row.
    fn step(&self, month: Month, prev: Option<&Self::Row>) -> Result<Self::Row>;
}

/// A fully materialized simulation result: exactly `horizon` rows with
/// contiguous 0-based month indices. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast<R> {
    pub rows: Vec<R>,
}

impl<R: MonthlyRow> Forecast<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, month: Month) -> Option<&R> {
        self.rows.get(month.0 as usize)
    }

    pub fn last(&self) -> &R {
        self.rows.last().expect("a forecast covers at least one month")
    }
}

/// Relative slack allowed when checking that per-source volumes stay within
/// the addressable market. Purely for float accumulation; the models
/// themselves never allocate more than the market.
const MARKET_TOLERANCE: f64 = 1e-6;

/// Run a model over its horizon.
///
/// Guarantees on success: `rows.len() == horizon`, month indices are
/// `0..horizon` contiguous, every row's source volumes are non-negative and
/// sum to at most the market volume (within float tolerance). On failure no
/// partial result is returned.
pub fn run<M: MonthlyModel>(model: &M) -> Result<Forecast<M::Row>> {
    let horizon = model.horizon();
    if horizon == 0 {
        return Err(ForecastError::validation("horizon", "horizon must be >= 1 month"));
    }
    tracing::debug!(horizon, "running monthly model");

    let mut rows: Vec<M::Row> = Vec::with_capacity(horizon as usize);
    for m in 0..horizon {
        let month = Month(m);
        let row = model.step(month, rows.last())?;
        debug_assert_eq!(row.month(), month, "step produced a row for the wrong month");
        check_row(&row)?;
        rows.push(row);
    }
    Ok(Forecast { rows })
}

fn check_row<R: MonthlyRow>(row: &R) -> Result<()> {
    let market = row.market_volume();
    if !market.is_finite() || market < 0.0 {
        return Err(ForecastError::Computation {
            month: row.month(),
            quantity: "market_volume",
            value: market,
        });
    }
    let mut sum = 0.0;
    for (name, volume) in row.source_volumes() {
        if !volume.is_finite() || volume < 0.0 {
            return Err(ForecastError::Computation {
                month: row.month(),
                quantity: name,
                value: volume,
            });
        }
        sum += volume;
    }
    if sum > market * (1.0 + MARKET_TOLERANCE) + MARKET_TOLERANCE {
        return Err(ForecastError::Computation {
            month: row.month(),
            quantity: "source_volume_sum",
            value: sum,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct TestRow {
        month: Month,
        market: f64,
        volume: f64,
    }

    impl MonthlyRow for TestRow {
        fn month(&self) -> Month {
            self.month
        }
        fn market_volume(&self) -> f64 {
            self.market
        }
        fn source_volumes(&self) -> Vec<(&'static str, f64)> {
            vec![("volume", self.volume)]
        }
        fn total_revenue(&self) -> f64 {
            self.volume
        }
    }

    /// Emits `market = 100`, `volume = month`, and an invalid row at
    /// `fail_at` if set.
    struct TestModel {
        horizon: u32,
        fail_at: Option<u32>,
    }

    impl MonthlyModel for TestModel {
        type Row = TestRow;

        fn horizon(&self) -> u32 {
            self.horizon
        }

        fn step(&self, month: Month, prev: Option<&TestRow>) -> Result<TestRow> {
            if let Some(p) = prev {
                assert_eq!(p.month.0 + 1, month.0, "prev row must be the preceding month");
            }
            let volume = if self.fail_at == Some(month.0) { -1.0 } else { month.0 as f64 };
            Ok(TestRow { month, market: 100.0, volume })
        }
    }

    #[test]
    fn run_produces_contiguous_month_indices() {
        let fc = run(&TestModel { horizon: 24, fail_at: None }).unwrap();
        assert_eq!(fc.len(), 24);
        for (i, row) in fc.rows.iter().enumerate() {
            assert_eq!(row.month, Month(i as u32));
        }
    }

    #[test]
    fn zero_horizon_is_a_validation_error() {
        let err = run(&TestModel { horizon: 0, fail_at: None }).unwrap_err();
        assert!(matches!(err, ForecastError::Validation { field: "horizon", .. }));
    }

    #[test]
    fn negative_volume_surfaces_with_month_and_name() {
        let err = run(&TestModel { horizon: 12, fail_at: Some(7) }).unwrap_err();
        match err {
            ForecastError::Computation { month, quantity, .. } => {
                assert_eq!(month, Month(7));
                assert_eq!(quantity, "volume");
            }
            other => panic!("expected Computation error, got {other:?}"),
        }
    }

    #[test]
    fn oversubscribed_market_is_rejected() {
        struct Oversold;
        impl MonthlyModel for Oversold {
            type Row = TestRow;
            fn horizon(&self) -> u32 {
                3
            }
            fn step(&self, month: Month, _prev: Option<&TestRow>) -> Result<TestRow> {
                Ok(TestRow { month, market: 10.0, volume: 11.0 })
            }
        }
        let err = run(&Oversold).unwrap_err();
        assert!(
            matches!(err, ForecastError::Computation { quantity: "source_volume_sum", .. }),
            "got {err:?}"
        );
    }
}
