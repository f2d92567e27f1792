//! Curve-shape primitives shared by all three forecast engines.
//!
//! Everything here is a pure function of its inputs: no state, no RNG, no
//! month-to-month recursion. The engines compose these shapes into volume and
//! price trajectories.

use crate::error::{ForecastError, Result};
use crate::types::Month;

/// Exponential decay from `v0` toward `floor`:
/// `floor + (v0 - floor) * exp(-rate * t)`.
///
/// Non-increasing in `t` and never below `floor`. Used for originator share
/// erosion, price defense, Rx channel decline and cannibalization streams.
pub fn decay_to_floor(v0: f64, rate: f64, floor: f64, t: f64) -> Result<f64> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(ForecastError::validation("rate", format!("decay rate {rate} must be >= 0")));
    }
    if floor > v0 {
        return Err(ForecastError::validation(
            "floor",
            format!("floor {floor} exceeds initial value {v0}"),
        ));
    }
    Ok(floor + (v0 - floor) * (-rate * t).exp())
}

/// Decay rate such that the curve covers all but 5% of the distance to the
/// floor after `months`. The original erosion calibration: `-ln(0.05)/months`,
/// optionally scaled by a speed factor (1.0 = normal).
pub fn rate_for_95pct_by(months: u32, speed: f64) -> f64 {
    if months == 0 {
        return f64::INFINITY;
    }
    -(0.05f64).ln() / months as f64 * speed
}

/// Decay rate such that a fraction `loss` of the initial value is gone after
/// `months` (the Rx-decline calibration `-ln(1 - loss)/months`).
pub fn rate_for_loss_by(loss: f64, months: u32) -> f64 {
    if months == 0 || loss <= 0.0 {
        return 0.0;
    }
    -(1.0 - loss).ln() / months as f64
}

/// Logistic S-curve: `ceiling / (1 + exp(-steepness * (t - midpoint)))`.
///
/// Non-decreasing, asymptotic to `ceiling`, exactly `ceiling / 2` at
/// `t = midpoint`. Used for adoption ramps (generic uptake, OTC ramp).
pub fn logistic(ceiling: f64, midpoint: f64, steepness: f64, t: f64) -> f64 {
    ceiling / (1.0 + (-steepness * (t - midpoint)).exp())
}

/// Piecewise-linear ramp: 0 before `start`, linear up to `peak` between
/// `start` and `full`, plateau at `peak` afterwards.
///
/// This is the aut-idem substitution-quota shape: no substitution until the
/// reference-price group is in force, then a ramp as pharmacies switch over.
pub fn linear_ramp(t: u32, start: u32, full: u32, peak: f64) -> f64 {
    if t < start {
        0.0
    } else if t >= full || full <= start {
        peak
    } else {
        peak * (t - start) as f64 / (full - start) as f64
    }
}

/// A January–December table of multiplicative seasonal factors.
///
/// Factors are positive reals expected to average ~1.0 over a year (the
/// engines do not renormalize; the canonical tables satisfy this and a test
/// asserts it). `first_slot` is the 0-based calendar month the simulation
/// starts in.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Seasonality {
    factors: [f64; 12],
    first_slot: usize,
}

impl Seasonality {
    pub fn new(factors: &[f64]) -> Result<Self> {
        let factors: [f64; 12] = factors.try_into().map_err(|_| {
            ForecastError::validation(
                "seasonality",
                format!("table must have 12 entries, got {}", factors.len()),
            )
        })?;
        if let Some(bad) = factors.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            return Err(ForecastError::validation(
                "seasonality",
                format!("factor {bad} must be a positive real"),
            ));
        }
        Ok(Seasonality { factors, first_slot: 0 })
    }

    /// A flat table (factor 1.0 every month).
    pub fn flat() -> Self {
        Seasonality { factors: [1.0; 12], first_slot: 0 }
    }

    pub fn starting_in(mut self, first_slot: usize) -> Self {
        self.first_slot = first_slot % 12;
        self
    }

    /// Multiplier for a simulation month.
    pub fn factor(&self, month: Month) -> f64 {
        self.factors[month.calendar_slot(self.first_slot)]
    }

    /// Smallest factor in the table (the seasonal trough).
    pub fn min_factor(&self) -> f64 {
        self.factors.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Mean factor across the year; ~1.0 for a well-formed table.
    pub fn mean_factor(&self) -> f64 {
        self.factors.iter().sum::<f64>() / 12.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decay_rejects_negative_rate_and_floor_above_start() {
        assert!(decay_to_floor(1.0, -0.1, 0.0, 1.0).is_err());
        assert!(decay_to_floor(1.0, 0.1, 2.0, 1.0).is_err());
    }

    #[test]
    fn decay_reaches_floor_in_the_limit() {
        let v = decay_to_floor(100.0, 0.2, 12.0, 10_000.0).unwrap();
        assert!((v - 12.0).abs() < 1e-6, "expected ~12.0 at t=10000, got {v}");
    }

    #[test]
    fn rate_calibration_covers_95pct() {
        let rate = rate_for_95pct_by(18, 1.0);
        let v = decay_to_floor(1.0, rate, 0.0, 18.0).unwrap();
        assert!((v - 0.05).abs() < 1e-12, "5% should remain at the calibration month, got {v}");
    }

    #[test]
    fn logistic_half_ceiling_at_midpoint() {
        assert_eq!(logistic(0.55, 12.0, 0.3, 12.0), 0.275);
    }

    #[test]
    fn logistic_limits() {
        assert!(logistic(1.0, 12.0, 0.5, 1e6) > 1.0 - 1e-9);
        assert!(logistic(1.0, 12.0, 0.5, -1e6) < 1e-9);
    }

    #[test]
    fn linear_ramp_shape() {
        assert_eq!(linear_ramp(0, 6, 12, 0.75), 0.0);
        assert_eq!(linear_ramp(5, 6, 12, 0.75), 0.0);
        assert_eq!(linear_ramp(9, 6, 12, 0.75), 0.375);
        assert_eq!(linear_ramp(12, 6, 12, 0.75), 0.75);
        assert_eq!(linear_ramp(40, 6, 12, 0.75), 0.75);
        // Degenerate window jumps straight to the plateau.
        assert_eq!(linear_ramp(6, 6, 6, 0.75), 0.75);
    }

    #[test]
    fn seasonality_rejects_wrong_length_and_nonpositive() {
        assert!(Seasonality::new(&[1.0; 11]).is_err());
        assert!(Seasonality::new(&[1.0; 13]).is_err());
        let mut t = [1.0; 12];
        t[4] = 0.0;
        assert!(Seasonality::new(&t).is_err());
    }

    #[test]
    fn seasonality_offset_start() {
        let mut t = [1.0; 12];
        t[0] = 0.9; // January
        let s = Seasonality::new(&t).unwrap().starting_in(6); // run starts in July
        assert_eq!(s.factor(Month(0)), 1.0);
        assert_eq!(s.factor(Month(6)), 0.9);
        assert_eq!(s.factor(Month(18)), 0.9);
    }

    proptest! {
        #[test]
        fn decay_is_non_increasing_and_floored(
            v0 in 0.0..1e9f64,
            floor_frac in 0.0..1.0f64,
            rate in 0.0..2.0f64,
            t in 0.0..600.0f64,
        ) {
            let floor = v0 * floor_frac;
            let a = decay_to_floor(v0, rate, floor, t).unwrap();
            let b = decay_to_floor(v0, rate, floor, t + 1.0).unwrap();
            prop_assert!(b <= a + 1e-9);
            prop_assert!(a >= floor - 1e-9);
            prop_assert!(a <= v0 + 1e-9);
        }

        #[test]
        fn logistic_is_non_decreasing_and_bounded(
            ceiling in 0.0..1e9f64,
            midpoint in 0.0..120.0f64,
            steepness in 0.001..3.0f64,
            t in -120.0..240.0f64,
        ) {
            let a = logistic(ceiling, midpoint, steepness, t);
            let b = logistic(ceiling, midpoint, steepness, t + 1.0);
            prop_assert!(b + 1e-9 >= a);
            prop_assert!((0.0..=ceiling + 1e-9).contains(&a));
        }
    }
}
