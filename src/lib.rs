//! Deterministic monthly forecasting engines for pharmaceutical launch and
//! loss-of-exclusivity events: generic entry, two-brand competition, and
//! Rx-to-OTC switches.
//!
//! Everything is parameterized and reproducible: the only randomness is the
//! seeded tender resolution in the generic-entry engine, so two runs with the
//! same parameters produce identical rows.

pub mod analysis;
pub mod brand;
pub mod config;
pub mod curves;
pub mod engine;
pub mod error;
pub mod generic_entry;
pub mod rx_otc;
pub mod scenario;
pub mod types;

pub use engine::{Forecast, MonthlyModel, MonthlyRow, run};
pub use error::{ForecastError, Result};
pub use scenario::{EngineParams, EnginePatch, ForecastOutput, Scenario, run_scenarios};
pub use types::{EngineId, Month};
