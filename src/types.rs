use serde::Serialize;

/// Simulation time in months (1 unit = 1 simulated month).
/// Month indices are 0-based and contiguous over a run: the first row of a
/// forecast is always `Month(0)` and consecutive rows differ by exactly 1.
/// There is no calendar anchoring inside the core; seasonality tables map a
/// month index to a January–December slot via [`Month::calendar_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Month(pub u32);

impl Month {
    /// Advance by a number of months.
    pub fn offset(self, months: u32) -> Self {
        Month(self.0 + months)
    }

    /// Months elapsed since `start`, or `None` if `self` is before `start`.
    pub fn since(self, start: Month) -> Option<u32> {
        self.0.checked_sub(start.0)
    }

    /// 0-based calendar slot (0 = January) assuming the run starts in the
    /// calendar month `first_slot` (also 0-based).
    pub fn calendar_slot(self, first_slot: usize) -> usize {
        (self.0 as usize + first_slot) % 12
    }
}

/// Identifies one of the three forecast engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EngineId {
    GenericEntry,
    BrandCompetition,
    RxOtc,
}

impl EngineId {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineId::GenericEntry => "generic-entry",
            EngineId::BrandCompetition => "brand-competition",
            EngineId::RxOtc => "rx-otc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_is_none_before_start() {
        assert_eq!(Month(3).since(Month(6)), None);
        assert_eq!(Month(6).since(Month(6)), Some(0));
        assert_eq!(Month(9).since(Month(6)), Some(3));
    }

    #[test]
    fn calendar_slot_wraps_after_december() {
        // Run starting in July (slot 6): month 0 → July, month 6 → January.
        assert_eq!(Month(0).calendar_slot(6), 6);
        assert_eq!(Month(6).calendar_slot(6), 0);
        assert_eq!(Month(18).calendar_slot(6), 0);
    }
}
