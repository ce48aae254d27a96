use pulse_core::{classify, BurnClass};
use serde::Serialize;

/// Fleet-wide snapshot over the currently active pulses.
///
/// `activeTierPulses` counts pulses in the *active* burn class; `activePulses`
/// is the number of running pulses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub active_pulses: usize,
    /// Distinct pulse ids ever started.
    pub total_pulses: usize,
    pub avg_burn_rate: f64,
    pub optimal_pulses: usize,
    pub active_tier_pulses: usize,
    pub building_pulses: usize,
}

impl PerformanceMetrics {
    /// Class of the fleet-wide mean burn.
    pub fn class(&self) -> BurnClass {
        classify(self.avg_burn_rate)
    }

    pub fn count(&self, class: BurnClass) -> usize {
        match class {
            BurnClass::Optimal => self.optimal_pulses,
            BurnClass::Active => self.active_tier_pulses,
            BurnClass::Building => self.building_pulses,
        }
    }
}

/// Aggregate per-pulse burn rates. An empty fleet reports zeros.
pub fn aggregate(burn_rates: impl IntoIterator<Item = f64>, total_pulses: usize) -> PerformanceMetrics {
    let mut metrics = PerformanceMetrics {
        active_pulses: 0,
        total_pulses,
        avg_burn_rate: 0.0,
        optimal_pulses: 0,
        active_tier_pulses: 0,
        building_pulses: 0,
    };

    let mut sum = 0.0;
    for rate in burn_rates {
        metrics.active_pulses += 1;
        sum += rate;
        match classify(rate) {
            BurnClass::Optimal => metrics.optimal_pulses += 1,
            BurnClass::Active => metrics.active_tier_pulses += 1,
            BurnClass::Building => metrics.building_pulses += 1,
        }
    }
    if metrics.active_pulses > 0 {
        metrics.avg_burn_rate = sum / metrics.active_pulses as f64;
    }
    metrics
}
