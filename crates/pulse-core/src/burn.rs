//! Burn-rate classification.
//!
//! A pulse's burn rate is the share of the target interval its cycles consume,
//! expressed as a percentage. The three tiers below are applied identically to
//! a single pulse (`getStats`) and to the fleet aggregate (`gorilla-burn`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Burn rates at or below this value are still `Building`.
pub const BUILDING_CEILING: f64 = 4.0;

/// Burn rates strictly above this value are `Optimal`.
pub const OPTIMAL_FLOOR: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurnClass {
    Optimal,
    Active,
    Building,
}

/// Bucket a burn rate. Lower bounds are exclusive: 4.0 is `Building`,
/// 40.0 is `Active`. NaN falls through to `Building`.
pub fn classify(burn_rate: f64) -> BurnClass {
    if burn_rate > OPTIMAL_FLOOR {
        BurnClass::Optimal
    } else if burn_rate > BUILDING_CEILING {
        BurnClass::Active
    } else {
        BurnClass::Building
    }
}

impl BurnClass {
    /// Upper-case label used in status strings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Optimal => "OPTIMAL",
            Self::Active => "ACTIVE",
            Self::Building => "BUILDING",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Optimal => "🦍",
            Self::Active => "⚡",
            Self::Building => "🔄",
        }
    }

    /// Emoji-prefixed label, e.g. `"⚡ ACTIVE"`.
    pub fn status_line(self) -> String {
        format!("{} {}", self.emoji(), self.label())
    }

    /// Short threshold legend shown next to per-class counts.
    pub fn threshold(self) -> &'static str {
        match self {
            Self::Optimal => "OPTIMAL (>40%)",
            Self::Active => "ACTIVE (>4%)",
            Self::Building => "BUILDING (<4%)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Optimal => {
                "Gorilla Vol burn rate is OPTIMAL! Trading efficiency exceeds 40%."
            }
            Self::Active => {
                "Gorilla Vol burn rate is ACTIVE. Trading efficiency above minimum threshold."
            }
            Self::Building => "Gorilla Vol burn rate is BUILDING. Efficiency below 4% threshold.",
        }
    }
}

impl fmt::Display for BurnClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Optimal => "optimal",
            Self::Active => "active",
            Self::Building => "building",
        };
        write!(f, "{s}")
    }
}
