//! Risk factor catalog, thresholds, and composite scoring.
//!
//! The factor catalog and threshold table are static: they form the active
//! assessment template and do not change at runtime. Scoring is a pure
//! function of the selected factor set, so the same selection always produces
//! the same score and classification regardless of the order in which factors
//! were toggled.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Factor id: ceiling below VFR minimums at a relevant station.
pub const FACTOR_WX_LOW_CEILING: &str = "wx-low-ceiling";
/// Factor id: visibility below 3 statute miles.
pub const FACTOR_WX_LOW_VISIBILITY: &str = "wx-low-visibility";
/// Factor id: sustained wind or gusts above 15 knots.
pub const FACTOR_WX_STRONG_WIND: &str = "wx-strong-wind";
/// Factor id: thunderstorms reported or forecast.
pub const FACTOR_WX_THUNDERSTORM: &str = "wx-thunderstorm";
/// Factor id: wind shear reported or forecast.
pub const FACTOR_WX_WIND_SHEAR: &str = "wx-wind-shear";

/// The category a risk factor belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    /// Meteorological factors.
    Weather,
    /// Pilot and crew factors.
    Crew,
    /// Airframe and equipment factors.
    Aircraft,
    /// Terrain, lighting, and airport environment factors.
    Environment,
    /// Mission and external-pressure factors.
    Operational,
}

impl std::fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weather => write!(f, "Weather"),
            Self::Crew => write!(f, "Crew"),
            Self::Aircraft => write!(f, "Aircraft"),
            Self::Environment => write!(f, "Environment"),
            Self::Operational => write!(f, "Operational"),
        }
    }
}

/// One entry in the static risk factor catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskFactor {
    /// Stable identifier referenced by selections and weather flags.
    pub id: &'static str,
    /// Category the factor is grouped under.
    pub category: FactorCategory,
    /// Human-readable checklist label.
    pub label: &'static str,
    /// Points this factor contributes when selected.
    pub weight: u32,
}

/// The active factor catalog, grouped by category.
static CATALOG: &[RiskFactor] = &[
    // Weather
    RiskFactor {
        id: FACTOR_WX_LOW_CEILING,
        category: FactorCategory::Weather,
        label: "Ceiling below 1,000 ft AGL",
        weight: 8,
    },
    RiskFactor {
        id: FACTOR_WX_LOW_VISIBILITY,
        category: FactorCategory::Weather,
        label: "Visibility below 3 SM",
        weight: 8,
    },
    RiskFactor {
        id: FACTOR_WX_STRONG_WIND,
        category: FactorCategory::Weather,
        label: "Surface wind or gusts above 15 kt",
        weight: 5,
    },
    RiskFactor {
        id: FACTOR_WX_THUNDERSTORM,
        category: FactorCategory::Weather,
        label: "Thunderstorms reported or forecast",
        weight: 10,
    },
    RiskFactor {
        id: FACTOR_WX_WIND_SHEAR,
        category: FactorCategory::Weather,
        label: "Wind shear reported or forecast",
        weight: 9,
    },
    RiskFactor {
        id: "wx-icing",
        category: FactorCategory::Weather,
        label: "Known or forecast icing conditions",
        weight: 9,
    },
    // Crew
    RiskFactor {
        id: "crew-long-duty-day",
        category: FactorCategory::Crew,
        label: "Duty day exceeds 12 hours",
        weight: 6,
    },
    RiskFactor {
        id: "crew-reduced-rest",
        category: FactorCategory::Crew,
        label: "Less than 8 hours rest before duty",
        weight: 7,
    },
    RiskFactor {
        id: "crew-low-time-in-type",
        category: FactorCategory::Crew,
        label: "Fewer than 100 hours in type",
        weight: 5,
    },
    RiskFactor {
        id: "crew-ifr-currency",
        category: FactorCategory::Crew,
        label: "No IFR approach flown in past 90 days",
        weight: 6,
    },
    // Aircraft
    RiskFactor {
        id: "acft-open-mel",
        category: FactorCategory::Aircraft,
        label: "Open MEL or deferred maintenance items",
        weight: 4,
    },
    RiskFactor {
        id: "acft-unfamiliar-equipment",
        category: FactorCategory::Aircraft,
        label: "Unfamiliar avionics or equipment",
        weight: 5,
    },
    RiskFactor {
        id: "acft-performance-margin",
        category: FactorCategory::Aircraft,
        label: "Performance within 10% of limits",
        weight: 7,
    },
    // Environment
    RiskFactor {
        id: "env-night",
        category: FactorCategory::Environment,
        label: "Night operation",
        weight: 5,
    },
    RiskFactor {
        id: "env-mountainous",
        category: FactorCategory::Environment,
        label: "Mountainous terrain en route",
        weight: 6,
    },
    RiskFactor {
        id: "env-unfamiliar-airport",
        category: FactorCategory::Environment,
        label: "Unfamiliar departure or destination",
        weight: 4,
    },
    RiskFactor {
        id: "env-short-runway",
        category: FactorCategory::Environment,
        label: "Runway length under 1.5x requirement",
        weight: 7,
    },
    // Operational
    RiskFactor {
        id: "ops-schedule-pressure",
        category: FactorCategory::Operational,
        label: "External pressure to complete the flight",
        weight: 6,
    },
    RiskFactor {
        id: "ops-no-alternate",
        category: FactorCategory::Operational,
        label: "No alternate airport planned",
        weight: 5,
    },
    RiskFactor {
        id: "ops-passenger-pressure",
        category: FactorCategory::Operational,
        label: "Passenger-driven urgency",
        weight: 5,
    },
];

/// Get the active factor catalog.
#[must_use]
pub fn catalog() -> &'static [RiskFactor] {
    CATALOG
}

/// Look up a catalog factor by id.
#[must_use]
pub fn factor(id: &str) -> Option<&'static RiskFactor> {
    CATALOG.iter().find(|f| f.id == id)
}

/// Overall risk classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Routine risk; proceed as planned.
    Low,
    /// Elevated risk; mitigations expected before departure.
    Elevated,
    /// High risk; departure requires management approval.
    High,
}

impl RiskLevel {
    /// Whether this level requires a human approval before the flight
    /// becomes active.
    #[must_use]
    pub fn requires_approval(self) -> bool {
        matches!(self, Self::High)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Elevated => write!(f, "elevated"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One band of the score classification table.
///
/// The table partitions `[0, ∞)`: bands are sorted ascending by `min_score`,
/// contiguous, and non-overlapping, and the last band is open-ended
/// (`max_score == None`), so exactly one band matches any score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskThreshold {
    /// Classification this band maps to.
    pub level: RiskLevel,
    /// Lowest score in the band (inclusive).
    pub min_score: u32,
    /// Highest score in the band (inclusive); `None` means unbounded.
    pub max_score: Option<u32>,
    /// Display label for the band.
    pub label: &'static str,
    /// Required action for flights scoring in the band.
    pub action: &'static str,
}

impl RiskThreshold {
    /// Whether the given score falls inside this band.
    #[must_use]
    pub fn contains(&self, score: u32) -> bool {
        score >= self.min_score && self.max_score.map_or(true, |max| score <= max)
    }
}

static THRESHOLDS: &[RiskThreshold] = &[
    RiskThreshold {
        level: RiskLevel::Low,
        min_score: 0,
        max_score: Some(20),
        label: "Low risk",
        action: "Proceed as planned",
    },
    RiskThreshold {
        level: RiskLevel::Elevated,
        min_score: 21,
        max_score: Some(35),
        label: "Elevated risk",
        action: "Review mitigations before departure",
    },
    RiskThreshold {
        level: RiskLevel::High,
        min_score: 36,
        max_score: None,
        label: "High risk",
        action: "Management approval required before departure",
    },
];

/// Get the active threshold table.
#[must_use]
pub fn thresholds() -> &'static [RiskThreshold] {
    THRESHOLDS
}

/// Verify that a threshold table partitions `[0, ∞)`.
///
/// Checks ascending order, a zero start, contiguity between bands, and an
/// open-ended final band. Returns a description of the first violation.
pub fn validate_partition(table: &[RiskThreshold]) -> std::result::Result<(), String> {
    let Some(first) = table.first() else {
        return Err("threshold table is empty".to_string());
    };
    if first.min_score != 0 {
        return Err(format!("first band starts at {}, not 0", first.min_score));
    }

    for pair in table.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        match a.max_score {
            None => return Err(format!("band starting at {} is open-ended but not last", a.min_score)),
            Some(max) if b.min_score != max + 1 => {
                return Err(format!(
                    "gap or overlap between bands: {max} is followed by {}",
                    b.min_score
                ));
            }
            Some(_) => {}
        }
    }

    match table.last() {
        Some(last) if last.max_score.is_none() => Ok(()),
        _ => Err("last band must be open-ended".to_string()),
    }
}

/// Classify a score against the active threshold table.
///
/// The partition invariant guarantees exactly one band matches.
#[must_use]
pub fn classify(score: u32) -> &'static RiskThreshold {
    THRESHOLDS
        .iter()
        .find(|t| t.contains(score))
        .unwrap_or_else(|| {
            // Unreachable while THRESHOLDS partitions [0, inf)
            &THRESHOLDS[THRESHOLDS.len() - 1]
        })
}

/// Composite score with its classification and per-category subtotals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreBreakdown {
    /// Sum of the weights of all selected factors.
    pub total: u32,
    /// The threshold band containing the total.
    pub threshold: &'static RiskThreshold,
    /// Per-category weight subtotals, for display only.
    pub by_category: BTreeMap<FactorCategory, u32>,
}

impl ScoreBreakdown {
    /// The resolved risk level.
    #[must_use]
    pub fn level(&self) -> RiskLevel {
        self.threshold.level
    }
}

/// Score a selected factor set against the catalog.
///
/// Ids not present in the catalog contribute nothing. Deterministic and
/// order-independent: only set membership matters.
#[must_use]
pub fn score(selected: &BTreeSet<String>) -> ScoreBreakdown {
    let mut total = 0;
    let mut by_category: BTreeMap<FactorCategory, u32> = BTreeMap::new();

    for f in CATALOG {
        if selected.contains(f.id) {
            total += f.weight;
            *by_category.entry(f.category).or_insert(0) += f.weight;
        }
    }

    ScoreBreakdown {
        total,
        threshold: classify(total),
        by_category,
    }
}

/// Reconciled factor selection state.
///
/// Three sets interact: factors the analyst checked by hand, factors the
/// weather engine is currently raising, and auto-raised factors the analyst
/// explicitly rejected. Re-running the weather analysis must not resurrect a
/// rejected factor while its underlying flag is still raised; once the flag
/// clears, the rejection is forgotten so a genuinely new raise is surfaced
/// again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorSelection {
    checked: BTreeSet<String>,
    auto_flagged: BTreeSet<String>,
    suppressed: BTreeSet<String>,
}

impl FactorSelection {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the auto-raised flag set after a weather re-analysis.
    ///
    /// Suppressions are kept only for flags still raised; the rest are
    /// dropped.
    pub fn apply_auto_flags(&mut self, flags: &BTreeSet<String>) {
        self.auto_flagged = flags.clone();
        self.suppressed = self
            .suppressed
            .intersection(flags)
            .cloned()
            .collect();
    }

    /// Toggle a factor.
    ///
    /// An auto-raised factor toggles between suppressed and raised; any other
    /// factor toggles between checked and unchecked.
    pub fn toggle(&mut self, id: &str) {
        if self.auto_flagged.contains(id) {
            if !self.suppressed.remove(id) {
                self.suppressed.insert(id.to_string());
            }
        } else if !self.checked.remove(id) {
            self.checked.insert(id.to_string());
        }
    }

    /// Whether the given factor is currently selected.
    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        (self.checked.contains(id) || self.auto_flagged.contains(id))
            && !self.suppressed.contains(id)
    }

    /// The effective selected factor set: manual checks plus auto flags,
    /// minus suppressions.
    #[must_use]
    pub fn selected(&self) -> BTreeSet<String> {
        self.checked
            .union(&self.auto_flagged)
            .filter(|id| !self.suppressed.contains(*id))
            .cloned()
            .collect()
    }

    /// Score the current selection.
    #[must_use]
    pub fn score(&self) -> ScoreBreakdown {
        score(&self.selected())
    }
}
