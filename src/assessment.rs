//! Risk assessment records and submission input.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::ResolvedSchedule;
use crate::scoring::{RiskLevel, ScoreBreakdown};

/// Lifecycle status of a submitted assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// Accepted without human review.
    AutoApproved,
    /// Waiting for a reviewer decision.
    Pending,
    /// Approved by a reviewer.
    Approved,
    /// Rejected by a reviewer.
    Rejected,
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Everything an operator supplies when filing an assessment.
///
/// Fields are explicit and typed; optional fields are genuinely optional in
/// the domain, not "maybe present" artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessmentInput {
    /// Pilot in command.
    pub pilot: String,
    /// Aircraft make/model.
    pub aircraft_type: String,
    /// Registration.
    pub tail_number: String,
    /// Departure station identifier.
    pub departure_station: String,
    /// Destination station identifier, if filed.
    pub destination_station: Option<String>,
    /// Planned cruise altitude in feet.
    pub cruise_altitude_ft: Option<u32>,
    /// Flight date in the operator's home timezone.
    pub flight_date: Option<NaiveDate>,
    /// Local departure time, lenient 4-digit wall clock.
    pub etd_local: String,
    /// Estimated time en route (`H:MM`, decimal hours, or `HMM`).
    pub ete: String,
    /// Free-text remarks.
    pub remarks: Option<String>,
    /// Names of attached documents.
    pub attachments: Vec<String>,
}

impl RiskAssessmentInput {
    /// The station identifiers in analysis order: departure, then
    /// destination when filed.
    #[must_use]
    pub fn stations(&self) -> Vec<String> {
        let mut stations = vec![self.departure_station.clone()];
        if let Some(destination) = &self.destination_station {
            stations.push(destination.clone());
        }
        stations
    }
}

/// A filed flight risk assessment.
///
/// Immutable once submitted; only the backend moves `status` through its
/// approval transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Pilot in command.
    pub pilot: String,
    /// Aircraft make/model.
    pub aircraft_type: String,
    /// Registration.
    pub tail_number: String,
    /// Departure station identifier.
    pub departure_station: String,
    /// Destination station identifier, if filed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_station: Option<String>,
    /// Planned cruise altitude in feet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cruise_altitude_ft: Option<u32>,
    /// Flight date in the operator's home timezone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_date: Option<NaiveDate>,
    /// Local departure time as filed.
    pub etd_local: String,
    /// Estimated time en route as filed.
    pub ete: String,
    /// Resolved departure instant; `None` when the schedule was unresolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etd: Option<DateTime<Utc>>,
    /// Resolved arrival instant; `None` when the schedule was unresolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
    /// True when the schedule was resolved with the fixed fallback offset.
    pub reduced_accuracy_schedule: bool,
    /// Selected factor ids at submission time.
    pub selected_factors: BTreeSet<String>,
    /// Composite score.
    pub score: u32,
    /// Resolved classification.
    pub risk_level: RiskLevel,
    /// Free-text remarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// Names of attached documents.
    pub attachments: Vec<String>,
    /// Lifecycle status.
    pub status: AssessmentStatus,
}

impl RiskAssessment {
    /// Build an assessment from its input, resolved schedule, and score.
    ///
    /// The initial status follows the classification: levels requiring
    /// approval start `Pending`, all others `AutoApproved`.
    #[must_use]
    pub fn from_input(
        input: RiskAssessmentInput,
        schedule: ResolvedSchedule,
        breakdown: &ScoreBreakdown,
        selected: BTreeSet<String>,
    ) -> Self {
        let level = breakdown.level();
        let status = if level.requires_approval() {
            AssessmentStatus::Pending
        } else {
            AssessmentStatus::AutoApproved
        };

        Self {
            pilot: input.pilot,
            aircraft_type: input.aircraft_type,
            tail_number: input.tail_number,
            departure_station: input.departure_station,
            destination_station: input.destination_station,
            cruise_altitude_ft: input.cruise_altitude_ft,
            flight_date: input.flight_date,
            etd_local: input.etd_local,
            ete: input.ete,
            etd: schedule.departure,
            eta: schedule.arrival,
            reduced_accuracy_schedule: schedule.used_fallback_offset,
            selected_factors: selected,
            score: breakdown.total,
            risk_level: level,
            remarks: input.remarks,
            attachments: input.attachments,
            status,
        }
    }

    /// Whether this assessment needs a reviewer before the flight activates.
    #[must_use]
    pub fn requires_approval(&self) -> bool {
        self.risk_level.requires_approval()
    }
}

/// A field hazard report, delivered on the same guaranteed path as
/// assessments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardReport {
    /// Who reported the hazard.
    pub reporter: String,
    /// Related flight, when the hazard occurred on one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_id: Option<String>,
    /// Where the hazard was encountered.
    pub location: String,
    /// Narrative description.
    pub description: String,
    /// Reporter-assessed severity, 1 (minor) through 5 (critical).
    pub severity: u8,
    /// When the hazard occurred.
    pub occurred_at: DateTime<Utc>,
}
