//! Submission orchestration: resolve, score, submit-or-queue.
//!
//! Safety-critical submissions must always appear to succeed from the
//! operator's point of view: either the backend confirmed them, or they were
//! durably queued for later delivery. Nothing on this path silently vanishes.

use std::sync::Arc;

use tracing::{info, warn};

use crate::assessment::{HazardReport, RiskAssessment, RiskAssessmentInput};
use crate::backend::Backend;
use crate::config::Config;
use crate::error::Result;
use crate::schedule;
use crate::scoring::FactorSelection;
use crate::sync::{
    FlightStatusPayload, HazardReportPayload, OperationKind, SubmitAssessmentPayload, SyncQueue,
};
use crate::tracking::{Flight, FlightStatus};

/// How a submission reached safety.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The backend confirmed the write directly.
    Delivered {
        /// The tracked flight, when the operation created one.
        flight: Option<Flight>,
    },
    /// The write failed and was durably queued for later delivery.
    Queued {
        /// Identifier of the queued operation.
        operation_id: String,
    },
}

impl SubmitOutcome {
    /// Whether the backend already confirmed this submission.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Orchestrates the submission pipeline against a backend and queue.
pub struct SubmissionService {
    backend: Arc<dyn Backend>,
    queue: Arc<SyncQueue>,
    home_timezone: String,
    fallback_offset: chrono::FixedOffset,
}

impl std::fmt::Debug for SubmissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionService")
            .field("home_timezone", &self.home_timezone)
            .finish_non_exhaustive()
    }
}

impl SubmissionService {
    /// Create a service over the given collaborators.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, queue: Arc<SyncQueue>, config: &Config) -> Self {
        Self {
            backend,
            queue,
            home_timezone: config.schedule.home_timezone.clone(),
            fallback_offset: config.fallback_offset(),
        }
    }

    /// Build the assessment record for an input and its factor selection.
    ///
    /// Resolves the schedule, scores the selection, and derives the initial
    /// lifecycle status. Pure; no I/O.
    #[must_use]
    pub fn build_assessment(
        &self,
        input: RiskAssessmentInput,
        selection: &FactorSelection,
    ) -> RiskAssessment {
        let resolved = schedule::resolve(
            input.flight_date,
            &input.etd_local,
            &input.ete,
            &self.home_timezone,
            self.fallback_offset,
        );
        if resolved.used_fallback_offset {
            warn!(
                "Schedule for {} resolved with fixed fallback offset; times are reduced accuracy",
                input.tail_number
            );
        }

        let selected = selection.selected();
        let breakdown = selection.score();
        RiskAssessment::from_input(input, resolved, &breakdown, selected)
    }

    /// Submit an assessment and create its tracked flight.
    ///
    /// On any backend failure the submission is queued instead; the caller
    /// always gets a successful outcome.
    pub async fn submit_assessment(
        &self,
        org_id: &str,
        user_id: &str,
        assessment: RiskAssessment,
    ) -> SubmitOutcome {
        let requires_approval = assessment.requires_approval();

        let direct: Result<Flight> = async {
            let record = self
                .backend
                .submit_risk_assessment(org_id, user_id, &assessment)
                .await?;
            self.backend
                .create_tracked_flight(org_id, &record.id, &assessment, requires_approval)
                .await
        }
        .await;

        match direct {
            Ok(flight) => {
                info!(
                    "Assessment for {} delivered, flight {} created {}",
                    assessment.tail_number, flight.id, flight.status
                );
                SubmitOutcome::Delivered {
                    flight: Some(flight),
                }
            }
            Err(e) => {
                warn!(
                    "Assessment for {} failed to deliver, queuing: {e}",
                    assessment.tail_number
                );
                let payload = SubmitAssessmentPayload {
                    org_id: org_id.to_string(),
                    user_id: user_id.to_string(),
                    assessment,
                    requires_approval,
                };
                self.enqueue_payload(OperationKind::SubmitAssessment, &payload)
                    .await
            }
        }
    }

    /// Update a flight's status, queuing the update when the backend is
    /// unreachable.
    pub async fn update_flight_status(
        &self,
        flight_id: &str,
        status: FlightStatus,
    ) -> SubmitOutcome {
        match self.backend.update_flight_status(flight_id, status).await {
            Ok(()) => {
                info!("Flight {flight_id} status {status} delivered");
                SubmitOutcome::Delivered { flight: None }
            }
            Err(e) => {
                warn!("Flight {flight_id} status {status} failed to deliver, queuing: {e}");
                let payload = FlightStatusPayload {
                    flight_id: flight_id.to_string(),
                    status,
                };
                self.enqueue_payload(OperationKind::FlightStatusUpdate, &payload)
                    .await
            }
        }
    }

    /// Submit a hazard report, queuing it when the backend is unreachable.
    pub async fn submit_hazard_report(&self, report: HazardReport) -> SubmitOutcome {
        match self.backend.submit_hazard_report(&report).await {
            Ok(()) => SubmitOutcome::Delivered { flight: None },
            Err(e) => {
                warn!("Hazard report failed to deliver, queuing: {e}");
                let payload = HazardReportPayload { report };
                self.enqueue_payload(OperationKind::SubmitHazardReport, &payload)
                    .await
            }
        }
    }

    async fn enqueue_payload<P: serde::Serialize>(
        &self,
        kind: OperationKind,
        payload: &P,
    ) -> SubmitOutcome {
        // Payload structs serialize infallibly; Value::Null would only
        // appear for a non-serializable payload type.
        let value = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
        let operation_id = self.queue.enqueue(kind, value).await;
        SubmitOutcome::Queued { operation_id }
    }
}
