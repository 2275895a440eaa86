//! Flight tracking, progress estimation, and overdue detection.
//!
//! A [`Flight`] is created from a submitted assessment and moves through a
//! forward-only state machine. Progress, interpolated position, and overdue
//! state are derived for display on every recompute tick; none of them are
//! stored, so a flight can become overdue while an operator is watching the
//! board.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::tasks::StopHandle;

/// Progress display caps at this value until arrival is confirmed.
pub const PROGRESS_CAP_PERCENT: f64 = 95.0;

/// Status of a tracked flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    /// En route.
    Active,
    /// Arrival confirmed.
    Arrived,
    /// Cancelled before completion.
    Cancelled,
    /// Waiting for a reviewer before activation.
    PendingApproval,
    /// Rejected by a reviewer.
    Rejected,
}

impl FlightStatus {
    /// Whether this status permits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Arrived | Self::Cancelled | Self::Rejected)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Transitions only run forward: terminal flights are never resurrected.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Arrived | Self::Cancelled)
                | (Self::PendingApproval, Self::Active | Self::Rejected)
        )
    }
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Arrived => write!(f, "ARRIVED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::PendingApproval => write!(f, "PENDING_APPROVAL"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A geographic point for map display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
}

/// A tracked flight derived from a submitted assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    /// Backend identifier.
    pub id: String,
    /// The assessment this flight was created from.
    pub assessment_id: String,
    /// Pilot in command.
    pub pilot: String,
    /// Registration.
    pub tail_number: String,
    /// Departure station identifier.
    pub departure_station: String,
    /// Destination station identifier, if filed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_station: Option<String>,
    /// Resolved departure instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etd: Option<DateTime<Utc>>,
    /// Resolved arrival instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
    /// Current status.
    pub status: FlightStatus,
    /// When the flight was filed.
    pub created_at: DateTime<Utc>,
    /// When the flight arrived or was cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrived_at: Option<DateTime<Utc>>,
    /// Departure station coordinates, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_coords: Option<Coordinates>,
    /// Destination station coordinates, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_coords: Option<Coordinates>,
}

impl Flight {
    /// Apply a status transition.
    ///
    /// Moving to `Arrived` or `Cancelled` stamps `arrived_at` with `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when the state machine forbids
    /// the move.
    pub fn transition(&mut self, next: FlightStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        info!("Flight {} transitions {} -> {}", self.id, self.status, next);
        self.status = next;
        if matches!(next, FlightStatus::Arrived | FlightStatus::Cancelled) {
            self.arrived_at = Some(now);
        }
        Ok(())
    }

    /// Display-only progress percentage.
    ///
    /// While active, elapsed time between filing and the resolved ETA,
    /// clamped to `[0, 95]`; 100 only once arrival is confirmed. `None` when
    /// the ETA is unresolved or not after the filed time, and for flights
    /// not yet active.
    #[must_use]
    pub fn progress_percent(&self, now: DateTime<Utc>) -> Option<f64> {
        match self.status {
            FlightStatus::Arrived => Some(100.0),
            FlightStatus::Active => {
                let eta = self.eta?;
                let total = (eta - self.created_at).num_seconds();
                if total <= 0 {
                    return None;
                }
                #[allow(clippy::cast_precision_loss)]
                let fraction =
                    (now - self.created_at).num_seconds() as f64 / total as f64;
                Some((fraction * 100.0).clamp(0.0, PROGRESS_CAP_PERCENT))
            }
            _ => None,
        }
    }

    /// Estimated position by linear interpolation between the station
    /// coordinates, for map display only. Requires both coordinates and a
    /// defined progress.
    #[must_use]
    pub fn estimated_position(&self, now: DateTime<Utc>) -> Option<Coordinates> {
        let from = self.departure_coords?;
        let to = self.destination_coords?;
        let fraction = self.progress_percent(now)? / 100.0;

        Some(Coordinates {
            latitude: from.latitude + (to.latitude - from.latitude) * fraction,
            longitude: from.longitude + (to.longitude - from.longitude) * fraction,
        })
    }

    /// Whether the flight is overdue: still active with a resolved ETA in
    /// the past. Derived state, never stored.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == FlightStatus::Active && self.eta.map_or(false, |eta| now > eta)
    }

    /// Whether the flight belongs on the default active board.
    ///
    /// Arrived flights age off after the retention window; nothing is
    /// deleted, this is a pure display filter.
    #[must_use]
    pub fn on_active_board(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match (self.status, self.arrived_at) {
            (FlightStatus::Arrived, Some(arrived)) => now - arrived <= retention,
            _ => true,
        }
    }
}

/// Derived display state for one flight, recomputed on every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightSnapshot {
    /// Backend identifier of the flight.
    pub flight_id: String,
    /// Status at snapshot time.
    pub status: FlightStatus,
    /// Progress percentage, when defined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    /// Whether the flight is overdue.
    pub overdue: bool,
    /// Interpolated position, when both station coordinates are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Coordinates>,
    /// Resolved ETA, for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
}

impl FlightSnapshot {
    fn of(flight: &Flight, now: DateTime<Utc>) -> Self {
        Self {
            flight_id: flight.id.clone(),
            status: flight.status,
            progress_percent: flight.progress_percent(now),
            overdue: flight.is_overdue(now),
            position: flight.estimated_position(now),
            eta: flight.eta,
        }
    }
}

/// The set of tracked flights with periodically recomputed display state.
///
/// Snapshots are published through a watch channel so views refresh without
/// polling the board themselves.
#[derive(Debug)]
pub struct FlightBoard {
    flights: Mutex<Vec<Flight>>,
    snapshots_tx: watch::Sender<Vec<FlightSnapshot>>,
    retention: Duration,
}

impl FlightBoard {
    /// Create an empty board with the given arrived-flight retention window.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        let (snapshots_tx, _) = watch::channel(Vec::new());
        Self {
            flights: Mutex::new(Vec::new()),
            snapshots_tx,
            retention,
        }
    }

    /// Add a flight, or replace the stored copy with the same id.
    pub async fn upsert(&self, flight: Flight) {
        let mut flights = self.flights.lock().await;
        if let Some(existing) = flights.iter_mut().find(|f| f.id == flight.id) {
            *existing = flight;
        } else {
            flights.push(flight);
        }
    }

    /// Apply a status transition to a stored flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the flight is unknown or the transition is
    /// invalid.
    pub async fn transition(
        &self,
        flight_id: &str,
        next: FlightStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut flights = self.flights.lock().await;
        let flight = flights
            .iter_mut()
            .find(|f| f.id == flight_id)
            .ok_or_else(|| Error::backend(format!("unknown flight: {flight_id}")))?;
        flight.transition(next, now)
    }

    /// Number of stored flights, including aged-off ones.
    pub async fn len(&self) -> usize {
        self.flights.lock().await.len()
    }

    /// Whether the board stores no flights.
    pub async fn is_empty(&self) -> bool {
        self.flights.lock().await.is_empty()
    }

    /// Recompute display state for every flight on the default board and
    /// publish the result.
    pub async fn recompute(&self, now: DateTime<Utc>) -> Vec<FlightSnapshot> {
        let flights = self.flights.lock().await;
        let snapshots: Vec<FlightSnapshot> = flights
            .iter()
            .filter(|f| f.on_active_board(now, self.retention))
            .map(|f| FlightSnapshot::of(f, now))
            .collect();
        drop(flights);

        debug!("Recomputed {} flight snapshots", snapshots.len());
        self.snapshots_tx.send_replace(snapshots.clone());
        snapshots
    }

    /// Subscribe to published snapshots.
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Vec<FlightSnapshot>> {
        self.snapshots_tx.subscribe()
    }
}

/// Start the periodic recompute loop for a board.
///
/// Returns the stop handle and the task handle. The stop request takes
/// effect before the next tick.
pub fn spawn_tracker(
    board: Arc<FlightBoard>,
    interval: std::time::Duration,
) -> (StopHandle, JoinHandle<()>) {
    let handle = StopHandle::new();
    let loop_handle = handle.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if loop_handle.should_stop() {
                debug!("Tracker loop stopping");
                break;
            }
            board.recompute(Utc::now()).await;
        }
    });

    (handle, task)
}
