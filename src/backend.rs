//! Collaborator contracts: the durable backend and connectivity signal.
//!
//! The backend is consumed only through the named operations below; its wire
//! format is not this crate's concern. Implementations live in the host
//! application. Connectivity is abstracted the same way so headless services
//! can drive it from a polling probe while other hosts plug in platform
//! reachability events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::assessment::{HazardReport, RiskAssessment};
use crate::error::Result;
use crate::tasks::StopHandle;
use crate::tracking::{Flight, FlightStatus};

/// The record a successful assessment submission returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentRecord {
    /// Backend identifier of the stored assessment.
    pub id: String,
}

/// The durable remote store for safety-critical records.
///
/// Every method is a network call that may fail; callers route failures of
/// the write operations into the offline queue rather than dropping them.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Store a submitted risk assessment.
    async fn submit_risk_assessment(
        &self,
        org_id: &str,
        user_id: &str,
        assessment: &RiskAssessment,
    ) -> Result<AssessmentRecord>;

    /// Create the tracked flight for a stored assessment.
    ///
    /// With `requires_approval` the flight is created `PENDING_APPROVAL`,
    /// otherwise `ACTIVE`.
    async fn create_tracked_flight(
        &self,
        org_id: &str,
        assessment_id: &str,
        assessment: &RiskAssessment,
        requires_approval: bool,
    ) -> Result<Flight>;

    /// Update a flight's status.
    ///
    /// The backend stamps the arrival timestamp server-side for `ARRIVED`
    /// and `CANCELLED`.
    async fn update_flight_status(&self, flight_id: &str, status: FlightStatus) -> Result<()>;

    /// Approve a flight waiting in `PENDING_APPROVAL`.
    async fn approve_flight(&self, flight_id: &str) -> Result<()>;

    /// Reject a flight waiting in `PENDING_APPROVAL`.
    async fn reject_flight(&self, flight_id: &str) -> Result<()>;

    /// Record a reviewer decision on a pending assessment.
    async fn approve_or_reject_assessment(&self, assessment_id: &str, approve: bool)
        -> Result<()>;

    /// Store a hazard report.
    async fn submit_hazard_report(&self, report: &HazardReport) -> Result<()>;

    /// Lightweight connectivity probe: any cheap read suffices.
    ///
    /// Used only to decide whether a queue flush is worth attempting.
    async fn probe(&self) -> Result<()>;
}

/// Reports whether the backend is currently reachable and notifies on
/// changes.
pub trait ConnectivitySignal: Send + Sync {
    /// The most recently known connectivity state.
    fn is_online(&self) -> bool;

    /// Subscribe to connectivity changes. The channel carries the new state;
    /// a `true` edge means "became online".
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Connectivity signal driven by periodic backend probes.
///
/// Starts offline until the first successful probe. Hosts with a platform
/// reachability API can skip the probe loop and feed [`set_online`]
/// directly.
///
/// [`set_online`]: PollingConnectivity::set_online
#[derive(Debug)]
pub struct PollingConnectivity {
    online: AtomicBool,
    tx: watch::Sender<bool>,
}

impl Default for PollingConnectivity {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingConnectivity {
    /// Create a signal reporting offline.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            online: AtomicBool::new(false),
            tx,
        }
    }

    /// Record a connectivity state, notifying watchers on change.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
            self.tx.send_replace(online);
        }
    }

    /// Start the probe loop against a backend.
    ///
    /// Returns the stop handle and the task handle; the stop request takes
    /// effect before the next probe.
    pub fn spawn_probe_loop(
        self: &Arc<Self>,
        backend: Arc<dyn Backend>,
        interval: std::time::Duration,
    ) -> (StopHandle, JoinHandle<()>) {
        let handle = StopHandle::new();
        let loop_handle = handle.clone();
        let signal = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if loop_handle.should_stop() {
                    debug!("Probe loop stopping");
                    break;
                }
                signal.set_online(backend.probe().await.is_ok());
            }
        });

        (handle, task)
    }
}

impl ConnectivitySignal for PollingConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
