//! Offline sync queue for safety-critical submissions.
//!
//! Any backend write that fails is converted into a [`QueueOperation`] and
//! delivered later, at least once, in enqueue order. The queue persists every
//! mutation to local storage before returning, so a crash or restart never
//! loses an accepted submission. Delivery is gated on a lightweight
//! connectivity probe; a flush pass is not atomic across operations, and each
//! operation carries an idempotency key so the backend can absorb the
//! resulting duplicates.

pub mod store;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assessment::{HazardReport, RiskAssessment};
use crate::backend::{Backend, ConnectivitySignal};
use crate::error::Result;
use crate::tasks::StopHandle;
use crate::tracking::FlightStatus;

pub use store::QueueStore;

/// The kind of a queued operation, selecting its delivery handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Submit a risk assessment and create its tracked flight.
    SubmitAssessment,
    /// Update a flight's status.
    FlightStatusUpdate,
    /// Submit a hazard report.
    SubmitHazardReport,
}

impl OperationKind {
    /// Stable storage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubmitAssessment => "submit_assessment",
            Self::FlightStatusUpdate => "flight_status_update",
            Self::SubmitHazardReport => "submit_hazard_report",
        }
    }

    /// Parse a stable storage name.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submit_assessment" => Some(Self::SubmitAssessment),
            "flight_status_update" => Some(Self::FlightStatusUpdate),
            "submit_hazard_report" => Some(Self::SubmitHazardReport),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued backend write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueOperation {
    /// Unique operation identifier.
    pub id: String,
    /// Delivery handler selector.
    pub kind: OperationKind,
    /// Handler-specific payload.
    pub payload: serde_json::Value,
    /// When the operation entered the queue.
    pub enqueued_at: DateTime<Utc>,
    /// Delivery attempts so far.
    pub retries: u32,
    /// Client-generated key the backend uses to deduplicate resends.
    pub idempotency_key: String,
}

/// Payload for [`OperationKind::SubmitAssessment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAssessmentPayload {
    /// Owning organization.
    pub org_id: String,
    /// Submitting user.
    pub user_id: String,
    /// The assessment to store.
    pub assessment: RiskAssessment,
    /// Whether the derived flight needs approval before activating.
    pub requires_approval: bool,
}

/// Payload for [`OperationKind::FlightStatusUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightStatusPayload {
    /// Flight to update.
    pub flight_id: String,
    /// Target status.
    pub status: FlightStatus,
}

/// Payload for [`OperationKind::SubmitHazardReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardReportPayload {
    /// The report to store.
    pub report: HazardReport,
}

/// What a flush attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The connectivity probe failed; nothing was attempted.
    SkippedOffline,
    /// Operations were attempted (possibly zero, if the queue was empty).
    Flushed(FlushReport),
}

/// Per-flush delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Operations attempted this pass.
    pub attempted: usize,
    /// Operations delivered and removed.
    pub delivered: usize,
    /// Operations that failed and were kept for retry.
    pub failed: usize,
}

type DeliveredCallback = Box<dyn Fn() + Send + Sync>;

struct QueueInner {
    store: QueueStore,
    operations: Vec<QueueOperation>,
}

impl std::fmt::Debug for QueueInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueInner")
            .field("store", &self.store)
            .field("operations", &self.operations.len())
            .finish()
    }
}

/// The offline sync queue.
///
/// Owns its storage handle, backend handle, and delivered-callback;
/// constructed once per process and passed by reference. All mutation goes
/// through [`enqueue`](Self::enqueue) and [`flush`](Self::flush), both of
/// which leave the persisted copy consistent with the in-memory copy before
/// returning.
pub struct SyncQueue {
    inner: Mutex<QueueInner>,
    backend: Arc<dyn Backend>,
    on_delivered: std::sync::Mutex<Option<DeliveredCallback>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue").finish_non_exhaustive()
    }
}

impl SyncQueue {
    /// Open the queue against a database file, reloading any operations a
    /// previous process left behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, backend: Arc<dyn Backend>) -> Result<Self> {
        Self::from_store(QueueStore::open(path)?, backend)
    }

    /// Create a queue over an in-memory store, for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(backend: Arc<dyn Backend>) -> Result<Self> {
        Self::from_store(QueueStore::open_in_memory()?, backend)
    }

    fn from_store(store: QueueStore, backend: Arc<dyn Backend>) -> Result<Self> {
        let operations = store.load()?;
        if !operations.is_empty() {
            info!("Reloaded {} queued operations", operations.len());
        }

        Ok(Self {
            inner: Mutex::new(QueueInner { store, operations }),
            backend,
            on_delivered: std::sync::Mutex::new(None),
            sequence: AtomicU64::new(0),
        })
    }

    /// Register the callback invoked after a flush that delivered at least
    /// one operation, so dependent views can refresh.
    pub fn set_on_delivered(&self, callback: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut guard) = self.on_delivered.lock() {
            *guard = Some(Box::new(callback));
        }
    }

    /// Append an operation and persist the queue.
    ///
    /// Never fails from the caller's perspective: a storage failure is
    /// logged and the operation is retained in memory, trading durability
    /// across restarts for not losing the submission now.
    pub async fn enqueue(&self, kind: OperationKind, payload: serde_json::Value) -> String {
        let enqueued_at = Utc::now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let payload_text = payload.to_string();

        let idempotency_key = content_hash(&[
            kind.as_str().as_bytes(),
            payload_text.as_bytes(),
            enqueued_at.to_rfc3339().as_bytes(),
        ]);
        let id = content_hash(&[
            idempotency_key.as_bytes(),
            &sequence.to_le_bytes(),
        ]);

        let op = QueueOperation {
            id: id.clone(),
            kind,
            payload,
            enqueued_at,
            retries: 0,
            idempotency_key,
        };

        let mut inner = self.inner.lock().await;
        if let Err(e) = inner.store.append(&op) {
            warn!("Failed to persist queued operation {id}: {e}");
        }
        inner.operations.push(op);
        info!("Queued {kind} operation {id}");
        id
    }

    /// Number of operations waiting for delivery.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.operations.len()
    }

    /// Whether the queue has nothing to deliver.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.operations.is_empty()
    }

    /// Snapshot of the queued operations, in delivery order.
    pub async fn pending(&self) -> Vec<QueueOperation> {
        self.inner.lock().await.operations.clone()
    }

    /// Attempt delivery of every queued operation, in enqueue order.
    ///
    /// A failing connectivity probe makes the whole call a no-op. Each
    /// operation's outcome is isolated: success removes it, failure
    /// increments its retry count and keeps it for the next pass. The
    /// delivered-callback fires only when at least one operation succeeded
    /// this pass.
    pub async fn flush(&self) -> FlushOutcome {
        if let Err(e) = self.backend.probe().await {
            debug!("Skipping flush, backend unreachable: {e}");
            return FlushOutcome::SkippedOffline;
        }

        let mut inner = self.inner.lock().await;
        let operations = std::mem::take(&mut inner.operations);
        if operations.is_empty() {
            return FlushOutcome::Flushed(FlushReport::default());
        }

        let mut report = FlushReport::default();
        let mut kept = Vec::new();

        for mut op in operations {
            report.attempted += 1;
            match self.deliver(&op).await {
                Ok(()) => {
                    report.delivered += 1;
                    debug!("Delivered {} operation {}", op.kind, op.id);
                    if let Err(e) = inner.store.remove(&op.id) {
                        warn!("Failed to remove delivered operation {}: {e}", op.id);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    op.retries += 1;
                    warn!(
                        "Operation {} failed (attempt {}): {e}",
                        op.id, op.retries
                    );
                    if let Err(e) = inner.store.set_retries(&op.id, op.retries) {
                        warn!("Failed to persist retry count for {}: {e}", op.id);
                    }
                    kept.push(op);
                }
            }
        }

        inner.operations = kept;
        drop(inner);

        if report.delivered > 0 {
            info!(
                "Flush delivered {}/{} operations",
                report.delivered, report.attempted
            );
            if let Ok(guard) = self.on_delivered.lock() {
                if let Some(callback) = guard.as_ref() {
                    callback();
                }
            }
        }

        FlushOutcome::Flushed(report)
    }

    /// Dispatch one operation to the handler matching its kind.
    async fn deliver(&self, op: &QueueOperation) -> Result<()> {
        match op.kind {
            OperationKind::SubmitAssessment => {
                let payload: SubmitAssessmentPayload =
                    serde_json::from_value(op.payload.clone())?;
                let record = self
                    .backend
                    .submit_risk_assessment(&payload.org_id, &payload.user_id, &payload.assessment)
                    .await?;
                self.backend
                    .create_tracked_flight(
                        &payload.org_id,
                        &record.id,
                        &payload.assessment,
                        payload.requires_approval,
                    )
                    .await?;
            }
            OperationKind::FlightStatusUpdate => {
                let payload: FlightStatusPayload = serde_json::from_value(op.payload.clone())?;
                self.backend
                    .update_flight_status(&payload.flight_id, payload.status)
                    .await?;
            }
            OperationKind::SubmitHazardReport => {
                let payload: HazardReportPayload = serde_json::from_value(op.payload.clone())?;
                self.backend.submit_hazard_report(&payload.report).await?;
            }
        }
        Ok(())
    }
}

/// Start the periodic flush loop.
///
/// Every tick flushes when the queue is non-empty and connectivity is
/// currently reported; a became-online edge on the connectivity signal
/// triggers an immediate flush. The stop request takes effect before the
/// next cycle.
pub fn spawn_flush_loop(
    queue: Arc<SyncQueue>,
    connectivity: Arc<dyn ConnectivitySignal>,
    interval: std::time::Duration,
) -> (StopHandle, JoinHandle<()>) {
    let handle = StopHandle::new();
    let loop_handle = handle.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut changes = connectivity.watch();
        let mut changes_alive = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if loop_handle.should_stop() {
                        debug!("Flush loop stopping");
                        break;
                    }
                    if connectivity.is_online() && !queue.is_empty().await {
                        queue.flush().await;
                    }
                }
                changed = changes.changed(), if changes_alive => {
                    match changed {
                        Ok(()) => {
                            if loop_handle.should_stop() {
                                debug!("Flush loop stopping");
                                break;
                            }
                            if *changes.borrow_and_update() {
                                debug!("Connectivity restored, flushing immediately");
                                queue.flush().await;
                            }
                        }
                        Err(_) => changes_alive = false,
                    }
                }
            }
        }
    });

    (handle, task)
}

/// Hex BLAKE3 hash over the given byte chunks, truncated to 32 characters.
fn content_hash(chunks: &[&[u8]]) -> String {
    let mut hasher = blake3::Hasher::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AssessmentRecord;
    use crate::error::Error;
    use crate::tracking::Flight;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    /// Records delivered operations; individual flight ids can be set to
    /// fail, and the probe can be switched off.
    #[derive(Default)]
    struct StubBackend {
        reachable: AtomicBool,
        failing_flights: StdMutex<Vec<String>>,
        delivered: StdMutex<Vec<String>>,
        hazard_reports: StdMutex<Vec<HazardReport>>,
        assessments: StdMutex<Vec<String>>,
        status_counts: StdMutex<HashMap<String, usize>>,
    }

    impl StubBackend {
        fn reachable() -> Arc<Self> {
            let stub = Self::default();
            stub.reachable.store(true, Ordering::SeqCst);
            Arc::new(stub)
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn fail_flight(&self, flight_id: &str) {
            self.failing_flights
                .lock()
                .unwrap()
                .push(flight_id.to_string());
        }

        fn heal_flight(&self, flight_id: &str) {
            self.failing_flights
                .lock()
                .unwrap()
                .retain(|id| id != flight_id);
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Backend for StubBackend {
        async fn submit_risk_assessment(
            &self,
            _org_id: &str,
            _user_id: &str,
            assessment: &RiskAssessment,
        ) -> Result<AssessmentRecord> {
            self.assessments
                .lock()
                .unwrap()
                .push(assessment.tail_number.clone());
            Ok(AssessmentRecord {
                id: "frat-1".to_string(),
            })
        }

        async fn create_tracked_flight(
            &self,
            _org_id: &str,
            assessment_id: &str,
            assessment: &RiskAssessment,
            requires_approval: bool,
        ) -> Result<Flight> {
            self.delivered
                .lock()
                .unwrap()
                .push(format!("flight:{}", assessment.tail_number));
            Ok(Flight {
                id: "flt-1".to_string(),
                assessment_id: assessment_id.to_string(),
                pilot: assessment.pilot.clone(),
                tail_number: assessment.tail_number.clone(),
                departure_station: assessment.departure_station.clone(),
                destination_station: assessment.destination_station.clone(),
                etd: assessment.etd,
                eta: assessment.eta,
                status: if requires_approval {
                    FlightStatus::PendingApproval
                } else {
                    FlightStatus::Active
                },
                created_at: Utc::now(),
                arrived_at: None,
                departure_coords: None,
                destination_coords: None,
            })
        }

        async fn update_flight_status(
            &self,
            flight_id: &str,
            status: FlightStatus,
        ) -> Result<()> {
            if self
                .failing_flights
                .lock()
                .unwrap()
                .contains(&flight_id.to_string())
            {
                return Err(Error::backend("simulated write failure"));
            }
            self.delivered
                .lock()
                .unwrap()
                .push(format!("status:{flight_id}:{status}"));
            *self
                .status_counts
                .lock()
                .unwrap()
                .entry(flight_id.to_string())
                .or_insert(0) += 1;
            Ok(())
        }

        async fn approve_flight(&self, _flight_id: &str) -> Result<()> {
            Ok(())
        }

        async fn reject_flight(&self, _flight_id: &str) -> Result<()> {
            Ok(())
        }

        async fn approve_or_reject_assessment(
            &self,
            _assessment_id: &str,
            _approve: bool,
        ) -> Result<()> {
            Ok(())
        }

        async fn submit_hazard_report(&self, report: &HazardReport) -> Result<()> {
            self.hazard_reports.lock().unwrap().push(report.clone());
            Ok(())
        }

        async fn probe(&self) -> Result<()> {
            if self.reachable.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(Error::backend("probe failed"))
            }
        }
    }

    fn status_payload(flight_id: &str) -> serde_json::Value {
        json!({"flight_id": flight_id, "status": "ARRIVED"})
    }

    #[test]
    fn test_operation_kind_round_trip() {
        for kind in [
            OperationKind::SubmitAssessment,
            OperationKind::FlightStatusUpdate,
            OperationKind::SubmitHazardReport,
        ] {
            assert_eq!(OperationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::from_str("mystery"), None);
    }

    #[tokio::test]
    async fn test_enqueue_assigns_unique_ids_and_keys() {
        let queue = SyncQueue::open_in_memory(StubBackend::reachable()).unwrap();

        let id1 = queue
            .enqueue(OperationKind::FlightStatusUpdate, status_payload("flt-1"))
            .await;
        let id2 = queue
            .enqueue(OperationKind::FlightStatusUpdate, status_payload("flt-1"))
            .await;

        assert_ne!(id1, id2);
        let pending = queue.pending().await;
        assert_eq!(pending.len(), 2);
        assert!(!pending[0].idempotency_key.is_empty());
        assert_eq!(pending[0].retries, 0);
    }

    #[tokio::test]
    async fn test_flush_skipped_when_offline() {
        let backend = StubBackend::unreachable();
        let queue = SyncQueue::open_in_memory(Arc::clone(&backend) as Arc<dyn Backend>).unwrap();
        queue
            .enqueue(OperationKind::FlightStatusUpdate, status_payload("flt-1"))
            .await;

        assert_eq!(queue.flush().await, FlushOutcome::SkippedOffline);
        assert_eq!(queue.len().await, 1);
        assert!(backend.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_flush_delivers_in_fifo_order() {
        let backend = StubBackend::reachable();
        let queue = SyncQueue::open_in_memory(Arc::clone(&backend) as Arc<dyn Backend>).unwrap();

        for flight in ["flt-1", "flt-2", "flt-3"] {
            queue
                .enqueue(OperationKind::FlightStatusUpdate, status_payload(flight))
                .await;
        }

        let FlushOutcome::Flushed(report) = queue.flush().await else {
            panic!("expected a flush");
        };
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 0);
        assert!(queue.is_empty().await);
        assert_eq!(
            backend.delivered(),
            vec![
                "status:flt-1:ARRIVED",
                "status:flt-2:ARRIVED",
                "status:flt-3:ARRIVED"
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_operation_kept_and_retried() {
        let backend = StubBackend::reachable();
        backend.fail_flight("flt-2");
        let queue = SyncQueue::open_in_memory(Arc::clone(&backend) as Arc<dyn Backend>).unwrap();

        for flight in ["flt-1", "flt-2", "flt-3"] {
            queue
                .enqueue(OperationKind::FlightStatusUpdate, status_payload(flight))
                .await;
        }

        // One failure does not abort the batch
        let FlushOutcome::Flushed(report) = queue.flush().await else {
            panic!("expected a flush");
        };
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.pending().await[0].retries, 1);

        // Backend heals: the kept operation delivers, nothing is re-sent
        backend.heal_flight("flt-2");
        let FlushOutcome::Flushed(report) = queue.flush().await else {
            panic!("expected a flush");
        };
        assert_eq!(report.delivered, 1);
        assert!(queue.is_empty().await);

        let counts = backend.status_counts.lock().unwrap();
        assert_eq!(counts["flt-1"], 1);
        assert_eq!(counts["flt-2"], 1);
        assert_eq!(counts["flt-3"], 1);
    }

    #[tokio::test]
    async fn test_queue_survives_restart() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("preflight_queue_test_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&db_path);

        let backend = StubBackend::reachable();
        {
            let queue =
                SyncQueue::open(&db_path, Arc::clone(&backend) as Arc<dyn Backend>).unwrap();
            queue
                .enqueue(OperationKind::FlightStatusUpdate, status_payload("flt-1"))
                .await;
            queue
                .enqueue(OperationKind::FlightStatusUpdate, status_payload("flt-2"))
                .await;
        }

        // "Restart": a fresh queue over the same file
        let queue = SyncQueue::open(&db_path, Arc::clone(&backend) as Arc<dyn Backend>).unwrap();
        assert_eq!(queue.len().await, 2);

        let FlushOutcome::Flushed(report) = queue.flush().await else {
            panic!("expected a flush");
        };
        assert_eq!(report.delivered, 2);
        assert!(queue.is_empty().await);
        assert_eq!(backend.delivered().len(), 2);

        drop(queue);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[tokio::test]
    async fn test_callback_only_after_a_delivery() {
        let backend = StubBackend::reachable();
        backend.fail_flight("flt-1");
        let queue = SyncQueue::open_in_memory(Arc::clone(&backend) as Arc<dyn Backend>).unwrap();

        let notified = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&notified);
        queue.set_on_delivered(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        queue
            .enqueue(OperationKind::FlightStatusUpdate, status_payload("flt-1"))
            .await;

        // Everything failed: no notification
        queue.flush().await;
        assert_eq!(notified.load(Ordering::SeqCst), 0);

        backend.heal_flight("flt-1");
        queue.flush().await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        // Empty queue: flush runs but delivers nothing, no notification
        queue.flush().await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hazard_report_delivery() {
        let backend = StubBackend::reachable();
        let queue = SyncQueue::open_in_memory(Arc::clone(&backend) as Arc<dyn Backend>).unwrap();

        let report = HazardReport {
            reporter: "A. Earhart".to_string(),
            flight_id: None,
            location: "KSFF ramp".to_string(),
            description: "Fuel spill near pump 2".to_string(),
            severity: 3,
            occurred_at: Utc::now(),
        };
        let payload = serde_json::to_value(HazardReportPayload { report }).unwrap();
        queue.enqueue(OperationKind::SubmitHazardReport, payload).await;

        queue.flush().await;
        assert!(queue.is_empty().await);
        assert_eq!(backend.hazard_reports.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_kept_for_retry() {
        let backend = StubBackend::reachable();
        let queue = SyncQueue::open_in_memory(Arc::clone(&backend) as Arc<dyn Backend>).unwrap();

        queue
            .enqueue(OperationKind::FlightStatusUpdate, json!({"wrong": "shape"}))
            .await;

        let FlushOutcome::Flushed(report) = queue.flush().await else {
            panic!("expected a flush");
        };
        assert_eq!(report.failed, 1);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_flush_loop_flushes_on_online_edge() {
        let backend = StubBackend::reachable();
        let queue = Arc::new(
            SyncQueue::open_in_memory(Arc::clone(&backend) as Arc<dyn Backend>).unwrap(),
        );
        queue
            .enqueue(OperationKind::FlightStatusUpdate, status_payload("flt-1"))
            .await;

        let signal = Arc::new(crate::backend::PollingConnectivity::new());
        // Long interval: only the online edge can plausibly trigger the flush
        let (handle, task) = spawn_flush_loop(
            Arc::clone(&queue),
            Arc::clone(&signal) as Arc<dyn ConnectivitySignal>,
            std::time::Duration::from_secs(3600),
        );

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        signal.set_online(true);

        // Wait for the edge-triggered flush to drain the queue
        let mut drained = false;
        for _ in 0..100 {
            if queue.is_empty().await {
                drained = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(drained, "online edge did not trigger a flush");

        handle.stop();
        task.abort();
        let _ = task.await;
    }
}
