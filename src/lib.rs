//! `preflight` - Flight risk decision and offline-resilient tracking engine
//!
//! This library is the decision and synchronization core of a flight
//! compliance application. It converts raw weather into structured risk
//! flags, computes a deterministic composite risk score and classification
//! for a proposed flight, tracks active flights against their filed plans to
//! detect overdue arrivals, and guarantees that safety-critical submissions
//! eventually reach the backend even when connectivity is intermittent.
//!
//! The surrounding application supplies the [`backend::Backend`] and
//! (optionally) [`weather::WeatherProvider`] implementations; everything else
//! is owned here.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod assessment;
pub mod backend;
pub mod config;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod schedule;
pub mod scoring;
pub mod submission;
pub mod sync;
pub mod tasks;
pub mod tracking;
pub mod weather;

pub use assessment::{AssessmentStatus, HazardReport, RiskAssessment, RiskAssessmentInput};
pub use backend::{AssessmentRecord, Backend, ConnectivitySignal, PollingConnectivity};
pub use config::Config;
pub use debounce::Debouncer;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use schedule::ResolvedSchedule;
pub use scoring::{FactorSelection, RiskLevel, ScoreBreakdown};
pub use submission::{SubmissionService, SubmitOutcome};
pub use sync::{FlushOutcome, OperationKind, QueueOperation, SyncQueue};
pub use tracking::{Flight, FlightBoard, FlightSnapshot, FlightStatus};
pub use weather::{WeatherAnalysis, WeatherBundle, WeatherProvider};
