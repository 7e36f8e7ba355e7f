//! Node pipeline
//!
//! ```text
//! detection loop ──► Detection ──► TrackConfirmer ──► ConfirmedEvent
//!                                                         │
//!                                                  RiskClassifier
//!                                                   │          │
//!                                       RiskAssessment    RiskScoredEvent
//!                                        │        │              │
//!                               AlertNotifier  StrategyController  SyncAdmissionController
//!                                                 │   ▲                  ▲
//!                            StrategyUpdate ◄─────┘   │                  │
//! connectivity loop ──► ConnectivityChanged ──────────┴──────────────────┘
//! maintenance loop  ──► resource check, deferred re-drive, evidence retention
//! ```
//!
//! Every agent runs inside the publishing producer's task. The loops only
//! own pacing and shutdown.

mod coordinator;
mod loops;

pub use coordinator::NodeCoordinator;
pub use loops::{run_connectivity_loop, run_detection_loop, run_maintenance_loop, TaskName};
