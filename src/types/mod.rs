//! Shared data structures for the onboard decision core
//!
//! - Detection / Observation: perception model output, one per inference tick
//! - Event: confirmed, risk-scored record handed to storage and the uplink
//! - RiskAssessment / Alert: lightweight summaries for crew-facing consumers
//! - ConnectivityState: hysteresis-classified uplink quality
//! - Strategy: operating parameters derived by the strategy controller
//! - SyncDecision: uplink admission outcome

mod connectivity;
mod detection;
mod event;
mod strategy;
mod sync;

pub use connectivity::*;
pub use detection::*;
pub use event::*;
pub use strategy::*;
pub use sync::*;
