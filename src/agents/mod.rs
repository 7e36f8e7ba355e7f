//! Reactive agents of the onboard decision core
//!
//! None of these agents owns a thread. Each runs synchronously inside the
//! publish call chain of whichever producer loop (detection or connectivity)
//! triggered it, so every agent keeps its mutable state behind its own lock
//! and releases that lock before publishing.
//!
//! - **Connectivity Classifier**: hysteresis over probe outcomes
//! - **Track Confirmer**: multi-frame confirmation of living targets
//! - **Risk Classifier**: geometry/motion heuristic with a confidence guardrail
//! - **Strategy Controller**: priority cascade over power, uncertainty, risk, link
//! - **Alert Notifier**: deduplicated crew-facing warnings

pub mod alert;
pub mod connectivity;
pub mod risk;
pub mod strategy;
pub mod track_confirmer;

pub use alert::AlertNotifier;
pub use connectivity::{ConnectivityClassifier, LinkHysteresis};
pub use risk::{RiskClassifier, RiskError};
pub use strategy::{select_mode, StrategyController, StrategyInputs};
pub use track_confirmer::TrackConfirmer;

use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Lock an agent's state, recovering from poisoning.
///
/// The dispatcher contains handler panics, so a poisoned lock only means a
/// previous handler died mid-update; the state is still the best we have.
pub(crate) fn lock_state<'a, T>(state: &'a Mutex<T>, agent: &str) -> MutexGuard<'a, T> {
    state.lock().unwrap_or_else(|e| {
        warn!(agent, "Agent state lock poisoned, recovering");
        e.into_inner()
    })
}
