//! Detection and connectivity inputs
//!
//! The perception model and the modem are external collaborators. This
//! module fixes their output contracts and ships stand-ins:
//!
//! - `SimulatedDetector`: a coherent target drifting through the frame
//! - `SimulatedProbe`: a poor satellite link (30% success by default)
//! - `TcpProbe`: a real TCP connect against `host:port` with a timeout

pub mod probe;
pub mod simulated;

pub use probe::{SimulatedProbe, TcpProbe};
pub use simulated::SimulatedDetector;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Detection, Strategy};

/// Where detections come from.
///
/// The detection loop paces calls to `next_frame` from the current
/// strategy's frame rate and assigns frame ids itself.
#[async_trait]
pub trait DetectionSource: Send + 'static {
    /// Run inference on the next frame. Empty when nothing is in view.
    async fn next_frame(&mut self) -> Result<Vec<Detection>>;

    /// Adopt a new operating strategy (model tier, frame rate).
    fn apply_strategy(&mut self, strategy: &Strategy);

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// One boolean per tick: did the uplink answer?
#[async_trait]
pub trait ConnectivityProbe: Send + 'static {
    async fn probe(&mut self) -> bool;

    fn probe_name(&self) -> &str;
}
