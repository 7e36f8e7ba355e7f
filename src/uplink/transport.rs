//! Uplink transport contract
//!
//! The admission controller only decides; the transport moves bytes. The
//! node ships with `LogUplink`, which records the forward in the log. A
//! modem or satellite driver implements the same trait.

use tracing::info;

use crate::types::Event;

#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    #[error("uplink unavailable: {0}")]
    Unavailable(String),
}

/// Forward one event off the node. Called synchronously from the publish
/// chain, so implementations should bound their own latency.
pub trait Uplink: Send + Sync {
    fn forward(&self, event: &Event) -> Result<(), UplinkError>;

    fn name(&self) -> &'static str;
}

/// Stand-in transport that logs each forward and always succeeds.
#[derive(Debug, Default)]
pub struct LogUplink;

impl Uplink for LogUplink {
    fn forward(&self, event: &Event) -> Result<(), UplinkError> {
        info!(
            event_id = %event.event_id,
            risk = %event.risk_level,
            category = %event.category,
            "Initiating uplink for event"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
