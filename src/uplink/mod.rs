//! Bandwidth-constrained uplink
//!
//! - `UplinkRateLimiter`: independent HIGH / STANDARD minimum-gap budgets
//! - `SyncAdmissionController`: persist-then-decide gate for every event
//! - `Uplink`: transport contract, with a logging stand-in

pub mod admission;
pub mod rate_limiter;
pub mod transport;

pub use admission::SyncAdmissionController;
pub use rate_limiter::{SyncPriority, UplinkRateLimiter};
pub use transport::{LogUplink, Uplink, UplinkError};
