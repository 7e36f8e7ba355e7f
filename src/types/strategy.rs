//! Operating strategy and resource types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Perception model size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Tiny,
    Medium,
    Large,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Tiny => write!(f, "tiny"),
            ModelTier::Medium => write!(f, "medium"),
            ModelTier::Large => write!(f, "large"),
        }
    }
}

/// What the node keeps on local storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StoragePolicy {
    All,
    EventsOnly,
    CriticalOnly,
}

impl std::fmt::Display for StoragePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoragePolicy::All => write!(f, "all"),
            StoragePolicy::EventsOnly => write!(f, "events_only"),
            StoragePolicy::CriticalOnly => write!(f, "critical_only"),
        }
    }
}

/// Node operating parameters.
///
/// Immutable value: the controller swaps in a whole new `Strategy`, and two
/// strategies with equal fields are the same strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Strategy {
    pub frame_rate: u32,
    pub model_tier: ModelTier,
    pub confirmation_frames: usize,
    pub storage_policy: StoragePolicy,
}

impl Strategy {
    /// Seconds between inference ticks at this frame rate.
    pub fn frame_interval_secs(&self) -> f64 {
        1.0 / f64::from(self.frame_rate.max(1))
    }
}

/// A published strategy stamped with the controller's publish sequence.
///
/// Deliveries of two revisions can interleave on the bus; consumers keep the
/// one with the higher `generation`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategyRevision {
    pub generation: u64,
    pub strategy: Strategy,
}

/// Cascade branch that produced a strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyMode {
    CriticalPower,
    HighUncertainty,
    HighRisk,
    OfflineConservative,
    OnlineBalanced,
}

impl StrategyMode {
    /// The fixed operating parameters of each mode.
    pub fn strategy(self) -> Strategy {
        match self {
            StrategyMode::CriticalPower => Strategy {
                frame_rate: 1,
                model_tier: ModelTier::Tiny,
                confirmation_frames: 6,
                storage_policy: StoragePolicy::CriticalOnly,
            },
            StrategyMode::HighUncertainty => Strategy {
                frame_rate: 5,
                model_tier: ModelTier::Medium,
                confirmation_frames: 6,
                storage_policy: StoragePolicy::EventsOnly,
            },
            StrategyMode::HighRisk => Strategy {
                frame_rate: 30,
                model_tier: ModelTier::Large,
                confirmation_frames: 2,
                storage_policy: StoragePolicy::All,
            },
            StrategyMode::OfflineConservative => Strategy {
                frame_rate: 5,
                model_tier: ModelTier::Medium,
                confirmation_frames: 5,
                storage_policy: StoragePolicy::EventsOnly,
            },
            StrategyMode::OnlineBalanced => Strategy {
                frame_rate: 15,
                model_tier: ModelTier::Medium,
                confirmation_frames: 4,
                storage_policy: StoragePolicy::EventsOnly,
            },
        }
    }
}

impl std::fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyMode::CriticalPower => write!(f, "CRITICAL_POWER"),
            StrategyMode::HighUncertainty => write!(f, "HIGH_UNCERTAINTY"),
            StrategyMode::HighRisk => write!(f, "HIGH_RISK"),
            StrategyMode::OfflineConservative => write!(f, "OFFLINE_CONSERVATIVE"),
            StrategyMode::OnlineBalanced => write!(f, "ONLINE_BALANCED"),
        }
    }
}

/// Result of a periodic resource check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResourceReport {
    pub storage_free_percent: f64,
    pub battery_percent: f64,
}

/// Which resource is running out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Storage,
}

/// Published when a resource drops below its floor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceWarning {
    pub kind: ResourceKind,
    /// Always "critical" today; kept as text for forward compatibility
    pub level: String,
    pub value_percent: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_map_to_distinct_strategies() {
        let modes = [
            StrategyMode::CriticalPower,
            StrategyMode::HighUncertainty,
            StrategyMode::HighRisk,
            StrategyMode::OfflineConservative,
            StrategyMode::OnlineBalanced,
        ];
        for (i, a) in modes.iter().enumerate() {
            for b in &modes[i + 1..] {
                assert_ne!(a.strategy(), b.strategy(), "{a} and {b} collide");
            }
        }
    }

    #[test]
    fn frame_interval_never_divides_by_zero() {
        let mut s = StrategyMode::OnlineBalanced.strategy();
        s.frame_rate = 0;
        assert_eq!(s.frame_interval_secs(), 1.0);
    }
}
