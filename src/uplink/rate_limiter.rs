//! Priority-aware minimum-gap rate limiter for the uplink

use std::time::{Duration, Instant};

/// Uplink priority class. Each class has its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPriority {
    /// HIGH-risk events on an intermittent link
    High,
    /// Everything forwarded on an online link
    Standard,
}

impl std::fmt::Display for SyncPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPriority::High => write!(f, "HIGH"),
            SyncPriority::Standard => write!(f, "STANDARD"),
        }
    }
}

/// Negative and NaN gaps collapse to zero, oversized ones saturate.
pub(crate) fn gap_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Two independent last-forward timestamps.
///
/// A check that succeeds advances its own timestamp in the same call, so the
/// caller must hold this behind whatever lock guards the admission decision.
#[derive(Debug, Clone)]
pub struct UplinkRateLimiter {
    high_gap: Duration,
    standard_gap: Duration,
    last_high: Option<Instant>,
    last_standard: Option<Instant>,
}

impl UplinkRateLimiter {
    pub fn new(high_gap_secs: f64, standard_gap_secs: f64) -> Self {
        Self {
            high_gap: gap_from_secs(high_gap_secs),
            standard_gap: gap_from_secs(standard_gap_secs),
            last_high: None,
            last_standard: None,
        }
    }

    pub fn min_gap(&self, priority: SyncPriority) -> Duration {
        match priority {
            SyncPriority::High => self.high_gap,
            SyncPriority::Standard => self.standard_gap,
        }
    }

    /// Allowed when the class was never used or strictly more than its gap
    /// has elapsed since its last forward.
    pub fn try_acquire_at(&mut self, priority: SyncPriority, now: Instant) -> bool {
        let gap = self.min_gap(priority);
        let last = match priority {
            SyncPriority::High => &mut self.last_high,
            SyncPriority::Standard => &mut self.last_standard,
        };
        let allowed = match *last {
            None => true,
            Some(at) => now.saturating_duration_since(at) > gap,
        };
        if allowed {
            *last = Some(now);
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_is_allowed() {
        let mut limiter = UplinkRateLimiter::new(2.0, 0.5);
        let now = Instant::now();
        assert!(limiter.try_acquire_at(SyncPriority::High, now));
        assert!(limiter.try_acquire_at(SyncPriority::Standard, now));
    }

    #[test]
    fn enforces_strict_gap() {
        let mut limiter = UplinkRateLimiter::new(2.0, 0.5);
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(SyncPriority::High, t0));
        assert!(!limiter.try_acquire_at(SyncPriority::High, t0 + Duration::from_millis(1_999)));
        assert!(!limiter.try_acquire_at(SyncPriority::High, t0 + Duration::from_secs(2)));
        assert!(limiter.try_acquire_at(SyncPriority::High, t0 + Duration::from_millis(2_001)));
    }

    #[test]
    fn rejected_check_does_not_advance_timestamp() {
        let mut limiter = UplinkRateLimiter::new(2.0, 0.5);
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(SyncPriority::Standard, t0));
        assert!(!limiter.try_acquire_at(SyncPriority::Standard, t0 + Duration::from_millis(400)));
        assert!(limiter.try_acquire_at(SyncPriority::Standard, t0 + Duration::from_millis(600)));
    }

    #[test]
    fn infinite_gap_allows_only_the_first_forward() {
        let mut limiter = UplinkRateLimiter::new(f64::INFINITY, f64::NAN);
        let t0 = Instant::now();
        assert_eq!(limiter.min_gap(SyncPriority::High), Duration::MAX);
        assert_eq!(limiter.min_gap(SyncPriority::Standard), Duration::ZERO);
        assert!(limiter.try_acquire_at(SyncPriority::High, t0));
        assert!(!limiter.try_acquire_at(SyncPriority::High, t0 + Duration::from_secs(86_400)));
    }

    #[test]
    fn classes_are_independent() {
        let mut limiter = UplinkRateLimiter::new(2.0, 0.5);
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(SyncPriority::High, t0));
        assert!(limiter.try_acquire_at(SyncPriority::Standard, t0));
    }
}
