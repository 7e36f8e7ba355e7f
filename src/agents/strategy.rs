//! Strategy Controller - priority cascade over the node's competing signals
//!
//! Inputs are the battery level, the uncertainty and level of the most
//! recent risk assessment, and the connectivity status. The cascade is
//! evaluated top to bottom and the first match decides:
//!
//! 1. battery < 20%          → CRITICAL_POWER
//! 2. uncertainty > 0.7      → HIGH_UNCERTAINTY
//! 3. risk == HIGH           → HIGH_RISK
//! 4. connectivity OFFLINE   → OFFLINE_CONSERVATIVE
//! 5. otherwise              → ONLINE_BALANCED
//!
//! A new `Strategy` is published only when it differs structurally from the
//! current one, or when the periodic resource check forces it. Each publish
//! carries a generation assigned under the controller lock, so subscribers
//! can discard a revision that reaches them after a newer one.

use arc_swap::ArcSwap;
use chrono::Utc;
use std::sync::{Arc, Mutex, Weak};
use tracing::{info, warn};

use super::lock_state;
use crate::bus::{BusMessage, Dispatcher, Topic};
use crate::config::{ResourceConfig, StrategyConfig};
use crate::resources::{ResourceError, ResourceProbe};
use crate::types::{
    ConnectivityState, ResourceKind, ResourceReport, ResourceWarning, RiskAssessment, RiskLevel,
    Strategy, StrategyMode, StrategyRevision,
};
use crate::DECISION_LOG_TARGET;

/// The four signals the cascade reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyInputs {
    pub battery_percent: f64,
    pub uncertainty: f64,
    pub risk: RiskLevel,
    pub connectivity: ConnectivityState,
}

impl Default for StrategyInputs {
    fn default() -> Self {
        Self {
            battery_percent: 100.0,
            uncertainty: 0.0,
            risk: RiskLevel::Unknown,
            connectivity: ConnectivityState::Offline,
        }
    }
}

/// Evaluate the cascade. Returns the winning mode and a human-readable reason.
pub fn select_mode(inputs: &StrategyInputs, config: &StrategyConfig) -> (StrategyMode, String) {
    if inputs.battery_percent < config.critical_battery_percent {
        (
            StrategyMode::CriticalPower,
            format!("Battery critical (<{:.0}%)", config.critical_battery_percent),
        )
    } else if inputs.uncertainty > config.uncertainty_ceiling {
        (
            StrategyMode::HighUncertainty,
            format!(
                "Uncertainty too high ({:.2}), prioritizing stability",
                inputs.uncertainty
            ),
        )
    } else if inputs.risk == RiskLevel::High {
        (
            StrategyMode::HighRisk,
            format!("Confirmed high risk (uncertainty: {:.2})", inputs.uncertainty),
        )
    } else if inputs.connectivity == ConnectivityState::Offline {
        (
            StrategyMode::OfflineConservative,
            "Network offline, conserving resources".to_string(),
        )
    } else {
        (
            StrategyMode::OnlineBalanced,
            "Network online, balanced mode".to_string(),
        )
    }
}

fn rate_action(from_fps: u32, to_fps: u32) -> &'static str {
    use std::cmp::Ordering;
    match to_fps.cmp(&from_fps) {
        Ordering::Greater => "increase_inference_rate",
        Ordering::Less => "decrease_inference_rate",
        Ordering::Equal => "maintain_inference_rate",
    }
}

struct ControllerState {
    inputs: StrategyInputs,
    current: Strategy,
    mode: StrategyMode,
    /// Last generation handed out; 0 until the first publish
    generation: u64,
}

pub struct StrategyController {
    config: StrategyConfig,
    low_storage_percent: f64,
    state: Mutex<ControllerState>,
    /// Lock-free view of the current strategy for the producer loops
    shared: Arc<ArcSwap<Strategy>>,
    bus: Arc<Dispatcher>,
}

impl StrategyController {
    pub fn new(config: StrategyConfig, resources: &ResourceConfig, bus: Arc<Dispatcher>) -> Self {
        let inputs = StrategyInputs {
            battery_percent: resources
                .battery_percent_override
                .unwrap_or(resources.fallback_battery_percent),
            ..StrategyInputs::default()
        };
        let (mode, reason) = select_mode(&inputs, &config);
        let current = mode.strategy();
        info!(mode = %mode, reason = %reason, "Initial strategy");

        Self {
            config,
            low_storage_percent: resources.low_storage_percent,
            state: Mutex::new(ControllerState {
                inputs,
                current,
                mode,
                generation: 0,
            }),
            shared: Arc::new(ArcSwap::from_pointee(current)),
            bus,
        }
    }

    pub fn attach(self: &Arc<Self>, bus: &Dispatcher) {
        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::ConnectivityChanged, "strategy_controller", move |msg| {
            if let (Some(me), BusMessage::ConnectivityChanged(status)) = (me.upgrade(), msg) {
                me.on_connectivity_changed(*status);
            }
            Ok(())
        });

        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::RiskAssessment, "strategy_controller", move |msg| {
            if let (Some(me), BusMessage::RiskAssessment(assessment)) = (me.upgrade(), msg) {
                me.on_risk_assessment(assessment);
            }
            Ok(())
        });
    }

    pub fn current(&self) -> Strategy {
        lock_state(&self.state, "strategy").current
    }

    pub fn generation(&self) -> u64 {
        lock_state(&self.state, "strategy").generation
    }

    pub fn current_mode(&self) -> StrategyMode {
        lock_state(&self.state, "strategy").mode
    }

    pub fn inputs(&self) -> StrategyInputs {
        lock_state(&self.state, "strategy").inputs
    }

    /// Handle for readers that must not take the controller lock.
    pub fn shared_strategy(&self) -> Arc<ArcSwap<Strategy>> {
        Arc::clone(&self.shared)
    }

    /// Record a battery reading. Takes effect on the next evaluation.
    pub fn set_battery_level(&self, percent: f64) {
        lock_state(&self.state, "strategy").inputs.battery_percent = percent;
    }

    pub fn on_connectivity_changed(&self, status: ConnectivityState) -> Option<Strategy> {
        lock_state(&self.state, "strategy").inputs.connectivity = status;
        self.reevaluate(false)
    }

    pub fn on_risk_assessment(&self, assessment: &RiskAssessment) -> Option<Strategy> {
        {
            let mut state = lock_state(&self.state, "strategy");
            state.inputs.risk = assessment.risk_level;
            state.inputs.uncertainty = assessment.uncertainty;
        }
        self.reevaluate(false)
    }

    /// Re-run the cascade. Publishes and returns the strategy when it
    /// changed or when `force` is set.
    pub fn reevaluate(&self, force: bool) -> Option<Strategy> {
        let (revision, mode) = {
            let mut state = lock_state(&self.state, "strategy");
            let (mode, reason) = select_mode(&state.inputs, &self.config);
            let next = mode.strategy();
            let changed = next != state.current;
            if !changed && !force {
                return None;
            }

            if changed {
                info!(
                    target: DECISION_LOG_TARGET,
                    kind = "strategy_delta",
                    action = rate_action(state.current.frame_rate, next.frame_rate),
                    from_fps = state.current.frame_rate,
                    to_fps = next.frame_rate,
                    reason = %reason,
                    "strategy changed"
                );
            }
            state.current = next;
            state.mode = mode;
            state.generation += 1;
            self.shared.store(Arc::new(next));
            let revision = StrategyRevision {
                generation: state.generation,
                strategy: next,
            };
            (revision, mode)
        };

        let strategy = revision.strategy;
        info!(
            mode = %mode,
            generation = revision.generation,
            frame_rate = strategy.frame_rate,
            model_tier = %strategy.model_tier,
            confirmation_frames = strategy.confirmation_frames,
            storage_policy = %strategy.storage_policy,
            "Strategy update"
        );
        self.bus.publish(BusMessage::StrategyUpdate(revision));
        Some(strategy)
    }

    /// Periodic resource check: refresh battery, force a re-evaluation and
    /// warn when free storage runs low.
    pub fn check_resources(&self, probe: &dyn ResourceProbe) -> Result<ResourceReport, ResourceError> {
        if let Some(battery) = probe.battery_percent() {
            self.set_battery_level(battery);
        }
        self.reevaluate(true);

        let battery_percent = self.inputs().battery_percent;
        let storage_free_percent = probe.storage_free_percent()?;
        info!(
            storage_free_percent = (storage_free_percent * 10.0).round() / 10.0,
            battery_percent,
            "Resource check"
        );

        if storage_free_percent < self.low_storage_percent {
            warn!(
                storage_free_percent,
                threshold = self.low_storage_percent,
                "Free storage below threshold"
            );
            self.bus.publish(BusMessage::ResourceWarning(ResourceWarning {
                kind: ResourceKind::Storage,
                level: "critical".to_string(),
                value_percent: storage_free_percent,
                timestamp: Utc::now(),
            }));
        }

        Ok(ResourceReport {
            storage_free_percent,
            battery_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::TrackConfirmer;
    use crate::config::TrackingConfig;
    use crate::resources::FixedResources;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn controller() -> (StrategyController, Arc<Dispatcher>) {
        let bus = Arc::new(Dispatcher::new());
        let c = StrategyController::new(
            StrategyConfig::default(),
            &ResourceConfig::default(),
            Arc::clone(&bus),
        );
        (c, bus)
    }

    fn assessment(level: RiskLevel, uncertainty: f64) -> RiskAssessment {
        RiskAssessment {
            event_id: "EVT_test".to_string(),
            risk_level: level,
            reason: "test".to_string(),
            uncertainty,
        }
    }

    #[test]
    fn initial_strategy_is_offline_conservative() {
        let (c, _) = controller();
        assert_eq!(c.current_mode(), StrategyMode::OfflineConservative);
        assert_eq!(c.current(), StrategyMode::OfflineConservative.strategy());
        assert_eq!(**c.shared_strategy().load(), c.current());
    }

    #[test]
    fn low_battery_overrides_everything() {
        let config = StrategyConfig::default();
        for risk in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Unknown] {
            for connectivity in [
                ConnectivityState::Online,
                ConnectivityState::Intermittent,
                ConnectivityState::Offline,
            ] {
                for uncertainty in [0.0, 0.5, 0.9, 1.0] {
                    let inputs = StrategyInputs {
                        battery_percent: 19.9,
                        uncertainty,
                        risk,
                        connectivity,
                    };
                    let (mode, _) = select_mode(&inputs, &config);
                    assert_eq!(mode.strategy().frame_rate, 1);
                }
            }
        }
    }

    #[test]
    fn uncertainty_outranks_high_risk() {
        let inputs = StrategyInputs {
            uncertainty: 0.71,
            risk: RiskLevel::High,
            ..StrategyInputs::default()
        };
        let (mode, _) = select_mode(&inputs, &StrategyConfig::default());
        assert_eq!(mode, StrategyMode::HighUncertainty);
    }

    #[test]
    fn unchanged_strategy_is_not_republished() {
        let (c, bus) = controller();
        let count = Arc::new(Mutex::new(0));
        let n = Arc::clone(&count);
        bus.subscribe(Topic::StrategyUpdate, "count", move |_| {
            *n.lock().unwrap() += 1;
            Ok(())
        });

        assert!(c.on_connectivity_changed(ConnectivityState::Offline).is_none());
        assert!(c.on_connectivity_changed(ConnectivityState::Online).is_some());
        assert!(c.on_connectivity_changed(ConnectivityState::Intermittent).is_none());
        assert_eq!(*count.lock().unwrap(), 1);

        assert!(c.reevaluate(true).is_some());
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn high_risk_escalates_and_battery_check_overrides() {
        let (c, _) = controller();
        let s = c.on_risk_assessment(&assessment(RiskLevel::High, 0.1)).unwrap();
        assert_eq!(s, StrategyMode::HighRisk.strategy());

        c.set_battery_level(15.0);
        let probe = FixedResources {
            storage_free_percent: 50.0,
            battery_percent: None,
        };
        let report = c.check_resources(&probe).unwrap();
        assert_eq!(report.battery_percent, 15.0);
        assert_eq!(c.current(), StrategyMode::CriticalPower.strategy());
    }

    #[test]
    fn low_storage_publishes_warning() {
        let (c, bus) = controller();
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let w = Arc::clone(&warnings);
        bus.subscribe(Topic::ResourceWarning, "test", move |msg| {
            if let BusMessage::ResourceWarning(warning) = msg {
                w.lock().unwrap().push(warning.clone());
            }
            Ok(())
        });

        let probe = FixedResources {
            storage_free_percent: 4.0,
            battery_percent: Some(80.0),
        };
        c.check_resources(&probe).unwrap();
        let warnings = warnings.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, ResourceKind::Storage);
        assert_eq!(warnings[0].level, "critical");
    }

    #[test]
    fn interleaved_reevaluations_leave_confirmer_on_latest() {
        let bus = Arc::new(Dispatcher::new());
        let controller = Arc::new(StrategyController::new(
            StrategyConfig::default(),
            &ResourceConfig::default(),
            Arc::clone(&bus),
        ));

        // a battery reading lands while the HIGH_RISK revision is mid-delivery
        let weak = Arc::downgrade(&controller);
        let fired = Arc::new(AtomicBool::new(false));
        let once = Arc::clone(&fired);
        bus.subscribe(Topic::StrategyUpdate, "battery_monitor", move |_| {
            if !once.swap(true, Ordering::SeqCst) {
                if let Some(c) = weak.upgrade() {
                    c.set_battery_level(10.0);
                    c.reevaluate(false);
                }
            }
            Ok(())
        });
        let confirmer = Arc::new(TrackConfirmer::new(TrackingConfig::default(), Arc::clone(&bus)));
        confirmer.attach(&bus);

        controller.on_risk_assessment(&assessment(RiskLevel::High, 0.1));

        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(controller.current_mode(), StrategyMode::CriticalPower);
        assert_eq!(controller.generation(), 2);
        assert_eq!(confirmer.confirmation_frames(), controller.current().confirmation_frames);
    }

    #[test]
    fn rate_action_direction() {
        assert_eq!(rate_action(5, 30), "increase_inference_rate");
        assert_eq!(rate_action(30, 1), "decrease_inference_rate");
        assert_eq!(rate_action(5, 5), "maintain_inference_rate");
    }
}
