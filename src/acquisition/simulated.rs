//! Simulated perception model
//!
//! Spawns one large marine-life target at a time (160 px wide box moving
//! (+2, +2) px per frame, 0.9 confidence) which stays in view for a fixed
//! number of frames. Coherent enough to pass track confirmation and close
//! enough to score HIGH risk. Every detection references the frame it was
//! read from so confirmed events carry evidence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Bernoulli, Distribution};
use tracing::info;

use super::DetectionSource;
use crate::config::DetectionConfig;
use crate::types::{BoundingBox, Detection, DetectionLabel, ModelTier, MotionVector, Strategy};

const SPAWN_BOX: BoundingBox = BoundingBox {
    x0: 100.0,
    y0: 100.0,
    x1: 260.0,
    y1: 260.0,
};
const TARGET_MOTION: MotionVector = MotionVector { dx: 2.0, dy: 2.0 };
const TARGET_CONFIDENCE: f64 = 0.9;
const FRAME_DIR: &str = "evidence/sim";

#[derive(Debug, Clone)]
struct SimTarget {
    bbox: BoundingBox,
    frames_left: u32,
}

pub struct SimulatedDetector {
    rng: StdRng,
    spawn: Bernoulli,
    target_life: u32,
    target: Option<SimTarget>,
    model_tier: ModelTier,
    frame_rate: u32,
    frames_read: u64,
}

impl SimulatedDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic detector for tests and replays.
    pub fn seeded(config: &DetectionConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &DetectionConfig, rng: StdRng) -> Result<Self> {
        let spawn = Bernoulli::new(config.simulated_spawn_probability)
            .context("detection.simulated_spawn_probability must be within [0, 1]")?;
        info!(frame_rate = config.initial_frame_rate, "Simulated vision model loaded");
        Ok(Self {
            rng,
            spawn,
            target_life: config.simulated_target_life.max(1),
            target: None,
            model_tier: ModelTier::Medium,
            frame_rate: config.initial_frame_rate,
            frames_read: 0,
        })
    }

    pub fn model_tier(&self) -> ModelTier {
        self.model_tier
    }

    /// Rate the model runs at: `initial_frame_rate` until a strategy is applied.
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn infer(&mut self) -> Vec<Detection> {
        self.frames_read += 1;
        if self.target.is_none() && self.spawn.sample(&mut self.rng) {
            self.target = Some(SimTarget {
                bbox: SPAWN_BOX,
                frames_left: self.target_life,
            });
        }

        let Some(target) = self.target.as_mut() else {
            return Vec::new();
        };
        target.bbox = target.bbox.translated(TARGET_MOTION);
        target.frames_left -= 1;
        let detection = Detection {
            category: DetectionLabel::LargeMarineLife,
            confidence: TARGET_CONFIDENCE,
            bbox: target.bbox,
            motion: TARGET_MOTION,
            image_path: Some(format!("{FRAME_DIR}/frame_{:08}.jpg", self.frames_read)),
        };
        if target.frames_left == 0 {
            self.target = None;
        }
        vec![detection]
    }
}

#[async_trait]
impl DetectionSource for SimulatedDetector {
    async fn next_frame(&mut self) -> Result<Vec<Detection>> {
        Ok(self.infer())
    }

    fn apply_strategy(&mut self, strategy: &Strategy) {
        if strategy.model_tier != self.model_tier {
            info!(from = %self.model_tier, to = %strategy.model_tier, "Switching model");
            self.model_tier = strategy.model_tier;
        }
        if strategy.frame_rate != self.frame_rate {
            info!(from = self.frame_rate, to = strategy.frame_rate, "Adjusting FPS");
            self.frame_rate = strategy.frame_rate;
        }
    }

    fn source_name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyMode;

    fn config(spawn: f64) -> DetectionConfig {
        DetectionConfig {
            simulated_spawn_probability: spawn,
            ..DetectionConfig::default()
        }
    }

    #[tokio::test]
    async fn target_drifts_for_its_lifetime() {
        let mut det = SimulatedDetector::seeded(&config(1.0), 7).unwrap();
        let mut last_x0 = SPAWN_BOX.x0;
        for _ in 0..15 {
            let frame = det.next_frame().await.unwrap();
            assert_eq!(frame.len(), 1);
            let d = &frame[0];
            assert_eq!(d.bbox.x0, last_x0 + 2.0);
            assert_eq!(d.bbox.width(), 160.0);
            last_x0 = d.bbox.x0;
        }
        // lifetime over: a fresh target respawns at the origin
        let frame = det.next_frame().await.unwrap();
        assert_eq!(frame[0].bbox.x0, SPAWN_BOX.x0 + 2.0);
    }

    #[tokio::test]
    async fn never_spawns_with_zero_probability() {
        let mut det = SimulatedDetector::seeded(&config(0.0), 1).unwrap();
        for _ in 0..50 {
            assert!(det.next_frame().await.unwrap().is_empty());
        }
    }

    #[test]
    fn rejects_invalid_probability() {
        assert!(SimulatedDetector::seeded(&config(1.5), 1).is_err());
    }

    #[test]
    fn strategy_switches_model_and_rate() {
        let mut det = SimulatedDetector::seeded(&config(0.0), 1).unwrap();
        assert_eq!(det.frame_rate(), 3);
        det.apply_strategy(&StrategyMode::HighRisk.strategy());
        assert_eq!(det.model_tier(), ModelTier::Large);
        assert_eq!(det.frame_rate(), 30);
    }

    #[tokio::test]
    async fn each_frame_has_its_own_image() {
        let mut det = SimulatedDetector::seeded(&config(1.0), 3).unwrap();
        let first = det.next_frame().await.unwrap();
        let second = det.next_frame().await.unwrap();
        assert_eq!(first[0].image_path.as_deref(), Some("evidence/sim/frame_00000001.jpg"));
        assert_eq!(second[0].image_path.as_deref(), Some("evidence/sim/frame_00000002.jpg"));
    }
}
