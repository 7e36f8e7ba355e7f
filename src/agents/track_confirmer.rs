//! Track Confirmer - multi-frame confirmation of living targets
//!
//! Every observation is matched against the in-flight tracks (first track
//! whose last centre lies within the match radius wins). A track is declared
//! a confirmed living entity only once:
//!
//! 1. it holds at least `confirmation_frames` observations,
//! 2. the population variance of both motion components stays under the
//!    chaos threshold (coherent motion rather than waves or foam), and
//! 3. its latest observation is not labelled non-living.
//!
//! Confirmation fires once per track. Tracks unseen for longer than the
//! dropout timeout are discarded after every observation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use tracing::{debug, info};

use super::lock_state;
use crate::bus::{BusMessage, Dispatcher, Topic};
use crate::config::TrackingConfig;
use crate::types::{Event, Evidence, Observation, StrategyRevision, TrackGeometry};
use crate::DECISION_LOG_TARGET;

/// A maintained hypothesis that a run of observations is one object.
#[derive(Debug, Clone)]
struct Track {
    track_id: u64,
    first_frame_id: u64,
    history: VecDeque<Observation>,
    first_seen: Instant,
    last_seen: Instant,
    confirmed: bool,
}

impl Track {
    fn new(track_id: u64, obs: Observation, now: Instant, capacity: usize) -> Self {
        let mut history = VecDeque::with_capacity(capacity);
        let first_frame_id = obs.frame_id;
        history.push_back(obs);
        Self {
            track_id,
            first_frame_id,
            history,
            first_seen: now,
            last_seen: now,
            confirmed: false,
        }
    }

    fn last_center(&self) -> Option<(f64, f64)> {
        self.history.back().map(|o| o.bounding_box.center())
    }

    fn push(&mut self, obs: Observation, now: Instant, capacity: usize) {
        while self.history.len() >= capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(obs);
        self.last_seen = now;
    }

    fn is_consistent(&self, required_frames: usize, chaos_variance: f64) -> bool {
        if self.history.len() < required_frames {
            return false;
        }

        let var_x = population_variance(self.history.iter().map(|o| o.motion_vector.dx));
        let var_y = population_variance(self.history.iter().map(|o| o.motion_vector.dy));
        // NaN must never pass as "coherent"
        if !(var_x <= chaos_variance && var_y <= chaos_variance) {
            return false;
        }

        match self.history.back() {
            Some(latest) => !latest.category.is_non_living(),
            None => false,
        }
    }

    fn average_confidence(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().map(|o| o.confidence).sum::<f64>() / self.history.len() as f64
    }

    fn to_event(&self) -> Option<Event> {
        let latest = self.history.back()?;
        let frames = self.history.len();

        let mut event = Event::new(latest.category, self.average_confidence())
            .with_metadata("raw_label", latest.category.as_str())
            .with_metadata("frame_id", latest.frame_id)
            .with_metadata("track_id", self.track_id)
            .with_metadata("first_frame_id", self.first_frame_id)
            .with_metadata("evidence_frames", frames)
            .with_metadata("confirmed", true);
        event.timestamp = latest.timestamp;
        event.confirmed = true;
        event.geometry = Some(TrackGeometry {
            bounding_box: latest.bounding_box,
            motion_vector: latest.motion_vector,
        });
        event.evidence = Evidence {
            image_paths: self
                .history
                .iter()
                .filter_map(|o| o.image_path.clone())
                .collect(),
            clip_path: None,
            evidence_frames: frames,
        };
        Some(event)
    }
}

/// Population variance (divides by n). Zero for an empty sequence.
fn population_variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64
}

struct ConfirmerState {
    tracks: Vec<Track>,
    confirmation_frames: usize,
    /// Generation of the last strategy revision applied
    applied_generation: u64,
    next_track_id: u64,
}

pub struct TrackConfirmer {
    config: TrackingConfig,
    state: Mutex<ConfirmerState>,
    bus: Arc<Dispatcher>,
}

impl TrackConfirmer {
    pub fn new(config: TrackingConfig, bus: Arc<Dispatcher>) -> Self {
        let confirmation_frames = config.default_confirmation_frames;
        Self {
            config,
            state: Mutex::new(ConfirmerState {
                tracks: Vec::new(),
                confirmation_frames,
                applied_generation: 0,
                next_track_id: 1,
            }),
            bus,
        }
    }

    /// Subscribe to detections and strategy updates.
    pub fn attach(self: &Arc<Self>, bus: &Dispatcher) {
        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::Detection, "track_confirmer", move |msg| {
            if let (Some(me), BusMessage::Detection(obs)) = (me.upgrade(), msg) {
                me.on_observation(obs);
            }
            Ok(())
        });

        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::StrategyUpdate, "track_confirmer", move |msg| {
            if let (Some(me), BusMessage::StrategyUpdate(revision)) = (me.upgrade(), msg) {
                me.apply_revision(revision);
            }
            Ok(())
        });
    }

    pub fn confirmation_frames(&self) -> usize {
        lock_state(&self.state, "track_confirmer").confirmation_frames
    }

    /// Adopt the revision's confirmation window unless a newer revision was
    /// already applied. Returns whether it was adopted.
    pub fn apply_revision(&self, revision: &StrategyRevision) -> bool {
        let mut state = lock_state(&self.state, "track_confirmer");
        if revision.generation <= state.applied_generation {
            debug!(
                generation = revision.generation,
                applied = state.applied_generation,
                "Ignoring stale strategy revision"
            );
            return false;
        }
        state.applied_generation = revision.generation;

        let frames = revision.strategy.confirmation_frames;
        if state.confirmation_frames != frames {
            info!(
                from = state.confirmation_frames,
                to = frames,
                "Adjusting confirmation threshold"
            );
            state.confirmation_frames = frames;
        }
        true
    }

    pub fn track_count(&self) -> usize {
        lock_state(&self.state, "track_confirmer").tracks.len()
    }

    /// Handle one observation and publish `ConfirmedEvent` on first confirmation.
    pub fn on_observation(&self, obs: &Observation) -> Option<Event> {
        let event = self.process_at(obs, Instant::now())?;
        self.bus.publish(BusMessage::ConfirmedEvent(event.clone()));
        Some(event)
    }

    /// Match, update and garbage-collect at the given instant. Does not publish.
    pub fn process_at(&self, obs: &Observation, now: Instant) -> Option<Event> {
        let capacity = self.config.history_capacity;
        let (cx, cy) = obs.bounding_box.center();

        let mut state = lock_state(&self.state, "track_confirmer");
        let required = state.confirmation_frames;

        let matched = state.tracks.iter().position(|t| {
            t.last_center()
                .map(|(lx, ly)| (cx - lx).hypot(cy - ly) < self.config.match_radius_px)
                .unwrap_or(false)
        });

        let mut confirmed = None;
        match matched {
            Some(idx) => {
                let track = &mut state.tracks[idx];
                track.push(obs.clone(), now, capacity);
                if !track.confirmed {
                    if track.is_consistent(required, self.config.chaos_variance) {
                        track.confirmed = true;
                        confirmed = track.to_event();
                    } else {
                        debug!(
                            track_id = track.track_id,
                            frames = track.history.len(),
                            required,
                            "Track updated but unconfirmed"
                        );
                    }
                }
            }
            None => {
                let track_id = state.next_track_id;
                state.next_track_id += 1;
                debug!(track_id, frame_id = obs.frame_id, "New candidate track");
                state
                    .tracks
                    .push(Track::new(track_id, obs.clone(), now, capacity));
            }
        }

        let dropout = self.config.dropout_secs;
        state.tracks.retain(|t| {
            let keep = now.saturating_duration_since(t.last_seen).as_secs_f64() <= dropout;
            if !keep {
                debug!(
                    track_id = t.track_id,
                    lifetime_secs = t.last_seen.duration_since(t.first_seen).as_secs_f64(),
                    "Dropping stale track"
                );
            }
            keep
        });
        drop(state);

        if let Some(ref event) = confirmed {
            info!(
                target: DECISION_LOG_TARGET,
                kind = "confirmation",
                confirmed = true,
                category = %event.category,
                confidence = (event.confidence * 100.0).round() / 100.0,
                evidence_frames = event.evidence.evidence_frames,
                "track confirmed"
            );
        }
        confirmed
    }
}
