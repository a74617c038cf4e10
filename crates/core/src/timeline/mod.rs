use std::{fs, path::Path, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{controls::ParameterUpdate, viewport::ResizeEvent, Result};

/// Source of the elapsed time written into the shader each frame.
pub trait Clock {
    /// Seconds since the loop started. Called once per tick.
    fn elapsed_seconds(&mut self) -> f32;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn elapsed_seconds(&mut self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

/// Deterministic clock: the n-th reading is `n * step` seconds.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    pub time_seconds: f32,
    step: f32,
    readings: u64,
}

impl SimulatedClock {
    pub fn new(step: f32) -> Self {
        Self {
            time_seconds: 0.0,
            step: step.max(0.0),
            readings: 0,
        }
    }

    pub fn at_fps(fps: f32) -> Self {
        Self::new(if fps > 0.0 { 1.0 / fps } else { 0.0 })
    }

    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
        self.readings = 0;
    }
}

impl Clock for SimulatedClock {
    fn elapsed_seconds(&mut self) -> f32 {
        // n * step, never a running sum.
        self.time_seconds = self.readings as f32 * self.step;
        self.readings += 1;
        self.time_seconds
    }
}

/// Something a user does between two frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Control(ParameterUpdate),
    /// Pointer drag in pixels.
    Orbit { dx: f32, dy: f32 },
    /// Wheel zoom; `factor > 1` moves away from the target.
    Dolly { factor: f32 },
    Resize(ResizeEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub time_seconds: f32,
    #[serde(flatten)]
    pub action: Action,
}

impl ScheduledEvent {
    pub fn new(time_seconds: f32, action: Action) -> Self {
        Self {
            time_seconds,
            action,
        }
    }
}

/// A scripted interaction session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub events: Vec<ScheduledEvent>,
}

impl Preset {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let preset: Preset = serde_json::from_str(&text)?;
        tracing::info!(path = %path.display(), events = preset.events.len(), "loaded preset");
        Ok(preset)
    }
}

/// Releases scheduled events in time order as the clock passes them.
#[derive(Debug, Default)]
pub struct Scheduler {
    events: Vec<ScheduledEvent>,
    next_event: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_events(&mut self, events: Vec<ScheduledEvent>) {
        self.events = events;
        self.events
            .sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
        self.next_event = 0;
    }

    /// Every not-yet-released event at or before `time_seconds`.
    pub fn due(&mut self, time_seconds: f32) -> Vec<Action> {
        let mut due = Vec::new();
        while let Some(event) = self.events.get(self.next_event) {
            if event.time_seconds > time_seconds {
                break;
            }
            due.push(event.action.clone());
            self.next_event += 1;
        }
        due
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.next_event
    }
}
