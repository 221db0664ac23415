pub mod controller;
pub mod engine;
pub mod listeners;

pub use controller::{LoadOutcome, LoadedTrace, PlaybackController};
pub use engine::PlaybackEngine;
pub use listeners::Subscription;

use crate::core::{Step, TraceBuilder, DEFAULT_MAX_STEPS};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Authoritative playback state, as seen by subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub steps: Arc<[Step]>,
    /// Always 0 when `steps` is empty
    pub current_index: usize,
    pub is_playing: bool,
    pub speed: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            steps: Arc::from(Vec::new()),
            current_index: 0,
            is_playing: false,
            speed: 1.0,
            looping: false,
        }
    }
}

impl PlaybackState {
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_index)
    }

    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn is_at_end(&self) -> bool {
        self.current_index >= self.last_index()
    }
}

/// Lowest speed multiplier any config may use
pub const MIN_SPEED_FLOOR: f64 = 0.01;

/// Longest autoplay period, whatever the speed
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Shortest autoplay period, whatever the speed
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay between autoplay ticks at speed 1.0
    pub base_delay_ms: u64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub initial_speed: f64,
    pub loop_playback: bool,
    /// Step cap handed to producers through [`crate::core::TraceBuilder`]
    pub max_trace_steps: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 800,
            min_speed: 0.1,
            max_speed: 10.0,
            initial_speed: 1.0,
            loop_playback: false,
            max_trace_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl PlaybackConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay_ms == 0 {
            return Err(ConfigError::Invalid("base_delay_ms must be positive".into()));
        }
        if self.min_speed.is_nan() || self.min_speed < MIN_SPEED_FLOOR || !self.max_speed.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "speed range must be finite and at least {}, got {}..{}",
                MIN_SPEED_FLOOR, self.min_speed, self.max_speed
            )));
        }
        if self.max_speed < self.min_speed {
            return Err(ConfigError::Invalid(format!(
                "max_speed {} is below min_speed {}",
                self.max_speed, self.min_speed
            )));
        }
        if self.initial_speed.is_nan() || self.initial_speed <= 0.0 {
            return Err(ConfigError::Invalid("initial_speed must be positive".into()));
        }
        if self.max_trace_steps == 0 {
            return Err(ConfigError::Invalid("max_trace_steps must be positive".into()));
        }
        Ok(())
    }

    /// Pull every field into a usable range. Engines run on the normalized
    /// config, so hand-built configs that skip `validate()` cannot stall or panic.
    pub fn normalized(mut self) -> Self {
        self.base_delay_ms = self.base_delay_ms.max(1);
        if self.min_speed.is_nan() || self.min_speed < MIN_SPEED_FLOOR {
            self.min_speed = MIN_SPEED_FLOOR;
        }
        if self.max_speed.is_nan() || self.max_speed < self.min_speed {
            self.max_speed = self.min_speed;
        }
        if self.initial_speed.is_nan() {
            self.initial_speed = 1.0;
        }
        self.initial_speed = self.clamp_speed(self.initial_speed);
        self.max_trace_steps = self.max_trace_steps.max(1);
        self
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms.max(1))
    }

    /// Clamp a requested speed into the configured range. NaN maps to the minimum.
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if speed.is_nan() {
            return self.min_speed;
        }
        speed.max(self.min_speed).min(self.max_speed)
    }

    /// A trace builder capped at `max_trace_steps`
    pub fn trace_builder(&self) -> TraceBuilder {
        TraceBuilder::new(self.max_trace_steps)
    }

    /// Timer period for the given speed multiplier, kept within
    /// [`MIN_INTERVAL`]..=[`MAX_INTERVAL`]
    pub fn interval_for(&self, speed: f64) -> Duration {
        let speed = self.clamp_speed(speed).max(MIN_SPEED_FLOOR);
        Duration::try_from_secs_f64(self.base_interval().as_secs_f64() / speed)
            .unwrap_or(MAX_INTERVAL)
            .clamp(MIN_INTERVAL, MAX_INTERVAL)
    }
}
