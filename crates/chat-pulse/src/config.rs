//! Session configuration.
//!
//! Every field has a default, so partial configuration files are accepted.
//! Durations are stored as milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};
use crate::statistics::TimeWindow;
use crate::words::WordFilter;

/// Top-level configuration of a [`crate::PulseSession`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Window for counters, decay scores and pruning
    pub window: TimeWindow,
    pub ranking: RankingConfig,
    pub particles: ParticleConfig,
    pub timing: TimingConfig,
    pub words: WordFilterConfig,
}

impl PulseConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let p = &self.particles;
        if !(p.width > 0.0 && p.height > 0.0) {
            return Err(PulseError::config("particle bounds must be positive"));
        }
        if p.size_min > p.size_max {
            return Err(PulseError::config("size_min must not exceed size_max"));
        }
        if p.max_keys == 0 || p.max_per_key == 0 {
            return Err(PulseError::config("particle caps must be positive"));
        }
        let t = &self.timing;
        if t.tick_ms == 0 || t.counter_refresh_ms == 0 || t.word_refresh_ms == 0 || t.heartbeat_ms == 0
        {
            return Err(PulseError::config("timer periods must be positive"));
        }
        Ok(())
    }
}

/// How many rows the ranked views keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub counter_rows: usize,
    pub word_rows: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            counter_rows: 200,
            word_rows: 50,
        }
    }
}

/// Particle population and spawn parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Number of top keys that get particles
    pub max_keys: usize,
    /// Per-key population cap
    pub max_per_key: u64,
    /// Size for a count of one
    pub size_min: f64,
    /// Size growth per natural-log unit of count
    pub size_slope: f64,
    pub size_max: f64,
    /// Width of the velocity range on each axis, in distance per tick
    pub max_speed: f64,
    /// Width of the rotation speed range, in radians per tick
    pub max_spin: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            max_keys: 50,
            max_per_key: 100,
            size_min: 58.0,
            size_slope: 8.0,
            size_max: 64.0,
            max_speed: 3.0,
            max_spin: 0.05,
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Periods of the cooperative timers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Physics tick
    pub tick_ms: u64,
    /// Counter refresh and particle reconciliation
    pub counter_refresh_ms: u64,
    pub word_refresh_ms: u64,
    /// Single-shot delay before buffered words are recorded
    pub word_batch_delay_ms: u64,
    pub heartbeat_ms: u64,
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn counter_refresh(&self) -> Duration {
        Duration::from_millis(self.counter_refresh_ms)
    }

    pub fn word_refresh(&self) -> Duration {
        Duration::from_millis(self.word_refresh_ms)
    }

    pub fn word_batch_delay(&self) -> Duration {
        Duration::from_millis(self.word_batch_delay_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            counter_refresh_ms: 1000,
            word_refresh_ms: 500,
            word_batch_delay_ms: 3000,
            heartbeat_ms: 15000,
        }
    }
}

/// Word extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordFilterConfig {
    pub min_len: usize,
    /// Added to the built-in stop words
    pub stop_words: Vec<String>,
}

impl WordFilterConfig {
    pub fn build(&self) -> WordFilter {
        WordFilter::new(self.min_len, &self.stop_words)
    }
}

impl Default for WordFilterConfig {
    fn default() -> Self {
        Self {
            min_len: 3,
            stop_words: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PulseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window, TimeWindow::secs(60));
        assert_eq!(config.timing.word_batch_delay(), Duration::from_secs(3));
        assert_eq!(config.particles.max_keys, 50);
    }

    #[test]
    fn test_partial_json() {
        let config: PulseConfig =
            serde_json::from_str(r#"{"window": "all", "particles": {"width": 640.0}}"#).unwrap();
        assert_eq!(config.window, TimeWindow::Unbounded);
        assert_eq!(config.particles.width, 640.0);
        assert_eq!(config.particles.height, 720.0);
        assert_eq!(config.ranking.counter_rows, 200);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = PulseConfig::default();
        config.particles.width = 0.0;
        assert!(matches!(config.validate(), Err(PulseError::Config(_))));

        let mut config = PulseConfig::default();
        config.particles.size_min = 100.0;
        assert!(config.validate().is_err());

        let mut config = PulseConfig::default();
        config.timing.tick_ms = 0;
        assert!(config.validate().is_err());
    }
}
