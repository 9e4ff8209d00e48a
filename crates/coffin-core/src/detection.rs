//! Proximity detection tuning

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The `detection` section of the configuration document.
///
/// Distances are in centimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// A guest at or inside this distance triggers a scene
    #[serde(rename = "distance_threshold_near", default = "default_near")]
    pub near_threshold: f64,

    /// A guest at or inside this distance is logged as approaching
    #[serde(rename = "distance_threshold_far", default = "default_far")]
    pub far_threshold: f64,

    /// Time between poll ticks
    #[serde(
        alias = "sensor_reading_interval",
        default = "default_sample_interval",
        with = "crate::secs"
    )]
    pub sample_interval: Duration,

    /// Extra attempts per sensor after a failed read
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between attempts on the same sensor
    #[serde(default = "default_retry_delay", with = "crate::secs")]
    pub retry_delay: Duration,

    /// Substituted for a sensor whose reads all failed. Must sit above
    /// `near_threshold` so a dead sensor can never trigger a scene.
    #[serde(default = "default_safe_distance")]
    pub default_safe_distance: f64,

    /// Quiet period after a scene during which no trigger may fire
    #[serde(default = "default_cooldown", with = "crate::secs")]
    pub cooldown_after_sequence: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            near_threshold: default_near(),
            far_threshold: default_far(),
            sample_interval: default_sample_interval(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            default_safe_distance: default_safe_distance(),
            cooldown_after_sequence: default_cooldown(),
        }
    }
}

fn default_near() -> f64 {
    50.0
}

fn default_far() -> f64 {
    150.0
}

fn default_sample_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_safe_distance() -> f64 {
    200.0
}

fn default_cooldown() -> Duration {
    Duration::from_secs(30)
}
