//! Global controller settings and cleanup actions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RelayTarget;

/// The `settings` section of the configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Pick a random scene on every trigger
    #[serde(default)]
    pub random_scene_mode: bool,

    /// Restrict random selection to these scenes (whole catalog when unset)
    #[serde(default)]
    pub random_scene_list: Option<Vec<String>>,

    /// Scene played on trigger when random mode is off. The first catalog
    /// entry is used when unset.
    #[serde(default)]
    pub default_scene: Option<String>,
}

/// Extra action run at the start of every idle-restoration pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CleanupAction {
    /// Switch one relay off
    RelayOff { target: RelayTarget },
    /// Drive the lid closed
    MotorClose {
        #[serde(default = "default_close_duration", with = "crate::secs")]
        duration: Duration,
    },
    /// Switch the light off
    LightsOff,
}

fn default_close_duration() -> Duration {
    Duration::from_secs(6)
}
