//! Raw shape of the configuration document
//!
//! These types mirror the YAML exactly, including the shorthand the scene
//! authors use (`colour`, `file: thump.mp3`, a single relay or a list of
//! them). They are converted into the immutable `coffin_core` model by
//! [`crate::CoffinConfig::from_value`] and never used at dispatch time.

use coffin_core::{
    CleanupAction, DetectionConfig, HardwareConfig, MotorAction, RelayState, RelayTarget, Rgb,
    Settings, StepLog,
};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

/// Deserialize a field that can be either a single entry or a list of entries
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(OneOrMany::One(item)) => Ok(vec![item]),
        Some(OneOrMany::Many(items)) => Ok(items),
    }
}

/// The whole configuration document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub hardware: HardwareConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub scenes: IndexMap<String, RawScene>,

    #[serde(default)]
    pub alternative_sequences: IndexMap<String, RawScene>,

    /// Steps run once before monitoring starts
    #[serde(default)]
    pub setup_sequence: Vec<RawStep>,

    #[serde(default)]
    pub error_handling: RawErrorHandling,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawErrorHandling {
    #[serde(default)]
    pub emergency_cleanup: Vec<CleanupAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScene {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    /// Declared step number
    #[serde(rename = "step")]
    pub index: Option<u32>,
    pub name: Option<String>,
    #[serde(default)]
    pub duration: f64,
    pub logging: Option<StepLog>,
    #[serde(default)]
    pub effects: RawEffects,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEffects {
    pub lights: Option<RawLight>,
    pub audio: Option<RawAudio>,
    pub motor: Option<RawMotor>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub relay: Vec<RawRelay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLight {
    #[serde(default, alias = "colour")]
    pub color: Rgb,
    #[serde(default)]
    pub flash: bool,
    #[serde(default = "default_flash_amount")]
    pub flash_amount: u32,
    /// Force the light dark regardless of `color`
    #[serde(default)]
    pub off: bool,
}

fn default_flash_amount() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAudio {
    pub file: String,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

impl RawAudio {
    /// Clip key with an optional `.mp3` suffix stripped
    pub fn file_key(&self) -> &str {
        self.file.strip_suffix(".mp3").unwrap_or(&self.file)
    }
}

fn default_volume() -> f64 {
    0.7
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMotor {
    pub action: MotorAction,
    #[serde(default = "default_motor_duration")]
    pub duration: f64,
}

fn default_motor_duration() -> f64 {
    6.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRelay {
    #[serde(alias = "target")]
    pub name: RelayTarget,
    #[serde(alias = "state")]
    pub action: RelayState,
    pub duration: Option<f64>,
}
