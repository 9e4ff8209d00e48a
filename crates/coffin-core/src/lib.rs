//! Core types for the Halloween coffin controller
//!
//! This crate provides the plain data model shared by every other crate:
//! the effect commands a step can carry, the scene catalog, and the static
//! rig configuration (hardware wiring, detection tuning, global settings).
//! Nothing in here touches hardware or the filesystem.

mod color;
mod detection;
mod effect;
mod hardware;
mod scene;
pub mod secs;
mod settings;

pub use color::Rgb;
pub use detection::DetectionConfig;
pub use effect::{
    AudioCommand, EffectCommand, EffectKind, LightCommand, MotorAction, MotorCommand,
    RelayCommand, RelayState, RelayTarget,
};
pub use hardware::{
    AudioConfig, GoveeConfig, HardwareConfig, LightsConfig, MotorConfig, PlayerConfig,
    RelayPinConfig, RelaysConfig, SensorPinConfig, SensorsConfig,
};
pub use scene::{DuplicateScene, LogLevel, Scene, SceneCatalog, Step, StepLog};
pub use settings::{CleanupAction, Settings};

/// Name given to the optional hardware setup sequence when it is run as a scene
pub const SETUP_SCENE: &str = "setup";
