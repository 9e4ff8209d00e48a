//! Error types for configuration loading and validation

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or validating the configuration.
///
/// Every variant is fatal at startup: the controller refuses to touch any
/// hardware until the whole document is valid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The YAML parsed but does not have the expected shape
    #[error("malformed configuration: {source}")]
    Schema {
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid include path
    #[error("invalid include path '{path}': {reason}")]
    InvalidIncludePath { path: String, reason: String },

    /// Circular include detected
    #[error("circular include detected: {path}")]
    CircularInclude { path: PathBuf },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Two scenes share a name
    #[error("duplicate scene name '{name}'")]
    DuplicateScene { name: String },

    /// A step field is out of range
    #[error("scene '{scene}' step {step}: {reason}")]
    InvalidStep {
        scene: String,
        step: u32,
        reason: String,
    },

    /// An audio command references a clip missing from `hardware.audio.files`
    #[error("scene '{scene}' step {step}: unknown audio file '{file}'")]
    UnknownAudioFile {
        scene: String,
        step: u32,
        file: String,
    },

    /// A step declares two commands for the same driver
    #[error("scene '{scene}' step {step}: more than one command for {driver}")]
    ConflictingEffects {
        scene: String,
        step: u32,
        driver: String,
    },

    /// `random_scene_list` or `default_scene` names a scene that does not exist
    #[error("{setting} references unknown scene '{name}'")]
    UnknownScene { setting: String, name: String },

    /// Detection thresholds are inconsistent
    #[error("invalid detection settings: {reason}")]
    InvalidDetection { reason: String },
}
