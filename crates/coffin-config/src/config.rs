//! Validated controller configuration
//!
//! [`CoffinConfig`] is built once at startup. Every load-time invariant is
//! checked here, eagerly, so a broken scene stops the process before any
//! hardware is touched.

use crate::document::{RawDocument, RawEffects, RawScene, RawStep};
use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_document;
use coffin_core::{
    secs, AudioCommand, CleanupAction, DetectionConfig, EffectCommand, HardwareConfig,
    LightCommand, MotorCommand, RelayCommand, Rgb, Scene, SceneCatalog, Settings, Step,
    SETUP_SCENE,
};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Fully validated configuration
#[derive(Debug, Clone)]
pub struct CoffinConfig {
    pub hardware: HardwareConfig,
    pub detection: DetectionConfig,
    pub settings: Settings,
    /// Main scenes followed by alternative sequences
    pub catalog: SceneCatalog,
    /// Hardware setup steps, run once before monitoring
    pub setup: Option<Scene>,
    /// Extra actions run at the start of every idle-restoration pass
    pub cleanup: Vec<CleanupAction>,
}

impl CoffinConfig {
    /// Load, resolve and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let value = load_document(path)?;
        let config = Self::from_value(value)?;
        info!(
            path = %path.display(),
            scenes = config.catalog.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate YAML text that uses no include tags
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
                path: "<inline>".into(),
                source: e,
            })?;
        Self::from_value(value)
    }

    /// Convert a resolved YAML document into the validated model
    pub fn from_value(value: serde_yaml::Value) -> ConfigResult<Self> {
        let raw: RawDocument =
            serde_yaml::from_value(value).map_err(|e| ConfigError::Schema { source: e })?;
        Self::from_document(raw)
    }

    fn from_document(raw: RawDocument) -> ConfigResult<Self> {
        validate_detection(&raw.detection)?;

        let audio_keys: HashSet<&str> = raw.hardware.audio.files.keys().map(String::as_str).collect();

        let mut catalog = SceneCatalog::new();
        let sections = [(&raw.scenes, false), (&raw.alternative_sequences, true)];
        for (section, alternative) in sections {
            for (key, raw_scene) in section {
                let scene = build_scene(key, raw_scene, alternative, &audio_keys)?;
                debug!(scene = %key, steps = scene.steps.len(), alternative, "Scene validated");
                catalog
                    .insert(scene)
                    .map_err(|e| ConfigError::DuplicateScene { name: e.0 })?;
            }
        }

        validate_settings(&raw.settings, &catalog)?;

        let setup = if raw.setup_sequence.is_empty() {
            None
        } else {
            let steps = build_steps(SETUP_SCENE, &raw.setup_sequence, &audio_keys)?;
            Some(Scene {
                key: SETUP_SCENE.to_string(),
                name: "Hardware setup".to_string(),
                description: None,
                alternative: false,
                steps,
            })
        };

        Ok(Self {
            hardware: raw.hardware,
            detection: raw.detection,
            settings: raw.settings,
            catalog,
            setup,
            cleanup: raw.error_handling.emergency_cleanup,
        })
    }
}

fn build_scene(
    key: &str,
    raw: &RawScene,
    alternative: bool,
    audio_keys: &HashSet<&str>,
) -> ConfigResult<Scene> {
    Ok(Scene {
        key: key.to_string(),
        name: raw.name.clone().unwrap_or_else(|| key.to_string()),
        description: raw.description.clone(),
        alternative,
        steps: build_steps(key, &raw.steps, audio_keys)?,
    })
}

fn build_steps(
    scene: &str,
    raw_steps: &[RawStep],
    audio_keys: &HashSet<&str>,
) -> ConfigResult<Vec<Step>> {
    raw_steps
        .iter()
        .enumerate()
        .map(|(position, raw)| {
            let index = raw.index.unwrap_or(position as u32 + 1);
            let invalid = |reason: String| ConfigError::InvalidStep {
                scene: scene.to_string(),
                step: index,
                reason,
            };

            let duration = secs::from_secs(raw.duration).map_err(&invalid)?;
            let effects = build_effects(&raw.effects, &invalid)?;

            let mut seen = HashSet::new();
            for effect in &effects {
                if !seen.insert(effect.kind()) {
                    return Err(ConfigError::ConflictingEffects {
                        scene: scene.to_string(),
                        step: index,
                        driver: effect.kind().to_string(),
                    });
                }
                if let EffectCommand::Audio(audio) = effect {
                    if !audio_keys.contains(audio.file_key.as_str()) {
                        return Err(ConfigError::UnknownAudioFile {
                            scene: scene.to_string(),
                            step: index,
                            file: audio.file_key.clone(),
                        });
                    }
                }
            }

            Ok(Step {
                index,
                name: raw.name.clone().unwrap_or_else(|| format!("Step {}", index)),
                duration,
                log: raw.logging.clone(),
                effects,
            })
        })
        .collect()
}

/// Flatten the effect block into commands, in light/audio/motor/relay order
fn build_effects<F>(raw: &RawEffects, invalid: &F) -> ConfigResult<Vec<EffectCommand>>
where
    F: Fn(String) -> ConfigError,
{
    let mut effects = Vec::new();

    if let Some(light) = &raw.lights {
        effects.push(EffectCommand::Light(LightCommand {
            color: if light.off { Rgb::BLACK } else { light.color },
            flash: light.flash && !light.off,
            flash_amount: light.flash_amount,
        }));
    }

    if let Some(audio) = &raw.audio {
        if !(0.0..=1.0).contains(&audio.volume) {
            return Err(invalid(format!(
                "audio volume must be within [0, 1], got {}",
                audio.volume
            )));
        }
        effects.push(EffectCommand::Audio(AudioCommand {
            file_key: audio.file_key().to_string(),
            volume: audio.volume as f32,
        }));
    }

    if let Some(motor) = &raw.motor {
        effects.push(EffectCommand::Motor(MotorCommand {
            action: motor.action,
            duration: secs::from_secs(motor.duration).map_err(|e| invalid(format!("motor {}", e)))?,
        }));
    }

    for relay in &raw.relay {
        let duration = relay
            .duration
            .map(secs::from_secs)
            .transpose()
            .map_err(|e| invalid(format!("relay {}", e)))?
            .filter(|d| *d > Duration::ZERO);
        effects.push(EffectCommand::Relay(RelayCommand {
            target: relay.name,
            state: relay.action,
            duration,
        }));
    }

    Ok(effects)
}

fn validate_detection(detection: &DetectionConfig) -> ConfigResult<()> {
    let invalid = |reason: String| Err(ConfigError::InvalidDetection { reason });

    if detection.sample_interval.is_zero() {
        return invalid("sample_interval must be greater than zero".to_string());
    }
    if detection.near_threshold < 0.0 || !detection.near_threshold.is_finite() {
        return invalid(format!(
            "distance_threshold_near must be a non-negative number, got {}",
            detection.near_threshold
        ));
    }
    if !detection.far_threshold.is_finite() {
        return invalid(format!(
            "distance_threshold_far must be a finite number, got {}",
            detection.far_threshold
        ));
    }
    if !detection.default_safe_distance.is_finite() {
        return invalid(format!(
            "default_safe_distance must be a finite number, got {}",
            detection.default_safe_distance
        ));
    }
    if detection.near_threshold > detection.far_threshold {
        return invalid(format!(
            "distance_threshold_near ({}) exceeds distance_threshold_far ({})",
            detection.near_threshold, detection.far_threshold
        ));
    }
    if !(detection.default_safe_distance > detection.near_threshold) {
        return invalid(format!(
            "default_safe_distance ({}) must be greater than distance_threshold_near ({})",
            detection.default_safe_distance, detection.near_threshold
        ));
    }
    Ok(())
}

fn validate_settings(settings: &Settings, catalog: &SceneCatalog) -> ConfigResult<()> {
    if let Some(list) = &settings.random_scene_list {
        if let Some(missing) = list.iter().find(|name| !catalog.contains(name)) {
            return Err(ConfigError::UnknownScene {
                setting: "random_scene_list".to_string(),
                name: missing.clone(),
            });
        }
        if list.is_empty() && settings.random_scene_mode {
            return Err(ConfigError::InvalidValue {
                key: "random_scene_list".to_string(),
                reason: "list is empty".to_string(),
            });
        }
    }

    if let Some(default_scene) = &settings.default_scene {
        if !catalog.contains(default_scene) {
            return Err(ConfigError::UnknownScene {
                setting: "default_scene".to_string(),
                name: default_scene.clone(),
            });
        }
    }

    Ok(())
}
