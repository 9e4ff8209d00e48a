//! Scenes, steps and the scene catalog

use crate::{EffectCommand, EffectKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Severity a step announces itself with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

/// Custom log line emitted when a step starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    #[serde(default)]
    pub level: LogLevel,
    pub message: String,
}

/// A single timed unit within a scene
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Declared step number. Advisory only: steps run in declaration order.
    pub index: u32,
    pub name: String,
    /// Minimum time the step occupies, measured from dispatch
    pub duration: Duration,
    pub log: Option<StepLog>,
    /// At most one command per [`EffectKind`]
    pub effects: Vec<EffectCommand>,
}

impl Step {
    /// Longest declared command duration in this step
    pub fn longest_effect(&self) -> Duration {
        self.effects
            .iter()
            .map(EffectCommand::intrinsic_duration)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Time this step is expected to take: the floor or the longest command,
    /// whichever is larger
    pub fn expected_duration(&self) -> Duration {
        self.duration.max(self.longest_effect())
    }

    /// Find the command targeting a given driver
    pub fn effect(&self, kind: EffectKind) -> Option<&EffectCommand> {
        self.effects.iter().find(|effect| effect.kind() == kind)
    }
}

/// A named, ordered sequence of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Catalog key (e.g. `vampire_awakening`)
    pub key: String,
    /// Display name
    pub name: String,
    pub description: Option<String>,
    /// Whether the scene came from the `alternative_sequences` section
    pub alternative: bool,
    pub steps: Vec<Step>,
}

impl Scene {
    /// Sum of expected step durations
    pub fn expected_duration(&self) -> Duration {
        self.steps.iter().map(Step::expected_duration).sum()
    }
}

/// Error returned when a scene name is registered twice
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("duplicate scene name '{0}'")]
pub struct DuplicateScene(pub String);

/// Immutable set of scenes keyed by name, in declaration order
#[derive(Debug, Clone, Default)]
pub struct SceneCatalog {
    scenes: IndexMap<String, Scene>,
}

impl SceneCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene. Names must be unique across the whole catalog.
    pub fn insert(&mut self, scene: Scene) -> Result<(), DuplicateScene> {
        if self.scenes.contains_key(&scene.key) {
            return Err(DuplicateScene(scene.key));
        }
        self.scenes.insert(scene.key.clone(), scene);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Scene> {
        self.scenes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scenes.contains_key(key)
    }

    /// Scene names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
