//! Scene lookup errors

use thiserror::Error;

/// A scene could not be chosen
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    #[error("No scenes available to pick from")]
    EmptyPool,
}

/// Result type for scene selection
pub type SelectionResult<T> = Result<T, SceneError>;
