//! Scene Execution Engine
//!
//! Runs scenes from the catalog against a [`DriverSet`](coffin_drivers::DriverSet).
//! Every step fans its effect commands out concurrently and occupies at least
//! its declared duration; every run ends with the idle-restoration pass.
//!
//! # Key Types
//!
//! - [`SceneExecutor`] - Executes scenes and the idle-restoration pass
//! - [`SceneResult`] - Per-step outcome of one run
//! - [`AbortHandle`] / [`AbortSignal`] - Operator abort
//! - [`ScenePicker`] - Fixed or random scene selection
//! - [`run_diagnostic`] - Exercise every driver once

mod abort;
mod diagnostic;
mod error;
pub mod executor;
mod result;
mod selection;

pub use abort::{abort_pair, AbortHandle, AbortSignal};
pub use diagnostic::{run_diagnostic, CheckOutcome, DiagnosticReport};
pub use error::{SceneError, SelectionResult};
pub use executor::SceneExecutor;
pub use result::{EffectFailure, IdleReport, SceneResult, StepOutcome};
pub use selection::{find, ScenePicker};
