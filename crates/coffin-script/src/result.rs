//! Outcome of a scene run

use chrono::{DateTime, Utc};
use coffin_core::EffectKind;
use coffin_drivers::DriverError;
use std::time::Duration;
use ulid::Ulid;

/// One driver call that did not complete
#[derive(Debug, Clone, PartialEq)]
pub struct EffectFailure {
    pub kind: EffectKind,
    pub error: DriverError,
}

/// How a single step went
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub index: u32,
    pub name: String,
    /// Time from dispatch until the step was complete
    pub elapsed: Duration,
    pub failures: Vec<EffectFailure>,
    /// `force_idle` was issued after a motor failure
    pub motor_recovered: bool,
    /// The step was cut short by an operator abort
    pub aborted: bool,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    pub fn failed(&self, kind: EffectKind) -> bool {
        self.failures.iter().any(|failure| failure.kind == kind)
    }
}

/// Result of the idle-restoration pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdleReport {
    pub failures: Vec<EffectFailure>,
    /// `force_idle` itself failed; the motor may still be energized
    pub motor_unsafe: bool,
}

impl IdleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.motor_unsafe
    }
}

/// Report of one scene run
#[derive(Debug, Clone, PartialEq)]
pub struct SceneResult {
    pub run_id: Ulid,
    pub started_at: DateTime<Utc>,
    /// Catalog key
    pub scene: String,
    /// Display name
    pub name: String,
    /// Steps that were started, in execution order
    pub steps: Vec<StepOutcome>,
    pub duration: Duration,
    pub aborted: bool,
    pub cleanup: IdleReport,
    /// A safety recovery failed; the rig must not run again unattended
    pub unsafe_rig: bool,
}

impl SceneResult {
    /// Every step completed without a driver failure and nothing was aborted
    pub fn is_success(&self) -> bool {
        !self.aborted && !self.unsafe_rig && self.steps.iter().all(StepOutcome::is_success)
    }

    pub fn failure_count(&self) -> usize {
        self.steps.iter().map(|step| step.failures.len()).sum::<usize>() + self.cleanup.failures.len()
    }

    pub fn step(&self, index: u32) -> Option<&StepOutcome> {
        self.steps.iter().find(|step| step.index == index)
    }
}
