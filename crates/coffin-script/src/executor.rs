//! Scene executor
//!
//! Runs the steps of a scene in declaration order. Each step spawns one task
//! per effect command and races their joint completion, together with the
//! step's duration floor, against the operator abort signal. The
//! idle-restoration pass runs after the last step on every exit path.

use crate::abort::AbortSignal;
use crate::result::{EffectFailure, IdleReport, SceneResult, StepOutcome};
use chrono::Utc;
use coffin_core::{
    CleanupAction, EffectCommand, EffectKind, LogLevel, MotorAction, RelayState, RelayTarget, Rgb,
    Scene, Step,
};
use coffin_drivers::{DriverError, DriverResult, DriverSet};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Scene executor
///
/// Owns the drivers for the duration of a run. Only one scene runs at a
/// time; callers serialize runs by awaiting [`SceneExecutor::run`].
pub struct SceneExecutor {
    drivers: DriverSet,
    cleanup: Vec<CleanupAction>,
    abort: AbortSignal,
}

/// What happened inside one step
struct StepRun {
    outcome: StepOutcome,
    motor_unsafe: bool,
}

impl SceneExecutor {
    /// Create a new executor
    pub fn new(drivers: DriverSet, abort: AbortSignal) -> Self {
        Self {
            drivers,
            cleanup: Vec::new(),
            abort,
        }
    }

    /// Extra actions run at the start of every idle-restoration pass
    pub fn with_cleanup(mut self, cleanup: Vec<CleanupAction>) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn drivers(&self) -> &DriverSet {
        &self.drivers
    }

    pub(crate) fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Execute a scene and restore the rig to idle.
    ///
    /// Driver failures never abort the scene. An operator abort skips the
    /// remaining steps, and so does a failed motor recovery.
    pub async fn run(&self, scene: &Scene) -> SceneResult {
        let run_id = Ulid::new();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut abort = self.abort.clone();

        info!(
            scene = %scene.key,
            %run_id,
            steps = scene.steps.len(),
            expected_secs = scene.expected_duration().as_secs_f64(),
            "Starting scene: {}",
            scene.name
        );

        let mut steps = Vec::with_capacity(scene.steps.len());
        let mut aborted = false;
        let mut unsafe_rig = false;

        for step in &scene.steps {
            if abort.is_aborted() {
                aborted = true;
                break;
            }

            announce(scene, step);
            let run = self.run_step(scene, step, &mut abort).await;
            aborted = run.outcome.aborted;
            steps.push(run.outcome);

            if run.motor_unsafe {
                error!(scene = %scene.key, step = step.index, "Motor recovery failed, skipping remaining steps");
                unsafe_rig = true;
                break;
            }
            if aborted {
                break;
            }
        }

        let cleanup = self.restore_idle().await;
        unsafe_rig |= cleanup.motor_unsafe;

        let result = SceneResult {
            run_id,
            started_at,
            scene: scene.key.clone(),
            name: scene.name.clone(),
            steps,
            duration: start.elapsed(),
            aborted,
            cleanup,
            unsafe_rig,
        };

        if result.is_success() {
            info!(
                scene = %scene.key,
                %run_id,
                duration_secs = result.duration.as_secs_f64(),
                "Scene completed"
            );
        } else {
            warn!(
                scene = %scene.key,
                %run_id,
                duration_secs = result.duration.as_secs_f64(),
                failures = result.failure_count(),
                aborted = result.aborted,
                unsafe_rig = result.unsafe_rig,
                "Scene finished with problems"
            );
        }

        result
    }

    /// Dispatch every command of a step and wait until the step is complete
    async fn run_step(&self, scene: &Scene, step: &Step, abort: &mut AbortSignal) -> StepRun {
        let dispatched = Instant::now();
        let floor = tokio::time::sleep(step.duration);

        let mut tasks = JoinSet::new();
        for effect in &step.effects {
            let drivers = self.drivers.clone();
            let effect = effect.clone();
            tasks.spawn(async move {
                let kind = effect.kind();
                let result = AssertUnwindSafe(dispatch(&drivers, &effect))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(DriverError::Failed(format!("{kind} driver panicked"))));
                (kind, result)
            });
        }

        let mut failures = Vec::new();
        let mut motor_recovered = false;
        let mut motor_unsafe = false;
        let mut aborted = false;

        let settle = async {
            while let Some(joined) = tasks.join_next().await {
                let Ok((kind, result)) = joined else {
                    continue;
                };
                let Err(error) = result else {
                    debug!(scene = %scene.key, step = step.index, driver = %kind, "Effect done");
                    continue;
                };

                warn!(
                    scene = %scene.key,
                    step = step.index,
                    driver = %kind,
                    %error,
                    "Effect failed"
                );
                if kind == EffectKind::Motor {
                    match self.drivers.motor.force_idle().await {
                        Ok(()) => {
                            info!(scene = %scene.key, step = step.index, "Motor forced idle after failure");
                            motor_recovered = true;
                        }
                        Err(recovery) => {
                            error!(
                                scene = %scene.key,
                                step = step.index,
                                error = %recovery,
                                "Motor force_idle failed"
                            );
                            motor_unsafe = true;
                        }
                    }
                }
                failures.push(EffectFailure { kind, error });
            }
            floor.await;
        };

        tokio::select! {
            _ = settle => {}
            _ = abort.aborted() => {
                aborted = true;
            }
        }

        if aborted {
            warn!(
                scene = %scene.key,
                step = step.index,
                in_flight = tasks.len(),
                "Operator abort, cancelling step"
            );
            tasks.shutdown().await;
        }

        StepRun {
            outcome: StepOutcome {
                index: step.index,
                name: step.name.clone(),
                elapsed: dispatched.elapsed(),
                failures,
                motor_recovered,
                aborted,
            },
            motor_unsafe,
        }
    }

    /// Return every prop to its resting state.
    ///
    /// Issues absolute commands only, so it is safe to call while calls from
    /// an interrupted step may still be settling. Failures are collected, never
    /// propagated.
    pub async fn restore_idle(&self) -> IdleReport {
        let mut report = IdleReport::default();
        let drivers = &self.drivers;

        for action in &self.cleanup {
            let (kind, result) = match action {
                CleanupAction::RelayOff { target } => (
                    EffectKind::Relay(*target),
                    drivers.relays.set_state(*target, RelayState::Off, None).await,
                ),
                CleanupAction::MotorClose { duration } => (
                    EffectKind::Motor,
                    drivers.motor.drive(MotorAction::Close, *duration).await,
                ),
                CleanupAction::LightsOff => (
                    EffectKind::Light,
                    drivers.light.set_state(Rgb::BLACK, false, 0).await,
                ),
            };
            record(&mut report, kind, result);
        }

        for target in RelayTarget::ALL {
            let result = drivers.relays.set_state(target, RelayState::Off, None).await;
            record(&mut report, EffectKind::Relay(target), result);
        }
        record(&mut report, EffectKind::Audio, drivers.audio.stop().await);
        record(
            &mut report,
            EffectKind::Light,
            drivers.light.set_state(Rgb::BLACK, false, 0).await,
        );

        if let Err(error) = drivers.motor.force_idle().await {
            error!(%error, "Motor force_idle failed during idle restoration");
            report.motor_unsafe = true;
            report.failures.push(EffectFailure {
                kind: EffectKind::Motor,
                error,
            });
        }

        debug!(failures = report.failures.len(), "Idle restoration done");
        report
    }
}

/// Hand one command to its driver
async fn dispatch(drivers: &DriverSet, effect: &EffectCommand) -> DriverResult<()> {
    match effect {
        EffectCommand::Light(light) => {
            drivers
                .light
                .set_state(light.color, light.flash, light.flash_amount)
                .await
        }
        EffectCommand::Audio(audio) => drivers.audio.play(&audio.file_key, audio.volume).await,
        EffectCommand::Motor(motor) => drivers.motor.drive(motor.action, motor.duration).await,
        EffectCommand::Relay(relay) => {
            drivers
                .relays
                .set_state(relay.target, relay.state, relay.duration)
                .await
        }
    }
}

fn record(report: &mut IdleReport, kind: EffectKind, result: DriverResult<()>) {
    if let Err(error) = result {
        warn!(driver = %kind, %error, "Idle restoration command failed");
        report.failures.push(EffectFailure { kind, error });
    }
}

/// Log the start of a step at its declared level
fn announce(scene: &Scene, step: &Step) {
    let Some(log) = &step.log else {
        info!(scene = %scene.key, step = step.index, "Step {}: {}", step.index, step.name);
        return;
    };

    match log.level {
        LogLevel::Debug => debug!(scene = %scene.key, step = step.index, "{}", log.message),
        LogLevel::Info => info!(scene = %scene.key, step = step.index, "{}", log.message),
        LogLevel::Warning => warn!(scene = %scene.key, step = step.index, "{}", log.message),
        LogLevel::Error => error!(scene = %scene.key, step = step.index, "{}", log.message),
    }
}
