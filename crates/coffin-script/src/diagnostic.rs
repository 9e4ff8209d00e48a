//! Emergency test: exercise every driver once with nominal parameters

use crate::abort::AbortSignal;
use crate::executor::SceneExecutor;
use crate::result::IdleReport;
use coffin_core::{MotorAction, RelayState, RelayTarget, Rgb};
use coffin_drivers::{DriverError, DriverResult};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

const AUDIO_VOLUME: f32 = 0.5;
const AUDIO_PLAY_TIME: Duration = Duration::from_secs(2);
const MOTOR_TIME: Duration = Duration::from_secs(1);
const RELAY_TIME: Duration = Duration::from_secs(1);

/// Result of a single check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check: String,
    pub passed: bool,
    pub detail: String,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "ok" } else { "FAILED" };
        write!(f, "{:<16} {:<6} {}", self.check, status, self.detail)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticReport {
    pub checks: Vec<CheckOutcome>,
    pub idle: IdleReport,
    /// Operator abort cut the run short; later checks never ran
    pub aborted: bool,
}

impl DiagnosticReport {
    /// Every check ran and passed, and the rig is idle
    pub fn passed(&self) -> bool {
        !self.aborted && !self.has_failures()
    }

    /// A check that ran failed, or idle restoration failed
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|check| !check.passed) || !self.idle.is_clean()
    }

    fn push(&mut self, check: impl Into<String>, result: DriverResult<String>) {
        let check = check.into();
        let outcome = match result {
            Ok(detail) => {
                info!(check = %check, %detail, "Diagnostic check passed");
                CheckOutcome {
                    check,
                    passed: true,
                    detail,
                }
            }
            Err(error) => {
                warn!(check = %check, %error, "Diagnostic check failed");
                CheckOutcome {
                    check,
                    passed: false,
                    detail: error.to_string(),
                }
            }
        };
        self.checks.push(outcome);
    }
}

/// Run every driver once, then restore idle.
///
/// `audio_key` is the clip used for the audio check; the check is reported
/// as failed when no clip is configured. An operator abort cancels the
/// running check and skips the rest, but idle is still restored.
pub async fn run_diagnostic(executor: &SceneExecutor, audio_key: Option<&str>) -> DiagnosticReport {
    let mut report = DiagnosticReport::default();
    let mut abort = executor.abort_signal();
    info!("Running hardware diagnostic");

    if run_checks(executor, audio_key, &mut report, &mut abort)
        .await
        .is_none()
    {
        warn!(completed = report.checks.len(), "Diagnostic aborted by operator");
        report.aborted = true;
    }

    report.idle = executor.restore_idle().await;

    if report.passed() {
        info!(checks = report.checks.len(), "Diagnostic passed");
    } else if report.has_failures() {
        warn!(
            failed = report.checks.iter().filter(|check| !check.passed).count(),
            "Diagnostic found problems"
        );
    }
    report
}

/// Returns `None` as soon as the operator aborts
async fn run_checks(
    executor: &SceneExecutor,
    audio_key: Option<&str>,
    report: &mut DiagnosticReport,
    abort: &mut AbortSignal,
) -> Option<()> {
    let drivers = executor.drivers();

    for sensor in &drivers.sensors {
        let reading = guarded(abort, async {
            let distance = sensor.read_distance().await?;
            Ok::<_, DriverError>(format!("{distance:.1} cm"))
        })
        .await?;
        report.push(format!("sensor {}", sensor.name()), reading);
    }

    let light = guarded(abort, async {
        drivers.light.set_state(Rgb::RED, false, 0).await?;
        Ok::<_, DriverError>(format!("{}", Rgb::RED))
    })
    .await?;
    report.push("light", light);

    let audio = match audio_key {
        Some(key) => {
            guarded(abort, async {
                play_briefly(executor, key).await?;
                Ok::<_, DriverError>(format!("{key} at {AUDIO_VOLUME}"))
            })
            .await?
        }
        None => Err(DriverError::Failed("no audio files configured".to_string())),
    };
    report.push("audio", audio);

    let motor = guarded(abort, async {
        drivers.motor.drive(MotorAction::Open, MOTOR_TIME).await?;
        drivers.motor.drive(MotorAction::Close, MOTOR_TIME).await?;
        Ok::<_, DriverError>(format!("open/close {}s", MOTOR_TIME.as_secs()))
    })
    .await?;
    report.push("motor", motor);

    for target in RelayTarget::ALL {
        let relay = guarded(abort, async {
            drivers
                .relays
                .set_state(target, RelayState::On, Some(RELAY_TIME))
                .await?;
            Ok::<_, DriverError>(format!("on {}s", RELAY_TIME.as_secs()))
        })
        .await?;
        report.push(format!("relay {target}"), relay);
    }

    Some(())
}

/// Race one check against the abort signal
async fn guarded<F>(abort: &mut AbortSignal, check: F) -> Option<DriverResult<String>>
where
    F: Future<Output = DriverResult<String>>,
{
    tokio::select! {
        biased;
        _ = abort.aborted() => None,
        result = check => Some(result),
    }
}

async fn play_briefly(executor: &SceneExecutor, key: &str) -> DriverResult<()> {
    let audio = &executor.drivers().audio;
    audio.play(key, AUDIO_VOLUME).await?;
    tokio::time::sleep(AUDIO_PLAY_TIME).await;
    audio.stop().await
}
