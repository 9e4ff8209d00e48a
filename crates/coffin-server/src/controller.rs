//! Controller glue
//!
//! Owns the scene executor and the scene picker, runs the detection loop,
//! and turns a trigger into a scene run.

use async_trait::async_trait;
use coffin_config::CoffinConfig;
use coffin_detection::{LogTrigger, ProximityMonitor, TriggerHandler};
use coffin_drivers::DriverSet;
use coffin_script::{
    find, run_diagnostic, AbortHandle, DiagnosticReport, SceneError, SceneExecutor, ScenePicker,
    SceneResult, SelectionResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

pub struct Controller {
    config: CoffinConfig,
    executor: SceneExecutor,
    /// Only scene-playing commands need a pick; maintenance and diagnose
    /// work on a catalog without scenes
    picker: SelectionResult<ScenePicker>,
    abort: AbortHandle,
    /// Set once a safety recovery failed
    unsafe_rig: AtomicBool,
}

impl Controller {
    pub fn new(config: CoffinConfig, drivers: DriverSet, abort: AbortHandle) -> Self {
        let picker = ScenePicker::from_settings(&config.settings, &config.catalog);
        let executor =
            SceneExecutor::new(drivers, abort.signal()).with_cleanup(config.cleanup.clone());

        Self {
            config,
            executor,
            picker,
            abort,
            unsafe_rig: AtomicBool::new(false),
        }
    }

    pub fn is_unsafe(&self) -> bool {
        self.unsafe_rig.load(Ordering::SeqCst)
    }

    pub fn picker(&self) -> SelectionResult<&ScenePicker> {
        self.picker.as_ref().map_err(Clone::clone)
    }

    /// Run one scene by name, bypassing the detection loop and its cooldown
    pub async fn run_scene(&self, name: &str) -> Result<SceneResult, SceneError> {
        let scene = find(&self.config.catalog, name)?;
        let result = self.executor.run(scene).await;
        self.observe(&result);
        Ok(result)
    }

    /// Run one scene picked at random from the pool
    pub async fn run_random(&self) -> Result<SceneResult, SceneError> {
        let name = self.picker()?.random().to_string();
        info!(scene = %name, "Randomly selected scene");
        self.run_scene(&name).await
    }

    /// Run the setup sequence, then detect and play until aborted.
    ///
    /// Fails before touching the rig when no scene can be picked.
    pub async fn monitor(&self) -> SelectionResult<()> {
        let picker = self.picker()?;
        info!(random = picker.is_random(), "Starting Halloween coffin");

        if let Some(setup) = &self.config.setup {
            info!("Running setup sequence");
            let result = self.executor.run(setup).await;
            self.observe(&result);
            if self.is_unsafe() {
                return Ok(());
            }
        }

        let drivers = self.executor.drivers();
        let mut monitor = ProximityMonitor::new(self.config.detection.clone(), drivers.sensors.clone());
        monitor.run(self, self.abort.signal()).await;
        Ok(())
    }

    /// Detection loop with scene playback disabled
    pub async fn maintenance(&self) {
        info!("Maintenance mode: sensors only, no scenes will play");
        let drivers = self.executor.drivers();
        let mut monitor = ProximityMonitor::new(self.config.detection.clone(), drivers.sensors.clone());
        monitor.run(&LogTrigger, self.abort.signal()).await;
    }

    pub async fn diagnose(&self) -> DiagnosticReport {
        let audio_key = self.config.hardware.audio.files.keys().next().map(String::as_str);
        run_diagnostic(&self.executor, audio_key).await
    }

    /// Stop everything when the rig is no longer safe to run unattended
    fn observe(&self, result: &SceneResult) {
        if result.unsafe_rig {
            error!(
                scene = %result.scene,
                run_id = %result.run_id,
                "Motor could not be forced idle; stopping the controller"
            );
            self.unsafe_rig.store(true, Ordering::SeqCst);
            self.abort.abort();
        } else if !result.cleanup.is_clean() {
            warn!(
                scene = %result.scene,
                failures = result.cleanup.failures.len(),
                "Idle restoration incomplete"
            );
        }
    }
}

#[async_trait]
impl TriggerHandler for Controller {
    async fn on_trigger(&self, distance: f64) {
        let name = match self.picker() {
            Ok(picker) => picker.next().to_string(),
            Err(e) => {
                error!(error = %e, distance, "Guest detected but no scene to play");
                return;
            }
        };
        info!(scene = %name, distance, "Guest detected");

        if let Err(e) = self.run_scene(&name).await {
            error!(error = %e, "Could not play scene");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffin_drivers::mock::{Call, FailPoint, MockRig};
    use coffin_script::abort_pair;
    use std::time::Duration;

    const CONFIG: &str = r#"
hardware:
  audio:
    files:
      creepy: creepy.mp3
detection:
  distance_threshold_near: 50
  sample_interval: 0.5
  cooldown_after_sequence: 10
settings:
  random_scene_mode: true
  random_scene_list: [scare]
scenes:
  scare:
    name: Scare
    steps:
      - step: 1
        duration: 2
        effects:
          motor: {action: open, duration: 2}
          audio: {file: creepy}
  calm:
    name: Calm
    steps:
      - step: 1
        duration: 1
        effects:
          lights: {color: [0, 255, 0]}
setup_sequence:
  - step: 1
    duration: 1
    effects:
      motor: {action: close, duration: 1}
"#;

    fn controller(rig: &MockRig) -> (Controller, AbortHandle) {
        let config = CoffinConfig::from_yaml_str(CONFIG).unwrap();
        let (handle, _) = abort_pair();
        let controller = Controller::new(config, rig.drivers(), handle.clone());
        (controller, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_run_by_name() {
        let rig = MockRig::new();
        let (controller, _) = controller(&rig);

        let result = controller.run_scene("calm").await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.name, "Calm");
        assert!(rig.is_idle());
        assert_eq!(
            controller.run_scene("ghost").await.unwrap_err(),
            SceneError::UnknownScene("ghost".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_uses_pool() {
        let rig = MockRig::new();
        let (controller, _) = controller(&rig);

        for _ in 0..5 {
            assert_eq!(controller.run_random().await.unwrap().scene, "scare");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_plays_picked_scene() {
        let rig = MockRig::new();
        let (controller, _) = controller(&rig);

        controller.on_trigger(30.0).await;

        assert!(rig.calls().iter().any(|record| record.call
            == Call::Play {
                file_key: "creepy".to_string(),
                volume: 0.7
            }));
        assert!(!controller.is_unsafe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsafe_rig_stops_controller() {
        let rig = MockRig::new();
        rig.fail_always(FailPoint::Drive);
        rig.fail_always(FailPoint::ForceIdle);
        let (controller, handle) = controller(&rig);

        controller.on_trigger(30.0).await;

        assert!(controller.is_unsafe());
        assert!(handle.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_runs_setup_then_triggers() {
        let rig = MockRig::new();
        rig.sensor(0).set_fallback(Ok(20.0));
        let (controller, handle) = controller(&rig);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.abort();
        });
        controller.monitor().await.unwrap();
        stopper.await.unwrap();

        let calls = rig.calls();
        assert_eq!(
            calls[0].call,
            Call::Drive {
                action: coffin_core::MotorAction::Close,
                duration: Duration::from_secs(1)
            }
        );
        let scares = calls
            .iter()
            .filter(|record| matches!(record.call, Call::Play { .. }))
            .count();
        assert_eq!(scares, 1);
        assert!(rig.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_scenes_still_allows_maintenance_and_diagnose() {
        let rig = MockRig::new();
        let config = CoffinConfig::from_yaml_str("detection: {distance_threshold_near: 50}\n").unwrap();
        let (handle, _) = abort_pair();
        let controller = Controller::new(config, rig.drivers(), handle.clone());

        assert_eq!(controller.picker().unwrap_err(), SceneError::EmptyPool);
        assert_eq!(controller.run_random().await.unwrap_err(), SceneError::EmptyPool);
        assert_eq!(controller.monitor().await.unwrap_err(), SceneError::EmptyPool);
        assert!(rig.calls().is_empty());

        let report = controller.diagnose().await;
        assert!(!report.aborted);
        assert_eq!(report.checks.len(), 7);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            handle.abort();
        });
        controller.maintenance().await;
        stopper.await.unwrap();
        assert!(rig.sensor(0).reads() > 1);
    }
}
