//! Detection loop behavior over virtual time

use async_trait::async_trait;
use coffin_core::DetectionConfig;
use coffin_detection::{DetectionPhase, ProximityMonitor, TickOutcome, TriggerHandler};
use coffin_drivers::mock::MockRig;
use coffin_drivers::DriverError;
use coffin_script::abort_pair;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Records trigger times and pretends to play a scene
struct SceneStandIn {
    play_time: Duration,
    triggers: Mutex<Vec<(Instant, f64)>>,
}

impl SceneStandIn {
    fn new(play_time: Duration) -> Self {
        Self {
            play_time,
            triggers: Mutex::new(Vec::new()),
        }
    }

    fn triggers(&self) -> Vec<(Instant, f64)> {
        self.triggers.lock().unwrap().clone()
    }
}

#[async_trait]
impl TriggerHandler for SceneStandIn {
    async fn on_trigger(&self, distance: f64) {
        self.triggers.lock().unwrap().push((Instant::now(), distance));
        tokio::time::sleep(self.play_time).await;
    }
}

fn config() -> DetectionConfig {
    DetectionConfig {
        near_threshold: 50.0,
        far_threshold: 150.0,
        sample_interval: Duration::from_millis(500),
        max_retries: 3,
        retry_delay: Duration::from_millis(100),
        default_safe_distance: 200.0,
        cooldown_after_sequence: Duration::from_secs(10),
    }
}

fn timeout(device: &str) -> DriverError {
    DriverError::Timeout {
        device: device.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_trigger_while_both_sensors_far() {
    let rig = MockRig::new();
    rig.sensor(0).set_fallback(Ok(51.0));
    rig.sensor(1).set_fallback(Ok(900.0));
    let mut monitor = ProximityMonitor::new(config(), rig.drivers().sensors);
    let handler = SceneStandIn::new(Duration::from_secs(1));

    for _ in 0..50 {
        let outcome = monitor.tick(&handler).await.unwrap();
        assert!(!matches!(outcome, TickOutcome::Triggered { .. }));
    }

    assert!(handler.triggers().is_empty());
    assert_eq!(monitor.state().phase(), DetectionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dead_sensors_fall_back_to_safe_distance() {
    let rig = MockRig::new();
    rig.sensor(0).set_fallback(Err(timeout("ultrasonic_1")));
    rig.sensor(1).set_fallback(Err(timeout("ultrasonic_2")));
    let mut monitor = ProximityMonitor::new(config(), rig.drivers().sensors);
    let handler = SceneStandIn::new(Duration::from_secs(1));

    for _ in 0..10 {
        assert_eq!(
            monitor.tick(&handler).await.unwrap(),
            TickOutcome::Quiet { distance: 200.0 }
        );
    }

    assert!(handler.triggers().is_empty());
    assert_eq!(monitor.state().consecutive_failures, 20);
    assert_eq!(monitor.state().total_failures, 20);
    // One read plus three retries per tick
    assert_eq!(rig.sensor(0).reads(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_one_dead_sensor_still_lets_the_other_trigger() {
    let rig = MockRig::new();
    rig.sensor(0).set_fallback(Err(timeout("ultrasonic_1")));
    rig.sensor(1).set_fallback(Ok(35.0));
    let mut monitor = ProximityMonitor::new(config(), rig.drivers().sensors);
    let handler = SceneStandIn::new(Duration::from_secs(1));

    let outcome = monitor.tick(&handler).await.unwrap();

    assert_eq!(outcome, TickOutcome::Triggered { distance: 35.0 });
    assert_eq!(monitor.state().last_distance_1, Some(200.0));
    assert_eq!(monitor.state().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_reading() {
    let rig = MockRig::new();
    rig.sensor(0).push([
        Err(timeout("ultrasonic_1")),
        Err(timeout("ultrasonic_1")),
        Ok(40.0),
    ]);
    let mut monitor = ProximityMonitor::new(config(), rig.drivers().sensors);
    let handler = SceneStandIn::new(Duration::from_secs(1));

    let outcome = monitor.tick(&handler).await.unwrap();

    assert_eq!(outcome, TickOutcome::Triggered { distance: 40.0 });
    assert_eq!(monitor.state().consecutive_failures, 0);
    assert_eq!(rig.sensor(0).reads(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_phase_reaches_cooldown_after_handler_returns() {
    let rig = MockRig::new();
    rig.sensor(0).set_fallback(Ok(20.0));
    let mut monitor = ProximityMonitor::new(config(), rig.drivers().sensors);
    let handler = SceneStandIn::new(Duration::from_secs(8));

    let start = Instant::now();
    monitor.tick(&handler).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(8));
    assert_eq!(monitor.state().phase(), DetectionPhase::Cooldown);
    assert_eq!(monitor.state().triggers, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_honors_cooldown() {
    let rig = MockRig::new();
    rig.sensor(0).set_fallback(Ok(30.0));
    let mut monitor = ProximityMonitor::new(config(), rig.drivers().sensors);
    let handler = SceneStandIn::new(Duration::from_secs(5));
    let (handle, signal) = abort_pair();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(28)).await;
        handle.abort();
    });

    monitor.run(&handler, signal).await;
    tokio_test::assert_ok!(stopper.await);

    // Trigger at 0, scene until 5, cooldown until 15, trigger again, then
    // scene until 20 and cooldown past the end of the run
    let triggers = handler.triggers();
    assert_eq!(triggers.len(), 2);
    let gap = triggers[1].0 - triggers[0].0;
    assert!(gap >= Duration::from_secs(15), "{gap:?}");
    assert!(gap < Duration::from_secs(16), "{gap:?}");
    assert_eq!(monitor.state().phase(), DetectionPhase::Cooldown);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_on_abort() {
    let rig = MockRig::new();
    let mut monitor = ProximityMonitor::new(config(), rig.drivers().sensors);
    let handler = SceneStandIn::new(Duration::from_secs(1));
    let (handle, signal) = abort_pair();
    handle.abort();

    monitor.run(&handler, signal).await;

    assert!(handler.triggers().is_empty());
    assert!(rig.sensor(0).reads() <= 1);
}
