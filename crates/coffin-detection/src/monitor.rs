//! Polling loop over the two rangers

use crate::state::{DetectionPhase, DetectionState, InvalidTransition};
use async_trait::async_trait;
use coffin_core::DetectionConfig;
use coffin_drivers::DistanceSensor;
use coffin_script::AbortSignal;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

const FAILURE_WARN_EVERY: u32 = 20;

/// Receives trigger events. The loop suspends until the handler returns.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn on_trigger(&self, distance: f64);
}

/// Handler for maintenance mode: the trigger is only logged
#[derive(Debug, Default)]
pub struct LogTrigger;

#[async_trait]
impl TriggerHandler for LogTrigger {
    async fn on_trigger(&self, distance: f64) {
        info!(distance, "Trigger detected (maintenance mode, no scene played)");
    }
}

/// What a single poll tick decided
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Nobody near
    Quiet { distance: f64 },
    /// Inside the far threshold but not close enough to trigger
    Approaching { distance: f64 },
    /// A scene was triggered and has finished
    Triggered { distance: f64 },
    /// Close reading ignored because of the cooldown
    CoolingDown { distance: f64 },
}

/// Proximity detection loop
pub struct ProximityMonitor {
    config: DetectionConfig,
    sensors: [Arc<dyn DistanceSensor>; 2],
    state: DetectionState,
    cooldown_until: Option<Instant>,
    /// Consecutive exhausted reads per sensor
    streaks: [u32; 2],
}

impl ProximityMonitor {
    pub fn new(config: DetectionConfig, sensors: [Arc<dyn DistanceSensor>; 2]) -> Self {
        Self {
            config,
            sensors,
            state: DetectionState::default(),
            cooldown_until: None,
            streaks: [0; 2],
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    /// Poll until `shutdown` fires
    pub async fn run(&mut self, handler: &dyn TriggerHandler, mut shutdown: AbortSignal) {
        let mut ticker = tokio::time::interval(self.config.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            near = self.config.near_threshold,
            far = self.config.far_threshold,
            interval_secs = self.config.sample_interval.as_secs_f64(),
            "Proximity monitoring started"
        );

        loop {
            tokio::select! {
                _ = shutdown.aborted() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick(handler).await {
                error!(error = %e, "Detection phase error");
            }

            if shutdown.is_aborted() {
                break;
            }
        }

        info!(
            triggers = self.state.triggers,
            sensor_failures = self.state.total_failures,
            "Proximity monitoring stopped"
        );
    }

    /// One poll: sample both sensors and trigger if allowed
    pub async fn tick(&mut self, handler: &dyn TriggerHandler) -> Result<TickOutcome, InvalidTransition> {
        if self.state.phase() == DetectionPhase::Cooldown {
            let elapsed = self
                .cooldown_until
                .map_or(true, |until| Instant::now() >= until);
            if elapsed {
                self.state.transition(DetectionPhase::Idle)?;
                self.cooldown_until = None;
                info!("Cooldown over, monitoring");
            }
        }

        let distance = self.sample().await;

        if distance.is_nan() || distance > self.config.near_threshold {
            if distance <= self.config.far_threshold {
                if self.state.phase().can_trigger() {
                    info!(distance, "Someone approaching");
                }
                return Ok(TickOutcome::Approaching { distance });
            }
            trace!(distance, "Nobody near");
            return Ok(TickOutcome::Quiet { distance });
        }

        if !self.state.phase().can_trigger() {
            debug!(distance, phase = ?self.state.phase(), "Close reading ignored");
            return Ok(TickOutcome::CoolingDown { distance });
        }

        self.state.transition(DetectionPhase::Triggered)?;
        self.state.triggers += 1;
        info!(distance, trigger = self.state.triggers, "Trigger");

        handler.on_trigger(distance).await;

        self.state.transition(DetectionPhase::Cooldown)?;
        self.cooldown_until = Some(Instant::now() + self.config.cooldown_after_sequence);
        info!(
            cooldown_secs = self.config.cooldown_after_sequence.as_secs_f64(),
            "Cooling down"
        );

        Ok(TickOutcome::Triggered { distance })
    }

    /// Read both sensors one after the other and return the closer distance.
    ///
    /// A sensor whose attempts all fail reports the safe distance.
    pub async fn sample(&mut self) -> f64 {
        let mut exhausted = 0;
        let mut readings = [self.config.default_safe_distance; 2];

        for (index, reading) in readings.iter_mut().enumerate() {
            match self.read_with_retries(index).await {
                Some(distance) => {
                    *reading = distance;
                    self.streaks[index] = 0;
                }
                None => {
                    exhausted += 1;
                    self.streaks[index] += 1;
                    self.report_exhausted(index);
                }
            }
        }

        self.state.last_distance_1 = Some(readings[0]);
        self.state.last_distance_2 = Some(readings[1]);

        if exhausted == 0 {
            self.state.consecutive_failures = 0;
        } else {
            self.state.consecutive_failures += exhausted;
            self.state.total_failures += u64::from(exhausted);
        }

        readings[0].min(readings[1])
    }

    async fn read_with_retries(&self, index: usize) -> Option<f64> {
        let sensor = &self.sensors[index];
        let attempts = self.config.max_retries + 1;

        for attempt in 1..=attempts {
            match sensor.read_distance().await {
                Ok(distance) if distance.is_finite() && distance >= 0.0 => {
                    trace!(sensor = sensor.name(), distance, "Sensor read");
                    return Some(distance);
                }
                Ok(distance) => {
                    trace!(sensor = sensor.name(), attempt, distance, "Sensor read rejected");
                }
                Err(error) => {
                    trace!(sensor = sensor.name(), attempt, %error, "Sensor read failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        None
    }

    /// Debug on every exhausted read, warn on every 20th in a row
    fn report_exhausted(&self, index: usize) -> bool {
        let sensor = self.sensors[index].name();
        let streak = self.streaks[index];
        if streak % FAILURE_WARN_EVERY == 0 {
            warn!(sensor, consecutive_failures = streak, "Sensor keeps failing");
            true
        } else {
            debug!(
                sensor,
                fallback = self.config.default_safe_distance,
                "Sensor read failed, using safe distance"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffin_drivers::mock::MockRig;
    use std::time::Duration;

    struct Counting(std::sync::Mutex<u32>);

    #[async_trait]
    impl TriggerHandler for Counting {
        async fn on_trigger(&self, _distance: f64) {
            *self.0.lock().unwrap() += 1;
        }
    }

    fn monitor(rig: &MockRig) -> ProximityMonitor {
        let config = DetectionConfig {
            retry_delay: Duration::from_millis(10),
            cooldown_after_sequence: Duration::from_secs(5),
            ..DetectionConfig::default()
        };
        ProximityMonitor::new(config, rig.drivers().sensors)
    }

    #[tokio::test(start_paused = true)]
    async fn test_closer_sensor_governs() {
        let rig = MockRig::new();
        rig.sensor(0).set_fallback(Ok(400.0));
        rig.sensor(1).set_fallback(Ok(120.0));
        let mut monitor = monitor(&rig);

        assert_eq!(monitor.sample().await, 120.0);
        assert_eq!(monitor.state().last_distance_1, Some(400.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_readings_count_as_failures() {
        let rig = MockRig::new();
        rig.sensor(0).set_fallback(Ok(-1.0));
        rig.sensor(1).set_fallback(Ok(f64::NAN));
        let mut monitor = monitor(&rig);

        assert_eq!(monitor.sample().await, 200.0);
        assert_eq!(monitor.state().consecutive_failures, 2);
        assert_eq!(rig.sensor(0).reads(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approaching_does_not_trigger() {
        let rig = MockRig::new();
        rig.sensor(0).set_fallback(Ok(100.0));
        let mut monitor = monitor(&rig);
        let handler = Counting(std::sync::Mutex::new(0));

        let outcome = monitor.tick(&handler).await.unwrap();

        assert_eq!(outcome, TickOutcome::Approaching { distance: 100.0 });
        assert_eq!(*handler.0.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_blocks_then_releases() {
        let rig = MockRig::new();
        rig.sensor(0).set_fallback(Ok(30.0));
        let mut monitor = monitor(&rig);
        let handler = Counting(std::sync::Mutex::new(0));

        assert_eq!(
            monitor.tick(&handler).await.unwrap(),
            TickOutcome::Triggered { distance: 30.0 }
        );
        assert_eq!(monitor.state().phase(), DetectionPhase::Cooldown);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            monitor.tick(&handler).await.unwrap(),
            TickOutcome::CoolingDown { distance: 30.0 }
        );

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(
            monitor.tick(&handler).await.unwrap(),
            TickOutcome::Triggered { distance: 30.0 }
        );
        assert_eq!(*handler.0.lock().unwrap(), 2);
        assert_eq!(monitor.state().triggers, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nan_safe_distance_never_triggers() {
        let rig = MockRig::new();
        let timeout = || coffin_drivers::DriverError::Timeout {
            device: "ultrasonic".to_string(),
        };
        rig.sensor(0).set_fallback(Err(timeout()));
        rig.sensor(1).set_fallback(Err(timeout()));
        let config = DetectionConfig {
            default_safe_distance: f64::NAN,
            retry_delay: Duration::from_millis(10),
            ..DetectionConfig::default()
        };
        let mut monitor = ProximityMonitor::new(config, rig.drivers().sensors);
        let handler = Counting(std::sync::Mutex::new(0));

        let outcome = monitor.tick(&handler).await.unwrap();

        assert!(matches!(outcome, TickOutcome::Quiet { distance } if distance.is_nan()));
        assert_eq!(*handler.0.lock().unwrap(), 0);
        assert_eq!(monitor.state().phase(), DetectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_warning_counts_each_sensor() {
        let rig = MockRig::new();
        rig.sensor(0).set_fallback(Err(coffin_drivers::DriverError::Timeout {
            device: "ultrasonic_1".to_string(),
        }));
        let mut monitor = monitor(&rig);

        for _ in 0..19 {
            monitor.sample().await;
        }
        assert_eq!(monitor.streaks, [19, 0]);
        assert!(!monitor.report_exhausted(0));

        monitor.sample().await;
        assert_eq!(monitor.streaks, [20, 0]);
        assert!(monitor.report_exhausted(0));

        rig.sensor(0).set_fallback(Ok(300.0));
        monitor.sample().await;
        assert_eq!(monitor.streaks, [0, 0]);
        assert_eq!(monitor.state().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_dead_sensors_warn_on_their_own_streaks() {
        let rig = MockRig::new();
        let timeout = || coffin_drivers::DriverError::Timeout {
            device: "ultrasonic".to_string(),
        };
        rig.sensor(0).set_fallback(Err(timeout()));
        rig.sensor(1).set_fallback(Err(timeout()));
        let mut monitor = monitor(&rig);

        for _ in 0..10 {
            monitor.sample().await;
        }

        // Twenty failures in total, but only ten in a row per sensor
        assert_eq!(monitor.state().consecutive_failures, 20);
        assert_eq!(monitor.streaks, [10, 10]);
        assert!(!monitor.report_exhausted(0));
        assert!(!monitor.report_exhausted(1));
    }
}
