//! Logging-only rig used by `--dry-run`
//!
//! Every call is logged and takes the time the real device would take for
//! timed commands, so scene timing can be checked without hardware.

use crate::{AudioDriver, DistanceSensor, DriverResult, DriverSet, LightDriver, MotorDriver, RelayDriver};
use async_trait::async_trait;
use coffin_core::{MotorAction, RelayState, RelayTarget, Rgb};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Drivers that only log
#[derive(Debug, Default)]
pub struct SimulatedDevices;

#[async_trait]
impl LightDriver for SimulatedDevices {
    async fn set_state(&self, color: Rgb, flash: bool, flash_count: u32) -> DriverResult<()> {
        info!(target: "coffin::simulated", %color, flash, flash_count, "light");
        Ok(())
    }
}

#[async_trait]
impl AudioDriver for SimulatedDevices {
    async fn play(&self, file_key: &str, volume: f32) -> DriverResult<()> {
        info!(target: "coffin::simulated", clip = %file_key, volume, "audio play");
        Ok(())
    }

    async fn stop(&self) -> DriverResult<()> {
        info!(target: "coffin::simulated", "audio stop");
        Ok(())
    }
}

#[async_trait]
impl MotorDriver for SimulatedDevices {
    async fn drive(&self, action: MotorAction, duration: Duration) -> DriverResult<()> {
        info!(target: "coffin::simulated", ?action, duration = duration.as_secs_f64(), "motor");
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn force_idle(&self) -> DriverResult<()> {
        info!(target: "coffin::simulated", "motor idle");
        Ok(())
    }
}

#[async_trait]
impl RelayDriver for SimulatedDevices {
    async fn set_state(
        &self,
        target: RelayTarget,
        state: RelayState,
        duration: Option<Duration>,
    ) -> DriverResult<()> {
        info!(target: "coffin::simulated", relay = %target, ?state, "relay");
        if let (RelayState::On, Some(duration)) = (state, duration) {
            tokio::time::sleep(duration).await;
            info!(target: "coffin::simulated", relay = %target, "relay timed off");
        }
        Ok(())
    }
}

/// Ranger that always reports the same distance
#[derive(Debug)]
pub struct FixedDistance {
    name: String,
    distance: f64,
}

impl FixedDistance {
    pub fn new(name: impl Into<String>, distance: f64) -> Self {
        Self {
            name: name.into(),
            distance,
        }
    }
}

#[async_trait]
impl DistanceSensor for FixedDistance {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_distance(&self) -> DriverResult<f64> {
        Ok(self.distance)
    }
}

/// A complete simulated rig whose sensors read `distance`
pub fn rig(distance: f64) -> DriverSet {
    let devices = Arc::new(SimulatedDevices);
    DriverSet {
        light: devices.clone(),
        audio: devices.clone(),
        motor: devices.clone(),
        relays: devices,
        sensors: [
            Arc::new(FixedDistance::new("ultrasonic_1", distance)),
            Arc::new(FixedDistance::new("ultrasonic_2", distance)),
        ],
    }
}
