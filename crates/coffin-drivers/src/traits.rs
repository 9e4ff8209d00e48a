//! Driver capability contracts

use crate::DriverResult;
use async_trait::async_trait;
use coffin_core::{MotorAction, RelayState, RelayTarget, Rgb};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Networked RGB light
#[async_trait]
pub trait LightDriver: Send + Sync {
    /// Apply a color and optionally flash `flash_count` times.
    ///
    /// Black without flashing switches the light off. Returns once the
    /// flashing is done.
    async fn set_state(&self, color: Rgb, flash: bool, flash_count: u32) -> DriverResult<()>;
}

/// Single audio channel
#[async_trait]
pub trait AudioDriver: Send + Sync {
    /// Start playing a clip; returns as soon as playback has started
    async fn play(&self, file_key: &str, volume: f32) -> DriverResult<()>;

    /// Stop whatever is playing. Stopping silence is not an error.
    async fn stop(&self) -> DriverResult<()>;
}

/// Lid motor behind an H-bridge
#[async_trait]
pub trait MotorDriver: Send + Sync {
    /// Run the motor in one direction for `duration`, then stop
    async fn drive(&self, action: MotorAction, duration: Duration) -> DriverResult<()>;

    /// De-energize both directions immediately. Last-resort safety call.
    async fn force_idle(&self) -> DriverResult<()>;
}

/// Relay bank (skull and smoke machine)
#[async_trait]
pub trait RelayDriver: Send + Sync {
    /// Switch one relay. With `duration`, an `On` reverts to off after that
    /// long and the call returns only then.
    async fn set_state(
        &self,
        target: RelayTarget,
        state: RelayState,
        duration: Option<Duration>,
    ) -> DriverResult<()>;
}

/// Ultrasonic ranger
#[async_trait]
pub trait DistanceSensor: Send + Sync {
    /// Identity used in logs
    fn name(&self) -> &str;

    /// One distance sample in centimeters
    async fn read_distance(&self) -> DriverResult<f64>;
}

/// Every driver of the rig, passed explicitly into the engine and the loop
#[derive(Clone)]
pub struct DriverSet {
    pub light: Arc<dyn LightDriver>,
    pub audio: Arc<dyn AudioDriver>,
    pub motor: Arc<dyn MotorDriver>,
    pub relays: Arc<dyn RelayDriver>,
    pub sensors: [Arc<dyn DistanceSensor>; 2],
}

impl fmt::Debug for DriverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverSet")
            .field("sensors", &[self.sensors[0].name(), self.sensors[1].name()])
            .finish_non_exhaustive()
    }
}
