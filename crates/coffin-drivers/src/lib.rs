//! Effect drivers
//!
//! Each hardware family exposes a small capability trait; the scene engine
//! and the detection loop only ever see these traits, bundled in a
//! [`DriverSet`] passed in at construction.
//!
//! # Implementations
//!
//! - [`govee::GoveeLight`] - Govee LAN API over UDP
//! - [`audio::ProcessAudioPlayer`] - external player process per clip
//! - [`gpio`] - sysfs GPIO motor, relays and HC-SR04 rangers
//! - [`simulated`] - logging-only rig for dry runs
//! - [`mock`] - recording rig with failure injection for tests

pub mod audio;
mod error;
pub mod govee;
pub mod gpio;
pub mod mock;
pub mod simulated;
mod traits;

pub use error::{DriverError, DriverResult};
pub use traits::{AudioDriver, DistanceSensor, DriverSet, LightDriver, MotorDriver, RelayDriver};

use coffin_core::HardwareConfig;
use std::sync::Arc;
use tracing::info;

/// Open every real device described by the hardware section
pub async fn connect(hardware: &HardwareConfig) -> DriverResult<DriverSet> {
    let root = hardware.gpio_root.as_path();

    let light = govee::GoveeLight::connect(&hardware.lights.govee).await?;
    let audio = audio::ProcessAudioPlayer::new(hardware.audio.clone());
    let motor = gpio::GpioMotor::open(root, &hardware.motor)?;
    let relays = gpio::GpioRelays::open(root, &hardware.relays)?;
    let sensor_1 = gpio::UltrasonicSensor::open(root, "ultrasonic_1", &hardware.sensors.ultrasonic_1)?;
    let sensor_2 = gpio::UltrasonicSensor::open(root, "ultrasonic_2", &hardware.sensors.ultrasonic_2)?;

    info!(gpio_root = %root.display(), govee = %hardware.lights.govee.ip, "Hardware drivers ready");

    Ok(DriverSet {
        light: Arc::new(light),
        audio: Arc::new(audio),
        motor: Arc::new(motor),
        relays: Arc::new(relays),
        sensors: [Arc::new(sensor_1), Arc::new(sensor_2)],
    })
}
