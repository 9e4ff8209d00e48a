//! Sysfs GPIO drivers: lid motor, relay bank and HC-SR04 rangers
//!
//! Pins are exported and configured once when a driver is opened. Value
//! writes go straight to `gpioN/value`; they never block long enough to
//! warrant a blocking pool, except for the echo timing loop of the
//! rangers which runs on [`tokio::task::spawn_blocking`].

use crate::{DistanceSensor, DriverError, DriverResult, MotorDriver, RelayDriver};
use async_trait::async_trait;
use coffin_core::{MotorAction, MotorConfig, RelayPinConfig, RelayState, RelayTarget, RelaysConfig, SensorPinConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Speed of sound in cm/s at room temperature
const SPEED_OF_SOUND: f64 = 34300.0;

const EXPORT_ATTEMPTS: u32 = 10;
const EXPORT_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// One exported sysfs pin
#[derive(Debug)]
pub struct SysfsPin {
    number: u32,
    dir: PathBuf,
}

impl SysfsPin {
    /// Export the pin if needed and set its direction
    pub fn open(root: &Path, number: u32, direction: Direction) -> DriverResult<Self> {
        let dir = root.join(format!("gpio{number}"));
        let device = format!("gpio{number}");

        if !dir.exists() {
            fs::write(root.join("export"), number.to_string()).map_err(|e| DriverError::io(&device, e))?;

            // udev needs a moment to create the attribute files
            let mut attempts = 0;
            while !dir.join("direction").exists() {
                attempts += 1;
                if attempts >= EXPORT_ATTEMPTS {
                    return Err(DriverError::Timeout { device });
                }
                std::thread::sleep(EXPORT_WAIT);
            }
        }

        fs::write(dir.join("direction"), direction.as_str()).map_err(|e| DriverError::io(&device, e))?;
        trace!(pin = number, direction = direction.as_str(), "GPIO pin configured");

        Ok(Self { number, dir })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn write(&self, high: bool) -> DriverResult<()> {
        fs::write(self.dir.join("value"), if high { "1" } else { "0" })
            .map_err(|e| DriverError::io(format!("gpio{}", self.number), e))
    }

    pub fn read(&self) -> DriverResult<bool> {
        let raw = fs::read_to_string(self.dir.join("value"))
            .map_err(|e| DriverError::io(format!("gpio{}", self.number), e))?;
        Ok(raw.trim() == "1")
    }
}

/// Output pin with a polarity
#[derive(Debug)]
struct OutputPin {
    pin: SysfsPin,
    active_high: bool,
}

impl OutputPin {
    fn open(root: &Path, number: u32, active_high: bool) -> DriverResult<Self> {
        let pin = SysfsPin::open(root, number, Direction::Out)?;
        let output = Self { pin, active_high };
        output.set(false)?;
        Ok(output)
    }

    fn set(&self, on: bool) -> DriverResult<()> {
        self.pin.write(on == self.active_high)
    }
}

/// Lid motor on two H-bridge inputs
pub struct GpioMotor {
    forward: OutputPin,
    reverse: OutputPin,
    busy: Mutex<()>,
}

impl GpioMotor {
    pub fn open(root: &Path, config: &MotorConfig) -> DriverResult<Self> {
        Ok(Self {
            forward: OutputPin::open(root, config.forward_pin, config.active_high)?,
            reverse: OutputPin::open(root, config.reverse_pin, config.active_high)?,
            busy: Mutex::new(()),
        })
    }

    fn idle(&self) -> DriverResult<()> {
        let forward = self.forward.set(false);
        let reverse = self.reverse.set(false);
        forward.and(reverse)
    }
}

#[async_trait]
impl MotorDriver for GpioMotor {
    async fn drive(&self, action: MotorAction, duration: Duration) -> DriverResult<()> {
        let _guard = self.busy.lock().await;

        let (active, opposite) = match action {
            MotorAction::Open => (&self.forward, &self.reverse),
            MotorAction::Close => (&self.reverse, &self.forward),
        };

        // Never energize both inputs
        opposite.set(false)?;
        active.set(true)?;
        debug!(?action, duration = duration.as_secs_f64(), "Motor running");

        tokio::time::sleep(duration).await;

        active.set(false)?;
        debug!(?action, "Motor stopped");
        Ok(())
    }

    async fn force_idle(&self) -> DriverResult<()> {
        self.idle()
    }
}

/// Skull and smoke relays
pub struct GpioRelays {
    skull: OutputPin,
    smoke: OutputPin,
}

impl GpioRelays {
    pub fn open(root: &Path, config: &RelaysConfig) -> DriverResult<Self> {
        let open = |relay: &RelayPinConfig| OutputPin::open(root, relay.pin, relay.active_high);
        Ok(Self {
            skull: open(&config.skull)?,
            smoke: open(&config.smoke)?,
        })
    }

    fn pin(&self, target: RelayTarget) -> &OutputPin {
        match target {
            RelayTarget::Skull => &self.skull,
            RelayTarget::Smoke => &self.smoke,
        }
    }
}

#[async_trait]
impl RelayDriver for GpioRelays {
    async fn set_state(
        &self,
        target: RelayTarget,
        state: RelayState,
        duration: Option<Duration>,
    ) -> DriverResult<()> {
        let pin = self.pin(target);
        pin.set(state.is_on())?;
        debug!(relay = %target, ?state, "Relay switched");

        if let (RelayState::On, Some(duration)) = (state, duration) {
            tokio::time::sleep(duration).await;
            pin.set(false)?;
            debug!(relay = %target, "Relay timed off");
        }
        Ok(())
    }
}

struct RangerPins {
    trigger: SysfsPin,
    echo: SysfsPin,
}

/// HC-SR04 style ultrasonic ranger
pub struct UltrasonicSensor {
    name: String,
    pins: Arc<RangerPins>,
    max_distance: f64,
    echo_timeout: Duration,
}

impl UltrasonicSensor {
    pub fn open(root: &Path, name: impl Into<String>, config: &SensorPinConfig) -> DriverResult<Self> {
        let trigger = SysfsPin::open(root, config.trigger_pin, Direction::Out)?;
        let echo = SysfsPin::open(root, config.echo_pin, Direction::In)?;
        trigger.write(false)?;

        Ok(Self {
            name: name.into(),
            pins: Arc::new(RangerPins { trigger, echo }),
            max_distance: config.max_distance,
            echo_timeout: config.echo_timeout,
        })
    }
}

#[async_trait]
impl DistanceSensor for UltrasonicSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_distance(&self) -> DriverResult<f64> {
        let pins = Arc::clone(&self.pins);
        let name = self.name.clone();
        let timeout = self.echo_timeout;

        let elapsed = tokio::task::spawn_blocking(move || time_echo(&pins, &name, timeout))
            .await
            .map_err(|e| DriverError::Failed(format!("{}: measurement task failed: {}", self.name, e)))??;

        let distance = elapsed.as_secs_f64() * SPEED_OF_SOUND / 2.0;
        if distance > self.max_distance {
            warn!(sensor = %self.name, distance, "Reading beyond maximum range");
            return Err(DriverError::OutOfRange {
                device: self.name.clone(),
                value: distance,
            });
        }

        trace!(sensor = %self.name, distance, "Distance sampled");
        Ok(distance)
    }
}

/// Fire one 10µs trigger pulse and time the echo pulse
fn time_echo(pins: &RangerPins, name: &str, timeout: Duration) -> DriverResult<Duration> {
    pins.trigger.write(true)?;
    std::thread::sleep(Duration::from_micros(10));
    pins.trigger.write(false)?;

    let rise = wait_for_level(&pins.echo, true, name, timeout)?;
    let fall = wait_for_level(&pins.echo, false, name, timeout)?;
    Ok(fall.duration_since(rise))
}

fn wait_for_level(pin: &SysfsPin, level: bool, name: &str, timeout: Duration) -> DriverResult<Instant> {
    let deadline = Instant::now() + timeout;
    loop {
        if pin.read()? == level {
            return Ok(Instant::now());
        }
        if Instant::now() >= deadline {
            return Err(DriverError::Timeout {
                device: name.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Fake sysfs tree with the given pins already exported
    fn fake_sysfs(pins: &[u32]) -> TempDir {
        let root = TempDir::new().unwrap();
        for pin in pins {
            let dir = root.path().join(format!("gpio{pin}"));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("direction"), "in").unwrap();
            fs::write(dir.join("value"), "0").unwrap();
        }
        root
    }

    fn value(root: &TempDir, pin: u32) -> String {
        fs::read_to_string(root.path().join(format!("gpio{pin}/value"))).unwrap()
    }

    #[test]
    fn test_open_sets_direction() {
        let root = fake_sysfs(&[5]);
        let pin = SysfsPin::open(root.path(), 5, Direction::Out).unwrap();
        assert_eq!(pin.number(), 5);
        assert_eq!(fs::read_to_string(root.path().join("gpio5/direction")).unwrap(), "out");
    }

    #[test]
    fn test_open_unexported_pin_times_out() {
        let root = fake_sysfs(&[]);
        let err = SysfsPin::open(root.path(), 9, Direction::Out).unwrap_err();
        assert_eq!(err, DriverError::Timeout { device: "gpio9".to_string() });
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "9");
    }

    #[tokio::test]
    async fn test_motor_drive_releases_pins() {
        let root = fake_sysfs(&[5, 6]);
        let motor = GpioMotor::open(root.path(), &MotorConfig::default()).unwrap();

        motor.drive(MotorAction::Open, Duration::from_millis(5)).await.unwrap();
        assert_eq!(value(&root, 5), "0");
        assert_eq!(value(&root, 6), "0");
    }

    #[tokio::test]
    async fn test_motor_active_low() {
        let root = fake_sysfs(&[5, 6]);
        let config = MotorConfig {
            active_high: false,
            ..MotorConfig::default()
        };
        let motor = GpioMotor::open(root.path(), &config).unwrap();
        assert_eq!(value(&root, 5), "1");

        motor.force_idle().await.unwrap();
        assert_eq!(value(&root, 5), "1");
        assert_eq!(value(&root, 6), "1");
    }

    #[tokio::test]
    async fn test_relay_polarity_and_timed_off() {
        let root = fake_sysfs(&[16, 20]);
        let config = RelaysConfig {
            skull: RelayPinConfig { pin: 16, active_high: true },
            smoke: RelayPinConfig { pin: 20, active_high: false },
        };
        let relays = GpioRelays::open(root.path(), &config).unwrap();

        relays.set_state(RelayTarget::Skull, RelayState::On, None).await.unwrap();
        assert_eq!(value(&root, 16), "1");

        relays.set_state(RelayTarget::Smoke, RelayState::On, None).await.unwrap();
        assert_eq!(value(&root, 20), "0");

        relays
            .set_state(RelayTarget::Skull, RelayState::On, Some(Duration::from_millis(5)))
            .await
            .unwrap();
        assert_eq!(value(&root, 16), "0");
    }

    #[tokio::test]
    async fn test_sensor_without_echo_times_out() {
        let root = fake_sysfs(&[8, 7]);
        let config = SensorPinConfig {
            echo_timeout: Duration::from_millis(5),
            ..SensorPinConfig::new(8, 7)
        };
        let sensor = UltrasonicSensor::open(root.path(), "ultrasonic_1", &config).unwrap();

        let err = sensor.read_distance().await.unwrap_err();
        assert_eq!(err, DriverError::Timeout { device: "ultrasonic_1".to_string() });
    }
}
