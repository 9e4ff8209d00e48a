//! Static hardware wiring of the rig
//!
//! Loaded once from the `hardware` section of the configuration document
//! and immutable for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete hardware description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default)]
    pub sensors: SensorsConfig,

    #[serde(default)]
    pub motor: MotorConfig,

    #[serde(default)]
    pub relays: RelaysConfig,

    #[serde(default)]
    pub lights: LightsConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    /// Root of the sysfs GPIO tree
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

/// The two ultrasonic rangers watching the approach
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default = "default_sensor_1")]
    pub ultrasonic_1: SensorPinConfig,

    #[serde(default = "default_sensor_2")]
    pub ultrasonic_2: SensorPinConfig,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            ultrasonic_1: default_sensor_1(),
            ultrasonic_2: default_sensor_2(),
        }
    }
}

fn default_sensor_1() -> SensorPinConfig {
    SensorPinConfig::new(8, 7)
}

fn default_sensor_2() -> SensorPinConfig {
    SensorPinConfig::new(23, 24)
}

/// Pin pair and limits for one HC-SR04 style sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorPinConfig {
    pub trigger_pin: u32,
    pub echo_pin: u32,

    /// Readings beyond this many centimeters are discarded as failures
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    /// How long to wait for each echo edge
    #[serde(default = "default_echo_timeout", with = "crate::secs")]
    pub echo_timeout: Duration,
}

impl SensorPinConfig {
    pub fn new(trigger_pin: u32, echo_pin: u32) -> Self {
        Self {
            trigger_pin,
            echo_pin,
            max_distance: default_max_distance(),
            echo_timeout: default_echo_timeout(),
        }
    }
}

fn default_max_distance() -> f64 {
    2000.0
}

fn default_echo_timeout() -> Duration {
    Duration::from_millis(100)
}

/// H-bridge inputs of the lid motor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorConfig {
    pub forward_pin: u32,
    pub reverse_pin: u32,
    #[serde(default = "default_true")]
    pub active_high: bool,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            forward_pin: 5,
            reverse_pin: 6,
            active_high: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaysConfig {
    #[serde(default = "default_skull_relay")]
    pub skull: RelayPinConfig,

    #[serde(default = "default_smoke_relay")]
    pub smoke: RelayPinConfig,
}

impl Default for RelaysConfig {
    fn default() -> Self {
        Self {
            skull: default_skull_relay(),
            smoke: default_smoke_relay(),
        }
    }
}

fn default_skull_relay() -> RelayPinConfig {
    RelayPinConfig {
        pin: 16,
        active_high: true,
    }
}

fn default_smoke_relay() -> RelayPinConfig {
    RelayPinConfig {
        pin: 20,
        active_high: true,
    }
}

/// A relay input pin and its polarity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayPinConfig {
    pub pin: u32,
    /// `false` for boards that energize the coil when the pin is pulled low
    #[serde(default = "default_true")]
    pub active_high: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightsConfig {
    #[serde(default)]
    pub govee: GoveeConfig,
}

/// Govee LAN API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoveeConfig {
    pub ip: String,
    #[serde(default = "default_govee_port")]
    pub port: u16,
}

impl Default for GoveeConfig {
    fn default() -> Self {
        Self {
            ip: "192.168.1.210".to_string(),
            port: default_govee_port(),
        }
    }
}

fn default_govee_port() -> u16 {
    4003
}

/// Audio clips and the external player used to render them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Directory the file names below are relative to
    #[serde(default)]
    pub base_path: PathBuf,

    /// Clip key → file name
    #[serde(default)]
    pub files: BTreeMap<String, String>,

    #[serde(default)]
    pub player: PlayerConfig,
}

impl AudioConfig {
    /// Full path of a clip, if the key is known
    pub fn resolve(&self, key: &str) -> Option<PathBuf> {
        self.files.get(key).map(|file| self.base_path.join(file))
    }
}

/// External command that plays one clip and exits.
///
/// Arguments may contain `{file}`, `{volume}` (0.0-1.0), `{percent}`
/// (0-100) and `{scale}` (0-32768) placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_program")]
    pub program: String,
    #[serde(default = "default_player_args")]
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: default_player_program(),
            args: default_player_args(),
        }
    }
}

fn default_player_program() -> String {
    "mpg123".to_string()
}

fn default_player_args() -> Vec<String> {
    ["-q", "-f", "{scale}", "{file}"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}
