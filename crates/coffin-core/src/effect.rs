//! Effect commands
//!
//! An [`EffectCommand`] is a single declarative instruction to one hardware
//! driver family. Commands are built once when the configuration is loaded
//! and never reinterpreted at dispatch time.

use crate::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Set the light color, optionally flashing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCommand {
    pub color: Rgb,
    pub flash: bool,
    /// Number of off/on cycles when `flash` is set
    pub flash_amount: u32,
}

/// Play an audio clip from the hardware audio file map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCommand {
    /// Key into `hardware.audio.files`
    pub file_key: String,
    /// Playback volume in `[0, 1]`
    pub volume: f32,
}

/// Lid motor direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorAction {
    Open,
    Close,
}

/// Drive the lid motor in one direction for a fixed time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub action: MotorAction,
    #[serde(with = "crate::secs")]
    pub duration: Duration,
}

/// Relay-driven props
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayTarget {
    Skull,
    Smoke,
}

impl RelayTarget {
    /// Every relay on the rig, in the order the idle pass switches them off
    pub const ALL: [RelayTarget; 2] = [RelayTarget::Skull, RelayTarget::Smoke];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayTarget::Skull => "skull",
            RelayTarget::Smoke => "smoke",
        }
    }
}

impl fmt::Display for RelayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical relay state (polarity is handled by the driver)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    pub fn is_on(&self) -> bool {
        matches!(self, RelayState::On)
    }
}

/// Switch a relay, optionally reverting to off after `duration`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayCommand {
    pub target: RelayTarget,
    pub state: RelayState,
    #[serde(default, with = "crate::secs::option")]
    pub duration: Option<Duration>,
}

/// A single instruction to one driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectCommand {
    Light(LightCommand),
    Audio(AudioCommand),
    Motor(MotorCommand),
    Relay(RelayCommand),
}

impl EffectCommand {
    /// The driver this command is dispatched to
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectCommand::Light(_) => EffectKind::Light,
            EffectCommand::Audio(_) => EffectKind::Audio,
            EffectCommand::Motor(_) => EffectKind::Motor,
            EffectCommand::Relay(relay) => EffectKind::Relay(relay.target),
        }
    }

    /// How long the command itself is declared to run.
    ///
    /// Light flashing and audio playback have no declared length and report zero;
    /// their real time is whatever the driver takes.
    pub fn intrinsic_duration(&self) -> Duration {
        match self {
            EffectCommand::Motor(motor) => motor.duration,
            EffectCommand::Relay(relay) if relay.state.is_on() => {
                relay.duration.unwrap_or(Duration::ZERO)
            }
            _ => Duration::ZERO,
        }
    }
}

/// Identity of the driver a command targets.
///
/// Each relay counts as its own driver, so a step may switch both the skull
/// and the smoke machine but never the same relay twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Light,
    Audio,
    Motor,
    Relay(RelayTarget),
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectKind::Light => f.write_str("light"),
            EffectKind::Audio => f.write_str("audio"),
            EffectKind::Motor => f.write_str("motor"),
            EffectKind::Relay(target) => write!(f, "relay:{}", target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_relays() {
        let skull = EffectCommand::Relay(RelayCommand {
            target: RelayTarget::Skull,
            state: RelayState::On,
            duration: Some(Duration::from_secs(2)),
        });
        let smoke = EffectCommand::Relay(RelayCommand {
            target: RelayTarget::Smoke,
            state: RelayState::On,
            duration: None,
        });

        assert_ne!(skull.kind(), smoke.kind());
        assert_eq!(skull.kind().to_string(), "relay:skull");
    }

    #[test]
    fn test_intrinsic_duration() {
        let motor = EffectCommand::Motor(MotorCommand {
            action: MotorAction::Open,
            duration: Duration::from_secs(6),
        });
        assert_eq!(motor.intrinsic_duration(), Duration::from_secs(6));

        let relay_off = EffectCommand::Relay(RelayCommand {
            target: RelayTarget::Smoke,
            state: RelayState::Off,
            duration: Some(Duration::from_secs(5)),
        });
        assert_eq!(relay_off.intrinsic_duration(), Duration::ZERO);

        let light = EffectCommand::Light(LightCommand {
            color: Rgb::RED,
            flash: true,
            flash_amount: 3,
        });
        assert_eq!(light.intrinsic_duration(), Duration::ZERO);
    }

    #[test]
    fn test_motor_action_names() {
        let action: MotorAction = serde_yaml::from_str("close").unwrap();
        assert_eq!(action, MotorAction::Close);
    }
}
