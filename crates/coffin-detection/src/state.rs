//! Detection state and phase transitions

use thiserror::Error;

/// Where the detection loop is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionPhase {
    /// Monitoring, a scene may trigger
    #[default]
    Idle,
    /// A scene is running
    Triggered,
    /// Quiet period after a scene; sampling continues, triggering does not
    Cooldown,
}

/// Error when an invalid phase transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid phase transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: DetectionPhase,
    pub to: DetectionPhase,
    pub reason: &'static str,
}

impl DetectionPhase {
    /// Attempt a transition to a new phase.
    ///
    /// Returns the new phase if valid, or an error describing why the
    /// transition is invalid.
    pub fn try_transition(self, to: DetectionPhase) -> Result<DetectionPhase, InvalidTransition> {
        use DetectionPhase::*;

        let valid = matches!((self, to), (Idle, Triggered) | (Triggered, Cooldown) | (Cooldown, Idle));

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                to,
                reason: Self::transition_error_reason(self, to),
            })
        }
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition_to(self, to: DetectionPhase) -> bool {
        self.try_transition(to).is_ok()
    }

    /// Whether a close reading may start a scene
    pub fn can_trigger(self) -> bool {
        self == DetectionPhase::Idle
    }

    fn transition_error_reason(from: DetectionPhase, to: DetectionPhase) -> &'static str {
        use DetectionPhase::*;

        match (from, to) {
            (Triggered, Idle) => "Scene finished - must cool down before returning to Idle",
            (Cooldown, Triggered) => "Cooling down - cannot trigger",
            (Idle, Cooldown) => "Nothing ran - cannot cool down",
            (Triggered, Triggered) => "A scene is already running",
            _ => "Invalid phase transition",
        }
    }
}

/// Observable state of the detection loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionState {
    pub last_distance_1: Option<f64>,
    pub last_distance_2: Option<f64>,
    /// Sensor reads that exhausted their retries since the last clean tick
    pub consecutive_failures: u32,
    /// Exhausted sensor reads since start
    pub total_failures: u64,
    /// Scenes triggered since start
    pub triggers: u64,
    phase: DetectionPhase,
}

impl DetectionState {
    pub fn phase(&self) -> DetectionPhase {
        self.phase
    }

    /// The governing distance of the last tick: the closer sensor
    pub fn last_distance(&self) -> Option<f64> {
        match (self.last_distance_1, self.last_distance_2) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub(crate) fn transition(&mut self, to: DetectionPhase) -> Result<(), InvalidTransition> {
        self.phase = self.phase.try_transition(to)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cycle() {
        let phase = DetectionPhase::Idle;
        let phase = phase.try_transition(DetectionPhase::Triggered).unwrap();
        let phase = phase.try_transition(DetectionPhase::Cooldown).unwrap();
        let phase = phase.try_transition(DetectionPhase::Idle).unwrap();
        assert_eq!(phase, DetectionPhase::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        let err = DetectionPhase::Cooldown
            .try_transition(DetectionPhase::Triggered)
            .unwrap_err();
        assert_eq!(err.reason, "Cooling down - cannot trigger");

        assert!(!DetectionPhase::Triggered.can_transition_to(DetectionPhase::Idle));
        assert!(!DetectionPhase::Idle.can_transition_to(DetectionPhase::Cooldown));
        assert!(!DetectionPhase::Idle.can_transition_to(DetectionPhase::Idle));
    }

    #[test]
    fn test_only_idle_triggers() {
        assert!(DetectionPhase::Idle.can_trigger());
        assert!(!DetectionPhase::Triggered.can_trigger());
        assert!(!DetectionPhase::Cooldown.can_trigger());
    }

    #[test]
    fn test_state_transition_guarded() {
        let mut state = DetectionState::default();
        assert!(state.transition(DetectionPhase::Cooldown).is_err());
        assert_eq!(state.phase(), DetectionPhase::Idle);

        state.transition(DetectionPhase::Triggered).unwrap();
        assert_eq!(state.phase(), DetectionPhase::Triggered);
    }

    #[test]
    fn test_last_distance_is_minimum() {
        let state = DetectionState {
            last_distance_1: Some(120.0),
            last_distance_2: Some(80.0),
            ..DetectionState::default()
        };
        assert_eq!(state.last_distance(), Some(80.0));
        assert_eq!(DetectionState::default().last_distance(), None);
    }
}
