//! Proximity Detection Loop
//!
//! Polls both ultrasonic rangers on a fixed tick, debounces failed reads,
//! and hands control to a [`TriggerHandler`] when a guest comes close
//! enough. A cooldown follows every trigger.
//!
//! ```text
//! Idle → Triggered → Cooldown → Idle
//! ```

mod monitor;
mod state;

pub use monitor::{LogTrigger, ProximityMonitor, TickOutcome, TriggerHandler};
pub use state::{DetectionPhase, DetectionState, InvalidTransition};
