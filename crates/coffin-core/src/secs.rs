//! Serde helpers for durations written as (fractional) seconds
//!
//! The configuration document expresses every duration as a plain number of
//! seconds (`duration: 2.5`). Negative, NaN and infinite values are rejected
//! at deserialization time.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Convert a seconds value into a [`Duration`], rejecting negative or non-finite input
pub fn from_secs(secs: f64) -> Result<Duration, String> {
    if !secs.is_finite() {
        return Err(format!("duration must be a finite number of seconds, got {}", secs));
    }
    if secs < 0.0 {
        return Err(format!("duration must not be negative, got {}", secs));
    }
    Ok(Duration::from_secs_f64(secs))
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    from_secs(secs).map_err(serde::de::Error::custom)
}

/// Same as the parent module, for `Option<Duration>` fields
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| super::from_secs(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
