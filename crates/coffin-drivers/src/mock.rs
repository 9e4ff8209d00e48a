//! Recording rig for tests
//!
//! [`MockRig`] records every driver call with its (virtual) timestamp,
//! tracks the physical state the calls would leave the props in, and can
//! be told to fail specific calls.

use crate::{AudioDriver, DistanceSensor, DriverError, DriverResult, DriverSet, LightDriver, MotorDriver, RelayDriver};
use async_trait::async_trait;
use coffin_core::{MotorAction, RelayState, RelayTarget, Rgb};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// One driver call as the rig saw it
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Light {
        color: Rgb,
        flash: bool,
        flash_count: u32,
    },
    Play {
        file_key: String,
        volume: f32,
    },
    StopAudio,
    Drive {
        action: MotorAction,
        duration: Duration,
    },
    ForceIdle,
    Relay {
        target: RelayTarget,
        state: RelayState,
        duration: Option<Duration>,
    },
}

impl Call {
    pub fn point(&self) -> FailPoint {
        match self {
            Call::Light { .. } => FailPoint::Light,
            Call::Play { .. } => FailPoint::Play,
            Call::StopAudio => FailPoint::StopAudio,
            Call::Drive { .. } => FailPoint::Drive,
            Call::ForceIdle => FailPoint::ForceIdle,
            Call::Relay { target, .. } => FailPoint::Relay(*target),
        }
    }
}

/// A call with the time it was made, relative to rig creation
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub at: Duration,
    pub call: Call,
}

/// Where a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Light,
    Play,
    StopAudio,
    Drive,
    ForceIdle,
    Relay(RelayTarget),
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Always,
    /// 1-based call number
    Nth(usize),
}

/// Physical state the recorded calls leave behind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropState {
    pub light: Option<(Rgb, bool)>,
    pub audio: Option<String>,
    pub motor: Option<MotorAction>,
    pub relays: BTreeMap<RelayTarget, bool>,
}

impl PropState {
    /// Everything de-energized: relays off, audio silent, light dark, motor stopped
    pub fn is_idle(&self) -> bool {
        let light_dark = match self.light {
            None => true,
            Some((color, flash)) => color.is_black() && !flash,
        };
        light_dark && self.audio.is_none() && self.motor.is_none() && !self.relays.values().any(|on| *on)
    }
}

#[derive(Debug)]
struct Inner {
    epoch: Instant,
    calls: Vec<CallRecord>,
    counts: HashMap<FailPoint, usize>,
    failures: HashMap<FailPoint, Failure>,
    state: PropState,
}

impl Inner {
    /// Record the call and decide whether it fails
    fn record(&mut self, call: Call) -> DriverResult<()> {
        let point = call.point();
        let at = self.epoch.elapsed();
        self.calls.push(CallRecord { at, call });

        let count = self.counts.entry(point).or_insert(0);
        *count += 1;

        let fails = match self.failures.get(&point) {
            Some(Failure::Always) => true,
            Some(Failure::Nth(n)) => *n == *count,
            None => false,
        };
        if fails {
            return Err(DriverError::Failed(format!("injected {point:?} failure")));
        }
        Ok(())
    }
}

/// Devices sharing one recording
#[derive(Debug)]
struct MockDevices {
    inner: Arc<Mutex<Inner>>,
}

impl MockDevices {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LightDriver for MockDevices {
    async fn set_state(&self, color: Rgb, flash: bool, flash_count: u32) -> DriverResult<()> {
        let mut inner = self.lock();
        inner.record(Call::Light {
            color,
            flash,
            flash_count,
        })?;
        inner.state.light = Some((color, flash && flash_count > 0));
        Ok(())
    }
}

#[async_trait]
impl AudioDriver for MockDevices {
    async fn play(&self, file_key: &str, volume: f32) -> DriverResult<()> {
        let mut inner = self.lock();
        inner.record(Call::Play {
            file_key: file_key.to_string(),
            volume,
        })?;
        inner.state.audio = Some(file_key.to_string());
        Ok(())
    }

    async fn stop(&self) -> DriverResult<()> {
        let mut inner = self.lock();
        inner.record(Call::StopAudio)?;
        inner.state.audio = None;
        Ok(())
    }
}

#[async_trait]
impl MotorDriver for MockDevices {
    async fn drive(&self, action: MotorAction, duration: Duration) -> DriverResult<()> {
        {
            let mut inner = self.lock();
            // A failed drive leaves the motor energized until force_idle
            inner.state.motor = Some(action);
            inner.record(Call::Drive { action, duration })?;
        }

        tokio::time::sleep(duration).await;
        self.lock().state.motor = None;
        Ok(())
    }

    async fn force_idle(&self) -> DriverResult<()> {
        let mut inner = self.lock();
        inner.record(Call::ForceIdle)?;
        inner.state.motor = None;
        Ok(())
    }
}

#[async_trait]
impl RelayDriver for MockDevices {
    async fn set_state(
        &self,
        target: RelayTarget,
        state: RelayState,
        duration: Option<Duration>,
    ) -> DriverResult<()> {
        {
            let mut inner = self.lock();
            inner.record(Call::Relay {
                target,
                state,
                duration,
            })?;
            inner.state.relays.insert(target, state.is_on());
        }

        if let (RelayState::On, Some(duration)) = (state, duration) {
            tokio::time::sleep(duration).await;
            self.lock().state.relays.insert(target, false);
        }
        Ok(())
    }
}

/// Ranger fed from a script of readings
#[derive(Debug)]
pub struct MockSensor {
    name: String,
    script: Mutex<VecDeque<DriverResult<f64>>>,
    fallback: Mutex<DriverResult<f64>>,
    reads: Mutex<usize>,
}

impl MockSensor {
    pub fn new(name: impl Into<String>, fallback: DriverResult<f64>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            reads: Mutex::new(0),
        }
    }

    /// Queue readings returned before the fallback
    pub fn push(&self, readings: impl IntoIterator<Item = DriverResult<f64>>) {
        lock(&self.script).extend(readings);
    }

    /// Reading returned once the script is exhausted
    pub fn set_fallback(&self, reading: DriverResult<f64>) {
        *lock(&self.fallback) = reading;
    }

    pub fn reads(&self) -> usize {
        *lock(&self.reads)
    }
}

#[async_trait]
impl DistanceSensor for MockSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_distance(&self) -> DriverResult<f64> {
        *lock(&self.reads) += 1;
        let scripted = lock(&self.script).pop_front();
        match scripted {
            Some(reading) => reading,
            None => lock(&self.fallback).clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A complete recording rig
#[derive(Debug, Clone)]
pub struct MockRig {
    devices: Arc<MockDevices>,
    sensors: [Arc<MockSensor>; 2],
}

impl Default for MockRig {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRig {
    /// Rig with both sensors reading 300cm
    pub fn new() -> Self {
        let inner = Inner {
            epoch: Instant::now(),
            calls: Vec::new(),
            counts: HashMap::new(),
            failures: HashMap::new(),
            state: PropState::default(),
        };
        Self {
            devices: Arc::new(MockDevices {
                inner: Arc::new(Mutex::new(inner)),
            }),
            sensors: [
                Arc::new(MockSensor::new("ultrasonic_1", Ok(300.0))),
                Arc::new(MockSensor::new("ultrasonic_2", Ok(300.0))),
            ],
        }
    }

    pub fn drivers(&self) -> DriverSet {
        DriverSet {
            light: self.devices.clone(),
            audio: self.devices.clone(),
            motor: self.devices.clone(),
            relays: self.devices.clone(),
            sensors: [self.sensors[0].clone(), self.sensors[1].clone()],
        }
    }

    /// Sensor 0 or 1
    pub fn sensor(&self, index: usize) -> &Arc<MockSensor> {
        &self.sensors[index]
    }

    /// Every call to `point` fails
    pub fn fail_always(&self, point: FailPoint) {
        self.devices.lock().failures.insert(point, Failure::Always);
    }

    /// Only the `n`th call (1-based) to `point` fails
    pub fn fail_nth(&self, point: FailPoint, n: usize) {
        self.devices.lock().failures.insert(point, Failure::Nth(n));
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.devices.lock().calls.clone()
    }

    /// Number of calls made to `point`, failed ones included
    pub fn count(&self, point: FailPoint) -> usize {
        self.devices.lock().counts.get(&point).copied().unwrap_or(0)
    }

    pub fn state(&self) -> PropState {
        self.devices.lock().state.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.state().is_idle()
    }
}
