use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    unknown_sensor, Listener, ListenerId, SamplingRate, Sensor, SensorBroker, SensorHandle,
    SensorKind, SensorMessage,
};
use crate::{Error, Result};

/// One recorded `register_listener` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub id: ListenerId,
    pub sensor: Sensor,
    pub rate: SamplingRate,
}

#[derive(Default)]
struct FakeState {
    kinds: HashSet<SensorKind>,
    registrations: Vec<Registration>,
    unregistrations: Vec<ListenerId>,
    live: HashMap<ListenerId, (SensorHandle, Listener)>,
    refuse_registrations: bool,
}

/// Scriptable broker that records every call. Clones share state so a test
/// can keep a handle while the controller owns another.
#[derive(Clone, Default)]
pub struct FakeBroker {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBroker {
    /// Broker offering one sensor for each of `kinds`.
    pub fn with_sensors(kinds: &[SensorKind]) -> Self {
        let broker = Self::default();
        broker.lock().kinds.extend(kinds.iter().copied());
        broker
    }

    pub fn with_light() -> Self {
        Self::with_sensors(&[SensorKind::Light])
    }

    pub fn without_sensors() -> Self {
        Self::default()
    }

    /// Make later `register_listener` calls fail, as a busy service would.
    pub fn refuse_registrations(&self, refuse: bool) {
        self.lock().refuse_registrations = refuse;
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.lock().registrations.clone()
    }

    pub fn register_calls(&self) -> usize {
        self.lock().registrations.len()
    }

    pub fn unregister_calls(&self) -> usize {
        self.lock().unregistrations.len()
    }

    /// Number of registrations currently receiving messages.
    pub fn live_listeners(&self) -> usize {
        self.lock().live.len()
    }

    /// Deliver `msg` to every live listener attached to a sensor of `kind`.
    /// Returns how many listeners received it.
    pub fn emit(&self, kind: SensorKind, msg: SensorMessage) -> usize {
        let mut state = self.lock();
        let handle = sensor_for(kind).handle;
        let mut delivered = 0;
        for (sensor, listener) in state.live.values_mut() {
            if *sensor == handle {
                listener(msg.clone());
                delivered += 1;
            }
        }
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the recorded calls.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn sensor_for(kind: SensorKind) -> Sensor {
    Sensor {
        handle: SensorHandle(kind as u32),
        kind,
        name: format!("fake-{kind}"),
    }
}

impl SensorBroker for FakeBroker {
    fn default_sensor(&self, kind: SensorKind) -> Option<Sensor> {
        self.lock().kinds.contains(&kind).then(|| sensor_for(kind))
    }

    fn register_listener(
        &mut self,
        id: ListenerId,
        sensor: &Sensor,
        rate: SamplingRate,
        listener: Listener,
    ) -> Result<()> {
        let mut state = self.lock();
        if !state.kinds.contains(&sensor.kind) {
            return Err(unknown_sensor(sensor));
        }
        if state.refuse_registrations {
            return Err(Error::Sensor(format!("{} refused the listener", sensor.name)));
        }
        state.registrations.push(Registration {
            id,
            sensor: sensor.clone(),
            rate,
        });
        state.live.insert(id, (sensor.handle, listener));
        Ok(())
    }

    fn unregister_listener(&mut self, id: ListenerId) {
        let mut state = self.lock();
        state.unregistrations.push(id);
        state.live.remove(&id);
    }

    fn sensors(&self) -> Vec<Sensor> {
        self.lock().kinds.iter().map(|k| sensor_for(*k)).collect()
    }
}
