//! Synthetic light sensor used by `--demo`: walks a dark → daylight → dark
//! curve so the display has something to show without hardware.

use std::collections::HashMap;

use super::{
    poller::PollerHandle, unknown_sensor, Accuracy, Listener, ListenerId, SamplingRate, Sensor,
    SensorBroker, SensorEvent, SensorHandle, SensorKind, SensorMessage,
};
use crate::Result;

pub const SIMULATED_SENSOR_NAME: &str = "simulated-als";

const NIGHT_LUX: f64 = 0.5;
const PEAK_LUX: f64 = 1_200.0;
/// Samples per simulated day.
const CYCLE_STEPS: u64 = 120;

pub struct SimulatedBroker {
    sensor: Sensor,
    pollers: HashMap<ListenerId, PollerHandle>,
}

impl Default for SimulatedBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBroker {
    pub fn new() -> Self {
        Self {
            sensor: Sensor {
                handle: SensorHandle(0),
                kind: SensorKind::Light,
                name: SIMULATED_SENSOR_NAME.to_string(),
            },
            pollers: HashMap::new(),
        }
    }
}

/// Lux at `step` of the synthetic day, rounded to one decimal.
pub fn simulated_lux(step: u64) -> f32 {
    let phase = (step % CYCLE_STEPS) as f64 / CYCLE_STEPS as f64;
    let daylight = (std::f64::consts::PI * phase).sin().powi(2);
    let lux = NIGHT_LUX + (PEAK_LUX - NIGHT_LUX) * daylight;
    ((lux * 10.0).round() / 10.0) as f32
}

impl SensorBroker for SimulatedBroker {
    fn default_sensor(&self, kind: SensorKind) -> Option<Sensor> {
        (kind == SensorKind::Light).then(|| self.sensor.clone())
    }

    fn register_listener(
        &mut self,
        id: ListenerId,
        sensor: &Sensor,
        rate: SamplingRate,
        mut listener: Listener,
    ) -> Result<()> {
        if sensor.handle != self.sensor.handle {
            return Err(unknown_sensor(sensor));
        }
        if let Some(mut previous) = self.pollers.remove(&id) {
            previous.stop();
        }

        let own = self.sensor.clone();
        let mut step = 0u64;
        let poller = PollerHandle::spawn("luxmeter-demo", rate.poll_interval(), move |elapsed| {
            if step == 0 {
                listener(SensorMessage::AccuracyChanged {
                    sensor: own.clone(),
                    accuracy: Accuracy::High,
                });
            }
            listener(SensorMessage::Reading(SensorEvent {
                kind: SensorKind::Light,
                values: vec![simulated_lux(step)],
                accuracy: Accuracy::High,
                timestamp_ns: elapsed.as_nanos() as u64,
            }));
            step += 1;
        })?;
        self.pollers.insert(id, poller);
        Ok(())
    }

    fn unregister_listener(&mut self, id: ListenerId) {
        if let Some(mut poller) = self.pollers.remove(&id) {
            poller.stop();
        }
    }

    fn sensors(&self) -> Vec<Sensor> {
        vec![self.sensor.clone()]
    }
}
