//! Sensor broker boundary: capability lookup, listener registration and the
//! event types that flow from a back-end to the display controller.

use std::{fmt, str::FromStr, time::Duration};

use serde::Serialize;

use crate::{Error, Result};

pub mod fake;
pub mod iio;
mod poller;
pub mod simulated;

pub use fake::FakeBroker;
pub use iio::IioBroker;
pub use simulated::SimulatedBroker;

/// Kind of physical quantity a sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Ambient light, lux.
    Light,
    Proximity,
    Pressure,
    AmbientTemperature,
    RelativeHumidity,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Light => "light",
            SensorKind::Proximity => "proximity",
            SensorKind::Pressure => "pressure",
            SensorKind::AmbientTemperature => "ambient_temperature",
            SensorKind::RelativeHumidity => "relative_humidity",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker-assigned identifier for a discovered sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SensorHandle(pub u32);

/// A sensor capability as reported by a broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sensor {
    pub handle: SensorHandle,
    pub kind: SensorKind,
    pub name: String,
}

/// Reported trust level of a sensor's readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    Unreliable,
    Low,
    Medium,
    #[default]
    High,
}

/// One delivery from a sensor: a kind tag plus its reading vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorEvent {
    pub kind: SensorKind,
    pub values: Vec<f32>,
    pub accuracy: Accuracy,
    /// Monotonic nanoseconds since the registration started.
    pub timestamp_ns: u64,
}

impl SensorEvent {
    pub fn new(kind: SensorKind, values: Vec<f32>) -> Self {
        Self {
            kind,
            values,
            accuracy: Accuracy::default(),
            timestamp_ns: 0,
        }
    }

    pub fn light(lux: f32) -> Self {
        Self::new(SensorKind::Light, vec![lux])
    }
}

/// Everything a broker can hand to a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorMessage {
    Reading(SensorEvent),
    AccuracyChanged { sensor: Sensor, accuracy: Accuracy },
}

/// Callback a broker invokes for each message on a registration.
pub type Listener = Box<dyn FnMut(SensorMessage) + Send>;

/// Caller-chosen key for a registration; registering an id twice replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// Coarse delivery cadence hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingRate {
    Fastest,
    Game,
    Ui,
    #[default]
    Normal,
    Custom(Duration),
}

/// Floor applied to `Fastest` so pollers never spin.
const FASTEST_FLOOR: Duration = Duration::from_millis(5);

impl SamplingRate {
    /// Nominal delay between samples.
    pub fn period(&self) -> Duration {
        match self {
            SamplingRate::Fastest => Duration::ZERO,
            SamplingRate::Game => Duration::from_millis(20),
            SamplingRate::Ui => Duration::from_micros(66_667),
            SamplingRate::Normal => Duration::from_millis(200),
            SamplingRate::Custom(period) => *period,
        }
    }

    /// Period a polling back-end should actually sleep for.
    pub fn poll_interval(&self) -> Duration {
        self.period().max(FASTEST_FLOOR)
    }
}

impl FromStr for SamplingRate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(SamplingRate::Fastest),
            "game" => Ok(SamplingRate::Game),
            "ui" => Ok(SamplingRate::Ui),
            "normal" => Ok(SamplingRate::Normal),
            other => humantime::parse_duration(other)
                .map(SamplingRate::Custom)
                .map_err(|_| {
                    format!("expected fastest|game|ui|normal or a duration like 250ms, got '{s}'")
                }),
        }
    }
}

impl fmt::Display for SamplingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingRate::Fastest => f.write_str("fastest"),
            SamplingRate::Game => f.write_str("game"),
            SamplingRate::Ui => f.write_str("ui"),
            SamplingRate::Normal => f.write_str("normal"),
            SamplingRate::Custom(period) => {
                write!(f, "{}", humantime::format_duration(*period))
            }
        }
    }
}

/// The platform sensor service as seen by the display controller.
pub trait SensorBroker {
    /// Default sensor of `kind`, or `None` when the device has none.
    fn default_sensor(&self, kind: SensorKind) -> Option<Sensor>;

    /// Start delivering `sensor` messages to `listener` at roughly `rate`.
    fn register_listener(
        &mut self,
        id: ListenerId,
        sensor: &Sensor,
        rate: SamplingRate,
        listener: Listener,
    ) -> Result<()>;

    /// Stop deliveries for `id`. A no-op when nothing is registered.
    fn unregister_listener(&mut self, id: ListenerId);

    /// Every sensor this broker can see.
    fn sensors(&self) -> Vec<Sensor> {
        Vec::new()
    }
}

impl<T: SensorBroker + ?Sized> SensorBroker for Box<T> {
    fn default_sensor(&self, kind: SensorKind) -> Option<Sensor> {
        (**self).default_sensor(kind)
    }

    fn register_listener(
        &mut self,
        id: ListenerId,
        sensor: &Sensor,
        rate: SamplingRate,
        listener: Listener,
    ) -> Result<()> {
        (**self).register_listener(id, sensor, rate, listener)
    }

    fn unregister_listener(&mut self, id: ListenerId) {
        (**self).unregister_listener(id)
    }

    fn sensors(&self) -> Vec<Sensor> {
        (**self).sensors()
    }
}

/// Produces listeners that route messages back to whoever owns the controller.
pub trait EventRoute {
    fn listener(&self) -> Listener;
}

impl EventRoute for calloop::channel::Sender<SensorMessage> {
    fn listener(&self) -> Listener {
        let tx = self.clone();
        Box::new(move |msg| {
            // Receiver gone means the loop is shutting down.
            let _ = tx.send(msg);
        })
    }
}

impl EventRoute for std::sync::mpsc::Sender<SensorMessage> {
    fn listener(&self) -> Listener {
        let tx = self.clone();
        Box::new(move |msg| {
            let _ = tx.send(msg);
        })
    }
}

pub(crate) fn unknown_sensor(sensor: &Sensor) -> Error {
    Error::Sensor(format!(
        "sensor {} ({}) is not provided by this broker",
        sensor.name, sensor.kind
    ))
}
