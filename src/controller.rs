//! The display controller: one light sensor in, one line of text out.
//!
//! The controller is driven entirely by its owner. The host calls
//! [`DisplayController::on_activate`] / [`DisplayController::on_deactivate`]
//! as the display becomes visible or hidden and feeds every message the broker
//! routed back through [`DisplayController::handle`]. All calls happen on one
//! thread; the controller never blocks or spawns.

use crate::{
    display::TextSurface,
    sensor::{
        Accuracy, EventRoute, ListenerId, SamplingRate, Sensor, SensorBroker, SensorEvent,
        SensorKind, SensorMessage,
    },
    Result,
};

/// Shown when the device has no ambient light sensor.
pub const NO_SENSOR_TEXT: &str = "No Light Sensor Found!";

const LISTENER_ID: ListenerId = ListenerId(1);

/// Render a reading exactly as the display shows it.
pub fn format_reading(lux: f32) -> String {
    format!("Light Intensity: {lux} lx")
}

pub struct DisplayController<B: SensorBroker, S: TextSurface> {
    broker: B,
    surface: S,
    route: Box<dyn EventRoute>,
    sensor: Option<Sensor>,
    rate: SamplingRate,
    active: bool,
    text: String,
}

impl<B: SensorBroker, S: TextSurface> DisplayController<B, S> {
    /// Look up the light sensor once. Without one the placeholder is shown
    /// for the controller's whole life and the broker is never subscribed.
    pub fn new(
        broker: B,
        mut surface: S,
        route: Box<dyn EventRoute>,
        rate: SamplingRate,
    ) -> Result<Self> {
        let sensor = broker.default_sensor(SensorKind::Light);
        let mut text = String::new();
        match &sensor {
            Some(sensor) => log::info!("light sensor: {} ({:?})", sensor.name, sensor.handle),
            None => {
                log::warn!("no light sensor available");
                text = NO_SENSOR_TEXT.to_string();
                surface.set_text(&text)?;
            }
        }
        Ok(Self {
            broker,
            surface,
            route,
            sensor,
            rate,
            active: false,
            text,
        })
    }

    /// Display became visible: subscribe once for this visibility session.
    pub fn on_activate(&mut self) -> Result<()> {
        let Some(sensor) = self.sensor.as_ref() else {
            return Ok(());
        };
        if self.active {
            log::trace!("activate ignored: already subscribed");
            return Ok(());
        }
        self.broker
            .register_listener(LISTENER_ID, sensor, self.rate, self.route.listener())?;
        self.active = true;
        log::debug!("subscribed to {} at {}", sensor.name, self.rate);
        Ok(())
    }

    /// Display became hidden. Always asks the broker to drop the listener,
    /// whether or not one is registered.
    pub fn on_deactivate(&mut self) {
        self.broker.unregister_listener(LISTENER_ID);
        if self.active {
            log::debug!("unsubscribed from light sensor");
        }
        self.active = false;
    }

    /// Dispatch one broker message. Returns whether the display text changed.
    pub fn handle(&mut self, msg: SensorMessage) -> Result<bool> {
        match msg {
            SensorMessage::Reading(event) => self.on_sensor_changed(&event),
            SensorMessage::AccuracyChanged { sensor, accuracy } => {
                self.on_accuracy_changed(&sensor, accuracy);
                Ok(false)
            }
        }
    }

    pub fn on_sensor_changed(&mut self, event: &SensorEvent) -> Result<bool> {
        if event.kind != SensorKind::Light {
            return Ok(false);
        }
        if !self.active {
            // Queued before the last deactivate.
            log::trace!("dropping light reading while inactive");
            return Ok(false);
        }
        let Some(&lux) = event.values.first() else {
            return Ok(false);
        };
        self.text = format_reading(lux);
        self.surface.set_text(&self.text)?;
        Ok(true)
    }

    pub fn on_accuracy_changed(&mut self, sensor: &Sensor, accuracy: Accuracy) {
        log::trace!("accuracy of {} is now {accuracy:?}", sensor.name);
    }

    pub fn display_text(&self) -> &str {
        &self.text
    }

    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
