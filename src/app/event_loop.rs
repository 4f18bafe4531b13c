use calloop::{
    channel::{Channel, Event as ChannelEvent},
    EventLoop, LoopHandle,
};

use super::lifecycle::{Lifecycle, VisibilitySignals};
use crate::{
    controller::DisplayController,
    display::TextSurface,
    sensor::{SensorBroker, SensorMessage},
    Error, Result,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopOptions {
    /// Stop after the first reading lands on the surface.
    pub once: bool,
}

struct LoopState<B: SensorBroker, S: TextSurface> {
    controller: DisplayController<B, S>,
    once: bool,
    done: bool,
}

impl<B: SensorBroker, S: TextSurface> LoopState<B, S> {
    fn on_sensor(&mut self, msg: SensorMessage) {
        match self.controller.handle(msg) {
            Ok(true) if self.once => self.done = true,
            Ok(_) => {}
            Err(err) => log::warn!("display update failed: {err}"),
        }
    }

    fn on_lifecycle(&mut self, request: Lifecycle) {
        match request {
            Lifecycle::Activate => {
                log::info!("display shown");
                if let Err(err) = self.controller.on_activate() {
                    log::error!("failed to subscribe to light sensor: {err}");
                }
            }
            Lifecycle::Deactivate => {
                log::info!("display hidden");
                self.controller.on_deactivate();
            }
            Lifecycle::Shutdown => {
                log::info!("shutdown requested");
                self.done = true;
            }
        }
    }
}

/// Drive `controller` until a shutdown request (or, with `once`, the first
/// displayed reading). The controller is activated on entry; on exit it is
/// deactivated and its surface shut down.
pub fn run<B, S>(
    controller: DisplayController<B, S>,
    sensor_rx: Channel<SensorMessage>,
    lifecycle_rx: Channel<Lifecycle>,
    signals: Option<VisibilitySignals>,
    opts: LoopOptions,
) -> Result<()>
where
    B: SensorBroker + 'static,
    S: TextSurface + 'static,
{
    let mut event_loop: EventLoop<'static, LoopState<B, S>> = EventLoop::try_new()
        .map_err(|e| Error::EventLoop(format!("cannot create event loop: {e}")))?;
    let handle = event_loop.handle();

    handle
        .insert_source(sensor_rx, |event, _, state| {
            if let ChannelEvent::Msg(msg) = event {
                state.on_sensor(msg);
            }
        })
        .map_err(|e| Error::EventLoop(format!("cannot watch sensor channel: {}", e.error)))?;

    handle
        .insert_source(lifecycle_rx, |event, _, state| {
            if let ChannelEvent::Msg(request) = event {
                state.on_lifecycle(request);
            }
        })
        .map_err(|e| Error::EventLoop(format!("cannot watch lifecycle channel: {}", e.error)))?;

    if let Some(signals) = signals {
        watch_signals(&handle, signals)?;
    }

    let mut state = LoopState {
        controller,
        once: opts.once,
        done: false,
    };

    let result = drive(&mut event_loop, &mut state);

    state.controller.on_deactivate();
    let shutdown = state.controller.surface_mut().shutdown();
    log::debug!("event loop finished");
    result.and(shutdown)
}

fn drive<B, S>(
    event_loop: &mut EventLoop<'static, LoopState<B, S>>,
    state: &mut LoopState<B, S>,
) -> Result<()>
where
    B: SensorBroker + 'static,
    S: TextSurface + 'static,
{
    if !state.controller.has_sensor() {
        // The placeholder is already on the surface and nothing will update it.
        state.done = state.once;
    } else {
        state.controller.on_activate()?;
    }

    while !state.done {
        event_loop
            .dispatch(None, state)
            .map_err(|e| Error::EventLoop(format!("dispatch failed: {e}")))?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn watch_signals<B, S>(
    handle: &LoopHandle<'static, LoopState<B, S>>,
    signals: VisibilitySignals,
) -> Result<()>
where
    B: SensorBroker + 'static,
    S: TextSurface + 'static,
{
    handle
        .insert_source(signals, |event, _, state| {
            if let Some(request) = super::lifecycle::lifecycle_for_signal(event.signal()) {
                state.on_lifecycle(request);
            }
        })
        .map(|_| ())
        .map_err(|e| Error::EventLoop(format!("cannot watch signals: {}", e.error)))
}

#[cfg(not(target_os = "linux"))]
fn watch_signals<B, S>(
    _handle: &LoopHandle<'static, LoopState<B, S>>,
    signals: VisibilitySignals,
) -> Result<()>
where
    B: SensorBroker + 'static,
    S: TextSurface + 'static,
{
    match signals {}
}
