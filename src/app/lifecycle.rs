use calloop::channel::Sender;

use crate::{Error, Result};

/// Visibility and shutdown requests delivered to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// The display is visible again.
    Activate,
    /// The display is hidden; stop listening.
    Deactivate,
    Shutdown,
}

/// Route SIGINT/SIGTERM into a `Shutdown` request instead of exiting on the spot.
pub(super) fn install_shutdown_handler(tx: Sender<Lifecycle>) -> Result<()> {
    ctrlc::set_handler(move || {
        if tx.send(Lifecycle::Shutdown).is_err() {
            // Loop already gone.
            std::process::exit(130);
        }
    })
    .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

#[cfg(target_os = "linux")]
pub use calloop::signals::Signals as VisibilitySignals;

/// No signalfd outside Linux.
#[cfg(not(target_os = "linux"))]
pub enum VisibilitySignals {}

/// SIGUSR1 hides the display, SIGUSR2 shows it again.
///
/// The signals are blocked on the calling thread, so this must run before any
/// other thread is spawned for the mask to be inherited.
#[cfg(target_os = "linux")]
pub(super) fn visibility_signals() -> Result<Option<VisibilitySignals>> {
    use calloop::signals::Signal;

    VisibilitySignals::new(&[Signal::SIGUSR1, Signal::SIGUSR2])
        .map(Some)
        .map_err(|e| Error::EventLoop(format!("cannot watch SIGUSR1/SIGUSR2: {e}")))
}

#[cfg(not(target_os = "linux"))]
pub(super) fn visibility_signals() -> Result<Option<VisibilitySignals>> {
    Ok(None)
}

#[cfg(target_os = "linux")]
pub(super) fn lifecycle_for_signal(signal: calloop::signals::Signal) -> Option<Lifecycle> {
    use calloop::signals::Signal;

    match signal {
        Signal::SIGUSR1 => Some(Lifecycle::Deactivate),
        Signal::SIGUSR2 => Some(Lifecycle::Activate),
        _ => None,
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use calloop::signals::Signal;

    #[test]
    fn user_signals_map_to_visibility() {
        assert_eq!(
            lifecycle_for_signal(Signal::SIGUSR1),
            Some(Lifecycle::Deactivate)
        );
        assert_eq!(
            lifecycle_for_signal(Signal::SIGUSR2),
            Some(Lifecycle::Activate)
        );
        assert_eq!(lifecycle_for_signal(Signal::SIGHUP), None);
    }
}
