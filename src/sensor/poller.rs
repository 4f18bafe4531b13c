use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::Result;

/// Background sampling thread owned by one registration. Dropping it stops
/// and joins the thread.
pub(super) struct PollerHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Spawn a thread calling `tick` immediately and then every `interval`.
    /// `tick` receives the time elapsed since the poller started.
    pub(super) fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut(Duration) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let thread = thread::Builder::new().name(name.into()).spawn(move || {
            let started = Instant::now();
            while running_clone.load(Ordering::SeqCst) {
                tick(started.elapsed());
                let deadline = Instant::now() + interval;
                // park_timeout can wake early; stop() unparks us on purpose.
                while running_clone.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
            }
        })?;
        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    pub(super) fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                log::warn!("sensor poller thread panicked");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
