//! Playback output seam
//!
//! The orchestrator starts and stops playback through [`AudioOutput`] and never touches a sound
//! device directly.

use std::thread::JoinHandle;

use tracing::warn;

use crate::error::AudioError;

/// A playback sink pulling from the shared jitter buffer
pub trait AudioOutput: Send {
    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Next pending stream error, if any
    fn check_errors(&self) -> Option<AudioError> {
        None
    }
}

/// Output without a device; only tracks the running state
#[derive(Debug, Default)]
pub struct NullOutput {
    running: bool,
    starts: u32,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `start` was called while stopped
    pub fn starts(&self) -> u32 {
        self.starts
    }
}

impl AudioOutput for NullOutput {
    fn start(&mut self) -> Result<(), AudioError> {
        if !self.running {
            self.running = true;
            self.starts += 1;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Join a stopped device thread without blocking an async runtime.
///
/// Inside a tokio runtime the join runs on the blocking pool and its task handle is returned;
/// elsewhere the thread is joined in place. A panicked thread is logged.
pub fn join_device_thread(
    handle: JoinHandle<()>,
    name: &'static str,
) -> Option<tokio::task::JoinHandle<()>> {
    let join = move || {
        if handle.join().is_err() {
            warn!("{} thread panicked", name);
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => Some(runtime.spawn_blocking(join)),
        Err(_) => {
            join();
            None
        }
    }
}
