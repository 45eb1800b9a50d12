//! Transmit-side capture path
//!
//! Device audio at 48 kHz is decimated to 8 kHz blocks. With the `device` feature,
//! [`CpalCapture`] runs a cpal input stream on its own thread and hands blocks to the network
//! context over a bounded channel.

use crate::audio::buffer::{PcmBlock, INTERNAL_RATE};
use crate::dsp::Decimator;

/// ÷6 decimation from device blocks to internal-rate PCM blocks
pub struct CapturePath {
    decimator: Decimator,
    scratch: Vec<f32>,
}

impl CapturePath {
    pub fn new() -> Self {
        Self {
            decimator: Decimator::by6(),
            scratch: Vec::new(),
        }
    }

    /// Decimate one device block. `samples` are mono, scaled to the 16-bit range.
    pub fn process(&mut self, samples: &[f32]) -> PcmBlock {
        self.scratch.clear();
        self.decimator.process(samples, &mut self.scratch);
        let pcm = self.scratch.iter().map(|&s| s as i16).collect();
        PcmBlock::new(pcm, INTERNAL_RATE)
    }

    pub fn reset(&mut self) {
        self.decimator.reset();
    }
}

impl Default for CapturePath {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "device")]
pub use cpal_input::CpalCapture;

#[cfg(feature = "device")]
mod cpal_input {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, StreamTrait};
    use cpal::StreamConfig;
    use crossbeam_channel::{bounded, Receiver};
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};

    use super::CapturePath;
    use crate::audio::buffer::{PcmBlock, DEVICE_RATE};
    use crate::audio::device::{get_default_input_device, get_device_by_id};
    use crate::audio::output::join_device_thread;
    use crate::error::AudioError;

    /// cpal input stream on a dedicated thread
    pub struct CpalCapture {
        device_id: Option<String>,
        running: Arc<AtomicBool>,
        thread_handle: Option<JoinHandle<()>>,
        error_rx: Option<Receiver<AudioError>>,
        blocks_dropped: Arc<AtomicU64>,
    }

    impl CpalCapture {
        /// `device_id` of `None` selects the default input device
        pub fn new(device_id: Option<String>) -> Self {
            Self {
                device_id,
                running: Arc::new(AtomicBool::new(false)),
                thread_handle: None,
                error_rx: None,
                blocks_dropped: Arc::new(AtomicU64::new(0)),
            }
        }

        /// Start capturing; 8 kHz blocks are sent to `tx` and dropped when it is full
        pub fn start(&mut self, tx: mpsc::Sender<PcmBlock>) -> Result<(), AudioError> {
            if self.running.load(Ordering::SeqCst) {
                return Ok(());
            }

            let device = match &self.device_id {
                Some(id) => get_device_by_id(id)?,
                None => get_default_input_device()?,
            };
            let channels = device.default_input_config()?.channels();
            let config = StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(DEVICE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let (error_tx, error_rx) = bounded::<AudioError>(16);
            self.error_rx = Some(error_rx);

            self.running = Arc::new(AtomicBool::new(false));
            let running = self.running.clone();
            let running_for_loop = self.running.clone();
            let dropped = self.blocks_dropped.clone();
            running.store(true, Ordering::SeqCst);

            let handle = thread::Builder::new()
                .name("capture".into())
                .spawn(move || {
                    let mut path = CapturePath::new();
                    let mut mono: Vec<f32> = Vec::new();
                    let stream = device.into_inner().build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            if !running.load(Ordering::Relaxed) {
                                return;
                            }
                            // first channel only
                            mono.clear();
                            mono.extend(
                                data.iter()
                                    .step_by(channels as usize)
                                    .map(|&s| s * 32767.0),
                            );
                            let block = path.process(&mono);
                            if block.is_empty() {
                                return;
                            }
                            if tx.try_send(block).is_err() {
                                dropped.fetch_add(1, Ordering::Relaxed);
                            }
                        },
                        move |err| {
                            let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                        },
                        None,
                    );

                    match stream {
                        Ok(stream) => {
                            if let Err(e) = stream.play() {
                                error!("Failed to start input stream: {}", e);
                                return;
                            }
                            info!("Capture stream running at {} Hz", DEVICE_RATE);
                            while running_for_loop.load(Ordering::Relaxed) {
                                thread::sleep(Duration::from_millis(10));
                            }
                        }
                        Err(e) => {
                            error!("Failed to build input stream: {}", e);
                        }
                    }
                })
                .map_err(|e| AudioError::StreamError(e.to_string()))?;

            self.thread_handle = Some(handle);
            Ok(())
        }

        pub fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.thread_handle.take() {
                join_device_thread(handle, "capture");
            }
            let dropped = self.blocks_dropped.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                warn!("Capture dropped {} blocks while the channel was full", dropped);
            }
        }

        pub fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        pub fn blocks_dropped(&self) -> u64 {
            self.blocks_dropped.load(Ordering::Relaxed)
        }

        pub fn check_errors(&self) -> Option<AudioError> {
            self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
        }
    }

    impl Drop for CpalCapture {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
