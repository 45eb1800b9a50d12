//! Receive-side playback path
//!
//! Decoded 8 kHz audio is interpolated to the device rate, scaled by the volume gain and queued
//! in the shared jitter buffer. With the `device` feature, [`CpalPlayback`] drains that buffer
//! from a cpal output stream.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::buffer::PlaybackJitterBuffer;
use crate::dsp::Interpolator;

/// Jitter buffer shared between the network context and the device callback
pub type SharedJitterBuffer = Arc<Mutex<PlaybackJitterBuffer>>;

pub fn shared_jitter_buffer(capacity: usize) -> SharedJitterBuffer {
    Arc::new(Mutex::new(PlaybackJitterBuffer::new(capacity)))
}

/// Linear gain for a 0..=99 volume setting; 0 mutes
pub fn volume_gain(volume: u8) -> f32 {
    match volume {
        0 => 0.0,
        v => 10f64.powf((v.min(99) as f64 - 99.0) / 39.2) as f32,
    }
}

/// Interpolator, volume and jitter buffer in series
pub struct PlaybackPath {
    interpolator: Interpolator,
    gain: f32,
    volume: u8,
    buffer: SharedJitterBuffer,
    scratch_in: Vec<f32>,
    scratch_out: Vec<f32>,
}

impl PlaybackPath {
    pub fn new(buffer: SharedJitterBuffer) -> Self {
        Self {
            interpolator: Interpolator::x6(),
            gain: volume_gain(99),
            volume: 99,
            buffer,
            scratch_in: Vec::new(),
            scratch_out: Vec::new(),
        }
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(99);
        self.gain = volume_gain(self.volume);
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn buffer(&self) -> SharedJitterBuffer {
        Arc::clone(&self.buffer)
    }

    /// Queue one block of 8 kHz samples
    pub fn write(&mut self, pcm: &[i16]) {
        if pcm.is_empty() {
            return;
        }
        self.scratch_in.clear();
        self.scratch_in.extend(pcm.iter().map(|&s| s as f32));
        self.scratch_out.clear();
        self.interpolator
            .process(&self.scratch_in, &mut self.scratch_out);

        let gain = self.gain;
        self.scratch_out.iter_mut().for_each(|s| *s *= gain);
        self.buffer.lock().put(&self.scratch_out);
    }

    /// Drop queued audio and filter history
    pub fn reset(&mut self) {
        self.interpolator.reset();
        self.buffer.lock().reset();
    }
}

#[cfg(feature = "device")]
pub use cpal_output::CpalPlayback;

#[cfg(feature = "device")]
mod cpal_output {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, StreamTrait};
    use cpal::StreamConfig;
    use crossbeam_channel::{bounded, Receiver};
    use tracing::{error, info};

    use super::SharedJitterBuffer;
    use crate::audio::buffer::DEVICE_RATE;
    use crate::audio::device::{get_default_output_device, get_device_by_id};
    use crate::audio::output::{join_device_thread, AudioOutput};
    use crate::error::AudioError;

    /// cpal output stream on a dedicated thread, fed from the jitter buffer
    pub struct CpalPlayback {
        device_id: Option<String>,
        buffer: SharedJitterBuffer,
        running: Arc<AtomicBool>,
        thread_handle: Option<JoinHandle<()>>,
        error_rx: Option<Receiver<AudioError>>,
    }

    impl CpalPlayback {
        /// `device_id` of `None` selects the default output device
        pub fn new(device_id: Option<String>, buffer: SharedJitterBuffer) -> Self {
            Self {
                device_id,
                buffer,
                running: Arc::new(AtomicBool::new(false)),
                thread_handle: None,
                error_rx: None,
            }
        }
    }

    impl AudioOutput for CpalPlayback {
        fn start(&mut self) -> Result<(), AudioError> {
            if self.running.load(Ordering::SeqCst) {
                return Ok(());
            }

            let device = match &self.device_id {
                Some(id) => get_device_by_id(id)?,
                None => get_default_output_device()?,
            };
            let channels = device.default_output_config()?.channels();
            let config = StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(DEVICE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let (error_tx, error_rx) = bounded::<AudioError>(16);
            self.error_rx = Some(error_rx);

            // each stream thread owns its own stop flag
            self.running = Arc::new(AtomicBool::new(false));
            let running = self.running.clone();
            let buffer = self.buffer.clone();
            running.store(true, Ordering::SeqCst);

            let handle = thread::Builder::new()
                .name("playback".into())
                .spawn(move || {
                    let mut mono: Vec<f32> = Vec::new();
                    let stream = device.into_inner().build_output_stream(
                        &config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let frames = data.len() / channels as usize;
                            mono.resize(frames, 0.0);
                            buffer.lock().pull(&mut mono);
                            for (frame, &s) in data.chunks_mut(channels as usize).zip(&mono) {
                                frame.fill(s / 32768.0);
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
                                error!("Failed to start output stream: {}", e);
                                return;
                            }
                            info!("Playback stream running at {} Hz", DEVICE_RATE);
                            while running.load(Ordering::Relaxed) {
                                thread::sleep(Duration::from_millis(10));
                            }
                        }
                        Err(e) => {
                            error!("Failed to build output stream: {}", e);
                        }
                    }
                })
                .map_err(|e| AudioError::StreamError(e.to_string()))?;

            self.thread_handle = Some(handle);
            Ok(())
        }

        fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.thread_handle.take() {
                join_device_thread(handle, "playback");
            }
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn check_errors(&self) -> Option<AudioError> {
            self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
        }
    }

    impl Drop for CpalPlayback {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
