//! Audio subsystem module

pub mod buffer;
pub mod capture;
#[cfg(feature = "device")]
pub mod device;
pub mod output;
pub mod playback;

pub use buffer::{CaptureQueue, JitterStats, PcmBlock, PlaybackJitterBuffer};
pub use capture::CapturePath;
pub use output::{AudioOutput, NullOutput};
pub use playback::{shared_jitter_buffer, volume_gain, PlaybackPath, SharedJitterBuffer};

#[cfg(feature = "device")]
pub use capture::CpalCapture;
#[cfg(feature = "device")]
pub use device::{get_device_by_id, list_devices, AudioDevice, AudioDeviceInfo};
#[cfg(feature = "device")]
pub use playback::CpalPlayback;
