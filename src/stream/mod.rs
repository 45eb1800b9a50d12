//! Stream layer: message routing, control commands and UI events

pub mod control;
pub mod events;
pub mod orchestrator;
pub mod video;

pub use control::{ControlCommand, Equalizer, Keepalive, LinkState};
pub use events::{DeviceInfo, EventSink, FrequencyRange, SpanLimits, StreamEvent};
pub use orchestrator::StreamOrchestrator;
pub use video::VideoDecoder;
