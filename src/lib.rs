//! # SDR Audio Link
//!
//! Client side of a real-time audio link to a remote software-defined radio server.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                               SDR SERVER                                  │
//! └───────────────────────────────────┬──────────────────────────────────────┘
//!                                     │ TCP, ASCP framed messages
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  Session (network::session)                                               │
//! │   reader ──► MessageFramer ──► StreamOrchestrator ──► writer task          │
//! └───────────────────────────────────┬──────────────────────────────────────┘
//!                                     │
//!          ┌──────────────────────────┼───────────────────────────┐
//!          ▼                          ▼                           ▼
//!  ┌───────────────┐         ┌─────────────────┐         ┌─────────────────┐
//!  │ Audio packets │         │ Control items   │         │ Video / chat    │
//!  │ G.711 / G.726 │         │ LinkState       │         │ VideoDecoder    │
//!  └───────┬───────┘         └────────┬────────┘         └────────┬────────┘
//!          │ 8 kHz                    │                           │
//!          ▼                          ▼                           ▼
//!  ┌───────────────┐         ┌──────────────────────────────────────────────┐
//!  │ Post filter   │         │ StreamEvent channel (crossbeam) ──► the UI   │
//!  │ ×6 upsampler  │         └──────────────────────────────────────────────┘
//!  └───────┬───────┘
//!          │ 48 kHz
//!          ▼
//!  ┌───────────────┐   pull   ┌───────────────┐
//!  │ Jitter buffer │ ◄─────── │ Output device │
//!  └───────────────┘          └───────────────┘
//!
//!  Input device ──► ÷6 decimator ──► capture queue ──► transmit packets
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod dsp;
pub mod error;
pub mod network;
pub mod protocol;
pub mod stream;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use network::Session;
pub use stream::{ControlCommand, StreamEvent, StreamOrchestrator};

/// Application-wide constants
pub mod constants {
    pub use crate::audio::buffer::{
        CAPTURE_CAPACITY, DEVICE_RATE, INTERNAL_RATE, JITTER_CAPACITY,
    };
    pub use crate::protocol::items::{MAX_DATAPKT_LENGTH, MAX_VIDEO_LENGTH};

    /// Default TCP port of the SDR server
    pub const DEFAULT_PORT: u16 = 50000;

    /// Ratio between the device rate and the internal codec rate
    pub const RATE_RATIO: usize = 6;
}
