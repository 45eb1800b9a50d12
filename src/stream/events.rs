//! Events emitted to the user interface layer

use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Sender, TrySendError};
use tracing::warn;

use crate::protocol::LinkStatus;

/// Identity strings reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub interface_name: String,
    pub serial_number: String,
    pub custom_name: String,
}

/// One tunable frequency range in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyRange {
    pub min: u64,
    pub max: u64,
}

/// Span limits in Hz, already clamped to the client limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanLimits {
    pub rx_min: u32,
    pub rx_max: u32,
    pub tx_min: u32,
    pub tx_max: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(LinkStatus),
    /// Received signal level in dB×10
    SMeter(i16),
    /// Microphone level in dB×10 while transmitting
    InputLevel(i16),
    VideoFrame(Vec<u8>),
    RxChar(u8),
    RawIq(Bytes),
    FftAvgPower(i16),
    DeviceInfo(DeviceInfo),
    FrequencyRanges {
        transmit: bool,
        ranges: Vec<FrequencyRange>,
    },
    SpanLimits(SpanLimits),
    /// Round trip of the last keepalive request
    Latency(Duration),
    /// Audio stopped because the sound device failed
    StopStreaming(String),
}

/// Non-blocking event sender; events are dropped when the consumer falls behind
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<StreamEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: StreamEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Event queue full, dropping {:?}", event_name(&event));
            }
            // nobody listening
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

fn event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::Status(_) => "Status",
        StreamEvent::SMeter(_) => "SMeter",
        StreamEvent::InputLevel(_) => "InputLevel",
        StreamEvent::VideoFrame(_) => "VideoFrame",
        StreamEvent::RxChar(_) => "RxChar",
        StreamEvent::RawIq(_) => "RawIq",
        StreamEvent::FftAvgPower(_) => "FftAvgPower",
        StreamEvent::DeviceInfo(_) => "DeviceInfo",
        StreamEvent::FrequencyRanges { .. } => "FrequencyRanges",
        StreamEvent::SpanLimits(_) => "SpanLimits",
        StreamEvent::Latency(_) => "Latency",
        StreamEvent::StopStreaming(_) => "StopStreaming",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_emit_drops_when_full() {
        let (tx, rx) = bounded(1);
        let sink = EventSink::new(tx);
        sink.emit(StreamEvent::SMeter(-300));
        sink.emit(StreamEvent::SMeter(-200));
        assert_eq!(rx.try_recv().unwrap(), StreamEvent::SMeter(-300));
        assert!(rx.try_recv().is_err());

        drop(rx);
        sink.emit(StreamEvent::RxChar(b'a'));
    }
}
