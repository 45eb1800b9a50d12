//! Routing between framed messages, codecs and the audio paths
//!
//! [`StreamOrchestrator`] owns one ADPCM codec per direction, the receive post filter, the
//! playback path and the capture queue. It is the only place where the compression mode
//! changes; the codecs never pick a mode themselves. Outgoing messages are staged and collected
//! by the transport with [`StreamOrchestrator::take_outbound`].

use bytes::Bytes;
use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};

use crate::audio::buffer::{JitterStats, PcmBlock, INTERNAL_RATE};
use crate::audio::{AudioOutput, CaptureQueue, PlaybackPath};
use crate::codec::{AdpcmCodec, AdpcmRate, CompandingLaw};
use crate::dsp::{Fir, LowPassSpec};
use crate::error::{AudioError, NetworkError, ProtocolError};
use crate::protocol::items::{
    CHAT_RXCHAR, CHAT_TXECHO, MAX_DATAPKT_LENGTH, RX_AUDIO_COMPRESSION,
};
use crate::protocol::{
    CompressionMode, FramedMessage, LinkStatus, MessageBuilder, MessageKind, TxState,
};
use crate::stream::control::{ControlCommand, Keepalive, LinkState};
use crate::stream::events::{EventSink, StreamEvent};
use crate::stream::video::VideoDecoder;

/// Companding law of the `ULaw` compression mode; the link has no A-law mode
const LINK_LAW: CompandingLaw = CompandingLaw::ULaw;

/// Default keepalive period in ticks
pub const KEEPALIVE_PERIOD: u32 = 2;

/// Default number of unanswered keepalive requests tolerated
pub const KEEPALIVE_TRY_LIMIT: u32 = 3;

pub struct StreamOrchestrator {
    mode: CompressionMode,
    rx_adpcm: AdpcmCodec,
    tx_adpcm: AdpcmCodec,
    post_filter: Fir,
    demod_filter: Option<(i32, i32, i32)>,
    playback: PlaybackPath,
    output: Box<dyn AudioOutput>,
    capture: CaptureQueue,
    max_tx_samples: usize,
    video: VideoDecoder,
    link: LinkState,
    events: EventSink,
    outbound: Vec<FramedMessage>,
    rx_pcm: Vec<i16>,
    tx_pcm: Vec<i16>,
}

impl StreamOrchestrator {
    pub fn new(
        playback: PlaybackPath,
        output: Box<dyn AudioOutput>,
        events: Sender<StreamEvent>,
    ) -> Self {
        Self {
            mode: CompressionMode::NoAudio,
            rx_adpcm: AdpcmCodec::new(AdpcmRate::Rate32),
            tx_adpcm: AdpcmCodec::new(AdpcmRate::Rate32),
            post_filter: Fir::passthrough(),
            demod_filter: None,
            playback,
            output,
            capture: CaptureQueue::default(),
            max_tx_samples: 0,
            video: VideoDecoder::new(),
            link: LinkState::new(KEEPALIVE_PERIOD, KEEPALIVE_TRY_LIMIT),
            events: EventSink::new(events),
            outbound: Vec::new(),
            rx_pcm: Vec::new(),
            tx_pcm: Vec::new(),
        }
    }

    /// Replace the keepalive period and retry limit
    pub fn with_keepalive(mut self, period: u32, try_limit: u32) -> Self {
        self.link = LinkState::new(period, try_limit);
        self
    }

    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn compression_mode(&self) -> CompressionMode {
        self.mode
    }

    pub fn is_transmitting(&self) -> bool {
        self.link.is_transmitting()
    }

    pub fn is_output_running(&self) -> bool {
        self.output.is_running()
    }

    pub fn link(&self) -> &LinkState {
        &self.link
    }

    pub fn volume(&self) -> u8 {
        self.playback.volume()
    }

    pub fn jitter_stats(&self) -> JitterStats {
        self.playback.buffer().lock().stats()
    }

    pub fn set_status(&mut self, status: LinkStatus) {
        let event = self.link.set_status(status);
        self.events.emit(event);
    }

    /// Messages staged since the last call, in send order
    pub fn take_outbound(&mut self) -> Vec<FramedMessage> {
        std::mem::take(&mut self.outbound)
    }

    /// Route one received message.
    ///
    /// An oversized message ends the link with `DisconnectTimeout` and is returned as an error.
    pub fn handle_message(&mut self, msg: &FramedMessage) -> Result<(), ProtocolError> {
        let len = msg.encoded_len();
        if len > MAX_DATAPKT_LENGTH {
            error!("Received message of {} bytes, closing link", len);
            self.shutdown(LinkStatus::DisconnectTimeout);
            return Err(ProtocolError::MessageTooLong {
                declared: len,
                limit: MAX_DATAPKT_LENGTH,
            });
        }

        match msg.kind {
            // response item
            MessageKind::SetItem => {
                if msg.item_id == Some(RX_AUDIO_COMPRESSION) {
                    self.on_audio_compression_response(msg);
                }
                let events = self.link.on_response(msg);
                self.emit_all(events);
            }
            // unsolicited item
            MessageKind::ReqItem => {
                debug!("Unsolicited item {:?}", msg.item_id);
            }
            // range response
            MessageKind::ReqItemRange => {
                let events = self.link.on_response(msg);
                self.emit_all(events);
            }
            MessageKind::DataItem0 => self.on_audio_packet(&msg.payload),
            MessageKind::DataItem1 => {
                if let Some(frame) = self.video.decode(&msg.payload) {
                    self.events.emit(StreamEvent::VideoFrame(frame));
                }
            }
            MessageKind::DataItem3 => {
                if let [kind, ch, ..] = &msg.payload[..] {
                    if *kind == CHAT_RXCHAR || *kind == CHAT_TXECHO {
                        self.events.emit(StreamEvent::RxChar(*ch));
                    }
                }
            }
            MessageKind::DataItem2 | MessageKind::Ack => {}
        }
        Ok(())
    }

    /// Queue captured 8 kHz audio and stage every full transmit packet
    pub fn push_capture(&mut self, block: &PcmBlock) {
        if block.sample_rate != INTERNAL_RATE {
            warn!(
                "Dropping capture block at {} Hz, expected {} Hz",
                block.sample_rate, INTERNAL_RATE
            );
            return;
        }
        if !self.link.is_transmitting() || !self.mode.is_audio() || self.max_tx_samples == 0 {
            return;
        }
        self.capture.put(&block.samples);

        while self.capture.available() >= self.max_tx_samples {
            self.tx_pcm.clear();
            self.capture.get(self.max_tx_samples, &mut self.tx_pcm);

            let mut body = Vec::with_capacity(self.max_tx_samples + 1);
            body.push(self.mode.code());
            match self.mode {
                CompressionMode::Raw => {
                    body.extend(self.tx_pcm.iter().map(|&s| (s >> 8) as u8));
                }
                CompressionMode::ULaw => {
                    LINK_LAW.encode_block(&self.tx_pcm, &mut body);
                }
                _ => {
                    // codes start right after the mode byte
                    self.tx_adpcm.encode(&self.tx_pcm, &mut body, 8);
                }
            }
            self.outbound
                .push(FramedMessage::data(MessageKind::DataItem0, Bytes::from(body)));

            let level = self.capture.input_level();
            self.events.emit(StreamEvent::InputLevel(level));
        }
    }

    /// Apply a control command: local side effects first, then the wire messages
    pub fn apply(&mut self, cmd: ControlCommand) {
        match &cmd {
            ControlCommand::SetPtt(state) => {
                self.set_ptt(*state);
                return;
            }
            ControlCommand::SetRunState(on) => {
                debug!("Run state {}", on);
                self.link.reset_keepalive();
            }
            ControlCommand::SetVolume(volume) => self.playback.set_volume(*volume),
            ControlCommand::SetDemodFilter { low, high, offset } => {
                let key = (*low, *high, *offset);
                if self.demod_filter == Some(key) {
                    return;
                }
                self.demod_filter = Some(key);
                self.post_filter = Fir::low_pass(&LowPassSpec::for_demod(*low, *high, *offset));
                debug!(
                    "Post filter rebuilt with {} taps for {}..{} Hz",
                    self.post_filter.taps(),
                    low,
                    high
                );
            }
            _ => {}
        }
        self.outbound.extend(cmd.messages());
    }

    /// Switch transmit on or off. Capture, playback and the transmit codec restart.
    pub fn set_ptt(&mut self, state: TxState) {
        info!("PTT {:?}", state);
        self.outbound.extend(ControlCommand::SetPtt(state).messages());
        self.link.set_transmitting(state == TxState::On);
        self.capture.clear();
        self.playback.reset();
        self.tx_adpcm.reset();
    }

    /// One-second housekeeping: keepalive requests and device error polling
    pub fn keepalive_tick(&mut self) -> Result<(), NetworkError> {
        if let Some(err) = self.output.check_errors() {
            self.on_device_error(err);
        }
        match self.link.keepalive_tick() {
            Keepalive::Wait => Ok(()),
            Keepalive::Request(msg) => {
                self.outbound.push(msg);
                Ok(())
            }
            Keepalive::Expired { unanswered } => {
                warn!("{} keepalive requests unanswered", unanswered);
                self.shutdown(LinkStatus::DisconnectTimeout);
                Err(NetworkError::KeepaliveTimeout(unanswered))
            }
        }
    }

    /// The sound device failed: stop audio and start clean next time
    pub fn on_device_error(&mut self, err: AudioError) {
        error!("Audio device error: {}", err);
        self.stop_output();
        self.rx_adpcm.reset();
        self.tx_adpcm.reset();
        self.capture.clear();
        self.events.emit(StreamEvent::StopStreaming(err.to_string()));
    }

    /// End of the link: stop audio, drop staged messages and report `status`
    pub fn shutdown(&mut self, status: LinkStatus) {
        self.stop_output();
        self.rx_adpcm.reset();
        self.tx_adpcm.reset();
        self.capture.clear();
        self.link.set_transmitting(false);
        self.mode = CompressionMode::NoAudio;
        self.max_tx_samples = 0;
        self.outbound.clear();
        self.set_status(status);
    }

    fn emit_all(&self, events: Vec<StreamEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    fn stop_output(&mut self) {
        if self.output.is_running() {
            self.output.stop();
        }
        self.playback.reset();
    }

    fn on_audio_compression_response(&mut self, msg: &FramedMessage) {
        let mut p = msg.params();
        p.u8();
        if p.u8() == Some(CompressionMode::NoAudio.code()) {
            self.mode = CompressionMode::NoAudio;
            self.stop_output();
        }
    }

    fn on_audio_packet(&mut self, payload: &Bytes) {
        if payload.len() < 3 {
            debug!("Short audio packet ({} bytes)", payload.len());
            return;
        }
        let meter = i16::from_le_bytes([payload[0], payload[1]]);
        let mode = CompressionMode::from_code(payload[2]);

        if mode != self.mode {
            info!("Audio compression {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            if mode.is_audio() {
                self.setup_audio();
            } else {
                self.stop_output();
            }
        }

        if mode.is_audio() {
            self.decode_audio(&payload[3..]);
            self.play_decoded();
        } else {
            self.events.emit(StreamEvent::RawIq(payload.slice(3..)));
        }

        if !self.link.is_transmitting() {
            self.events.emit(StreamEvent::SMeter(meter));
        }
    }

    fn setup_audio(&mut self) {
        self.rx_adpcm.reset();
        self.tx_adpcm.reset();
        if self.mode == CompressionMode::NoAudio {
            self.stop_output();
        } else if !self.output.is_running() {
            if let Err(e) = self.output.start() {
                self.on_device_error(e);
            }
        }
        if let Some(rate) = self.mode.adpcm_rate() {
            self.rx_adpcm.set_rate(rate);
            self.tx_adpcm.set_rate(rate);
        }
        self.max_tx_samples = self.mode.max_tx_samples();
    }

    /// Decode one audio payload into `rx_pcm`
    fn decode_audio(&mut self, data: &[u8]) {
        self.rx_pcm.clear();
        if data.len() == 2 {
            // squelch closed: count of silent samples
            let n = u16::from_le_bytes([data[0], data[1]]) as usize;
            self.rx_pcm.resize(n, 0);
            return;
        }
        match self.mode {
            CompressionMode::Raw => {
                self.rx_pcm
                    .extend(data.iter().map(|&b| (b as i8 as i16) << 8));
            }
            CompressionMode::ULaw => {
                LINK_LAW.decode_block(data, &mut self.rx_pcm);
            }
            mode if mode.adpcm_rate().is_some() => {
                self.rx_adpcm
                    .decode(data, 0, data.len() * 8, &mut self.rx_pcm);
            }
            _ => {}
        }
    }

    fn play_decoded(&mut self) {
        if !self.output.is_running() || self.rx_pcm.is_empty() {
            return;
        }
        if self.link.is_transmitting() {
            self.rx_pcm.fill(0);
        } else {
            self.post_filter.process_i16(&mut self.rx_pcm);
        }
        self.playback.write(&self.rx_pcm);
    }
}

/// Audio packet as the server sends it: meter, mode byte, then the data
pub fn audio_packet(meter: i16, mode: CompressionMode, data: &[u8]) -> FramedMessage {
    MessageBuilder::new(MessageKind::DataItem0)
        .i16(meter)
        .u8(mode.code())
        .bytes(data)
        .build()
}
