//! Control commands sent to the server and the link state driven by its responses

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::protocol::items::*;
use crate::protocol::{FramedMessage, LinkStatus, MessageBuilder, MessageKind, TxState};
use crate::stream::events::{DeviceInfo, FrequencyRange, SpanLimits, StreamEvent};

/// Longest client description the server accepts
const MAX_CLIENT_DESCRIPTION: usize = 80;

/// Transmit equalizer: gains in dB, corner frequencies in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Equalizer {
    pub low_shelf_gain: i8,
    pub low_shelf_freq: i16,
    pub peak_gain: i8,
    pub peak_freq: i16,
    pub high_shelf_gain: i8,
    pub high_shelf_freq: i16,
}

/// Requests from the user interface layer
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Ask for names, serial number, span limits and frequency ranges
    RequestInfo,
    Unlock {
        rx_password: String,
        tx_password: String,
    },
    SetRunState(bool),
    SetPtt(TxState),
    ClientDescription(String),
    /// 0 mutes, 99 is full scale
    SetVolume(u8),
    SetRxFrequency(u64),
    SetTxFrequency(u64),
    SetDemodMode(u8),
    SetDigitalMode(u8),
    SendChat(Vec<u8>),
    /// Attenuation in dB, snapped to 0, -10, -20 or -30
    SetAttenuation(i32),
    SetAgc {
        slope: i8,
        threshold: i8,
        delay: u16,
    },
    SetAudioCompression(u8),
    SetVideoCompression(u8),
    SetSquelch(i32),
    SetAudioFilter(u8),
    SetDemodFilter {
        low: i32,
        high: i32,
        offset: i32,
    },
    SetupSpectrum {
        points: u16,
        span: u32,
        max_db: i16,
        min_db: i16,
        average: u8,
        rate: u8,
    },
    SetEqualizer(Equalizer),
    SetTestSignal {
        mode: u8,
        freq: u16,
    },
    SetCtcss(u16),
    RequestFftAvgPower,
    NcoNull,
}

fn set(item: u16) -> MessageBuilder {
    MessageBuilder::control(MessageKind::SetItem, item)
}

fn request(item: u16) -> FramedMessage {
    MessageBuilder::control(MessageKind::ReqItem, item).build()
}

fn frequency(item: u16, hz: u64) -> FramedMessage {
    set(item)
        .u8(0)
        .u32((hz & 0xFFFF_FFFF) as u32)
        .u8((hz >> 32) as u8)
        .build()
}

fn snap_attenuation(db: i32) -> i8 {
    match db {
        d if d > -5 => 0,
        d if d > -15 => -10,
        d if d > -25 => -20,
        _ => -30,
    }
}

impl ControlCommand {
    /// Wire messages for this command, in send order
    pub fn messages(&self) -> Vec<FramedMessage> {
        match self {
            ControlCommand::RequestInfo => vec![
                request(INTERFACE_NAME),
                request(SERIALNUM),
                request(CUSTOM_NAME),
                request(SPECTRUM_RANGE),
                MessageBuilder::control(MessageKind::ReqItemRange, RX_FREQUENCY)
                    .u8(0)
                    .build(),
                MessageBuilder::control(MessageKind::ReqItemRange, TX_FREQUENCY)
                    .u8(0)
                    .build(),
            ],
            ControlCommand::Unlock {
                rx_password,
                tx_password,
            } => vec![
                set(RX_PW_UNLOCK).cstr(rx_password).build(),
                set(TX_PW_UNLOCK).cstr(tx_password).build(),
            ],
            ControlCommand::SetRunState(on) => {
                let state = if *on { RX_STATE_ON } else { RX_STATE_IDLE };
                vec![set(RX_STATE)
                    .u8(RX_STATE_DATAREAL)
                    .u8(state)
                    .u8(0)
                    .u8(0)
                    .build()]
            }
            ControlCommand::SetPtt(state) => vec![set(TX_STATE).u8(0).u8(state.code()).build()],
            ControlCommand::ClientDescription(desc) => {
                if desc.chars().count() > MAX_CLIENT_DESCRIPTION {
                    debug!("Client description too long, not sent");
                    return Vec::new();
                }
                vec![set(LASTCLIENT_INFO).cstr(desc).build()]
            }
            ControlCommand::SetVolume(vol) => vec![set(RX_AF_GAIN).u8(0).u8(*vol).build()],
            ControlCommand::SetRxFrequency(hz) => vec![frequency(RX_FREQUENCY, *hz)],
            ControlCommand::SetTxFrequency(hz) => vec![frequency(TX_FREQUENCY, *hz)],
            ControlCommand::SetDemodMode(mode) => {
                let mut msgs = vec![
                    set(RX_DEMOD_MODE).u8(0).u8(*mode).build(),
                    set(TX_MOD_MODE).u8(0).u8(*mode).build(),
                ];
                if *mode == DEMOD_MODE_DIGITAL {
                    msgs.extend(ControlCommand::SetDigitalMode(DIGITAL_MODE_BPSK31).messages());
                }
                msgs
            }
            ControlCommand::SetDigitalMode(mode) => {
                vec![set(RX_DIGITAL_MODE).u8(0).u8(*mode).build()]
            }
            ControlCommand::SendChat(chars) => vec![MessageBuilder::new(MessageKind::DataItem3)
                .u8(CHAT_TXCHAR)
                .bytes(chars)
                .build()],
            ControlCommand::SetAttenuation(db) => {
                vec![set(RX_RF_GAIN).u8(0).i8(snap_attenuation(*db)).build()]
            }
            ControlCommand::SetAgc {
                slope,
                threshold,
                delay,
            } => vec![set(RX_AGC)
                .u8(0)
                .i8(*threshold)
                .i8(*slope)
                .u16(*delay)
                .build()],
            ControlCommand::SetAudioCompression(mode) => vec![
                set(RX_AUDIO_COMPRESSION).u8(0).u8(*mode).build(),
                set(TX_AUDIO_COMPRESSION).u8(0).u8(*mode).build(),
            ],
            ControlCommand::SetVideoCompression(mode) => {
                vec![set(VIDEO_COMPRESSION).u8(VIDEO_MODE_RXTX).u8(*mode).build()]
            }
            ControlCommand::SetSquelch(level) => {
                let level = (*level).clamp(SQUELCH_THRESH_MIN, SQUELCH_THRESH_MAX);
                vec![set(RX_SQUELCH_THRESH).u8(0).i16(level as i16).build()]
            }
            ControlCommand::SetAudioFilter(filter) => {
                vec![set(RX_AUDIO_FILTER).u8(0).u8(*filter).build()]
            }
            ControlCommand::SetDemodFilter { low, high, offset } => vec![set(RX_DEMOD_FILTER)
                .u8(0)
                .i16(*low as i16)
                .i16(*high as i16)
                .u16(*offset as u16)
                .build()],
            ControlCommand::SetupSpectrum {
                points,
                span,
                max_db,
                min_db,
                average,
                rate,
            } => vec![set(SPECTRUM_SETTINGS)
                .u32(*span)
                .u16(*points)
                .i16(*max_db)
                .i16(*min_db)
                .u8(*average)
                .u8(*rate)
                .build()],
            ControlCommand::SetEqualizer(eq) => vec![set(TX_EQUALIZER)
                .u8(0)
                .i8(eq.low_shelf_gain)
                .i16(eq.low_shelf_freq)
                .i8(eq.peak_gain)
                .i16(eq.peak_freq)
                .i8(eq.high_shelf_gain)
                .i16(eq.high_shelf_freq)
                .build()],
            ControlCommand::SetTestSignal { mode, freq } => {
                vec![set(TX_TESTSIGNAL).u8(*mode).u16(*freq).build()]
            }
            ControlCommand::SetCtcss(freq) => {
                vec![set(TX_FM_PARAMS).u8(0).u16(FM_DEVIATION).u16(*freq).build()]
            }
            ControlCommand::RequestFftAvgPower => vec![request(SPECTRUM_AVEPWR)],
            ControlCommand::NcoNull => vec![set(RX_PERFORM_CAL)
                .u8(0)
                .u8(RX_PERFORM_CAL_NCO_NULL)
                .build()],
        }
    }
}

/// Outcome of one keepalive tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keepalive {
    /// Nothing to send this tick
    Wait,
    /// Send this status request
    Request(FramedMessage),
    /// Too many requests went unanswered; the request that would have been sent is counted
    Expired { unanswered: u32 },
}

/// Clamp a reported span pair to `[lo, hi]`
fn clamp_span(min: u32, max: u32, lo: u32, hi: u32) -> (u32, u32) {
    let min = if min < lo || min >= hi { lo } else { min };
    let max = if max < lo || max > hi { hi } else { max };
    (min, max)
}

/// Server-reported state of the link
#[derive(Debug)]
pub struct LinkState {
    status: LinkStatus,
    keepalive_period: u32,
    keepalive_limit: u32,
    keepalive_timer: i32,
    keepalive_count: u32,
    latency_start: Option<Instant>,
    latency: Option<Duration>,
    transmitting: bool,
    tx_unlocked: bool,
    info: DeviceInfo,
    spans: SpanLimits,
    rx_ranges: Vec<FrequencyRange>,
    tx_ranges: Vec<FrequencyRange>,
}

impl LinkState {
    /// A status request goes out every `period` ticks; more than `limit` unanswered requests
    /// expire the link.
    pub fn new(period: u32, limit: u32) -> Self {
        Self {
            status: LinkStatus::Off,
            keepalive_period: period.max(1),
            keepalive_limit: limit,
            keepalive_timer: 0,
            keepalive_count: 0,
            latency_start: None,
            latency: None,
            transmitting: false,
            tx_unlocked: false,
            info: DeviceInfo::default(),
            spans: SpanLimits {
                rx_min: MIN_RX_SPAN,
                rx_max: MAX_RX_SPAN,
                tx_min: MIN_TX_SPAN,
                tx_max: MAX_TX_SPAN,
            },
            rx_ranges: Vec::new(),
            tx_ranges: Vec::new(),
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn set_status(&mut self, status: LinkStatus) -> StreamEvent {
        if status != self.status {
            info!("Link status: {}", status);
        }
        self.status = status;
        StreamEvent::Status(status)
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    pub fn set_transmitting(&mut self, on: bool) {
        self.transmitting = on;
    }

    pub fn tx_unlocked(&self) -> bool {
        self.tx_unlocked
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn span_limits(&self) -> SpanLimits {
        self.spans
    }

    pub fn frequency_ranges(&self, transmit: bool) -> &[FrequencyRange] {
        if transmit {
            &self.tx_ranges
        } else {
            &self.rx_ranges
        }
    }

    /// Restart keepalive bookkeeping, done whenever the run state changes
    pub fn reset_keepalive(&mut self) {
        self.keepalive_timer = 0;
        self.keepalive_count = 0;
        self.latency_start = None;
        self.latency = None;
        self.tx_unlocked = false;
    }

    /// Advance the keepalive timer by one tick (one second)
    pub fn keepalive_tick(&mut self) -> Keepalive {
        self.keepalive_timer -= 1;
        if self.keepalive_timer > 0 {
            return Keepalive::Wait;
        }
        self.keepalive_timer = self.keepalive_period as i32;
        self.latency_start = Some(Instant::now());
        self.keepalive_count += 1;
        if self.keepalive_count > self.keepalive_limit {
            return Keepalive::Expired {
                unanswered: self.keepalive_count,
            };
        }
        Keepalive::Request(request(STATUS_CODE))
    }

    /// Apply a response or range response from the server
    pub fn on_response(&mut self, msg: &FramedMessage) -> Vec<StreamEvent> {
        let Some(item) = msg.item_id else {
            return Vec::new();
        };
        match msg.kind {
            MessageKind::RESP_ITEM => self.on_item(item, msg),
            MessageKind::RESP_ITEM_RANGE => self.on_range(item, msg),
            _ => Vec::new(),
        }
    }

    fn on_item(&mut self, item: u16, msg: &FramedMessage) -> Vec<StreamEvent> {
        self.keepalive_count = 0;
        let mut p = msg.params();
        let mut events = Vec::new();

        match item {
            INTERFACE_NAME | SERIALNUM | CUSTOM_NAME => {
                let text = p.cstr();
                debug!("Item 0x{:04X}: {}", item, text);
                match item {
                    INTERFACE_NAME => self.info.interface_name = text,
                    SERIALNUM => self.info.serial_number = text,
                    _ => self.info.custom_name = text,
                }
                events.push(StreamEvent::DeviceInfo(self.info.clone()));
            }
            RX_STATE => {
                p.u8();
                if p.u8() == Some(RX_STATE_ON) {
                    events.push(self.set_status(LinkStatus::Receiving));
                }
            }
            STATUS_CODE => {
                if let Some(start) = self.latency_start.take() {
                    let latency = start.elapsed();
                    self.latency = Some(latency);
                    events.push(StreamEvent::Latency(latency));
                }
            }
            RX_PW_UNLOCK => {
                let status = if msg.payload.first() == Some(&0xFF) {
                    LinkStatus::DisconnectPwError
                } else {
                    LinkStatus::PwOk
                };
                events.push(self.set_status(status));
            }
            TX_STATE => {
                p.u8();
                if p.u8() == Some(TxState::On.code()) {
                    events.push(self.set_status(LinkStatus::Transmitting));
                } else {
                    self.transmitting = false;
                    if self.status == LinkStatus::Transmitting {
                        events.push(self.set_status(LinkStatus::Receiving));
                    }
                }
            }
            TX_PW_UNLOCK => {
                self.tx_unlocked = !p.cstr().is_empty();
                debug!("Transmit unlocked: {}", self.tx_unlocked);
            }
            SPECTRUM_RANGE => {
                if let (Some(rx_min), Some(rx_max), Some(tx_min), Some(tx_max)) =
                    (p.u32(), p.u32(), p.u32(), p.u32())
                {
                    let (rx_min, rx_max) = clamp_span(rx_min, rx_max, MIN_RX_SPAN, MAX_RX_SPAN);
                    let (tx_min, tx_max) = clamp_span(tx_min, tx_max, MIN_TX_SPAN, MAX_TX_SPAN);
                    self.spans = SpanLimits {
                        rx_min,
                        rx_max,
                        tx_min,
                        tx_max,
                    };
                    debug!("Span limits {:?}", self.spans);
                    events.push(StreamEvent::SpanLimits(self.spans));
                }
            }
            SPECTRUM_AVEPWR => {
                if let Some(power) = p.i16() {
                    events.push(StreamEvent::FftAvgPower(power));
                }
            }
            _ => {}
        }
        events
    }

    fn on_range(&mut self, item: u16, msg: &FramedMessage) -> Vec<StreamEvent> {
        let transmit = match item {
            RX_FREQUENCY => false,
            TX_FREQUENCY => true,
            _ => return Vec::new(),
        };
        let mut p = msg.params();
        p.u8();
        let count = p.u8().unwrap_or(0);
        let mut ranges = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match (p.u40(), p.u40()) {
                (Some(min), Some(max)) => ranges.push(FrequencyRange { min, max }),
                _ => break,
            }
        }
        debug!(
            "{} frequency ranges: {:?}",
            if transmit { "Tx" } else { "Rx" },
            ranges
        );
        if transmit {
            self.tx_ranges = ranges.clone();
        } else {
            self.rx_ranges = ranges.clone();
        }
        vec![StreamEvent::FrequencyRanges { transmit, ranges }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn wire(cmd: ControlCommand) -> Vec<Vec<u8>> {
        cmd.messages()
            .iter()
            .map(|m| m.encode().unwrap().to_vec())
            .collect()
    }

    fn response(item: u16, params: &[u8]) -> FramedMessage {
        FramedMessage::new(
            MessageKind::RESP_ITEM,
            Some(item),
            Bytes::copy_from_slice(params),
        )
    }

    #[test]
    fn test_run_state_encoding() {
        assert_eq!(
            wire(ControlCommand::SetRunState(true)),
            vec![vec![0x08, 0x00, 0x18, 0x00, 0x00, 0x02, 0x00, 0x00]]
        );
        assert_eq!(
            wire(ControlCommand::SetRunState(false))[0][5],
            RX_STATE_IDLE
        );
    }

    #[test]
    fn test_request_info_sequence() {
        let msgs = ControlCommand::RequestInfo.messages();
        let items: Vec<_> = msgs.iter().map(|m| (m.kind, m.item_id)).collect();
        assert_eq!(
            items,
            vec![
                (MessageKind::ReqItem, Some(INTERFACE_NAME)),
                (MessageKind::ReqItem, Some(SERIALNUM)),
                (MessageKind::ReqItem, Some(CUSTOM_NAME)),
                (MessageKind::ReqItem, Some(SPECTRUM_RANGE)),
                (MessageKind::ReqItemRange, Some(RX_FREQUENCY)),
                (MessageKind::ReqItemRange, Some(TX_FREQUENCY)),
            ]
        );
        assert_eq!(&msgs[4].payload[..], &[0]);
    }

    #[test]
    fn test_frequency_encoding() {
        let bytes = wire(ControlCommand::SetRxFrequency(0x01_0000_0010));
        assert_eq!(
            bytes[0],
            vec![0x0A, 0x00, 0x20, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_unlock_strings() {
        let bytes = wire(ControlCommand::Unlock {
            rx_password: "ab".into(),
            tx_password: String::new(),
        });
        assert_eq!(bytes[0], vec![0x07, 0x00, 0x1A, 0x00, b'a', b'b', 0x00]);
        assert_eq!(bytes[1], vec![0x05, 0x00, 0x1A, 0x01, 0x00]);
    }

    #[test]
    fn test_attenuation_snaps() {
        assert_eq!(snap_attenuation(3), 0);
        assert_eq!(snap_attenuation(-7), -10);
        assert_eq!(snap_attenuation(-15), -20);
        assert_eq!(snap_attenuation(-60), -30);
        let msg = &ControlCommand::SetAttenuation(-12).messages()[0];
        assert_eq!(&msg.payload[..], &[0x00, 0xF6]);
    }

    #[test]
    fn test_squelch_clamped() {
        let msg = &ControlCommand::SetSquelch(-500).messages()[0];
        assert_eq!(&msg.payload[..], &[0x00, 0x60, 0xFF]);
        let msg = &ControlCommand::SetSquelch(20).messages()[0];
        assert_eq!(&msg.payload[..], &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_demod_mode_digital_adds_bpsk() {
        let msgs = ControlCommand::SetDemodMode(DEMOD_MODE_DIGITAL).messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[2].item_id, Some(RX_DIGITAL_MODE));
        assert_eq!(&msgs[2].payload[..], &[0, DIGITAL_MODE_BPSK31]);
        assert_eq!(ControlCommand::SetDemodMode(1).messages().len(), 2);
    }

    #[test]
    fn test_parameter_layouts() {
        let agc = &ControlCommand::SetAgc {
            slope: 2,
            threshold: -100,
            delay: 500,
        }
        .messages()[0];
        assert_eq!(&agc.payload[..], &[0x00, 0x9C, 0x02, 0xF4, 0x01]);

        let filter = &ControlCommand::SetDemodFilter {
            low: -2800,
            high: -300,
            offset: 1500,
        }
        .messages()[0];
        assert_eq!(
            &filter.payload[..],
            &[0x00, 0x10, 0xF5, 0xD4, 0xFE, 0xDC, 0x05]
        );

        let spectrum = &ControlCommand::SetupSpectrum {
            points: 512,
            span: 48000,
            max_db: 0,
            min_db: -120,
            average: 4,
            rate: 10,
        }
        .messages()[0];
        assert_eq!(
            &spectrum.payload[..],
            &[0x80, 0xBB, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x88, 0xFF, 4, 10]
        );

        let ctcss = &ControlCommand::SetCtcss(885).messages()[0];
        assert_eq!(&ctcss.payload[..], &[0x00, 0x88, 0x13, 0x75, 0x03]);

        let chat = ControlCommand::SendChat(b"hi".to_vec()).messages()[0]
            .encode()
            .unwrap();
        assert_eq!(&chat[..], &[0x05, 0xE0, CHAT_TXCHAR, b'h', b'i']);

        let video = &ControlCommand::SetVideoCompression(2).messages()[0];
        assert_eq!(&video.payload[..], &[VIDEO_MODE_RXTX, 2]);
    }

    #[test]
    fn test_long_client_description_dropped() {
        assert!(ControlCommand::ClientDescription("x".repeat(81))
            .messages()
            .is_empty());
        assert_eq!(
            ControlCommand::ClientDescription("x".repeat(80)).messages().len(),
            1
        );
    }

    #[test]
    fn test_keepalive_expires_after_four_requests() {
        let mut link = LinkState::new(2, 3);
        let mut requests = 0;
        let mut expired_at = None;
        for tick in 1..=20 {
            match link.keepalive_tick() {
                Keepalive::Wait => {}
                Keepalive::Request(msg) => {
                    assert_eq!(msg.item_id, Some(STATUS_CODE));
                    assert_eq!(msg.kind, MessageKind::ReqItem);
                    requests += 1;
                }
                Keepalive::Expired { unanswered } => {
                    assert_eq!(unanswered, 4);
                    expired_at = Some(tick);
                    break;
                }
            }
        }
        assert_eq!(requests, 3);
        assert_eq!(expired_at, Some(7));
    }

    #[test]
    fn test_response_resets_keepalive() {
        let mut link = LinkState::new(1, 1);
        assert!(matches!(link.keepalive_tick(), Keepalive::Request(_)));
        let events = link.on_response(&response(STATUS_CODE, &[]));
        assert!(matches!(events[0], StreamEvent::Latency(_)));
        assert!(link.latency().is_some());
        assert!(matches!(link.keepalive_tick(), Keepalive::Request(_)));
        assert!(matches!(link.keepalive_tick(), Keepalive::Expired { .. }));
    }

    #[test]
    fn test_status_responses() {
        let mut link = LinkState::new(2, 3);
        assert_eq!(
            link.on_response(&response(RX_PW_UNLOCK, b"secret\0")),
            vec![StreamEvent::Status(LinkStatus::PwOk)]
        );
        assert_eq!(
            link.on_response(&response(RX_PW_UNLOCK, &[0xFF, 0x00])),
            vec![StreamEvent::Status(LinkStatus::DisconnectPwError)]
        );
        link.on_response(&response(RX_STATE, &[0x00, RX_STATE_ON]));
        assert_eq!(link.status(), LinkStatus::Receiving);

        link.set_transmitting(true);
        link.on_response(&response(TX_STATE, &[0x00, 0x01]));
        assert_eq!(link.status(), LinkStatus::Transmitting);
        let events = link.on_response(&response(TX_STATE, &[0x00, 0x00]));
        assert_eq!(events, vec![StreamEvent::Status(LinkStatus::Receiving)]);
        assert!(!link.is_transmitting());

        link.on_response(&response(TX_PW_UNLOCK, b"tx\0"));
        assert!(link.tx_unlocked());
        link.on_response(&response(TX_PW_UNLOCK, &[0x00]));
        assert!(!link.tx_unlocked());
    }

    #[test]
    fn test_device_info_accumulates() {
        let mut link = LinkState::new(2, 3);
        link.on_response(&response(INTERFACE_NAME, b"SDR-IP\0"));
        let events = link.on_response(&response(SERIALNUM, b"PS000123\0"));
        match &events[0] {
            StreamEvent::DeviceInfo(info) => {
                assert_eq!(info.interface_name, "SDR-IP");
                assert_eq!(info.serial_number, "PS000123");
                assert!(info.custom_name.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_span_limits_clamped() {
        let mut link = LinkState::new(2, 3);
        let mut params = Vec::new();
        for v in [500u32, 20_000_000, 2000, 30_000] {
            params.extend_from_slice(&v.to_le_bytes());
        }
        let events = link.on_response(&response(SPECTRUM_RANGE, &params));
        assert_eq!(
            events,
            vec![StreamEvent::SpanLimits(SpanLimits {
                rx_min: 1000,
                rx_max: 10_000_000,
                tx_min: 2000,
                tx_max: 30_000,
            })]
        );
        assert_eq!(clamp_span(40_000, 50_000, 1000, 40_000), (1000, 40_000));
    }

    #[test]
    fn test_frequency_ranges() {
        let mut link = LinkState::new(2, 3);
        let mut params = vec![0x00, 0x02];
        for (lo, hi) in [(100_000u32, 0u8), (0x0000_0010, 1), (0, 0), (0xFFFF_FFFF, 0)] {
            params.extend_from_slice(&lo.to_le_bytes());
            params.push(hi);
        }
        let msg = FramedMessage::new(
            MessageKind::RESP_ITEM_RANGE,
            Some(RX_FREQUENCY),
            Bytes::from(params),
        );
        let events = link.on_response(&msg);
        let expected = vec![
            FrequencyRange {
                min: 100_000,
                max: 0x01_0000_0010,
            },
            FrequencyRange {
                min: 0,
                max: 0xFFFF_FFFF,
            },
        ];
        assert_eq!(
            events,
            vec![StreamEvent::FrequencyRanges {
                transmit: false,
                ranges: expected.clone(),
            }]
        );
        assert_eq!(link.frequency_ranges(false), &expected[..]);
        assert!(link.frequency_ranges(true).is_empty());
    }

    #[test]
    fn test_fft_average_power() {
        let mut link = LinkState::new(2, 3);
        let events = link.on_response(&response(SPECTRUM_AVEPWR, &(-850i16).to_le_bytes()));
        assert_eq!(events, vec![StreamEvent::FftAvgPower(-850)]);
    }
}
