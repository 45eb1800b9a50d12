//! Control item identifiers, parameter values and stream modes

use std::fmt;

use crate::codec::AdpcmRate;

// General items
pub const INTERFACE_NAME: u16 = 0x0001;
pub const SERIALNUM: u16 = 0x0002;
pub const INTERFACE_VERSION: u16 = 0x0003;
pub const STATUS_CODE: u16 = 0x0005;
pub const CUSTOM_NAME: u16 = 0x0008;
pub const LASTCLIENT_INFO: u16 = 0x000D;

// Receiver items
pub const RX_STATE: u16 = 0x0018;
pub const RX_PW_UNLOCK: u16 = 0x001A;
pub const RX_FREQUENCY: u16 = 0x0020;
pub const RX_DEMOD_MODE: u16 = 0x0028;
pub const RX_DIGITAL_MODE: u16 = 0x002A;
pub const RX_RF_GAIN: u16 = 0x0038;
pub const RX_AF_GAIN: u16 = 0x0048;
pub const RX_AGC: u16 = 0x0050;
pub const RX_DEMOD_FILTER: u16 = 0x0058;
pub const RX_SQUELCH_THRESH: u16 = 0x0080;
pub const RX_AUDIO_FILTER: u16 = 0x0082;
pub const RX_AUDIO_COMPRESSION: u16 = 0x0084;
pub const RX_PERFORM_CAL: u16 = 0x00B2;

// Transmitter items
pub const TX_STATE: u16 = 0x0118;
pub const TX_PW_UNLOCK: u16 = 0x011A;
pub const TX_FREQUENCY: u16 = 0x0120;
pub const TX_MOD_MODE: u16 = 0x0128;
pub const TX_TESTSIGNAL: u16 = 0x0130;
pub const TX_EQUALIZER: u16 = 0x0144;
pub const TX_FM_PARAMS: u16 = 0x015A;
pub const TX_AUDIO_COMPRESSION: u16 = 0x0184;

// Spectrum and video items
pub const SPECTRUM_SETTINGS: u16 = 0x0400;
pub const SPECTRUM_RANGE: u16 = 0x0404;
pub const SPECTRUM_AVEPWR: u16 = 0x0406;
pub const VIDEO_COMPRESSION: u16 = 0x0408;

/// RX_STATE parameters
pub const RX_STATE_DATAREAL: u8 = 0x00;
pub const RX_STATE_IDLE: u8 = 0x01;
pub const RX_STATE_ON: u8 = 0x02;

pub const RX_PERFORM_CAL_NCO_NULL: u8 = 0;

pub const SQUELCH_THRESH_MIN: i32 = -160;
pub const SQUELCH_THRESH_MAX: i32 = 0;

pub const DEMOD_MODE_DIGITAL: u8 = 10;
pub const DIGITAL_MODE_BPSK31: u8 = 0;

/// FM deviation sent with the CTCSS setting, in Hz
pub const FM_DEVIATION: u16 = 5000;

/// VIDEO_COMPRESSION applies to both directions
pub const VIDEO_MODE_RXTX: u8 = 2;

/// Data item 3 character types
pub const CHAT_RXCHAR: u8 = 0;
pub const CHAT_TXECHO: u8 = 1;
pub const CHAT_TXCHAR: u8 = 0;

/// Longest message the client accepts
pub const MAX_DATAPKT_LENGTH: usize = 3000;

/// Size of a decoded video line
pub const MAX_VIDEO_LENGTH: usize = 3000;

/// Span clamps applied to SPECTRUM_RANGE responses
pub const MIN_RX_SPAN: u32 = 1000;
pub const MAX_RX_SPAN: u32 = 10_000_000;
pub const MIN_TX_SPAN: u32 = 1000;
pub const MAX_TX_SPAN: u32 = 40_000;

/// Raw samples per outbound audio packet, indexed by compression mode code
const MAX_TX_SAMPLES: [usize; 7] = [0, 512, 512, 816, 1024, 1360, 2048];

/// Audio compression mode carried in every audio packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMode {
    NoAudio,
    /// 8-bit truncated linear PCM
    Raw,
    ULaw,
    Adpcm40,
    Adpcm32,
    Adpcm24,
    Adpcm16,
    /// Raw IQ data at one of the fixed rates; audio output is stopped
    RawIq(u8),
}

impl CompressionMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => CompressionMode::NoAudio,
            1 => CompressionMode::Raw,
            2 => CompressionMode::ULaw,
            3 => CompressionMode::Adpcm40,
            4 => CompressionMode::Adpcm32,
            5 => CompressionMode::Adpcm24,
            6 => CompressionMode::Adpcm16,
            other => CompressionMode::RawIq(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CompressionMode::NoAudio => 0,
            CompressionMode::Raw => 1,
            CompressionMode::ULaw => 2,
            CompressionMode::Adpcm40 => 3,
            CompressionMode::Adpcm32 => 4,
            CompressionMode::Adpcm24 => 5,
            CompressionMode::Adpcm16 => 6,
            CompressionMode::RawIq(code) => code,
        }
    }

    /// Modes that carry speech audio (everything below the raw IQ range)
    pub fn is_audio(self) -> bool {
        !matches!(self, CompressionMode::RawIq(_))
    }

    pub fn adpcm_rate(self) -> Option<AdpcmRate> {
        match self {
            CompressionMode::Adpcm40 => Some(AdpcmRate::Rate40),
            CompressionMode::Adpcm32 => Some(AdpcmRate::Rate32),
            CompressionMode::Adpcm24 => Some(AdpcmRate::Rate24),
            CompressionMode::Adpcm16 => Some(AdpcmRate::Rate16),
            _ => None,
        }
    }

    /// Largest number of 8 kHz samples packed into one outbound packet
    pub fn max_tx_samples(self) -> usize {
        MAX_TX_SAMPLES
            .get(self.code() as usize)
            .copied()
            .unwrap_or(0)
    }

    /// IQ sample rate for the raw IQ modes
    pub fn iq_rate(self) -> Option<u32> {
        match self {
            CompressionMode::RawIq(7) => Some(16000),
            CompressionMode::RawIq(8) => Some(8000),
            CompressionMode::RawIq(9) => Some(4000),
            CompressionMode::RawIq(10) => Some(2000),
            CompressionMode::RawIq(11) => Some(1000),
            CompressionMode::RawIq(12) => Some(500),
            _ => None,
        }
    }
}

impl Default for CompressionMode {
    fn default() -> Self {
        CompressionMode::NoAudio
    }
}

/// Video (spectrum line) compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCompression {
    #[default]
    None,
    EightBit,
    FourBit,
}

impl VideoCompression {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => VideoCompression::EightBit,
            2 => VideoCompression::FourBit,
            _ => VideoCompression::None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            VideoCompression::None => 0,
            VideoCompression::EightBit => 1,
            VideoCompression::FourBit => 2,
        }
    }
}

/// TX_STATE parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Off = 0,
    On = 1,
    DelayOff = 2,
}

impl TxState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Connection state as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    #[default]
    Off,
    Connecting,
    Connected,
    PwOk,
    Receiving,
    Transmitting,
    DisconnectBusy,
    DisconnectPwError,
    DisconnectTimeout,
}

impl LinkStatus {
    /// Terminal states end the session
    pub fn is_disconnected(self) -> bool {
        matches!(
            self,
            LinkStatus::Off
                | LinkStatus::DisconnectBusy
                | LinkStatus::DisconnectPwError
                | LinkStatus::DisconnectTimeout
        )
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LinkStatus::Off => "off",
            LinkStatus::Connecting => "connecting",
            LinkStatus::Connected => "connected",
            LinkStatus::PwOk => "password accepted",
            LinkStatus::Receiving => "receiving",
            LinkStatus::Transmitting => "transmitting",
            LinkStatus::DisconnectBusy => "disconnected: server busy",
            LinkStatus::DisconnectPwError => "disconnected: password rejected",
            LinkStatus::DisconnectTimeout => "disconnected: timeout",
        };
        f.write_str(text)
    }
}
