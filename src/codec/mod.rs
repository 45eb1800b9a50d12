//! Speech codecs carried in audio packets
//!
//! G.711 companding is stateless; G.726 ADPCM keeps per-direction state and must be reset
//! whenever the stream (or its compression mode) restarts.

pub mod g711;
pub mod g726;

pub use g726::{AdpcmCodec, AdpcmRate};

/// G.711 companding law
///
/// The audio link only negotiates u-law; `ALaw` is offered to library users that need
/// the European variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompandingLaw {
    ALaw,
    ULaw,
}

impl CompandingLaw {
    pub fn encode(self, sample: i16) -> u8 {
        match self {
            CompandingLaw::ALaw => g711::alaw_encode(sample),
            CompandingLaw::ULaw => g711::ulaw_encode(sample),
        }
    }

    pub fn decode(self, code: u8) -> i16 {
        match self {
            CompandingLaw::ALaw => g711::alaw_decode(code),
            CompandingLaw::ULaw => g711::ulaw_decode(code),
        }
    }

    /// Encode a block, appending one byte per sample
    pub fn encode_block(self, pcm: &[i16], out: &mut Vec<u8>) -> usize {
        match self {
            CompandingLaw::ALaw => g711::alaw_encode_block(pcm, out),
            CompandingLaw::ULaw => g711::ulaw_encode_block(pcm, out),
        }
    }

    /// Decode a block, appending one sample per byte
    pub fn decode_block(self, codes: &[u8], out: &mut Vec<i16>) -> usize {
        match self {
            CompandingLaw::ALaw => g711::alaw_decode_block(codes, out),
            CompandingLaw::ULaw => g711::ulaw_decode_block(codes, out),
        }
    }
}
