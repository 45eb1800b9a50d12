//! Spectrum line (video) packet decoding

use tracing::debug;

use crate::protocol::items::MAX_VIDEO_LENGTH;
use crate::protocol::VideoCompression;

/// Step table of the 4-bit delta code
const DELTA_STEPS: [i16; 16] = [
    -1, 7, 15, 26, 42, 63, 91, 127, -128, -92, -80, -43, -28, -16, -6, -1,
];

/// Decoder for DataItem1 bodies; the compression mode follows whatever the packets carry
#[derive(Debug, Default)]
pub struct VideoDecoder {
    mode: VideoCompression,
}

impl VideoDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> VideoCompression {
        self.mode
    }

    /// Decode one packet body (`mode, data`). Returns `None` for uncompressed-off or empty bodies.
    pub fn decode(&mut self, body: &[u8]) -> Option<Vec<u8>> {
        let (&code, data) = body.split_first()?;
        let mode = VideoCompression::from_code(code);
        if mode != self.mode {
            debug!("Video compression {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }

        match mode {
            VideoCompression::None => None,
            VideoCompression::EightBit => {
                let mut frame = vec![0u8; MAX_VIDEO_LENGTH];
                let n = data.len().min(MAX_VIDEO_LENGTH);
                frame[..n].copy_from_slice(&data[..n]);
                Some(frame)
            }
            VideoCompression::FourBit => Some(decode_deltas(data)),
        }
    }
}

/// Expand 4-bit deltas, low nibble first, into clamped 8-bit values
fn decode_deltas(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((data.len() * 2).min(MAX_VIDEO_LENGTH));
    let mut value: i16 = 0;
    'bytes: for &byte in data {
        for nibble in [byte & 0x0F, byte >> 4] {
            if out.len() == MAX_VIDEO_LENGTH {
                break 'bytes;
            }
            value = (value + DELTA_STEPS[nibble as usize]).clamp(0, 255);
            out.push(value as u8);
        }
    }
    out
}
