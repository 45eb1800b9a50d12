//! G.711 logarithmic companding (A-law and u-law)
//!
//! Stateless per-sample conversion between 16-bit linear PCM and 8-bit codes, plus buffer
//! helpers that map the per-sample functions over contiguous blocks.

/// Encode one 16-bit linear sample to an A-law code
pub fn alaw_encode(sample: i16) -> u8 {
    let (mut mag, mut code) = if sample < 0 {
        (!(sample as i32), 0x00u8)
    } else {
        (sample as i32, 0x80u8)
    };

    mag >>= 4;
    if mag >= 0x20 {
        if mag >= 0x100 {
            mag >>= 4;
            code += 0x40;
        }
        if mag >= 0x40 {
            mag >>= 2;
            code += 0x20;
        }
        if mag >= 0x20 {
            mag >>= 1;
            code += 0x10;
        }
    }
    // mag now holds the segment-relative interval (plus the segment 1 marker bit)
    code = code.wrapping_add(mag as u8);
    code ^ 0x55
}

/// Decode an A-law code to a 16-bit linear sample
pub fn alaw_decode(code: u8) -> i16 {
    let a = code ^ 0x55;
    let mut lin = (((a & 0x1F) as i32) << 4) + 8;
    if (a & 0x7F) >= 0x20 {
        lin |= 0x100;
        lin <<= ((a >> 4) & 0x07) - 1;
    }
    if a & 0x80 != 0 {
        lin as i16
    } else {
        -lin as i16
    }
}

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 0x7F00;

/// Encode one 16-bit linear sample to a u-law code
pub fn ulaw_encode(sample: i16) -> u8 {
    let (mut mag, mut code) = if sample < 0 {
        (!(sample as i32), 0x80u8 ^ 0x10 ^ 0xFF)
    } else {
        (sample as i32, 0x10u8 ^ 0xFF)
    };

    mag = (mag + ULAW_BIAS).min(ULAW_CLIP) >> 3;
    if mag >= 0x100 {
        mag >>= 4;
        code ^= 0x40;
    }
    if mag >= 0x40 {
        mag >>= 2;
        code ^= 0x20;
    }
    if mag >= 0x20 {
        mag >>= 1;
        code ^= 0x10;
    }
    code ^ (mag as u8)
}

/// Decode a u-law code to a 16-bit linear sample
pub fn ulaw_decode(code: u8) -> i16 {
    let u = code ^ 0xFF;
    let lin = (((((u & 0x0F) as i32) << 3) | ULAW_BIAS) << ((u >> 4) & 0x07)) - ULAW_BIAS;
    if u & 0x80 != 0 {
        -lin as i16
    } else {
        lin as i16
    }
}

/// Encode a PCM block, appending one code per sample. Returns the number of codes written.
pub fn alaw_encode_block(pcm: &[i16], out: &mut Vec<u8>) -> usize {
    out.extend(pcm.iter().map(|&s| alaw_encode(s)));
    pcm.len()
}

/// Decode a block of A-law codes, appending one sample per code
pub fn alaw_decode_block(codes: &[u8], out: &mut Vec<i16>) -> usize {
    out.extend(codes.iter().map(|&c| alaw_decode(c)));
    codes.len()
}

/// Encode a PCM block, appending one code per sample. Returns the number of codes written.
pub fn ulaw_encode_block(pcm: &[i16], out: &mut Vec<u8>) -> usize {
    out.extend(pcm.iter().map(|&s| ulaw_encode(s)));
    pcm.len()
}

/// Decode a block of u-law codes, appending one sample per code
pub fn ulaw_decode_block(codes: &[u8], out: &mut Vec<i16>) -> usize {
    out.extend(codes.iter().map(|&c| ulaw_decode(c)));
    codes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_bound(x: i16) -> i32 {
        32.max((x as i32).abs() >> 4)
    }

    #[test]
    fn test_zero_golden_values() {
        assert_eq!(alaw_encode(0), 0xD5);
        assert_eq!(ulaw_encode(0), 0xFF);
        assert_eq!(alaw_decode(0xD5), 8);
        assert_eq!(ulaw_decode(0xFF), 0);
        assert_eq!(alaw_encode(-1), 0x55);
        assert_eq!(ulaw_encode(-1), 0x7F);
    }

    #[test]
    fn test_full_scale() {
        assert_eq!(alaw_encode(i16::MAX), 0xAA);
        assert_eq!(alaw_decode(0xAA), 32256);
        assert_eq!(alaw_encode(i16::MIN), 0x2A);
        assert_eq!(alaw_decode(0x2A), -32256);

        assert_eq!(ulaw_encode(i16::MAX), 0x80);
        assert_eq!(ulaw_decode(0x80), 32124);
        assert_eq!(ulaw_encode(i16::MIN), 0x00);
        assert_eq!(ulaw_decode(0x00), -32124);
    }

    #[test]
    fn test_quantization_error_bounded() {
        for x in i16::MIN..=i16::MAX {
            let a = alaw_decode(alaw_encode(x)) as i32;
            let u = ulaw_decode(ulaw_encode(x)) as i32;
            assert!((a - x as i32).abs() <= step_bound(x), "A-law {} -> {}", x, a);
            assert!((u - x as i32).abs() <= step_bound(x), "u-law {} -> {}", x, u);
        }
    }

    #[test]
    fn test_monotonic() {
        let mut prev_a = alaw_decode(alaw_encode(i16::MIN));
        let mut prev_u = ulaw_decode(ulaw_encode(i16::MIN));
        for x in (i16::MIN + 1)..=i16::MAX {
            let a = alaw_decode(alaw_encode(x));
            let u = ulaw_decode(ulaw_encode(x));
            assert!(a >= prev_a);
            assert!(u >= prev_u);
            prev_a = a;
            prev_u = u;
        }
    }

    #[test]
    fn test_codes_are_stable() {
        for code in 0..=255u8 {
            assert_eq!(alaw_encode(alaw_decode(code)), code);
            if code != 0x7F {
                assert_eq!(ulaw_encode(ulaw_decode(code)), code);
            }
        }
        // negative zero collapses onto positive zero
        assert_eq!(ulaw_encode(ulaw_decode(0x7F)), 0xFF);
    }

    #[test]
    fn test_block_helpers() {
        let pcm = [0i16, 1000, -1000, 20000, -20000];
        let mut codes = Vec::new();
        assert_eq!(ulaw_encode_block(&pcm, &mut codes), pcm.len());
        let mut back = Vec::new();
        assert_eq!(ulaw_decode_block(&codes, &mut back), pcm.len());
        for (x, y) in pcm.iter().zip(&back) {
            assert!((*x as i32 - *y as i32).abs() <= step_bound(*x));
        }

        codes.clear();
        alaw_encode_block(&pcm, &mut codes);
        assert_eq!(codes[0], 0xD5);
        back.clear();
        alaw_decode_block(&codes, &mut back);
        assert_eq!(back.len(), pcm.len());
    }
}
