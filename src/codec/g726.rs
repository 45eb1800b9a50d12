//! G.726 adaptive differential PCM at 16, 24, 32 and 40 kbit/s
//!
//! Each direction owns its own [`AdpcmCodec`]. The per-sample pipeline follows the block
//! diagram of the recommendation: step size, prediction, quantization, reconstruction, tone
//! detection, predictor update and scale-factor update, in that order. Register widths matter:
//! several intermediate values are truncated to 16 bits and rely on wrap-around.
//!
//! Codes are packed least-significant-bit first, contiguous across byte boundaries.

/// Code width / bit rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdpcmRate {
    /// 2 bits per sample
    Rate16,
    /// 3 bits per sample
    Rate24,
    /// 4 bits per sample
    Rate32,
    /// 5 bits per sample
    Rate40,
}

impl AdpcmRate {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            2 => Some(AdpcmRate::Rate16),
            3 => Some(AdpcmRate::Rate24),
            4 => Some(AdpcmRate::Rate32),
            5 => Some(AdpcmRate::Rate40),
            _ => None,
        }
    }

    /// Bits per code
    pub fn bits(self) -> u8 {
        match self {
            AdpcmRate::Rate16 => 2,
            AdpcmRate::Rate24 => 3,
            AdpcmRate::Rate32 => 4,
            AdpcmRate::Rate40 => 5,
        }
    }

    /// Nominal bit rate at 8 kHz
    pub fn kbps(self) -> u32 {
        self.bits() as u32 * 8
    }

    fn mask(self) -> u8 {
        (1u8 << self.bits()) - 1
    }

    fn quantizer_thresholds(self) -> &'static [i32] {
        match self {
            AdpcmRate::Rate16 => &[261, 0x7FFF],
            AdpcmRate::Rate24 => &QUAN_24,
            AdpcmRate::Rate32 => &QUAN_32,
            AdpcmRate::Rate40 => &QUAN_40,
        }
    }

    fn reconst_table(self) -> &'static [i32] {
        match self {
            AdpcmRate::Rate16 => &RECONST_16,
            AdpcmRate::Rate24 => &RECONST_24,
            AdpcmRate::Rate32 => &RECONST_32,
            AdpcmRate::Rate40 => &RECONST_40,
        }
    }

    fn functw_table(self) -> &'static [i32] {
        match self {
            AdpcmRate::Rate16 => &FUNCTW_16,
            AdpcmRate::Rate24 => &FUNCTW_24,
            AdpcmRate::Rate32 => &FUNCTW_32,
            AdpcmRate::Rate40 => &FUNCTW_40,
        }
    }

    fn functf_table(self) -> &'static [i32] {
        match self {
            AdpcmRate::Rate16 => &FUNCTF_16,
            AdpcmRate::Rate24 => &FUNCTF_24,
            AdpcmRate::Rate32 => &FUNCTF_32,
            AdpcmRate::Rate40 => &FUNCTF_40,
        }
    }
}

// Quantizer decision levels (log domain)
const QUAN_24: [i32; 4] = [8, 218, 331, 0x7FFF];
const QUAN_32: [i32; 8] = [-124, 80, 178, 246, 300, 349, 400, 0x7FFF];
const QUAN_40: [i32; 16] = [
    -122, -16, 68, 139, 198, 250, 298, 339, 378, 413, 445, 475, 502, 528, 553, 0x7FFF,
];

// Inverse quantizer output levels (log domain)
const RECONST_16: [i32; 2] = [116, 365];
const RECONST_24: [i32; 4] = [-2048, 135, 273, 373];
const RECONST_32: [i32; 8] = [-2048, 4, 135, 213, 273, 323, 373, 425];
const RECONST_40: [i32; 16] = [
    -2048, -66, 28, 104, 169, 224, 274, 318, 358, 395, 429, 459, 488, 514, 539, 566,
];

// Scale factor multipliers
const FUNCTW_16: [i32; 2] = [-22, 439];
const FUNCTW_24: [i32; 4] = [-4, 30, 137, 582];
const FUNCTW_32: [i32; 8] = [-12, 18, 41, 64, 112, 198, 355, 1122];
const FUNCTW_40: [i32; 16] = [
    14, 14, 24, 39, 40, 41, 58, 100, 141, 179, 219, 280, 358, 440, 529, 696,
];

// Speed control transition function
const FUNCTF_16: [i32; 2] = [0, 7];
const FUNCTF_24: [i32; 4] = [0, 1, 2, 7];
const FUNCTF_32: [i32; 8] = [0, 0, 0, 1, 1, 1, 3, 7];
const FUNCTF_40: [i32; 16] = [0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 2, 3, 4, 5, 6, 6];

/// Codec registers, one set per direction
#[derive(Debug, Clone, PartialEq, Eq)]
struct AdpcmState {
    /// Slow scale factor
    yl: u32,
    /// Fast scale factor
    yu: u16,
    /// Short and long term averages of the speed control function
    dms: u16,
    dml: u16,
    /// Speed control parameter
    ap: u16,
    /// Second-order predictor coefficients
    a1: i16,
    a2: i16,
    /// Sixth-order predictor coefficients
    b: [i16; 6],
    /// Quantized difference history, floating format
    dq: [u16; 6],
    /// Reconstructed signal history, floating format
    sr1: u16,
    sr2: u16,
    /// Sign history of the partial reconstruction
    pk1: bool,
    pk2: bool,
    /// Tone detect
    td: bool,
}

impl Default for AdpcmState {
    fn default() -> Self {
        Self {
            yl: 34816,
            yu: 544,
            dms: 0,
            dml: 0,
            ap: 0,
            a1: 0,
            a2: 0,
            b: [0; 6],
            dq: [32; 6],
            sr1: 32,
            sr2: 32,
            pk1: false,
            pk2: false,
            td: false,
        }
    }
}

/// Output of the prediction half of a step
#[derive(Debug, Clone, Copy)]
struct Prediction {
    /// Quantizer scale factor
    y: u32,
    /// Signal estimate
    se: i32,
    /// Sixth-order part of the estimate
    sez: i32,
}

/// Stateful G.726 encoder/decoder
#[derive(Debug, Clone)]
pub struct AdpcmCodec {
    rate: AdpcmRate,
    state: AdpcmState,
}

impl AdpcmCodec {
    pub fn new(rate: AdpcmRate) -> Self {
        Self {
            rate,
            state: AdpcmState::default(),
        }
    }

    pub fn rate(&self) -> AdpcmRate {
        self.rate
    }

    /// Change the code width. The registers are reset as well.
    pub fn set_rate(&mut self, rate: AdpcmRate) {
        self.rate = rate;
        self.reset();
    }

    /// Restore the idle register values before starting a new stream
    pub fn reset(&mut self) {
        self.state = AdpcmState::default();
    }

    /// Encode one 16-bit sample to a code of `rate().bits()` bits
    pub fn encode_sample(&mut self, sample: i16) -> u8 {
        let p = self.predict();
        let sl = (sample >> 2) as i32;
        let (dl, ds) = log(sl - p.se);
        let dln = dl - (p.y >> 2) as i32;
        let code = quan(self.rate, dln, ds);
        self.adapt(code, p);
        code
    }

    /// Decode one code to a 16-bit sample
    pub fn decode_sample(&mut self, code: u8) -> i16 {
        let code = code & self.rate.mask();
        let p = self.predict();
        let sr = self.adapt(code, p);
        limo(sr)
    }

    /// Encode `pcm`, packing codes into `dst` starting at bit `dst_bit_offset`.
    ///
    /// `dst` grows as needed; unused high bits of the final byte are cleared. Returns the number
    /// of bits written.
    pub fn encode(&mut self, pcm: &[i16], dst: &mut Vec<u8>, dst_bit_offset: usize) -> usize {
        let width = self.rate.bits() as usize;
        let total = pcm.len() * width;
        let end = dst_bit_offset + total;
        let needed = (end + 7) / 8;
        if dst.len() < needed {
            dst.resize(needed, 0);
        }

        let mut pos = dst_bit_offset;
        for &sample in pcm {
            let code = self.encode_sample(sample);
            put_bits(dst, pos, code, width);
            pos += width;
        }
        if end % 8 != 0 {
            dst[end / 8] &= (1u8 << (end % 8)) - 1;
        }
        total
    }

    /// Decode `src_bits` bits of codes starting at bit `src_bit_offset`, appending samples to
    /// `out`. Trailing bits that do not make up a whole code are ignored.
    pub fn decode(
        &mut self,
        src: &[u8],
        src_bit_offset: usize,
        src_bits: usize,
        out: &mut Vec<i16>,
    ) -> usize {
        let width = self.rate.bits() as usize;
        let available = (src.len() * 8).saturating_sub(src_bit_offset);
        let count = src_bits.min(available) / width;
        out.reserve(count);

        let mut pos = src_bit_offset;
        for _ in 0..count {
            let code = get_bits(src, pos, width);
            out.push(self.decode_sample(code));
            pos += width;
        }
        count
    }

    /// Encode a whole block into a fresh byte-aligned buffer
    pub fn encode_block(&mut self, pcm: &[i16]) -> Vec<u8> {
        let mut out = Vec::with_capacity((pcm.len() * self.rate.bits() as usize + 7) / 8);
        self.encode(pcm, &mut out, 0);
        out
    }

    /// Decode every whole code in `data`
    pub fn decode_block(&mut self, data: &[u8], out: &mut Vec<i16>) -> usize {
        self.decode(data, 0, data.len() * 8, out)
    }

    /// Step size and signal estimate from the held registers
    fn predict(&self) -> Prediction {
        let s = &self.state;
        let al = lima(s.ap);
        let y = mix(al, s.yu, s.yl);

        let mut wb = [0i32; 6];
        for (w, (&b, &dq)) in wb.iter_mut().zip(s.b.iter().zip(s.dq.iter())) {
            *w = fmult(b, dq);
        }
        let wa = [fmult(s.a1, s.sr1), fmult(s.a2, s.sr2)];
        let (se, sez) = accum(wa, wb);
        Prediction { y, se, sez }
    }

    /// Reconstruct the difference for `code` and run every state update. Returns the
    /// reconstructed signal.
    fn adapt(&mut self, code: u8, p: Prediction) -> i32 {
        let rate = self.rate;
        let (dqln, dqs) = reconst(rate, code);
        let dq = antilog(dqln + (p.y >> 2) as i32, dqs);

        let s = &mut self.state;
        let tr = trans(s.td, s.yl, dq);
        let (pk0, sigpk) = addc(dq, p.sez);
        let sr = addb(dq, p.se);

        s.sr2 = s.sr1;
        s.sr1 = floatb(sr);
        let dq0 = floata(dq);

        // Sixth-order predictor
        let dq_sign = (dq >> 15) as u16;
        for (b, &dqn) in s.b.iter_mut().zip(s.dq.iter()) {
            let un = (dqn >> 10) ^ dq_sign != 0;
            let bp = upb(rate, un, *b, dq);
            *b = if tr { 0 } else { bp };
        }

        // Second-order predictor
        let a2p = limc(upa2(pk0, s.pk1, s.pk2, s.a1, s.a2, sigpk));
        let a1p = limd(upa1(pk0, s.pk1, s.a1, sigpk), a2p);
        s.a2 = if tr { 0 } else { a2p };
        s.a1 = if tr { 0 } else { a1p };
        s.pk2 = s.pk1;
        s.pk1 = pk0;

        s.dq.rotate_right(1);
        s.dq[0] = dq0;

        let tdp = tone(a2p);
        s.td = !tr && tdp;

        // Speed control
        let fi = functf(rate, code);
        s.dms = filta(fi, s.dms);
        s.dml = filtb(fi, s.dml);
        let ax = subtc(s.dms, s.dml, tdp, p.y);
        s.ap = if tr { 256 } else { filtc(ax, s.ap) };

        // Scale factor
        let yut = filtd(functw(rate, code), p.y);
        let yup = limb(yut);
        s.yl = filte(yup, s.yl);
        s.yu = yup;

        sr
    }
}

fn trunc16(v: i32) -> i32 {
    v as i16 as i32
}

/// Index into the magnitude half of a rate table
fn magnitude_index(rate: AdpcmRate, code: u8) -> usize {
    let sign = 1u8 << (rate.bits() - 1);
    let mag = if code & sign != 0 { !code } else { code };
    (mag & (sign - 1)) as usize
}

/// Log of the difference magnitude, and the difference sign (0 or -1)
fn log(d: i32) -> (i32, i32) {
    let ds = d >> 15;
    let dqm = d.wrapping_abs() & 0x7FFF;
    let mut x = dqm;
    let mut exp = 0;
    if x >= 256 {
        exp |= 8;
        x >>= 8;
    }
    if x >= 16 {
        exp |= 4;
        x >>= 4;
    }
    if x >= 4 {
        exp |= 2;
        x >>= 2;
    }
    exp |= x >> 1;
    let mant = ((dqm << 7) >> exp) & 0x7F;
    ((exp << 7) + mant, ds)
}

fn quan(rate: AdpcmRate, dln: i32, ds: i32) -> u8 {
    let x = match rate {
        AdpcmRate::Rate16 => (dln >= 261) as i32,
        _ => {
            let levels = rate.quantizer_thresholds();
            match levels.iter().position(|&t| dln < t).unwrap_or(levels.len()) {
                0 => !ds,
                k => k as i32,
            }
        }
    };
    ((x ^ ds) as u8) & rate.mask()
}

/// Log-domain reconstructed difference and its sign
fn reconst(rate: AdpcmRate, code: u8) -> (i32, bool) {
    let sign = 1u8 << (rate.bits() - 1);
    (
        rate.reconst_table()[magnitude_index(rate, code)],
        code & sign != 0,
    )
}

/// Sign-magnitude difference: bit 15 is the sign
fn antilog(dql: i32, dqs: bool) -> i32 {
    let dex = (dql >> 7) & 15;
    let dmn = dql & 127;
    let dqt = 128 + dmn;
    let dqmag = if dql >= 0 {
        (dqt << 7) >> (14 - dex.min(14))
    } else {
        0
    };
    if dqs {
        dqmag + 32768
    } else {
        dqmag
    }
}

fn functw(rate: AdpcmRate, code: u8) -> i32 {
    let sign = 1u8 << (rate.bits() - 1);
    let n = if code & sign != 0 {
        (2 * sign - 1) - code
    } else {
        code
    };
    rate.functw_table()[n as usize]
}

fn functf(rate: AdpcmRate, code: u8) -> i32 {
    rate.functf_table()[magnitude_index(rate, code)]
}

fn filtd(wi: i32, y: u32) -> u32 {
    let dif = (wi << 5) - y as i32;
    (y as i32 + (dif >> 5)) as u32
}

fn filte(yup: u16, yl: u32) -> u32 {
    let dif = ((yup as i32) << 6) - yl as i32;
    (yl as i32 + (dif >> 6)) as u32
}

fn limb(yut: u32) -> u16 {
    let geul = yut.wrapping_add(11264) & 8192;
    let gell = yut.wrapping_add(15840) & 8192;
    if gell != 0 {
        544
    } else if geul == 0 {
        5120
    } else {
        yut as u16
    }
}

fn mix(al: i32, yu: u16, yl: u32) -> u32 {
    let yl6 = (yl >> 6) as i32;
    let dif = yu as i32 - yl6;
    let mut prod = dif * al;
    if dif < 0 {
        prod += 63;
    }
    (yl6 + (prod >> 6)) as u32
}

fn lima(ap: u16) -> i32 {
    if ap > 256 {
        64
    } else {
        (ap >> 2) as i32
    }
}

fn filta(fi: i32, dms: u16) -> u16 {
    let dif = (fi << 9) - dms as i32;
    ((dif >> 5) + dms as i32) as u16
}

fn filtb(fi: i32, dml: u16) -> u16 {
    let dif = (fi << 11) - dml as i32;
    ((dif >> 7) + dml as i32) as u16
}

fn filtc(ax: i32, ap: u16) -> u16 {
    let dif = (ax << 9) - ap as i32;
    ((dif >> 4) + ap as i32) as u16
}

fn subtc(dms: u16, dml: u16, tdp: bool, y: u32) -> i32 {
    let dif = ((dms as i32) << 2) - dml as i32;
    let difm = dif.abs();
    let dthr = (dml >> 3) as i32;
    if y >= 1536 && difm < dthr {
        tdp as i32
    } else {
        1
    }
}

/// Normalized exponent and mantissa of a magnitude
fn to_float(mag: i32) -> (i32, i32) {
    let mut m = mag << 1;
    let mut exp = 0;
    if m >= 256 {
        exp |= 8;
        m >>= 8;
    }
    if m >= 16 {
        exp |= 4;
        m >>= 4;
    }
    if m >= 4 {
        exp |= 2;
        m >>= 2;
    }
    exp |= m >> 1;
    let mant = if mag != 0 { (mag << 6) >> exp } else { 32 };
    (exp, mant)
}

fn floata(dq: i32) -> u16 {
    let dqs = (dq >> 15) & 1;
    let (exp, mant) = to_float(dq & 32767);
    ((dqs << 10) + (exp << 6) + mant) as u16
}

fn floatb(sr: i32) -> u16 {
    let srs = (sr >> 15) & 1;
    let mag = if srs != 0 { (-sr) & 32767 } else { sr };
    let (exp, mant) = to_float(mag);
    ((srs << 10) + (exp << 6) + mant) as u16
}

/// Coefficient times floating-format history value
fn fmult(an: i16, srn: u16) -> i32 {
    let an = an as i32;
    let ans = (an >> 15) & 1;
    let anmag = if ans != 0 { (-(an >> 2)) & 8191 } else { an >> 2 };
    let (anexp, anmant) = to_float(anmag);

    let srn = srn as i32;
    let srs = srn >> 10;
    let srexp = (srn >> 6) & 15;
    let srmant = srn & 63;

    let wexp = srexp + anexp;
    let wmant = (srmant * anmant + 48) >> 4;
    let mag = if wexp <= 26 {
        (wmant << 7) >> (26 - wexp)
    } else {
        ((wmant << 7) << (wexp - 26)) & 32767
    };
    if srs ^ ans != 0 {
        -mag
    } else {
        mag
    }
}

/// Signal estimate and sixth-order partial estimate
fn accum(wa: [i32; 2], wb: [i32; 6]) -> (i32, i32) {
    let sezi = trunc16(wb.iter().sum());
    let sei = trunc16(sezi + wa[0] + wa[1]);
    (sei >> 1, sezi >> 1)
}

fn dq_linear(dq: i32) -> i32 {
    if dq & 32768 != 0 {
        32768 - dq
    } else {
        dq
    }
}

/// Reconstructed signal
fn addb(dq: i32, se: i32) -> i32 {
    trunc16(dq_linear(dq) + se)
}

/// Sign of the partial reconstruction, and whether it is zero
fn addc(dq: i32, sez: i32) -> (bool, bool) {
    let dqsez = trunc16(dq_linear(dq) + sez);
    (dqsez < 0, dqsez == 0)
}

fn upa1(pk0: bool, pk1: bool, a1: i16, sigpk: bool) -> i32 {
    let a1 = a1 as i32;
    let u = match (sigpk, pk0 != pk1) {
        (true, _) => 0,
        (false, true) => -192,
        (false, false) => 192,
    };
    trunc16(a1 + u - (a1 >> 8))
}

fn upa2(pk0: bool, pk1: bool, pk2: bool, a1: i16, a2: i16, sigpk: bool) -> i32 {
    let a2 = a2 as i32;
    let u = if sigpk {
        0
    } else {
        let ua = if pk0 != pk2 { -16384 } else { 16384 };
        let fa1 = (a1 as i32).clamp(-8191, 8191) << 2;
        let fa = if pk0 != pk1 { fa1 } else { -fa1 };
        (ua + fa) >> 7
    };
    trunc16(a2 + u - (a2 >> 7))
}

fn upb(rate: AdpcmRate, un: bool, bn: i16, dq: i32) -> i16 {
    let bn = bn as i32;
    let u = match (dq & 32767 != 0, un) {
        (false, _) => 0,
        (true, true) => -128,
        (true, false) => 128,
    };
    let leak = if rate == AdpcmRate::Rate40 {
        bn >> 9
    } else {
        bn >> 8
    };
    (bn + u - leak) as i16
}

fn limc(a2t: i32) -> i16 {
    a2t.clamp(-12288, 12288) as i16
}

fn limd(a1t: i32, a2p: i16) -> i16 {
    let ul = trunc16(15360 - a2p as i32);
    let ll = trunc16(a2p as i32 - 15360);
    if a1t <= ll {
        ll as i16
    } else if a1t >= ul {
        ul as i16
    } else {
        a1t as i16
    }
}

/// Partial band signal detection
fn tone(a2p: i16) -> bool {
    a2p < -11776
}

/// Transition detector: large difference while a tone is held
fn trans(td: bool, yl: u32, dq: i32) -> bool {
    let dqmag = (dq & 32767) as u32;
    let ylint = yl >> 15;
    let ylfrac = (yl >> 10) & 31;
    let thr2 = if ylint > 9 {
        31 << 10
    } else {
        (32 + ylfrac) << ylint
    };
    let dqthr = (thr2 + (thr2 >> 1)) >> 1;
    td && dqmag > dqthr
}

/// 14-bit output limiter, restored to 16-bit scale
fn limo(sr: i32) -> i16 {
    (sr.clamp(-8192, 8191) << 2) as i16
}

fn put_bits(dst: &mut [u8], pos: usize, code: u8, width: usize) {
    for bit in 0..width {
        let p = pos + bit;
        let mask = 1u8 << (p % 8);
        if (code >> bit) & 1 != 0 {
            dst[p / 8] |= mask;
        } else {
            dst[p / 8] &= !mask;
        }
    }
}

fn get_bits(src: &[u8], pos: usize, width: usize) -> u8 {
    (0..width).fold(0u8, |code, bit| {
        let p = pos + bit;
        code | (((src[p / 8] >> (p % 8)) & 1) << bit)
    })
}
